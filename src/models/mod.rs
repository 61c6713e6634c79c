//! Data contract shared by the simulator, the classifier and the API.

pub mod chat;
pub mod patient;

pub use chat::{ChatMessage, Feedback, Role};
pub use patient::{PatientData, PatientIdentity, Vitals};
