//! Simulation, triage and advice logic, independent of the HTTP layer.

pub mod ai;
pub mod chat;
pub mod data;
pub mod simulator;
pub mod triage;
pub mod ventilator;
