//! API module for the PEDI-AIR service
//!
//! This module contains all HTTP and WebSocket functionality.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod websocket;

use std::sync::Arc;

use crate::core::ai::AdviceGateway;
use crate::core::chat::ChatSession;
use crate::core::simulator::SimulatorController;
use crate::core::triage::TriagePolicy;

pub use error::ApiError;
pub use routes::configure;

/// Application state shared by every worker.
pub struct AppState {
    pub simulator: Arc<SimulatorController>,
    pub gateway: AdviceGateway,
    pub chat: ChatSession,
    pub policy: TriagePolicy,
}

impl AppState {
    pub fn new(
        simulator: Arc<SimulatorController>,
        gateway: AdviceGateway,
        policy: TriagePolicy,
    ) -> Self {
        let chat = ChatSession::new(gateway.clone(), policy, &simulator.patient());
        Self {
            simulator,
            gateway,
            chat,
            policy,
        }
    }
}
