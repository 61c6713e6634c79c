//! PEDI-AIR companion service
//!
//! Main entry point: starts the vitals simulator and the HTTP server.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use pediair::api::{self, AppState};
use pediair::config;
use pediair::core::ai::{AdviceGateway, OpenAiProvider};
use pediair::core::simulator::SimulatorController;
use pediair::models::patient::pick_child_name;
use pediair::models::PatientIdentity;
use pediair::telemetry;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = config::load_config().context("failed to load configuration")?;
    telemetry::init(&config.logging)?;

    // Advice collaborator; a missing key only switches answers to the fallback
    let api_key = config.advice.resolved_api_key();
    if api_key.is_none() {
        warn!("No advice service credential configured, answers will use the demo fallback");
    }
    let provider = OpenAiProvider::new(
        api_key,
        &config.advice.base_url,
        config.advice.model.clone(),
        config.advice.temperature,
        config.advice.timeout(),
    )
    .context("invalid advice service configuration")?
    .with_policy(config.triage);

    // Simulator
    let identity = PatientIdentity {
        name: pick_child_name(&mut rand::thread_rng(), None),
        ..PatientIdentity::default()
    };
    let simulator = Arc::new(SimulatorController::new(identity, config.simulator.timing()));
    simulator.start(config.simulator.initial_mode);

    // Create app state
    let app_state = web::Data::new(AppState::new(
        Arc::clone(&simulator),
        AdviceGateway::new(Arc::new(provider)),
        config.triage,
    ));

    info!(
        "PEDI-AIR service listening on http://{}:{}",
        config.server.host, config.server.port
    );

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .configure(api::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))
    .with_context(|| format!("failed to bind {}:{}", config.server.host, config.server.port))?
    .run()
    .await?;

    simulator.stop();
    info!("PEDI-AIR service stopped");
    Ok(())
}
