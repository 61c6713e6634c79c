use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App};
use async_trait::async_trait;
use awc::ws;
use futures::{SinkExt, Stream, StreamExt};
use pediair::api::{configure, AppState};
use pediair::core::ai::{AdviceError, AdviceGateway, AdviceProvider, AdviceResponse};
use pediair::core::simulator::{SimulationMode, SimulatorController, SimulatorTiming};
use pediair::core::triage::TriagePolicy;
use pediair::models::{PatientData, PatientIdentity};
use serde_json::Value;

struct SilentProvider;

#[async_trait]
impl AdviceProvider for SilentProvider {
    async fn complete(
        &self,
        _question: &str,
        _patient: &PatientData,
    ) -> Result<AdviceResponse, AdviceError> {
        Err(AdviceError::MissingCredential)
    }
}

fn app_state() -> web::Data<AppState> {
    let timing = SimulatorTiming {
        danger: Duration::from_secs(600),
        safe: Duration::from_secs(600),
    };
    let simulator = Arc::new(SimulatorController::new(PatientIdentity::default(), timing));
    simulator.start(SimulationMode::Danger);

    web::Data::new(AppState::new(
        simulator,
        AdviceGateway::new(Arc::new(SilentProvider)),
        TriagePolicy::default(),
    ))
}

async fn next_snapshot<S>(frames: &mut S) -> Value
where
    S: Stream<Item = Result<ws::Frame, awc::error::WsProtocolError>> + Unpin,
{
    loop {
        match frames.next().await {
            Some(Ok(ws::Frame::Text(text))) => return serde_json::from_slice(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended before a snapshot arrived: {other:?}"),
        }
    }
}

#[actix_web::test]
async fn snapshot_pushed_on_connect_and_on_mode_change() {
    let state = app_state();
    let mut srv = actix_test::start(move || App::new().app_data(state.clone()).configure(configure));

    let mut socket = srv.ws_at("/ws/vitals").await.unwrap();
    let first = next_snapshot(&mut socket).await;
    assert_eq!(first["mode"], "danger");
    assert_eq!(first["running"], true);
    assert_eq!(first["patient"]["spo2"], 88);

    let resp = srv.post("/api/simulation/toggle").send().await.unwrap();
    assert!(resp.status().is_success());

    let second = next_snapshot(&mut socket).await;
    assert_eq!(second["mode"], "safe");
    assert_eq!(second["patient"]["spo2"], 98);
    assert!(second["epoch"].as_u64() > first["epoch"].as_u64());

    socket.send(ws::Message::Close(None)).await.unwrap();
}
