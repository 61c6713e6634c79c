use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::watch;
use tracing::{error, info};

use super::AppState;
use crate::core::simulator::SimulatorSnapshot;

/// Pushes the simulator snapshot to one browser on connect and on every change.
pub struct VitalsSocket {
    rx: Option<watch::Receiver<SimulatorSnapshot>>,
}

impl VitalsSocket {
    pub fn new(rx: watch::Receiver<SimulatorSnapshot>) -> Self {
        Self { rx: Some(rx) }
    }

    fn push(snapshot: &SimulatorSnapshot, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(snapshot) {
            Ok(text) => ctx.text(text),
            Err(e) => error!("Failed to encode vitals snapshot: {}", e),
        }
    }
}

impl Actor for VitalsSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };

        let current = rx.borrow_and_update().clone();
        Self::push(&current, ctx);

        // Lives as long as the actor; ends when the simulator goes away.
        let updates = futures::stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, rx))
        });
        ctx.add_stream(updates);
        info!("WebSocket client connected (vitals)");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("WebSocket client disconnected (vitals)");
    }
}

impl StreamHandler<SimulatorSnapshot> for VitalsSocket {
    fn handle(&mut self, snapshot: SimulatorSnapshot, ctx: &mut Self::Context) {
        Self::push(&snapshot, ctx);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for VitalsSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                error!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// **GET /ws/vitals**
pub async fn vitals_ws(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(VitalsSocket::new(state.simulator.subscribe()), &req, stream)
}
