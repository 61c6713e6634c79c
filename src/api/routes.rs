use actix_web::web;

use super::{handlers, websocket};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/patient", web::get().to(handlers::get_patient))
            .route("/patient/name", web::post().to(handlers::randomize_name))
            .route("/triage", web::get().to(handlers::get_triage))
            .route("/simulation", web::post().to(handlers::set_mode))
            .route("/simulation", web::delete().to(handlers::stop_simulation))
            .route("/simulation/toggle", web::post().to(handlers::toggle_mode))
            .route("/medical-advice", web::post().to(handlers::medical_advice))
            .route("/chat", web::get().to(handlers::get_chat))
            .route("/chat", web::post().to(handlers::post_chat))
            .route("/chat/{id}/feedback", web::post().to(handlers::post_feedback)),
    )
    .route("/ws/vitals", web::get().to(websocket::vitals_ws));
}
