use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod consultations;
pub mod health;
pub mod registration;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = trimmed, "ignoring invalid CORS allowed origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    };

    // Every handler other than `submit_consultation` requires an `AdminUser`.
    let consultation_routes = Router::new()
        .route(
            "/",
            get(consultations::list_consultations).post(consultations::submit_consultation),
        )
        .route("/:id", get(consultations::get_consultation))
        .route("/:id/review", post(consultations::begin_review))
        .route("/:id/approve", post(consultations::approve))
        .route("/:id/reject", post(consultations::reject))
        .route("/:id/cancel", post(consultations::cancel))
        .route("/:id/reissue", post(consultations::reissue_invitation))
        .route("/:id/schedule", post(consultations::schedule))
        .route("/:id/complete", post(consultations::mark_completed));

    let registration_routes = Router::new()
        .route("/", post(registration::complete_registration))
        .route("/inspect", post(registration::inspect_token));

    Router::new()
        .nest("/api/consultations", consultation_routes)
        .nest("/api/registration", registration_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
