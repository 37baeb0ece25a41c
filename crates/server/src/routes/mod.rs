use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::DeploymentImpl;

pub mod auth;
pub mod checklists;
pub mod favorites;
pub mod health;
pub mod inventory;
pub mod manuals;
pub mod precautions;
pub mod tags;

pub fn router(deployment: DeploymentImpl) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router(&deployment))
        .merge(tags::router(&deployment))
        .merge(inventory::router(&deployment))
        .merge(manuals::router(&deployment))
        .merge(precautions::router(&deployment))
        .merge(checklists::router(&deployment))
        .merge(favorites::router(&deployment))
        .with_state(deployment);

    Router::new()
        .nest("/api", base_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
