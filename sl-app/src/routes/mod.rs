pub mod health;
pub mod webhook;

use crate::server::AppState;
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhook::router(state))
}
