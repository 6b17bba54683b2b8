use std::{sync::Arc, time::Instant};

use axum::Router;

use crate::Config;

mod health;

// ---

/// State shared by the operational endpoints.
#[derive(Debug, Clone)]
pub struct AppState {
    started_at: Instant,
    subscriptions: Arc<Vec<String>>,
}

pub fn router(config: &Config) -> Router {
    // ---
    let state = AppState {
        started_at: Instant::now(),
        subscriptions: Arc::new(config.mqtt_topics.clone()),
    };

    Router::new().merge(health::router()).with_state(state)
}
