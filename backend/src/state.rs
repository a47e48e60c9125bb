use std::sync::Arc;

use crate::{auth::jwt::JwtService, config::AppConfig, lifecycle::LifecycleCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<LifecycleCoordinator>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(config: AppConfig, coordinator: LifecycleCoordinator, jwt: JwtService) -> Self {
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(coordinator),
            jwt,
        }
    }
}
