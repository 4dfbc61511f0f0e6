use crate::incident::StateStore;
use crate::monitor::Monitor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub store: Arc<dyn StateStore>,
}
