use std::sync::Arc;

use threadline::ChatSession;

use crate::config::Config;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<ChatSession>,
}

impl AppState {
    pub fn new(config: Config, session: ChatSession) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(session),
        }
    }
}
