use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::ChatWorkspace;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<ChatWorkspace>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(workspace: ChatWorkspace, settings: Settings) -> Self {
        Self {
            workspace: Arc::new(workspace),
            settings: Arc::new(settings),
        }
    }
}

impl FromRef<AppState> for Arc<ChatWorkspace> {
    fn from_ref(state: &AppState) -> Self {
        state.workspace.clone()
    }
}
