use std::sync::Arc;

use crate::diagnostics::DiagnosticsRunner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<DiagnosticsRunner>,
}
