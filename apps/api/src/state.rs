use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::config::Config;
use crate::ledger::HashRecorder;
use crate::scoring::ScoringGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable scoring backend. Default: `HttpScoringGateway`.
    pub scoring: Arc<dyn ScoringGateway>,
    /// `None` when no identity provider is configured; auth routes answer 503.
    pub auth: Option<Arc<dyn AuthProvider>>,
    /// `None` when no chain is configured; the hash route answers 503.
    pub hash_recorder: Option<Arc<dyn HashRecorder>>,
}
