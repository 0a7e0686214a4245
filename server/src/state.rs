use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::payments::PaymentProvider;
use crate::services::scan::ScanGuard;
use crate::store::TicketingStore;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TicketingStore>,
    pub payments: Arc<dyn PaymentProvider>,
    pub scan_guard: Arc<ScanGuard>,
    pub jwt: Arc<JwtKeys>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn TicketingStore>,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            scan_guard: Arc::new(ScanGuard::new(config.scan_dedup_window)),
            jwt: Arc::new(JwtKeys::new(&config.jwt_secret)),
            config: Arc::new(config),
            store,
            payments,
        }
    }
}
