use std::sync::Arc;

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::notify::Notifier;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<Notifier>,
    pub config: Arc<Config>,
}
