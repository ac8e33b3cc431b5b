use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::clock::{ClinicClock, Clock, SystemClock};

/// Shared handles every cell router is built from.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
    pub clock: ClinicClock,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ClinicStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        let clock = ClinicClock::new(clock, config.clinic_utc_offset_minutes);
        Self {
            config: Arc::new(config),
            store,
            clock,
        }
    }
}
