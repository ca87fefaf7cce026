use std::sync::Once;

pub mod bulk;
pub mod commands;
pub mod consumption;
pub mod db;
mod error;
pub mod external;
pub mod household;
mod id;
pub mod inventory;
pub mod invite;
pub mod items;
pub mod locations;
pub mod migrate;
pub mod model;
pub mod shopping;
pub mod time;

pub use error::{AppError, AppResult};
pub use id::new_uuid_v7;
pub use time::now_ms;

static INIT_LOGGING: Once = Once::new();

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
