pub mod env;
pub mod tracing_init;

pub use env::{AppConfig, SyncConfig};
pub use tracing_init::init_tracing;
