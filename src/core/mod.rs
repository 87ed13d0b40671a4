mod config;
pub mod db;
mod logging;

pub use config::AppConfig;
pub use logging::init_tracing;
