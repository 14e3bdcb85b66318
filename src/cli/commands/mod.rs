//! CLI command implementations.

mod config;
mod doctor;
mod fetch;
mod serve;

pub use config::run_config;
pub use doctor::run_doctor;
pub use fetch::run_fetch;
pub use serve::{build_router, run_serve, AppState};
