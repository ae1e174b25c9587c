pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod rate_limiter;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Result, ScoutError};
