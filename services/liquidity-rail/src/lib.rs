pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rates;
pub mod security_middleware;
pub mod services;
pub mod store;
pub mod webhook;

pub use config::Config;
pub use errors::{RailError, Result};
