pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod envelope;
pub mod http;
pub mod metrics;
pub mod utils;
