pub mod client;
pub mod models;

pub use client::{ApiError, BackendClient, Result};
pub use models::BackendConfig;
