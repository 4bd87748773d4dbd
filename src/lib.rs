pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod observability;

pub use error::{AppError, Result};
