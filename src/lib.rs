//! Control Hubspace smart lights: sign in, list lights, and switch, dim or
//! recolor any number of them at once, from the command line or over a
//! small HTTP API.

pub mod attributes;
pub mod commands;
pub mod config;
pub mod devices;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod service;
pub mod utils;

pub use error::{AppError, Result};
pub use handlers::router;
pub use models::AppState;
pub use service::ControlService;
