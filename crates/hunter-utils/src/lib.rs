//! Shared utilities for ai-hunter
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup, `.env` loading and a few environment helpers.

pub mod config;
pub mod logging;

pub use config::{AppInfo, env_bool, env_u64, load_dotenv};
pub use logging::{LogFormat, init_tracing};
