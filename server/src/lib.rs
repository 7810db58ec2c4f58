#![warn(clippy::nursery, clippy::pedantic)]

//! Ephemeral paste service: pastes that expire after a deadline, after a
//! number of views, or both.

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod paste;
pub mod render;
pub mod routes;
pub mod short_code;
pub mod store;

pub use crate::config::Config;
pub use crate::engine::Engine;
pub use crate::routes::{create_app, AppState};
