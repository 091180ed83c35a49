//! Atelier Loans
//!
//! Equipment booking server for art school workshops: devices owned by
//! ateliers, time-boxed loans checked against existing bookings, and a
//! lifecycle sweep that moves loans from upcoming to active to completed.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
