//! GB wind generation forecasting.
//!
//! Per-farm regression models trained on weather and dispatch history, a
//! real-time aggregate forecast, comparison against the grid operator's
//! published forecast with a directional trading signal, and wind ramp alerts.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod repo;
pub mod telemetry;
