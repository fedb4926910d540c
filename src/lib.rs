//! Retail Pulse
//!
//! Accepts batches of store visits, analyzes every visit's images in the
//! background and tracks each batch as a job whose terminal status can be
//! polled over HTTP.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
