//! Client logic for the order / profit tracking backend: a typed REST client,
//! order grid state with debounced search, and the profit calculator.

#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;
