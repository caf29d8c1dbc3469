//! Core library for the LoackIn study companion backend.
//!
//! - [`agents`] generates chat replies through the ordered provider chain,
//!   falling back to keyword rules when no provider answers.
//! - [`api`] exposes the HTTP surface used by the web frontend.
//! - [`calendar`] builds week views and study statistics.
//! - [`config`] reads process configuration from the environment.
//! - [`db`] initialises the SQLite database and applies migrations.
//! - [`errors`] keeps the central error catalogue with human friendly metadata.
//! - [`logging`] writes structured diagnostics to the event log table.
//! - [`store`] holds the persistence functions for users, plans, sessions and chat.

pub mod agents;
pub mod api;
pub mod calendar;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod store;
