//! Library crate for reachscan exposing reusable modules.
pub mod auth;
pub mod config;
pub mod logging;
pub mod output;
pub mod probe;
pub mod proxy;
pub mod scanner;
pub mod targets;
pub mod types;
