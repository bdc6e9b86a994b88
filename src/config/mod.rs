//! Configuration management for m3rula

pub mod app_config;

pub use app_config::*;
