pub mod commands;
pub mod config;
pub mod models;
pub mod settings;
pub mod stats;
pub mod stream;
