pub mod commands;
pub mod config;
pub mod envelope;
pub mod payload;
