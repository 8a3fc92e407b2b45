pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod global;
pub mod maintenance;
pub mod tasks;
pub mod transcription;
