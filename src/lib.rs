pub mod analyzer;
pub mod config;
pub mod db;
pub mod practice;

/// Application name for XDG paths
pub const APP_NAME: &str = "legato";
