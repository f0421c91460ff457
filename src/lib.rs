pub mod api;
pub mod app;
pub mod common;
pub mod dashboard;
pub mod datasource;
pub mod error;
pub mod feature;
pub mod format;
pub mod logging;
pub mod plugin;
pub mod query;
pub mod settings;
pub mod signal;
pub mod variables;
pub mod visualization;
