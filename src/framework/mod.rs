pub mod analyzers;
pub mod config;
pub mod core;
pub mod runners;
pub mod supervisor;
pub mod ui;
