pub mod bundle;
pub mod cli;
pub mod config;
pub mod core;
pub mod detect;
pub mod engine;
pub mod error;
pub mod exit;
pub mod extract;
pub mod logs;
pub mod output;
pub mod page;
pub mod ui;
