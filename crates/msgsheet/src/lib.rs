#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod discovery;
pub mod media;
pub mod models;
pub mod report;
pub mod sheet;
pub mod utils;
pub mod validate;
pub mod xlsx;

pub use cli::app::{Cli, Command};
