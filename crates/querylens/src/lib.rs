#![forbid(unsafe_code)]

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod models;
pub mod stats;
pub mod store;
pub mod utils;

pub use cli::app::{Cli, Command};
