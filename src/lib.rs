pub mod benchmark;
pub mod config;
pub mod errors;
pub mod logging;
