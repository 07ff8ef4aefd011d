//! Library side of the forecast-studio CLI: logging setup and the
//! subcommand implementations.

pub mod commands;
pub mod logging;
