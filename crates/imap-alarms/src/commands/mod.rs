//! Subcommand handlers. `completions` is handled in `main` since it
//! needs no configuration.

pub mod config_cmd;
pub mod once;
pub mod run;
