//! Process-level concerns shared by the gateway binary: command line and
//! environment configuration, and logger setup.

pub mod config;
pub mod logging;
