//! Ralph - loop a coding agent over a fixed prompt until it declares done.

pub mod agent;
pub mod config;
pub mod display;
pub mod prompt;
pub mod session;
pub mod stream;
pub mod supervisor;
