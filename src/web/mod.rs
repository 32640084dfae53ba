//! Web API module for the pitchside application.

pub mod admin;
pub mod error;
pub mod fixtures;
pub mod routes;
pub mod standings;
pub mod status;
pub mod teams;

pub use routes::*;
