//! External service integrations

pub mod workflow;
