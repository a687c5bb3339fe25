//! Route configuration.

pub mod validator_routes;
