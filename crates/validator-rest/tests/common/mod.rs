//! Shared test utilities for the validator HTTP API.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;
