//! Common test utilities for the validation core.
//!
//! - [`engines`] - Fault-injecting engine and service builders
//! - [`fixtures`] - FHIR resources and bundles used across tests

#![allow(dead_code)]

pub mod engines;
pub mod fixtures;
