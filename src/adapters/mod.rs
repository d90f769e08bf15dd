//! Adapters for external systems
//!
//! This module contains adapters for the systems Lantern talks to:
//! the message broker, FHIR servers, the endpoint store and the certified
//! product list.

pub mod broker;
pub mod chpl;
pub mod database;
pub mod fhir;
pub mod postgresql;
