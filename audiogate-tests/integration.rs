//! Integration tests for Audiogate
//!
//! Drive a full gate session against mock pages and check the behavior a
//! listener sees: which failures raise the prompt, how it is dismissed and
//! where confirmation navigates.

#[path = "integration/scenarios.rs"]
mod scenarios;

#[path = "integration/binding.rs"]
mod binding;

#[path = "integration/properties.rs"]
mod properties;
