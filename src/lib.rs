//! node-template-operator: resolves cloud network resources for NodeTemplates
//!
//! This crate provides a Kubernetes operator that watches cluster-scoped
//! NodeTemplate resources, resolves their subnet and security group selectors
//! against a cloud inventory API and records the matching IDs in the status.

pub mod cloud;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod providers;
pub mod record;
pub mod selector;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
