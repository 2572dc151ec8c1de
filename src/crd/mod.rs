//! Custom Resource Definitions for the node template operator
//!
//! This module defines the `NodeTemplate` CRD whose selectors the operator resolves.

mod node_template;
pub mod types;

#[cfg(test)]
mod tests;

pub use node_template::{NodeTemplate, NodeTemplateSpec, NodeTemplateStatus};
pub use types::*;
