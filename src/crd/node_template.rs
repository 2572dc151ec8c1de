//! NodeTemplate Custom Resource Definition
//!
//! A NodeTemplate describes, through tag or ID selectors, which subnets and
//! security groups nodes launched from it should use. The operator writes the
//! resolved IDs into the status.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, SecurityGroupStatus, SubnetStatus};
use crate::selector::Selector;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "compute.nodetemplate.io",
    version = "v1alpha1",
    kind = "NodeTemplate",
    status = "NodeTemplateStatus",
    shortname = "nt",
    printcolumn = r#"{"name":"Subnets","type":"integer","jsonPath":".status.subnets.length"}"#,
    printcolumn = r#"{"name":"SecurityGroups","type":"integer","jsonPath":".status.securityGroups.length"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplateSpec {
    /// Tag selector for subnets. `{"*": "*"}` selects every subnet,
    /// `{"aws-ids": "subnet-1,subnet-2"}` selects subnets by ID.
    #[serde(default)]
    pub subnet_selector: BTreeMap<String, String>,

    /// Tag selector for security groups, same syntax as `subnetSelector`
    #[serde(default)]
    pub security_group_selector: BTreeMap<String, String>,
}

impl NodeTemplateSpec {
    pub fn subnet_selector(&self) -> Selector {
        Selector::from(&self.subnet_selector)
    }

    pub fn security_group_selector(&self) -> Selector {
        Selector::from(&self.security_group_selector)
    }
}

/// Status subresource written by the operator
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplateStatus {
    /// Subnets matching `spec.subnetSelector`, sorted by ID
    #[serde(default)]
    pub subnets: Vec<SubnetStatus>,

    /// Security groups matching `spec.securityGroupSelector`, sorted by ID
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupStatus>,

    /// Generation last fully resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl NodeTemplateStatus {
    pub fn subnet_ids(&self) -> Vec<String> {
        self.subnets.iter().map(|s| s.id.clone()).collect()
    }

    pub fn security_group_ids(&self) -> Vec<String> {
        self.security_groups.iter().map(|s| s.id.clone()).collect()
    }
}
