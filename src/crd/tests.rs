//! Unit tests for the NodeTemplate CRD types

#[cfg(test)]
mod node_template_crd {
    use std::collections::BTreeMap;

    use kube::CustomResourceExt;

    use crate::crd::{NodeTemplate, NodeTemplateSpec, NodeTemplateStatus, SubnetStatus};
    use crate::record::ResolvedRecord;

    #[test]
    fn test_crd_metadata() {
        let crd = NodeTemplate::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("nodetemplates.compute.nodetemplate.io")
        );
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["nt".to_string()])
        );
    }

    #[test]
    fn test_spec_deserializes_camel_case_selectors() {
        let spec: NodeTemplateSpec = serde_json::from_value(serde_json::json!({
            "subnetSelector": {"env": "prod"},
            "securityGroupSelector": {"*": "*"}
        }))
        .unwrap();

        assert_eq!(spec.subnet_selector.get("env").map(String::as_str), Some("prod"));
        assert!(!spec.security_group_selector().is_empty());
    }

    #[test]
    fn test_missing_selectors_default_to_empty() {
        let spec: NodeTemplateSpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(spec.subnet_selector().is_empty());
        assert!(spec.security_group_selector().is_empty());
    }

    #[test]
    fn test_status_serializes_empty_lists() {
        let status = NodeTemplateStatus::default();
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["subnets"], serde_json::json!([]));
        assert_eq!(value["securityGroups"], serde_json::json!([]));
        assert!(value.get("conditions").is_none());
    }

    #[test]
    fn test_subnet_status_from_record() {
        let record = ResolvedRecord::new("subnet-1")
            .with_zone("us-west-2a")
            .with_tag("env", "prod");
        let status = SubnetStatus::from(&record);
        assert_eq!(status.id, "subnet-1");
        assert_eq!(status.zone.as_deref(), Some("us-west-2a"));

        let value = serde_json::to_value(SubnetStatus {
            id: "subnet-2".to_string(),
            zone: None,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"id": "subnet-2"}));
    }

    #[test]
    fn test_status_id_projections() {
        let mut selector = BTreeMap::new();
        selector.insert("*".to_string(), "*".to_string());
        let template = NodeTemplate::new(
            "default",
            NodeTemplateSpec {
                subnet_selector: selector.clone(),
                security_group_selector: selector,
            },
        );
        assert!(template.status.is_none());

        let status = NodeTemplateStatus {
            subnets: vec![SubnetStatus {
                id: "subnet-1".to_string(),
                zone: None,
            }],
            ..Default::default()
        };
        assert_eq!(status.subnet_ids(), vec!["subnet-1".to_string()]);
        assert!(status.security_group_ids().is_empty());
    }
}
