// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reference discovery and resolution inside property documents
//!
//! Three forms point at another node:
//!
//! ```text
//! { "Ref": "Node" }
//! { "Fn::GetAtt": ["Node", "Attribute"] }
//! { "Fn::Sub": "...${Node}...${Node.Attribute}..." }
//! ```
//!
//! Names starting with `AWS::` are engine pseudo parameters, not nodes.
//! Every other intrinsic is passed through to the engine untouched.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::node::NodeId;

const PSEUDO_PREFIX: &str = "AWS::";

/// A reference to a node output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    /// `None` for the primary identifier
    pub attribute: Option<String>,
}

/// Collect the nodes referenced anywhere in `value`
pub fn referenced_nodes(value: &Value) -> BTreeSet<NodeId> {
    let mut found = BTreeSet::new();
    collect(value, &mut found);
    found.into_iter().map(|r| r.node).collect()
}

fn collect(value: &Value, found: &mut BTreeSet<OutputRef>) {
    match value {
        Value::Object(map) => {
            if let Some(target) = as_ref(map) {
                found.insert(target);
                return;
            }
            if let Some(target) = as_get_att(map) {
                found.insert(target);
                return;
            }
            if let Some((template, variables)) = as_sub(map) {
                for target in sub_placeholders(template) {
                    if !variables.is_some_and(|vars| vars.contains_key(target.node.as_str())) {
                        found.insert(target);
                    }
                }
                if let Some(vars) = variables {
                    for nested in vars.values() {
                        collect(nested, found);
                    }
                }
                return;
            }
            for nested in map.values() {
                collect(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

fn as_ref(map: &Map<String, Value>) -> Option<OutputRef> {
    if map.len() != 1 {
        return None;
    }
    let name = map.get("Ref")?.as_str()?;
    if name.starts_with(PSEUDO_PREFIX) {
        return None;
    }
    Some(OutputRef {
        node: NodeId::from_logical(name),
        attribute: None,
    })
}

fn as_get_att(map: &Map<String, Value>) -> Option<OutputRef> {
    if map.len() != 1 {
        return None;
    }
    let parts = map.get("Fn::GetAtt")?.as_array()?;
    match parts.as_slice() {
        [node, attribute] => Some(OutputRef {
            node: NodeId::from_logical(node.as_str()?),
            attribute: Some(attribute.as_str()?.to_string()),
        }),
        _ => None,
    }
}

fn as_sub(map: &Map<String, Value>) -> Option<(&str, Option<&Map<String, Value>>)> {
    if map.len() != 1 {
        return None;
    }
    match map.get("Fn::Sub")? {
        Value::String(template) => Some((template.as_str(), None)),
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(template), Value::Object(vars)] => Some((template.as_str(), Some(vars))),
            _ => None,
        },
        _ => None,
    }
}

fn sub_placeholders(template: &str) -> Vec<OutputRef> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        let name = &after[..end];
        rest = &after[end + 1..];

        // `${!Literal}` is an escaped literal
        if name.is_empty() || name.starts_with('!') || name.starts_with(PSEUDO_PREFIX) {
            continue;
        }
        let (node, attribute) = match name.split_once('.') {
            Some((node, attribute)) => (node, Some(attribute.to_string())),
            None => (name, None),
        };
        refs.push(OutputRef {
            node: NodeId::from_logical(node),
            attribute,
        });
    }
    refs
}

/// Replace every node reference in `value` with the value `lookup` yields
///
/// Returns the first reference `lookup` cannot satisfy.
pub fn resolve<F>(value: &Value, lookup: &F) -> Result<Value, OutputRef>
where
    F: Fn(&OutputRef) -> Option<String>,
{
    match value {
        Value::Object(map) => {
            if let Some(target) = as_ref(map).or_else(|| as_get_att(map)) {
                return lookup(&target).map(Value::String).ok_or(target);
            }
            if let Some((template, variables)) = as_sub(map) {
                return resolve_sub(template, variables, lookup);
            }
            let mut resolved = Map::with_capacity(map.len());
            for (key, nested) in map {
                resolved.insert(key.clone(), resolve(nested, lookup)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_sub<F>(
    template: &str,
    variables: Option<&Map<String, Value>>,
    lookup: &F,
) -> Result<Value, OutputRef>
where
    F: Fn(&OutputRef) -> Option<String>,
{
    let mut rendered = template.to_string();
    let mut remaining_vars = Map::new();

    if let Some(vars) = variables {
        for (name, raw) in vars {
            match resolve(raw, lookup)? {
                Value::String(text) => {
                    rendered = rendered.replace(&format!("${{{}}}", name), &text);
                }
                other => {
                    remaining_vars.insert(name.clone(), other);
                }
            }
        }
    }

    for target in sub_placeholders(template) {
        if remaining_vars.contains_key(target.node.as_str()) {
            continue;
        }
        if variables.is_some_and(|vars| vars.contains_key(target.node.as_str())) {
            continue;
        }
        let text = lookup(&target).ok_or_else(|| target.clone())?;
        let placeholder = match &target.attribute {
            Some(attribute) => format!("${{{}.{}}}", target.node, attribute),
            None => format!("${{{}}}", target.node),
        };
        rendered = rendered.replace(&placeholder, &text);
    }

    if remaining_vars.is_empty() {
        Ok(serde_json::json!({ "Fn::Sub": rendered }))
    } else {
        Ok(serde_json::json!({ "Fn::Sub": [rendered, Value::Object(remaining_vars)] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(value: &Value) -> Vec<String> {
        referenced_nodes(value)
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_ref_and_get_att() {
        let props = json!({
            "VpcId": { "Ref": "Vpc" },
            "SecurityGroupIds": [{ "Fn::GetAtt": ["Group", "GroupId"] }],
            "Region": { "Ref": "AWS::Region" },
        });
        assert_eq!(ids(&props), vec!["Group", "Vpc"]);
    }

    #[test]
    fn test_sub_placeholders() {
        let props = json!({
            "Arn": { "Fn::Sub": "arn:${AWS::Partition}:ec2:${AWS::Region}:${AWS::AccountId}:vpn-gateway/${Gateway}" },
            "Other": { "Fn::Sub": "${Instance.PrivateIp} ${!Literal}" },
        });
        assert_eq!(ids(&props), vec!["Gateway", "Instance"]);
    }

    #[test]
    fn test_sub_variables_are_not_nodes() {
        let props = json!({
            "Fn::Sub": ["${Name}-${Vpc}", { "Name": { "Ref": "Tagger" } }]
        });
        assert_eq!(ids(&props), vec!["Tagger", "Vpc"]);
    }

    #[test]
    fn test_nested_intrinsics_are_walked() {
        let props = json!({
            "CidrBlock": { "Fn::Select": [0, { "Fn::Cidr": [{ "Fn::GetAtt": ["Vpc", "CidrBlock"] }, 4, 12] }] }
        });
        assert_eq!(ids(&props), vec!["Vpc"]);
    }

    #[test]
    fn test_resolve() {
        let props = json!({
            "VpcId": { "Ref": "Vpc" },
            "Ip": { "Fn::GetAtt": ["Router", "PublicIp"] },
            "Arn": { "Fn::Sub": "arn:${AWS::Partition}:ec2:::customer-gateway/${Gateway}" },
            "Zone": { "Ref": "AWS::Region" },
        });
        let lookup = |r: &OutputRef| match (r.node.as_str(), r.attribute.as_deref()) {
            ("Vpc", None) => Some("vpc-123".to_string()),
            ("Router", Some("PublicIp")) => Some("203.0.113.10".to_string()),
            ("Gateway", None) => Some("cgw-9".to_string()),
            _ => None,
        };

        let resolved = resolve(&props, &lookup).unwrap();
        assert_eq!(resolved["VpcId"], "vpc-123");
        assert_eq!(resolved["Ip"], "203.0.113.10");
        assert_eq!(
            resolved["Arn"],
            json!({ "Fn::Sub": "arn:${AWS::Partition}:ec2:::customer-gateway/cgw-9" })
        );
        assert_eq!(resolved["Zone"], json!({ "Ref": "AWS::Region" }));
    }

    #[test]
    fn test_resolve_reports_missing() {
        let props = json!({ "VpnConnectionId": { "Fn::GetAtt": ["Vpn", "VpnConnection.VpnConnectionId"] } });
        let missing = resolve(&props, &|_: &OutputRef| None).unwrap_err();
        assert_eq!(missing.node.as_str(), "Vpn");
        assert_eq!(missing.attribute.as_deref(), Some("VpnConnection.VpnConnectionId"));
    }
}
