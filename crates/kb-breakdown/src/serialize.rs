//! Tree serialization
//!
//! Converts a [`BreakdownTree`] to the nested YAML mapping stored in
//! manifests, and parses such a mapping back.
//!
//! ```yaml
//! BR1:
//!   UID: BR1
//!   big-rock: Rock one
//!   effort: 3
//!   sub-rock:
//!     SR1:
//!       UID: BR1.SR1
//!       sub-rock: Pebble
//!     SR1-name: Pebble
//! BR1-name: Rock one
//! ```

use crate::table::Cell;
use crate::tree::{BreakdownTree, EntityInstance};
use kb_uid::{UidError, UidPath, UID_KEY};
use serde_yaml::{Mapping, Value};

/// Suffix of the convenience `<leaf uid>-name` keys
pub const NAME_SUFFIX: &str = "-name";

/// Field name for a header: trimmed, lowercase, whitespace runs as `-`
#[must_use]
pub fn yaml_field_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Serialize a tree: leaf UID -> instance mapping, plus `<leaf>-name` -> name
#[must_use]
pub fn to_nested_mapping(tree: &BreakdownTree) -> Mapping {
    let mut out = Mapping::new();
    for (leaf, inst) in tree.children() {
        out.insert(Value::String(leaf.clone()), Value::Mapping(instance_mapping(inst)));
        out.insert(
            Value::String(format!("{leaf}{NAME_SUFFIX}")),
            Value::String(inst.name().to_string()),
        );
    }
    out
}

fn instance_mapping(inst: &EntityInstance) -> Mapping {
    let mut out = Mapping::new();
    out.insert(
        Value::String(UID_KEY.to_string()),
        Value::String(inst.uid().to_string()),
    );
    out.insert(
        Value::String(yaml_field_name(inst.entity_type())),
        Value::String(inst.name().to_string()),
    );
    for (property, value) in inst.scalar_children() {
        out.insert(Value::String(yaml_field_name(property)), value.to_yaml());
    }
    for (entity_type, child) in inst.breakdown_children() {
        out.insert(
            Value::String(yaml_field_name(entity_type)),
            Value::Mapping(to_nested_mapping(child)),
        );
    }
    out
}

/// Wrap a tree under its entity field: `{ big-rock: { BR1: ..., ... } }`
#[must_use]
pub fn to_document(tree: &BreakdownTree) -> Mapping {
    let mut out = Mapping::new();
    out.insert(
        Value::String(yaml_field_name(tree.entity_type())),
        Value::Mapping(to_nested_mapping(tree)),
    );
    out
}

/// Parse a tree serialized by [`to_nested_mapping`]
///
/// Entity types of the parsed tree are the YAML field names.
///
/// # Errors
/// Returns error if the mapping is not shaped like a serialized tree
pub fn from_nested_mapping(
    entity_field: &str,
    parent_uid: Option<UidPath>,
    mapping: &Mapping,
) -> Result<BreakdownTree, SerializeError> {
    let mut tree = BreakdownTree::new(entity_field, parent_uid.clone());
    for (key, value) in mapping {
        let key = key_str(key)?;
        match value {
            Value::Mapping(body) => {
                let inst = instance_from_mapping(entity_field, parent_uid.as_ref(), key, body)?;
                tree.insert(inst);
            }
            _ if key.ends_with(NAME_SUFFIX) => {}
            _ => {
                return Err(SerializeError::UnexpectedValue {
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(tree)
}

/// Parse the tree stored under `entity_field` of a document
///
/// # Errors
/// Returns error if the field is missing or malformed
pub fn from_document(
    document: &Mapping,
    entity_field: &str,
    root_uid: Option<UidPath>,
) -> Result<BreakdownTree, SerializeError> {
    match document.get(entity_field) {
        Some(Value::Mapping(body)) => from_nested_mapping(entity_field, root_uid, body),
        _ => Err(SerializeError::MissingField {
            field: entity_field.to_string(),
        }),
    }
}

fn instance_from_mapping(
    entity_field: &str,
    parent_uid: Option<&UidPath>,
    leaf: &str,
    body: &Mapping,
) -> Result<EntityInstance, SerializeError> {
    let uid: UidPath = match body.get(UID_KEY) {
        Some(Value::String(raw)) => raw.parse()?,
        _ => {
            return Err(SerializeError::MissingField {
                field: format!("{leaf}.{UID_KEY}"),
            })
        }
    };
    if uid.leaf().to_string() != leaf || uid.parent().as_ref() != parent_uid {
        return Err(SerializeError::UidMismatch {
            key: leaf.to_string(),
            uid: uid.to_string(),
        });
    }

    let name = body
        .get(entity_field)
        .and_then(Cell::from_yaml)
        .map(|c| c.display())
        .unwrap_or_default();
    let mut inst = EntityInstance::new(entity_field, name, uid.clone());

    for (key, value) in body {
        let key = key_str(key)?;
        if key == UID_KEY || key == entity_field {
            continue;
        }
        match value {
            Value::Mapping(child) => {
                let tree = from_nested_mapping(key, Some(uid.clone()), child)?;
                let slot = inst.breakdown_mut(key);
                for (_, child_inst) in tree.children() {
                    slot.insert(child_inst.clone());
                }
            }
            other => {
                let cell = Cell::from_yaml(other).ok_or_else(|| SerializeError::UnexpectedValue {
                    key: key.to_string(),
                })?;
                inst.set_scalar(key, cell);
            }
        }
    }
    Ok(inst)
}

fn key_str(key: &Value) -> Result<&str, SerializeError> {
    key.as_str().ok_or_else(|| SerializeError::NonStringKey {
        key: format!("{key:?}"),
    })
}

/// Errors related to tree (de)serialization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum SerializeError {
    /// Mapping key is not a string
    #[error("non-string key {key}")]
    NonStringKey { key: String },

    /// Required field absent
    #[error("missing field '{field}'")]
    MissingField { field: String },

    /// Value has the wrong shape
    #[error("unexpected value under '{key}'")]
    UnexpectedValue { key: String },

    /// Instance key and UID disagree
    #[error("instance '{key}' carries UID '{uid}' that does not match its position")]
    UidMismatch { key: String, uid: String },

    /// Unparseable UID
    #[error(transparent)]
    Uid(#[from] UidError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uid(s: &str) -> UidPath {
        s.parse().unwrap()
    }

    fn sample() -> BreakdownTree {
        let mut root = BreakdownTree::new("Big Rock", None);
        let mut br1 = EntityInstance::new("Big Rock", "Rock one", uid("BR1"));
        br1.set_scalar("Effort", Cell::Integer(3));
        br1.set_scalar("Owner Name", Cell::Blank);
        let mut sr1 = EntityInstance::new("Sub Rock", "Pebble", uid("BR1.SR1"));
        sr1.set_scalar("Done", Cell::Bool(true));
        br1.breakdown_mut("Sub Rock").insert(sr1);
        root.insert(br1);
        root
    }

    #[test]
    fn field_names() {
        assert_eq!(yaml_field_name("Big Rock"), "big-rock");
        assert_eq!(yaml_field_name("  Owner   Name "), "owner-name");
    }

    #[test]
    fn nested_mapping_shape() {
        let doc = Value::Mapping(to_document(&sample()));
        let expected: Value = serde_yaml::from_str(
            r"
big-rock:
  BR1:
    UID: BR1
    big-rock: Rock one
    effort: 3
    owner-name: ''
    sub-rock:
      SR1:
        UID: BR1.SR1
        sub-rock: Pebble
        done: true
      SR1-name: Pebble
  BR1-name: Rock one
",
        )
        .unwrap();
        assert_eq!(doc, expected);
    }

    #[test]
    fn round_trip_preserves_content() {
        let tree = sample();
        let text = serde_yaml::to_string(&to_document(&tree)).unwrap();
        let parsed_doc: Mapping = serde_yaml::from_str(&text).unwrap();
        let back = from_document(&parsed_doc, "big-rock", None).unwrap();
        assert_eq!(back.flatten(), tree.flatten());
    }

    #[test]
    fn uid_position_mismatch_is_rejected() {
        let body: Mapping = serde_yaml::from_str("BR1:\n  UID: BR2\n").unwrap();
        assert!(matches!(
            from_nested_mapping("big-rock", None, &body),
            Err(SerializeError::UidMismatch { .. })
        ));
    }

    #[test]
    fn missing_document_field() {
        assert!(matches!(
            from_document(&Mapping::new(), "big-rock", None),
            Err(SerializeError::MissingField { .. })
        ));
    }
}
