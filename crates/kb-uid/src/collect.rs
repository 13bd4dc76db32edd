//! UID discovery in serialized documents

use crate::uid::{UidError, UidPath};
use serde_yaml::Value;
use std::collections::BTreeSet;

/// Key under which serialized entity instances carry their UID
pub const UID_KEY: &str = "UID";

/// Collect every UID found under a [`UID_KEY`] key anywhere in `value`
///
/// # Errors
/// Returns [`UidError::Malformed`] on the first UID value that does not parse
pub fn collect_uids(value: &Value) -> Result<BTreeSet<UidPath>, UidError> {
    let mut out = BTreeSet::new();
    walk(value, &mut out)?;
    Ok(out)
}

fn walk(value: &Value, out: &mut BTreeSet<UidPath>) -> Result<(), UidError> {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                if key.as_str() == Some(UID_KEY) {
                    if let Some(raw) = child.as_str() {
                        out.insert(raw.parse()?);
                        continue;
                    }
                }
                walk(child, out)?;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                walk(item, out)?;
            }
        }
        Value::Tagged(tagged) => walk(&tagged.value, out)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_nested_uids() {
        let doc: Value = serde_yaml::from_str(
            r"
big-rock:
  BR1:
    UID: BR1
    big-rock: Rock one
    sub-rock:
      SR1:
        UID: BR1.SR1
        sub-rock: Pebble
      SR1-name: Pebble
  BR1-name: Rock one
  BR2:
    UID: BR2
",
        )
        .unwrap();
        let uids: Vec<String> = collect_uids(&doc)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(uids, vec!["BR1", "BR1.SR1", "BR2"]);
    }

    #[test]
    fn malformed_uid_is_an_error() {
        let doc: Value = serde_yaml::from_str("x:\n  UID: not-a-uid\n").unwrap();
        assert!(collect_uids(&doc).is_err());
    }
}
