//! Breakdown trees
//!
//! A [`BreakdownTree`] is the 1:N projection of one entity type under one
//! docking UID. Its [`EntityInstance`]s own further trees, one per child
//! entity type, so a document is a single owned tree rooted at the global
//! breakdown.

use crate::serialize::yaml_field_name;
use crate::table::Cell;
use indexmap::IndexMap;
use kb_uid::{UidPath, UidSegment};
use std::collections::BTreeMap;

/// One occurrence of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    entity_type: String,
    name: String,
    uid: UidPath,
    scalar_children: IndexMap<String, Cell>,
    breakdown_children: IndexMap<String, BreakdownTree>,
}

impl EntityInstance {
    /// Create an instance with no properties or children
    #[must_use]
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>, uid: UidPath) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            uid,
            scalar_children: IndexMap::new(),
            breakdown_children: IndexMap::new(),
        }
    }

    /// Entity type this instance belongs to
    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Display label
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full UID
    #[inline]
    #[must_use]
    pub fn uid(&self) -> &UidPath {
        &self.uid
    }

    /// Last segment of the UID
    #[inline]
    #[must_use]
    pub fn leaf_uid(&self) -> &UidSegment {
        self.uid.leaf()
    }

    /// Property name -> cleaned value, in column order
    #[inline]
    #[must_use]
    pub fn scalar_children(&self) -> &IndexMap<String, Cell> {
        &self.scalar_children
    }

    /// Child entity type -> tree of children of that type
    #[inline]
    #[must_use]
    pub fn breakdown_children(&self) -> &IndexMap<String, BreakdownTree> {
        &self.breakdown_children
    }

    /// Property value
    #[must_use]
    pub fn scalar(&self, property: &str) -> Option<&Cell> {
        self.scalar_children.get(property)
    }

    /// Set a property, keeping the position of an existing key
    pub fn set_scalar(&mut self, property: impl Into<String>, value: Cell) {
        self.scalar_children.insert(property.into(), value);
    }

    /// Tree of children of `entity_type`
    #[must_use]
    pub fn breakdown(&self, entity_type: &str) -> Option<&BreakdownTree> {
        self.breakdown_children.get(entity_type)
    }

    /// Tree of children of `entity_type`, created empty on first use
    pub fn breakdown_mut(&mut self, entity_type: &str) -> &mut BreakdownTree {
        let uid = self.uid.clone();
        self.breakdown_children
            .entry(entity_type.to_string())
            .or_insert_with(|| BreakdownTree::new(entity_type, Some(uid)))
    }
}

/// Instances of one entity type docked under one parent UID
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownTree {
    entity_type: String,
    parent_uid: Option<UidPath>,
    children: IndexMap<String, EntityInstance>,
}

impl BreakdownTree {
    /// Create an empty tree
    #[must_use]
    pub fn new(entity_type: impl Into<String>, parent_uid: Option<UidPath>) -> Self {
        Self {
            entity_type: entity_type.into(),
            parent_uid,
            children: IndexMap::new(),
        }
    }

    /// Entity type of every child
    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Docking point; `None` at the document root
    #[inline]
    #[must_use]
    pub fn parent_uid(&self) -> Option<&UidPath> {
        self.parent_uid.as_ref()
    }

    /// Children keyed by leaf UID, in docking order
    #[inline]
    #[must_use]
    pub fn children(&self) -> &IndexMap<String, EntityInstance> {
        &self.children
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if nothing is docked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Dock `instance`, replacing any instance with the same leaf UID
    ///
    /// Returns the replaced instance.
    pub fn insert(&mut self, instance: EntityInstance) -> Option<EntityInstance> {
        let key = instance.leaf_uid().to_string();
        self.children.insert(key, instance)
    }

    /// Find an instance anywhere below this tree by full UID
    #[must_use]
    pub fn find(&self, uid: &UidPath) -> Option<&EntityInstance> {
        let segments = self.relative_segments(uid)?;
        find_in(self, segments)
    }

    /// Mutable variant of [`BreakdownTree::find`]
    pub fn find_mut(&mut self, uid: &UidPath) -> Option<&mut EntityInstance> {
        let segments = self.relative_segments(uid)?.to_vec();
        find_in_mut(self, &segments)
    }

    fn relative_segments<'a>(&self, uid: &'a UidPath) -> Option<&'a [UidSegment]> {
        match &self.parent_uid {
            Some(parent) => uid.relative_to(parent).ok(),
            None => Some(uid.segments()),
        }
    }

    /// Every UID in the tree, depth first
    #[must_use]
    pub fn uids(&self) -> Vec<UidPath> {
        let mut out = Vec::new();
        self.visit(&mut |inst| out.push(inst.uid.clone()));
        out
    }

    /// Flat view of every instance, with YAML-formatted field names
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatInstance> {
        let mut out = Vec::new();
        self.visit(&mut |inst| {
            out.push(FlatInstance {
                uid: inst.uid.clone(),
                entity: yaml_field_name(&inst.entity_type),
                name: inst.name.clone(),
                scalars: inst
                    .scalar_children
                    .iter()
                    .map(|(k, v)| (yaml_field_name(k), v.clean()))
                    .collect(),
            });
        });
        out
    }

    fn visit(&self, f: &mut impl FnMut(&EntityInstance)) {
        for inst in self.children.values() {
            f(inst);
            for child in inst.breakdown_children.values() {
                child.visit(f);
            }
        }
    }
}

fn find_in<'a>(tree: &'a BreakdownTree, segments: &[UidSegment]) -> Option<&'a EntityInstance> {
    let (first, rest) = segments.split_first()?;
    let inst = tree.children.get(&first.to_string())?;
    let Some(next) = rest.first() else {
        return Some(inst);
    };
    let key = next.to_string();
    let child = inst
        .breakdown_children
        .values()
        .find(|t| t.children.contains_key(&key))?;
    find_in(child, rest)
}

fn find_in_mut<'a>(
    tree: &'a mut BreakdownTree,
    segments: &[UidSegment],
) -> Option<&'a mut EntityInstance> {
    let (first, rest) = segments.split_first()?;
    let inst = tree.children.get_mut(&first.to_string())?;
    let Some(next) = rest.first() else {
        return Some(inst);
    };
    let key = next.to_string();
    let child = inst
        .breakdown_children
        .values_mut()
        .find(|t| t.children.contains_key(&key))?;
    find_in_mut(child, rest)
}

/// Comparable summary of one instance
#[derive(Debug, Clone, PartialEq)]
pub struct FlatInstance {
    /// Full UID
    pub uid: UidPath,
    /// YAML field name of the entity type
    pub entity: String,
    /// Display label
    pub name: String,
    /// YAML field name -> value
    pub scalars: BTreeMap<String, Cell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UidPath {
        s.parse().unwrap()
    }

    fn sample() -> BreakdownTree {
        let mut root = BreakdownTree::new("Big Rock", None);
        let mut br1 = EntityInstance::new("Big Rock", "Rock one", uid("BR1"));
        br1.set_scalar("Effort", Cell::Integer(3));
        br1.breakdown_mut("Sub Rock")
            .insert(EntityInstance::new("Sub Rock", "Pebble", uid("BR1.SR1")));
        root.insert(br1);
        root.insert(EntityInstance::new("Big Rock", "Rock two", uid("BR2")));
        root
    }

    #[test]
    fn find_by_full_uid() {
        let tree = sample();
        assert_eq!(tree.find(&uid("BR1.SR1")).unwrap().name(), "Pebble");
        assert_eq!(tree.find(&uid("BR2")).unwrap().name(), "Rock two");
        assert!(tree.find(&uid("BR1.SR2")).is_none());
        assert!(tree.find(&uid("BR3")).is_none());
    }

    #[test]
    fn find_mut_allows_property_updates() {
        let mut tree = sample();
        tree.find_mut(&uid("BR1.SR1"))
            .unwrap()
            .set_scalar("Size", Cell::from("small"));
        assert_eq!(
            tree.find(&uid("BR1.SR1")).unwrap().scalar("Size"),
            Some(&Cell::from("small"))
        );
    }

    #[test]
    fn child_trees_dock_at_parent_uid() {
        let tree = sample();
        let sub = tree.find(&uid("BR1")).unwrap().breakdown("Sub Rock").unwrap();
        assert_eq!(sub.parent_uid(), Some(&uid("BR1")));
        assert_eq!(sub.entity_type(), "Sub Rock");
    }

    #[test]
    fn insert_replaces_same_leaf() {
        let mut tree = sample();
        let old = tree.insert(EntityInstance::new("Big Rock", "Renamed", uid("BR2")));
        assert_eq!(old.unwrap().name(), "Rock two");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.find(&uid("BR2")).unwrap().name(), "Renamed");
    }

    #[test]
    fn uids_depth_first() {
        let got: Vec<String> = sample().uids().iter().map(ToString::to_string).collect();
        assert_eq!(got, vec!["BR1", "BR1.SR1", "BR2"]);
    }

    #[test]
    fn find_under_prefixed_root() {
        let mut root = BreakdownTree::new("Workstream", Some(uid("P1")));
        root.insert(EntityInstance::new("Workstream", "W", uid("P1.W1")));
        assert!(root.find(&uid("P1.W1")).is_some());
        assert!(root.find(&uid("W1")).is_none());
    }
}
