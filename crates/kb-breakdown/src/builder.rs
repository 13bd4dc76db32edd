//! Breakdown tree builder
//!
//! [`BreakdownBuilder::read_fragment`] is called once per (interval, row)
//! pair, intervals left to right within a row, rows top to bottom. Each call
//! either docks a new entity instance, enriches one, or does nothing.
//!
//! # Docking
//!
//! The docking point of a new instance is the nearest ancestor instance:
//! the closest non-blank ancestor entity column in the same row, or else
//! the ancestor seen in the most recent earlier row. The builder keeps the
//! last instance per entity type so this lookup needs no row scanning.

use crate::interval::Interval;
use crate::table::{base_name, Cell, Table};
use crate::tree::{BreakdownTree, EntityInstance};
use indexmap::IndexMap;
use kb_uid::{AcronymError, AcronymRegistry, UidError, UidGenerator, UidPath, UidStart};
use std::collections::HashMap;

/// How postings that carry UIDs are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UpdatePolicy {
    /// Reuse a UID found in the row's identifier column instead of generating one
    pub reuse_uids: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self { reuse_uids: true }
    }
}

/// Builder configuration
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Entity type at the document root; defaults to the leftmost entity column
    pub root_entity: Option<String>,
    /// UID prefix root instances dock under
    pub root_uid: Option<UidPath>,
    /// First counter for fresh UID scopes
    pub uid_start: UidStart,
    /// Treatment of supplied UIDs
    pub update_policy: UpdatePolicy,
}

#[derive(Debug, Clone)]
struct LastSeen {
    uid: UidPath,
    row: usize,
}

#[derive(Debug, Clone)]
enum DockingPoint {
    Root,
    Under(UidPath),
}

/// Incremental tree builder for one posting
///
/// Owns the single [`UidGenerator`] and [`AcronymRegistry`] of the tree graph
/// it builds; create a fresh builder per posting.
#[derive(Debug)]
pub struct BreakdownBuilder {
    config: BuildConfig,
    tree: Option<BreakdownTree>,
    uids: UidGenerator,
    acronyms: AcronymRegistry,
    /// Entity type -> column index, in discovery order
    entity_columns: IndexMap<String, usize>,
    last_seen: HashMap<String, LastSeen>,
    /// UID -> row number it was docked on in this build
    docked: HashMap<UidPath, usize>,
}

impl BreakdownBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        let uids = UidGenerator::with_start(config.uid_start);
        Self {
            config,
            tree: None,
            uids,
            acronyms: AcronymRegistry::new(),
            entity_columns: IndexMap::new(),
            last_seen: HashMap::new(),
            docked: HashMap::new(),
        }
    }

    /// Reserve UIDs of earlier document versions so new ones never collide
    pub fn reserve_uids<'a>(&mut self, uids: impl IntoIterator<Item = &'a UidPath>) {
        for uid in uids {
            self.uids.reserve(uid);
        }
    }

    /// Tree built so far
    #[must_use]
    pub fn tree(&self) -> Option<&BreakdownTree> {
        self.tree.as_ref()
    }

    /// Acronyms assigned so far
    #[must_use]
    pub fn acronyms(&self) -> &AcronymRegistry {
        &self.acronyms
    }

    /// Finish, returning the tree; `None` if no interval was ever read
    #[must_use]
    pub fn finish(self) -> Option<BreakdownTree> {
        self.tree
    }

    /// Root entity type
    fn root_entity(&self) -> Option<&str> {
        self.config.root_entity.as_deref().or_else(|| {
            self.entity_columns
                .iter()
                .min_by_key(|(_, col)| **col)
                .map(|(e, _)| e.as_str())
        })
    }

    /// Process one interval of one row
    ///
    /// Returns the UID of the instance created or enriched, `None` if the
    /// interval is blank in this row. The row may be rewritten when a blank
    /// entity name is carried forward from the previous row.
    ///
    /// # Errors
    /// Returns a [`BreakdownError`] describing the offending row and columns
    pub fn read_fragment(
        &mut self,
        interval: &Interval,
        table: &mut Table,
        row: usize,
    ) -> Result<Option<UidPath>, BreakdownError> {
        let entity = interval.entity_name().to_string();
        let entity_col = self.validate_interval(interval, table)?;

        let name_cell = table.cell(row, entity_col).clone();
        if !name_cell.is_blank() {
            return self.dock_new(interval, &entity, entity_col, table, row, &name_cell);
        }

        let non_blank: Vec<String> = interval
            .columns()
            .iter()
            .filter(|c| **c != entity)
            .filter(|c| table.get(row, c).is_some_and(|cell| !cell.is_blank()))
            .cloned()
            .collect();
        if non_blank.is_empty() {
            return Ok(None);
        }

        if self.can_carry_forward(&entity, entity_col, table, row) {
            return self.carry_forward(interval, &entity, entity_col, table, row);
        }

        Err(BreakdownError::EntityNameBlank {
            entity,
            columns: non_blank,
            row_number: table.row_number(row),
            source_range: table.source().to_string(),
        })
    }

    /// Read every row of `table`, intervals left to right within a row
    ///
    /// # Errors
    /// Stops at the first failing fragment
    pub fn read_table(
        &mut self,
        intervals: &[Interval],
        table: &mut Table,
    ) -> Result<(), BreakdownError> {
        for row in 0..table.len() {
            for interval in intervals {
                self.read_fragment(interval, table, row)?;
            }
        }
        tracing::debug!(rows = table.len(), intervals = intervals.len(), "table read");
        Ok(())
    }

    /// Per-call checks; returns the entity column index
    fn validate_interval(
        &mut self,
        interval: &Interval,
        table: &Table,
    ) -> Result<usize, BreakdownError> {
        let entity = interval.entity_name();
        let entity_base = base_name(entity);

        let same_header: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| base_name(c) == entity_base)
            .cloned()
            .collect();
        if same_header.len() > 1 {
            return Err(BreakdownError::DuplicateEntityColumn {
                entity: entity.to_string(),
                columns: same_header,
            });
        }

        for column in interval.property_columns() {
            let nested = self
                .entity_columns
                .keys()
                .find(|known| known.as_str() != entity && base_name(known) == base_name(column));
            if let Some(known) = nested {
                return Err(BreakdownError::EntityInsideInterval {
                    entity: entity.to_string(),
                    nested: known.clone(),
                });
            }
        }

        let entity_col = table
            .column_index(entity)
            .ok_or_else(|| BreakdownError::MissingColumn {
                column: entity.to_string(),
            })?;
        self.entity_columns.entry(entity.to_string()).or_insert(entity_col);

        if self.tree.is_none() && self.root_entity() == Some(entity) {
            self.tree = Some(BreakdownTree::new(entity, self.config.root_uid.clone()));
        }
        Ok(entity_col)
    }

    fn dock_new(
        &mut self,
        interval: &Interval,
        entity: &str,
        entity_col: usize,
        table: &Table,
        row: usize,
        name_cell: &Cell,
    ) -> Result<Option<UidPath>, BreakdownError> {
        let docking = self.docking_point(entity, entity_col, table, row)?;

        let supplied = if self.config.update_policy.reuse_uids {
            supplied_uid(interval, table, row)?
        } else {
            None
        };

        let mut instance_props = Vec::new();
        for column in interval.property_columns() {
            let value = table.get(row, column).map(Cell::clean).unwrap_or_default();
            instance_props.push((base_name(column).to_string(), value));
        }

        let uid = self.dock(
            entity,
            &docking,
            name_cell.clean().display(),
            instance_props,
            supplied,
            table.row_number(row),
        )?;
        self.last_seen.insert(
            entity.to_string(),
            LastSeen {
                uid: uid.clone(),
                row,
            },
        );
        Ok(Some(uid))
    }

    fn docking_point(
        &self,
        entity: &str,
        entity_col: usize,
        table: &Table,
        row: usize,
    ) -> Result<DockingPoint, BreakdownError> {
        let mut ancestors: Vec<(&String, usize)> = self
            .entity_columns
            .iter()
            .filter(|(_, col)| **col < entity_col)
            .map(|(e, col)| (e, *col))
            .collect();
        ancestors.sort_by(|a, b| b.1.cmp(&a.1));

        // Nearest non-blank ancestor in this row
        for (ancestor, col) in &ancestors {
            if !table.cell(row, *col).is_blank() {
                if let Some(seen) = self.last_seen.get(*ancestor) {
                    return Ok(DockingPoint::Under(seen.uid.clone()));
                }
            }
        }

        // Otherwise the ancestor instance from the most recent earlier row
        let latest = ancestors
            .iter()
            .filter_map(|(ancestor, col)| {
                self.last_seen
                    .get(*ancestor)
                    .map(|seen| (seen.row, *col, &seen.uid))
            })
            .max_by_key(|(seen_row, col, _)| (*seen_row, *col));
        if let Some((_, _, uid)) = latest {
            return Ok(DockingPoint::Under(uid.clone()));
        }

        if self.root_entity() == Some(entity) {
            return Ok(DockingPoint::Root);
        }

        Err(BreakdownError::NoDockingAncestor {
            entity: entity.to_string(),
            blank_columns: ancestors.iter().rev().map(|(e, _)| (*e).clone()).collect(),
            first_row: table.row_number(0),
            last_row: table.row_number(row),
            source_range: table.source().to_string(),
        })
    }

    /// Attach a new instance at `docking`
    ///
    /// A supplied UID is used as is and may appear only once per build;
    /// otherwise a fresh UID is generated.
    fn dock(
        &mut self,
        entity: &str,
        docking: &DockingPoint,
        name: String,
        properties: Vec<(String, Cell)>,
        supplied: Option<UidPath>,
        row_number: usize,
    ) -> Result<UidPath, BreakdownError> {
        let parent_uid = match docking {
            DockingPoint::Root => self.config.root_uid.clone(),
            DockingPoint::Under(uid) => Some(uid.clone()),
        };

        let uid = match supplied {
            Some(uid) => {
                if let Some(&first_row) = self.docked.get(&uid) {
                    return Err(BreakdownError::DuplicateUid {
                        uid: uid.to_string(),
                        first_row,
                        row_number,
                    });
                }
                self.acronyms.claim(entity, uid.leaf().acronym())?;
                if uid.parent() != parent_uid {
                    return Err(BreakdownError::UidParentMismatch {
                        uid: uid.to_string(),
                        expected_parent: parent_uid
                            .as_ref()
                            .map_or_else(|| "<document root>".to_string(), ToString::to_string),
                        row_number,
                    });
                }
                self.uids.reserve(&uid);
                uid
            }
            None => {
                let acronym = self.acronyms.assign(entity)?;
                self.uids.generate(&acronym, parent_uid.as_ref())?.0
            }
        };

        let mut instance = EntityInstance::new(entity, name, uid.clone());
        for (property, value) in properties {
            instance.set_scalar(property, value);
        }

        let target = match docking {
            DockingPoint::Root => {
                let tree = self
                    .tree
                    .get_or_insert_with(|| BreakdownTree::new(entity, parent_uid.clone()));
                if tree.entity_type() != entity {
                    return Err(BreakdownError::RootEntityMismatch {
                        expected: tree.entity_type().to_string(),
                        actual: entity.to_string(),
                    });
                }
                tree
            }
            DockingPoint::Under(parent) => self
                .tree
                .as_mut()
                .and_then(|t| t.find_mut(parent))
                .ok_or_else(|| BreakdownError::DockingPointNotFound {
                    uid: parent.to_string(),
                })?
                .breakdown_mut(entity),
        };

        target.insert(instance);
        self.docked.insert(uid.clone(), row_number);
        Ok(uid)
    }

    /// Previous row names this entity and is blank to the right of it
    fn can_carry_forward(&self, entity: &str, entity_col: usize, table: &Table, row: usize) -> bool {
        if row == 0 {
            return false;
        }
        let prev = row - 1;
        let docked_in_prev = self
            .last_seen
            .get(entity)
            .is_some_and(|seen| seen.row == prev);
        docked_in_prev
            && !table.cell(prev, entity_col).is_blank()
            && (entity_col + 1..table.columns().len()).all(|c| table.cell(prev, c).is_blank())
    }

    /// Reuse the previous row's instance for a row that omitted its name
    fn carry_forward(
        &mut self,
        interval: &Interval,
        entity: &str,
        entity_col: usize,
        table: &mut Table,
        row: usize,
    ) -> Result<Option<UidPath>, BreakdownError> {
        let carried = table.cell(row - 1, entity_col).clone();
        table.set_cell(row, entity_col, carried.clone());

        let seen = self
            .last_seen
            .get_mut(entity)
            .ok_or_else(|| BreakdownError::DockingPointNotFound {
                uid: entity.to_string(),
            })?;
        seen.row = row;
        let uid = seen.uid.clone();

        let instance = self
            .tree
            .as_mut()
            .and_then(|t| t.find_mut(&uid))
            .ok_or_else(|| BreakdownError::DockingPointNotFound {
                uid: uid.to_string(),
            })?;
        for column in interval.property_columns() {
            if let Some(cell) = table.get(row, column).filter(|c| !c.is_blank()) {
                instance.set_scalar(base_name(column), cell.clean());
            }
        }

        tracing::warn!(
            entity,
            name = %carried,
            row = table.row_number(row),
            uid = %uid,
            "entity name left blank; carrying it forward from the previous row"
        );
        Ok(Some(uid))
    }
}

/// First non-blank identifier cell of the interval, parsed
fn supplied_uid(
    interval: &Interval,
    table: &Table,
    row: usize,
) -> Result<Option<UidPath>, BreakdownError> {
    for column in interval.uid_columns() {
        if let Some(cell) = table.get(row, column).filter(|c| !c.is_blank()) {
            let uid = cell
                .display()
                .parse::<UidPath>()
                .map_err(|source| BreakdownError::InvalidUid {
                    column: column.to_string(),
                    row_number: table.row_number(row),
                    source,
                })?;
            return Ok(Some(uid));
        }
    }
    Ok(None)
}

/// Errors while building a breakdown tree
///
/// Most variants point at data the end user can fix in the posting; see
/// [`BreakdownError::is_user_error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum BreakdownError {
    /// Entity header appears more than once in the table
    #[error("entity '{entity}' appears in more than one column {columns:?}; keep a single '{entity}' column")]
    DuplicateEntityColumn { entity: String, columns: Vec<String> },

    /// Another entity type's column sits inside this interval
    #[error("entity '{nested}' appears inside the columns of entity '{entity}'; move it to its own range")]
    EntityInsideInterval { entity: String, nested: String },

    /// Data without an entity name
    #[error("row {row_number} of {source_range} has data in {columns:?} but no '{entity}'; fill in '{entity}' or narrow the posting range to exclude that row")]
    EntityNameBlank {
        entity: String,
        columns: Vec<String>,
        row_number: usize,
        source_range: String,
    },

    /// No ancestor instance to dock under
    #[error("cannot place '{entity}' on row {last_row} of {source_range}: columns {blank_columns:?} are blank on rows {first_row} to {last_row}; fill in a parent entity")]
    NoDockingAncestor {
        entity: String,
        blank_columns: Vec<String>,
        first_row: usize,
        last_row: usize,
        source_range: String,
    },

    /// Supplied UID would move the instance to another parent
    #[error("UID '{uid}' on row {row_number} does not belong under '{expected_parent}'")]
    UidParentMismatch {
        uid: String,
        expected_parent: String,
        row_number: usize,
    },

    /// Identifier cell does not parse
    #[error("invalid UID in column '{column}' on row {row_number}: {source}")]
    InvalidUid {
        column: String,
        row_number: usize,
        #[source]
        source: UidError,
    },

    /// Acronym conflict
    #[error(transparent)]
    Acronym(#[from] AcronymError),

    /// UID generation failure
    #[error(transparent)]
    Uid(#[from] UidError),

    /// Interval entity column absent from the table
    #[error("column '{column}' is not in the table")]
    MissingColumn { column: String },

    /// Same UID supplied on two rows of one posting
    #[error("UID '{uid}' on row {row_number} was already used on row {first_row}; each UID may appear on one row only")]
    DuplicateUid {
        uid: String,
        first_row: usize,
        row_number: usize,
    },

    /// Docking UID not present in the tree
    #[error("docking point '{uid}' not found in the tree")]
    DockingPointNotFound { uid: String },

    /// Root tree already holds a different entity type
    #[error("document root holds '{expected}' but '{actual}' tried to dock there")]
    RootEntityMismatch { expected: String, actual: String },
}

impl BreakdownError {
    /// True for errors caused by posted data rather than by the caller
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Uid(e) => matches!(e, UidError::CounterExhausted { .. }),
            Self::MissingColumn { .. } | Self::DockingPointNotFound { .. } => false,
            _ => true,
        }
    }
}
