//! Interval partitioning
//!
//! Splits a table's ordered columns (the "linear space") into contiguous
//! [`Interval`]s, one per nested entity type. The split policy is an
//! [`IntervalStrategy`], chosen per document kind.

use crate::table::{base_name, is_uid_column};

/// Contiguous run of columns describing one entity type
///
/// # Invariants
/// - Non-empty
/// - `entity_name` appears exactly once among the non-identifier columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    columns: Vec<String>,
    entity_name: String,
}

impl Interval {
    /// Create an interval whose entity is its first non-identifier column
    ///
    /// # Errors
    /// - [`IntervalError::Empty`] for an empty column list
    /// - [`IntervalError::NoEntityColumn`] if every column is an identifier
    pub fn new(columns: Vec<String>) -> Result<Self, IntervalError> {
        if columns.is_empty() {
            return Err(IntervalError::Empty);
        }
        let entity = columns
            .iter()
            .find(|c| !is_uid_column(c))
            .cloned()
            .ok_or_else(|| IntervalError::NoEntityColumn {
                columns: columns.clone(),
            })?;
        Self::with_entity(columns, entity)
    }

    /// Create an interval with an explicit entity column
    ///
    /// # Errors
    /// Returns error if the entity is absent or repeated
    pub fn with_entity(
        columns: Vec<String>,
        entity_name: impl Into<String>,
    ) -> Result<Self, IntervalError> {
        let entity_name = entity_name.into();
        if columns.is_empty() {
            return Err(IntervalError::Empty);
        }
        let occurrences = columns
            .iter()
            .filter(|c| !is_uid_column(c) && **c == entity_name)
            .count();
        match occurrences {
            1 => Ok(Self {
                columns,
                entity_name,
            }),
            0 => Err(IntervalError::EntityNotInInterval {
                entity: entity_name,
                columns,
            }),
            _ => Err(IntervalError::EntityRepeated {
                entity: entity_name,
            }),
        }
    }

    /// All columns, in table order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The entity-name column
    #[inline]
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Identifier columns
    pub fn uid_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| is_uid_column(c))
    }

    /// Property columns: everything except the entity and identifier columns
    pub fn property_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(move |c| *c != self.entity_name && !is_uid_column(c))
    }

    /// True if `column` belongs to this interval
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Policy for partitioning a linear space into intervals
pub trait IntervalStrategy {
    /// Partition `linear_space` into ordered, non-overlapping intervals
    ///
    /// # Errors
    /// Returns error if required columns are missing
    fn intervals(&self, linear_space: &[String]) -> Result<Vec<Interval>, IntervalError>;

    /// Strategy name, for logs
    fn name(&self) -> &'static str;
}

/// Whole linear space as a single entity
#[derive(Debug, Clone, Default)]
pub struct GreedyIntervals {
    mandatory_columns: Vec<String>,
}

impl GreedyIntervals {
    /// Create with the columns that must be present
    #[must_use]
    pub fn new(mandatory_columns: Vec<String>) -> Self {
        Self { mandatory_columns }
    }
}

impl IntervalStrategy for GreedyIntervals {
    fn intervals(&self, linear_space: &[String]) -> Result<Vec<Interval>, IntervalError> {
        check_mandatory(&self.mandatory_columns, linear_space)?;
        Ok(vec![Interval::new(linear_space.to_vec())?])
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

/// Each non-identifier column is its own entity
///
/// Identifier columns join the interval of the next non-identifier column;
/// trailing identifier columns join the last interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalistIntervals;

impl IntervalStrategy for MinimalistIntervals {
    fn intervals(&self, linear_space: &[String]) -> Result<Vec<Interval>, IntervalError> {
        check_mandatory(&[], linear_space)?;

        let mut out: Vec<Interval> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for col in linear_space {
            pending.push(col.clone());
            if !is_uid_column(col) {
                out.push(Interval::with_entity(std::mem::take(&mut pending), col.clone())?);
            }
        }

        if !pending.is_empty() {
            match out.pop() {
                Some(last) => {
                    let entity = last.entity_name.clone();
                    let mut columns = last.columns;
                    columns.extend(pending);
                    out.push(Interval::with_entity(columns, entity)?);
                }
                None => return Err(IntervalError::NoEntityColumn { columns: pending }),
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "minimalist"
    }
}

/// Explicit split points, each starting a new interval
///
/// An identifier column right before a split point moves into the interval
/// starting at that split point, keeping each UID aligned with its entity.
#[derive(Debug, Clone, Default)]
pub struct ClosedOpenIntervals {
    split_points: Vec<String>,
    mandatory_columns: Vec<String>,
}

impl ClosedOpenIntervals {
    /// Create from the columns that start each interval
    #[must_use]
    pub fn new(split_points: Vec<String>) -> Self {
        Self {
            split_points,
            mandatory_columns: Vec::new(),
        }
    }

    /// Require these columns to be present
    #[must_use]
    pub fn with_mandatory(mut self, mandatory_columns: Vec<String>) -> Self {
        self.mandatory_columns = mandatory_columns;
        self
    }

    /// Split points, in order
    #[must_use]
    pub fn split_points(&self) -> &[String] {
        &self.split_points
    }
}

impl IntervalStrategy for ClosedOpenIntervals {
    fn intervals(&self, linear_space: &[String]) -> Result<Vec<Interval>, IntervalError> {
        check_mandatory(&self.mandatory_columns, linear_space)?;

        let mut starts: Vec<usize> = vec![0];
        for split in &self.split_points {
            let idx = linear_space
                .iter()
                .position(|c| c == split)
                .ok_or_else(|| IntervalError::MissingSplitColumn {
                    column: split.clone(),
                })?;
            let start = if idx > 0 && is_uid_column(&linear_space[idx - 1]) {
                idx - 1
            } else {
                idx
            };
            let last = starts[starts.len() - 1];
            if start == 0 && last == 0 {
                continue;
            }
            if start <= last {
                return Err(IntervalError::SplitOutOfOrder {
                    column: split.clone(),
                });
            }
            starts.push(start);
        }

        // The final interval runs to the end of the linear space
        let ends = starts[1..]
            .iter()
            .copied()
            .chain(std::iter::once(linear_space.len()));
        starts
            .iter()
            .zip(ends)
            .map(|(&s, e)| Interval::new(linear_space[s..e].to_vec()))
            .collect()
    }

    fn name(&self) -> &'static str {
        "closed-open"
    }
}

fn check_mandatory(mandatory: &[String], linear_space: &[String]) -> Result<(), IntervalError> {
    let missing: Vec<String> = mandatory
        .iter()
        .filter(|m| !linear_space.iter().any(|c| base_name(c) == m.as_str()))
        .cloned()
        .collect();
    if linear_space.is_empty() || !missing.is_empty() {
        return Err(IntervalError::MissingMandatoryColumns { missing });
    }
    Ok(())
}

/// Errors related to interval partitioning
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum IntervalError {
    /// Interval with no columns
    #[error("an interval needs at least one column")]
    Empty,

    /// Interval made only of identifier columns
    #[error("interval {columns:?} has no entity column")]
    NoEntityColumn { columns: Vec<String> },

    /// Entity column not among the interval's columns
    #[error("entity '{entity}' is not a column of interval {columns:?}")]
    EntityNotInInterval { entity: String, columns: Vec<String> },

    /// Entity column appears more than once
    #[error("entity '{entity}' appears more than once in its interval")]
    EntityRepeated { entity: String },

    /// Split column absent from the table
    #[error("column '{column}' is missing from the posted data; the posting ranges likely don't cover all the data")]
    MissingSplitColumn { column: String },

    /// Split points not in column order
    #[error("split column '{column}' is out of order")]
    SplitOutOfOrder { column: String },

    /// Required columns are missing (or there are no columns at all)
    #[error("posted data is missing mandatory columns {missing:?}")]
    MissingMandatoryColumns { missing: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn shape(intervals: &[Interval]) -> Vec<(Vec<String>, String)> {
        intervals
            .iter()
            .map(|i| (i.columns().to_vec(), i.entity_name().to_string()))
            .collect()
    }

    #[test]
    fn interval_entity_is_first_non_uid() {
        let i = Interval::new(cols(&["UID", "Big Rock", "Effort"])).unwrap();
        assert_eq!(i.entity_name(), "Big Rock");
        assert_eq!(i.uid_columns().collect::<Vec<_>>(), vec!["UID"]);
        assert_eq!(i.property_columns().collect::<Vec<_>>(), vec!["Effort"]);
    }

    #[test]
    fn interval_rejects_empty_and_uid_only() {
        assert_eq!(Interval::new(vec![]), Err(IntervalError::Empty));
        assert!(matches!(
            Interval::new(cols(&["UID"])),
            Err(IntervalError::NoEntityColumn { .. })
        ));
    }

    #[test]
    fn interval_rejects_repeated_entity() {
        assert!(matches!(
            Interval::with_entity(cols(&["A", "A"]), "A"),
            Err(IntervalError::EntityRepeated { .. })
        ));
    }

    #[test]
    fn greedy_is_one_interval() {
        let space = cols(&["Name", "Age", "City"]);
        let out = GreedyIntervals::new(cols(&["Name"])).intervals(&space).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_name(), "Name");
    }

    #[test]
    fn greedy_reports_missing_mandatory() {
        let err = GreedyIntervals::new(cols(&["Name", "Owner"]))
            .intervals(&cols(&["Name"]))
            .unwrap_err();
        assert_eq!(
            err,
            IntervalError::MissingMandatoryColumns {
                missing: cols(&["Owner"])
            }
        );
    }

    #[test]
    fn empty_space_reports_mandatory_columns() {
        let err = GreedyIntervals::new(cols(&["Name"])).intervals(&[]).unwrap_err();
        assert_eq!(
            err,
            IntervalError::MissingMandatoryColumns {
                missing: cols(&["Name"])
            }
        );
    }

    #[test]
    fn minimalist_groups_uids_with_next_column() {
        let space = cols(&["UID", "A", "UID.1", "B", "C"]);
        let out = MinimalistIntervals.intervals(&space).unwrap();
        assert_eq!(
            shape(&out),
            vec![
                (cols(&["UID", "A"]), "A".to_string()),
                (cols(&["UID.1", "B"]), "B".to_string()),
                (cols(&["C"]), "C".to_string()),
            ]
        );
    }

    #[test]
    fn closed_open_pulls_uid_into_next_interval() {
        let space = cols(&["UID", "Big Rock", "Effort", "UID.1", "Sub Rock", "Description"]);
        let out = ClosedOpenIntervals::new(cols(&["Sub Rock"]))
            .intervals(&space)
            .unwrap();
        assert_eq!(
            shape(&out),
            vec![
                (cols(&["UID", "Big Rock", "Effort"]), "Big Rock".to_string()),
                (cols(&["UID.1", "Sub Rock", "Description"]), "Sub Rock".to_string()),
            ]
        );
    }

    #[test]
    fn closed_open_n_splits_make_n_plus_one_intervals() {
        let space = cols(&["A", "x", "B", "y", "C", "z"]);
        let out = ClosedOpenIntervals::new(cols(&["B", "C"]))
            .intervals(&space)
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].columns(), &cols(&["C", "z"])[..]);
    }

    #[test]
    fn closed_open_split_at_start_is_not_an_empty_interval() {
        let space = cols(&["UID", "A", "B"]);
        let out = ClosedOpenIntervals::new(cols(&["A", "B"]))
            .intervals(&space)
            .unwrap();
        assert_eq!(
            shape(&out),
            vec![
                (cols(&["UID", "A"]), "A".to_string()),
                (cols(&["B"]), "B".to_string()),
            ]
        );
    }

    #[test]
    fn closed_open_missing_split_column() {
        let err = ClosedOpenIntervals::new(cols(&["Nope"]))
            .intervals(&cols(&["A", "B"]))
            .unwrap_err();
        assert!(err.to_string().contains("don't cover all the data"));
    }

    #[test]
    fn closed_open_out_of_order() {
        let err = ClosedOpenIntervals::new(cols(&["C", "B"]))
            .intervals(&cols(&["A", "B", "C"]))
            .unwrap_err();
        assert!(matches!(err, IntervalError::SplitOutOfOrder { .. }));
    }

    proptest! {
        #[test]
        fn prop_minimalist_covers_space_in_order(
            kinds in prop::collection::vec(any::<bool>(), 1..20)
        ) {
            // true = identifier column
            let space: Vec<String> = kinds
                .iter()
                .enumerate()
                .map(|(i, uid)| if *uid { format!("UID.{i}") } else { format!("Col{i}") })
                .collect();
            prop_assume!(kinds.iter().any(|k| !k));

            let out = MinimalistIntervals.intervals(&space).unwrap();
            let flat: Vec<String> = out.iter().flat_map(|i| i.columns().to_vec()).collect();
            prop_assert_eq!(flat, space);
        }
    }
}
