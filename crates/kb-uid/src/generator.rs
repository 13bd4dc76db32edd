//! UID generation
//!
//! [`UidGenerator`] hands out `parent.ACRONYM<N>` identifiers, with `N` one
//! more than the highest counter ever issued or reserved for the exact
//! `(parent, acronym)` pair.

use crate::uid::{is_valid_acronym, UidError, UidPath, UidSegment};
use std::collections::BTreeMap;

/// First counter issued for a fresh `(parent, acronym)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidStart {
    /// Counters start at 1 (`BR1`)
    #[default]
    One,
    /// Counters start at 0 (`BR0`)
    Zero,
}

impl UidStart {
    fn first(self) -> u64 {
        match self {
            Self::One => 1,
            Self::Zero => 0,
        }
    }
}

/// Monotonic per-scope UID counter
///
/// Single writer, in-memory. One instance is shared by every tree of a
/// connected breakdown graph and must not be reused across documents.
#[derive(Debug, Clone, Default)]
pub struct UidGenerator {
    start: UidStart,
    /// (parent prefix, acronym) -> highest counter issued or reserved
    high_water: BTreeMap<(Option<UidPath>, String), u64>,
}

impl UidGenerator {
    /// Create a generator whose counters start at 1
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_start(UidStart::One)
    }

    /// Create a generator with an explicit starting counter
    #[inline]
    #[must_use]
    pub fn with_start(start: UidStart) -> Self {
        Self {
            start,
            high_water: BTreeMap::new(),
        }
    }

    /// Generate the next UID for `acronym` under `parent`
    ///
    /// Returns the full UID and its leaf segment.
    ///
    /// # Errors
    /// - [`UidError::InvalidAcronym`] if the acronym is not uppercase letters
    /// - [`UidError::CounterExhausted`] if the highest counter is `u64::MAX`
    pub fn generate(
        &mut self,
        acronym: &str,
        parent: Option<&UidPath>,
    ) -> Result<(UidPath, UidSegment), UidError> {
        if !is_valid_acronym(acronym) {
            return Err(UidError::InvalidAcronym(acronym.to_string()));
        }
        let key = (parent.cloned(), acronym.to_string());
        let next = match self.high_water.get(&key) {
            Some(&high) => high.checked_add(1).ok_or_else(|| UidError::CounterExhausted {
                acronym: acronym.to_string(),
                parent: parent.map_or_else(|| "<document root>".to_string(), ToString::to_string),
                high,
            })?,
            None => self.start.first(),
        };
        self.high_water.insert(key, next);

        let leaf = UidSegment::new(acronym, next)?;
        Ok((UidPath::under(parent, leaf.clone()), leaf))
    }

    /// Pre-register an externally supplied UID
    ///
    /// Every prefix of the UID is registered, so that later generation under
    /// any of its ancestors never collides with it.
    pub fn reserve(&mut self, uid: &UidPath) {
        let mut parent: Option<UidPath> = None;
        for seg in uid.segments() {
            let key = (parent.clone(), seg.acronym().to_string());
            let high = self.high_water.entry(key).or_insert(seg.number());
            if *high < seg.number() {
                *high = seg.number();
            }
            parent = Some(UidPath::under(parent.as_ref(), seg.clone()));
        }
    }

    /// Parse and reserve a UID given as text
    ///
    /// # Errors
    /// Returns [`UidError::Malformed`] if `uid` does not follow the grammar
    pub fn reserve_str(&mut self, uid: &str) -> Result<UidPath, UidError> {
        let parsed: UidPath = uid.parse()?;
        self.reserve(&parsed);
        Ok(parsed)
    }

    /// Highest counter known for `(parent, acronym)`
    #[must_use]
    pub fn high_water(&self, acronym: &str, parent: Option<&UidPath>) -> Option<u64> {
        self.high_water
            .get(&(parent.cloned(), acronym.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uid(s: &str) -> UidPath {
        s.parse().unwrap()
    }

    #[test]
    fn generates_sequential_top_level() {
        let mut gen = UidGenerator::new();
        assert_eq!(gen.generate("BR", None).unwrap().0.to_string(), "BR1");
        assert_eq!(gen.generate("BR", None).unwrap().0.to_string(), "BR2");
    }

    #[test]
    fn counters_are_scoped_by_parent() {
        let mut gen = UidGenerator::new();
        let p1 = uid("BR1");
        let p2 = uid("BR2");
        assert_eq!(gen.generate("SR", Some(&p1)).unwrap().0.to_string(), "BR1.SR1");
        assert_eq!(gen.generate("SR", Some(&p1)).unwrap().0.to_string(), "BR1.SR2");
        let (full, leaf) = gen.generate("SR", Some(&p2)).unwrap();
        assert_eq!(full.to_string(), "BR2.SR1");
        assert_eq!(leaf.to_string(), "SR1");
    }

    #[test]
    fn start_at_zero() {
        let mut gen = UidGenerator::with_start(UidStart::Zero);
        assert_eq!(gen.generate("E", None).unwrap().0.to_string(), "E0");
        assert_eq!(gen.generate("E", None).unwrap().0.to_string(), "E1");
    }

    #[test]
    fn reserved_uids_are_skipped() {
        let mut gen = UidGenerator::new();
        gen.reserve(&uid("W1.E3"));
        assert_eq!(gen.generate("W", None).unwrap().0.to_string(), "W2");
        assert_eq!(gen.generate("E", Some(&uid("W1"))).unwrap().0.to_string(), "W1.E4");
    }

    #[test]
    fn padded_reservation_counts_for_unpadded_parent() {
        let mut gen = UidGenerator::new();
        gen.reserve_str("BR01.SR5").unwrap();
        let (full, _) = gen.generate("SR", Some(&uid("BR1"))).unwrap();
        assert_eq!(full.to_string(), "BR1.SR6");
        assert_eq!(gen.generate("BR", None).unwrap().0.to_string(), "BR2");
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let mut gen = UidGenerator::new();
        gen.reserve_str("BR18446744073709551615").unwrap();
        let err = gen.generate("BR", None).unwrap_err();
        assert!(matches!(
            err,
            UidError::CounterExhausted { ref acronym, high: u64::MAX, .. } if acronym == "BR"
        ));
        assert_eq!(gen.high_water("BR", None), Some(u64::MAX));
        assert!(gen.generate("BR", None).is_err());
    }

    #[test]
    fn reserve_never_lowers_high_water() {
        let mut gen = UidGenerator::new();
        gen.reserve(&uid("A5"));
        gen.reserve(&uid("A2"));
        assert_eq!(gen.high_water("A", None), Some(5));
    }

    #[test]
    fn reserve_str_rejects_bad_grammar() {
        let mut gen = UidGenerator::new();
        assert!(matches!(
            gen.reserve_str("w1.e2"),
            Err(UidError::Malformed { .. })
        ));
    }

    #[test]
    fn invalid_acronym_is_rejected() {
        let mut gen = UidGenerator::new();
        assert!(gen.generate("b7", None).is_err());
    }

    proptest! {
        #[test]
        fn prop_counters_strictly_increase_per_pair(
            calls in prop::collection::vec((0usize..3, 0usize..3), 1..60)
        ) {
            let acronyms = ["A", "BC", "XYZ"];
            let parents = [None, Some(uid("P1")), Some(uid("P1.Q2"))];
            let mut gen = UidGenerator::new();
            let mut last: BTreeMap<(usize, usize), u64> = BTreeMap::new();

            for (a, p) in calls {
                let (full, leaf) = gen.generate(acronyms[a], parents[p].as_ref()).unwrap();
                prop_assert_eq!(full.parent(), parents[p].clone());
                if let Some(prev) = last.get(&(a, p)) {
                    prop_assert_eq!(leaf.number(), prev + 1);
                } else {
                    prop_assert_eq!(leaf.number(), 1);
                }
                last.insert((a, p), leaf.number());
            }
        }
    }
}
