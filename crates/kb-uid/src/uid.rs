//! Hierarchical UIDs
//!
//! Provides [`UidPath`], a parsed identifier of the form `W3.E12.AC1`, and
//! [`UidSegment`], one `ACRONYM DIGITS` step of such a path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Grammar accepted for externally supplied UIDs
pub const UID_GRAMMAR: &str = "ACRONYM DIGITS (\".\" ACRONYM DIGITS)*, e.g. 'W3.E12.AC1'";

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)([0-9]+)$").expect("segment regex is valid"));

static ACRONYM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+$").expect("acronym regex is valid"));

/// Check that `acronym` is one or more uppercase ASCII letters
#[inline]
#[must_use]
pub fn is_valid_acronym(acronym: &str) -> bool {
    ACRONYM_RE.is_match(acronym)
}

/// One step of a UID: an acronym followed by a counter
///
/// `digits` keeps the textual form the counter was supplied with, so that
/// externally padded UIDs (`BR007`) survive a parse/print cycle unchanged.
/// Comparison and hashing ignore it: `BR007` and `BR7` are the same segment.
#[derive(Debug, Clone)]
pub struct UidSegment {
    acronym: String,
    number: u64,
    digits: String,
}

impl PartialEq for UidSegment {
    fn eq(&self, other: &Self) -> bool {
        self.acronym == other.acronym && self.number == other.number
    }
}

impl Eq for UidSegment {}

impl PartialOrd for UidSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UidSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.acronym
            .cmp(&other.acronym)
            .then(self.number.cmp(&other.number))
    }
}

impl Hash for UidSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.acronym.hash(state);
        self.number.hash(state);
    }
}

impl UidSegment {
    /// Create a segment from an acronym and counter
    ///
    /// # Errors
    /// Returns [`UidError::InvalidAcronym`] unless the acronym is uppercase letters
    pub fn new(acronym: impl Into<String>, number: u64) -> Result<Self, UidError> {
        let acronym = acronym.into();
        if !is_valid_acronym(&acronym) {
            return Err(UidError::InvalidAcronym(acronym));
        }
        Ok(Self {
            acronym,
            number,
            digits: number.to_string(),
        })
    }

    /// Acronym part (`BR` in `BR12`)
    #[inline]
    #[must_use]
    pub fn acronym(&self) -> &str {
        &self.acronym
    }

    /// Numeric part (`12` in `BR12`)
    #[inline]
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl Display for UidSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.acronym, self.digits)
    }
}

impl FromStr for UidSegment {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SEGMENT_RE
            .captures(s)
            .ok_or_else(|| UidError::malformed(s))?;
        let digits = caps[2].to_string();
        let number = digits.parse::<u64>().map_err(|_| UidError::malformed(s))?;
        Ok(Self {
            acronym: caps[1].to_string(),
            number,
            digits,
        })
    }
}

/// Full hierarchical UID
///
/// Never empty. The parent of a UID is the UID with its last segment dropped.
///
/// # Examples
/// - `BR1` is a top-level instance
/// - `BR1.SR3` is the third `SR` child of `BR1`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UidPath(Vec<UidSegment>);

impl UidPath {
    /// Create from segments
    ///
    /// # Errors
    /// Returns [`UidError::Empty`] if `segments` is empty
    pub fn new(segments: Vec<UidSegment>) -> Result<Self, UidError> {
        if segments.is_empty() {
            return Err(UidError::Empty);
        }
        Ok(Self(segments))
    }

    /// Create a top-level UID from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: UidSegment) -> Self {
        Self(vec![segment])
    }

    /// All segments, root first
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[UidSegment] {
        &self.0
    }

    /// Number of segments (always at least one)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with collections
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment (the "leaf UID")
    #[inline]
    #[must_use]
    pub fn leaf(&self) -> &UidSegment {
        // Non-empty by construction
        &self.0[self.0.len() - 1]
    }

    /// UID of the parent instance, `None` for top-level UIDs
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a segment, returning the child UID
    #[must_use]
    pub fn child(&self, segment: UidSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Append a segment to an optional parent
    #[must_use]
    pub fn under(parent: Option<&Self>, segment: UidSegment) -> Self {
        match parent {
            Some(p) => p.child(segment),
            None => Self::single(segment),
        }
    }

    /// True if `self` is a strict prefix of `other`
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.0[..] == other.0[..self.0.len()]
    }

    /// Segments of `self` below `ancestor`
    ///
    /// # Errors
    /// Returns error if `ancestor` is not a strict ancestor of `self`
    pub fn relative_to(&self, ancestor: &Self) -> Result<&[UidSegment], UidError> {
        if !ancestor.is_ancestor_of(self) {
            return Err(UidError::NotDescendant {
                uid: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(&self.0[ancestor.0.len()..])
    }
}

impl Display for UidPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for UidPath {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(UidError::malformed(s));
        }
        let segments = trimmed
            .split('.')
            .map(|seg| seg.parse::<UidSegment>().map_err(|_| UidError::malformed(s)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl Serialize for UidPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UidPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to UIDs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UidError {
    /// Text does not follow the UID grammar
    #[error("malformed UID '{uid}': expected {grammar}")]
    Malformed {
        /// Offending text
        uid: String,
        /// Accepted grammar
        grammar: &'static str,
    },

    /// Acronym is not uppercase letters
    #[error("invalid acronym '{0}': must be one or more uppercase letters")]
    InvalidAcronym(String),

    /// A UID needs at least one segment
    #[error("UID must have at least one segment")]
    Empty,

    /// Not a descendant UID
    #[error("UID '{uid}' is not a descendant of '{ancestor}'")]
    NotDescendant {
        /// UID being relativized
        uid: String,
        /// Expected ancestor
        ancestor: String,
    },

    /// No counter left above the highest one issued or reserved
    #[error("no free counter for acronym '{acronym}' under '{parent}': highest in use is {high}")]
    CounterExhausted {
        /// Acronym being generated
        acronym: String,
        /// Parent prefix, `<document root>` at the top level
        parent: String,
        /// Highest counter in use
        high: u64,
    },
}

impl UidError {
    fn malformed(uid: &str) -> Self {
        Self::Malformed {
            uid: uid.to_string(),
            grammar: UID_GRAMMAR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UidPath {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        let u = uid("W3.E12.AC1");
        assert_eq!(u.len(), 3);
        assert_eq!(u.leaf().acronym(), "AC");
        assert_eq!(u.leaf().number(), 1);
        assert_eq!(u.to_string(), "W3.E12.AC1");
    }

    #[test]
    fn padded_digits_survive_round_trip() {
        let u = uid("BR007.SR01");
        assert_eq!(u.to_string(), "BR007.SR01");
        assert_eq!(u.segments()[0].number(), 7);
    }

    #[test]
    fn padding_does_not_change_identity() {
        assert_eq!(uid("BR01.SR5"), uid("BR1.SR5"));
        assert_eq!(uid("BR01").cmp(&uid("BR1")), Ordering::Equal);
        assert!(uid("BR2") < uid("BR010"));
        let set: std::collections::HashSet<UidPath> =
            [uid("BR007"), uid("BR7")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parent_drops_last_segment() {
        assert_eq!(uid("A1.B2.C3").parent(), Some(uid("A1.B2")));
        assert_eq!(uid("A1").parent(), None);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "a1", "A", "1", "A1.", "A1..B2", "A1.b2", "A-1", "A1 B2"] {
            let err = bad.parse::<UidPath>().unwrap_err();
            assert!(matches!(err, UidError::Malformed { .. }), "{bad} should be rejected");
        }
    }

    #[test]
    fn malformed_error_describes_grammar() {
        let err = "x.y".parse::<UidPath>().unwrap_err();
        assert!(err.to_string().contains("ACRONYM DIGITS"));
    }

    #[test]
    fn ancestry() {
        let a = uid("A1");
        let b = uid("A1.B2");
        assert!(a.is_ancestor_of(&b));
        assert!(!b.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&a));
        assert_eq!(b.relative_to(&a).unwrap(), &b.segments()[1..]);
        assert!(a.relative_to(&b).is_err());
    }

    #[test]
    fn under_optional_parent() {
        let seg = UidSegment::new("X", 4).unwrap();
        assert_eq!(UidPath::under(None, seg.clone()).to_string(), "X4");
        assert_eq!(UidPath::under(Some(&uid("A1")), seg).to_string(), "A1.X4");
    }

    #[test]
    fn segment_rejects_lowercase_acronym() {
        assert!(matches!(
            UidSegment::new("br", 1),
            Err(UidError::InvalidAcronym(_))
        ));
    }

    #[test]
    fn serde_as_string() {
        let u = uid("BR2.SR1");
        let yaml = serde_yaml::to_string(&u).unwrap();
        assert_eq!(yaml.trim(), "BR2.SR1");
        let back: UidPath = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, u);
    }
}
