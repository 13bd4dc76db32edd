//! Entity-type acronyms
//!
//! Each entity type in a connected breakdown graph gets one uppercase
//! acronym, used as the alphabetic part of its UID segments. Once assigned,
//! an acronym is never handed to a second entity type.

use crate::uid::is_valid_acronym;
use std::collections::BTreeMap;

/// Bidirectional entity type <-> acronym map
#[derive(Debug, Clone, Default)]
pub struct AcronymRegistry {
    by_entity: BTreeMap<String, String>,
    by_acronym: BTreeMap<String, String>,
}

impl AcronymRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acronym already assigned to `entity`
    #[must_use]
    pub fn acronym_of(&self, entity: &str) -> Option<&str> {
        self.by_entity.get(entity).map(String::as_str)
    }

    /// Entity type that owns `acronym`
    #[must_use]
    pub fn entity_of(&self, acronym: &str) -> Option<&str> {
        self.by_acronym.get(acronym).map(String::as_str)
    }

    /// Number of registered entity types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    /// True if nothing has been registered yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    /// Return the acronym of `entity`, assigning one on first use
    ///
    /// The first candidate is the first letter of each word; on collision the
    /// words contribute further letters, last word first.
    ///
    /// # Errors
    /// - [`AcronymError::NoLetters`] if the entity name has no ASCII letters
    /// - [`AcronymError::Exhausted`] if every candidate is already taken
    pub fn assign(&mut self, entity: &str) -> Result<String, AcronymError> {
        if let Some(existing) = self.by_entity.get(entity) {
            return Ok(existing.clone());
        }

        let words = words_of(entity);
        if words.is_empty() {
            return Err(AcronymError::NoLetters(entity.to_string()));
        }

        let chosen = candidates(&words)
            .into_iter()
            .find(|c| !self.by_acronym.contains_key(c))
            .ok_or_else(|| AcronymError::Exhausted(entity.to_string()))?;

        self.insert(entity, &chosen);
        Ok(chosen)
    }

    /// Bind `entity` to an acronym read from an existing UID
    ///
    /// # Errors
    /// - [`AcronymError::Invalid`] if the acronym is not uppercase letters
    /// - [`AcronymError::Mismatch`] if `entity` already has another acronym
    /// - [`AcronymError::Collision`] if the acronym belongs to another entity
    pub fn claim(&mut self, entity: &str, acronym: &str) -> Result<(), AcronymError> {
        if !is_valid_acronym(acronym) {
            return Err(AcronymError::Invalid(acronym.to_string()));
        }
        if let Some(existing) = self.by_entity.get(entity) {
            if existing == acronym {
                return Ok(());
            }
            return Err(AcronymError::Mismatch {
                entity: entity.to_string(),
                assigned: existing.clone(),
                requested: acronym.to_string(),
            });
        }
        if let Some(owner) = self.by_acronym.get(acronym) {
            return Err(AcronymError::Collision {
                acronym: acronym.to_string(),
                owner: owner.clone(),
                entity: entity.to_string(),
            });
        }
        self.insert(entity, acronym);
        Ok(())
    }

    fn insert(&mut self, entity: &str, acronym: &str) {
        self.by_entity.insert(entity.to_string(), acronym.to_string());
        self.by_acronym.insert(acronym.to_string(), entity.to_string());
    }
}

/// Uppercased ASCII-letter words of an entity name
fn words_of(entity: &str) -> Vec<Vec<char>> {
    entity
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(|w| {
            w.chars()
                .filter(char::is_ascii_alphabetic)
                .map(|c| c.to_ascii_uppercase())
                .collect::<Vec<_>>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Candidate acronyms, shortest first
fn candidates(words: &[Vec<char>]) -> Vec<String> {
    let mut taken: Vec<usize> = vec![1; words.len()];
    let mut out = vec![render(words, &taken)];

    // Lengthen the last word first, then move leftwards
    for idx in (0..words.len()).rev() {
        while taken[idx] < words[idx].len() {
            taken[idx] += 1;
            out.push(render(words, &taken));
        }
    }
    out
}

fn render(words: &[Vec<char>], taken: &[usize]) -> String {
    words
        .iter()
        .zip(taken)
        .flat_map(|(w, n)| w.iter().take(*n))
        .collect()
}

/// Errors related to acronym assignment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcronymError {
    /// Entity name has nothing to build an acronym from
    #[error("entity type '{0}' has no letters to build an acronym from")]
    NoLetters(String),

    /// All candidate acronyms are taken
    #[error("cannot find a free acronym for entity type '{0}'")]
    Exhausted(String),

    /// Acronym is not uppercase letters
    #[error("invalid acronym '{0}'")]
    Invalid(String),

    /// Entity type already has a different acronym
    #[error("entity type '{entity}' uses acronym '{assigned}', but a UID with acronym '{requested}' was supplied for it")]
    Mismatch {
        /// Entity type
        entity: String,
        /// Acronym already assigned to it
        assigned: String,
        /// Acronym found in the supplied UID
        requested: String,
    },

    /// Acronym already used by another entity type
    #[error("acronym '{acronym}' already identifies entity type '{owner}' and cannot be reused for '{entity}'")]
    Collision {
        /// Contested acronym
        acronym: String,
        /// Entity type holding it
        owner: String,
        /// Entity type asking for it
        entity: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_letter_of_each_word() {
        let mut reg = AcronymRegistry::new();
        assert_eq!(reg.assign("Big Rock").unwrap(), "BR");
        assert_eq!(reg.assign("effort").unwrap(), "E");
        assert_eq!(reg.assign("sub-rock_detail").unwrap(), "SRD");
    }

    #[test]
    fn assignment_is_stable() {
        let mut reg = AcronymRegistry::new();
        let a = reg.assign("Workstream").unwrap();
        let b = reg.assign("Workstream").unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn collision_lengthens_acronym() {
        let mut reg = AcronymRegistry::new();
        assert_eq!(reg.assign("Big Rock").unwrap(), "BR");
        assert_eq!(reg.assign("Blue Ribbon").unwrap(), "BRI");
        assert_eq!(reg.assign("Blue Ridge").unwrap(), "BRID");
        assert_eq!(reg.entity_of("BRI"), Some("Blue Ribbon"));
    }

    #[test]
    fn exhausted_candidates() {
        let mut reg = AcronymRegistry::new();
        reg.assign("A").unwrap();
        assert!(matches!(reg.assign("a"), Err(AcronymError::Exhausted(_))));
    }

    #[test]
    fn no_letters() {
        let mut reg = AcronymRegistry::new();
        assert!(matches!(reg.assign("123 - 4"), Err(AcronymError::NoLetters(_))));
    }

    #[test]
    fn claim_rejects_reuse_for_other_entity() {
        let mut reg = AcronymRegistry::new();
        reg.claim("Workstream", "W").unwrap();
        let err = reg.claim("Wish", "W").unwrap_err();
        assert!(matches!(err, AcronymError::Collision { .. }));
    }

    #[test]
    fn claim_rejects_second_acronym_for_entity() {
        let mut reg = AcronymRegistry::new();
        reg.claim("Workstream", "W").unwrap();
        assert!(reg.claim("Workstream", "W").is_ok());
        assert!(matches!(
            reg.claim("Workstream", "WS"),
            Err(AcronymError::Mismatch { .. })
        ));
    }
}
