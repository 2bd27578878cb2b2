//! Section identifiers and the section registry
//!
//! The registry maps each [`SectionId`] to the element the rendering layer
//! mounted for it and derives the ordered sequence used for next/previous
//! navigation.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

/// Name of a page section, e.g. "home" or "shows"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for SectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque handle to a host element
///
/// The core never owns the element. Hosts answer queries for handles whose
/// element is gone as if it were not mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(Uuid);

impl ElementRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRegistration {
    pub id: SectionId,
    pub element: ElementRef,
    pub order: i32,
}

/// Section id to element mapping, in section order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionRefs(Vec<(SectionId, ElementRef)>);

impl SectionRefs {
    pub fn get(&self, id: &SectionId) -> Option<ElementRef> {
        self.0
            .iter()
            .find(|(section, _)| section == id)
            .map(|(_, element)| *element)
    }

    pub fn first(&self) -> Option<&SectionId> {
        self.0.first().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, ElementRef)> {
        self.0.iter().map(|(id, element)| (id, *element))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registry of mounted sections
#[derive(Debug, Default)]
pub struct SectionRegistry {
    entries: HashMap<SectionId, SectionRegistration>,
    /// Ids sorted by order, recomputed on every change
    ordered: Vec<SectionId>,
    /// Closed set of allowed ids (None = anything goes)
    known: Option<HashSet<SectionId>>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict registrations to a closed set of ids (an empty set means no restriction)
    pub fn with_known(known: impl IntoIterator<Item = SectionId>) -> Self {
        let known: HashSet<SectionId> = known.into_iter().collect();
        Self {
            known: (!known.is_empty()).then_some(known),
            ..Self::default()
        }
    }

    /// Whether `id` belongs to the closed set of section ids
    pub fn is_allowed(&self, id: &SectionId) -> bool {
        if id.as_str().is_empty() {
            return false;
        }
        self.known.as_ref().map_or(true, |known| known.contains(id))
    }

    /// Insert or replace a registration. Last write wins for duplicate ids.
    pub fn register(&mut self, id: SectionId, element: ElementRef, order: i32) -> Result<()> {
        if !self.is_allowed(&id) {
            return Err(Error::UnknownSection(id));
        }

        debug!(section = %id, order, "Registering section");
        self.entries.insert(
            id.clone(),
            SectionRegistration { id, element, order },
        );
        self.reorder();
        Ok(())
    }

    /// Remove a registration; returns false if it was not registered
    pub fn unregister(&mut self, id: &SectionId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            debug!(section = %id, "Unregistering section");
            self.reorder();
        }
        removed
    }

    fn reorder(&mut self) {
        let mut registrations: Vec<&SectionRegistration> = self.entries.values().collect();
        // Ties on order are broken by id so the result never depends on call order
        registrations.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        self.ordered = registrations.into_iter().map(|r| r.id.clone()).collect();
    }

    /// Registered ids sorted by order
    pub fn sections(&self) -> &[SectionId] {
        &self.ordered
    }

    pub fn element(&self, id: &SectionId) -> Option<ElementRef> {
        self.entries.get(id).map(|r| r.element)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Live id to element mapping built at call time
    pub fn section_refs(&self) -> SectionRefs {
        SectionRefs(
            self.ordered
                .iter()
                .filter_map(|id| self.entries.get(id).map(|r| (id.clone(), r.element)))
                .collect(),
        )
    }

    /// The section after `current`, or the first section when there is none
    pub fn next_after(&self, current: Option<&SectionId>) -> Option<SectionId> {
        let Some(current) = current else {
            return self.ordered.first().cloned();
        };

        match self.ordered.iter().position(|id| id == current) {
            Some(index) => self.ordered.get(index + 1).cloned(),
            // Current section was unregistered; start over from the top
            None => self.ordered.first().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(registry: &SectionRegistry) -> Vec<&str> {
        registry.sections().iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_sections_sorted_by_order() {
        let mut registry = SectionRegistry::new();
        registry.register("shows".into(), ElementRef::new(), 2).unwrap();
        registry.register("home".into(), ElementRef::new(), 0).unwrap();
        registry.register("music".into(), ElementRef::new(), 1).unwrap();

        assert_eq!(ids(&registry), vec!["home", "music", "shows"]);
    }

    #[test]
    fn test_final_state_independent_of_call_order() {
        let specs = [("home", 0), ("music", 1), ("shows", 2), ("about", 2), ("extra", -1)];
        let permutations = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [3, 2, 1, 4, 0],
            [1, 4, 0, 3, 2],
        ];

        let mut results = Vec::new();
        for permutation in permutations {
            let mut registry = SectionRegistry::new();
            for index in permutation {
                let (id, order) = specs[index];
                registry.register(id.into(), ElementRef::new(), order).unwrap();
            }
            results.push(ids(&registry).join(","));
        }

        assert!(results.iter().all(|r| r == &results[0]));
        assert_eq!(results[0], "extra,home,music,about,shows");
    }

    #[test]
    fn test_duplicate_registration_last_write_wins() {
        let mut registry = SectionRegistry::new();
        let first = ElementRef::new();
        let second = ElementRef::new();
        registry.register("home".into(), first, 5).unwrap();
        registry.register("music".into(), ElementRef::new(), 1).unwrap();
        registry.register("home".into(), second, 0).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.element(&"home".into()), Some(second));
        assert_eq!(ids(&registry), vec!["home", "music"]);
    }

    #[test]
    fn test_unregister_missing_is_noop() {
        let mut registry = SectionRegistry::new();
        registry.register("home".into(), ElementRef::new(), 0).unwrap();
        assert!(!registry.unregister(&"music".into()));
        assert!(registry.unregister(&"home".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_known_set_rejects_other_ids() {
        let mut registry = SectionRegistry::with_known(["home".into(), "music".into()]);
        assert!(registry.register("home".into(), ElementRef::new(), 0).is_ok());
        assert!(matches!(
            registry.register("admin".into(), ElementRef::new(), 1),
            Err(Error::UnknownSection(_))
        ));
        assert!(registry.register("".into(), ElementRef::new(), 1).is_err());
    }

    #[test]
    fn test_section_refs_reflect_latest_registrations() {
        let mut registry = SectionRegistry::new();
        let home = ElementRef::new();
        registry.register("home".into(), home, 0).unwrap();
        assert_eq!(registry.section_refs().len(), 1);

        let music = ElementRef::new();
        registry.register("music".into(), music, 1).unwrap();
        let refs = registry.section_refs();
        assert_eq!(refs.get(&"home".into()), Some(home));
        assert_eq!(refs.get(&"music".into()), Some(music));
        assert_eq!(refs.first().map(SectionId::as_str), Some("home"));
    }

    #[test]
    fn test_next_after() {
        let mut registry = SectionRegistry::new();
        for (order, id) in ["home", "music", "shows"].into_iter().enumerate() {
            registry.register(id.into(), ElementRef::new(), order as i32).unwrap();
        }

        assert_eq!(registry.next_after(None), Some("home".into()));
        assert_eq!(registry.next_after(Some(&"home".into())), Some("music".into()));
        assert_eq!(registry.next_after(Some(&"shows".into())), None);
        assert_eq!(registry.next_after(Some(&"gone".into())), Some("home".into()));
    }
}
