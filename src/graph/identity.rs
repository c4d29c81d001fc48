// src/graph/identity.rs

//! Dense ID allocation for externally keyed entities.
//!
//! The remote service identifies lessons by name and words by lexeme ID.
//! Tracks identify both by small integers: the Nth distinct key seen gets
//! ID N-1. The decoder grows its tables with [`placeholder_slot`], which
//! follows the same dense, first-seen rule for IDs read off the wire.

use std::collections::HashMap;
use std::fmt;

use crate::models::Placeholder;

/// External identity of an entity, optionally scoped (e.g. by language).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalKey {
    pub scope: Option<String>,
    pub key: String,
}

impl ExternalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            scope: None,
            key: key.into(),
        }
    }

    pub fn scoped(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            key: key.into(),
        }
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", scope, self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// Outcome of an ID lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// The key was unseen; a placeholder was created.
    New(u32),
    /// The key already had an ID.
    Existing(u32),
}

impl Allocation {
    pub fn id(self) -> u32 {
        match self {
            Allocation::New(id) | Allocation::Existing(id) => id,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Allocation::New(_))
    }
}

/// Maps external keys to dense IDs and owns the entity for each ID.
#[derive(Debug, Clone)]
pub struct IdentityTable<T> {
    ids: HashMap<ExternalKey, u32>,
    keys: Vec<ExternalKey>,
    entities: Vec<T>,
}

impl<T: Placeholder> IdentityTable<T> {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            keys: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Return the ID for `key`, allocating the next one if it is unseen.
    pub fn get_or_allocate(&mut self, key: ExternalKey) -> Allocation {
        if let Some(&id) = self.ids.get(&key) {
            return Allocation::Existing(id);
        }

        let id = self.entities.len() as u32;
        log::trace!("Allocated {} ID {} for {}", T::KIND, id, key);
        self.entities.push(T::placeholder(id));
        self.keys.push(key.clone());
        self.ids.insert(key, id);
        Allocation::New(id)
    }

    /// ID of a key that has already been allocated.
    pub fn lookup(&self, key: &ExternalKey) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key(&self, id: u32) -> Option<&ExternalKey> {
        self.keys.get(id as usize)
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.entities.get(id as usize)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.entities.get_mut(id as usize)
    }

    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    pub fn into_entities(self) -> Vec<T> {
        self.entities
    }
}

impl<T: Placeholder> Default for IdentityTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch the entity at `id`, growing `table` with placeholders up to it.
///
/// Existing entries are never replaced, so every reference to `id` lands on
/// the same slot no matter when its defining record shows up.
pub fn placeholder_slot<T: Placeholder>(table: &mut Vec<T>, id: u32) -> &mut T {
    let index = id as usize;
    while table.len() <= index {
        let next = table.len() as u32;
        table.push(T::placeholder(next));
    }
    &mut table[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lesson, Word};

    #[test]
    fn test_ids_are_dense_in_first_seen_order() {
        let mut table: IdentityTable<Word> = IdentityTable::new();
        assert_eq!(table.get_or_allocate(ExternalKey::new("z")), Allocation::New(0));
        assert_eq!(table.get_or_allocate(ExternalKey::new("a")), Allocation::New(1));
        assert_eq!(
            table.get_or_allocate(ExternalKey::new("z")),
            Allocation::Existing(0)
        );
        assert_eq!(table.get_or_allocate(ExternalKey::new("m")), Allocation::New(2));
        assert_eq!(table.len(), 3);
        assert_eq!(table.key(1), Some(&ExternalKey::new("a")));
    }

    #[test]
    fn test_new_entities_are_placeholders() {
        let mut table: IdentityTable<Lesson> = IdentityTable::new();
        let id = table.get_or_allocate(ExternalKey::new("basics")).id();
        let lesson = table.get(id).unwrap();
        assert_eq!(lesson.id, id);
        assert!(lesson.is_placeholder());
    }

    #[test]
    fn test_scope_separates_keys() {
        let mut table: IdentityTable<Word> = IdentityTable::new();
        let en = table.get_or_allocate(ExternalKey::scoped("en", "x1"));
        let fr = table.get_or_allocate(ExternalKey::scoped("fr", "x1"));
        let bare = table.get_or_allocate(ExternalKey::new("x1"));
        assert_ne!(en.id(), fr.id());
        assert_ne!(fr.id(), bare.id());
        assert_eq!(table.lookup(&ExternalKey::scoped("en", "x1")), Some(en.id()));
        assert_eq!(ExternalKey::scoped("en", "x1").to_string(), "en:x1");
    }

    #[test]
    fn test_entity_is_mutated_in_place() {
        let mut table: IdentityTable<Word> = IdentityTable::new();
        let id = table.get_or_allocate(ExternalKey::new("chat")).id();
        table.get_mut(id).unwrap().surface_form = "chat".into();
        let again = table.get_or_allocate(ExternalKey::new("chat"));
        assert_eq!(again, Allocation::Existing(id));
        assert_eq!(table.get(id).unwrap().surface_form, "chat");
    }

    #[test]
    fn test_placeholder_slot_grows_densely() {
        let mut words: Vec<Word> = Vec::new();
        placeholder_slot(&mut words, 3).surface_form = "quatre".into();
        assert_eq!(words.len(), 4);
        assert!(words.iter().enumerate().all(|(i, w)| w.id == i as u32));

        // Growing again keeps the populated slot.
        placeholder_slot(&mut words, 5);
        assert_eq!(words[3].surface_form, "quatre");
        assert_eq!(words.len(), 6);
    }
}
