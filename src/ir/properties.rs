//! Ordered Property Map
//!
//! Object properties keep the order they were declared in the source. Writers
//! lay out generated fields in this order, so it must never depend on hashing
//! or on later lookups.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::SchemaNode;

/// Insertion-ordered `name -> SchemaNode` map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap {
    entries: IndexMap<String, SchemaNode>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property. Re-inserting an existing name replaces the node but
    /// keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) -> Option<SchemaNode> {
        self.entries.insert(name.into(), node)
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut SchemaNode)> {
        self.entries.iter_mut()
    }

    pub fn values(&self) -> impl Iterator<Item = &SchemaNode> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut SchemaNode> {
        self.entries.values_mut()
    }

    /// Property names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the properties matching the predicate, preserving order
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &SchemaNode) -> bool) {
        self.entries.retain(|name, node| keep(name, node));
    }
}

impl FromIterator<(String, SchemaNode)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, SchemaNode)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, SchemaNode);
    type IntoIter = indexmap::map::IntoIter<String, SchemaNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a SchemaNode);
    type IntoIter = indexmap::map::Iter<'a, String, SchemaNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
