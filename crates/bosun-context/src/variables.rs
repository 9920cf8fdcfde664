//! Case-insensitive string maps for environment variables and secrets.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A string map whose keys compare case-insensitively.
///
/// The last write wins and also decides how the key is spelled, so `Path`
/// followed by `PATH` leaves a single `PATH` entry.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Variables {
  // folded key -> (key as last written, value)
  entries: BTreeMap<String, (String, String)>,
}

fn fold(key: &str) -> String {
  key.to_ascii_lowercase()
}

impl Variables {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(&fold(key)).map(|(_, v)| v.as_str())
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(&fold(key))
  }

  /// Insert a value, returning the previous one.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    let key = key.into();
    self
      .entries
      .insert(fold(&key), (key, value.into()))
      .map(|(_, v)| v)
  }

  pub fn remove(&mut self, key: &str) -> Option<String> {
    self.entries.remove(&fold(key)).map(|(_, v)| v)
  }

  /// Copy every entry of `other` into this map.
  pub fn merge(&mut self, other: &Variables) {
    for (key, value) in other.iter() {
      self.insert(key, value);
    }
  }

  /// Entries that are new or have a different value compared to `base`.
  ///
  /// Keys present in `base` but missing here are not reported.
  pub fn changes_since(&self, base: &Variables) -> Variables {
    self
      .iter()
      .filter(|(key, value)| base.get(key) != Some(*value))
      .collect()
  }

  /// Entries sorted by case-folded key.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .entries
      .values()
      .map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.values().map(|(k, _)| k.as_str())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut vars = Variables::new();
    vars.extend(iter);
    vars
  }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Variables {
  fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
    for (k, v) in iter {
      self.insert(k, v);
    }
  }
}

impl fmt::Debug for Variables {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map().entries(self.iter()).finish()
  }
}

impl Serialize for Variables {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.len()))?;
    for (k, v) in self.iter() {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}
