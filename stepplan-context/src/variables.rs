use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name → text variable set threaded through a plan run.
///
/// One entry is distinguished as the running input ([`Variables::INPUT`]):
/// the value handed implicitly from one step to the next when no explicit
/// parameter overrides it. Keys are matched exactly (case-sensitive).
/// Insertion order is kept so persisted sets serialize the same way twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
    entries: IndexMap<String, String>,
}

impl Variables {
    /// Key of the running input slot
    pub const INPUT: &'static str = "INPUT";

    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set whose running input is `input`
    pub fn with_input(input: impl Into<String>) -> Self {
        let mut variables = Self::new();
        variables.set_input(input);
        variables
    }

    /// The running input, or an empty string when none was set
    pub fn input(&self) -> &str {
        self.get(Self::INPUT).unwrap_or_default()
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.set(Self::INPUT, input);
    }

    /// Replaces the running input with a step result
    pub fn update(&mut self, value: impl Into<String>) -> &mut Self {
        self.set_input(value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies entries from `other` wherever this set has no entry yet.
    /// Existing values are never replaced.
    pub fn fill_missing(&mut self, other: &Variables) {
        for (key, value) in other.iter() {
            if !self.contains_key(key) {
                self.set(key, value);
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Variables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Self::new();
        for (key, value) in iter {
            variables.set(key, value);
        }
        variables
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Variables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
