use serde::{Deserialize, Serialize};

/// Ordered set of rule keys.
///
/// Keys are opaque strings compared by exact equality. Insertion order is
/// kept so rule files round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    keys: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key. Returns false if it was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|existing| existing != key);
        self.keys.len() != before
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|existing| existing == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RuleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

/// Recorded user permission decisions, grouped by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRules {
    #[serde(default, rename = "allow")]
    pub allowed: RuleSet,
    #[serde(default, rename = "deny")]
    pub denied: RuleSet,
    #[serde(default, rename = "ask")]
    pub asked: RuleSet,
}

impl PermissionRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, key: impl Into<String>) -> Self {
        self.allowed.insert(key);
        self
    }

    pub fn deny(mut self, key: impl Into<String>) -> Self {
        self.denied.insert(key);
        self
    }

    pub fn ask(mut self, key: impl Into<String>) -> Self {
        self.asked.insert(key);
        self
    }

    /// All keys across the three sets
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.denied
            .iter()
            .chain(self.asked.iter())
            .chain(self.allowed.iter())
    }
}
