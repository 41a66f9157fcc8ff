use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a new intelligence snapshot is combined with the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// The newest snapshot wins wholesale.
    #[default]
    Replace,
    /// List values are unioned with what was already found; other values
    /// are overwritten. Keys missing from the snapshot are kept.
    Accumulate,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(MergePolicy::Replace),
            "accumulate" => Ok(MergePolicy::Accumulate),
            other => Err(format!("unknown merge policy '{other}'")),
        }
    }
}

/// Extracted indicators keyed by category, e.g. `upiIds`, `phishingLinks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intelligence(Map<String, Value>);

impl Intelligence {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, category: &str) -> Option<&Value> {
        self.0.get(category)
    }

    /// Fold `snapshot` into `self` according to `policy`.
    pub fn apply(&mut self, snapshot: Intelligence, policy: MergePolicy) {
        match policy {
            MergePolicy::Replace => *self = snapshot,
            MergePolicy::Accumulate => {
                for (category, incoming) in snapshot.0 {
                    match (self.0.get_mut(&category), incoming) {
                        (Some(Value::Array(found)), Value::Array(new)) => {
                            for item in new {
                                if !found.contains(&item) {
                                    found.push(item);
                                }
                            }
                        }
                        (_, incoming) => {
                            self.0.insert(category, incoming);
                        }
                    }
                }
            }
        }
    }
}
