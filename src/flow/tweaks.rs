use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Override of a single component's input for one run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tweak {
    pub input_value: Value,
}

/// Per-run overrides keyed by component id.
///
/// Serializes as `{"<component>": {"input_value": ...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Tweaks(BTreeMap<String, Tweak>);

impl Tweaks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, component: impl Into<String>, input_value: Value) {
        self.0.insert(component.into(), Tweak { input_value });
    }

    pub fn get(&self, component: &str) -> Option<&Value> {
        self.0.get(component).map(|t| &t.input_value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Tweaks {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut tweaks = Tweaks::new();
        for (component, value) in iter {
            tweaks.insert(component, value);
        }
        tweaks
    }
}
