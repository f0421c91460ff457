use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional logo references for a plugin, one per theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginLogo {
    pub dark: Option<String>,
    pub light: Option<String>,
}

/// Descriptive record shared by every pluggable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    pub name: String,
    /// Unique key inside the owning registry.
    #[serde(rename = "type")]
    pub type_key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: Option<PluginLogo>,
}

impl PluginMeta {
    pub fn new(name: &str, type_key: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            type_key: type_key.to_string(),
            description: description.to_string(),
            logo: None,
        }
    }

    pub fn with_logo(mut self, dark: &str, light: &str) -> Self {
        self.logo = Some(PluginLogo {
            dark: Some(dark.to_string()),
            light: Some(light.to_string()),
        });
        self
    }
}

pub trait Plugin: Send + Sync {
    fn meta(&self) -> &PluginMeta;

    fn type_key(&self) -> &str {
        &self.meta().type_key
    }

    fn name(&self) -> &str {
        &self.meta().name
    }
}

/// Keyed plugin collection.
///
/// Lookups are by type key; listing follows registration order. Registering
/// a key twice replaces the earlier plugin in place.
pub struct Registry<P: ?Sized> {
    kind: &'static str,
    map: LinkedHashMap<String, Arc<P>>,
}

impl<P: ?Sized + Plugin> Registry<P> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            map: LinkedHashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Arc<P>) -> &mut Self {
        let key = plugin.type_key().to_string();
        if let Some(slot) = self.map.get_mut(&key) {
            tracing::debug!(registry = self.kind, plugin = %key, "replacing registered plugin");
            *slot = plugin;
        } else {
            tracing::debug!(registry = self.kind, plugin = %key, "plugin registered");
            self.map.insert(key, plugin);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<P>> {
        let found = self.map.get(key).cloned();
        if found.is_none() {
            tracing::debug!(registry = self.kind, plugin = %key, "plugin not found");
        }
        found
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn plugins(&self) -> Vec<Arc<P>> {
        self.map.values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<P: ?Sized> Clone for Registry<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            map: self.map.clone(),
        }
    }
}
