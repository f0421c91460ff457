pub mod batch;
pub mod cache;
pub mod testdata;

use crate::dashboard::model::{DatasourceRef, Query};
use crate::plugin::{Plugin, Registry};
use crate::variables::template::substitute_json;
use crate::variables::{ResolvedRange, VariableValues};
use eframe::egui;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub use batch::{query_metrics, QueryContext};
pub use cache::{FetchKey, PanelData, PanelDataCache};

/// Persisted configuration of one datasource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSetting {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_key: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub json_data: Value,
}

impl DatasourceSetting {
    pub fn new(uid: &str, type_key: &str) -> Self {
        Self {
            uid: uid.into(),
            name: uid.into(),
            type_key: type_key.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasourceCategory {
    Metric,
    Trace,
    Log,
}

/// Shape of the data a panel wants back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetType {
    #[default]
    TimeSeries,
    /// One reduced value per series.
    Snapshot,
}

/// One labelled time series returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub ref_id: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// `(epoch millis, value)` pairs in time order.
    #[serde(default)]
    pub points: Vec<(i64, f64)>,
}

impl Series {
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }
}

/// A single query execution, after variable substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub target: Query,
    pub range: ResolvedRange,
    pub interval_ms: i64,
}

/// Runtime API of a configured datasource.
pub trait DatasourceApi: Send + Sync {
    fn query(&self, request: &QueryRequest) -> anyhow::Result<Vec<Series>>;

    /// Apply dashboard variables to a target before it is executed.
    fn rewrite_query(&self, target: &Query, values: &VariableValues) -> Query {
        Query {
            request: substitute_json(&target.request, values),
            ..target.clone()
        }
    }

    /// Metadata lookups such as metric or label names.
    fn metadata(&self, _kind: &str) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Renders the settings form of a datasource type.
pub type SettingEditorFn = fn(&mut egui::Ui, &mut DatasourceSetting) -> bool;

/// Declares a datasource type.
pub trait DatasourcePlugin: Plugin {
    fn category(&self) -> DatasourceCategory;

    fn create_api(&self, setting: &DatasourceSetting) -> Arc<dyn DatasourceApi>;

    fn setting_editor(&self) -> Option<SettingEditorFn> {
        None
    }

    /// Default `request` for new query targets.
    fn default_params(&self) -> Option<Value> {
        None
    }
}

pub type DatasourceRegistry = Registry<dyn DatasourcePlugin>;

pub fn registry() -> DatasourceRegistry {
    Registry::new("datasource")
}

/// A configured datasource bound to its plugin and API.
#[derive(Clone)]
pub struct DatasourceInstance {
    pub setting: DatasourceSetting,
    pub plugin: Arc<dyn DatasourcePlugin>,
    pub api: Arc<dyn DatasourceApi>,
}

/// All datasource instances of the running app.
///
/// The list is rebuilt wholesale on every [`DatasourceStore::sync`].
#[derive(Clone, Default)]
pub struct DatasourceStore {
    instances: Vec<DatasourceInstance>,
    by_uid: HashMap<String, usize>,
}

impl DatasourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every instance from `settings`. Settings whose type has no
    /// registered plugin are skipped and reported.
    pub fn sync(&mut self, settings: &[DatasourceSetting], registry: &DatasourceRegistry) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut instances = Vec::with_capacity(settings.len());
        let mut by_uid = HashMap::new();
        for setting in settings {
            let Some(plugin) = registry.get(&setting.type_key) else {
                tracing::warn!(uid = %setting.uid, kind = %setting.type_key, "datasource type not registered");
                warnings.push(format!(
                    "datasource '{}' has unknown type '{}'",
                    setting.uid, setting.type_key
                ));
                continue;
            };
            let api = plugin.create_api(setting);
            by_uid.insert(setting.uid.clone(), instances.len());
            instances.push(DatasourceInstance {
                setting: setting.clone(),
                plugin,
                api,
            });
        }
        tracing::info!(count = instances.len(), "datasources synced");
        self.instances = instances;
        self.by_uid = by_uid;
        warnings
    }

    pub fn get(&self, uid: &str) -> Option<&DatasourceInstance> {
        self.by_uid.get(uid).and_then(|i| self.instances.get(*i))
    }

    /// The instance flagged as default, else the first one.
    pub fn default_instance(&self) -> Option<&DatasourceInstance> {
        self.instances
            .iter()
            .find(|i| i.setting.is_default)
            .or_else(|| self.instances.first())
    }

    /// Resolve a target's datasource; an empty uid means the default.
    pub fn resolve(&self, reference: &DatasourceRef) -> Option<&DatasourceInstance> {
        if reference.uid.is_empty() {
            self.default_instance()
        } else {
            self.get(&reference.uid)
        }
    }

    pub fn instances(&self) -> &[DatasourceInstance] {
        &self.instances
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
