use crate::dashboard::model::{Variable, VariableValue};
use crate::signal::{Listeners, Subscription, Tracked};
use crate::variables::time_range::{TimeRange, FROM_PARAM, TO_PARAM};
use crate::variables::url_state::{UrlState, UrlStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Resolved variable values plus the raw time range, as seen by queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableValues {
    pub from: Option<String>,
    pub to: Option<String>,
    pub variables: BTreeMap<String, VariableValue>,
}

impl VariableValues {
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.variables.get(name)
    }

    /// The time range, falling back to `fallback` for missing ends.
    pub fn time_range(&self, fallback: &TimeRange) -> TimeRange {
        TimeRange {
            from: self.from.clone().unwrap_or_else(|| fallback.from.clone()),
            to: self.to.clone().unwrap_or_else(|| fallback.to.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Resolving,
    Stable,
}

/// Derive variable values from URL parameters.
///
/// A declared variable adopts the URL value(s) under its exact name: a list
/// for multi-select variables, the first value otherwise. Variables absent
/// from the URL keep their value from `previous`, or their declared current
/// value when seen for the first time.
pub fn resolve_values(
    definitions: &[Variable],
    url: &UrlState,
    previous: &VariableValues,
) -> VariableValues {
    let mut variables = BTreeMap::new();
    for var in definitions {
        let from_url = url.get_all_raw(&var.name);
        let value = if from_url.is_empty() {
            previous
                .variables
                .get(&var.name)
                .cloned()
                .unwrap_or_else(|| var.current.value.clone())
        } else if var.is_multi() {
            VariableValue::Multi(from_url.iter().map(|s| s.to_string()).collect())
        } else {
            VariableValue::Single(from_url[0].to_string())
        };
        variables.insert(var.name.clone(), value);
    }
    VariableValues {
        from: url
            .get_raw(FROM_PARAM)
            .map(str::to_string)
            .or_else(|| previous.from.clone()),
        to: url
            .get_raw(TO_PARAM)
            .map(str::to_string)
            .or_else(|| previous.to.clone()),
        variables,
    }
}

/// Keeps a dashboard's variable values in step with the URL.
///
/// Every URL or definition change re-enters `Resolving`; consumers are
/// notified only when the derived values actually differ from the last
/// committed snapshot.
pub struct VariableSync {
    state: SyncState,
    definitions: Vec<Variable>,
    values: VariableValues,
    tracker: Tracked<VariableValues>,
    listeners: Listeners<VariableValues>,
}

impl Default for VariableSync {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VariableSync {
    pub fn new(definitions: Vec<Variable>) -> Self {
        Self {
            state: SyncState::Idle,
            definitions,
            values: VariableValues::default(),
            tracker: Tracked::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn values(&self) -> &VariableValues {
        &self.values
    }

    pub fn definitions(&self) -> &[Variable] {
        &self.definitions
    }

    pub fn subscribe(&self, cb: impl Fn(&VariableValues) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(cb)
    }

    pub fn on_url_change(&mut self, url: &UrlState) -> bool {
        self.resolve(url)
    }

    pub fn set_definitions(&mut self, definitions: Vec<Variable>, url: &UrlState) -> bool {
        self.definitions = definitions;
        self.resolve(url)
    }

    fn resolve(&mut self, url: &UrlState) -> bool {
        self.state = SyncState::Resolving;
        let next = resolve_values(&self.definitions, url, &self.values);
        let changed = self.tracker.commit(&next);
        if changed {
            self.values = next;
            tracing::debug!(variables = self.values.variables.len(), "variable values changed");
            self.listeners.notify(&self.values);
        }
        self.state = SyncState::Stable;
        changed
    }

    /// Copy resolved values into the definitions' `current.value`.
    pub fn apply_to(&self, variables: &mut [Variable]) {
        for var in variables {
            if let Some(value) = self.values.variables.get(&var.name) {
                var.current.value = value.clone();
            }
        }
    }

    /// Resolve now and then on every URL change for as long as the returned
    /// subscription lives.
    pub fn bind(this: &Arc<Mutex<Self>>, urls: &UrlStore) -> Subscription {
        if let Ok(mut sync) = this.lock() {
            sync.on_url_change(urls.state());
        }
        let weak = Arc::downgrade(this);
        urls.subscribe(move |url| {
            if let Some(sync) = weak.upgrade() {
                if let Ok(mut sync) = sync.lock() {
                    sync.on_url_change(url);
                }
            }
        })
    }
}
