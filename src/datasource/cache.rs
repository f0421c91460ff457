use super::Series;
use crate::dashboard::model::{PanelKey, PanelSetting, Query};
use crate::variables::{TimeRange, VariableValues};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Everything a panel's data depends on. A result is only accepted for the
/// key it was fetched with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchKey {
    pub targets: Vec<Query>,
    pub range: TimeRange,
    pub variables: VariableValues,
}

impl FetchKey {
    pub fn new(panel: &PanelSetting, range: &TimeRange, variables: &VariableValues) -> Self {
        Self {
            targets: panel.targets.clone(),
            range: range.clone(),
            variables: variables.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelData {
    pub key: FetchKey,
    pub series: Arc<Vec<Series>>,
    pub error: Option<String>,
    pub fetched_at: Instant,
}

#[derive(Default)]
struct CacheEntry {
    wanted: Option<FetchKey>,
    data: Option<Arc<PanelData>>,
}

/// Latest fetched data per panel.
///
/// Fetches race each other: [`PanelDataCache::store`] drops any result whose
/// key is not the one most recently requested for that panel.
#[derive(Default)]
pub struct PanelDataCache {
    state: Mutex<HashMap<PanelKey, CacheEntry>>,
}

impl PanelDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as the wanted data for `panel`. Returns `true` when a
    /// fetch has to be started.
    pub fn request(&self, panel: PanelKey, key: FetchKey) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let entry = state.entry(panel).or_default();
        if entry.wanted.as_ref() == Some(&key) {
            return false;
        }
        entry.wanted = Some(key);
        true
    }

    pub fn store(
        &self,
        panel: PanelKey,
        key: FetchKey,
        series: Vec<Series>,
        error: Option<String>,
    ) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(entry) = state.get_mut(&panel) else {
            return false;
        };
        if entry.wanted.as_ref() != Some(&key) {
            tracing::debug!(?panel, "discarding superseded panel data");
            return false;
        }
        entry.data = Some(Arc::new(PanelData {
            key,
            series: Arc::new(series),
            error,
            fetched_at: Instant::now(),
        }));
        true
    }

    pub fn snapshot(&self, panel: PanelKey) -> Option<Arc<PanelData>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.get(&panel).and_then(|e| e.data.clone()))
    }

    /// Whether the wanted key for `panel` has not been answered yet.
    pub fn is_loading(&self, panel: PanelKey) -> bool {
        self.state
            .lock()
            .map(|state| match state.get(&panel) {
                Some(entry) => match (&entry.wanted, &entry.data) {
                    (Some(wanted), Some(data)) => data.key != *wanted,
                    (Some(_), None) => true,
                    _ => false,
                },
                None => false,
            })
            .unwrap_or(false)
    }

    /// Forget the wanted key so the next request refetches. Data already
    /// shown is kept.
    pub fn invalidate(&self, panel: PanelKey) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(entry) = state.get_mut(&panel) {
                entry.wanted = None;
            }
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut state) = self.state.lock() {
            for entry in state.values_mut() {
                entry.wanted = None;
            }
        }
    }

    /// Drop entries of panels that are no longer shown. Returns how many
    /// were removed.
    pub fn retain(&self, live: &HashSet<PanelKey>) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        let before = state.len();
        state.retain(|panel, _| live.contains(panel));
        before - state.len()
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::model::GridPos;
    use serde_json::json;

    fn key(from: &str) -> FetchKey {
        let mut panel = PanelSetting::new(1, "timeseries", GridPos::new(0, 0, 12, 8));
        panel.targets.push(Query::new("A", "td", json!({})));
        FetchKey::new(&panel, &TimeRange::new(from, "now"), &VariableValues::default())
    }

    fn series() -> Vec<Series> {
        vec![Series {
            ref_id: "A".into(),
            ..Default::default()
        }]
    }

    #[test]
    fn same_key_is_not_refetched() {
        let cache = PanelDataCache::new();
        let panel = PanelKey::next();
        assert!(cache.request(panel, key("now-1h")));
        assert!(!cache.request(panel, key("now-1h")));
        assert!(cache.is_loading(panel));
        assert!(cache.store(panel, key("now-1h"), series(), None));
        assert!(!cache.is_loading(panel));
        cache.invalidate(panel);
        assert!(cache.request(panel, key("now-1h")));
    }

    #[test]
    fn stale_results_are_dropped() {
        let cache = PanelDataCache::new();
        let panel = PanelKey::next();
        cache.request(panel, key("now-1h"));
        cache.request(panel, key("now-6h"));
        assert!(!cache.store(panel, key("now-1h"), series(), None));
        assert!(cache.snapshot(panel).is_none());
        assert!(cache.store(panel, key("now-6h"), series(), None));
        let data = cache.snapshot(panel).unwrap();
        assert_eq!(data.key.range.from, "now-6h");
        assert_eq!(data.series.len(), 1);
    }

    #[test]
    fn unknown_panel_is_ignored() {
        let cache = PanelDataCache::new();
        assert!(!cache.store(PanelKey::next(), key("now-1h"), series(), None));
    }

    #[test]
    fn retain_drops_removed_panels() {
        let cache = PanelDataCache::new();
        let kept = PanelKey::next();
        let gone = PanelKey::next();
        cache.request(kept, key("now-1h"));
        cache.request(gone, key("now-1h"));
        assert_eq!(cache.retain(&HashSet::from([kept])), 1);
        assert!(cache.is_loading(kept));
        assert!(!cache.store(gone, key("now-1h"), series(), None));
    }
}
