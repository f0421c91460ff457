use crate::dashboard::layout::{build_layout, on_layout_mutate, sort_panels, LayoutItem};
use crate::dashboard::model::{Dashboard, GridPos, PanelKey, PanelSetting, Variable};
use crate::signal::{Listeners, Subscription};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DashboardEvent {
    Loaded,
    PanelsChanged,
    PanelUpdated(PanelKey),
    VariablesChanged,
}

/// Default size of a freshly added panel.
const NEW_PANEL_W: u32 = 12;
const NEW_PANEL_H: u32 = 8;

/// Owns the dashboard under view and publishes every committed change.
pub struct DashboardStore {
    dashboard: Dashboard,
    readonly: bool,
    listeners: Listeners<DashboardEvent>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new(Dashboard::default())
    }
}

impl DashboardStore {
    pub fn new(dashboard: Dashboard) -> Self {
        let mut store = Self {
            dashboard: Dashboard::default(),
            readonly: false,
            listeners: Listeners::new(),
        };
        store.install(dashboard);
        store
    }

    fn install(&mut self, mut dashboard: Dashboard) {
        for panel in dashboard.config.panels_mut() {
            panel.ensure_key();
            panel.sync_grid_key();
        }
        sort_panels(&mut dashboard.config.panels);
        self.dashboard = dashboard;
    }

    pub fn subscribe(&self, cb: impl Fn(&DashboardEvent) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(cb)
    }

    fn emit(&self, event: DashboardEvent) {
        tracing::debug!(?event, uid = %self.dashboard.uid, "dashboard changed");
        self.listeners.notify(&event);
    }

    pub fn set_dashboard(&mut self, dashboard: Dashboard) {
        self.install(dashboard);
        self.emit(DashboardEvent::Loaded);
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn panels(&self) -> &[Option<PanelSetting>] {
        &self.dashboard.config.panels
    }

    pub fn panel(&self, key: PanelKey) -> Option<&PanelSetting> {
        self.dashboard.panel_by_key(key)
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    pub fn layout(&self) -> Vec<LayoutItem> {
        build_layout(&self.dashboard.config.panels, self.readonly)
    }

    /// Persist drag/resize results. Notifies only when geometry changed.
    pub fn update_panel_grid_pos(&mut self, items: &[LayoutItem]) -> bool {
        if self.readonly {
            return false;
        }
        let changed = on_layout_mutate(&mut self.dashboard.config.panels, items);
        for panel in self.dashboard.config.panels_mut() {
            panel.sync_grid_key();
        }
        if changed {
            self.emit(DashboardEvent::PanelsChanged);
        }
        changed
    }

    /// Insert a new panel at the top of the grid, pushing the rest down.
    pub fn add_panel(&mut self, panel_type: &str, options: Value) -> PanelKey {
        let id = self.dashboard.next_panel_id();
        for panel in self.dashboard.config.panels_mut() {
            panel.grid.y = panel.grid.y.saturating_add(NEW_PANEL_H);
        }
        let mut panel = PanelSetting::new(id, panel_type, GridPos::new(0, 0, NEW_PANEL_W, NEW_PANEL_H))
            .with_options(options);
        panel.ensure_key();
        let key = panel.key;
        self.dashboard.config.panels.insert(0, Some(panel));
        sort_panels(&mut self.dashboard.config.panels);
        self.emit(DashboardEvent::PanelsChanged);
        key
    }

    pub fn remove_panel(&mut self, id: u32) -> Option<PanelSetting> {
        let index = self
            .dashboard
            .config
            .panels
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.id == id))?;
        let removed = self.dashboard.config.panels.remove(index);
        self.emit(DashboardEvent::PanelsChanged);
        removed
    }

    /// Whether `id` belongs to a panel other than `key`, including panels
    /// held by collapsed rows.
    pub fn id_taken(&self, id: u32, key: PanelKey) -> bool {
        self.dashboard.config.panels().any(|p| {
            (p.id == id && p.key != key) || p.panels.iter().any(|c| c.id == id && c.key != key)
        })
    }

    /// Replace the panel with runtime identity `key`.
    ///
    /// Identity is the key, not the id, so an edit that changes the id still
    /// lands on the right panel. Returns `false` when no such panel exists,
    /// nothing changed, or the new id is already used by another panel.
    pub fn replace_panel(&mut self, key: PanelKey, mut next: PanelSetting) -> bool {
        if self.id_taken(next.id, key) {
            tracing::warn!(?key, id = next.id, "refusing duplicate panel id");
            return false;
        }
        let Some(slot) = self
            .dashboard
            .config
            .panels_mut()
            .find(|p| p.key == key)
        else {
            tracing::warn!(?key, "panel to replace is no longer on the dashboard");
            return false;
        };
        next.key = key;
        next.sync_grid_key();
        if *slot == next {
            return false;
        }
        let moved = slot.grid != next.grid;
        *slot = next;
        if moved {
            sort_panels(&mut self.dashboard.config.panels);
        }
        self.emit(DashboardEvent::PanelUpdated(key));
        true
    }

    /// Collapse or expand a row panel.
    ///
    /// Collapsing moves every panel between the row and the next row into the
    /// row and closes the gap; expanding reverses it and pushes later panels
    /// down by the children's height.
    pub fn toggle_row(&mut self, row_id: u32) -> bool {
        let panels = &mut self.dashboard.config.panels;
        sort_panels(panels);
        let Some(idx) = panels
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.id == row_id && p.is_row()))
        else {
            return false;
        };
        let (row_y, collapsed) = match &panels[idx] {
            Some(row) => (row.grid.y, row.collapsed),
            None => return false,
        };
        let top = row_y.saturating_add(1);

        if collapsed {
            let mut children = panels[idx]
                .as_mut()
                .map(|row| {
                    row.collapsed = false;
                    std::mem::take(&mut row.panels)
                })
                .unwrap_or_default();
            let min_y = children.iter().map(|c| c.grid.y).min().unwrap_or(top);
            for child in &mut children {
                child.grid.y = (child.grid.y - min_y).saturating_add(top);
                child.ensure_key();
                child.sync_grid_key();
            }
            let span = children
                .iter()
                .map(|c| c.grid.bottom())
                .max()
                .unwrap_or(top)
                .saturating_sub(top);
            for panel in panels.iter_mut().skip(idx + 1).flatten() {
                panel.grid.y = panel.grid.y.saturating_add(span);
            }
            let tail = panels.split_off(idx + 1);
            panels.extend(children.into_iter().map(Some));
            panels.extend(tail);
        } else {
            let mut end = idx + 1;
            while let Some(Some(p)) = panels.get(end) {
                if p.is_row() {
                    break;
                }
                end += 1;
            }
            let children: Vec<PanelSetting> = panels.drain(idx + 1..end).flatten().collect();
            let span = match panels.get(idx + 1) {
                Some(Some(next)) => next.grid.y.saturating_sub(top),
                _ => children
                    .iter()
                    .map(|c| c.grid.bottom())
                    .max()
                    .unwrap_or(top)
                    .saturating_sub(top),
            };
            for panel in panels.iter_mut().skip(idx + 1).flatten() {
                panel.grid.y = panel.grid.y.saturating_sub(span);
            }
            if let Some(row) = panels[idx].as_mut() {
                row.collapsed = true;
                row.panels = children;
            }
        }
        sort_panels(panels);
        self.emit(DashboardEvent::PanelsChanged);
        true
    }

    pub fn set_variables(&mut self, variables: Vec<Variable>) {
        if self.dashboard.config.variables == variables {
            return;
        }
        self.dashboard.config.variables = variables;
        self.emit(DashboardEvent::VariablesChanged);
    }

    pub fn variables(&self) -> &[Variable] {
        &self.dashboard.config.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::model::ROW_PANEL_TYPE;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn dashboard(panels: Vec<PanelSetting>) -> Dashboard {
        let mut dash = Dashboard::new("uid", "Test");
        dash.config.panels = panels.into_iter().map(Some).collect();
        dash
    }

    fn counting(store: &DashboardStore) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn grid_keys_follow_ids_after_update() {
        let mut a = PanelSetting::new(1, "stat", GridPos::new(0, 0, 6, 4));
        a.grid.i = "stale".into();
        let b = PanelSetting::new(2, "pie", GridPos::new(6, 0, 6, 4));
        let mut store = DashboardStore::new(dashboard(vec![a, b]));
        let mut layout = store.layout();
        layout[1].y = 9;
        assert!(store.update_panel_grid_pos(&layout));
        for panel in store.panels().iter().flatten() {
            assert_eq!(panel.grid.i, panel.id.to_string());
        }
    }

    #[test]
    fn unchanged_layout_does_not_notify() {
        let mut store = DashboardStore::new(dashboard(vec![PanelSetting::new(
            1,
            "stat",
            GridPos::new(0, 0, 6, 4),
        )]));
        let (hits, _sub) = counting(&store);
        let layout = store.layout();
        assert!(!store.update_panel_grid_pos(&layout));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn readonly_store_ignores_layout_changes() {
        let mut store = DashboardStore::new(dashboard(vec![PanelSetting::new(
            1,
            "stat",
            GridPos::new(0, 0, 6, 4),
        )]));
        store.set_readonly(true);
        let mut layout = store.layout();
        layout[0].x = 3;
        assert!(!store.update_panel_grid_pos(&layout));
    }

    #[test]
    fn add_panel_goes_on_top() {
        let mut store = DashboardStore::new(dashboard(vec![PanelSetting::new(
            1,
            "stat",
            GridPos::new(0, 0, 6, 4),
        )]));
        let key = store.add_panel("pie", json!({"pieType": "pie"}));
        let first = store.panels()[0].as_ref().unwrap();
        assert_eq!(first.key, key);
        assert_eq!(first.id, 2);
        assert_eq!(first.grid.i, "2");
        assert_eq!(store.dashboard().panel(1).unwrap().grid.y, NEW_PANEL_H);
    }

    #[test]
    fn replace_finds_panel_by_key_even_when_id_changes() {
        let mut store = DashboardStore::new(dashboard(vec![PanelSetting::new(
            1,
            "stat",
            GridPos::new(0, 0, 6, 4),
        )]));
        let key = store.panels()[0].as_ref().unwrap().key;
        let mut next = store.panel(key).unwrap().clone();
        next.id = 5;
        next.title = "renamed".into();
        assert!(store.replace_panel(key, next.clone()));
        let stored = store.panel(key).unwrap();
        assert_eq!(stored.id, 5);
        assert_eq!(stored.grid.i, "5");
        assert!(!store.replace_panel(key, next));
    }

    #[test]
    fn collapse_and_expand_row() {
        let row = PanelSetting::new(1, ROW_PANEL_TYPE, GridPos::new(0, 0, 24, 1));
        let child = PanelSetting::new(2, "stat", GridPos::new(0, 1, 12, 6));
        let next_row = PanelSetting::new(3, ROW_PANEL_TYPE, GridPos::new(0, 7, 24, 1));
        let below = PanelSetting::new(4, "pie", GridPos::new(0, 8, 12, 4));
        let mut store = DashboardStore::new(dashboard(vec![row, child, next_row, below]));

        assert!(store.toggle_row(1));
        let ids: Vec<u32> = store.panels().iter().flatten().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        let dash = store.dashboard();
        assert!(dash.panel(1).unwrap().collapsed);
        assert_eq!(dash.panel(1).unwrap().panels.len(), 1);
        assert_eq!(dash.panel(3).unwrap().grid.y, 1);
        assert_eq!(dash.panel(4).unwrap().grid.y, 2);

        assert!(store.toggle_row(1));
        let ids: Vec<u32> = store.panels().iter().flatten().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let dash = store.dashboard();
        assert!(!dash.panel(1).unwrap().collapsed);
        assert_eq!(dash.panel(2).unwrap().grid.y, 1);
        assert_eq!(dash.panel(3).unwrap().grid.y, 7);
        assert_eq!(dash.panel(4).unwrap().grid.y, 8);
    }

    #[test]
    fn toggling_a_non_row_is_a_no_op() {
        let mut store = DashboardStore::new(dashboard(vec![PanelSetting::new(
            1,
            "stat",
            GridPos::new(0, 0, 6, 4),
        )]));
        assert!(!store.toggle_row(1));
        assert!(!store.toggle_row(99));
    }

    #[test]
    fn replace_refuses_an_id_held_by_another_panel() {
        let a = PanelSetting::new(1, "stat", GridPos::new(0, 0, 6, 4));
        let b = PanelSetting::new(2, "pie", GridPos::new(6, 0, 6, 4));
        let mut store = DashboardStore::new(dashboard(vec![a, b]));
        let (hits, _sub) = counting(&store);
        let key = store.panels()[0].as_ref().unwrap().key;

        let mut next = store.panel(key).unwrap().clone();
        next.id = 2;
        assert!(store.id_taken(2, key));
        assert!(!store.replace_panel(key, next));
        let ids: Vec<u32> = store.panels().iter().flatten().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let mut renamed = store.panel(key).unwrap().clone();
        renamed.id = 3;
        assert!(!store.id_taken(1, key));
        assert!(store.replace_panel(key, renamed));
    }
}
