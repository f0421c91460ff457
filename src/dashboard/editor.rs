use crate::common::json::{deep_merge, strip_prefixed};
use crate::dashboard::model::{PanelKey, PanelSetting, INTERNAL_FIELD_PREFIX};
use crate::dashboard::store::DashboardStore;
use crate::query::QueryEditor;
use crate::signal::Tracked;
use crate::visualization::{options_or_default, VisualizationRegistry};
use eframe::egui;
use serde_json::{json, Value};

/// Editing session for a single panel.
///
/// Keeps a local copy for the form and writes every committed change back
/// to the dashboard, so the grid and the form always show the same panel.
pub struct PanelEditor {
    key: PanelKey,
    panel: PanelSetting,
    committed: Tracked<PanelSetting>,
    queries: QueryEditor,
}

impl PanelEditor {
    pub fn open(store: &DashboardStore, key: PanelKey) -> Option<Self> {
        let panel = store.panel(key)?.clone();
        let mut queries = QueryEditor::new();
        queries.set_targets(&panel.targets);
        Some(Self {
            key,
            committed: Tracked::with_value(panel.clone()),
            panel,
            queries,
        })
    }

    pub fn key(&self) -> PanelKey {
        self.key
    }

    pub fn panel(&self) -> &PanelSetting {
        &self.panel
    }

    pub fn queries(&self) -> &QueryEditor {
        &self.queries
    }

    /// Deep-merge `patch` onto the panel and commit it when it differs from
    /// the last committed state.
    ///
    /// The merge starts from the dashboard's current copy of the panel, so
    /// grid changes made while the editor was open survive. Top-level fields
    /// starting with `__` are view-only and never reach the panel. A patch
    /// that would give the panel another panel's id is rejected. Returns
    /// whether anything was committed.
    pub fn modify_panel(&mut self, store: &mut DashboardStore, patch: &Value) -> bool {
        self.apply_patch(store, patch, |_| {})
    }

    fn apply_patch(
        &mut self,
        store: &mut DashboardStore,
        patch: &Value,
        prepare: impl FnOnce(&mut Value),
    ) -> bool {
        if !self.refresh(store) {
            tracing::warn!(key = ?self.key, "edited panel is no longer on the dashboard");
            return false;
        }
        let mut patch = patch.clone();
        strip_prefixed(&mut patch, INTERNAL_FIELD_PREFIX);
        let mut raw = match serde_json::to_value(&self.panel) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(panel = self.panel.id, "failed to serialize panel: {e}");
                return false;
            }
        };
        prepare(&mut raw);
        deep_merge(&mut raw, &patch);
        let mut next: PanelSetting = match serde_json::from_value(raw) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(panel = self.panel.id, "rejected panel patch: {e}");
                return false;
            }
        };
        if store.id_taken(next.id, self.key) {
            tracing::warn!(panel = self.panel.id, id = next.id, "panel id already in use");
            return false;
        }
        next.key = self.key;
        next.sync_grid_key();
        if next == self.panel {
            self.committed.commit(&next);
            return false;
        }
        if !self.committed.commit(&next) {
            return false;
        }
        if !store.replace_panel(self.key, next.clone()) {
            tracing::debug!(panel = next.id, "dashboard already had this panel state");
        }
        // Targets written back from this session keep their active flags.
        if next.targets.as_slice() != self.queries.targets() {
            self.queries.set_targets(&next.targets);
        }
        self.panel = next;
        true
    }

    /// Reload the local copy from the dashboard. `false` once the panel is
    /// gone.
    pub fn refresh(&mut self, store: &DashboardStore) -> bool {
        match store.panel(self.key) {
            Some(current) => {
                if *current != self.panel {
                    self.panel = current.clone();
                }
                true
            }
            None => false,
        }
    }

    fn sync_targets(&mut self, store: &mut DashboardStore) -> bool {
        let targets = self.queries.targets().to_vec();
        if targets == self.panel.targets {
            return false;
        }
        match serde_json::to_value(&targets) {
            Ok(targets) => {
                // Arrays are replaced wholesale by the merge.
                let mut raw = json!({});
                raw["targets"] = targets;
                self.modify_panel(store, &raw)
            }
            Err(e) => {
                tracing::error!("failed to serialize targets: {e}");
                false
            }
        }
    }

    /// Editor form. Returns `true` when a change was committed.
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        store: &mut DashboardStore,
        visualizations: &VisualizationRegistry,
    ) -> bool {
        if !self.refresh(store) {
            return false;
        }
        let mut changed = false;

        let mut title = self.panel.title.clone();
        let mut description = self.panel.description.clone();
        egui::Grid::new(("panel-editor", self.key)).show(ui, |ui| {
            ui.label("Title");
            ui.text_edit_singleline(&mut title);
            ui.end_row();
            ui.label("Description");
            ui.text_edit_multiline(&mut description);
            ui.end_row();
        });
        if title != self.panel.title || description != self.panel.description {
            changed |= self.modify_panel(
                store,
                &json!({"title": title, "description": description}),
            );
        }

        let mut panel_type = self.panel.panel_type.clone();
        egui::ComboBox::from_label("Visualization")
            .selected_text(&panel_type)
            .show_ui(ui, |ui| {
                for plugin in visualizations.plugins() {
                    ui.selectable_value(&mut panel_type, plugin.type_key().to_string(), plugin.name());
                }
            });
        if panel_type != self.panel.panel_type {
            let options = visualizations
                .get(&panel_type)
                .map(|p| p.default_options())
                .unwrap_or_else(|| json!({}));
            // Options of the old type are meaningless for the new one.
            changed |= self.apply_patch(
                store,
                &json!({"type": panel_type, "options": options}),
                |raw| raw["options"] = json!({}),
            );
        }

        if let Some(plugin) = visualizations.get(&self.panel.panel_type) {
            ui.separator();
            let mut options = options_or_default(plugin.as_ref(), &self.panel.options);
            if plugin.options_editor(ui, &mut options) {
                changed |= self.modify_panel(store, &json!({"options": options}));
            }
        }

        ui.separator();
        ui.strong("Queries");
        let mut toggle_active = None;
        let mut toggle_hide = None;
        let mut delete = None;
        for (index, target) in self.queries.targets().iter().enumerate() {
            ui.horizontal(|ui| {
                let mut active = self.queries.is_active(&target.ref_id);
                if ui.checkbox(&mut active, &target.ref_id).changed() {
                    toggle_active = Some(target.ref_id.clone());
                }
                if ui.selectable_label(target.hide, "hide").clicked() {
                    toggle_hide = Some(index);
                }
                ui.monospace(target.request.to_string());
                if ui.small_button("✖").clicked() {
                    delete = Some(index);
                }
            });
        }
        if let Some(ref_id) = toggle_active {
            self.queries.toggle_active(&ref_id);
        }
        if let Some(index) = toggle_hide {
            self.queries.toggle_hide(index);
        }
        if let Some(index) = delete {
            self.queries.delete_target(index);
        }
        if ui.button("Add query").clicked() {
            self.queries.add_target("", json!({}));
        }
        changed |= self.sync_targets(store);
        changed
    }
}
