use super::{Feature, FeatureContext};
use crate::dashboard::model::ADD_PANEL_TYPE;
use crate::dashboard::render::{DashboardView, PanelAction, RenderContext};
use crate::dashboard::{DashboardStore, PanelEditor, PanelKey};
use crate::visualization::VisualizationRegistry;
use eframe::egui;
use serde_json::json;

/// Apply one grid action to the store. Returns the panel to open in the
/// editor, if the action asks for one.
pub fn apply_action(
    store: &mut DashboardStore,
    visualizations: &VisualizationRegistry,
    action: PanelAction,
) -> Option<PanelKey> {
    match action {
        PanelAction::AddPanel {
            placeholder,
            panel_type,
        } => {
            let Some(plugin) = visualizations.get(&panel_type) else {
                tracing::warn!(%panel_type, "cannot add panel of unregistered type");
                return None;
            };
            let current = store
                .panels()
                .iter()
                .flatten()
                .find(|p| p.id == placeholder && p.is_add_panel())?
                .clone();
            let mut next = current.clone();
            next.panel_type = panel_type;
            next.title = plugin.name().to_string();
            next.options = plugin.default_options();
            store.replace_panel(current.key, next);
            Some(current.key)
        }
        PanelAction::ToggleRow(id) => {
            store.toggle_row(id);
            None
        }
        PanelAction::Remove(id) => {
            store.remove_panel(id);
            None
        }
        PanelAction::Layout(items) => {
            store.update_panel_grid_pos(&items);
            None
        }
        PanelAction::Edit(key) => Some(key),
    }
}

/// The panel grid plus an editor side panel for the selected panel.
#[derive(Default)]
pub struct DashboardFeature {
    view: DashboardView,
    editor: Option<PanelEditor>,
}

impl DashboardFeature {
    fn open_editor(&mut self, store: &DashboardStore, key: PanelKey) {
        if self.editor.as_ref().is_some_and(|e| e.key() == key) {
            return;
        }
        self.editor = PanelEditor::open(store, key);
    }
}

impl Feature for DashboardFeature {
    fn ui(&mut self, ui: &mut egui::Ui, ctx: &mut FeatureContext<'_>) {
        self.view.row_height = ctx.settings.row_height.max(1.0);
        self.view.columns = ctx.settings.grid_columns.max(1);

        let readonly = ctx.store.readonly();
        ui.horizontal(|ui| {
            ui.heading(ctx.store.dashboard().title.as_str());
            if !readonly && ui.button("Add panel").clicked() {
                ctx.store.add_panel(ADD_PANEL_TYPE, json!({}));
            }
        });
        ui.separator();

        if let Some(editor) = self.editor.as_mut() {
            let mut open = true;
            egui::SidePanel::right("panel-editor")
                .resizable(true)
                .default_width(320.0)
                .show_inside(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.strong("Edit panel");
                        if ui.small_button("Close").clicked() {
                            open = false;
                        }
                    });
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        if editor.ui(ui, ctx.store, ctx.visualizations) {
                            ctx.data.invalidate(editor.key());
                        }
                    });
                });
            if !open || ctx.store.panel(editor.key()).is_none() {
                self.editor = None;
            }
        }

        let render = RenderContext {
            visualizations: ctx.visualizations,
            formats: ctx.formats,
            data: ctx.data,
            readonly,
        };
        let layout = ctx.store.layout();
        let actions = egui::ScrollArea::vertical()
            .show(ui, |ui| self.view.ui(ui, ctx.store.panels(), &layout, &render))
            .inner;
        for action in actions {
            if let Some(key) = apply_action(ctx.store, ctx.visualizations, action) {
                self.open_editor(ctx.store, key);
            }
        }
    }
}
