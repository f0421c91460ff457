use crate::dashboard::layout::{bottom, LayoutItem, GRID_COLUMNS};
use crate::dashboard::model::{GridPos, PanelKey, PanelSetting};
use crate::datasource::PanelDataCache;
use crate::format::FormatRegistry;
use crate::visualization::{PanelProps, VisualizationPlugin, VisualizationRegistry};
use eframe::egui;
use std::sync::Arc;

/// Default pixel height of one grid row.
pub const ROW_HEIGHT: f32 = 30.0;
const HANDLE: f32 = 12.0;

/// How a panel entry is drawn.
#[derive(Clone)]
pub enum PanelKind {
    AddPanel,
    Row,
    Visualization(Arc<dyn VisualizationPlugin>),
    /// Unknown type; drawn as nothing.
    Unresolved,
}

pub fn panel_kind(panel: &PanelSetting, registry: &VisualizationRegistry) -> PanelKind {
    if panel.is_add_panel() {
        PanelKind::AddPanel
    } else if panel.is_row() {
        PanelKind::Row
    } else {
        registry
            .get(&panel.panel_type)
            .map(PanelKind::Visualization)
            .unwrap_or(PanelKind::Unresolved)
    }
}

/// User intent raised while drawing the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    /// Replace the add-panel placeholder `placeholder` with a panel of `panel_type`.
    AddPanel { placeholder: u32, panel_type: String },
    ToggleRow(u32),
    Edit(PanelKey),
    Remove(u32),
    Layout(Vec<LayoutItem>),
}

pub struct RenderContext<'a> {
    pub visualizations: &'a VisualizationRegistry,
    pub formats: &'a FormatRegistry,
    pub data: &'a PanelDataCache,
    pub readonly: bool,
}

fn render_add_panel(
    ui: &mut egui::Ui,
    panel: &PanelSetting,
    ctx: &RenderContext<'_>,
) -> Option<PanelAction> {
    let mut action = None;
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.heading("Add panel");
        ui.horizontal_wrapped(|ui| {
            for plugin in ctx.visualizations.plugins() {
                if ui
                    .button(plugin.name())
                    .on_hover_text(plugin.meta().description.as_str())
                    .clicked()
                {
                    action = Some(PanelAction::AddPanel {
                        placeholder: panel.id,
                        panel_type: plugin.type_key().to_string(),
                    });
                }
            }
        });
    });
    action
}

fn render_row(ui: &mut egui::Ui, panel: &PanelSetting) -> Option<PanelAction> {
    let marker = if panel.collapsed { "▶" } else { "▼" };
    let mut label = format!("{marker} {}", panel.title);
    if panel.collapsed && !panel.panels.is_empty() {
        label.push_str(&format!(" ({} panels)", panel.panels.len()));
    }
    let resp = ui.add(
        egui::Label::new(egui::RichText::new(label).strong()).sense(egui::Sense::click()),
    );
    resp.clicked().then_some(PanelAction::ToggleRow(panel.id))
}

fn render_visualization(
    ui: &mut egui::Ui,
    panel: &PanelSetting,
    plugin: &dyn VisualizationPlugin,
    ctx: &RenderContext<'_>,
) -> Option<PanelAction> {
    let mut action = None;
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.vertical(|ui| {
            ui.horizontal(|ui| {
                let title = if panel.title.is_empty() {
                    plugin.name()
                } else {
                    panel.title.as_str()
                };
                let heading = ui.strong(title);
                if !panel.description.is_empty() {
                    heading.on_hover_text(panel.description.as_str());
                }
                if ctx.readonly {
                    return;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("✖").on_hover_text("Remove").clicked() {
                        action = Some(PanelAction::Remove(panel.id));
                    }
                    if ui.small_button("✏").on_hover_text("Edit").clicked() {
                        action = Some(PanelAction::Edit(panel.key));
                    }
                });
            });
            let data = ctx.data.snapshot(panel.key);
            if let Some(error) = data.as_ref().and_then(|d| d.error.as_ref()) {
                ui.colored_label(egui::Color32::RED, error);
            }
            match data {
                Some(data) => plugin.render(
                    ui,
                    &PanelProps {
                        panel,
                        datasets: &data.series,
                        formats: ctx.formats,
                    },
                ),
                None if ctx.data.is_loading(panel.key) => {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                }
                None => plugin.render(
                    ui,
                    &PanelProps {
                        panel,
                        datasets: &[],
                        formats: ctx.formats,
                    },
                ),
            }
        });
    });
    action
}

/// Draw one panel by dispatching on its type.
pub fn render_panel(
    ui: &mut egui::Ui,
    panel: &PanelSetting,
    ctx: &RenderContext<'_>,
) -> Option<PanelAction> {
    match panel_kind(panel, ctx.visualizations) {
        PanelKind::AddPanel => render_add_panel(ui, panel, ctx),
        PanelKind::Row => render_row(ui, panel),
        PanelKind::Visualization(plugin) => render_visualization(ui, panel, plugin.as_ref(), ctx),
        PanelKind::Unresolved => {
            tracing::trace!(panel = panel.id, kind = %panel.panel_type, "unresolved panel type");
            None
        }
    }
}

/// Snap a pixel drag onto the grid. Moves keep the size, resizes keep the
/// origin; the result always fits inside `columns`.
pub fn snap(
    origin: &GridPos,
    delta: egui::Vec2,
    cell: egui::Vec2,
    columns: u32,
    resize: bool,
) -> GridPos {
    let dx = (delta.x / cell.x.max(1.0)).round() as i64;
    let dy = (delta.y / cell.y.max(1.0)).round() as i64;
    let columns = i64::from(columns.max(1));
    let mut grid = origin.clone();
    if resize {
        let w = (i64::from(origin.w) + dx).clamp(1, (columns - i64::from(origin.x)).max(1));
        let h = (i64::from(origin.h) + dy).max(1);
        grid.w = w as u32;
        grid.h = h as u32;
    } else {
        let x = (i64::from(origin.x) + dx).clamp(0, columns - i64::from(origin.w).min(columns));
        let y = (i64::from(origin.y) + dy).max(0);
        grid.x = x as u32;
        grid.y = y as u32;
    }
    grid
}

/// Handles a layout cell gets: `false` is the move handle, `true` the
/// resize handle.
fn handle_kinds(item: &LayoutItem) -> Vec<bool> {
    let mut kinds = Vec::new();
    if item.draggable() {
        kinds.push(false);
    }
    if item.resizable() {
        kinds.push(true);
    }
    kinds
}

#[derive(Debug, Clone)]
struct DragState {
    id: u32,
    origin: GridPos,
    delta: egui::Vec2,
    resize: bool,
}

/// Paints panels on a fixed-column grid and turns drags into layout updates.
pub struct DashboardView {
    pub row_height: f32,
    pub columns: u32,
    drag: Option<DragState>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new(ROW_HEIGHT, GRID_COLUMNS)
    }
}

impl DashboardView {
    pub fn new(row_height: f32, columns: u32) -> Self {
        Self {
            row_height: row_height.max(1.0),
            columns: columns.max(1),
            drag: None,
        }
    }

    fn preview(&self, panel: &PanelSetting, cell: egui::Vec2) -> GridPos {
        match &self.drag {
            Some(drag) if drag.id == panel.id => {
                snap(&drag.origin, drag.delta, cell, self.columns, drag.resize)
            }
            _ => panel.grid.clone(),
        }
    }

    /// Draw `panels` and collect the actions raised. Drag and resize handles
    /// follow the matching cell in `layout`; panels without a cell are static.
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        panels: &[Option<PanelSetting>],
        layout: &[LayoutItem],
        ctx: &RenderContext<'_>,
    ) -> Vec<PanelAction> {
        let mut actions = Vec::new();
        let width = ui.available_width();
        let cell = egui::vec2(width / self.columns as f32, self.row_height);
        let rows = bottom(panels).max(1) as f32;
        let size = egui::vec2(width, rows * self.row_height);
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());

        for panel in panels.iter().flatten() {
            let grid = self.preview(panel, cell);
            let slot_rect = egui::Rect::from_min_size(
                rect.min + egui::vec2(cell.x * grid.x as f32, cell.y * grid.y as f32),
                egui::vec2(cell.x * grid.w as f32, cell.y * grid.h as f32),
            )
            .shrink(2.0);
            let slot_clip = slot_rect.intersect(ui.clip_rect());
            let response = ui.allocate_ui_at_rect(slot_rect, |slot_ui| {
                slot_ui.set_clip_rect(slot_clip);
                slot_ui.set_min_size(slot_rect.size());
                render_panel(slot_ui, panel, ctx)
            });
            actions.extend(response.inner);

            if panel.is_add_panel() {
                continue;
            }
            let key = panel.id.to_string();
            let Some(item) = layout.iter().find(|item| item.i == key) else {
                continue;
            };
            if let Some(action) = self.interact(ui, panel, item, slot_rect, cell) {
                actions.push(action);
            }
        }
        actions
    }

    fn interact(
        &mut self,
        ui: &mut egui::Ui,
        panel: &PanelSetting,
        item: &LayoutItem,
        slot_rect: egui::Rect,
        cell: egui::Vec2,
    ) -> Option<PanelAction> {
        for resize in handle_kinds(item) {
            let handle_rect = if resize {
                egui::Rect::from_min_max(
                    slot_rect.right_bottom() - egui::vec2(HANDLE, HANDLE),
                    slot_rect.right_bottom(),
                )
            } else {
                egui::Rect::from_min_size(slot_rect.left_top(), egui::vec2(HANDLE, HANDLE))
            };
            let id = egui::Id::new(("panel-handle", panel.id, resize));
            let resp = ui.interact(handle_rect, id, egui::Sense::drag());
            if resp.hovered() || resp.dragged() {
                ui.ctx().set_cursor_icon(if resize {
                    egui::CursorIcon::ResizeNwSe
                } else {
                    egui::CursorIcon::Grab
                });
            }
            if resp.drag_started() {
                self.drag = Some(DragState {
                    id: panel.id,
                    origin: panel.grid.clone(),
                    delta: egui::Vec2::ZERO,
                    resize,
                });
            }
            if resp.dragged() {
                if let Some(drag) = self.drag.as_mut().filter(|d| d.id == panel.id) {
                    drag.delta += resp.drag_delta();
                }
            }
            if resp.drag_stopped() {
                let drag = self.drag.take()?;
                if drag.id != panel.id {
                    return None;
                }
                let grid = snap(&drag.origin, drag.delta, cell, self.columns, drag.resize);
                if grid == drag.origin {
                    return None;
                }
                let mut item = LayoutItem::from_grid(&grid);
                item.i = panel.id.to_string();
                return Some(PanelAction::Layout(vec![item]));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::layout::build_layout;
    use crate::dashboard::model::{ADD_PANEL_TYPE, ROW_PANEL_TYPE};
    use crate::datasource::{FetchKey, Series};
    use crate::plugin::{Plugin, PluginMeta};
    use crate::visualization::{registry, VisualizationCategory};
    use once_cell::sync::Lazy;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    static RENDERS: Lazy<Mutex<Vec<(u32, usize)>>> = Lazy::new(|| Mutex::new(Vec::new()));

    struct RecordingPlugin {
        meta: PluginMeta,
    }

    impl Plugin for RecordingPlugin {
        fn meta(&self) -> &PluginMeta {
            &self.meta
        }
    }

    impl VisualizationPlugin for RecordingPlugin {
        fn category(&self) -> VisualizationCategory {
            VisualizationCategory::Other
        }

        fn render(&self, _ui: &mut egui::Ui, props: &PanelProps<'_>) {
            RENDERS
                .lock()
                .unwrap()
                .push((props.panel.id, props.datasets.len()));
        }

        fn default_options(&self) -> Value {
            json!({})
        }
    }

    fn take_renders() -> Vec<(u32, usize)> {
        std::mem::take(&mut *RENDERS.lock().unwrap())
    }

    fn recording_registry(key: &str) -> VisualizationRegistry {
        let mut reg = registry();
        reg.register(Arc::new(RecordingPlugin {
            meta: PluginMeta::new("Recording", key, ""),
        }));
        reg
    }

    fn panel(id: u32, kind: &str, y: u32) -> PanelSetting {
        let mut p = PanelSetting::new(id, kind, GridPos::new(0, y, 12, 4));
        p.ensure_key();
        p
    }

    #[test]
    fn dispatch_by_type() {
        let reg = recording_registry("rec-dispatch");
        assert!(matches!(panel_kind(&panel(1, ROW_PANEL_TYPE, 0), &reg), PanelKind::Row));
        assert!(matches!(
            panel_kind(&panel(2, ADD_PANEL_TYPE, 0), &reg),
            PanelKind::AddPanel
        ));
        assert!(matches!(
            panel_kind(&panel(3, "rec-dispatch", 0), &reg),
            PanelKind::Visualization(_)
        ));
        assert!(matches!(panel_kind(&panel(4, "gauge", 0), &reg), PanelKind::Unresolved));
    }

    #[test]
    fn grid_renders_only_resolved_visualizations() {
        take_renders();
        let reg = recording_registry("rec-grid");
        let formats = FormatRegistry::with_defaults();
        let data = PanelDataCache::new();
        let shown = panel(3, "rec-grid", 1);
        let key = FetchKey::default();
        data.request(shown.key, key.clone());
        data.store(shown.key, key, vec![Series::default(), Series::default()], None);
        let panels = vec![
            Some(panel(1, ROW_PANEL_TYPE, 0)),
            None,
            Some(shown),
            Some(panel(4, "gauge", 5)),
            Some(panel(5, ADD_PANEL_TYPE, 9)),
        ];
        let ctx = RenderContext {
            visualizations: &reg,
            formats: &formats,
            data: &data,
            readonly: false,
        };
        let layout = build_layout(&panels, false);
        let mut view = DashboardView::default();
        egui::__run_test_ui(|ui| {
            let actions = view.ui(ui, &panels, &layout, &ctx);
            assert!(actions.is_empty());
        });
        assert_eq!(take_renders(), vec![(3, 2)]);
    }

    #[test]
    fn handles_follow_layout_flags() {
        let panels = vec![
            Some(panel(1, ROW_PANEL_TYPE, 0)),
            Some(panel(2, "pie", 1)),
        ];
        let editable = build_layout(&panels, false);
        assert_eq!(handle_kinds(&editable[0]), vec![false]);
        assert_eq!(handle_kinds(&editable[1]), vec![false, true]);
        let readonly = build_layout(&panels, true);
        assert!(readonly.iter().all(|item| handle_kinds(item).is_empty()));
    }

    #[test]
    fn snap_moves_and_resizes_within_columns() {
        let origin = GridPos::new(2, 3, 6, 4);
        let cell = egui::vec2(10.0, 30.0);
        let moved = snap(&origin, egui::vec2(26.0, -200.0), cell, 24, false);
        assert_eq!((moved.x, moved.y, moved.w, moved.h), (5, 0, 6, 4));
        let far = snap(&origin, egui::vec2(1000.0, 0.0), cell, 24, false);
        assert_eq!(far.x, 18);
        let resized = snap(&origin, egui::vec2(-100.0, 61.0), cell, 24, true);
        assert_eq!((resized.x, resized.w, resized.h), (2, 1, 6));
        let wide = snap(&origin, egui::vec2(1000.0, 0.0), cell, 24, true);
        assert_eq!(wide.w, 22);
    }
}
