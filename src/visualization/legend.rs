use super::choice;
use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegendDisplayMode {
    #[default]
    List,
    Table,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegendPlacement {
    #[default]
    Bottom,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegendOptions {
    pub show_legend: bool,
    pub display_mode: LegendDisplayMode,
    pub placement: LegendPlacement,
    /// Extra value columns, e.g. `"percent"`, `"value"` or `"last"`.
    pub values: Vec<String>,
}

impl Default for LegendOptions {
    fn default() -> Self {
        Self {
            show_legend: true,
            display_mode: LegendDisplayMode::List,
            placement: LegendPlacement::Bottom,
            values: Vec::new(),
        }
    }
}

impl LegendOptions {
    pub fn visible(&self) -> bool {
        self.show_legend && self.display_mode != LegendDisplayMode::Hidden
    }
}

pub struct LegendRow {
    pub name: String,
    pub color: egui::Color32,
    /// `(column, text)` pairs.
    pub values: Vec<(String, String)>,
}

fn swatch(ui: &mut egui::Ui, color: egui::Color32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
    ui.painter().rect_filled(rect, 2.0, color);
}

pub fn legend_ui(ui: &mut egui::Ui, id: egui::Id, options: &LegendOptions, rows: &[LegendRow]) {
    if !options.visible() || rows.is_empty() {
        return;
    }
    match options.display_mode {
        LegendDisplayMode::Table => {
            egui::Grid::new(id).striped(true).show(ui, |ui| {
                ui.label("");
                ui.strong("Name");
                for column in &options.values {
                    ui.strong(column);
                }
                ui.end_row();
                for row in rows {
                    swatch(ui, row.color);
                    ui.label(&row.name);
                    for column in &options.values {
                        let text = row
                            .values
                            .iter()
                            .find(|(c, _)| c == column)
                            .map(|(_, t)| t.as_str())
                            .unwrap_or("");
                        ui.label(text);
                    }
                    ui.end_row();
                }
            });
        }
        _ => {
            ui.horizontal_wrapped(|ui| {
                for row in rows {
                    swatch(ui, row.color);
                    ui.label(&row.name);
                    for (_, text) in &row.values {
                        ui.weak(text);
                    }
                    ui.add_space(8.0);
                }
            });
        }
    }
}

pub fn legend_editor(ui: &mut egui::Ui, legend: &mut LegendOptions) -> bool {
    let mut changed = ui.checkbox(&mut legend.show_legend, "Show legend").changed();
    changed |= choice(
        ui,
        "Legend mode",
        &mut legend.display_mode,
        &[
            (LegendDisplayMode::List, "List"),
            (LegendDisplayMode::Table, "Table"),
            (LegendDisplayMode::Hidden, "Hidden"),
        ],
    );
    changed |= choice(
        ui,
        "Legend placement",
        &mut legend.placement,
        &[
            (LegendPlacement::Bottom, "Bottom"),
            (LegendPlacement::Right, "Right"),
        ],
    );
    changed
}
