use super::legend::{
    legend_editor, legend_ui, LegendDisplayMode, LegendOptions, LegendPlacement, LegendRow,
};
use super::reduce::ReduceCalc;
use super::{
    choice, edit_typed_options, no_data, series_color, typed_options, DatasetType, PanelProps,
    VisualizationCategory, VisualizationPlugin,
};
use crate::datasource::Series;
use crate::format::FormatRegistry;
use crate::plugin::{Plugin, PluginMeta};
use eframe::egui;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f32::consts::{FRAC_PI_2, TAU};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PieType {
    #[default]
    Pie,
    Donut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PieOptions {
    pub pie_type: PieType,
    pub reduce: ReduceCalc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub legend: LegendOptions,
}

impl Default for PieOptions {
    fn default() -> Self {
        Self {
            pie_type: PieType::Pie,
            reduce: ReduceCalc::Last,
            unit: None,
            legend: LegendOptions {
                show_legend: true,
                display_mode: LegendDisplayMode::Table,
                placement: LegendPlacement::Right,
                values: vec!["percent".into()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub name: String,
    pub value: f64,
    pub percent: f64,
    pub color: egui::Color32,
}

/// Reduce every series to a slice. Non-positive and empty series are left out.
pub fn compute_slices(datasets: &[Series], reduce: ReduceCalc) -> Vec<Slice> {
    let reduced: Vec<(usize, &Series, f64)> = datasets
        .iter()
        .enumerate()
        .filter_map(|(i, s)| reduce.apply(&s.points).map(|v| (i, s, v)))
        .filter(|(_, _, v)| *v > 0.0)
        .collect();
    let total: f64 = reduced.iter().map(|(_, _, v)| v).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    reduced
        .into_iter()
        .map(|(i, s, value)| Slice {
            name: s.name.clone(),
            value,
            percent: value / total * 100.0,
            color: series_color(i),
        })
        .collect()
}

fn paint_pie(ui: &mut egui::Ui, slices: &[Slice], pie_type: PieType, size: f32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::hover());
    let painter = ui.painter_at(rect);
    let center = rect.center();
    let radius = size * 0.45;
    let mut start = -FRAC_PI_2;
    for slice in slices {
        let sweep = (slice.percent / 100.0) as f32 * TAU;
        let steps = ((sweep / TAU) * 96.0).ceil().max(1.0) as usize;
        for step in 0..steps {
            let a0 = start + sweep * step as f32 / steps as f32;
            let a1 = start + sweep * (step + 1) as f32 / steps as f32;
            painter.add(egui::Shape::convex_polygon(
                vec![
                    center,
                    center + radius * egui::vec2(a0.cos(), a0.sin()),
                    center + radius * egui::vec2(a1.cos(), a1.sin()),
                ],
                slice.color,
                egui::Stroke::NONE,
            ));
        }
        start += sweep;
    }
    if pie_type == PieType::Donut {
        painter.circle_filled(center, radius * 0.55, ui.visuals().panel_fill);
    }
}

fn legend_rows(
    slices: &[Slice],
    formats: &FormatRegistry,
    unit: Option<&str>,
) -> Vec<LegendRow> {
    slices
        .iter()
        .map(|s| LegendRow {
            name: s.name.clone(),
            color: s.color,
            values: vec![
                ("percent".into(), format!("{:.0}%", s.percent)),
                (
                    "value".into(),
                    formats
                        .format(unit.unwrap_or("none_none"), s.value, None)
                        .to_string(),
                ),
            ],
        })
        .collect()
}

pub struct PiePlugin {
    meta: PluginMeta,
}

impl PiePlugin {
    pub fn new() -> Self {
        Self {
            meta: PluginMeta::new("Pie chart", "pie", "Share of each series in the total"),
        }
    }
}

impl Default for PiePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PiePlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

impl VisualizationPlugin for PiePlugin {
    fn category(&self) -> VisualizationCategory {
        VisualizationCategory::Chart
    }

    fn render(&self, ui: &mut egui::Ui, props: &PanelProps<'_>) {
        let options: PieOptions = typed_options(&props.panel.options);
        let slices = compute_slices(props.datasets, options.reduce);
        if slices.is_empty() {
            no_data(ui);
            return;
        }
        let rows = legend_rows(&slices, props.formats, options.unit.as_deref());
        let legend_id = egui::Id::new(("pie-legend", props.panel.id));
        let avail = ui.available_size();
        if options.legend.visible() && options.legend.placement == LegendPlacement::Right {
            ui.horizontal(|ui| {
                let size = (avail.x * 0.6).min(avail.y).max(16.0);
                paint_pie(ui, &slices, options.pie_type, size);
                ui.vertical(|ui| legend_ui(ui, legend_id, &options.legend, &rows));
            });
        } else {
            ui.vertical(|ui| {
                let reserve = if options.legend.visible() { 40.0 } else { 0.0 };
                let size = avail.x.min(avail.y - reserve).max(16.0);
                paint_pie(ui, &slices, options.pie_type, size);
                legend_ui(ui, legend_id, &options.legend, &rows);
            });
        }
    }

    fn options_editor(&self, ui: &mut egui::Ui, options: &mut Value) -> bool {
        edit_typed_options(ui, options, |ui, cfg: &mut PieOptions| {
            let mut changed = choice(
                ui,
                "Pie type",
                &mut cfg.pie_type,
                &[(PieType::Pie, "Pie"), (PieType::Donut, "Donut")],
            );
            changed |= choice(
                ui,
                "Value",
                &mut cfg.reduce,
                &ReduceCalc::ALL.map(|c| (c, c.label())),
            );
            changed |= legend_editor(ui, &mut cfg.legend);
            changed
        })
    }

    fn default_options(&self) -> Value {
        serde_json::to_value(PieOptions::default()).unwrap_or_else(|_| json!({}))
    }

    fn dataset_type(&self, _options: &Value) -> DatasetType {
        DatasetType::Snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, last: f64) -> Series {
        Series {
            ref_id: "A".into(),
            name: name.into(),
            points: vec![(0, 1.0), (1, last)],
            ..Default::default()
        }
    }

    #[test]
    fn default_options_shape() {
        let opts = PiePlugin::new().default_options();
        assert_eq!(opts["pieType"], "pie");
        assert_eq!(
            opts["legend"],
            json!({
                "showLegend": true,
                "displayMode": "table",
                "placement": "right",
                "values": ["percent"]
            })
        );
    }

    #[test]
    fn slices_share_the_total() {
        let slices = compute_slices(
            &[series("a", 30.0), series("b", 0.0), series("c", 10.0)],
            ReduceCalc::Last,
        );
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].name, "a");
        assert!((slices[0].percent - 75.0).abs() < 1e-9);
        assert!((slices[1].percent - 25.0).abs() < 1e-9);
        assert_ne!(slices[0].color, slices[1].color);
    }

    #[test]
    fn no_positive_values_means_no_slices() {
        assert!(compute_slices(&[series("a", 0.0)], ReduceCalc::Last).is_empty());
        assert!(compute_slices(&[], ReduceCalc::Sum).is_empty());
    }

    #[test]
    fn legend_rows_carry_percent_and_value() {
        let formats = FormatRegistry::with_defaults();
        let slices = compute_slices(&[series("a", 1024.0)], ReduceCalc::Last);
        let rows = legend_rows(&slices, &formats, Some("data_bytes"));
        assert_eq!(rows[0].values[0].1, "100%");
        assert_eq!(rows[0].values[1].1, "1 KiB");
    }
}
