use super::reduce::ReduceCalc;
use super::thresholds::{active_threshold, default_thresholds, sort_thresholds, Threshold};
use super::timeseries::Bounds;
use super::{
    choice, edit_typed_options, no_data, parse_color, typed_options, DatasetType, PanelProps,
    VisualizationCategory, VisualizationPlugin,
};
use crate::datasource::Series;
use crate::format::FormatRegistry;
use crate::plugin::{Plugin, PluginMeta};
use eframe::egui;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorMode {
    #[default]
    Value,
    Background,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphMode {
    #[default]
    None,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatOptions {
    pub reduce: ReduceCalc,
    pub unit: String,
    pub decimals: Option<usize>,
    pub thresholds: Vec<Threshold>,
    pub color_mode: ColorMode,
    pub graph_mode: GraphMode,
}

impl Default for StatOptions {
    fn default() -> Self {
        Self {
            reduce: ReduceCalc::Last,
            unit: "none_none".into(),
            decimals: None,
            thresholds: default_thresholds(),
            color_mode: ColorMode::Value,
            graph_mode: GraphMode::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatValue {
    pub name: String,
    pub text: String,
    pub color: egui::Color32,
}

/// One formatted, threshold-colored value per series with data.
pub fn stat_values(
    datasets: &[Series],
    opts: &StatOptions,
    formats: &FormatRegistry,
) -> Vec<StatValue> {
    let mut thresholds = opts.thresholds.clone();
    sort_thresholds(&mut thresholds);
    datasets
        .iter()
        .filter_map(|s| {
            let value = opts.reduce.apply(&s.points)?;
            let color = active_threshold(&thresholds, value)
                .and_then(|t| parse_color(&t.color))
                .unwrap_or(egui::Color32::GRAY);
            Some(StatValue {
                name: s.name.clone(),
                text: formats.format(&opts.unit, value, opts.decimals).to_string(),
                color,
            })
        })
        .collect()
}

fn paint_sparkline(ui: &egui::Ui, rect: egui::Rect, series: &Series, color: egui::Color32) {
    let Some(bounds) = Bounds::of(std::slice::from_ref(series)) else {
        return;
    };
    let line: Vec<egui::Pos2> = series
        .points
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(t, v)| bounds.project(rect, *t, *v))
        .collect();
    if line.len() > 1 {
        ui.painter_at(rect)
            .add(egui::Shape::line(line, egui::Stroke::new(1.5, color.gamma_multiply(0.6))));
    }
}

pub struct StatPlugin {
    meta: PluginMeta,
}

impl StatPlugin {
    pub fn new() -> Self {
        Self {
            meta: PluginMeta::new("Stat", "stat", "Big single values with thresholds"),
        }
    }
}

impl Default for StatPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for StatPlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

impl VisualizationPlugin for StatPlugin {
    fn category(&self) -> VisualizationCategory {
        VisualizationCategory::Stat
    }

    fn render(&self, ui: &mut egui::Ui, props: &PanelProps<'_>) {
        let opts: StatOptions = typed_options(&props.panel.options);
        let values = stat_values(props.datasets, &opts, props.formats);
        if values.is_empty() {
            no_data(ui);
            return;
        }
        let avail = ui.available_size();
        let cell = egui::vec2(avail.x / values.len() as f32, avail.y);
        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing.x = 0.0;
            for (value, series) in values.iter().zip(props.datasets) {
                let (rect, _) = ui.allocate_exact_size(cell, egui::Sense::hover());
                let painter = ui.painter_at(rect);
                let text_color = match opts.color_mode {
                    ColorMode::Value => value.color,
                    ColorMode::Background => {
                        painter.rect_filled(rect.shrink(2.0), 4.0, value.color);
                        egui::Color32::WHITE
                    }
                };
                if opts.graph_mode == GraphMode::Area {
                    paint_sparkline(ui, rect.shrink(4.0), series, text_color);
                }
                let size = (rect.height() * 0.4).clamp(12.0, 64.0);
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    &value.text,
                    egui::FontId::proportional(size),
                    text_color,
                );
                if values.len() > 1 {
                    painter.text(
                        rect.center_top() + egui::vec2(0.0, 4.0),
                        egui::Align2::CENTER_TOP,
                        &value.name,
                        egui::FontId::proportional(11.0),
                        ui.visuals().text_color(),
                    );
                }
            }
        });
    }

    fn options_editor(&self, ui: &mut egui::Ui, options: &mut Value) -> bool {
        edit_typed_options(ui, options, |ui, cfg: &mut StatOptions| {
            let mut changed = choice(
                ui,
                "Calculation",
                &mut cfg.reduce,
                &ReduceCalc::ALL.map(|c| (c, c.label())),
            );
            changed |= choice(
                ui,
                "Color mode",
                &mut cfg.color_mode,
                &[
                    (ColorMode::Value, "Value"),
                    (ColorMode::Background, "Background"),
                ],
            );
            changed |= choice(
                ui,
                "Graph mode",
                &mut cfg.graph_mode,
                &[(GraphMode::None, "None"), (GraphMode::Area, "Area")],
            );
            changed |= ui
                .horizontal(|ui| {
                    ui.label("Unit");
                    ui.text_edit_singleline(&mut cfg.unit).changed()
                })
                .inner;
            ui.label("Thresholds");
            for threshold in cfg.thresholds.iter_mut() {
                changed |= ui
                    .horizontal(|ui| {
                        let mut c = ui.text_edit_singleline(&mut threshold.color).changed();
                        match threshold.value.as_mut() {
                            Some(value) => c |= ui.add(egui::DragValue::new(value)).changed(),
                            None => {
                                ui.label("Base");
                            }
                        }
                        c
                    })
                    .inner;
            }
            if ui.button("Add threshold").clicked() {
                let next = cfg
                    .thresholds
                    .iter()
                    .filter_map(|t| t.value)
                    .fold(0.0, f64::max)
                    + 10.0;
                cfg.thresholds.push(Threshold::at(next, "red"));
                changed = true;
            }
            changed
        })
    }

    fn default_options(&self) -> Value {
        serde_json::to_value(StatOptions::default()).unwrap_or_else(|_| json!({}))
    }

    fn dataset_type(&self, options: &Value) -> DatasetType {
        let opts: StatOptions = typed_options(options);
        match opts.graph_mode {
            GraphMode::Area => DatasetType::TimeSeries,
            GraphMode::None => DatasetType::Snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::PALETTE;

    fn series(name: &str, last: f64) -> Series {
        Series {
            name: name.into(),
            points: vec![(0, 0.0), (1, last)],
            ..Default::default()
        }
    }

    #[test]
    fn values_are_formatted_and_colored() {
        let opts = StatOptions {
            unit: "percent_percent".into(),
            ..Default::default()
        };
        let formats = FormatRegistry::with_defaults();
        let values = stat_values(&[series("cpu", 42.0), series("mem", 91.0)], &opts, &formats);
        assert_eq!(values[0].text, "42%");
        assert_eq!(values[0].color, PALETTE[0]);
        assert_eq!(values[1].color, PALETTE[4]);
    }

    #[test]
    fn empty_series_are_skipped() {
        let formats = FormatRegistry::with_defaults();
        let values = stat_values(&[Series::default()], &StatOptions::default(), &formats);
        assert!(values.is_empty());
    }

    #[test]
    fn graph_mode_selects_dataset_type() {
        let stat = StatPlugin::new();
        assert_eq!(stat.dataset_type(&json!({})), DatasetType::Snapshot);
        assert_eq!(
            stat.dataset_type(&json!({"graphMode": "area"})),
            DatasetType::TimeSeries
        );
    }
}
