pub mod legend;
pub mod pie;
pub mod reduce;
pub mod stat;
pub mod thresholds;
pub mod timeseries;

use crate::common::json::merge_json;
use crate::dashboard::model::PanelSetting;
use crate::datasource::Series;
use crate::format::FormatRegistry;
use crate::plugin::{Plugin, Registry};
use eframe::egui;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

pub use crate::datasource::DatasetType;
pub use pie::PiePlugin;
pub use stat::StatPlugin;
pub use timeseries::TimeseriesPlugin;

/// Inputs of a visualization render.
#[derive(Clone, Copy)]
pub struct PanelProps<'a> {
    pub panel: &'a PanelSetting,
    pub datasets: &'a [Series],
    pub formats: &'a FormatRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualizationCategory {
    Chart,
    Stat,
    Other,
}

/// Declares a panel type: how it draws and how its options are edited.
pub trait VisualizationPlugin: Plugin {
    fn category(&self) -> VisualizationCategory;

    fn render(&self, ui: &mut egui::Ui, props: &PanelProps<'_>);

    /// Returns `true` when `options` was modified.
    fn options_editor(&self, _ui: &mut egui::Ui, _options: &mut Value) -> bool {
        false
    }

    fn default_options(&self) -> Value;

    fn dataset_type(&self, _options: &Value) -> DatasetType {
        DatasetType::TimeSeries
    }
}

pub type VisualizationRegistry = Registry<dyn VisualizationPlugin>;

pub fn registry() -> VisualizationRegistry {
    Registry::new("visualization")
}

/// Options of a panel, falling back to the plugin defaults when unset.
pub fn options_or_default(plugin: &dyn VisualizationPlugin, options: &Value) -> Value {
    match options {
        Value::Null => plugin.default_options(),
        Value::Object(map) if map.is_empty() => plugin.default_options(),
        other => other.clone(),
    }
}

/// Decode typed options, leaving defaults for anything missing or invalid.
pub(crate) fn typed_options<C: DeserializeOwned + Default>(options: &Value) -> C {
    serde_json::from_value(options.clone()).unwrap_or_else(|e| {
        tracing::debug!("invalid panel options, using defaults: {e}");
        C::default()
    })
}

/// Edit `value` through a typed view while preserving unknown fields.
pub(crate) fn edit_typed_options<C: DeserializeOwned + Serialize + Default>(
    ui: &mut egui::Ui,
    value: &mut Value,
    render: impl FnOnce(&mut egui::Ui, &mut C) -> bool,
) -> bool {
    let mut changed = false;
    if value.is_null() {
        *value = serde_json::to_value(C::default()).unwrap_or_else(|_| json!({}));
        changed = true;
    }
    let original = value.clone();
    let mut cfg: C = match serde_json::from_value(original.clone()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui.colored_label(egui::Color32::RED, format!("Failed to parse options: {e}"));
            C::default()
        }
    };
    if !render(ui, &mut cfg) {
        return changed;
    }
    let serialized = serde_json::to_value(&cfg).unwrap_or_else(|_| json!({}));
    let merged = merge_json(&original, &serialized);
    if merged != *value {
        *value = merged;
        changed = true;
    }
    changed
}

/// Combo box over a fixed set of choices. Returns `true` on change.
pub(crate) fn choice<T: PartialEq + Copy>(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut T,
    options: &[(T, &str)],
) -> bool {
    let selected = options
        .iter()
        .find(|(v, _)| *v == *value)
        .map(|(_, l)| *l)
        .unwrap_or("");
    let mut changed = false;
    egui::ComboBox::from_label(label)
        .selected_text(selected)
        .show_ui(ui, |ui| {
            for (v, l) in options {
                changed |= ui.selectable_value(&mut *value, *v, *l).changed();
            }
        });
    changed
}

pub const PALETTE: [egui::Color32; 8] = [
    egui::Color32::from_rgb(115, 191, 105),
    egui::Color32::from_rgb(242, 204, 12),
    egui::Color32::from_rgb(138, 184, 255),
    egui::Color32::from_rgb(255, 152, 48),
    egui::Color32::from_rgb(242, 73, 92),
    egui::Color32::from_rgb(87, 148, 242),
    egui::Color32::from_rgb(184, 119, 217),
    egui::Color32::from_rgb(112, 93, 160),
];

pub fn series_color(index: usize) -> egui::Color32 {
    PALETTE[index % PALETTE.len()]
}

/// Parse `#rrggbb` or one of the named palette colors.
pub fn parse_color(input: &str) -> Option<egui::Color32> {
    let input = input.trim();
    if let Some(hex) = input.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?));
    }
    match input.to_ascii_lowercase().as_str() {
        "green" => Some(PALETTE[0]),
        "yellow" => Some(PALETTE[1]),
        "blue" => Some(PALETTE[5]),
        "orange" => Some(PALETTE[3]),
        "red" => Some(PALETTE[4]),
        "purple" => Some(PALETTE[6]),
        _ => None,
    }
}

/// Shown instead of a chart when there is nothing to draw.
pub(crate) fn no_data(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.weak("No data");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_named_colors() {
        assert_eq!(
            parse_color("#ff8000"),
            Some(egui::Color32::from_rgb(255, 128, 0))
        );
        assert_eq!(parse_color("Red"), Some(PALETTE[4]));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("chartreuse"), None);
    }

    #[test]
    fn empty_options_fall_back_to_defaults() {
        let pie = PiePlugin::new();
        assert_eq!(options_or_default(&pie, &json!({})), pie.default_options());
        let custom = json!({"pieType": "donut"});
        assert_eq!(options_or_default(&pie, &custom), custom);
    }

    #[test]
    fn builtins_resolve_by_type() {
        let mut reg = registry();
        reg.register(std::sync::Arc::new(PiePlugin::new()))
            .register(std::sync::Arc::new(TimeseriesPlugin::new()))
            .register(std::sync::Arc::new(StatPlugin::new()));
        assert_eq!(reg.keys(), vec!["pie", "timeseries", "stat"]);
        assert!(reg.get("gauge").is_none());
    }
}
