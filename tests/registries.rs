use gridscope::app::Registries;
use gridscope::dashboard::model::{GridPos, PanelSetting};
use gridscope::dashboard::render::{panel_kind, PanelKind};
use gridscope::plugin::{Plugin, PluginMeta};
use gridscope::visualization::{
    PanelProps, PiePlugin, VisualizationCategory, VisualizationPlugin,
};
use serde_json::{json, Value};
use std::sync::Arc;

struct Gauge {
    meta: PluginMeta,
}

impl Plugin for Gauge {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

impl VisualizationPlugin for Gauge {
    fn category(&self) -> VisualizationCategory {
        VisualizationCategory::Other
    }

    fn render(&self, _ui: &mut eframe::egui::Ui, _props: &PanelProps<'_>) {}

    fn default_options(&self) -> Value {
        json!({"min": 0})
    }
}

#[test]
fn pie_resolves_with_table_legend_defaults() {
    let registries = Registries::with_builtins();
    let pie = registries.visualizations.get("pie").expect("pie registered");
    assert_eq!(pie.name(), "Pie chart");
    let options = pie.default_options();
    assert_eq!(options["pieType"], "pie");
    assert_eq!(options["legend"]["showLegend"], true);
    assert_eq!(options["legend"]["displayMode"], "table");
    assert_eq!(options["legend"]["placement"], "right");
    assert_eq!(options["legend"]["values"], json!(["percent"]));
}

#[test]
fn re_registering_replaces_in_place() {
    let mut registries = Registries::with_builtins();
    registries.visualizations.register(Arc::new(Gauge {
        meta: PluginMeta::new("Gauge", "gauge", ""),
    }));
    registries.visualizations.register(Arc::new(PiePlugin::new()));
    assert_eq!(
        registries.visualizations.keys(),
        vec!["pie", "timeseries", "stat", "gauge"]
    );

    registries.visualizations.register(Arc::new(Gauge {
        meta: PluginMeta::new("Gauge v2", "gauge", ""),
    }));
    assert_eq!(registries.visualizations.len(), 4);
    assert_eq!(registries.visualizations.get("gauge").unwrap().name(), "Gauge v2");
}

#[test]
fn unknown_types_degrade_gracefully() {
    let registries = Registries::with_builtins();
    assert!(registries.visualizations.get("heatmap").is_none());
    assert!(registries.datasources.get("prometheus").is_none());
    let panel = PanelSetting::new(1, "heatmap", GridPos::new(0, 0, 4, 4));
    assert!(matches!(
        panel_kind(&panel, &registries.visualizations),
        PanelKind::Unresolved
    ));

    let formatted = registries.formats.format("made_up", 1.23456, Some(2));
    assert_eq!(formatted.to_string(), "1.23");
}

#[test]
fn features_create_pages_by_route() {
    let registries = Registries::with_builtins();
    assert!(registries.features.create("dashboard").is_some());
    assert!(registries.features.create("explore").is_some());
    assert!(registries.features.create("admin").is_none());
}
