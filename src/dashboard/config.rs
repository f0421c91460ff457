use crate::dashboard::layout::{clamp_to_columns, sort_panels, GRID_COLUMNS};
use crate::dashboard::model::{Dashboard, GridPos, PanelSetting, Query, Variable, ROW_PANEL_TYPE};
use crate::visualization::VisualizationRegistry;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Load a dashboard from disk. A missing or empty file yields the starter
/// dashboard; panels are repaired against `registry`.
pub fn load(
    path: impl AsRef<Path>,
    registry: &VisualizationRegistry,
) -> anyhow::Result<Dashboard> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).unwrap_or_default();
    if content.trim().is_empty() {
        return Ok(starter_dashboard());
    }
    let mut dashboard: Dashboard = serde_json::from_str(&content)?;
    for w in sanitize(&mut dashboard, registry) {
        tracing::warn!("{w}");
    }
    Ok(dashboard)
}

pub fn save(dashboard: &Dashboard, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(dashboard)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn path_for(base: &str) -> PathBuf {
    let base = Path::new(base);
    if base.is_dir() {
        base.join("dashboard.json")
    } else {
        PathBuf::from(base)
    }
}

fn repair_panel(
    panel: &mut PanelSetting,
    registry: &VisualizationRegistry,
    seen: &mut HashSet<u32>,
    next_id: &mut u32,
    warnings: &mut Vec<String>,
) {
    if !seen.insert(panel.id) {
        let old = panel.id;
        while seen.contains(next_id) {
            *next_id += 1;
        }
        panel.id = *next_id;
        seen.insert(panel.id);
        warnings.push(format!("duplicate panel id {old} reassigned to {}", panel.id));
    }
    if panel.grid.i != panel.id.to_string() {
        panel.sync_grid_key();
    }
    if clamp_to_columns(&mut panel.grid, GRID_COLUMNS) {
        warnings.push(format!("panel {} clamped into the grid", panel.id));
    }
    if panel.is_row() || panel.is_add_panel() {
        return;
    }
    match registry.get(&panel.panel_type) {
        Some(plugin) => {
            let empty = panel.options.is_null()
                || panel.options.as_object().is_some_and(|o| o.is_empty());
            if empty {
                panel.options = plugin.default_options();
            }
        }
        None => warnings.push(format!(
            "panel {} has unknown type '{}'",
            panel.id, panel.panel_type
        )),
    }
}

/// Repair a freshly loaded dashboard in place.
///
/// Null panels are dropped, duplicate ids get fresh ones, `grid.i` is
/// re-synced, geometry is clamped into the grid and empty options are
/// replaced by the plugin defaults. Unknown panel types are kept and
/// reported; they render as nothing.
pub fn sanitize(dashboard: &mut Dashboard, registry: &VisualizationRegistry) -> Vec<String> {
    let mut warnings = Vec::new();
    let before = dashboard.config.panels.len();
    dashboard.config.panels.retain(Option::is_some);
    let dropped = before - dashboard.config.panels.len();
    if dropped > 0 {
        warnings.push(format!("{dropped} empty panel entries dropped"));
    }

    let mut seen = HashSet::new();
    let mut next_id = dashboard.next_panel_id();
    for panel in dashboard.config.panels_mut() {
        repair_panel(panel, registry, &mut seen, &mut next_id, &mut warnings);
        for child in &mut panel.panels {
            repair_panel(child, registry, &mut seen, &mut next_id, &mut warnings);
        }
    }
    sort_panels(&mut dashboard.config.panels);
    warnings
}

fn testdata_target(ref_id: &str, request: serde_json::Value) -> Query {
    Query::new(ref_id, "", request)
}

/// Dashboard shown when nothing has been saved yet.
pub fn starter_dashboard() -> Dashboard {
    let mut dashboard = Dashboard::new("home", "Home");
    let row = PanelSetting::new(1, ROW_PANEL_TYPE, GridPos::new(0, 0, GRID_COLUMNS, 1))
        .with_title("Overview");

    let mut series =
        PanelSetting::new(2, "timeseries", GridPos::new(0, 1, 16, 8)).with_title("Requests");
    series.targets.push(testdata_target(
        "A",
        json!({"scenario": "random_walk", "seriesCount": 3, "alias": "$host"}),
    ));

    let mut stat = PanelSetting::new(3, "stat", GridPos::new(16, 1, 8, 4))
        .with_title("CPU")
        .with_options(json!({"unit": "percent_percent"}));
    stat.targets.push(testdata_target("A", json!({"scenario": "constant", "value": 42})));

    let mut pie =
        PanelSetting::new(4, "pie", GridPos::new(16, 5, 8, 4)).with_title("Traffic share");
    pie.targets.push(testdata_target(
        "A",
        json!({"scenario": "random_walk", "seriesCount": 4}),
    ));

    dashboard.config.panels = vec![Some(row), Some(series), Some(stat), Some(pie)];
    dashboard.config.variables = vec![Variable::new("host", "web-1")];
    dashboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::{registry, PiePlugin};
    use std::sync::Arc;

    fn pie_registry() -> VisualizationRegistry {
        let mut reg = registry();
        reg.register(Arc::new(PiePlugin::new()));
        reg
    }

    #[test]
    fn missing_file_yields_starter() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = load(dir.path().join("none.json"), &pie_registry()).unwrap();
        assert_eq!(dashboard.uid, "home");
        assert!(dashboard.panel(2).is_some());
    }

    #[test]
    fn sanitize_repairs_panels() {
        let mut dashboard: Dashboard = serde_json::from_value(json!({
            "uid": "d",
            "config": {"panels": [
                null,
                {"id": 1, "type": "pie", "grid": {"x": 20, "y": 0, "w": 10, "h": 4, "i": "x"}},
                {"id": 1, "type": "gauge", "options": {"a": 1}}
            ]}
        }))
        .unwrap();
        let warnings = sanitize(&mut dashboard, &pie_registry());
        assert_eq!(dashboard.config.panels.len(), 2);
        let pie = dashboard.panel(1).unwrap();
        assert_eq!(pie.grid.i, "1");
        assert_eq!((pie.grid.x, pie.grid.w), (14, 10));
        assert_eq!(pie.options["pieType"], "pie");
        let other = dashboard.config.panels().find(|p| p.panel_type == "gauge").unwrap();
        assert_eq!(other.id, 2);
        assert_eq!(other.grid.i, "2");
        assert!(warnings.iter().any(|w| w.contains("unknown type 'gauge'")));
        assert!(warnings.iter().any(|w| w.contains("duplicate panel id 1")));
    }

    #[test]
    fn save_then_load_keeps_panels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dash.json");
        let dashboard = starter_dashboard();
        save(&dashboard, &path).unwrap();
        let loaded = load(&path, &pie_registry()).unwrap();
        assert_eq!(loaded.config.panels().count(), 4);
        assert_eq!(loaded.panel(3).unwrap().options["unit"], "percent_percent");
    }

    #[test]
    fn path_for_directory_appends_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        assert_eq!(path_for(&base), dir.path().join("dashboard.json"));
    }
}
