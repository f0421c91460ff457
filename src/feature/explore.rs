use super::{Feature, FeatureContext};
use crate::dashboard::model::{GridPos, PanelSetting, Query};
use crate::datasource::{query_metrics, DatasourceStore, QueryContext, Series};
use crate::query::QueryEditor;
use crate::variables::{TimeRange, VariableValues};
use crate::visualization::PanelProps;
use chrono::Utc;
use eframe::egui;
use serde_json::{json, Value};

/// Run every active, visible target of `editor` against the datasources.
pub fn run_queries(
    editor: &QueryEditor,
    datasources: &DatasourceStore,
    range: &TimeRange,
    values: &VariableValues,
) -> anyhow::Result<Vec<Series>> {
    let targets: Vec<Query> = editor.active_targets().into_iter().cloned().collect();
    let resolved = range.resolve(Utc::now())?;
    let ctx = QueryContext::new(resolved, values);
    Ok(query_metrics(&targets, datasources, &ctx))
}

/// Ad-hoc query page: edit targets, run them and plot the result.
pub struct ExploreFeature {
    queries: QueryEditor,
    drafts: Vec<String>,
    results: Vec<Series>,
    panel: PanelSetting,
}

impl Default for ExploreFeature {
    fn default() -> Self {
        let mut queries = QueryEditor::new();
        queries.add_target("", json!({"scenario": "random_walk"}));
        let drafts = queries
            .targets()
            .iter()
            .map(|t| t.request.to_string())
            .collect();
        Self {
            queries,
            drafts,
            results: Vec::new(),
            panel: PanelSetting::new(0, "timeseries", GridPos::new(0, 0, 24, 10)),
        }
    }
}

impl ExploreFeature {
    fn sync_drafts(&mut self) {
        self.drafts = self
            .queries
            .targets()
            .iter()
            .map(|t| t.request.to_string())
            .collect();
    }

    fn targets_ui(&mut self, ui: &mut egui::Ui, ctx: &FeatureContext<'_>) {
        let mut toggle = None;
        let mut delete = None;
        let mut edited = Vec::new();
        for (index, target) in self.queries.targets().iter().enumerate() {
            ui.horizontal(|ui| {
                let mut active = self.queries.is_active(&target.ref_id);
                if ui.checkbox(&mut active, &target.ref_id).changed() {
                    toggle = Some(target.ref_id.clone());
                }
                ui.label(if target.datasource.uid.is_empty() {
                    "default"
                } else {
                    target.datasource.uid.as_str()
                });
                if let Some(draft) = self.drafts.get_mut(index) {
                    if ui.text_edit_singleline(draft).lost_focus() {
                        edited.push(index);
                    }
                }
                if ui.small_button("✖").clicked() {
                    delete = Some(index);
                }
            });
        }
        for index in edited {
            let Some(draft) = self.drafts.get(index) else {
                continue;
            };
            match serde_json::from_str::<Value>(draft) {
                Ok(request) => {
                    self.queries
                        .update_target_config(index, &json!({ "request": request }));
                }
                Err(e) => tracing::debug!(index, "ignoring malformed request draft: {e}"),
            }
        }
        if let Some(ref_id) = toggle {
            self.queries.toggle_active(&ref_id);
        }
        if let Some(index) = delete {
            self.queries.delete_target(index);
            self.sync_drafts();
        }
        if ui.button("Add query").clicked() {
            let params = ctx
                .datasources
                .default_instance()
                .and_then(|i| i.plugin.default_params())
                .unwrap_or_else(|| json!({}));
            self.queries.add_target("", params);
            self.sync_drafts();
        }
    }
}

impl Feature for ExploreFeature {
    fn ui(&mut self, ui: &mut egui::Ui, ctx: &mut FeatureContext<'_>) {
        ui.heading("Explore");
        self.targets_ui(ui, ctx);
        if ui.button("Run").clicked() {
            match run_queries(&self.queries, ctx.datasources, &ctx.range, ctx.values) {
                Ok(series) => self.results = series,
                Err(e) => ctx.notices.push(format!("Query failed: {e}")),
            }
        }
        ui.separator();
        let Some(plugin) = ctx.visualizations.get(&self.panel.panel_type) else {
            return;
        };
        let props = PanelProps {
            panel: &self.panel,
            datasets: &self.results,
            formats: ctx.formats,
        };
        plugin.render(ui, &props);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::testdata::TestDataPlugin;
    use crate::datasource::{registry, DatasourceSetting};
    use std::sync::Arc;

    fn datasources() -> DatasourceStore {
        let mut reg = registry();
        reg.register(Arc::new(TestDataPlugin::new()));
        let mut store = DatasourceStore::new();
        store.sync(&[DatasourceSetting::new("td", "testdata")], &reg);
        store
    }

    #[test]
    fn only_active_visible_targets_run() {
        let mut editor = QueryEditor::new();
        editor.add_target("td", json!({"scenario": "constant", "value": 1}));
        editor.add_target("td", json!({"scenario": "constant", "value": 2}));
        editor.add_target("", json!({"scenario": "constant", "value": 3}));
        editor.toggle_active("B");
        editor.toggle_hide(2);
        let series = run_queries(
            &editor,
            &datasources(),
            &TimeRange::new("now-1m", "now"),
            &VariableValues::default(),
        )
        .unwrap();
        let refs: Vec<_> = series.iter().map(|s| s.ref_id.as_str()).collect();
        assert_eq!(refs, vec!["A"]);
    }

    #[test]
    fn bad_range_is_an_error() {
        let editor = QueryEditor::new();
        let result = run_queries(
            &editor,
            &datasources(),
            &TimeRange::new("now-5x", "now"),
            &VariableValues::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn starts_with_one_target() {
        let explore = ExploreFeature::default();
        assert_eq!(explore.queries.targets().len(), 1);
        assert_eq!(explore.drafts.len(), 1);
    }
}
