use super::{
    DatasourceApi, DatasourceCategory, DatasourcePlugin, DatasourceSetting, QueryRequest, Series,
    SettingEditorFn,
};
use crate::plugin::{Plugin, PluginMeta};
use anyhow::bail;
use eframe::egui;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SCENARIOS: &[&str] = &["random_walk", "constant", "error"];

fn default_scenario() -> String {
    "random_walk".into()
}

fn default_series_count() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestDataParams {
    #[serde(default = "default_scenario")]
    scenario: String,
    #[serde(default)]
    value: f64,
    #[serde(default = "default_series_count")]
    series_count: usize,
    #[serde(default)]
    alias: Option<String>,
}

/// Built-in datasource generating synthetic series. Needs no server.
pub struct TestDataPlugin {
    meta: PluginMeta,
}

impl TestDataPlugin {
    pub fn new() -> Self {
        Self {
            meta: PluginMeta::new("TestData", "testdata", "Generates random and fixed series"),
        }
    }
}

impl Default for TestDataPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TestDataPlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

impl DatasourcePlugin for TestDataPlugin {
    fn category(&self) -> DatasourceCategory {
        DatasourceCategory::Metric
    }

    fn create_api(&self, setting: &DatasourceSetting) -> Arc<dyn DatasourceApi> {
        let seed = setting
            .json_data
            .get("seed")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Arc::new(TestDataApi { seed })
    }

    fn setting_editor(&self) -> Option<SettingEditorFn> {
        Some(setting_editor)
    }

    fn default_params(&self) -> Option<Value> {
        Some(json!({"scenario": "random_walk", "seriesCount": 1}))
    }
}

fn setting_editor(ui: &mut egui::Ui, setting: &mut DatasourceSetting) -> bool {
    let mut seed = setting
        .json_data
        .get("seed")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let changed = ui
        .horizontal(|ui| {
            ui.label("Seed");
            ui.add(egui::DragValue::new(&mut seed)).changed()
        })
        .inner;
    if changed {
        if !setting.json_data.is_object() {
            setting.json_data = json!({});
        }
        setting.json_data["seed"] = json!(seed);
    }
    changed
}

pub struct TestDataApi {
    seed: u64,
}

impl TestDataApi {
    fn rng_for(&self, ref_id: &str, index: usize) -> StdRng {
        let salt = ref_id
            .bytes()
            .fold(index as u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        StdRng::seed_from_u64(self.seed ^ salt)
    }
}

impl DatasourceApi for TestDataApi {
    fn query(&self, request: &QueryRequest) -> anyhow::Result<Vec<Series>> {
        let params: TestDataParams = serde_json::from_value(request.target.request.clone())?;
        let step = request.interval_ms.max(1);
        let from = request.range.from_ms();
        let to = request.range.to_ms();
        let timestamps: Vec<i64> = (0..)
            .map(|i| from + i * step)
            .take_while(|t| *t <= to)
            .collect();

        let mut out = Vec::with_capacity(params.series_count);
        for index in 0..params.series_count.max(1) {
            let points: Vec<(i64, f64)> = match params.scenario.as_str() {
                "constant" => timestamps.iter().map(|t| (*t, params.value)).collect(),
                "random_walk" => {
                    let mut rng = self.rng_for(&request.target.ref_id, index);
                    let mut value = rng.gen_range(0.0..100.0);
                    timestamps
                        .iter()
                        .map(|t| {
                            value += rng.gen_range(-1.0..1.0);
                            (*t, value)
                        })
                        .collect()
                }
                "error" => bail!("testdata error scenario"),
                other => bail!("unknown testdata scenario '{other}'"),
            };
            let name = match &params.alias {
                Some(alias) if params.series_count <= 1 => alias.clone(),
                Some(alias) => format!("{alias}-{index}"),
                None => format!("{}-series-{index}", request.target.ref_id),
            };
            let mut labels = BTreeMap::new();
            labels.insert("scenario".to_string(), params.scenario.clone());
            out.push(Series {
                ref_id: request.target.ref_id.clone(),
                name,
                labels,
                points,
            });
        }
        Ok(out)
    }

    fn metadata(&self, kind: &str) -> anyhow::Result<Vec<String>> {
        match kind {
            "scenarios" => Ok(SCENARIOS.iter().map(|s| s.to_string()).collect()),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::model::Query;
    use crate::variables::ResolvedRange;
    use chrono::{TimeZone, Utc};

    fn request(params: Value) -> QueryRequest {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        QueryRequest {
            target: Query::new("A", "td", params),
            range: ResolvedRange {
                from,
                to: from + chrono::Duration::minutes(1),
            },
            interval_ms: 10_000,
        }
    }

    fn api() -> Arc<dyn DatasourceApi> {
        TestDataPlugin::new().create_api(&DatasourceSetting::new("td", "testdata"))
    }

    #[test]
    fn constant_scenario_fills_the_range() {
        let series = api()
            .query(&request(json!({"scenario": "constant", "value": 4.5})))
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points.len(), 7);
        assert!(series[0].points.iter().all(|(_, v)| *v == 4.5));
    }

    #[test]
    fn random_walk_is_deterministic() {
        let params = json!({"scenario": "random_walk", "seriesCount": 2});
        let a = api().query(&request(params.clone())).unwrap();
        let b = api().query(&request(params)).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert_ne!(a[0].points, a[1].points);
    }

    #[test]
    fn error_scenario_fails() {
        assert!(api().query(&request(json!({"scenario": "error"}))).is_err());
        assert!(api().query(&request(json!({"scenario": "bogus"}))).is_err());
    }

    #[test]
    fn lists_scenarios() {
        assert_eq!(api().metadata("scenarios").unwrap().len(), SCENARIOS.len());
        assert!(api().metadata("labels").unwrap().is_empty());
    }
}
