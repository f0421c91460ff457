use crate::api::ApiClient;
use crate::dashboard::config;
use crate::dashboard::model::{Dashboard, PanelKey, PanelSetting};
use crate::dashboard::render::{panel_kind, PanelKind};
use crate::dashboard::DashboardStore;
use crate::datasource::testdata::TestDataPlugin;
use crate::datasource::{
    query_metrics, DatasetType, DatasourceRegistry, DatasourceSetting, DatasourceStore, FetchKey,
    PanelDataCache, QueryContext, Series,
};
use crate::error::ApiError;
use crate::feature::{Feature, FeatureContext, FeatureRegistry};
use crate::format::FormatRegistry;
use crate::plugin::Plugin;
use crate::settings::Settings;
use crate::signal::Subscription;
use crate::variables::time_range::{FROM_PARAM, QUICK_RANGES, TO_PARAM};
use crate::variables::{TimeRange, UrlState, UrlStore, VariableSync, VariableValues};
use crate::visualization::{
    PiePlugin, StatPlugin, TimeseriesPlugin, VisualizationRegistry,
};
use chrono::{DateTime, Utc};
use eframe::egui;
use egui_toast::{Toast, ToastKind, ToastOptions, Toasts};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Uid of the datasource created when nothing else is configured.
pub const FALLBACK_DATASOURCE_UID: &str = "testdata";
pub const DEFAULT_ROUTE: &str = "dashboard";

/// Every plugin registry of the app.
pub struct Registries {
    pub visualizations: VisualizationRegistry,
    pub datasources: DatasourceRegistry,
    pub formats: FormatRegistry,
    pub features: FeatureRegistry,
}

impl Registries {
    /// Register all built-in plugins. Must run before anything resolves a
    /// plugin type.
    pub fn with_builtins() -> Self {
        let mut visualizations = crate::visualization::registry();
        visualizations
            .register(Arc::new(PiePlugin::new()))
            .register(Arc::new(TimeseriesPlugin::new()))
            .register(Arc::new(StatPlugin::new()));
        let mut datasources = crate::datasource::registry();
        datasources.register(Arc::new(TestDataPlugin::new()));
        Self {
            visualizations,
            datasources,
            formats: FormatRegistry::with_defaults(),
            features: FeatureRegistry::with_builtins(),
        }
    }
}

/// State assembled before the first frame.
pub struct Boot {
    pub registries: Registries,
    pub settings: Settings,
    pub api: Option<ApiClient>,
    pub datasources: DatasourceStore,
    pub dashboard: Dashboard,
    /// Problems worth showing to the user once the window is up.
    pub notices: Vec<String>,
}

fn fallback_datasource() -> DatasourceSetting {
    let mut setting = DatasourceSetting::new(FALLBACK_DATASOURCE_UID, "testdata");
    setting.name = "TestData".into();
    setting.is_default = true;
    setting
}

fn datasource_settings(
    settings: &Settings,
    api: Option<&ApiClient>,
    notices: &mut Vec<String>,
) -> Vec<DatasourceSetting> {
    let from_server = match api.map(ApiClient::datasources) {
        Some(Ok(list)) => Some(list),
        Some(Err(ApiError::Unauthenticated)) => {
            notices.push("Not signed in to the server; using local datasources".into());
            None
        }
        Some(Err(e)) => {
            tracing::info!("server unavailable, using local datasources: {e}");
            None
        }
        None => None,
    };
    let list = from_server.unwrap_or_else(|| settings.datasources.clone());
    if list.is_empty() {
        vec![fallback_datasource()]
    } else {
        list
    }
}

/// Boot sequence: registries, then settings, then datasources, then the
/// dashboard.
pub fn boot(settings: Settings, api: Option<ApiClient>) -> anyhow::Result<Boot> {
    let registries = Registries::with_builtins();
    let mut notices = Vec::new();

    let list = datasource_settings(&settings, api.as_ref(), &mut notices);
    let mut datasources = DatasourceStore::new();
    notices.extend(datasources.sync(&list, &registries.datasources));

    let path = config::path_for(&settings.dashboard_path);
    let dashboard = config::load(&path, &registries.visualizations)?;
    tracing::info!(uid = %dashboard.uid, path = %path.display(), "dashboard loaded");

    Ok(Boot {
        registries,
        settings,
        api,
        datasources,
        dashboard,
        notices,
    })
}

/// First path segment of the route, e.g. `explore` for `/explore/abc`.
pub fn route_of(url: &UrlState) -> String {
    url.path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ROUTE)
        .to_string()
}

/// A panel whose data has to be (re)fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub panel: PanelKey,
    pub key: FetchKey,
    pub dataset: DatasetType,
}

#[derive(Debug)]
pub struct FetchResult {
    pub panel: PanelKey,
    pub key: FetchKey,
    pub series: Vec<Series>,
    pub error: Option<String>,
}

/// Register the current inputs of every visualization panel with `data`
/// and return the panels whose inputs changed.
pub fn schedule_fetches(
    panels: &[Option<PanelSetting>],
    visualizations: &VisualizationRegistry,
    data: &PanelDataCache,
    range: &TimeRange,
    values: &VariableValues,
) -> Vec<FetchJob> {
    let live: HashSet<PanelKey> = panels.iter().flatten().map(|p| p.key).collect();
    let pruned = data.retain(&live);
    if pruned > 0 {
        tracing::debug!(pruned, "dropped data of removed panels");
    }
    panels
        .iter()
        .flatten()
        .filter_map(|panel| {
            let PanelKind::Visualization(plugin) = panel_kind(panel, visualizations) else {
                return None;
            };
            let key = FetchKey::new(panel, range, values);
            if !data.request(panel.key, key.clone()) {
                return None;
            }
            Some(FetchJob {
                panel: panel.key,
                key,
                dataset: plugin.dataset_type(&panel.options),
            })
        })
        .collect()
}

/// Execute one job. Individual query failures only drop that query's series.
pub fn run_fetch(job: FetchJob, datasources: &DatasourceStore, now: DateTime<Utc>) -> FetchResult {
    let (series, error) = match job.key.range.resolve(now) {
        Ok(range) => {
            let ctx = QueryContext::new(range, &job.key.variables).with_dataset(job.dataset);
            (query_metrics(&job.key.targets, datasources, &ctx), None)
        }
        Err(e) => (Vec::new(), Some(e.to_string())),
    };
    FetchResult {
        panel: job.panel,
        key: job.key,
        series,
        error,
    }
}

pub struct BoardApp {
    registries: Registries,
    settings: Settings,
    api: Option<ApiClient>,
    store: DashboardStore,
    datasources: DatasourceStore,
    urls: UrlStore,
    variables: Arc<Mutex<VariableSync>>,
    _variable_binding: Subscription,
    variable_drafts: HashMap<String, String>,
    data: PanelDataCache,
    route: String,
    page: Option<Box<dyn Feature>>,
    toasts: Toasts,
    notices: Vec<String>,
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,
}

impl BoardApp {
    pub fn new(boot: Boot) -> Self {
        let urls = UrlStore::new(UrlState::new(&format!("/{DEFAULT_ROUTE}")));
        let variables = Arc::new(Mutex::new(VariableSync::new(
            boot.dashboard.config.variables.clone(),
        )));
        let binding = VariableSync::bind(&variables, &urls);
        let route = route_of(urls.state());
        let page = boot.registries.features.create(&route);
        let (tx, rx) = channel();
        Self {
            store: DashboardStore::new(boot.dashboard),
            registries: boot.registries,
            settings: boot.settings,
            api: boot.api,
            datasources: boot.datasources,
            urls,
            variables,
            _variable_binding: binding,
            variable_drafts: HashMap::new(),
            data: PanelDataCache::new(),
            route,
            page,
            toasts: Toasts::new().anchor(egui::Align2::RIGHT_TOP, [10.0, 10.0]),
            notices: boot.notices,
            tx,
            rx,
        }
    }

    fn values(&self) -> VariableValues {
        match self.variables.lock() {
            Ok(sync) => sync.values().clone(),
            Err(e) => e.into_inner().values().clone(),
        }
    }

    fn default_range(&self) -> TimeRange {
        TimeRange::new(&self.settings.default_from, &self.settings.default_to)
    }

    fn sync_route(&mut self) {
        let route = route_of(self.urls.state());
        if route == self.route && self.page.is_some() {
            return;
        }
        self.page = self.registries.features.create(&route);
        if self.page.is_none() {
            tracing::debug!(%route, "no feature registered for route");
        }
        self.route = route;
    }

    fn sync_variable_definitions(&mut self) {
        let Ok(mut sync) = self.variables.lock() else {
            return;
        };
        if sync.definitions() != self.store.variables() {
            sync.set_definitions(self.store.variables().to_vec(), self.urls.state());
        }
    }

    fn drain_results(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            if !self
                .data
                .store(result.panel, result.key, result.series, result.error)
            {
                tracing::trace!(panel = ?result.panel, "stale panel data dropped");
            }
        }
    }

    fn spawn_fetches(&self, ctx: &egui::Context, values: &VariableValues, range: &TimeRange) {
        let jobs = schedule_fetches(
            self.store.panels(),
            &self.registries.visualizations,
            &self.data,
            range,
            values,
        );
        for job in jobs {
            let datasources = self.datasources.clone();
            let tx = self.tx.clone();
            let repaint = ctx.clone();
            std::thread::spawn(move || {
                let result = run_fetch(job, &datasources, Utc::now());
                if tx.send(result).is_ok() {
                    repaint.request_repaint();
                }
            });
        }
    }

    fn save_dashboard(&mut self) {
        let dashboard = self.store.dashboard();
        if let Some(api) = &self.api {
            match api.save_dashboard(dashboard) {
                Ok(()) => return,
                Err(ApiError::Unauthenticated) => {
                    self.notices.push("Not signed in; saved locally".into());
                }
                Err(e) => tracing::warn!("saving to server failed: {e}"),
            }
        }
        let path = config::path_for(&self.settings.dashboard_path);
        if let Err(e) = config::save(dashboard, &path) {
            tracing::error!(path = %path.display(), "failed to save dashboard: {e}");
            self.notices.push(format!("Failed to save dashboard: {e}"));
        }
    }

    fn flush_notices(&mut self) {
        for text in self.notices.drain(..) {
            tracing::warn!("{text}");
            if self.settings.enable_toasts {
                self.toasts.add(Toast {
                    text: text.into(),
                    kind: ToastKind::Error,
                    options: ToastOptions::default()
                        .duration_in_seconds(self.settings.toast_duration as f64),
                });
            }
        }
    }

    fn time_range_ui(&mut self, ui: &mut egui::Ui, range: &TimeRange) {
        let mut selected = range.from.clone();
        egui::ComboBox::from_id_source("time-range")
            .selected_text(range.label())
            .show_ui(ui, |ui| {
                for (label, from) in QUICK_RANGES {
                    ui.selectable_value(&mut selected, from.to_string(), *label);
                }
            });
        if selected != range.from {
            self.urls.update(|url| {
                url.set(FROM_PARAM, &selected);
                url.set(TO_PARAM, "now");
            });
        }
        if ui.button("⟳").on_hover_text("Refresh").clicked() {
            self.data.invalidate_all();
        }
    }

    fn variables_ui(&mut self, ui: &mut egui::Ui, values: &VariableValues) {
        let definitions = match self.variables.lock() {
            Ok(sync) => sync.definitions().to_vec(),
            Err(_) => return,
        };
        for var in definitions.iter().filter(|v| !v.hide) {
            let current = values
                .get(&var.name)
                .map(|v| v.values().join(","))
                .unwrap_or_default();
            let draft = self
                .variable_drafts
                .entry(var.name.clone())
                .or_insert_with(|| current.clone());
            ui.label(if var.label.is_empty() { var.name.as_str() } else { var.label.as_str() });
            let response = ui.add(egui::TextEdit::singleline(draft).desired_width(90.0));
            if response.lost_focus() && *draft != current {
                let parts: Vec<String> = draft
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                let name = var.name.clone();
                let multi = var.is_multi();
                self.urls.update(|url| {
                    if multi {
                        url.set_all(&name, &parts);
                    } else {
                        url.set(&name, parts.first().map(String::as_str).unwrap_or(""));
                    }
                });
            } else if !response.has_focus() {
                *draft = current;
            }
        }
    }
}

impl eframe::App for BoardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_results();
        self.sync_route();
        self.sync_variable_definitions();

        let values = self.values();
        let range = values.time_range(&self.default_range());

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                let routes: Vec<(String, String)> = self
                    .registries
                    .features
                    .plugins()
                    .iter()
                    .map(|f| (f.type_key().to_string(), f.title().to_string()))
                    .collect();
                for (route, title) in routes {
                    if ui.selectable_label(self.route == route, title).clicked() {
                        self.urls.update(|url| url.set_path(&format!("/{route}")));
                    }
                }
                ui.separator();
                self.variables_ui(ui, &values);
                ui.separator();
                self.time_range_ui(ui, &range);
                if !self.store.readonly() && ui.button("Save").clicked() {
                    self.save_dashboard();
                }
            });
        });

        self.spawn_fetches(ctx, &values, &range);

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(page) = self.page.as_mut() else {
                ui.label(format!("Nothing here: /{}", self.route));
                return;
            };
            let mut fctx = FeatureContext {
                visualizations: &self.registries.visualizations,
                datasource_plugins: &self.registries.datasources,
                formats: &self.registries.formats,
                store: &mut self.store,
                datasources: &self.datasources,
                values: &values,
                range: range.clone(),
                data: &self.data,
                settings: &self.settings,
                notices: &mut self.notices,
            };
            page.ui(ui, &mut fctx);
        });

        self.flush_notices();
        self.toasts.show(ctx);
    }
}

/// Load settings from `path` and boot, falling back to offline mode when the
/// API client cannot be built.
pub fn boot_from(path: &Path) -> anyhow::Result<Boot> {
    let settings = Settings::load(path)?;
    let api = match ApiClient::new(&settings.api_url()) {
        Ok(api) => Some(api),
        Err(e) => {
            tracing::warn!("api client unavailable: {e}");
            None
        }
    };
    boot(settings, api)
}
