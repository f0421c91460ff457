pub mod dashboard;
pub mod explore;

use crate::dashboard::DashboardStore;
use crate::datasource::{DatasourceRegistry, DatasourceStore, PanelDataCache};
use crate::format::FormatRegistry;
use crate::plugin::{Plugin, PluginMeta, Registry};
use crate::settings::Settings;
use crate::variables::{TimeRange, VariableValues};
use crate::visualization::VisualizationRegistry;
use eframe::egui;
use std::sync::Arc;

pub use dashboard::DashboardFeature;
pub use explore::ExploreFeature;

/// Everything a page may read or mutate during one frame.
pub struct FeatureContext<'a> {
    pub visualizations: &'a VisualizationRegistry,
    pub datasource_plugins: &'a DatasourceRegistry,
    pub formats: &'a FormatRegistry,
    pub store: &'a mut DashboardStore,
    pub datasources: &'a DatasourceStore,
    pub values: &'a VariableValues,
    pub range: TimeRange,
    pub data: &'a PanelDataCache,
    pub settings: &'a Settings,
    /// Errors to surface to the user, drained by the app after the frame.
    pub notices: &'a mut Vec<String>,
}

/// A top-level page of the application.
pub trait Feature {
    fn ui(&mut self, ui: &mut egui::Ui, ctx: &mut FeatureContext<'_>);
}

/// Registry entry for a feature: metadata plus a constructor for the page.
pub struct FeatureDescriptor {
    meta: PluginMeta,
    ctor: Arc<dyn Fn() -> Box<dyn Feature> + Send + Sync>,
}

impl FeatureDescriptor {
    pub fn new<T: Feature + Default + 'static>(name: &str, route: &str, description: &str) -> Self {
        Self {
            meta: PluginMeta::new(name, route, description),
            ctor: Arc::new(|| Box::new(T::default()) as Box<dyn Feature>),
        }
    }

    pub fn title(&self) -> &str {
        &self.meta.name
    }

    pub fn create(&self) -> Box<dyn Feature> {
        (self.ctor)()
    }
}

impl Plugin for FeatureDescriptor {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

pub type FeatureRegistry = Registry<FeatureDescriptor>;

impl Registry<FeatureDescriptor> {
    /// Registry with the built-in pages.
    pub fn with_builtins() -> Self {
        let mut reg = Registry::new("feature");
        reg.register(Arc::new(FeatureDescriptor::new::<DashboardFeature>(
            "Dashboard",
            "dashboard",
            "Grid of panels",
        )))
        .register(Arc::new(FeatureDescriptor::new::<ExploreFeature>(
            "Explore",
            "explore",
            "Ad-hoc queries",
        )));
        reg
    }

    /// Build the page registered under `route`.
    pub fn create(&self, route: &str) -> Option<Box<dyn Feature>> {
        self.get(route).map(|d| d.create())
    }
}
