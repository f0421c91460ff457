use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pseudo panel type rendered as a collapsible row header.
pub const ROW_PANEL_TYPE: &str = "row";
/// Pseudo panel type rendered as the "add panel" affordance.
pub const ADD_PANEL_TYPE: &str = "addPanel";
/// Fields starting with this prefix are view-only and never persisted.
pub const INTERNAL_FIELD_PREFIX: &str = "__";

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_object() -> Value {
    Value::Object(Default::default())
}

/// Runtime identity of a panel object.
///
/// Keys are handed out when a panel enters a store and survive every
/// mutation of that panel, so editors can find "their" panel even after the
/// id or position changed. They are never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelKey(u64);

impl PanelKey {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PanelKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

/// Position and size of a panel on the dashboard grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Stable grid key, always the panel id as a string.
    #[serde(default)]
    pub i: String,
}

impl GridPos {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            i: String::new(),
        }
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn overlaps(&self, other: &GridPos) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceRef {
    #[serde(default)]
    pub uid: String,
}

impl DatasourceRef {
    pub fn new(uid: &str) -> Self {
        Self { uid: uid.into() }
    }
}

/// One data request attached to a panel or explore session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub ref_id: String,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub datasource: DatasourceRef,
    #[serde(default = "default_object")]
    pub request: Value,
}

impl Query {
    pub fn new(ref_id: &str, datasource: &str, request: Value) -> Self {
        Self {
            ref_id: ref_id.into(),
            hide: false,
            datasource: DatasourceRef::new(datasource),
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSetting {
    #[serde(skip)]
    pub key: PanelKey,
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub panel_type: String,
    #[serde(default = "default_object")]
    pub options: Value,
    #[serde(default)]
    pub targets: Vec<Query>,
    #[serde(default)]
    pub grid: GridPos,
    /// Row panels only: whether the row currently hides its children.
    #[serde(default, skip_serializing_if = "is_false")]
    pub collapsed: bool,
    /// Row panels only: children held while the row is collapsed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<PanelSetting>,
}

impl PartialEq for PanelSetting {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.panel_type == other.panel_type
            && self.options == other.options
            && self.targets == other.targets
            && self.grid == other.grid
            && self.collapsed == other.collapsed
            && self.panels == other.panels
    }
}

impl PanelSetting {
    pub fn new(id: u32, panel_type: &str, grid: GridPos) -> Self {
        let mut panel = Self {
            key: PanelKey::default(),
            id,
            title: String::new(),
            description: String::new(),
            panel_type: panel_type.to_string(),
            options: default_object(),
            targets: Vec::new(),
            grid,
            collapsed: false,
            panels: Vec::new(),
        };
        panel.sync_grid_key();
        panel
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn is_row(&self) -> bool {
        self.panel_type == ROW_PANEL_TYPE
    }

    pub fn is_add_panel(&self) -> bool {
        self.panel_type == ADD_PANEL_TYPE
    }

    /// Force `grid.i` to mirror the panel id.
    pub fn sync_grid_key(&mut self) {
        let key = self.id.to_string();
        if self.grid.i != key {
            self.grid.i = key;
        }
    }

    /// Give this panel (and any collapsed children) a runtime key.
    pub fn ensure_key(&mut self) {
        if !self.key.is_assigned() {
            self.key = PanelKey::next();
        }
        for child in &mut self.panels {
            child.ensure_key();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    Custom,
    Constant,
    Query,
    Textbox,
    Datasource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableOption {
    Multi,
    IncludeAll,
}

/// Current value of a variable: a scalar, or a list for multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

impl Default for VariableValue {
    fn default() -> Self {
        VariableValue::Single(String::new())
    }
}

impl VariableValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            VariableValue::Single(v) => vec![v.as_str()],
            VariableValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            VariableValue::Single(v) => Some(v.as_str()),
            VariableValue::Multi(vs) => vs.first().map(String::as_str),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(v: &str) -> Self {
        VariableValue::Single(v.to_string())
    }
}

impl From<Vec<&str>> for VariableValue {
    fn from(v: Vec<&str>) -> Self {
        VariableValue::Multi(v.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableCurrent {
    #[serde(default)]
    pub value: VariableValue,
}

/// A named, URL-bindable dashboard parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub option_type: Vec<VariableOption>,
    #[serde(default)]
    pub current: VariableCurrent,
    #[serde(default)]
    pub query: String,
}

impl Variable {
    pub fn new(name: &str, value: impl Into<VariableValue>) -> Self {
        Self {
            name: name.into(),
            current: VariableCurrent {
                value: value.into(),
            },
            ..Default::default()
        }
    }

    pub fn multi(mut self) -> Self {
        if !self.is_multi() {
            self.option_type.push(VariableOption::Multi);
        }
        self
    }

    pub fn is_multi(&self) -> bool {
        self.option_type.contains(&VariableOption::Multi)
    }

    /// Candidate values for custom variables (`a,b,c`).
    pub fn custom_options(&self) -> Vec<String> {
        match self.var_type {
            VariableType::Custom => self
                .query
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            VariableType::Constant | VariableType::Textbox => vec![self.query.clone()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// `null` entries are tolerated and skipped by layout and rendering.
    #[serde(default)]
    pub panels: Vec<Option<PanelSetting>>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl DashboardConfig {
    pub fn panels(&self) -> impl Iterator<Item = &PanelSetting> {
        self.panels.iter().flatten()
    }

    pub fn panels_mut(&mut self) -> impl Iterator<Item = &mut PanelSetting> {
        self.panels.iter_mut().flatten()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub config: DashboardConfig,
}

impl Dashboard {
    pub fn new(uid: &str, title: &str) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn panel(&self, id: u32) -> Option<&PanelSetting> {
        self.config.panels().find(|p| p.id == id)
    }

    pub fn panel_by_key(&self, key: PanelKey) -> Option<&PanelSetting> {
        self.config.panels().find(|p| p.key == key)
    }

    pub fn next_panel_id(&self) -> u32 {
        self.config
            .panels()
            .flat_map(|p| std::iter::once(p.id).chain(p.panels.iter().map(|c| c.id)))
            .max()
            .map(|id| id.saturating_add(1))
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn panel_json_uses_wire_names() {
        let panel: PanelSetting = serde_json::from_value(json!({
            "id": 3,
            "type": "pie",
            "grid": {"x": 0, "y": 0, "w": 6, "h": 4, "i": "3"},
            "targets": [{"refId": "A", "datasource": {"uid": "ds"}, "request": {"expr": "up"}}]
        }))
        .unwrap();
        assert_eq!(panel.panel_type, "pie");
        assert_eq!(panel.targets[0].ref_id, "A");
        assert!(!panel.key.is_assigned());
        let out = serde_json::to_value(&panel).unwrap();
        assert!(out.get("collapsed").is_none());
        assert!(out.get("key").is_none());
    }

    #[test]
    fn null_panels_deserialize_as_none() {
        let cfg: DashboardConfig = serde_json::from_value(json!({
            "panels": [null, {"id": 1, "type": "stat"}]
        }))
        .unwrap();
        assert_eq!(cfg.panels.len(), 2);
        assert_eq!(cfg.panels().count(), 1);
    }

    #[test]
    fn variable_values_are_untagged() {
        let single: VariableValue = serde_json::from_value(json!("web-1")).unwrap();
        let multi: VariableValue = serde_json::from_value(json!(["us", "eu"])).unwrap();
        assert_eq!(single, VariableValue::from("web-1"));
        assert_eq!(multi, VariableValue::from(vec!["us", "eu"]));
    }

    #[test]
    fn next_id_includes_collapsed_children() {
        let mut row = PanelSetting::new(1, ROW_PANEL_TYPE, GridPos::new(0, 0, 24, 1));
        row.panels.push(PanelSetting::new(7, "stat", GridPos::new(0, 1, 6, 4)));
        let mut dash = Dashboard::new("d", "D");
        dash.config.panels.push(Some(row));
        assert_eq!(dash.next_panel_id(), 8);
    }
}
