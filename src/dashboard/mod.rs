pub mod config;
pub mod editor;
pub mod layout;
pub mod model;
pub mod render;
pub mod store;

pub use editor::PanelEditor;
pub use layout::{LayoutItem, GRID_COLUMNS};
pub use model::{Dashboard, DashboardConfig, GridPos, PanelKey, PanelSetting, Query, Variable};
pub use render::{DashboardView, PanelAction, RenderContext};
pub use store::{DashboardEvent, DashboardStore};
