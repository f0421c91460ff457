use crate::dashboard::model::{GridPos, PanelSetting};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Number of columns on the dashboard grid.
pub const GRID_COLUMNS: u32 = 24;

/// Cell descriptor handed to the grid layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub i: String,
    /// Neither draggable nor resizable.
    #[serde(rename = "static", default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_resizable: Option<bool>,
}

impl LayoutItem {
    pub fn from_grid(grid: &GridPos) -> Self {
        Self {
            x: grid.x,
            y: grid.y,
            w: grid.w,
            h: grid.h,
            i: grid.i.clone(),
            is_static: false,
            is_resizable: None,
        }
    }

    pub fn resizable(&self) -> bool {
        !self.is_static && self.is_resizable.unwrap_or(true)
    }

    pub fn draggable(&self) -> bool {
        !self.is_static
    }
}

/// Build layout cells for every present panel, preserving list order.
///
/// Read-only dashboards get static cells; rows stay draggable but can never
/// be resized.
pub fn build_layout(panels: &[Option<PanelSetting>], readonly: bool) -> Vec<LayoutItem> {
    panels
        .iter()
        .flatten()
        .map(|panel| {
            let mut item = LayoutItem::from_grid(&panel.grid);
            item.i = panel.id.to_string();
            if readonly {
                item.is_static = true;
            } else if panel.is_row() {
                item.is_resizable = Some(false);
            }
            item
        })
        .collect()
}

fn visual_order(a: &GridPos, b: &GridPos) -> Ordering {
    a.y.cmp(&b.y).then(a.x.cmp(&b.x))
}

/// Sort panels top-to-bottom, left-to-right. Missing entries sink to the end.
pub fn sort_panels(panels: &mut [Option<PanelSetting>]) {
    panels.sort_by(|a, b| match (a, b) {
        (Some(a), Some(b)) => visual_order(&a.grid, &b.grid),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Push panels that overlap a moved panel down until nothing overlaps.
///
/// Moved panels keep their place; the others are settled in visual order
/// below whatever they collide with.
fn resolve_collisions(panels: &mut [Option<PanelSetting>], moved: &HashSet<u32>) {
    let mut placed: Vec<GridPos> = panels
        .iter()
        .flatten()
        .filter(|p| moved.contains(&p.id))
        .map(|p| p.grid.clone())
        .collect();
    let mut rest: Vec<&mut PanelSetting> = panels
        .iter_mut()
        .flatten()
        .filter(|p| !moved.contains(&p.id))
        .collect();
    rest.sort_by(|a, b| visual_order(&a.grid, &b.grid));

    for panel in rest {
        // y only grows, so this settles.
        loop {
            let below = placed
                .iter()
                .filter(|g| g.overlaps(&panel.grid))
                .map(GridPos::bottom)
                .max();
            match below {
                Some(y) => panel.grid.y = y,
                None => break,
            }
        }
        placed.push(panel.grid.clone());
    }
}

/// Apply grid interaction results back onto the panels.
///
/// Items whose key does not parse or match a panel are ignored. Panels hit
/// by a moved panel are pushed down, then everything is resorted so source
/// order follows visual order. Returns whether any panel geometry changed.
pub fn on_layout_mutate(panels: &mut [Option<PanelSetting>], items: &[LayoutItem]) -> bool {
    let mut moved = HashSet::new();
    for item in items {
        let Ok(id) = item.i.parse::<u32>() else {
            tracing::debug!(key = %item.i, "layout item with non-numeric key ignored");
            continue;
        };
        let Some(panel) = panels.iter_mut().flatten().find(|p| p.id == id) else {
            continue;
        };
        let grid = &mut panel.grid;
        if (grid.x, grid.y, grid.w, grid.h) != (item.x, item.y, item.w, item.h) {
            grid.x = item.x;
            grid.y = item.y;
            grid.w = item.w;
            grid.h = item.h;
            moved.insert(id);
        }
        panel.sync_grid_key();
    }
    if moved.is_empty() {
        sort_panels(panels);
        return false;
    }
    resolve_collisions(panels, &moved);
    sort_panels(panels);
    true
}

/// Clamp a panel's geometry into the grid's column range.
pub fn clamp_to_columns(grid: &mut GridPos, columns: u32) -> bool {
    let columns = columns.max(1);
    let before = (grid.x, grid.w, grid.h);
    grid.w = grid.w.clamp(1, columns);
    grid.h = grid.h.max(1);
    if grid.x.saturating_add(grid.w) > columns {
        grid.x = columns - grid.w;
    }
    before != (grid.x, grid.w, grid.h)
}

/// Lowest occupied row, i.e. the y where a new panel can go without overlap.
pub fn bottom(panels: &[Option<PanelSetting>]) -> u32 {
    panels
        .iter()
        .flatten()
        .map(|p| p.grid.bottom())
        .max()
        .unwrap_or(0)
}
