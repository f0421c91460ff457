use super::legend::{legend_editor, legend_ui, LegendOptions, LegendRow};
use super::{
    edit_typed_options, no_data, series_color, typed_options, PanelProps, VisualizationCategory,
    VisualizationPlugin,
};
use crate::datasource::Series;
use crate::plugin::{Plugin, PluginMeta};
use eframe::egui;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeseriesOptions {
    pub line_width: f32,
    /// Area fill below each line, 0 to 100.
    pub fill_opacity: u8,
    pub unit: String,
    pub decimals: Option<usize>,
    pub legend: LegendOptions,
}

impl Default for TimeseriesOptions {
    fn default() -> Self {
        Self {
            line_width: 1.5,
            fill_opacity: 0,
            unit: "none_none".into(),
            decimals: None,
            legend: LegendOptions {
                values: vec!["last".into()],
                ..LegendOptions::default()
            },
        }
    }
}

/// Data extent across every series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub t_min: i64,
    pub t_max: i64,
    pub v_min: f64,
    pub v_max: f64,
}

impl Bounds {
    /// `None` when no series has a finite point.
    pub fn of(datasets: &[Series]) -> Option<Self> {
        let mut points = datasets
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|(_, v)| v.is_finite());
        let (t, v) = *points.next()?;
        let mut b = Bounds {
            t_min: t,
            t_max: t,
            v_min: v,
            v_max: v,
        };
        for (t, v) in points {
            b.t_min = b.t_min.min(*t);
            b.t_max = b.t_max.max(*t);
            b.v_min = b.v_min.min(*v);
            b.v_max = b.v_max.max(*v);
        }
        if b.v_min == b.v_max {
            b.v_min -= 1.0;
            b.v_max += 1.0;
        }
        Some(b)
    }

    /// Map a point into `rect`, time on x and value on y.
    pub fn project(&self, rect: egui::Rect, t: i64, v: f64) -> egui::Pos2 {
        let span_t = (self.t_max - self.t_min).max(1) as f64;
        let fx = (t - self.t_min) as f64 / span_t;
        let fy = (v - self.v_min) / (self.v_max - self.v_min);
        egui::pos2(
            rect.left() + rect.width() * fx as f32,
            rect.bottom() - rect.height() * fy as f32,
        )
    }
}

fn paint_lines(
    ui: &egui::Ui,
    rect: egui::Rect,
    datasets: &[Series],
    opts: &TimeseriesOptions,
    bounds: &Bounds,
) {
    let painter = ui.painter_at(rect);
    let grid = ui.visuals().widgets.noninteractive.bg_stroke;
    for frac in [0.0, 0.5, 1.0] {
        let y = rect.bottom() - rect.height() * frac;
        painter.hline(rect.x_range(), y, grid);
    }
    for (i, series) in datasets.iter().enumerate() {
        let color = series_color(i);
        let line: Vec<egui::Pos2> = series
            .points
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(t, v)| bounds.project(rect, *t, *v))
            .collect();
        if opts.fill_opacity > 0 {
            let alpha = (u32::from(opts.fill_opacity.min(100)) * 255 / 100) as u8;
            let fill =
                egui::Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha);
            for pair in line.windows(2) {
                painter.add(egui::Shape::convex_polygon(
                    vec![
                        pair[0],
                        pair[1],
                        egui::pos2(pair[1].x, rect.bottom()),
                        egui::pos2(pair[0].x, rect.bottom()),
                    ],
                    fill,
                    egui::Stroke::NONE,
                ));
            }
        }
        if line.len() > 1 {
            painter.add(egui::Shape::line(line, egui::Stroke::new(opts.line_width, color)));
        }
    }
}

pub struct TimeseriesPlugin {
    meta: PluginMeta,
}

impl TimeseriesPlugin {
    pub fn new() -> Self {
        Self {
            meta: PluginMeta::new("Time series", "timeseries", "Values over time as lines"),
        }
    }
}

impl Default for TimeseriesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TimeseriesPlugin {
    fn meta(&self) -> &PluginMeta {
        &self.meta
    }
}

impl VisualizationPlugin for TimeseriesPlugin {
    fn category(&self) -> VisualizationCategory {
        VisualizationCategory::Chart
    }

    fn render(&self, ui: &mut egui::Ui, props: &PanelProps<'_>) {
        let opts: TimeseriesOptions = typed_options(&props.panel.options);
        let Some(bounds) = Bounds::of(props.datasets) else {
            no_data(ui);
            return;
        };
        let axis = |v: f64| {
            props
                .formats
                .format(&opts.unit, v, opts.decimals)
                .to_string()
        };
        let legend_height = if opts.legend.visible() { 24.0 } else { 0.0 };
        let avail = ui.available_size();
        let size = egui::vec2(avail.x, (avail.y - legend_height).max(20.0));
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let plot = rect.shrink2(egui::vec2(4.0, 8.0));
        paint_lines(ui, plot, props.datasets, &opts, &bounds);

        let painter = ui.painter_at(rect);
        let font = egui::FontId::proportional(10.0);
        let text_color = ui.visuals().weak_text_color();
        painter.text(
            plot.left_top(),
            egui::Align2::LEFT_TOP,
            axis(bounds.v_max),
            font.clone(),
            text_color,
        );
        painter.text(
            plot.left_bottom(),
            egui::Align2::LEFT_BOTTOM,
            axis(bounds.v_min),
            font,
            text_color,
        );

        let rows: Vec<LegendRow> = props
            .datasets
            .iter()
            .enumerate()
            .map(|(i, s)| LegendRow {
                name: s.name.clone(),
                color: series_color(i),
                values: s
                    .last_value()
                    .map(|v| vec![("last".to_string(), axis(v))])
                    .unwrap_or_default(),
            })
            .collect();
        legend_ui(ui, egui::Id::new(("ts-legend", props.panel.id)), &opts.legend, &rows);
    }

    fn options_editor(&self, ui: &mut egui::Ui, options: &mut Value) -> bool {
        edit_typed_options(ui, options, |ui, cfg: &mut TimeseriesOptions| {
            let mut changed = ui
                .add(egui::Slider::new(&mut cfg.line_width, 0.5..=5.0).text("Line width"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut cfg.fill_opacity, 0..=100).text("Fill opacity"))
                .changed();
            changed |= ui
                .horizontal(|ui| {
                    ui.label("Unit");
                    ui.text_edit_singleline(&mut cfg.unit).changed()
                })
                .inner;
            changed |= legend_editor(ui, &mut cfg.legend);
            changed
        })
    }

    fn default_options(&self) -> Value {
        serde_json::to_value(TimeseriesOptions::default()).unwrap_or_else(|_| json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: Vec<(i64, f64)>) -> Series {
        Series {
            points,
            ..Default::default()
        }
    }

    #[test]
    fn bounds_span_all_series() {
        let b = Bounds::of(&[
            series(vec![(10, 1.0), (20, 5.0)]),
            series(vec![(5, f64::NAN), (30, -2.0)]),
        ])
        .unwrap();
        assert_eq!((b.t_min, b.t_max), (10, 30));
        assert_eq!((b.v_min, b.v_max), (-2.0, 5.0));
    }

    #[test]
    fn flat_series_gets_padding() {
        let b = Bounds::of(&[series(vec![(0, 3.0), (1, 3.0)])]).unwrap();
        assert_eq!((b.v_min, b.v_max), (2.0, 4.0));
        assert!(Bounds::of(&[series(vec![])]).is_none());
    }

    #[test]
    fn projection_maps_corners() {
        let b = Bounds {
            t_min: 0,
            t_max: 100,
            v_min: 0.0,
            v_max: 10.0,
        };
        let rect = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(200.0, 50.0));
        assert_eq!(b.project(rect, 0, 0.0), egui::pos2(0.0, 50.0));
        assert_eq!(b.project(rect, 100, 10.0), egui::pos2(200.0, 0.0));
    }
}
