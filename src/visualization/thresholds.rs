use serde::{Deserialize, Serialize};

/// A color step. The base step has no value and applies below every other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default)]
    pub value: Option<f64>,
    pub color: String,
}

impl Threshold {
    pub fn base(color: &str) -> Self {
        Self {
            value: None,
            color: color.to_string(),
        }
    }

    pub fn at(value: f64, color: &str) -> Self {
        Self {
            value: Some(value),
            color: color.to_string(),
        }
    }

    fn bound(&self) -> f64 {
        self.value.unwrap_or(f64::NEG_INFINITY)
    }
}

pub fn default_thresholds() -> Vec<Threshold> {
    vec![Threshold::base("green"), Threshold::at(80.0, "red")]
}

/// The step whose value is the greatest one at or below `value`.
///
/// `thresholds` must be sorted ascending. A value below every step maps to the
/// first one.
pub fn active_threshold(thresholds: &[Threshold], value: f64) -> Option<&Threshold> {
    let idx = thresholds.partition_point(|t| t.bound() <= value);
    thresholds.get(idx.saturating_sub(1))
}

/// Sort steps ascending, keeping the base step first.
pub fn sort_thresholds(thresholds: &mut [Threshold]) {
    thresholds.sort_by(|a, b| a.bound().total_cmp(&b.bound()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<Threshold> {
        vec![
            Threshold::base("green"),
            Threshold::at(50.0, "orange"),
            Threshold::at(80.0, "red"),
        ]
    }

    #[test]
    fn picks_nearest_step_at_or_below() {
        let steps = steps();
        assert_eq!(active_threshold(&steps, 10.0).unwrap().color, "green");
        assert_eq!(active_threshold(&steps, 50.0).unwrap().color, "orange");
        assert_eq!(active_threshold(&steps, 79.9).unwrap().color, "orange");
        assert_eq!(active_threshold(&steps, 80.0).unwrap().color, "red");
        assert_eq!(active_threshold(&steps, 1e9).unwrap().color, "red");
    }

    #[test]
    fn below_all_steps_maps_to_first() {
        let steps = vec![Threshold::at(10.0, "blue"), Threshold::at(20.0, "red")];
        assert_eq!(active_threshold(&steps, 5.0).unwrap().color, "blue");
        assert!(active_threshold(&[], 5.0).is_none());
    }

    #[test]
    fn sorting_keeps_base_first() {
        let mut steps = vec![
            Threshold::at(80.0, "red"),
            Threshold::base("green"),
            Threshold::at(50.0, "orange"),
        ];
        sort_thresholds(&mut steps);
        assert_eq!(steps, self::steps());
    }
}
