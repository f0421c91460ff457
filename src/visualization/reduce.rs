use serde::{Deserialize, Serialize};

/// Reduction of a series to a single value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReduceCalc {
    #[default]
    Last,
    Mean,
    Max,
    Min,
    Sum,
}

impl ReduceCalc {
    pub const ALL: [ReduceCalc; 5] = [
        ReduceCalc::Last,
        ReduceCalc::Mean,
        ReduceCalc::Max,
        ReduceCalc::Min,
        ReduceCalc::Sum,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReduceCalc::Last => "Last",
            ReduceCalc::Mean => "Mean",
            ReduceCalc::Max => "Max",
            ReduceCalc::Min => "Min",
            ReduceCalc::Sum => "Total",
        }
    }

    /// `None` for an empty series. Non-finite points are ignored.
    pub fn apply(self, points: &[(i64, f64)]) -> Option<f64> {
        let values = points.iter().map(|(_, v)| *v).filter(|v| v.is_finite());
        match self {
            ReduceCalc::Last => values.last(),
            ReduceCalc::Max => values.reduce(f64::max),
            ReduceCalc::Min => values.reduce(f64::min),
            ReduceCalc::Sum => values.reduce(|a, b| a + b),
            ReduceCalc::Mean => {
                let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                (count > 0).then(|| sum / count as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS: &[(i64, f64)] = &[(1, 2.0), (2, f64::NAN), (3, 6.0), (4, 4.0)];

    #[test]
    fn reductions() {
        assert_eq!(ReduceCalc::Last.apply(POINTS), Some(4.0));
        assert_eq!(ReduceCalc::Max.apply(POINTS), Some(6.0));
        assert_eq!(ReduceCalc::Min.apply(POINTS), Some(2.0));
        assert_eq!(ReduceCalc::Sum.apply(POINTS), Some(12.0));
        assert_eq!(ReduceCalc::Mean.apply(POINTS), Some(4.0));
    }

    #[test]
    fn empty_series_has_no_value() {
        for calc in ReduceCalc::ALL {
            assert_eq!(calc.apply(&[]), None);
        }
    }
}
