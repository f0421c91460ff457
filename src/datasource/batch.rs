use super::{DatasetType, DatasourceStore, QueryRequest, Series};
use crate::dashboard::model::Query;
use crate::variables::{ResolvedRange, VariableValues};

/// Target number of points per series.
pub const MAX_DATA_POINTS: i64 = 500;
/// Lower bound of the query step.
pub const MIN_INTERVAL_MS: i64 = 1000;

/// Shared inputs of one batch.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub range: ResolvedRange,
    pub values: &'a VariableValues,
    pub dataset: DatasetType,
}

impl<'a> QueryContext<'a> {
    pub fn new(range: ResolvedRange, values: &'a VariableValues) -> Self {
        Self {
            range,
            values,
            dataset: DatasetType::TimeSeries,
        }
    }

    pub fn with_dataset(mut self, dataset: DatasetType) -> Self {
        self.dataset = dataset;
        self
    }
}

/// Query step for `range`. Snapshots ask for a single step spanning the range.
pub fn interval_for(range: &ResolvedRange, dataset: DatasetType) -> i64 {
    let span = range.to_ms() - range.from_ms();
    match dataset {
        DatasetType::TimeSeries => (span / MAX_DATA_POINTS).max(MIN_INTERVAL_MS),
        DatasetType::Snapshot => span.max(MIN_INTERVAL_MS),
    }
}

fn run_one(query: &Query, store: &DatasourceStore, ctx: &QueryContext<'_>) -> Vec<Series> {
    let Some(instance) = store.resolve(&query.datasource) else {
        tracing::debug!(ref_id = %query.ref_id, uid = %query.datasource.uid, "datasource not found; query skipped");
        return Vec::new();
    };
    let request = QueryRequest {
        target: instance.api.rewrite_query(query, ctx.values),
        range: ctx.range,
        interval_ms: interval_for(&ctx.range, ctx.dataset),
    };
    match instance.api.query(&request) {
        Ok(series) => series,
        Err(e) => {
            tracing::warn!(ref_id = %query.ref_id, uid = %instance.setting.uid, "query failed: {e:#}");
            Vec::new()
        }
    }
}

/// Run every query in parallel and flatten the results in query order.
///
/// Failures stay local: an unresolved datasource, an error or a panic in one
/// query yields no series for that query and leaves the others intact.
pub fn query_metrics(
    queries: &[Query],
    store: &DatasourceStore,
    ctx: &QueryContext<'_>,
) -> Vec<Series> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = queries
            .iter()
            .map(|query| scope.spawn(move || run_one(query, store, ctx)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(series) => series,
                Err(_) => {
                    tracing::error!("query worker panicked");
                    Vec::new()
                }
            })
            .collect()
    })
}
