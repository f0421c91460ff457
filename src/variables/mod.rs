pub mod sync;
pub mod template;
pub mod time_range;
pub mod url_state;

pub use sync::{SyncState, VariableSync, VariableValues};
pub use time_range::{ResolvedRange, TimeRange};
pub use url_state::{ParamValue, UrlState, UrlStore};
