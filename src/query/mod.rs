pub mod editor;
pub mod ref_id;

pub use editor::{QueryEditor, QueryEditorEvent};
pub use ref_id::{generate_ref_id, index_to_ref_id};
