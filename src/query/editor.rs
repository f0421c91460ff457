use crate::common::json::set_path;
use crate::dashboard::model::Query;
use crate::query::ref_id::generate_ref_id;
use crate::signal::{Listeners, Subscription};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryEditorEvent {
    TargetsChanged,
    ActiveChanged,
}

/// Query targets edited in one explore or panel-edit session.
///
/// Targets are never removed by toggling; `active` and `hide` only decide
/// which targets go into the next query batch.
pub struct QueryEditor {
    targets: Vec<Query>,
    used: HashSet<String>,
    active: HashSet<String>,
    listeners: Listeners<QueryEditorEvent>,
}

impl Default for QueryEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEditor {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            used: HashSet::new(),
            active: HashSet::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(
        &self,
        cb: impl Fn(&QueryEditorEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.subscribe(cb)
    }

    pub fn targets(&self) -> &[Query] {
        &self.targets
    }

    pub fn is_active(&self, ref_id: &str) -> bool {
        self.active.contains(ref_id)
    }

    pub fn used_ref_ids(&self) -> &HashSet<String> {
        &self.used
    }

    /// Targets that take part in the next query batch.
    pub fn active_targets(&self) -> Vec<&Query> {
        self.targets
            .iter()
            .filter(|t| !t.hide && self.active.contains(&t.ref_id))
            .collect()
    }

    /// Replace the session's targets.
    ///
    /// A list equal to the current targets is a no-op. Otherwise the list is
    /// copied, missing or duplicate ref-ids are regenerated and every target
    /// becomes active.
    pub fn set_targets(&mut self, targets: &[Query]) -> bool {
        if targets == self.targets.as_slice() {
            return false;
        }
        let mut next = targets.to_vec();
        self.used.clear();
        self.active.clear();
        for target in &next {
            if !target.ref_id.is_empty() {
                self.used.insert(target.ref_id.clone());
            }
        }
        let mut seen = HashSet::new();
        for target in &mut next {
            if target.ref_id.is_empty() || !seen.insert(target.ref_id.clone()) {
                let id = generate_ref_id(&self.used);
                if id.is_empty() {
                    tracing::warn!("no free ref-id left for query target");
                } else {
                    self.used.insert(id.clone());
                    seen.insert(id.clone());
                }
                target.ref_id = id;
            }
            self.active.insert(target.ref_id.clone());
        }
        self.targets = next;
        self.listeners.notify(&QueryEditorEvent::TargetsChanged);
        true
    }

    /// Append a target with the next free ref-id. `None` once the ids are
    /// exhausted.
    pub fn add_target(&mut self, datasource_uid: &str, request: Value) -> Option<String> {
        let id = generate_ref_id(&self.used);
        if id.is_empty() {
            tracing::warn!("no free ref-id left for query target");
            return None;
        }
        self.used.insert(id.clone());
        self.active.insert(id.clone());
        self.targets.push(Query::new(&id, datasource_uid, request));
        self.listeners.notify(&QueryEditorEvent::TargetsChanged);
        Some(id)
    }

    /// Flip whether `ref_id` is part of the active set. Returns the new state.
    pub fn toggle_active(&mut self, ref_id: &str) -> bool {
        let now_active = if self.active.remove(ref_id) {
            false
        } else {
            self.active.insert(ref_id.to_string());
            true
        };
        self.listeners.notify(&QueryEditorEvent::ActiveChanged);
        now_active
    }

    /// Flip the hide flag of the target at `index`. Returns the new flag.
    pub fn toggle_hide(&mut self, index: usize) -> Option<bool> {
        let target = self.targets.get_mut(index)?;
        target.hide = !target.hide;
        let hide = target.hide;
        self.listeners.notify(&QueryEditorEvent::TargetsChanged);
        Some(hide)
    }

    /// Apply `path → value` pairs (e.g. `{"request.where": "…"}`) to the
    /// target at `index` without touching sibling fields.
    ///
    /// Patches that would leave the target malformed are rejected.
    pub fn update_target_config(&mut self, index: usize, patch: &Value) -> bool {
        let Some(target) = self.targets.get(index) else {
            return false;
        };
        let Value::Object(entries) = patch else {
            return false;
        };
        let mut raw = match serde_json::to_value(target) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("failed to serialize query target: {e}");
                return false;
            }
        };
        for (path, value) in entries {
            set_path(&mut raw, path, value.clone());
        }
        let next: Query = match serde_json::from_value(raw) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(index, "rejected query patch: {e}");
                return false;
            }
        };
        if next == *target {
            return false;
        }
        if next.ref_id != target.ref_id {
            let old = target.ref_id.clone();
            self.used.remove(&old);
            if self.active.remove(&old) {
                self.active.insert(next.ref_id.clone());
            }
            self.used.insert(next.ref_id.clone());
        }
        self.targets[index] = next;
        self.listeners.notify(&QueryEditorEvent::TargetsChanged);
        true
    }

    /// Remove the target at `index` and return its ref-id to the free pool.
    pub fn delete_target(&mut self, index: usize) -> Option<Query> {
        if index >= self.targets.len() {
            return None;
        }
        let removed = self.targets.remove(index);
        if !self.targets.iter().any(|t| t.ref_id == removed.ref_id) {
            self.used.remove(&removed.ref_id);
            self.active.remove(&removed.ref_id);
        }
        self.listeners.notify(&QueryEditorEvent::TargetsChanged);
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn target(ref_id: &str) -> Query {
        Query::new(ref_id, "ds", json!({"expr": "up", "where": "a"}))
    }

    #[test]
    fn set_targets_assigns_missing_ids() {
        let mut editor = QueryEditor::new();
        assert!(editor.set_targets(&[target("A"), target(""), target("A")]));
        let ids: Vec<&str> = editor.targets().iter().map(|t| t.ref_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(editor.active_targets().len(), 3);
    }

    #[test]
    fn identical_targets_are_a_no_op() {
        let mut editor = QueryEditor::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = editor.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let list = vec![target("A")];
        assert!(editor.set_targets(&list));
        assert!(!editor.set_targets(&list.clone()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn supplying_the_old_list_again_undoes_local_edits() {
        let mut editor = QueryEditor::new();
        let list = vec![target("A")];
        assert!(editor.set_targets(&list));
        editor.add_target("ds", json!({}));
        assert_eq!(editor.targets().len(), 2);

        assert!(editor.set_targets(&list));
        assert_eq!(editor.targets(), list.as_slice());
    }

    #[test]
    fn toggles_do_not_remove_targets() {
        let mut editor = QueryEditor::new();
        editor.set_targets(&[target("A"), target("B")]);
        assert!(!editor.toggle_active("A"));
        assert_eq!(editor.toggle_hide(1), Some(true));
        assert_eq!(editor.targets().len(), 2);
        assert!(editor.active_targets().is_empty());
        assert!(editor.toggle_active("A"));
        assert_eq!(editor.active_targets().len(), 1);
        assert_eq!(editor.toggle_hide(9), None);
    }

    #[test]
    fn dotted_patch_keeps_siblings() {
        let mut editor = QueryEditor::new();
        editor.set_targets(&[target("A")]);
        assert!(editor.update_target_config(0, &json!({"request.where": "b"})));
        assert_eq!(
            editor.targets()[0].request,
            json!({"expr": "up", "where": "b"})
        );
        assert!(!editor.update_target_config(0, &json!({"request.where": "b"})));
        assert!(!editor.update_target_config(0, &json!({"hide": "nope"})));
    }

    #[test]
    fn deleting_frees_the_ref_id() {
        let mut editor = QueryEditor::new();
        editor.set_targets(&[target("A"), target("B")]);
        let removed = editor.delete_target(0).unwrap();
        assert_eq!(removed.ref_id, "A");
        assert!(!editor.used_ref_ids().contains("A"));
        assert!(!editor.is_active("A"));
        assert_eq!(editor.add_target("ds", json!({})).as_deref(), Some("A"));
    }

    #[test]
    fn add_target_stops_after_26() {
        let mut editor = QueryEditor::new();
        for _ in 0..26 {
            assert!(editor.add_target("ds", json!({})).is_some());
        }
        assert_eq!(editor.add_target("ds", json!({})), None);
        assert_eq!(editor.targets().len(), 26);
    }
}
