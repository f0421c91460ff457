use crate::signal::{Listeners, Subscription};
use url::{form_urlencoded, Url};

/// A query-string value after boolean coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
}

impl ParamValue {
    /// `"true"`/`"false"` become booleans; everything else stays a string.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            other => ParamValue::Str(other.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            ParamValue::Bool(_) => None,
        }
    }
}

/// Route path plus ordered query parameters of a hash-routed URL.
///
/// Repeated keys are kept in order, which is how list values are encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    path: String,
    params: Vec<(String, String)>,
}

impl UrlState {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            params: Vec::new(),
        }
    }

    /// Accepts a full URL (`http://host/#/d/abc?from=now-1h`), a bare
    /// fragment (`#/d/abc?…`) or a route (`/d/abc?…`).
    pub fn parse(input: &str) -> Self {
        let route = match Url::parse(input) {
            Ok(url) => url.fragment().unwrap_or_default().to_string(),
            Err(_) => input.trim_start_matches('#').to_string(),
        };
        let (path, query) = route.split_once('?').unwrap_or((route.as_str(), ""));
        let params = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self {
            path: path.to_string(),
            params,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    pub fn has(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all_raw(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.get_raw(name).map(ParamValue::parse)
    }

    pub fn get_all(&self, name: &str) -> Vec<ParamValue> {
        self.get_all_raw(name)
            .into_iter()
            .map(ParamValue::parse)
            .collect()
    }

    /// Replace every occurrence of `name` with a single value.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_all(name, &[value]);
    }

    /// Replace every occurrence of `name` with `values`, keeping the position
    /// of the first occurrence.
    pub fn set_all<S: AsRef<str>>(&mut self, name: &str, values: &[S]) {
        let at = self
            .params
            .iter()
            .position(|(k, _)| k == name)
            .unwrap_or(self.params.len());
        self.remove(name);
        let at = at.min(self.params.len());
        let entries = values
            .iter()
            .map(|v| (name.to_string(), v.as_ref().to_string()));
        self.params.splice(at..at, entries);
    }

    pub fn remove(&mut self, name: &str) {
        self.params.retain(|(k, _)| k != name);
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn to_query_string(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.params {
            ser.append_pair(k, v);
        }
        ser.finish()
    }

    /// Render back into fragment form, e.g. `#/d/abc?host=web`.
    pub fn to_fragment(&self) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            format!("#{}", self.path)
        } else {
            format!("#{}?{}", self.path, query)
        }
    }
}

/// Process-wide holder of the current URL state.
#[derive(Default)]
pub struct UrlStore {
    state: UrlState,
    listeners: Listeners<UrlState>,
}

impl UrlStore {
    pub fn new(state: UrlState) -> Self {
        Self {
            state,
            listeners: Listeners::new(),
        }
    }

    pub fn state(&self) -> &UrlState {
        &self.state
    }

    pub fn subscribe(&self, cb: impl Fn(&UrlState) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(cb)
    }

    pub fn navigate(&mut self, url: &str) -> bool {
        self.replace(UrlState::parse(url))
    }

    pub fn replace(&mut self, next: UrlState) -> bool {
        if next == self.state {
            return false;
        }
        self.state = next;
        tracing::debug!(url = %self.state.to_fragment(), "url changed");
        self.listeners.notify(&self.state);
        true
    }

    /// Mutate a copy of the current state and commit it if it changed.
    pub fn update(&mut self, f: impl FnOnce(&mut UrlState)) -> bool {
        let mut next = self.state.clone();
        f(&mut next);
        self.replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn parses_hash_routed_urls() {
        let url = UrlState::parse("http://localhost:8080/#/d/abc?host=web-1&region=us&region=eu");
        assert_eq!(url.path(), "/d/abc");
        assert_eq!(url.get_raw("host"), Some("web-1"));
        assert_eq!(url.get_all_raw("region"), vec!["us", "eu"]);
    }

    #[test]
    fn bare_fragment_and_route_forms() {
        let a = UrlState::parse("#/explore?x=1");
        let b = UrlState::parse("/explore?x=1");
        assert_eq!(a, b);
    }

    #[test]
    fn coerces_booleans() {
        let url = UrlState::parse("/d?kiosk=true&edit=false&name=truth");
        assert_eq!(url.get("kiosk"), Some(ParamValue::Bool(true)));
        assert_eq!(url.get("edit").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(url.get("name"), Some(ParamValue::Str("truth".into())));
    }

    #[test]
    fn arrays_round_trip_as_repeated_keys() {
        let mut url = UrlState::new("/d/x");
        url.set("from", "now-6h");
        url.set_all("region", &["us", "eu west"]);
        assert_eq!(url.to_query_string(), "from=now-6h&region=us&region=eu+west");
        assert_eq!(UrlState::parse(&url.to_fragment()), url);
    }

    #[test]
    fn set_all_keeps_first_position() {
        let mut url = UrlState::parse("/d?a=1&b=2&a=3&c=4");
        url.set_all("a", &["9"]);
        assert_eq!(url.to_query_string(), "a=9&b=2&c=4");
    }

    #[test]
    fn store_notifies_only_on_change() {
        let mut store = UrlStore::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(store.navigate("/d?host=a"));
        assert!(!store.navigate("#/d?host=a"));
        assert!(store.update(|u| u.set("host", "b")));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
