use gridscope::dashboard::model::{Variable, VariableValue};
use gridscope::variables::template::substitute;
use gridscope::variables::time_range::{FROM_PARAM, TO_PARAM};
use gridscope::variables::{SyncState, TimeRange, UrlState, UrlStore, VariableSync};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn definitions() -> Vec<Variable> {
    vec![
        Variable::new("host", "web-1"),
        Variable::new("region", vec!["us"]).multi(),
    ]
}

#[test]
fn url_changes_flow_into_variable_values() {
    let mut urls = UrlStore::new(UrlState::parse("#/dashboard?host=web-2"));
    let sync = Arc::new(Mutex::new(VariableSync::new(definitions())));
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _values_sub = sync.lock().unwrap().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let _binding = VariableSync::bind(&sync, &urls);

    {
        let sync = sync.lock().unwrap();
        assert_eq!(sync.state(), SyncState::Stable);
        assert_eq!(sync.values().get("host"), Some(&VariableValue::from("web-2")));
        assert_eq!(sync.values().get("region"), Some(&VariableValue::from(vec!["us"])));
    }
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    urls.update(|url| url.set_all("region", &["eu", "ap"]));
    assert_eq!(
        sync.lock().unwrap().values().get("region"),
        Some(&VariableValue::from(vec!["eu", "ap"]))
    );
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    // Unrelated parameters leave the values alone.
    urls.update(|url| url.set("panel", "3"));
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    urls.update(|url| {
        url.set(FROM_PARAM, "now-6h");
        url.set(TO_PARAM, "now");
    });
    let values = sync.lock().unwrap().values().clone();
    assert_eq!(notified.load(Ordering::SeqCst), 3);
    assert_eq!(
        values.time_range(&TimeRange::default()),
        TimeRange::new("now-6h", "now")
    );
}

#[test]
fn dropped_binding_stops_updates() {
    let mut urls = UrlStore::new(UrlState::new("/dashboard"));
    let sync = Arc::new(Mutex::new(VariableSync::new(definitions())));
    let binding = VariableSync::bind(&sync, &urls);
    drop(binding);
    urls.update(|url| url.set("host", "db-1"));
    assert_eq!(
        sync.lock().unwrap().values().get("host"),
        Some(&VariableValue::from("web-1"))
    );
}

#[test]
fn resolved_values_substitute_into_queries() {
    let mut sync = VariableSync::new(definitions());
    sync.on_url_change(&UrlState::parse("/d?host=web-9&region=us&region=eu"));
    let values = sync.values();
    assert_eq!(substitute("up{host=\"$host\"}", values), "up{host=\"web-9\"}");
    assert_eq!(substitute("${region:pipe}", values), "us|eu");
    assert_eq!(substitute("[[region]]", values), "{us,eu}");
    assert_eq!(substitute("$missing", values), "$missing");
}
