use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file_and_ignores_later_inits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let second = dir.path().join("second.txt");

    assert!(gridscope::logging::init(true, Some(&path)));
    assert!(!gridscope::logging::init(false, Some(&second)));
    tracing::info!("test");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("test"));
    assert!(!second.exists(), "second log file should not be created");
}
