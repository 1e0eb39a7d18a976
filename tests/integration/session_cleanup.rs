//! Integration tests for scoped sessions

use isoenv::error::IsoenvError;
use isoenv::exclude::ExclusionSet;
use isoenv::session::Session;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use crate::integration::{file_list, Layers};

#[test]
fn test_session_directory_holds_environment_files() {
    let layers = Layers::new();

    let files = Session::new(layers.sources(), "dev")
        .run(|dir| Ok(file_list(dir)))
        .unwrap();

    assert_eq!(files, vec!["a.conf", "b.conf", "etc/mapped_files.json"]);
}

#[test]
fn test_directory_removed_after_success() {
    let layers = Layers::new();

    let dir = Session::new(layers.sources(), "prod")
        .run(|dir| Ok(dir.to_path_buf()))
        .unwrap();

    assert!(!dir.exists());
}

#[test]
fn test_directory_removed_when_work_panics() {
    let layers = Layers::new();
    let session = Session::new(layers.sources(), "prod");
    let mut seen: Option<PathBuf> = None;

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        session
            .run(|dir| -> Result<(), IsoenvError> {
                seen = Some(dir.to_path_buf());
                panic!("work blew up");
            })
            .ok();
    }));

    assert!(result.is_err());
    let dir = seen.expect("work ran before panicking");
    assert!(!dir.exists());
}

#[test]
fn test_compiled_tree_close_reports_success() {
    let layers = Layers::new();

    let tree = Session::new(layers.sources(), "dev").compile().unwrap();
    let dir = tree.path().to_path_buf();
    assert_eq!(tree.outcome().map.len(), 2);
    assert_eq!(fs::read_to_string(dir.join("a.conf")).unwrap(), "site-a");

    tree.close().unwrap();
    assert!(!dir.exists());
}

#[test]
fn test_session_respects_exclusions() {
    let layers = Layers::new();
    fs::write(layers.site.join("secret.key"), "x").unwrap();

    let files = Session::new(layers.sources(), "prod")
        .with_exclusions(ExclusionSet::new([".git", "secret.key"]))
        .run(|dir| Ok(file_list(dir)))
        .unwrap();

    assert_eq!(files, vec!["a.conf", "etc/mapped_files.json"]);
}

#[test]
fn test_concurrent_sessions_use_distinct_directories() {
    let layers = Layers::new();
    let sources = layers.sources();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sources = sources.clone();
            std::thread::spawn(move || {
                Session::new(sources, "dev")
                    .run(|dir| Ok(dir.to_path_buf()))
                    .unwrap()
            })
        })
        .collect();
    let mut dirs: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    dirs.sort();
    dirs.dedup();

    assert_eq!(dirs.len(), 4);
}
