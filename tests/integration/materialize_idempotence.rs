//! Integration tests for destination materialization

use isoenv::compile::{compile_directories, CompileRequest};
use isoenv::exclude::ExclusionSet;
use isoenv::materialize::{Materializer, MANIFEST_DIR, MANIFEST_FILE};
use isoenv::overlay::map_files;
use std::collections::BTreeMap;
use std::fs;
use std::time::{Duration, SystemTime};

use crate::integration::{file_list, snapshot, write_file, Layers};

#[test]
fn test_compile_twice_is_identical() {
    let layers = Layers::new();
    let dest = layers.dest();
    let request = CompileRequest::new(layers.sources(), dest.clone(), "dev");

    let first = compile_directories(&request).unwrap();
    let after_first = snapshot(&dest);
    let second = compile_directories(&request).unwrap();
    let after_second = snapshot(&dest);

    assert_eq!(first.map, second.map);
    assert_eq!(after_first, after_second);
    assert_eq!(second.summary.removed_files, 3);
    assert_eq!(second.summary.copied_files, 2);
}

#[test]
fn test_destination_holds_exactly_the_map_plus_manifest() {
    let layers = Layers::new();
    let dest = layers.dest();
    write_file(&dest, "stale/old.txt", "old");
    write_file(&dest, "leftover.txt", "old");

    let request = CompileRequest::new(layers.sources(), dest.clone(), "dev");
    compile_directories(&request).unwrap();

    assert_eq!(
        file_list(&dest),
        vec!["a.conf", "b.conf", "etc/mapped_files.json"]
    );
    assert!(!dest.join("stale").exists());
    assert_eq!(fs::read_to_string(dest.join("a.conf")).unwrap(), "site-a");
    assert_eq!(fs::read_to_string(dest.join("b.conf")).unwrap(), "dev-b");
}

#[test]
fn test_manifest_content() {
    let layers = Layers::new();
    let dest = layers.dest();
    let request = CompileRequest::new(layers.sources(), dest.clone(), "dev");
    compile_directories(&request).unwrap();

    let raw = fs::read_to_string(dest.join(MANIFEST_DIR).join(MANIFEST_FILE)).unwrap();
    let manifest: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(
        dest.join("a.conf").to_string_lossy().into_owned(),
        layers.site.join("a.conf").to_string_lossy().into_owned(),
    );
    expected.insert(
        dest.join("b.conf").to_string_lossy().into_owned(),
        layers
            .base
            .join("ENVIRONMENT_SPECIFIC/dev/b.conf")
            .to_string_lossy()
            .into_owned(),
    );
    assert_eq!(manifest, expected);
    assert!(raw.starts_with("{\n    \""));
}

#[test]
fn test_dry_run_leaves_destination_untouched() {
    let layers = Layers::new();
    let dest = layers.dest();
    write_file(&dest, "keep-me.txt", "untouched");
    write_file(&dest, "sub/also.txt", "untouched");
    let before = snapshot(&dest);

    let request = CompileRequest::new(layers.sources(), dest.clone(), "prod").dry_run(true);
    let outcome = compile_directories(&request).unwrap();

    assert_eq!(snapshot(&dest), before);
    assert_eq!(outcome.map.len(), 1);
    assert_eq!(outcome.summary.removed_files, 2);
    assert_eq!(outcome.summary.copied_files, 1);
}

#[test]
fn test_dry_run_does_not_create_missing_destination() {
    let layers = Layers::new();
    let dest = layers.dest();

    let request = CompileRequest::new(layers.sources(), dest.clone(), "prod").dry_run(true);
    compile_directories(&request).unwrap();

    assert!(!dest.exists());
}

#[test]
fn test_excluded_content_survives_cleanup() {
    let layers = Layers::new();
    let dest = layers.dest();
    write_file(&dest, ".git/HEAD", "ref: refs/heads/main");
    write_file(&dest, "vendor/.git/config", "x");
    write_file(&dest, "vendor/lib.txt", "stale");

    let request = CompileRequest::new(layers.sources(), dest.clone(), "prod");
    compile_directories(&request).unwrap();

    assert!(dest.join(".git/HEAD").is_file());
    assert!(dest.join("vendor/.git/config").is_file());
    assert!(!dest.join("vendor/lib.txt").exists());
}

#[test]
fn test_copy_preserves_modification_time() {
    let layers = Layers::new();
    let dest = layers.dest();
    let source = layers.site.join("a.conf");
    let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    fs::File::options()
        .write(true)
        .open(&source)
        .unwrap()
        .set_modified(stamp)
        .unwrap();

    let map = map_files(&layers.sources(), &dest, "prod", &ExclusionSet::default()).unwrap();
    Materializer::new(dest.clone()).materialize(&map).unwrap();

    let copied = fs::metadata(dest.join("a.conf")).unwrap().modified().unwrap();
    assert_eq!(copied, stamp);
}

#[test]
fn test_copied_file_does_not_alias_source() {
    let layers = Layers::new();
    let dest = layers.dest();
    let request = CompileRequest::new(layers.sources(), dest.clone(), "prod");
    compile_directories(&request).unwrap();

    fs::write(dest.join("a.conf"), "edited").unwrap();

    assert_eq!(fs::read_to_string(layers.site.join("a.conf")).unwrap(), "site-a");
}
