mod support;

use std::fs;

use tvbox_sync_core::contract::IndexError;
use tvbox_sync_core::index::{generate_index, regenerate_index, IndexDocument, IndexEntry};

#[test]
fn test_only_directories_with_manifest_are_listed() {
    let publish = tempfile::tempdir().unwrap();
    support::write_tree(publish.path(), &[("A/api.json", b"{}"), ("B/other.json", b"{}")]);

    let document = generate_index(publish.path(), "example.com", "api.json").unwrap();

    assert_eq!(document.urls.len(), 1);
    assert_eq!(document.urls[0].name, "A");
    assert!(document.urls[0].url.ends_with("/A/api.json"));
}

#[test]
fn test_example_document_matches_expected_json() {
    let publish = tempfile::tempdir().unwrap();
    support::write_tree(publish.path(), &[("channel1/api.json", b"{}")]);
    fs::create_dir(publish.path().join("channel2")).unwrap();

    let document = generate_index(publish.path(), "cdn.example.org", "api.json").unwrap();

    assert_eq!(
        serde_json::to_string(&document).unwrap(),
        r#"{"urls":[{"url":"https://cdn.example.org/channel1/api.json","name":"channel1"}]}"#
    );
}

#[test]
fn test_nested_manifests_and_root_files_are_ignored() {
    let publish = tempfile::tempdir().unwrap();
    support::write_tree(
        publish.path(),
        &[
            ("api.json", b"{}"),
            ("outer/inner/api.json", b"{}"),
            ("zeta/api.json", b"{}"),
            ("alpha/api.json", b"{}"),
        ],
    );

    let document = generate_index(publish.path(), "example.com", "api.json").unwrap();

    assert_eq!(
        document,
        IndexDocument {
            urls: vec![
                IndexEntry {
                    url: "https://example.com/alpha/api.json".into(),
                    name: "alpha".into(),
                },
                IndexEntry {
                    url: "https://example.com/zeta/api.json".into(),
                    name: "zeta".into(),
                },
            ]
        }
    );
}

#[test]
fn test_regenerating_unchanged_tree_is_byte_identical() {
    let publish = tempfile::tempdir().unwrap();
    support::write_tree(
        publish.path(),
        &[("b/api.json", &b"{}"[..]), ("a/api.json", &b"{}"[..]), ("c/x.txt", &b""[..])],
    );

    regenerate_index(publish.path(), "example.com", "api.json", "tvtxt.txt").unwrap();
    let first = support::read(publish.path().join("tvtxt.txt"));
    regenerate_index(publish.path(), "example.com", "api.json", "tvtxt.txt").unwrap();
    let second = support::read(publish.path().join("tvtxt.txt"));

    assert_eq!(first, second);
    let parsed: IndexDocument = serde_json::from_slice(&first).unwrap();
    assert_eq!(parsed.urls.len(), 2);
    assert!(String::from_utf8(first).unwrap().contains("\n  \"urls\""));
}

#[test]
fn test_index_is_fully_rewritten_when_entries_disappear() {
    let publish = tempfile::tempdir().unwrap();
    support::write_tree(publish.path(), &[("a/api.json", b"{}"), ("b/api.json", b"{}")]);
    regenerate_index(publish.path(), "example.com", "api.json", "tvtxt.txt").unwrap();

    fs::remove_file(publish.path().join("b/api.json")).unwrap();
    let document =
        regenerate_index(publish.path(), "example.com", "api.json", "tvtxt.txt").unwrap();

    let written: IndexDocument =
        serde_json::from_slice(&support::read(publish.path().join("tvtxt.txt"))).unwrap();
    assert_eq!(written, document);
    assert_eq!(written.urls.len(), 1);
}

#[test]
fn test_missing_publish_dir_is_scan_error() {
    let base = tempfile::tempdir().unwrap();
    let err = generate_index(&base.path().join("nope"), "example.com", "api.json").unwrap_err();
    assert!(matches!(err, IndexError::Scan { .. }));
}
