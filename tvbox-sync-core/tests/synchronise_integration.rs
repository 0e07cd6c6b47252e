// End-to-end runs of the pipeline against temporary directories.
// Transports are mocked; extraction tools are mocked to fail so the
// in-process zip reader does the work.

mod support;

use std::fs;

use tvbox_sync_core::config::{ScratchPaths, TransportConfig, TransportKind};
use tvbox_sync_core::contract::{
    CommandOutcome, ExtractError, MockCommandRunner, MockTransport, ScratchArtifact,
    TransportError,
};
use tvbox_sync_core::extract::ExtractStrategy;
use tvbox_sync_core::index::IndexDocument;
use tvbox_sync_core::synchronise::{synchronise, SyncError};

fn unused_runner() -> MockCommandRunner {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().times(0);
    runner
}

fn read_index(path: std::path::PathBuf) -> IndexDocument {
    serde_json::from_slice(&support::read(path)).expect("index is valid JSON")
}

#[tokio::test]
async fn test_clone_run_publishes_tree_and_index() {
    let base = tempfile::tempdir().unwrap();
    let config = support::config_in(base.path(), TransportKind::Clone);
    support::write_tree(&config.publish_dir, &[("local/keep.txt", &b"local"[..])]);

    let mut transport = MockTransport::new();
    transport
        .expect_fetch()
        .times(1)
        .returning(|_: &TransportConfig, scratch: &ScratchPaths| {
            support::write_tree(&scratch.dir, support::SNAPSHOT_FILES);
            fs::create_dir_all(scratch.dir.join(".git")).unwrap();
            Ok(ScratchArtifact::Directory(scratch.dir.clone()))
        });

    let report = synchronise(&config, &transport, &unused_runner())
        .await
        .expect("clone run succeeds");

    assert_eq!(report.transport, TransportKind::Clone);
    assert_eq!(report.extraction, None);
    assert_eq!(report.index_entries, 1);
    assert_eq!(
        support::read(config.publish_dir.join("channel1/api.json")),
        b"{\"sites\":[]}".to_vec()
    );
    assert!(config.publish_dir.join("local/keep.txt").exists());
    assert!(!config.publish_dir.join(".git").exists());
    assert!(!config.publish_dir.join("README.md").exists());
    assert!(!config.publish_dir.join("tvbox.txt").exists());
    assert!(!config.scratch.dir.exists(), "scratch dir is cleaned up");

    let index = read_index(report.index_path);
    assert_eq!(index.urls.len(), 1);
    assert_eq!(index.urls[0].url, "https://cdn.example.org/channel1/api.json");
    assert_eq!(index.urls[0].name, "channel1");
}

#[tokio::test]
async fn test_download_run_falls_back_to_per_entry_extraction() {
    let base = tempfile::tempdir().unwrap();
    let config = support::config_in(base.path(), TransportKind::Download);

    let mut transport = MockTransport::new();
    transport
        .expect_fetch()
        .times(1)
        .returning(|_: &TransportConfig, scratch: &ScratchPaths| {
            support::write_zip(&scratch.archive, "tvbox-main", support::SNAPSHOT_FILES);
            Ok(ScratchArtifact::Archive {
                archive: scratch.archive.clone(),
                dir: scratch.dir.clone(),
            })
        });

    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(2)
        .returning(|_| Ok(CommandOutcome::failure(127)));

    let report = synchronise(&config, &transport, &runner)
        .await
        .expect("download run succeeds");

    assert_eq!(report.extraction, Some(ExtractStrategy::PerEntry));
    assert!(report.skipped_entries.is_empty());
    for (name, content) in support::SNAPSHOT_FILES {
        if *name == "README.md" || *name == "tvbox.txt" {
            continue;
        }
        assert_eq!(
            support::read(config.publish_dir.join(name)),
            content.to_vec(),
            "{name} should match the archive"
        );
    }
    assert!(!config.scratch.dir.exists());
    assert!(!config.scratch.archive.exists());
    assert_eq!(read_index(report.index_path).urls.len(), 1);
}

#[tokio::test]
async fn test_transport_failure_cleans_up_and_leaves_publish_untouched() {
    let base = tempfile::tempdir().unwrap();
    let config = support::config_in(base.path(), TransportKind::Clone);
    support::write_tree(&config.publish_dir, &[("channel9/api.json", &b"{}"[..])]);

    let mut transport = MockTransport::new();
    transport
        .expect_fetch()
        .times(1)
        .returning(|_: &TransportConfig, scratch: &ScratchPaths| {
            // a failed clone can leave a half-written checkout behind
            fs::create_dir_all(scratch.dir.join("partial")).unwrap();
            Err(TransportError::CommandFailed {
                program: "git".into(),
                status: "exit status 128".into(),
            })
        });

    let err = synchronise(&config, &transport, &unused_runner())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Transport(_)), "got {err:?}");
    assert!(!config.scratch.dir.exists());
    assert!(!config.publish_dir.join(&config.index_file).exists());
    assert!(config.publish_dir.join("channel9/api.json").exists());
}

#[tokio::test]
async fn test_zero_byte_download_fails_before_extraction_tools() {
    let base = tempfile::tempdir().unwrap();
    let config = support::config_in(base.path(), TransportKind::Download);

    let mut transport = MockTransport::new();
    transport
        .expect_fetch()
        .times(1)
        .returning(|_: &TransportConfig, scratch: &ScratchPaths| {
            fs::write(&scratch.archive, b"").unwrap();
            Ok(ScratchArtifact::Archive {
                archive: scratch.archive.clone(),
                dir: scratch.dir.clone(),
            })
        });

    let err = synchronise(&config, &transport, &unused_runner())
        .await
        .unwrap_err();

    assert!(
        matches!(err, SyncError::Extract(ExtractError::EmptyOrMissing { .. })),
        "got {err:?}"
    );
    assert!(!config.scratch.archive.exists(), "archive removed on failure");
    assert!(!config.publish_dir.join(&config.index_file).exists());
}

#[tokio::test]
async fn test_second_run_over_same_snapshot_is_stable() {
    let base = tempfile::tempdir().unwrap();
    let config = support::config_in(base.path(), TransportKind::Clone);

    let mut transport = MockTransport::new();
    transport
        .expect_fetch()
        .times(2)
        .returning(|_: &TransportConfig, scratch: &ScratchPaths| {
            support::write_tree(&scratch.dir, support::SNAPSHOT_FILES);
            Ok(ScratchArtifact::Directory(scratch.dir.clone()))
        });

    let first = synchronise(&config, &transport, &unused_runner()).await.unwrap();
    let first_bytes = support::read(first.index_path.clone());
    let second = synchronise(&config, &transport, &unused_runner()).await.unwrap();

    assert_eq!(first_bytes, support::read(second.index_path));
}
