#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tvbox_sync_core::config::{ScratchPaths, SyncConfig, TransportConfig, TransportKind};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Files of a typical upstream snapshot, relative to its content root.
pub const SNAPSHOT_FILES: &[(&str, &[u8])] = &[
    ("channel1/api.json", b"{\"sites\":[]}"),
    ("channel1/jar/spider.jar", b"\x50\x4b\x03\x04binary"),
    ("channel2/notes.txt", b"no manifest here"),
    ("README.md", b"# upstream readme"),
    ("tvbox.txt", b"upstream index"),
];

/// Writes a zip whose entries all live under `root_dir/`.
pub fn write_zip(path: &Path, root_dir: &str, files: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("create zip");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer
        .add_directory(format!("{root_dir}/"), options)
        .expect("add root dir");
    for (name, content) in files {
        writer
            .start_file(format!("{root_dir}/{name}"), options)
            .expect("start file");
        writer.write_all(content).expect("write entry");
    }
    writer.finish().expect("finish zip");
}

/// Writes `files` into a plain directory tree.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, content) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(&path, content).expect("write file");
    }
}

/// Config rooted entirely inside `base`.
pub fn config_in(base: &Path, kind: TransportKind) -> SyncConfig {
    SyncConfig {
        publish_dir: base.join("public"),
        scratch: ScratchPaths {
            dir: base.join("temp_repo"),
            archive: base.join("temp_repo.zip"),
        },
        transport: TransportConfig {
            kind,
            source_url: "https://example.test/tvbox.git".into(),
            branch: Some("main".into()),
            archive_url: None,
            proxy: None,
        },
        domain: "cdn.example.org".into(),
        ..SyncConfig::default()
    }
}

pub fn read(path: PathBuf) -> Vec<u8> {
    fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}
