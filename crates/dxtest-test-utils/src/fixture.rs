use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::PathBuf;

pub const APPLET_DIR: &str = "mrcepid-testapplet";

const DXAPP_JSON: &str = r#"{
  "name": "mrcepid-testapplet",
  "version": "1.0.0",
  "dxapi": "1.0.0",
  "inputSpec": [
    {"name": "output_prefix", "class": "string"},
    {"name": "testing_script", "class": "file", "optional": true},
    {"name": "testing_directory", "class": "string", "optional": true}
  ],
  "outputSpec": [
    {"name": "output_tarball", "class": "file"}
  ],
  "runSpec": {
    "file": "src/testapplet.py",
    "interpreter": "python3",
    "distribution": "Ubuntu",
    "release": "20.04",
    "version": "0",
    "execDepends": [
      {"name": "general_utilities", "package_manager": "git",
       "url": "https://github.com/mrcepid-rap/general_utilities.git",
       "tag": "v1.5.2", "build_commands": "pip3 install ."},
      {"name": "burden", "package_manager": "git",
       "url": "https://github.com/mrcepid-rap/burden.git",
       "build_commands": "pip3 install ."},
      {"name": "pandas", "package_manager": "pip"}
    ]
  }
}
"#;

/// A throwaway applet checkout with a test script and nested test data.
pub struct FixtureTree {
    pub _temp_dir: tempfile::TempDir,
    pub root: PathBuf,
    pub src_dir: PathBuf,
    pub script: PathBuf,
    pub files_dir: PathBuf,
}

impl Default for FixtureTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureTree {
    pub fn new() -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("dxtest-fixture-")
            .tempdir()
            .expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let src_dir = root.join(APPLET_DIR);
        fs::create_dir_all(src_dir.join("src")).expect("Failed to create applet src dir");
        fs::create_dir_all(src_dir.join("resources/usr/bin"))
            .expect("Failed to create resources dir");
        fs::write(src_dir.join("dxapp.json"), DXAPP_JSON).expect("Failed to write dxapp.json");
        fs::write(src_dir.join("src/testapplet.py"), "def main():\n    pass\n")
            .expect("Failed to write applet code");
        fs::write(src_dir.join("resources/usr/bin/helper"), "#!/bin/sh\n")
            .expect("Failed to write resource");

        let script = root.join("test_applet.py");
        fs::write(&script, "def test_nothing():\n    assert True\n")
            .expect("Failed to write test script");

        let files_dir = root.join("test_data");
        let level2 = files_dir
            .join("subdir_upload_level1")
            .join("subdir_upload_level2");
        fs::create_dir_all(&level2).expect("Failed to create test data dirs");
        fs::write(files_dir.join("top.txt"), "top\n").expect("Failed to write fixture");
        fs::write(
            files_dir.join("subdir_upload_level1").join("level1.txt"),
            "level1\n",
        )
        .expect("Failed to write fixture");
        fs::write(level2.join("level2.txt"), "level2\n").expect("Failed to write fixture");

        Self {
            _temp_dir: temp_dir,
            root,
            src_dir,
            script,
            files_dir,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.src_dir.join("dxapp.json")
    }
}

/// The gzip tarball a finished test job publishes: one `pytest.<stamp>.log`.
pub fn artifact_tarball(stamp: &str) -> Vec<u8> {
    let log = format!("============ 1 passed in 0.01s ({}) ============\n", stamp);
    let mut header = tar::Header::new_gnu();
    header.set_size(log.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder
        .append_data(&mut header, format!("pytest.{}.log", stamp), log.as_bytes())
        .expect("Failed to append log to tarball");
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .expect("Failed to finish tarball")
}
