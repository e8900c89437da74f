#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

/// A module tree on disk: `support/<family>/<version>/configure/RELEASE`
/// and the same layout under `ioc/` for applications.
pub struct Fixture {
    pub root: PathBuf,
}

impl Fixture {
    pub fn new(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        fs::create_dir_all(root.join("support")).expect("create support root");
        fs::create_dir_all(root.join("ioc")).expect("create ioc root");
        Self { root }
    }

    pub fn support_root(&self) -> PathBuf {
        self.root.join("support")
    }

    pub fn application_root(&self) -> PathBuf {
        self.root.join("ioc")
    }

    pub fn support(&self, id: &str, deps: &[&str]) -> &Self {
        write_module(&self.support_root(), id, deps);
        self
    }

    pub fn application(&self, id: &str, deps: &[&str]) -> &Self {
        write_module(&self.application_root(), id, deps);
        self
    }

    /// Runs the binary from the fixture root with both roots passed as flags.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = self.command();
        cmd.arg("--support-root")
            .arg(self.support_root())
            .arg("--application-root")
            .arg(self.application_root())
            .args(args);
        cmd.output().expect("run tiergraph")
    }

    /// The binary with a clean environment and no root flags.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(tiergraph_bin());
        cmd.current_dir(&self.root)
            .env_remove("RUST_LOG")
            .env_remove("TIERGRAPH_CONFIG")
            .env_remove("TIERGRAPH_SOURCE")
            .env_remove("TIERGRAPH_SUPPORT_ROOT")
            .env_remove("TIERGRAPH_APPLICATION_ROOT")
            .env_remove("TIERGRAPH_SVN_URL")
            .env_remove("TIERGRAPH_JOBS");
        cmd
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn write_module(root: &Path, id: &str, deps: &[&str]) {
    let configure = root.join(id).join("configure");
    fs::create_dir_all(&configure).expect("create configure dir");

    let mut release = String::from(
        "# RELEASE - Location of external support modules\n\
         EPICS_BASE = /gem_sw/prod/R3.14.12.8/base\n\n",
    );
    for dep in deps {
        let name = dep.replace(['/', '-'], "_").to_ascii_uppercase();
        release.push_str(&format!("{name} = $(P)/{dep}\n"));
    }
    fs::write(configure.join("RELEASE"), release).expect("write RELEASE");
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn assert_success(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{context} failed\nstdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

/// `id -> tier` from `--format json` output.
pub fn json_tiers(output: &Output) -> Vec<(String, u64)> {
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse graph json");
    value["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .map(|node| {
            (
                node["id"].as_str().expect("node id").to_string(),
                node["tier"].as_u64().expect("node tier"),
            )
        })
        .collect()
}

pub fn tier_of(tiers: &[(String, u64)], id: &str) -> u64 {
    tiers
        .iter()
        .find(|(node, _)| node == id)
        .map(|(_, tier)| *tier)
        .unwrap_or_else(|| panic!("{id} missing from graph output"))
}

pub fn tiergraph_bin() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_tiergraph") {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_tiergraph") {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().expect("resolve current test binary path");
    let target_dir = current_exe
        .parent()
        .and_then(|path| path.parent())
        .expect("derive cargo target dir from test binary path");
    let bin_name = if cfg!(windows) {
        "tiergraph.exe"
    } else {
        "tiergraph"
    };
    let fallback = target_dir.join(bin_name);

    if fallback.is_file() {
        fallback
    } else {
        panic!(
            "CARGO_BIN_EXE_tiergraph is not set and fallback binary not found at {}",
            fallback.display()
        );
    }
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    let pid = std::process::id();
    std::env::temp_dir().join(format!("tiergraph-{prefix}-{pid}-{nanos}"))
}
