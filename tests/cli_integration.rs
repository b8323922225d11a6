use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

fn run_bin(args: &[&str], home: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sftp-mirror"))
        .args(args)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn sftp-mirror")
}

// a port on loopback with nothing listening
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn missing_required_flag_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let out = run_bin(
        &["--url", "127.0.0.1", "--username", "u", "--password", "p", "--remote-dir", "/data"],
        home.path(),
    );
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--local-dir"), "stderr: {}", stderr);
}

#[test]
fn refused_connection_exits_with_failure_and_touches_nothing() {
    let home = tempfile::tempdir().unwrap();
    let dest = home.path().join("dest");
    let url = format!("127.0.0.1:{}", closed_port());
    let out = run_bin(
        &[
            "--url",
            &url,
            "--username",
            "u",
            "--password",
            "p",
            "--remote-dir",
            "/data",
            "--local-dir",
            dest.to_str().unwrap(),
        ],
        home.path(),
    );
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("error:"), "stderr: {}", stderr);
    assert!(stderr.contains(&url), "stderr: {}", stderr);
    assert!(stderr.contains("no files were transferred"), "stderr: {}", stderr);
    assert!(!dest.exists());
}

#[test]
fn malformed_config_file_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let cfg = home.path().join("bad.json");
    std::fs::write(&cfg, "{ not json").unwrap();
    let out = run_bin(
        &[
            "--url",
            "127.0.0.1",
            "--username",
            "u",
            "--password",
            "p",
            "--remote-dir",
            "/data",
            "--local-dir",
            home.path().join("dest").to_str().unwrap(),
            "--config",
            cfg.to_str().unwrap(),
        ],
        home.path(),
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("malformed config file"));
}

#[test]
fn zero_buffer_flag_is_rejected_before_connecting() {
    let home = tempfile::tempdir().unwrap();
    let out = run_bin(
        &[
            "--url",
            "127.0.0.1:1",
            "--username",
            "u",
            "--password",
            "p",
            "--remote-dir",
            "/data",
            "--local-dir",
            home.path().join("dest").to_str().unwrap(),
            "--buf-kib",
            "0",
        ],
        home.path(),
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--buf-kib"));
}

#[test]
fn config_source_is_logged_once_tracing_is_up() {
    let home = tempfile::tempdir().unwrap();
    let cfg = home.path().join("mirror.json");
    std::fs::write(&cfg, r#"{"connect_timeout_secs":2}"#).unwrap();
    let url = format!("127.0.0.1:{}", closed_port());
    let out = Command::new(env!("CARGO_BIN_EXE_sftp-mirror"))
        .args([
            "--url",
            &url,
            "--username",
            "u",
            "--password",
            "p",
            "--remote-dir",
            "/data",
            "--local-dir",
            home.path().join("dest").to_str().unwrap(),
            "--config",
            cfg.to_str().unwrap(),
        ])
        .env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .env("RUST_LOG", "sftp_mirror=debug")
        .output()
        .expect("failed to spawn sftp-mirror");
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("loaded config from"), "stderr: {}", stderr);
    assert!(stderr.contains("mirror.json"), "stderr: {}", stderr);
}
