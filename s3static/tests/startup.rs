//! Startup validation of the s3static binary

use std::process::Command;

fn s3static() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_s3static"));
    for var in [
        "S3_ENDPOINT",
        "S3_BUCKET",
        "S3_BUCKET_PATH",
        "S3_ACCESS_KEY",
        "S3_SECRET_KEY",
        "S3_ADDRESS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_empty_bucket_exits_before_binding() {
    // Hold the port so a bind attempt would be observable as a different error
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let output = s3static()
        .args(["--endpoint", "http://127.0.0.1:9000", "--address", &address])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Bucket name cannot be empty"), "{stderr}");
    assert!(!stderr.contains("Address already in use"), "{stderr}");
}

#[test]
fn test_blank_bucket_from_env_is_rejected() {
    let output = s3static()
        .env("S3_BUCKET", "   ")
        .env("S3_ENDPOINT", "http://127.0.0.1:9000")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Bucket name cannot be empty"));
}

#[test]
fn test_invalid_endpoint_is_fatal() {
    let output = s3static()
        .args(["--bucket", "site", "--endpoint", "not a url"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid endpoint"));
}
