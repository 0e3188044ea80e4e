use std::process::{Command, Stdio};

fn gesture_live(camera: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_gesture_live"))
        .args(["--camera", camera, "--stub-model", "--ui", "plain"])
        .env_remove("GESTURE_CONFIG")
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .expect("run gesture_live")
}

#[test]
fn camera_that_fails_to_open_reports_camera_error_once() {
    let output = gesture_live("stub://desk?fail=1");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert_eq!(stderr.matches("Camera Error").count(), 1, "stderr: {stderr}");
}

#[test]
fn camera_that_fails_mid_session_reports_camera_error_once() {
    let output = gesture_live("stub://desk?fail_after=3");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert_eq!(stderr.matches("Camera Error").count(), 1, "stderr: {stderr}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("digit"));
}
