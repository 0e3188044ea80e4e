use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use gesture_overlay::config::GestureConfig;
use gesture_overlay::BackendKind;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "GESTURE_CONFIG",
        "GESTURE_MODEL_BACKEND",
        "GESTURE_MODEL_ENDPOINT",
        "GESTURE_MODEL",
        "GESTURE_CAMERA_DEVICE",
        "GESTURE_REQUEST_TIMEOUT_SECS",
        "GESTURE_BUFFER_DELAY_MS",
        "GEMINI_API_KEY",
        "API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GestureConfig::load().expect("load defaults");

    assert_eq!(cfg.model.backend, BackendKind::Gemini);
    assert_eq!(cfg.model.model, "gemini-2.5-flash");
    assert_eq!(cfg.model.temperature, 0.1);
    assert_eq!(cfg.model.request_timeout, None);
    assert_eq!(cfg.model.api_key, None);
    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!(cfg.camera.facing_mode, "user");
    assert_eq!(cfg.camera.ideal_width, 640);
    assert_eq!(cfg.camera.ideal_height, 480);
    assert_eq!(cfg.sampler.target_width, 320);
    assert_eq!(cfg.sampler.jpeg_quality, 60);
    assert_eq!(cfg.loop_timing.buffer_delay, Duration::from_millis(10));
    assert!(cfg.settings.show_overlay);
    assert!(cfg.settings.show_confidence);
    assert!(cfg.settings.show_history);
    assert!(cfg.settings.continuous);

    clear_env();
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "model": {
                "backend": "stub",
                "endpoint": "https://models.internal.example/v1beta",
                "model": "gemini-2.5-pro",
                "request_timeout_secs": 20
            },
            "camera": {
                "device": "stub://desk",
                "width": 1280,
                "height": 720
            },
            "sampler": { "jpeg_quality": 80 },
            "loop": { "buffer_delay_ms": 50, "continuous": false },
            "display": { "show_history": false }
        }"#,
    );

    std::env::set_var("GESTURE_CONFIG", file.path());
    std::env::set_var("GESTURE_MODEL", "gemini-2.5-flash-lite");
    std::env::set_var("GESTURE_BUFFER_DELAY_MS", "25");

    let cfg = GestureConfig::load().expect("load config");

    assert_eq!(cfg.model.backend, BackendKind::Stub);
    assert_eq!(cfg.model.endpoint, "https://models.internal.example/v1beta");
    assert_eq!(cfg.model.model, "gemini-2.5-flash-lite");
    assert_eq!(cfg.model.request_timeout, Some(Duration::from_secs(20)));
    assert_eq!(cfg.camera.device, "stub://desk");
    assert_eq!(cfg.camera.ideal_width, 1280);
    assert_eq!(cfg.camera.ideal_height, 720);
    assert_eq!(cfg.sampler.target_width, 320);
    assert_eq!(cfg.sampler.jpeg_quality, 80);
    assert_eq!(cfg.loop_timing.buffer_delay, Duration::from_millis(25));
    assert!(!cfg.settings.continuous);
    assert!(!cfg.settings.show_history);
    assert!(cfg.settings.show_overlay);

    // The stub backend needs no credentials.
    let client = cfg.client().expect("stub client");
    assert_eq!(client.backend_name(), "stub");

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[camera]
device = "stub://toml"
facing_mode = "environment"

[loop]
max_backoff_ms = 2000

[display]
show_confidence = false
"#,
    );
    std::env::set_var("GESTURE_CONFIG", file.path());

    let cfg = GestureConfig::load().expect("load toml config");

    assert_eq!(cfg.camera.device, "stub://toml");
    assert_eq!(cfg.camera.facing_mode, "environment");
    assert_eq!(cfg.loop_timing.max_backoff, Duration::from_secs(2));
    assert!(!cfg.settings.show_confidence);

    clear_env();
}

#[test]
fn api_key_comes_from_environment_in_order() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("API_KEY", "fallback-key");
    let cfg = GestureConfig::load().expect("load config");
    assert_eq!(cfg.model.api_key.as_deref(), Some("fallback-key"));

    std::env::set_var("GEMINI_API_KEY", "primary-key");
    let cfg = GestureConfig::load().expect("load config");
    assert_eq!(cfg.model.api_key.as_deref(), Some("primary-key"));
    assert!(!format!("{:?}", cfg.model).contains("primary-key"));

    let client = cfg.client().expect("gemini client");
    assert_eq!(client.backend_name(), "gemini");

    clear_env();
}

#[test]
fn remote_backend_without_api_key_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GestureConfig::load().expect("load config");
    let err = cfg.client().err().expect("missing key must fail");
    assert!(err.to_string().contains("GEMINI_API_KEY"));

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GESTURE_MODEL_ENDPOINT", "ftp://models.example");
    assert!(GestureConfig::load().is_err());
    std::env::remove_var("GESTURE_MODEL_ENDPOINT");

    std::env::set_var("GESTURE_BUFFER_DELAY_MS", "soon");
    assert!(GestureConfig::load().is_err());
    std::env::remove_var("GESTURE_BUFFER_DELAY_MS");

    std::env::set_var("GESTURE_REQUEST_TIMEOUT_SECS", "0");
    assert!(GestureConfig::load().is_err());
    std::env::remove_var("GESTURE_REQUEST_TIMEOUT_SECS");

    let file = write_config(".json", r#"{ "sampler": { "jpeg_quality": 0 } }"#);
    std::env::set_var("GESTURE_CONFIG", file.path());
    assert!(GestureConfig::load().is_err());

    let unknown = write_config(".json", r#"{ "model": { "api_key": "in-file" } }"#);
    std::env::set_var("GESTURE_CONFIG", unknown.path());
    assert!(GestureConfig::load().is_err());

    clear_env();
}
