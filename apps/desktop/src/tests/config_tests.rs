use super::{load_settings_with, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

fn temp_config(label: &str, contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("remixer_config_test_{label}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("remixer.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = load_settings_with(Some(Path::new("/nonexistent/remixer.toml")), no_env)
        .expect_err("missing file");
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn file_values_override_defaults() {
    let path = temp_config(
        "file",
        "backend_url = \"http://remixer.internal:9000\"\nrequest_timeout_secs = 30\n",
    );

    let settings = load_settings_with(Some(&path), no_env).expect("settings");

    assert_eq!(
        settings,
        Settings {
            backend_url: "http://remixer.internal:9000".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    );
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn environment_overrides_file() {
    let path = temp_config("env", "backend_url = \"http://from-file\"\n");
    let env = env_from(&[
        ("REMIXER_API_URL", "http://from-react-style-env"),
        ("APP__BACKEND_URL", "http://from-app-env"),
        ("APP__CONNECT_TIMEOUT_SECS", "3"),
    ]);

    let settings = load_settings_with(Some(&path), env).expect("settings");

    assert_eq!(settings.backend_url, "http://from-app-env");
    assert_eq!(settings.connect_timeout_secs, 3);
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn unknown_keys_and_bad_timeouts_are_rejected() {
    let path = temp_config("unknown", "backend = \"typo\"\n");
    let err = load_settings_with(Some(&path), no_env).expect_err("unknown key");
    assert!(err.to_string().contains("invalid config file"));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");

    let path = temp_config("timeouts", "");
    let err = load_settings_with(
        Some(&path),
        env_from(&[("APP__REQUEST_TIMEOUT_SECS", "0")]),
    )
    .expect_err("zero timeout");
    assert!(err.to_string().contains("greater than zero"));
    let err = load_settings_with(
        Some(&path),
        env_from(&[("APP__REQUEST_TIMEOUT_SECS", "soon")]),
    )
    .expect_err("non-numeric timeout");
    assert!(err.to_string().contains("whole number"));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}
