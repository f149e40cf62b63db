use super::*;

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_settings_file(contents: &str) -> (PathBuf, PathBuf) {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = env::temp_dir().join(format!("gym_remote_config_test_{suffix}"));
    fs::create_dir_all(&root).expect("temp root");
    let path = root.join(SETTINGS_FILE);
    fs::write(&path, contents).expect("write settings");
    (root, path)
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/controller.toml"), env_from(&[]));
    assert_eq!(settings, ControllerSettings::default());
    assert_eq!(settings.debounce_delay(), Duration::from_millis(300));
    assert!(settings.flush_settings_on_leave);
}

#[test]
fn file_values_override_defaults_and_keep_missing_fields() {
    let (root, path) = temp_settings_file(
        r#"
identity = "Anna"
grace_window_ms = 5000
"#,
    );

    let settings = load_settings_from(&path, env_from(&[]));
    assert_eq!(settings.identity, "Anna");
    assert_eq!(settings.grace_window(), Duration::from_secs(5));
    assert_eq!(settings.debounce_ms, 300);

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn environment_wins_over_file_and_app_prefix_wins_last() {
    let (root, path) = temp_settings_file("identity = \"Anna\"\n");

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("CONTROLLER_IDENTITY", "Bertil"),
            ("APP__IDENTITY", "Cecilia"),
            ("CONTROLLER_DEBOUNCE_MS", "150"),
            ("CONTROLLER_FLUSH_ON_LEAVE", "false"),
        ]),
    );
    assert_eq!(settings.identity, "Cecilia");
    assert_eq!(settings.debounce_ms, 150);
    assert!(!settings.flush_settings_on_leave);

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn invalid_overrides_keep_previous_values() {
    let settings = load_settings_from(
        Path::new("/nonexistent/controller.toml"),
        env_from(&[
            ("CONTROLLER_GRACE_WINDOW_MS", "soon"),
            ("CONTROLLER_FLUSH_ON_LEAVE", "maybe"),
        ]),
    );
    assert_eq!(settings.grace_window_ms, 3000);
    assert!(settings.flush_settings_on_leave);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let (root, path) = temp_settings_file("identity = [");
    let settings = load_settings_from(&path, env_from(&[]));
    assert_eq!(settings, ControllerSettings::default());
    fs::remove_dir_all(root).expect("cleanup");
}
