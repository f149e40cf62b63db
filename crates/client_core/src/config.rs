use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "controller.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub identity: String,
    pub organization_id: String,
    pub grace_window_ms: u64,
    pub debounce_ms: u64,
    pub command_ack_ms: u64,
    pub flush_settings_on_leave: bool,
    pub database_url: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            identity: "controller".into(),
            organization_id: "default".into(),
            grace_window_ms: 3000,
            debounce_ms: 300,
            command_ack_ms: 1500,
            flush_settings_on_leave: true,
            database_url: "sqlite://./data/workouts.db".into(),
        }
    }
}

impl ControllerSettings {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn command_ack(&self) -> Duration {
        Duration::from_millis(self.command_ack_ms)
    }
}

pub fn load_settings() -> ControllerSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file at `path` if readable, then environment
/// overrides looked up through `env`. Later sources win.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ControllerSettings {
    let mut settings = ControllerSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<ControllerSettings>(&raw) {
            Ok(file_cfg) => settings = file_cfg,
            Err(error) => warn!(
                path = %path.display(),
                %error,
                "ignoring unreadable controller settings file"
            ),
        }
    }

    if let Some(v) = lookup(&env, &["CONTROLLER_IDENTITY", "APP__IDENTITY"]) {
        settings.identity = v;
    }
    if let Some(v) = lookup(&env, &["CONTROLLER_ORGANIZATION", "APP__ORGANIZATION_ID"]) {
        settings.organization_id = v;
    }
    if let Some(v) = lookup(&env, &["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    override_millis(
        &env,
        &["CONTROLLER_GRACE_WINDOW_MS", "APP__GRACE_WINDOW_MS"],
        &mut settings.grace_window_ms,
    );
    override_millis(
        &env,
        &["CONTROLLER_DEBOUNCE_MS", "APP__DEBOUNCE_MS"],
        &mut settings.debounce_ms,
    );
    override_millis(
        &env,
        &["CONTROLLER_COMMAND_ACK_MS", "APP__COMMAND_ACK_MS"],
        &mut settings.command_ack_ms,
    );
    if let Some(v) = lookup(
        &env,
        &["CONTROLLER_FLUSH_ON_LEAVE", "APP__FLUSH_SETTINGS_ON_LEAVE"],
    ) {
        match v.parse::<bool>() {
            Ok(parsed) => settings.flush_settings_on_leave = parsed,
            Err(_) => warn!(value = %v, "ignoring non-boolean flush-on-leave override"),
        }
    }

    settings
}

fn lookup(env: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| env(key)).last()
}

fn override_millis(env: &impl Fn(&str) -> Option<String>, keys: &[&str], target: &mut u64) {
    let Some(raw) = lookup(env, keys) else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(key = keys[0], value = %raw, "ignoring non-numeric override"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
