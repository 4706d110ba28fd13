//! Configuration – reads/writes `~/.dsd/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use dsd_kernel::{ProfileResolver, Thresholds, Timing};
use dsd_runtime::SessionSettings;
use dsd_types::{DsdError, VehicleId};
use serde::{Deserialize, Serialize};

/// Persisted watchdog configuration stored in `~/.dsd/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How often the host is sampled, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Time allowed to depress the pedal once the alert sounds.
    #[serde(default = "default_ack_window_secs")]
    pub ack_window_secs: u32,

    /// Time the pedal may be held without any control activity.
    #[serde(default = "default_confirm_window_secs")]
    pub confirm_window_secs: u32,

    /// Reverser magnitudes below this count as neutral.
    #[serde(default = "default_neutral_band")]
    pub neutral_band: f32,

    /// Smallest control movement that counts as driver activity.
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f32,

    /// `"Vendor.Name" = "profile"` entries layered over the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vehicles: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_ack_window_secs() -> u32 {
    6
}
fn default_confirm_window_secs() -> u32 {
    60
}
fn default_neutral_band() -> f32 {
    0.5
}
fn default_movement_threshold() -> f32 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ack_window_secs: default_ack_window_secs(),
            confirm_window_secs: default_confirm_window_secs(),
            neutral_band: default_neutral_band(),
            movement_threshold: default_movement_threshold(),
            vehicles: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: self.poll_interval(),
            timing: Timing::new(
                TimeDelta::seconds(i64::from(self.ack_window_secs)),
                TimeDelta::seconds(i64::from(self.confirm_window_secs)),
            ),
            thresholds: Thresholds {
                neutral_band: self.neutral_band,
                movement: self.movement_threshold,
            },
        }
    }

    /// The built-in resolver with the `[vehicles]` table applied.
    pub fn resolver(&self) -> Result<ProfileResolver, DsdError> {
        let overrides = self
            .vehicles
            .iter()
            .map(|(key, profile)| {
                VehicleId::parse(key)
                    .map(|vehicle| (vehicle, profile.as_str()))
                    .ok_or_else(|| {
                        DsdError::Config(format!("vehicle key '{key}' is not Vendor.Name"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ProfileResolver::builtin().with_overrides(overrides)
    }
}

/// Return the path to `~/.dsd/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".dsd").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, DsdError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, DsdError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        DsdError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| DsdError::Config(format!("failed to parse: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `DSD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DSD_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `DSD_ACK_WINDOW_SECS` | `ack_window_secs` |
/// | `DSD_CONFIRM_WINDOW_SECS` | `confirm_window_secs` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DSD_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("DSD_ACK_WINDOW_SECS")
        && let Ok(secs) = v.parse::<u32>()
    {
        cfg.ack_window_secs = secs;
    }
    if let Ok(v) = std::env::var("DSD_CONFIRM_WINDOW_SECS")
        && let Ok(secs) = v.parse::<u32>()
    {
        cfg.confirm_window_secs = secs;
    }
}

/// Save the config to disk, creating `~/.dsd/` if necessary.
pub fn save(cfg: &Config) -> Result<(), DsdError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), DsdError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DsdError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                DsdError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| DsdError::Config(format!("failed to serialize: {e}")))?;
    let write_err = |e: std::io::Error| {
        DsdError::Config(format!("failed to write {}: {e}", path.display()))
    };
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_the_standard_device() {
        let settings = Config::default().settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert_eq!(settings.timing, Timing::default());
        assert_eq!(settings.thresholds, Thresholds::default());
    }

    #[test]
    fn config_path_points_to_dsd_dir() {
        let p = config_path_for_home("/home/driver");
        assert_eq!(p, PathBuf::from("/home/driver/.dsd/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "neutral_band = 0.25\n");
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.neutral_band, 0.25);
        assert_eq!(cfg.movement_threshold, 0.1);
        assert!(cfg.vehicles.is_empty());
        assert_eq!(cfg.settings().thresholds.neutral_band, 0.25);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "poll_interval_ms = \"fast\"\n");
        assert!(matches!(load_from(&path), Err(DsdError::Config(_))));
    }

    #[test]
    fn roundtrip_with_vehicle_overrides() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.vehicles
            .insert("DTG.Class 55".to_string(), "class_40".to_string());
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.vehicles, cfg.vehicles);
    }

    #[test]
    fn vehicle_overrides_feed_the_resolver() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            "[vehicles]\n\"DTG.Class 55\" = \"class_40\"\n\"RSC.GEML\" = \"generic\"\n",
        );
        let resolver = load_from(&path).unwrap().unwrap().resolver().unwrap();
        assert_eq!(resolver.resolve(&VehicleId::new("DTG", "Class 55")).name(), "class_40");
        assert_eq!(resolver.resolve(&VehicleId::new("RSC", "GEML")).name(), "generic");
    }

    #[test]
    fn bad_vehicle_entries_are_rejected() {
        let mut cfg = Config::default();
        cfg.vehicles.insert("NoDot".into(), "generic".into());
        assert!(matches!(cfg.resolver(), Err(DsdError::Config(_))));

        let mut cfg = Config::default();
        cfg.vehicles.insert("RSC.GEML".into(), "class_999".into());
        assert!(matches!(cfg.resolver(), Err(DsdError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn env_overrides_poll_interval() {
        // SAFETY: each env test uses its own variable.
        unsafe { std::env::set_var("DSD_POLL_INTERVAL_MS", "250") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.poll_interval_ms, 250);
        unsafe { std::env::remove_var("DSD_POLL_INTERVAL_MS") };
    }

    #[test]
    fn env_overrides_ack_window() {
        // SAFETY: each env test uses its own variable.
        unsafe { std::env::set_var("DSD_ACK_WINDOW_SECS", "4") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ack_window_secs, 4);
        unsafe { std::env::remove_var("DSD_ACK_WINDOW_SECS") };
    }

    #[test]
    fn env_override_ignores_garbage() {
        // SAFETY: each env test uses its own variable.
        unsafe { std::env::set_var("DSD_CONFIRM_WINDOW_SECS", "a minute") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.confirm_window_secs, 60);
        unsafe { std::env::remove_var("DSD_CONFIRM_WINDOW_SECS") };
    }
}
