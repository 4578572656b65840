//! Layered server settings.
//!
//! Values are resolved once at start-up, later tiers winning:
//!
//! 1. built-in defaults,
//! 2. the `[default]` table of the settings file,
//! 3. the table named after the selected environment (`[production]`, ...),
//! 4. process variables prefixed `HISTORY_` (`HISTORY_PORT=9000`).

use std::path::{Path, PathBuf};

use config::{
  Config, ConfigBuilder, ConfigError, Environment, File, Map, Source,
  builder::DefaultState,
};
use history_store_sqlite::StoreConfig;
use serde::Deserialize;

/// Runtime server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub host:            String,
  pub port:            u16,
  /// Port of the separate Prometheus listener on the same host.
  pub metrics_port:    u16,
  pub store_path:      PathBuf,
  pub busy_timeout_ms: u64,
}

impl Settings {
  /// Load from a TOML file (missing is fine) and the process environment.
  pub fn load(path: &Path, environment: &str) -> Result<Self, ConfigError> {
    Self::from_sources(
      File::from(path.to_path_buf()).required(false),
      environment,
      None,
    )
  }

  /// Resolve from an explicit file source. `vars` replaces the process
  /// environment when set.
  pub fn from_sources<F>(
    file: F,
    environment: &str,
    vars: Option<Map<String, String>>,
  ) -> Result<Self, ConfigError>
  where
    F: Source + Send + Sync + 'static,
  {
    let file = Config::builder().add_source(file).build()?;

    let mut builder = defaults()?;
    // Section tables enter as defaults so the environment tier still
    // outranks them.
    for section in ["default", environment] {
      if let Ok(table) = file.get_table(section) {
        for (key, value) in table {
          builder = builder.set_default(key, value)?;
        }
      }
    }

    builder
      .add_source(
        Environment::with_prefix("HISTORY")
          .try_parsing(true)
          .source(vars),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn metrics_address(&self) -> String {
    format!("{}:{}", self.host, self.metrics_port)
  }

  pub fn store_config(&self) -> StoreConfig {
    StoreConfig {
      path:         expand_tilde(&self.store_path),
      busy_timeout: std::time::Duration::from_millis(self.busy_timeout_ms),
    }
  }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
  Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("metrics_port", 5001)?
    .set_default("store_path", "history.db")?
    .set_default("busy_timeout_ms", 5000)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  const FILE: &str = r#"
[default]
host = "0.0.0.0"
port = 8000
store_path = "/var/lib/history/history.db"

[production]
port = 80
busy_timeout_ms = 20000
"#;

  fn resolve(environment: &str, vars: &[(&str, &str)]) -> Settings {
    let vars = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    Settings::from_sources(
      File::from_str(FILE, FileFormat::Toml),
      environment,
      Some(vars),
    )
    .unwrap()
  }

  #[test]
  fn default_table_over_builtins() {
    let s = resolve("development", &[]);
    assert_eq!(s.host, "0.0.0.0");
    assert_eq!(s.port, 8000);
    assert_eq!(s.busy_timeout_ms, 5000);
    assert_eq!(s.address(), "0.0.0.0:8000");
    assert_eq!(s.metrics_address(), "0.0.0.0:5001");
  }

  #[test]
  fn environment_table_over_default_table() {
    let s = resolve("production", &[]);
    assert_eq!(s.port, 80);
    assert_eq!(s.busy_timeout_ms, 20000);
    assert_eq!(s.store_path, PathBuf::from("/var/lib/history/history.db"));
  }

  #[test]
  fn process_variables_win() {
    let s = resolve("production", &[
      ("HISTORY_PORT", "9000"),
      ("HISTORY_METRICS_PORT", "9100"),
      ("HISTORY_STORE_PATH", "/tmp/h.db"),
    ]);
    assert_eq!(s.port, 9000);
    assert_eq!(s.metrics_port, 9100);
    assert_eq!(s.store_path, PathBuf::from("/tmp/h.db"));
    assert_eq!(s.store_config().busy_timeout.as_millis(), 20000);
  }

  #[test]
  fn missing_file_uses_builtins() {
    let s = Settings::from_sources(
      File::from(PathBuf::from("/nonexistent/history.toml")).required(false),
      "production",
      Some(Map::new()),
    )
    .unwrap();
    assert_eq!(s.host, "127.0.0.1");
    assert_eq!(s.port, 8080);
  }
}
