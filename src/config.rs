use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::constants;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub sort_order: Option<String>,
  pub max_results: Option<u32>,
  pub api_key: Option<String>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tubelearn") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tubelearn") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }

  /// Resolve the API key: CLI flag, then environment, then prefs.
  pub fn resolve_api_key(&self, cli: Option<&str>) -> Option<String> {
    let env = std::env::var(&constants().api_key_env).ok();
    pick_api_key(cli, env.as_deref(), self.api_key.as_deref())
  }

  pub fn max_results(&self, cli: Option<u32>) -> u32 {
    cli.or(self.max_results).filter(|n| *n > 0).unwrap_or(constants().default_max_results)
  }
}

fn pick_api_key(cli: Option<&str>, env: Option<&str>, prefs: Option<&str>) -> Option<String> {
  let key = [cli, env, prefs].into_iter().flatten().map(str::trim).find(|k| !k.is_empty()).map(str::to_string);
  if key.is_none() {
    warn!(var = %constants().api_key_env, "config: no YouTube API key configured");
  }
  key
}
