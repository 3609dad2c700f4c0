use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::query::DEFAULT_PAGE_SIZE;

const CONFIG_ENV_VAR: &str =
  "TASKBOARD_CONFIG";
const API_URL_ENV_VAR: &str =
  "TASKBOARD_API_URL";
const USER_ENV_VAR: &str =
  "TASKBOARD_USER";
const COOKIE_ENV_VAR: &str =
  "TASKBOARD_COOKIE";

const DEFAULT_BASE_URL: &str =
  "http://localhost:3000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(
  Debug, Clone, Deserialize, PartialEq,
)]
#[serde(default)]
pub struct ApiSection {
  pub base_url:     String,
  pub timeout_secs: u64
}

impl Default for ApiSection {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL
        .to_string(),
      timeout_secs: DEFAULT_TIMEOUT_SECS
    }
  }
}

#[derive(
  Debug,
  Clone,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(default)]
pub struct SessionSection {
  pub user_id: Option<String>,
  pub cookie:  Option<String>
}

#[derive(
  Debug, Clone, Deserialize, PartialEq,
)]
#[serde(default)]
pub struct ViewSection {
  pub page_size: usize,
  pub color:     bool
}

impl Default for ViewSection {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
      color:     true
    }
  }
}

#[derive(
  Debug,
  Clone,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(default)]
pub struct Config {
  pub api:          ApiSection,
  pub session:      SessionSection,
  pub view:         ViewSection,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    );

    let mut cfg = match path {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)?
      }
      | None => {
        warn!(
          "no config file found; \
           using defaults"
        );
        Self::default()
      }
    };

    cfg.apply_env(|key| {
      std::env::var(key).ok()
    });
    Ok(cfg)
  }

  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "failed to parse TOML {}",
            path.display()
          )
        })?;
    cfg
      .loaded_files
      .push(path.to_path_buf());
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let cfg =
      toml::from_str::<Self>(text)
        .map_err(anyhow::Error::new)?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Environment values sit between
  /// the file and `--rc` overrides.
  pub fn apply_env<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    if let Some(url) =
      lookup(API_URL_ENV_VAR)
    {
      debug!(var = API_URL_ENV_VAR, "base URL from environment");
      self.api.base_url = url;
    }
    if let Some(user) =
      lookup(USER_ENV_VAR)
    {
      debug!(var = USER_ENV_VAR, "user id from environment");
      self.session.user_id = Some(user);
    }
    if let Some(cookie) =
      lookup(COOKIE_ENV_VAR)
    {
      debug!(var = COOKIE_ENV_VAR, "session cookie from environment");
      self.session.cookie = Some(cookie);
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      // Cookie values are secrets.
      if key == "session.cookie" {
        debug!(key = %key, "applying override");
      } else {
        debug!(key = %key, value = %v, "applying override");
      }
      self.set(&key, &v)?;
    }
    self.validate()
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let value = value.trim();
    match key {
      | "api.base_url" => {
        self.api.base_url =
          value.to_string();
      }
      | "api.timeout_secs" => {
        self.api.timeout_secs = value
          .parse::<u64>()
          .with_context(|| {
            format!(
              "invalid \
               api.timeout_secs: \
               {value}"
            )
          })?;
      }
      | "session.user_id" => {
        self.session.user_id =
          Some(value.to_string());
      }
      | "session.cookie" => {
        self.session.cookie =
          Some(value.to_string());
      }
      | "view.page_size" => {
        self.view.page_size = value
          .parse::<usize>()
          .with_context(|| {
            format!(
              "invalid view.page_size: \
               {value}"
            )
          })?;
      }
      | "view.color" => {
        self.view.color =
          parse_bool(value).ok_or_else(
            || {
              anyhow!(
                "invalid view.color: \
                 {value}"
              )
            }
          )?;
      }
      | other => {
        return Err(anyhow!(
          "unknown config key: {other}"
        ));
      }
    }
    Ok(())
  }

  fn validate(
    &self
  ) -> anyhow::Result<()> {
    if self.api.base_url.trim().is_empty()
    {
      return Err(anyhow!(
        "api.base_url cannot be empty"
      ));
    }
    if self.view.page_size == 0 {
      return Err(anyhow!(
        "view.page_size must be at \
         least 1"
      ));
    }
    if self.api.timeout_secs == 0 {
      return Err(anyhow!(
        "api.timeout_secs must be at \
         least 1"
      ));
    }
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(
      self.api.timeout_secs
    )
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  let candidate = dirs::config_dir()?
    .join("taskboard")
    .join("config.toml");
  if candidate.exists() {
    return Some(candidate);
  }

  None
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
