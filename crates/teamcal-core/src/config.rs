use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::store::DEFAULT_STORAGE_KEY;
use crate::team::{
  Team,
  TeamMember,
  default_members,
  default_slots
};
use crate::view::DEFAULT_PREVIEW_LIMIT;

const CONFIG_FILE_NAME: &str =
  "teamcal.toml";
const CONFIG_ENV_VAR: &str =
  "TEAMCAL_CONFIG";
const APP_DIR_NAME: &str = "teamcal";

/// Which submission form the calendar
/// offers.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarMode {
  /// Free-text owner, explicit start and
  /// end times.
  FreeForm,
  /// Team member owner, fixed time
  /// slots.
  #[default]
  Slots
}

impl CalendarMode {
  fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "free-form" | "freeform" => {
        Ok(Self::FreeForm)
      }
      | "slots" | "team" => {
        Ok(Self::Slots)
      }
      | other => {
        Err(anyhow!(
          "invalid mode `{other}`; \
           expected free-form|slots"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct StorageConfig {
  pub key:      String,
  pub data_dir: Option<String>
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      key:      DEFAULT_STORAGE_KEY
        .to_string(),
      data_dir: None
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct ViewConfig {
  pub preview_limit: usize
}

impl Default for ViewConfig {
  fn default() -> Self {
    Self {
      preview_limit:
        DEFAULT_PREVIEW_LIMIT
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct TeamConfig {
  pub members: Vec<TeamMember>,
  pub slots:   Vec<String>
}

impl Default for TeamConfig {
  fn default() -> Self {
    Self {
      members: default_members(),
      slots:   default_slots()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub mode:        CalendarMode,
  pub storage:     StorageConfig,
  pub view:        ViewConfig,
  pub team:        TeamConfig,
  #[serde(skip)]
  pub loaded_file: Option<PathBuf>
}

impl Config {
  /// Loads the config from
  /// `override_path`, then
  /// `$TEAMCAL_CONFIG`, then the user
  /// config directory. An explicitly
  /// named file must exist; the default
  /// location is optional.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let (path, explicit) =
      match resolve_config_path(
        override_path
      ) {
        | Some(found) => found,
        | None => {
          warn!(
            "no config directory; \
             using defaults"
          );
          return Ok(Self::default());
        }
      };

    if !explicit && !path.exists() {
      info!(file = %path.display(), "config file not found; using defaults");
      return Ok(Self::default());
    }

    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg =
      Self::from_toml_str(&raw)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    info!(file = %path.display(), mode = ?cfg.mode, "loaded config");
    cfg.loaded_file = Some(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg =
      toml::from_str::<Self>(raw)?;
    cfg.sanitize();
    Ok(cfg)
  }

  /// Applies `KEY=VALUE` overrides from
  /// the command line.
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
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      match key.trim() {
        | "mode" => {
          self.mode =
            CalendarMode::parse(&value)?;
        }
        | "storage.key" => {
          self.storage.key = value;
        }
        | "storage.data_dir" => {
          self.storage.data_dir =
            Some(value);
        }
        | "view.preview_limit" => {
          self.view.preview_limit = value
            .trim()
            .parse::<usize>()
            .with_context(|| {
              format!(
                "invalid \
                 view.preview_limit \
                 `{value}`"
              )
            })?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key \
             `{other}`"
          ));
        }
      }
    }
    self.sanitize();
    Ok(())
  }

  pub fn team(&self) -> Team {
    Team::new(
      self.team.members.clone(),
      self.team.slots.clone()
    )
  }

  fn sanitize(&mut self) {
    if self.storage.key.trim().is_empty()
    {
      warn!(
        "blank storage key; using \
         default"
      );
      self.storage.key =
        DEFAULT_STORAGE_KEY.to_string();
    }

    if self.view.preview_limit == 0 {
      self.view.preview_limit =
        DEFAULT_PREVIEW_LIMIT;
    }

    if self
      .storage
      .data_dir
      .as_deref()
      .is_some_and(|dir| {
        dir.trim().is_empty()
      })
    {
      self.storage.data_dir = None;
    }
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.storage.data_dir.as_deref()
  {
    expand_tilde(Path::new(cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<(PathBuf, bool)> {
  if let Some(path) = override_path {
    return Some((
      expand_tilde(path),
      true
    ));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some((
        expand_tilde(Path::new(
          trimmed
        )),
        true
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    (
      dir
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME),
      false
    )
  })
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let base = dirs::data_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine data \
         directory"
      )
    })?;
  Ok(base.join(APP_DIR_NAME))
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

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::{
    CalendarMode,
    Config,
    resolve_data_dir
  };
  use crate::store::DEFAULT_STORAGE_KEY;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = Config::from_toml_str("")
      .expect("parse empty config");
    assert_eq!(
      cfg.mode,
      CalendarMode::Slots
    );
    assert_eq!(
      cfg.storage.key,
      DEFAULT_STORAGE_KEY
    );
    assert_eq!(
      cfg.view.preview_limit,
      2
    );
    assert_eq!(
      cfg.team().members().len(),
      4
    );
  }

  #[test]
  fn parses_full_file_and_sanitizes() {
    let cfg = Config::from_toml_str(
      r##"
mode = "free-form"

[storage]
key = "  "
data_dir = ""

[view]
preview_limit = 0

[team]
slots = ["08:00-08:30", "bogus"]

[[team.members]]
id = "ops"
name = "Ops"
"##
    )
    .expect("parse config");

    assert_eq!(
      cfg.mode,
      CalendarMode::FreeForm
    );
    assert_eq!(
      cfg.storage.key,
      DEFAULT_STORAGE_KEY
    );
    assert_eq!(cfg.storage.data_dir, None);
    assert_eq!(
      cfg.view.preview_limit,
      2
    );

    let team = cfg.team();
    assert_eq!(
      team.slots(),
      &["08:00-08:30".to_string()]
    );
    assert_eq!(
      team
        .member("ops")
        .map(|m| m.color.as_str()),
      Some("#60a5fa")
    );
  }

  #[test]
  fn rejects_unknown_mode() {
    assert!(
      Config::from_toml_str(
        "mode = \"weekly\""
      )
      .is_err()
    );
  }

  #[test]
  fn overrides_apply_and_validate() {
    let mut cfg = Config::default();
    cfg
      .apply_overrides([
        (
          "mode".to_string(),
          "free-form".to_string()
        ),
        (
          "view.preview_limit".to_string(),
          "3".to_string()
        ),
        (
          "storage.key".to_string(),
          "cal_v2".to_string()
        )
      ])
      .expect("apply overrides");
    assert_eq!(
      cfg.mode,
      CalendarMode::FreeForm
    );
    assert_eq!(cfg.view.preview_limit, 3);
    assert_eq!(cfg.storage.key, "cal_v2");

    assert!(
      cfg
        .apply_overrides([(
          "color".to_string(),
          "on".to_string()
        )])
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides([(
          "view.preview_limit"
            .to_string(),
          "many".to_string()
        )])
        .is_err()
    );
  }

  #[test]
  fn explicit_missing_file_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let missing =
      temp.path().join("nope.toml");
    assert!(
      Config::load(Some(&missing))
        .is_err()
    );
  }

  #[test]
  fn loads_explicit_file_and_creates_data_dir()
  {
    let temp = tempdir().expect("tempdir");
    let path =
      temp.path().join("teamcal.toml");
    let data = temp.path().join("data");
    std::fs::write(
      &path,
      format!(
        "[storage]\ndata_dir = {:?}\n",
        data.display().to_string()
      )
    )
    .expect("write config");

    let cfg = Config::load(Some(&path))
      .expect("load config");
    assert_eq!(
      cfg.loaded_file.as_deref(),
      Some(path.as_path())
    );

    let resolved =
      resolve_data_dir(&cfg, None)
        .expect("resolve data dir");
    assert_eq!(resolved, data);
    assert!(resolved.is_dir());
  }
}
