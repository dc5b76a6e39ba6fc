use std::collections::HashMap;
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
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::notify::NotifierKind;

/// Upper bound for interval keys: one
/// week.
pub const MAX_INTERVAL_SECS: u64 =
  7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.tock".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "notifications".to_string(),
      "desktop".to_string()
    );
    map.insert(
      "reminder.interval".to_string(),
      "3600".to_string()
    );
    map.insert(
      "watch.refresh".to_string(),
      "1".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    tockrc_override
  ))]
  pub fn load(
    tockrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let tockrc = resolve_tockrc_path(
      tockrc_override
    )?;
    if let Some(path) = tockrc {
      info!(tockrc = %path.display(), "loading tockrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no tockrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Reads a whole number of seconds in
  /// `1..=MAX_INTERVAL_SECS`.
  pub fn get_seconds(
    &self,
    key: &str
  ) -> anyhow::Result<Option<Duration>>
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    let secs: u64 = raw
      .trim()
      .parse()
      .with_context(|| {
        format!(
          "invalid seconds for {key}: \
           {raw}"
        )
      })?;
    if secs == 0 {
      return Err(anyhow!(
        "{key} must be greater than \
         zero"
      ));
    }
    if secs > MAX_INTERVAL_SECS {
      return Err(anyhow!(
        "{key} must be at most \
         {MAX_INTERVAL_SECS} seconds"
      ));
    }
    Ok(Some(Duration::from_secs(secs)))
  }

  pub fn notifier_kind(
    &self
  ) -> anyhow::Result<NotifierKind> {
    self
      .get("notifications")
      .unwrap_or_else(|| {
        "desktop".to_string()
      })
      .parse()
  }

  pub fn reminder_interval(
    &self
  ) -> anyhow::Result<Duration> {
    Ok(
      self
        .get_seconds(
          "reminder.interval"
        )?
        .unwrap_or(Duration::from_secs(
          60 * 60
        ))
    )
  }

  pub fn watch_refresh(
    &self
  ) -> anyhow::Result<Duration> {
    Ok(
      self
        .get_seconds("watch.refresh")?
        .unwrap_or(Duration::from_secs(
          1
        ))
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
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
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
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

#[tracing::instrument(skip(
  override_path
))]
fn resolve_tockrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(tockrc_env) =
    std::env::var("TOCKRC")
  {
    if tockrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      tockrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping tockrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".tockrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tock"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
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

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    Config,
    MAX_INTERVAL_SECS
  };
  use crate::notify::NotifierKind;

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::default();
    assert_eq!(
      cfg.reminder_interval().expect("interval"),
      Duration::from_secs(3600)
    );
    assert_eq!(
      cfg.watch_refresh().expect("refresh"),
      Duration::from_secs(1)
    );
    assert_eq!(
      cfg.notifier_kind().expect("kind"),
      NotifierKind::Desktop
    );
    assert_eq!(cfg.get_bool("color"), Some(true));
  }

  #[test]
  fn file_with_include_and_comments() {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "notifications = terminal\n"
    )
    .expect("write include");
    let main = temp.path().join("tockrc");
    fs::write(
      &main,
      "# tock settings\n\
       reminder.interval = 600 # ten minutes\n\
       include extra.rc\n\
       color=off\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.reminder_interval().expect("interval"),
      Duration::from_secs(600)
    );
    assert_eq!(
      cfg.notifier_kind().expect("kind"),
      NotifierKind::Terminal
    );
    assert_eq!(cfg.get_bool("color"), Some(false));
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "rc.watch.refresh".to_string(),
      "5".to_string()
    )]);
    assert_eq!(
      cfg.watch_refresh().expect("refresh"),
      Duration::from_secs(5)
    );
  }

  #[test]
  fn rejects_bad_lines_and_values() {
    let temp = tempdir().expect("tempdir");
    let main = temp.path().join("tockrc");
    fs::write(&main, "not a setting\n")
      .expect("write rc");
    assert!(Config::load(Some(&main)).is_err());

    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "reminder.interval".to_string(),
      "0".to_string()
    )]);
    assert!(cfg.reminder_interval().is_err());

    cfg.apply_overrides([(
      "reminder.interval".to_string(),
      u64::MAX.to_string()
    )]);
    assert!(cfg.reminder_interval().is_err());

    cfg.apply_overrides([(
      "watch.refresh".to_string(),
      (MAX_INTERVAL_SECS + 1)
        .to_string()
    )]);
    assert!(cfg.watch_refresh().is_err());

    cfg.apply_overrides([(
      "watch.refresh".to_string(),
      MAX_INTERVAL_SECS.to_string()
    )]);
    assert_eq!(
      cfg
        .watch_refresh()
        .expect("week is allowed"),
      Duration::from_secs(
        MAX_INTERVAL_SECS
      )
    );
  }
}
