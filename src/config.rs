use failure::{Error, Fail};

use serde_derive::{Deserialize, Serialize};

use std::fs::File;
use std::io::{Read, Write};

const DEFAULT_SPEED: u64 = 20;
const DEFAULT_VOLUME: f32 = 1.0;

#[derive(Debug, Fail, PartialEq)]
pub enum ConfigError {
  #[fail(display = "session {}: missing source filename", name)]
  MissingFilename { name: String },

  #[fail(display = "session {}: missing anchor world", name)]
  MissingWorld { name: String },

  #[fail(display = "session {}: speed must be a positive number of ticks", name)]
  ZeroSpeed { name: String },
}

/// The persisted half of a playback session: where it is anchored, how fast
/// it advances, and which source file it replays. Everything derived at
/// runtime (score, cursor, state) lives in `playback::Session`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
  pub world: String,
  pub x: f64,
  pub y: f64,
  pub z: f64,
  pub speed: u64,
  pub volume: f32,
  pub filename: String,
  #[serde(rename = "loop")]
  pub looping: bool,
}

impl Default for SessionConfig {
  fn default() -> SessionConfig {
    SessionConfig {
      world: String::new(),
      x: 0.0,
      y: 0.0,
      z: 0.0,
      speed: DEFAULT_SPEED,
      volume: DEFAULT_VOLUME,
      filename: String::new(),
      looping: false,
    }
  }
}

impl SessionConfig {
  pub fn from_file<'a, T>(path: T) -> Result<SessionConfig, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let mut file = File::open(path.into())?;
    file.read_to_string(&mut content)?;
    SessionConfig::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> Result<SessionConfig, Error>
  where
    T: Into<&'a str>,
  {
    let config: SessionConfig = toml::from_str(content.into())?;
    Ok(config)
  }

  pub fn to_file<'a, T>(&self, path: T) -> Result<(), Error>
  where
    T: Into<&'a str>,
  {
    let content = toml::to_string(self)?;
    let mut file = File::create(path.into())?;
    file.write_all(content.as_bytes())?;
    Ok(())
  }

  /// Reports every problem that would keep the session from ever playing.
  /// None of them blocks session creation; an anchorless session simply
  /// stays paused and a filename-less one never starts loading.
  pub fn validate(&self, name: &str) -> Vec<ConfigError> {
    let mut problems = Vec::new();
    if self.filename.is_empty() {
      problems.push(ConfigError::MissingFilename {
        name: name.to_string(),
      });
    }
    if self.world.is_empty() {
      problems.push(ConfigError::MissingWorld {
        name: name.to_string(),
      });
    }
    if self.speed == 0 {
      problems.push(ConfigError::ZeroSpeed {
        name: name.to_string(),
      });
    }
    problems
  }
}
