use failure::Fail;

use log::debug;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::midi::ParseError;
use crate::score::Score;

#[derive(Debug, Fail)]
pub enum LoadError {
  #[fail(display = "unable to read {:?}: {}", path, cause)]
  MissingResource { path: PathBuf, cause: String },

  #[fail(display = "unable to parse {:?}: {}", path, cause)]
  Parse { path: PathBuf, cause: ParseError },
}

/// Reads the source file exactly once and runs the pure pipeline on it:
/// container decoding, Blip compilation, track merge. Meant to run off the
/// tick path; the resulting score is shared read-only.
pub fn load_score(path: &Path) -> Result<Arc<Score>, LoadError> {
  let data = fs::read(path).map_err(|err| LoadError::MissingResource {
    path: path.to_path_buf(),
    cause: err.to_string(),
  })?;
  let score = Score::compile(&data).map_err(|cause| LoadError::Parse {
    path: path.to_path_buf(),
    cause,
  })?;
  debug!("loaded {:?}: {} blips", path, score.len());
  Ok(Arc::new(score))
}
