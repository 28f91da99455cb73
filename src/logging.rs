use failure::{Error, Fail};

const BLIPBOX_LOG_CONFIG: &'static str = "BLIPBOX_LOG_CONFIG";
const DEFAULT_BLIPBOX_LOG_CONFIG: &'static str = "log4rs.yaml";

#[derive(Debug, Fail)]
enum LoggingError {
  #[fail(display = "Failed to init logging: {}", cause)]
  Init { cause: String },
}

/// Initialises log4rs from the file named by `BLIPBOX_LOG_CONFIG`, falling
/// back to `log4rs.yaml` in the working directory.
pub fn init() -> Result<(), Error> {
  let log_config_path =
    std::env::var(BLIPBOX_LOG_CONFIG).unwrap_or_else(|_| DEFAULT_BLIPBOX_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    LoggingError::Init {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}
