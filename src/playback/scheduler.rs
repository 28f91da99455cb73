use crossbeam_channel::{unbounded, Receiver, Sender};

use log::{debug, info, warn};

use uuid::Uuid;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crate::config::SessionConfig;
use crate::playback::loader::{self, LoadError};
use crate::playback::session::Session;
use crate::playback::spatial::{Location, RegionKey, SpatialWorld};
use crate::score::Score;

const SOURCE_EXTENSION: &'static str = "mid";

struct FinishedLoad {
  session_id: Uuid,
  result: Result<Arc<Score>, LoadError>,
}

/// Owns the active session set and drives it with one cooperative sweep
/// per external clock step. Loads run on background threads and hand
/// their finished scores back over a channel, so the sweep itself never
/// touches the filesystem.
pub struct SessionScheduler {
  base_dir: PathBuf,
  sessions: Vec<Session>,
  loads_tx: Sender<FinishedLoad>,
  loads_rx: Receiver<FinishedLoad>,
}

impl SessionScheduler {
  pub fn new<T>(base_dir: T) -> SessionScheduler
  where
    T: Into<PathBuf>,
  {
    let (loads_tx, loads_rx) = unbounded();
    SessionScheduler {
      base_dir: base_dir.into(),
      sessions: Vec::new(),
      loads_tx,
      loads_rx,
    }
  }

  /// Creates a session from a persisted configuration. Config problems are
  /// reported but never block creation: a session without a filename stays
  /// uninitialized, one without a world pauses on its first tick.
  pub fn create_from_config<T>(&mut self, name: T, config: SessionConfig) -> Uuid
  where
    T: Into<String>,
  {
    let name = name.into();
    for problem in config.validate(name.as_str()) {
      warn!("{}", problem);
    }
    let mut session = Session::new(name, config);
    if !session.config().filename.is_empty() {
      self.request_load(&mut session);
    }
    let id = session.id();
    info!("starting session: {}", session.name());
    self.sessions.push(session);
    id
  }

  /// Creates a session at an explicit location, the way an in-world
  /// command would; the session is named after its source file.
  pub fn create_at<T>(&mut self, location: &Location, speed: u64, volume: f32, filename: T) -> Uuid
  where
    T: Into<String>,
  {
    let filename = filename.into();
    let config = SessionConfig {
      world: location.world.clone(),
      x: location.x,
      y: location.y,
      z: location.z,
      speed,
      volume,
      filename: filename.clone(),
      looping: false,
    };
    self.create_from_config(filename, config)
  }

  /// Marks every live session with the given name as stopped; the next
  /// sweep removes them. Returns how many were stopped.
  pub fn stop_by_name(&mut self, name: &str) -> usize {
    let mut count = 0;
    for session in self.sessions.iter_mut() {
      if !session.is_stopped() && session.name() == name {
        session.stop();
        count += 1;
      }
    }
    count
  }

  pub fn sessions(&self) -> &[Session] {
    &self.sessions
  }

  /// One external clock step: apply finished loads, tick everything that
  /// is neither paused nor stopped, then sweep out the stopped sessions.
  /// Removal is deferred to the end so iteration never races additions
  /// made by session-creation requests between sweeps.
  pub fn sweep(&mut self, world: &dyn SpatialWorld) {
    self.apply_finished_loads();
    for session in self.sessions.iter_mut() {
      if session.is_stopped() || session.is_paused() {
        continue;
      }
      session.tick(world);
    }
    self.sessions.retain(|session| !session.is_stopped());
  }

  /// Resumes every paused session anchored in the region that just became
  /// active. Delivered between sweeps, so a freshly resumed session is
  /// never ticked twice within one external step.
  pub fn notify_region_active(&mut self, region: &RegionKey) {
    for session in self.sessions.iter_mut() {
      if session.is_paused() && session.region() == Some(region) {
        debug!("session {}: resumed by region activation", session.name());
        session.resume();
      }
    }
  }

  fn request_load(&self, session: &mut Session) {
    session.begin_load();
    let path = self.base_dir.join(format!(
      "{}.{}",
      session.config().filename,
      SOURCE_EXTENSION
    ));
    let session_id = session.id();
    let loads_tx = self.loads_tx.clone();
    thread::spawn(move || {
      let result = loader::load_score(path.as_path());
      // The scheduler may be gone by now; a closed channel just drops the
      // result.
      let _ = loads_tx.send(FinishedLoad { session_id, result });
    });
  }

  fn apply_finished_loads(&mut self) {
    while let Ok(finished) = self.loads_rx.try_recv() {
      let session = self
        .sessions
        .iter_mut()
        .find(|session| session.id() == finished.session_id);
      match session {
        Some(session) => session.finish_load(finished.result),
        None => debug!("discarding load result for a removed session"),
      }
    }
  }
}
