use std::sync::Arc;

use log::warn;

use uuid::Uuid;

use crate::config::SessionConfig;
use crate::midi::Tick;
use crate::playback::loader::LoadError;
use crate::playback::spatial::{Anchor, Location, RegionKey, SpatialWorld};
use crate::score::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
  /// Config present, no score attached and no load requested.
  Uninitialized,
  /// An asynchronous load is in flight.
  Loading,
  /// Not advancing; waits for a matching region activation.
  Paused,
  Playing,
  /// Terminal. The scheduler removes stopped sessions from its set.
  Stopped,
}

/// One independent playback instance of a score, anchored to a spatial
/// location. The persisted configuration is joined with runtime state
/// (score, cursor, virtual clock) exactly once, at load completion.
pub struct Session {
  id: Uuid,
  name: String,
  config: SessionConfig,
  score: Option<Arc<Score>>,
  cursor: usize,
  virtual_tick: Tick,
  state: PlaybackState,
  anchor: Option<Anchor>,
  region: Option<RegionKey>,
}

impl Session {
  pub fn new<T>(name: T, config: SessionConfig) -> Session
  where
    T: Into<String>,
  {
    let anchor = if config.world.is_empty() {
      None
    } else {
      Some(Anchor {
        world: config.world.clone(),
        x: config.x,
        y: config.y,
        z: config.z,
      })
    };
    let region = anchor.as_ref().map(Anchor::region);
    Session {
      id: Uuid::new_v4(),
      name: name.into(),
      config,
      score: None,
      cursor: 0,
      virtual_tick: 0,
      state: PlaybackState::Uninitialized,
      anchor,
      region,
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn state(&self) -> PlaybackState {
    self.state
  }

  pub fn region(&self) -> Option<&RegionKey> {
    self.region.as_ref()
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn virtual_tick(&self) -> Tick {
    self.virtual_tick
  }

  pub fn is_paused(&self) -> bool {
    self.state == PlaybackState::Paused
  }

  pub fn is_stopped(&self) -> bool {
    self.state == PlaybackState::Stopped
  }

  pub fn begin_load(&mut self) {
    if self.state == PlaybackState::Uninitialized {
      self.state = PlaybackState::Loading;
    }
  }

  /// Applies the outcome of an asynchronous load. The score is attached
  /// atomically; a result arriving after the session left the Loading
  /// state (stopped, or a duplicate completion) is discarded.
  pub fn finish_load(&mut self, result: Result<Arc<Score>, LoadError>) {
    if self.state != PlaybackState::Loading {
      return;
    }
    match result {
      Ok(score) => {
        self.score = Some(score);
        self.rewind();
        // An unresolvable anchor self-heals into Paused on the first tick.
        self.state = PlaybackState::Playing;
      }
      Err(err) => {
        warn!("session {}: load failed: {}", self.name, err);
        self.state = PlaybackState::Stopped;
      }
    }
  }

  pub fn pause(&mut self) {
    if self.state == PlaybackState::Playing {
      self.state = PlaybackState::Paused;
    }
  }

  pub fn resume(&mut self) {
    if self.state == PlaybackState::Paused {
      self.state = PlaybackState::Playing;
    }
  }

  pub fn stop(&mut self) {
    self.state = PlaybackState::Stopped;
  }

  fn rewind(&mut self) {
    self.cursor = 0;
    self.virtual_tick = match &self.score {
      Some(score) => score.first_tick().unwrap_or(0),
      None => 0,
    };
  }

  /// Advances the virtual clock by `speed` and fires every Blip that has
  /// become due, in score order. Resolution failure pauses the session
  /// without consuming the due Blip; accumulated virtual ticks are kept.
  pub fn tick(&mut self, world: &dyn SpatialWorld) {
    if self.state != PlaybackState::Playing {
      return;
    }
    let score = match &self.score {
      Some(score) => score.clone(),
      None => {
        self.state = PlaybackState::Paused;
        return;
      }
    };
    if score.is_empty() {
      return;
    }

    self.virtual_tick += self.config.speed;

    debug_assert!(self.cursor <= score.len(), "cursor out of range");
    if self.cursor > score.len() {
      self.cursor = score.len();
    }

    // The anchor is resolved at most once per call; every due Blip within
    // one external step plays from the same location.
    let mut location: Option<Location> = None;
    while let Some(blip) = score.get(self.cursor) {
      if blip.tick > self.virtual_tick {
        break;
      }
      if location.is_none() {
        match self.resolve(world) {
          Some(resolved) => location = Some(resolved),
          None => {
            self.state = PlaybackState::Paused;
            return;
          }
        }
      }
      if let Some(location) = &location {
        world.emit_trigger(location, blip.sound, self.config.volume, blip.pitch);
      }
      self.cursor += 1;
    }

    if self.cursor >= score.len() {
      if self.config.looping {
        self.rewind();
      } else {
        self.state = PlaybackState::Stopped;
      }
    }
  }

  fn resolve(&self, world: &dyn SpatialWorld) -> Option<Location> {
    let anchor = self.anchor.as_ref()?;
    let region = self.region.as_ref()?;
    if !world.is_region_active(region) {
      return None;
    }
    world.resolve_location(anchor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::score::{Blip, SoundCategory};
  use std::cell::RefCell;
  use std::collections::HashSet;

  #[derive(Default)]
  struct FakeWorld {
    inactive: RefCell<HashSet<RegionKey>>,
    triggers: RefCell<Vec<(SoundCategory, f32, f32)>>,
  }

  impl FakeWorld {
    fn deactivate(&self, region: RegionKey) {
      self.inactive.borrow_mut().insert(region);
    }

    fn activate(&self, region: &RegionKey) {
      self.inactive.borrow_mut().remove(region);
    }

    fn trigger_count(&self) -> usize {
      self.triggers.borrow().len()
    }
  }

  impl SpatialWorld for FakeWorld {
    fn is_region_active(&self, region: &RegionKey) -> bool {
      !self.inactive.borrow().contains(region)
    }

    fn resolve_location(&self, anchor: &Anchor) -> Option<Location> {
      if self.is_region_active(&anchor.region()) {
        Some(Location {
          world: anchor.world.clone(),
          x: anchor.x,
          y: anchor.y,
          z: anchor.z,
        })
      } else {
        None
      }
    }

    fn emit_trigger(&self, _location: &Location, sound: SoundCategory, volume: f32, pitch: f32) {
      self.triggers.borrow_mut().push((sound, volume, pitch));
    }
  }

  fn score_of(ticks: &[Tick]) -> Arc<Score> {
    let blips = ticks
      .iter()
      .map(|&tick| Blip {
        tick,
        sound: SoundCategory::Harp,
        pitch: 1.0,
      })
      .collect();
    Arc::new(Score::merge(vec![blips]))
  }

  fn session_with(ticks: &[Tick], speed: u64, looping: bool) -> Session {
    let mut config = SessionConfig::default();
    config.world = "overworld".to_string();
    config.filename = "song".to_string();
    config.speed = speed;
    config.looping = looping;
    let mut session = Session::new("song", config);
    session.begin_load();
    session.finish_load(Ok(score_of(ticks)));
    session
  }

  #[test]
  fn load_success_starts_playing_at_first_blip() {
    let session = session_with(&[5, 9], 20, false);
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.cursor(), 0);
    assert_eq!(session.virtual_tick(), 5);
  }

  #[test]
  fn load_failure_stops_the_session() {
    let mut session = Session::new("song", SessionConfig::default());
    session.begin_load();
    session.finish_load(Err(LoadError::MissingResource {
      path: "song.mid".into(),
      cause: "gone".to_string(),
    }));
    assert_eq!(session.state(), PlaybackState::Stopped);
  }

  #[test]
  fn late_load_result_after_stop_is_discarded() {
    let mut session = Session::new("song", SessionConfig::default());
    session.begin_load();
    session.stop();
    session.finish_load(Ok(score_of(&[0])));
    assert_eq!(session.state(), PlaybackState::Stopped);
    let world = FakeWorld::default();
    session.tick(&world);
    assert_eq!(world.trigger_count(), 0);
  }

  #[test]
  fn due_blips_fire_per_external_step() {
    let world = FakeWorld::default();
    let mut session = session_with(&[0, 25], 20, false);

    session.tick(&world); // virtual tick 20: only the first blip is due
    assert_eq!(world.trigger_count(), 1);
    assert_eq!(session.cursor(), 1);

    session.tick(&world); // virtual tick 40: second blip fires
    assert_eq!(world.trigger_count(), 2);
    assert_eq!(session.state(), PlaybackState::Stopped);

    session.tick(&world); // terminal, nothing more
    assert_eq!(world.trigger_count(), 2);
  }

  #[test]
  fn equal_tick_blips_fire_in_score_order_within_one_step() {
    let world = FakeWorld::default();
    let blips = vec![
      Blip {
        tick: 0,
        sound: SoundCategory::Bass,
        pitch: 0.5,
      },
      Blip {
        tick: 0,
        sound: SoundCategory::Snare,
        pitch: 2.0,
      },
    ];
    let mut config = SessionConfig::default();
    config.world = "overworld".to_string();
    config.filename = "song".to_string();
    let mut session = Session::new("song", config);
    session.begin_load();
    session.finish_load(Ok(Arc::new(Score::merge(vec![blips]))));

    session.tick(&world);
    let triggers = world.triggers.borrow();
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].0, SoundCategory::Bass);
    assert_eq!(triggers[1].0, SoundCategory::Snare);
  }

  #[test]
  fn looping_replays_and_resets_to_post_load_state() {
    let world = FakeWorld::default();
    let mut session = session_with(&[0, 10], 10, true);
    let cycles = 3;
    for _ in 0..cycles {
      // Both blips are due after one step; the wrap happens in the same
      // call and restores the post-load cursor and clock.
      session.tick(&world);
      assert_eq!(session.state(), PlaybackState::Playing);
      assert_eq!(session.cursor(), 0);
      assert_eq!(session.virtual_tick(), 0);
    }
    assert_eq!(world.trigger_count(), cycles * 2);
  }

  #[test]
  fn pause_and_resume_leave_cursor_and_clock_unchanged() {
    let world = FakeWorld::default();
    let mut session = session_with(&[0, 25], 20, false);
    session.tick(&world);
    let cursor = session.cursor();
    let virtual_tick = session.virtual_tick();

    session.pause();
    assert_eq!(session.state(), PlaybackState::Paused);
    session.tick(&world); // no-op while paused
    session.resume();

    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.cursor(), cursor);
    assert_eq!(session.virtual_tick(), virtual_tick);
  }

  #[test]
  fn unresolvable_region_pauses_without_consuming_the_due_blip() {
    let world = FakeWorld::default();
    let mut session = session_with(&[0], 20, false);
    let region = session.region().unwrap().clone();
    world.deactivate(region.clone());

    session.tick(&world);
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.cursor(), 0);
    assert_eq!(session.virtual_tick(), 20);
    assert_eq!(world.trigger_count(), 0);

    world.activate(&region);
    session.resume();
    session.tick(&world);
    assert_eq!(world.trigger_count(), 1);
    assert_eq!(session.state(), PlaybackState::Stopped);
  }

  #[test]
  fn empty_score_is_a_permanent_noop() {
    let world = FakeWorld::default();
    let mut session = session_with(&[], 20, false);
    for _ in 0..10 {
      session.tick(&world);
    }
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.virtual_tick(), 0);
    assert_eq!(world.trigger_count(), 0);
  }

  #[test]
  fn anchorless_session_pauses_on_first_tick() {
    let world = FakeWorld::default();
    let mut config = SessionConfig::default();
    config.filename = "song".to_string(); // no world
    let mut session = Session::new("song", config);
    session.begin_load();
    session.finish_load(Ok(score_of(&[0])));

    session.tick(&world);
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.region(), None);
    assert_eq!(world.trigger_count(), 0);
  }
}
