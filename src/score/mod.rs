pub mod compiler;

pub use self::compiler::Compiler;

use crate::midi::{Decoder, ParseError, Tick};

/// The fixed set of discrete timbres a note can be quantized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCategory {
  Bass,
  Guitar,
  Pling,
  Harp,
  Flute,
  Bell,
  Chime,
  Basedrum,
  Hat,
  Snare,
  Xylophone,
}

/// One discretized trigger: absolute tick, sound category, pitch multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blip {
  pub tick: Tick,
  pub sound: SoundCategory,
  pub pitch: f32,
}

/// The fully merged, ascending-by-tick Blip sequence compiled from one
/// source file. Built once, then shared read-only between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
  blips: Vec<Blip>,
}

impl Score {
  /// Runs the whole pure pipeline: container decoding, per-track Blip
  /// compilation and the final merge.
  pub fn compile(data: &[u8]) -> Result<Score, ParseError> {
    let tracks = Decoder::new(data).decode()?;
    let mut compiler = Compiler::new();
    let blip_tracks = tracks
      .iter()
      .map(|events| compiler.compile_track(events))
      .collect();
    Ok(Score::merge(blip_tracks))
  }

  /// Concatenates all tracks in iteration order and stable-sorts by tick,
  /// so equal-tick Blips keep their track-then-event emission order.
  pub fn merge(tracks: Vec<Vec<Blip>>) -> Score {
    let mut blips: Vec<Blip> = tracks.into_iter().flatten().collect();
    blips.sort_by_key(|blip| blip.tick);
    Score { blips }
  }

  pub fn get(&self, index: usize) -> Option<&Blip> {
    self.blips.get(index)
  }

  pub fn first_tick(&self) -> Option<Tick> {
    self.blips.first().map(|blip| blip.tick)
  }

  pub fn blips(&self) -> &[Blip] {
    &self.blips
  }

  pub fn len(&self) -> usize {
    self.blips.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blips.is_empty()
  }
}
