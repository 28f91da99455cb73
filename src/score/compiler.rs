use crate::midi::types::U7;
use crate::midi::{RawEvent, RawKind};
use crate::score::{Blip, SoundCategory};

const NUM_CHANNELS: usize = 16;
const PROGRAMS_PER_FAMILY: U7 = 8;

/// Pitch multipliers for the two canonical octave bands, indexed by octave
/// parity and then pitch class (C through B). Every value lies in
/// [0.5, 2.0]; F# is the low endpoint of each band.
const PITCH_FACTORS: [[f32; 12]; 2] = [
  [
    0.707107, 0.749154, 0.793701, 0.840896, 0.890899, 0.943874, 0.5, 0.529732, 0.561231, 0.594604,
    0.629961, 0.667420,
  ],
  [
    1.414214, 1.498307, 1.587401, 1.681793, 1.781797, 1.887749, 1.0, 1.059463, 1.122462, 1.189207,
    1.259921, 1.334840,
  ],
];

/// Folds the true octave by parity into one of the two table bands.
/// Octave -1 (keys 0 to 11) folds below the table and yields nothing;
/// such notes are dropped silently.
fn pitch_factor(key: U7) -> Option<f32> {
  let octave = i32::from(key / 12) - 1;
  if octave < 0 {
    return None;
  }
  let band = (octave % 2) as usize;
  Some(PITCH_FACTORS[band][usize::from(key % 12)])
}

fn piano_sound_of(octave: i32) -> SoundCategory {
  match octave {
    0 | 1 => SoundCategory::Bass,
    2 | 3 => SoundCategory::Guitar,
    4 | 5 => SoundCategory::Pling,
    _ => SoundCategory::Harp,
  }
}

fn flute_sound_of(octave: i32) -> SoundCategory {
  match octave {
    0 | 1 => SoundCategory::Flute,
    2 | 3 => SoundCategory::Bell,
    _ => SoundCategory::Chime,
  }
}

fn percussion_sound_of(octave: i32) -> SoundCategory {
  match octave {
    0 | 1 => SoundCategory::Basedrum,
    2 | 3 => SoundCategory::Hat,
    4 | 5 => SoundCategory::Snare,
    6 | 7 => SoundCategory::Xylophone,
    _ => SoundCategory::Chime,
  }
}

/// Buckets the active program into one of the 16 General MIDI instrument
/// families and picks a concrete timbre from the family's quantization
/// curve using the true (unfolded) octave.
fn sound_of(program: U7, octave: i32) -> SoundCategory {
  match program / PROGRAMS_PER_FAMILY {
    0 => piano_sound_of(octave),       // Piano
    1 => percussion_sound_of(octave),  // Chromatic Percussion
    2 => flute_sound_of(octave),       // Organ
    3 => piano_sound_of(octave),       // Guitar
    4 => piano_sound_of(octave),       // Bass
    5 => piano_sound_of(octave),       // Strings
    6 => piano_sound_of(octave),       // Ensemble
    7 => flute_sound_of(octave),       // Brass
    8 => flute_sound_of(octave),       // Reed
    9 => flute_sound_of(octave),       // Pipe
    10 => flute_sound_of(octave),      // Synth Lead
    11 => flute_sound_of(octave),      // Synth Pad
    12 => flute_sound_of(octave),      // Synth Effects
    13 => piano_sound_of(octave),      // Ethnic
    14 => percussion_sound_of(octave), // Percussive
    _ => percussion_sound_of(octave),  // Sound Effects
  }
}

/// Quantizes raw note events into Blips.
///
/// Keeps one current program per channel, updated only by ProgramChange
/// events; the state persists across the tracks of one file. NoteOff has
/// no compiled effect since triggers are fire and forget.
pub struct Compiler {
  programs: [U7; NUM_CHANNELS],
}

impl Compiler {
  pub fn new() -> Compiler {
    Compiler {
      programs: [0; NUM_CHANNELS],
    }
  }

  pub fn compile_track(&mut self, events: &[RawEvent]) -> Vec<Blip> {
    let mut blips = Vec::new();
    for event in events {
      match event.kind {
        RawKind::NoteOn => {
          if let Some(blip) = self.blip_of(event) {
            blips.push(blip);
          }
        }
        RawKind::NoteOff => {}
        RawKind::ProgramChange => {
          self.programs[usize::from(event.channel)] = event.data1;
        }
      }
    }
    blips
  }

  fn blip_of(&self, event: &RawEvent) -> Option<Blip> {
    let key = event.data1;
    let octave = i32::from(key / 12) - 1;
    let pitch = pitch_factor(key)?;
    let program = self.programs[usize::from(event.channel)];
    Some(Blip {
      tick: event.tick,
      sound: sound_of(program, octave),
      pitch,
    })
  }
}

impl Default for Compiler {
  fn default() -> Compiler {
    Compiler::new()
  }
}
