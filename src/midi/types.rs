pub type U4 = u8;
pub type U7 = u8;
pub type U14 = u16;

/// Absolute time position in MIDI ticks.
pub type Tick = u64;
