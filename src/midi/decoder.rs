use failure::Fail;

use crate::midi::types::{Tick, U4, U7};

const HEADER_CHUNK: &[u8] = b"MThd";
const TRACK_CHUNK: &[u8] = b"MTrk";

const HEADER_KNOWN_LEN: u32 = 6;
const SMPTE_DIVISION_BIT: u16 = 0x8000;

const STATUS_BIT: u8 = 0b1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
  NoteOn,
  NoteOff,
  ProgramChange,
}

/// One channel event with its absolute position in ticks.
///
/// `data1`/`data2` follow the wire layout: key and velocity for notes,
/// program number and zero for program changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
  pub tick: Tick,
  pub kind: RawKind,
  pub channel: U4,
  pub data1: U7,
  pub data2: U7,
}

#[derive(Debug, Fail, PartialEq)]
pub enum ParseError {
  #[fail(display = "not a standard MIDI file")]
  InvalidHeader,

  #[fail(display = "SMPTE time division {:#06x} is not supported", division)]
  UnsupportedTimeDivision { division: u16 },

  #[fail(display = "track {} is truncated", track)]
  TruncatedTrack { track: usize },

  #[fail(display = "track {}: data byte {:#04x} without a running status", track, byte)]
  OrphanDataByte { track: usize, byte: u8 },

  #[fail(display = "track {}: expected data byte, found status byte {:#04x}", track, byte)]
  UnexpectedStatusByte { track: usize, byte: u8 },

  #[fail(display = "track {}: variable length quantity exceeds 4 bytes", track)]
  VarLenOverflow { track: usize },
}

/// Standard MIDI File container decoder.
///
/// Produces per-track event lists with delta times already accumulated into
/// absolute ticks. Only notes and program changes are surfaced; every other
/// event is parsed for structural correctness and dropped.
pub struct Decoder<'a> {
  pos: usize,
  data: &'a [u8],
}

impl<'a> Decoder<'a> {
  pub fn new(data: &'a [u8]) -> Decoder<'a> {
    Decoder { pos: 0, data }
  }

  pub fn decode(mut self) -> Result<Vec<Vec<RawEvent>>, ParseError> {
    let num_tracks = self.decode_header()?;
    let mut tracks = Vec::with_capacity(usize::from(num_tracks));
    for track in 0..usize::from(num_tracks) {
      let chunk = self.next_track_chunk(track)?;
      tracks.push(TrackDecoder::new(track, chunk).decode()?);
    }
    Ok(tracks)
  }

  fn decode_header(&mut self) -> Result<u16, ParseError> {
    let magic = self.read_bytes(4).ok_or(ParseError::InvalidHeader)?;
    if magic != HEADER_CHUNK {
      return Err(ParseError::InvalidHeader);
    }
    let length = self.read_u32().ok_or(ParseError::InvalidHeader)?;
    if length < HEADER_KNOWN_LEN {
      return Err(ParseError::InvalidHeader);
    }
    let _format = self.read_u16().ok_or(ParseError::InvalidHeader)?;
    let num_tracks = self.read_u16().ok_or(ParseError::InvalidHeader)?;
    let division = self.read_u16().ok_or(ParseError::InvalidHeader)?;
    if division & SMPTE_DIVISION_BIT != 0 {
      return Err(ParseError::UnsupportedTimeDivision { division });
    }
    // A longer header carries future fields that must be skipped.
    self
      .read_bytes((length - HEADER_KNOWN_LEN) as usize)
      .ok_or(ParseError::InvalidHeader)?;
    Ok(num_tracks)
  }

  fn next_track_chunk(&mut self, track: usize) -> Result<&'a [u8], ParseError> {
    loop {
      let kind = self
        .read_bytes(4)
        .ok_or(ParseError::TruncatedTrack { track })?;
      let length = self.read_u32().ok_or(ParseError::TruncatedTrack { track })?;
      let chunk = self
        .read_bytes(length as usize)
        .ok_or(ParseError::TruncatedTrack { track })?;
      if kind == TRACK_CHUNK {
        return Ok(chunk);
      }
      // Chunks with an alien type are skipped, not rejected.
    }
  }

  fn read_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
    if self.pos + count <= self.data.len() {
      let bytes = &self.data[self.pos..self.pos + count];
      self.pos += count;
      Some(bytes)
    } else {
      None
    }
  }

  fn read_u16(&mut self) -> Option<u16> {
    let bytes = self.read_bytes(2)?;
    Some((u16::from(bytes[0]) << 8) | u16::from(bytes[1]))
  }

  fn read_u32(&mut self) -> Option<u32> {
    let bytes = self.read_bytes(4)?;
    Some(
      (u32::from(bytes[0]) << 24)
        | (u32::from(bytes[1]) << 16)
        | (u32::from(bytes[2]) << 8)
        | u32::from(bytes[3]),
    )
  }
}

struct TrackDecoder<'a> {
  track: usize,
  pos: usize,
  data: &'a [u8],
  running_status: Option<u8>,
  tick: Tick,
}

impl<'a> TrackDecoder<'a> {
  fn new(track: usize, data: &'a [u8]) -> TrackDecoder<'a> {
    TrackDecoder {
      track,
      pos: 0,
      data,
      running_status: None,
      tick: 0,
    }
  }

  fn decode(mut self) -> Result<Vec<RawEvent>, ParseError> {
    let mut events = Vec::new();
    while self.pos < self.data.len() {
      let delta = self.read_varlen()?;
      self.tick += delta;
      if let Some(event) = self.decode_event()? {
        events.push(event);
      }
    }
    Ok(events)
  }

  fn decode_event(&mut self) -> Result<Option<RawEvent>, ParseError> {
    let first = self.peek().ok_or_else(|| self.truncated())?;
    let status = if first & STATUS_BIT != 0 {
      self.pos += 1;
      first
    } else {
      self.running_status.ok_or(ParseError::OrphanDataByte {
        track: self.track,
        byte: first,
      })?
    };
    match (status >> 4) & 0x0f {
      0b1000 => {
        self.running_status = Some(status);
        let (key, velocity) = self.read_data2()?;
        Ok(Some(self.event(RawKind::NoteOff, status & 0x0f, key, velocity)))
      }
      0b1001 => {
        // A velocity of zero is kept as NoteOn; the compiler does not look
        // at velocities at all.
        self.running_status = Some(status);
        let (key, velocity) = self.read_data2()?;
        Ok(Some(self.event(RawKind::NoteOn, status & 0x0f, key, velocity)))
      }
      0b1010 | 0b1011 | 0b1110 => {
        // Polyphonic key pressure, control change, pitch bend.
        self.running_status = Some(status);
        self.read_data2()?;
        Ok(None)
      }
      0b1100 => {
        self.running_status = Some(status);
        let program = self.read_data()?;
        Ok(Some(self.event(RawKind::ProgramChange, status & 0x0f, program, 0)))
      }
      0b1101 => {
        // Channel pressure.
        self.running_status = Some(status);
        self.read_data()?;
        Ok(None)
      }
      _ => self.decode_system(status),
    }
  }

  fn decode_system(&mut self, status: u8) -> Result<Option<RawEvent>, ParseError> {
    match status {
      0b1111_0000 | 0b1111_0111 => {
        // SysEx and escape events carry an explicit length.
        self.running_status = None;
        let length = self.read_varlen()?;
        self.skip(length as usize)?;
      }
      0b1111_1111 => {
        // Meta event: type byte, length, payload.
        self.running_status = None;
        self.read_byte()?;
        let length = self.read_varlen()?;
        self.skip(length as usize)?;
      }
      0b1111_0001 | 0b1111_0011 => {
        self.running_status = None;
        self.read_data()?;
      }
      0b1111_0010 => {
        self.running_status = None;
        self.read_data2()?;
      }
      _ => {
        // Remaining system common and realtime bytes carry no data. The
        // realtime ones do not cancel the running status.
        if status < 0b1111_1000 {
          self.running_status = None;
        }
      }
    }
    Ok(None)
  }

  fn event(&self, kind: RawKind, channel: U4, data1: U7, data2: U7) -> RawEvent {
    RawEvent {
      tick: self.tick,
      kind,
      channel,
      data1,
      data2,
    }
  }

  fn truncated(&self) -> ParseError {
    ParseError::TruncatedTrack { track: self.track }
  }

  fn peek(&self) -> Option<u8> {
    self.data.get(self.pos).cloned()
  }

  fn read_byte(&mut self) -> Result<u8, ParseError> {
    let byte = self.peek().ok_or_else(|| self.truncated())?;
    self.pos += 1;
    Ok(byte)
  }

  fn read_data(&mut self) -> Result<U7, ParseError> {
    let byte = self.read_byte()?;
    if byte & STATUS_BIT != 0 {
      Err(ParseError::UnexpectedStatusByte {
        track: self.track,
        byte,
      })
    } else {
      Ok(byte)
    }
  }

  fn read_data2(&mut self) -> Result<(U7, U7), ParseError> {
    let d1 = self.read_data()?;
    let d2 = self.read_data()?;
    Ok((d1, d2))
  }

  fn read_varlen(&mut self) -> Result<u64, ParseError> {
    let mut value: u64 = 0;
    for _ in 0..4 {
      let byte = self.read_byte()?;
      value = (value << 7) | u64::from(byte & 0x7f);
      if byte & STATUS_BIT == 0 {
        return Ok(value);
      }
    }
    Err(ParseError::VarLenOverflow { track: self.track })
  }

  fn skip(&mut self, count: usize) -> Result<(), ParseError> {
    if self.pos + count <= self.data.len() {
      self.pos += count;
      Ok(())
    } else {
      Err(self.truncated())
    }
  }
}
