pub mod decoder;
pub mod types;

pub use self::decoder::{Decoder, ParseError, RawEvent, RawKind};
pub use self::types::Tick;
