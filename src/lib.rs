pub mod config;
pub mod logging;
pub mod midi;
pub mod playback;
pub mod score;
