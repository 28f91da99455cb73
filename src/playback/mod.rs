pub mod loader;
pub mod scheduler;
pub mod session;
pub mod spatial;

pub use self::loader::LoadError;
pub use self::scheduler::SessionScheduler;
pub use self::session::{PlaybackState, Session};
pub use self::spatial::{Anchor, Location, RegionKey, SpatialWorld};
