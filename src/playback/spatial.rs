use crate::score::SoundCategory;

/// Regions partition a world on a 16-unit grid, the granularity at which
/// the spatial collaborator reports activity changes.
const REGION_SHIFT: i32 = 4;

/// A concrete, currently reachable point in an active world.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
  pub world: String,
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

/// Identity of the spatial partition containing an anchor. Activation
/// notifications are keyed by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionKey {
  pub world: String,
  pub x: i32,
  pub z: i32,
}

impl RegionKey {
  pub fn containing(world: &str, x: f64, z: f64) -> RegionKey {
    RegionKey {
      world: world.to_string(),
      x: (x.floor() as i32) >> REGION_SHIFT,
      z: (z.floor() as i32) >> REGION_SHIFT,
    }
  }
}

/// Where a session wants to play. An anchor names a position that may or
/// may not be resolvable at any given moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
  pub world: String,
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

impl Anchor {
  pub fn region(&self) -> RegionKey {
    RegionKey::containing(&self.world, self.x, self.z)
  }
}

/// Contract with the spatial collaborator that owns worlds and regions.
/// `resolve_location` returning `None` is not an error; it is the signal
/// that drives a session into its paused state.
pub trait SpatialWorld {
  fn is_region_active(&self, region: &RegionKey) -> bool;

  fn resolve_location(&self, anchor: &Anchor) -> Option<Location>;

  fn emit_trigger(&self, location: &Location, sound: SoundCategory, volume: f32, pitch: f32);
}
