//! Session registry and lifecycle supervision.
//!
//! Provides:
//! - `SessionRegistry` - Gossip-maintained view of bound units
//! - `Spawner` - Allocate units, launch contexts, release them on exit
//! - `LivenessWatch` - Pluggable termination detection (`PollWatch` default)

pub mod liveness;
pub mod registry;
pub mod spawner;

pub use liveness::{LivenessWatch, OnGone, PollWatch, WatchGuard};
pub use registry::{Session, SessionRegistry};
pub use spawner::{SpawnError, Spawner};
