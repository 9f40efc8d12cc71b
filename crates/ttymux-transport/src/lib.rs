//! I/O routing and execution contexts.
//!
//! Provides:
//! - Wire protocol (JSON, Latin-1 payloads) and a text-framed `WireBus`
//! - `IoRouter` - Primary-side device/bus bridge
//! - `SessionProxy` - Secondary-side unit presentation
//! - `PrimaryContext` / `SecondaryContext` - Per-context event loops
//! - `TaskLauncher` - Spawns secondaries as tokio tasks

pub mod launcher;
pub mod protocol;
pub mod proxy;
pub mod router;
pub mod runtime;
pub mod wire;

pub use launcher::{SessionIo, SessionIoFactory, TaskHandle, TaskLauncher};
pub use protocol::CodecError;
pub use proxy::SessionProxy;
pub use router::IoRouter;
pub use runtime::{PrimaryContext, SecondaryContext};
pub use wire::WireBus;
