//! Core abstractions for multiplexing one teletype device across sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `Unit` - Logical terminal slot numbers
//! - `Message` - Typed bus message and its kinds
//! - `Bus` / `LocalBus` - Best-effort multicast between execution contexts
//! - `Endpoint` - Per-context view of the bus (origin, clock, role guard)
//! - Device, surface and launcher traits for the external collaborators

pub mod bus;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod message;
pub mod traits;
pub mod unit;

pub use bus::{Bus, LocalBus, MessageStream};
pub use config::{ConfigError, MuxConfig};
pub use context::{BindingError, BindingParams, Role};
pub use endpoint::Endpoint;
pub use message::{Message, MessageKind, Origin};
pub use traits::{ContextHandle, ContextLauncher, Device, LaunchError, Surface};
pub use unit::{BROADCAST_UNIT, MAX_UNITS, Unit, UnitError};
