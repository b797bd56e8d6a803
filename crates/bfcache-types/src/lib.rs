//! Foundation types for the session-history subsystem.
//!
//! This crate contains the engine-agnostic pieces shared by the other
//! workspace crates: identifiers and the injected id generator, frame load
//! types, the monotonic clock abstraction, configuration, and the error
//! type.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod load_type;

pub use clock::{Clock, ManualClock, MonotonicTime, SystemClock};
pub use config::{HistoryConfig, PageCacheConfig};
pub use error::{HistoryError, NotCacheableReason, Result};
pub use ids::{DocumentId, FrameId, IdGenerator, ItemId};
pub use load_type::FrameLoadType;
