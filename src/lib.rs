#![forbid(unsafe_code)]

//! Stream Window Helper (swh) — bounded real-time stream aggregation with
//! adaptive backpressure.
//!
//! Five cooperating pieces keep a high-frequency record stream displayable:
//! 1. **RingBuffer**: fixed-capacity FIFO overwrite buffer under every
//!    bounded history
//! 2. **LiveWindowStore**: dedup + age-window + bounded merge that preserves
//!    record identity so renderers can skip unchanged rows
//! 3. **StreamCommitStore**: frame-coalesced commit application with a
//!    bounded detail cache and an invalidation version counter
//! 4. **AdaptiveDegradationController**: sampling-mode backpressure plus
//!    emergency heap-purge signaling
//! 5. **VirtualizedSlotModel**: fixed display slots with stable identity
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use stream_window_helper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use stream_window_helper::window::store::{LiveWindowStore, SnapshotOptions};
//! use stream_window_helper::session::StreamSession;
//! ```

pub mod prelude;

pub mod commit;
pub mod core;
pub mod degrade;
pub mod session;
pub mod slots;
pub mod telemetry;
pub mod window;
