//! Commit/batching layer: frame-coalesced application of upstream updates
//! plus the bounded detail cache.

pub mod detail_cache;
pub mod scheduler;
pub mod store;

pub use detail_cache::DetailCache;
pub use scheduler::{
    FrameCallback, FrameHandle, FrameScheduler, FrameScheduling, ManualFrameScheduler,
};
pub use store::{Commit, StreamCommitStore};
