pub mod action_queue;
pub mod cached_response;

pub use action_queue::{ActionPatch, ActionType, QueuedAction};
pub use cached_response::{CachedResponse, CACHE_TIMESTAMP_HEADER};
