//! Process-level primitives.
//!
//! Nothing in here knows about players or items.

pub mod ids;
pub mod rng;

// Re-export core types
pub use ids::{SessionId, SessionIdGenerator};
pub use rng::SpawnRng;
