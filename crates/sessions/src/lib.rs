//! Identity and session management for CentralGate.
//!
//! Access keys are looked up in an [`IdentityStore`], checked against a
//! lazy time-to-live rule, and turned into a single active [`Session`] per
//! [`AccessGate`]. Chat history is kept per identity in an append-only
//! [`ChatLogStore`].

pub mod filelock;
pub mod gate;
pub mod lifecycle;
pub mod manager;
pub mod pointer;
pub mod store;
pub mod transcript;

pub use filelock::{FileStamp, StateFileLock};
pub use gate::{AccessGate, Session};
pub use lifecycle::{is_expired, remaining_ttl, Clock, ExpiryPolicy, FixedClock, SystemClock};
pub use manager::{AuthFailure, AuthOutcome, SessionLifecycleManager};
pub use pointer::{FilePointer, KeychainPointer, MemoryPointer, SessionPointer};
pub use store::{IdentityStore, JsonIdentityStore};
pub use transcript::{ChatLogStore, JsonlChatLog};
