//! The admission-control engine: mask matching, join/send decisions, the
//! flood governor, the split-mode sentinel, and channel lifecycle.

pub mod access;
pub mod admission;
pub mod flood;
pub mod hooks;
pub mod lifecycle;
pub mod splitmode;

pub use access::{matches_mask, AccessControl, AccessOutcome, ExtbanMatcher, MatchSet};
pub use admission::{can_join, can_send, JoinDenial, SendClass};
pub use flood::{tick as flood_tick, FloodVerdict};
pub use hooks::{HookRegistry, Policy};
pub use lifecycle::{depart, destroy, DepartOutcome, EmptyProof};
pub use splitmode::SplitSentinel;
