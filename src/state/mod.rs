//! Server state: channels, users, memberships, and the shared mesh.

pub mod channel;
pub mod membership;
pub mod mesh;
pub mod user;

pub use channel::{
    BanEntry, Channel, ChannelModes, FloodState, JoinThrottle, JoinWindow, ListKind, Topic,
};
pub use membership::{BanCache, Membership, MembershipId, MembershipRegistry};
pub use mesh::{Mesh, ServerInfo};
pub use user::{Uid, User, UserModes};
