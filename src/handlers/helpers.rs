//! Shared handler utilities.

use crate::state::Mesh;
use tern_proto::Prefix;

/// Current Unix timestamp.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build the `nick!user@host` prefix for a user, if they exist.
pub async fn user_prefix(mesh: &Mesh, uid: &str) -> Option<Prefix> {
    let user = mesh.get_user(uid)?;
    let user = user.read().await;
    Some(Prefix::new(&user.nick, &user.user, &user.host))
}

/// Resolve a nick to a UID, case-insensitively.
pub fn resolve_nick(mesh: &Mesh, nick: &str) -> Option<String> {
    mesh.lookup_nick(nick)
}

/// Split a comma-separated command argument.
pub fn split_targets(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(',').filter(|s| !s.is_empty())
}
