//! User state.

use std::collections::HashSet;

/// Unique user identifier (TS6 format: 9 characters).
pub type Uid = String;

/// User modes.
#[derive(Debug, Default, Clone)]
pub struct UserModes {
    pub invisible: bool, // +i
    pub oper: bool,      // +o
    pub registered: bool, // +r (identified to services)
}

/// A user visible to this server, local or remote.
#[derive(Debug)]
pub struct User {
    pub uid: Uid,
    pub nick: String,
    pub user: String,
    pub realname: String,
    pub host: String,
    /// Textual IP, kept separately so masks can target either form.
    pub ip: String,
    /// User modes.
    pub modes: UserModes,
    /// Account name if identified to services.
    pub account: Option<String>,
    /// Negotiated capability names (e.g. "multi-prefix").
    pub caps: HashSet<String>,
    /// Channels (lowercase) currently holding a standing invite for this
    /// user; mirrors `Channel::invites` so either side can revoke.
    pub invites: HashSet<String>,
    /// Whether this user is connected to this server.
    pub local: bool,
}

impl User {
    /// Create a locally-connected user.
    pub fn new_local(uid: Uid, nick: String, user: String, realname: String, host: String, ip: String) -> Self {
        Self {
            uid,
            nick,
            user,
            realname,
            host,
            ip,
            modes: UserModes::default(),
            account: None,
            caps: HashSet::new(),
            invites: HashSet::new(),
            local: true,
        }
    }

    /// The user's full `nick!user@host` mask.
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.host)
    }
}
