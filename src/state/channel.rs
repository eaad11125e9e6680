//! Channel state: modes, ban-family lists, topic, and per-channel counters.

use crate::state::Uid;
use std::collections::HashSet;

/// One of the four per-channel mask-pattern collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// `+b` — bans.
    Ban,
    /// `+e` — ban exceptions.
    Except,
    /// `+I` — invite exceptions.
    InviteExcept,
    /// `+q` — quiets.
    Quiet,
}

impl ListKind {
    /// The mode letter for this list.
    pub fn letter(self) -> char {
        match self {
            Self::Ban => 'b',
            Self::Except => 'e',
            Self::InviteExcept => 'I',
            Self::Quiet => 'q',
        }
    }

    /// Map a mode letter to a list, if it names one.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'b' => Some(Self::Ban),
            'e' => Some(Self::Except),
            'I' => Some(Self::InviteExcept),
            'q' => Some(Self::Quiet),
            _ => None,
        }
    }
}

/// An entry in a ban-family list. Immutable once created; replacing a ban
/// is delete plus insert.
#[derive(Debug, Clone)]
pub struct BanEntry {
    /// The mask pattern.
    pub mask: String,
    /// Identity of whoever set it (`nick!user@host` or server name).
    pub set_by: String,
    /// Unix timestamp when set.
    pub set_at: i64,
    /// Forward-channel name. Bans only.
    pub forward: Option<String>,
}

/// Channel topic with metadata.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// Join-rate throttle: at most `count` joins per `window_secs` sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinThrottle {
    pub count: u32,
    pub window_secs: i64,
}

/// Channel modes.
#[derive(Debug, Default, Clone)]
pub struct ChannelModes {
    pub invite_only: bool,     // +i
    pub moderated: bool,       // +m
    pub no_external: bool,     // +n
    pub secret: bool,          // +s
    pub topic_lock: bool,      // +t
    pub registered_only: bool, // +r
    pub permanent: bool,       // +P
    pub key: Option<String>,   // +k
    pub limit: Option<u32>,    // +l
    pub throttle: Option<JoinThrottle>, // +j count:secs
    pub forward: Option<String>,        // +f #channel
}

impl ChannelModes {
    /// Convert modes to a string like "+ntl 20".
    pub fn as_mode_string(&self) -> String {
        let mut s = String::from("+");
        let mut args = Vec::new();
        if self.invite_only {
            s.push('i');
        }
        if self.moderated {
            s.push('m');
        }
        if self.no_external {
            s.push('n');
        }
        if self.secret {
            s.push('s');
        }
        if self.topic_lock {
            s.push('t');
        }
        if self.registered_only {
            s.push('r');
        }
        if self.permanent {
            s.push('P');
        }
        if self.key.is_some() {
            s.push('k');
            args.push("*".to_string()); // key never shown in mode queries
        }
        if let Some(limit) = self.limit {
            s.push('l');
            args.push(limit.to_string());
        }
        if let Some(throttle) = self.throttle {
            s.push('j');
            args.push(format!("{}:{}", throttle.count, throttle.window_secs));
        }
        if let Some(forward) = &self.forward {
            s.push('f');
            args.push(forward.clone());
        }
        for arg in args {
            s.push(' ');
            s.push_str(&arg);
        }
        s
    }
}

/// Decaying message counter driving the per-channel flood governor.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloodState {
    /// Current counter value.
    pub counter: i64,
    /// Last time the counter was decayed (Unix seconds).
    pub last_tick: i64,
    /// Sticky flag: an operator notice has been emitted and the channel is
    /// still considered flooding until the counter decays to zero.
    pub warned: bool,
}

/// Sliding-window join counter for the `+j` throttle.
#[derive(Debug, Default, Clone, Copy)]
pub struct JoinWindow {
    pub count: u32,
    pub window_start: i64,
}

/// An IRC channel.
#[derive(Debug)]
pub struct Channel {
    /// Case-preserved name.
    pub name: String,
    /// Creation timestamp (`channelts`); the authority for ordering
    /// concurrent mode claims from different servers.
    pub created: i64,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    /// Ban list (+b).
    pub bans: Vec<BanEntry>,
    /// Ban exception list (+e).
    pub excepts: Vec<BanEntry>,
    /// Invite exception list (+I).
    pub invex: Vec<BanEntry>,
    /// Quiet list (+q).
    pub quiets: Vec<BanEntry>,
    /// Ban-cache validity token: bumped on every ban-family mutation.
    /// Strictly increasing for the lifetime of the channel.
    bants: u64,
    /// Clients holding a standing invite.
    pub invites: HashSet<Uid>,
    /// Flood governor counters.
    pub flood: FloodState,
    /// Join-throttle counters.
    pub joins: JoinWindow,
}

impl Channel {
    /// Create a new channel.
    pub fn new(name: String, now: i64) -> Self {
        Self {
            name,
            created: now,
            topic: None,
            modes: ChannelModes::default(),
            bans: Vec::new(),
            excepts: Vec::new(),
            invex: Vec::new(),
            quiets: Vec::new(),
            bants: 0,
            invites: HashSet::new(),
            flood: FloodState::default(),
            joins: JoinWindow::default(),
        }
    }

    /// Current ban-cache validity token.
    pub fn bants(&self) -> u64 {
        self.bants
    }

    /// Read access to one of the four ban-family lists.
    pub fn list(&self, kind: ListKind) -> &[BanEntry] {
        match kind {
            ListKind::Ban => &self.bans,
            ListKind::Except => &self.excepts,
            ListKind::InviteExcept => &self.invex,
            ListKind::Quiet => &self.quiets,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<BanEntry> {
        match kind {
            ListKind::Ban => &mut self.bans,
            ListKind::Except => &mut self.excepts,
            ListKind::InviteExcept => &mut self.invex,
            ListKind::Quiet => &mut self.quiets,
        }
    }

    /// Add an entry to a ban-family list.
    ///
    /// Returns `false` without mutating if the mask is already present or
    /// the list is at `max_list_size`. Any successful mutation bumps the
    /// `bants` token, invalidating every cached admission verdict.
    pub fn add_list_entry(
        &mut self,
        kind: ListKind,
        entry: BanEntry,
        max_list_size: usize,
    ) -> bool {
        let list = self.list_mut(kind);
        if list.len() >= max_list_size {
            return false;
        }
        if list.iter().any(|e| tern_proto::irc_eq(&e.mask, &entry.mask)) {
            return false;
        }
        list.push(entry);
        self.bants += 1;
        true
    }

    /// Remove an entry by mask from a ban-family list.
    ///
    /// Bumps `bants` when an entry was actually removed.
    pub fn remove_list_entry(&mut self, kind: ListKind, mask: &str) -> Option<BanEntry> {
        let list = self.list_mut(kind);
        let pos = list.iter().position(|e| tern_proto::irc_eq(&e.mask, mask))?;
        let entry = list.remove(pos);
        self.bants += 1;
        Some(entry)
    }

    /// Record a join against the `+j` throttle window.
    pub fn note_join(&mut self, now: i64) {
        if let Some(throttle) = self.modes.throttle {
            if now - self.joins.window_start >= throttle.window_secs {
                self.joins.window_start = now;
                self.joins.count = 0;
            }
        }
        self.joins.count = self.joins.count.saturating_add(1);
    }

    /// Whether the `+j` throttle window is currently exhausted.
    pub fn join_throttled(&self, now: i64) -> bool {
        match self.modes.throttle {
            Some(throttle) => {
                now - self.joins.window_start < throttle.window_secs
                    && self.joins.count >= throttle.count
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mask: &str) -> BanEntry {
        BanEntry {
            mask: mask.to_string(),
            set_by: "oper!o@host".to_string(),
            set_at: 100,
            forward: None,
        }
    }

    #[test]
    fn test_bants_bumps_on_every_list_mutation() {
        let mut chan = Channel::new("#test".into(), 100);
        assert_eq!(chan.bants(), 0);

        assert!(chan.add_list_entry(ListKind::Ban, entry("*!*@a"), 100));
        assert_eq!(chan.bants(), 1);
        assert!(chan.add_list_entry(ListKind::Quiet, entry("*!*@b"), 100));
        assert_eq!(chan.bants(), 2);
        assert!(chan.remove_list_entry(ListKind::Ban, "*!*@A").is_some());
        assert_eq!(chan.bants(), 3);
    }

    #[test]
    fn test_failed_mutations_leave_bants_alone() {
        let mut chan = Channel::new("#test".into(), 100);
        assert!(chan.add_list_entry(ListKind::Ban, entry("*!*@a"), 100));
        // Duplicate mask (case-insensitively) is refused.
        assert!(!chan.add_list_entry(ListKind::Ban, entry("*!*@A"), 100));
        // Removing a mask that is not present is a no-op.
        assert!(chan.remove_list_entry(ListKind::Ban, "*!*@other").is_none());
        assert_eq!(chan.bants(), 1);
    }

    #[test]
    fn test_list_size_cap() {
        let mut chan = Channel::new("#test".into(), 100);
        assert!(chan.add_list_entry(ListKind::Ban, entry("*!*@a"), 1));
        assert!(!chan.add_list_entry(ListKind::Ban, entry("*!*@b"), 1));
        assert_eq!(chan.bans.len(), 1);
    }

    #[test]
    fn test_join_throttle_window() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.modes.throttle = Some(JoinThrottle { count: 2, window_secs: 10 });

        chan.note_join(1000);
        assert!(!chan.join_throttled(1000));
        chan.note_join(1001);
        assert!(chan.join_throttled(1002));
        // Window expires; counter resets on the next join.
        assert!(!chan.join_throttled(1011));
        chan.note_join(1011);
        assert!(!chan.join_throttled(1012));
    }

    #[test]
    fn test_mode_string_hides_key() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.modes.no_external = true;
        chan.modes.topic_lock = true;
        chan.modes.key = Some("hunter2".into());
        chan.modes.limit = Some(20);
        let s = chan.modes.as_mode_string();
        assert!(s.starts_with("+ntkl"));
        assert!(!s.contains("hunter2"));
        assert!(s.contains("20"));
    }
}
