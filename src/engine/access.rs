//! The access-control matcher.
//!
//! One evaluation routine serves all four ban-family lists; callers select
//! the list and interpret the outcome. Verdicts for local members are
//! cached on the membership record, keyed by the channel's `bants` token.

use crate::state::{BanCache, Channel, ListKind, Membership, User};
use std::sync::Arc;

/// Wildcard comparison of a `nick!user@host` style mask against a string.
/// Supports `*` and `?`, case-insensitive per RFC 1459 mapping.
pub fn matches_mask(pattern: &str, subject: &str) -> bool {
    let pattern = tern_proto::irc_to_lower(pattern);
    let subject = tern_proto::irc_to_lower(subject);
    wildcard_match(&pattern, &subject)
}

fn wildcard_match(pattern: &str, subject: &str) -> bool {
    let mut p_chars = pattern.chars().peekable();
    let mut s_chars = subject.chars().peekable();

    while let Some(p) = p_chars.next() {
        match p {
            '*' => {
                // Consume consecutive *
                while p_chars.peek() == Some(&'*') {
                    p_chars.next();
                }
                // If * is at end, match rest
                if p_chars.peek().is_none() {
                    return true;
                }
                // Try matching from each position
                while s_chars.peek().is_some() {
                    let remaining_pattern: String = p_chars.clone().collect();
                    let remaining_subject: String = s_chars.clone().collect();
                    if wildcard_match(&remaining_pattern, &remaining_subject) {
                        return true;
                    }
                    s_chars.next();
                }
                return wildcard_match(&p_chars.collect::<String>(), "");
            }
            '?' => {
                if s_chars.next().is_none() {
                    return false;
                }
            }
            c => {
                if s_chars.next() != Some(c) {
                    return false;
                }
            }
        }
    }

    s_chars.peek().is_none()
}

/// Precomputed match keys for one client, built once per admission check
/// and reused across the ban, exception, and quiet evaluations.
#[derive(Debug, Clone)]
pub struct MatchSet {
    keys: Vec<String>,
}

impl MatchSet {
    /// Build the match keys from a user snapshot: one key per visible
    /// identity form (hostname and IP).
    pub fn for_user(user: &User) -> Self {
        let mut keys = vec![format!("{}!{}@{}", user.nick, user.user, user.host)];
        if user.ip != user.host {
            keys.push(format!("{}!{}@{}", user.nick, user.user, user.ip));
        }
        Self { keys }
    }

    /// Whether any precomputed key satisfies the mask.
    pub fn matches(&self, mask: &str) -> bool {
        self.keys.iter().any(|key| matches_mask(mask, key))
    }
}

/// Result of evaluating a client against one ban-family list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// No entry matched.
    None,
    /// An entry matched; for bans it may carry a forward target.
    Matched { forward: Option<String> },
    /// A ban (or quiet) entry matched but an exception overrode it.
    /// Reported distinctly from `None` so callers can log the override.
    Exempted,
}

/// An externally-registered matcher for extended ban syntax (e.g.
/// account-based `$a:` patterns). The engine treats patterns it cannot
/// match itself as opaque and offers them to each registered extban.
pub trait ExtbanMatcher: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &'static str;
    /// Whether `mask` matches `user`.
    fn matches(&self, mask: &str, user: &User) -> bool;
}

/// The matcher plus its registered extban predicates.
#[derive(Default)]
pub struct AccessControl {
    extbans: Vec<Arc<dyn ExtbanMatcher>>,
    /// Whether +e exceptions are honored.
    pub use_exceptions: bool,
}

impl AccessControl {
    pub fn new(use_exceptions: bool) -> Self {
        Self { extbans: Vec::new(), use_exceptions }
    }

    /// Register an extban matcher. Registration order is evaluation order.
    pub fn register_extban(&mut self, matcher: Arc<dyn ExtbanMatcher>) {
        self.extbans.push(matcher);
    }

    fn entry_matches(&self, mask: &str, set: &MatchSet, user: &User) -> bool {
        set.matches(mask) || self.extbans.iter().any(|e| e.matches(mask, user))
    }

    /// Evaluate a client against one ban-family list.
    ///
    /// For the ban and quiet lists, a match is re-checked against the
    /// exception list (when exceptions are enabled); an exception wins.
    pub fn evaluate(
        &self,
        channel: &Channel,
        kind: ListKind,
        set: &MatchSet,
        user: &User,
    ) -> AccessOutcome {
        for entry in channel.list(kind) {
            if !self.entry_matches(&entry.mask, set, user) {
                continue;
            }
            let exceptions_apply =
                self.use_exceptions && matches!(kind, ListKind::Ban | ListKind::Quiet);
            if exceptions_apply {
                let exempt = channel
                    .list(ListKind::Except)
                    .iter()
                    .any(|ex| self.entry_matches(&ex.mask, set, user));
                if exempt {
                    return AccessOutcome::Exempted;
                }
            }
            return AccessOutcome::Matched { forward: entry.forward.clone() };
        }
        AccessOutcome::None
    }

    /// Ban-or-quiet check for the send path, consulting and refreshing the
    /// membership's cached verdict.
    ///
    /// Only local members are cached; a remote member's record is left
    /// untouched and the lists are always re-scanned for them.
    pub fn muted_cached(
        &self,
        channel: &Channel,
        membership: Option<&mut Membership>,
        set: &MatchSet,
        user: &User,
    ) -> bool {
        if let Some(membership) = membership {
            if membership.local {
                if let Some(cache) = membership.cache {
                    if cache.bants == channel.bants() {
                        return cache.muted;
                    }
                }
                let muted = self.scan_muted(channel, set, user);
                membership.cache = Some(BanCache { bants: channel.bants(), muted });
                return muted;
            }
        }
        self.scan_muted(channel, set, user)
    }

    fn scan_muted(&self, channel: &Channel, set: &MatchSet, user: &User) -> bool {
        matches!(
            self.evaluate(channel, ListKind::Ban, set, user),
            AccessOutcome::Matched { .. }
        ) || matches!(
            self.evaluate(channel, ListKind::Quiet, set, user),
            AccessOutcome::Matched { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BanEntry;

    fn test_user(nick: &str, host: &str) -> User {
        User::new_local(
            "001AAAAAA".into(),
            nick.into(),
            "ident".into(),
            "Real Name".into(),
            host.into(),
            "192.0.2.7".into(),
        )
    }

    fn entry(mask: &str) -> BanEntry {
        BanEntry {
            mask: mask.into(),
            set_by: "oper!o@host".into(),
            set_at: 100,
            forward: None,
        }
    }

    #[test]
    fn test_matches_mask_wildcards() {
        assert!(matches_mask("*!*@*.example.com", "nick!user@host.example.com"));
        assert!(matches_mask("nick!*@*", "nick!user@host"));
        assert!(matches_mask("n?ck!*@*", "nick!user@host"));
        assert!(!matches_mask("*!user@*", "nick!other@host"));
        assert!(matches_mask("NICK!*@*", "nick!user@host"));
        assert!(matches_mask("*", "anything"));
    }

    #[test]
    fn test_matchset_covers_host_and_ip() {
        let user = test_user("alice", "example.test");
        let set = MatchSet::for_user(&user);
        assert!(set.matches("*!*@example.test"));
        assert!(set.matches("*!*@192.0.2.*"));
        assert!(!set.matches("*!*@elsewhere.test"));
    }

    #[test]
    fn test_evaluate_ban_hit() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.add_list_entry(ListKind::Ban, entry("*!*@*.test"), 100);

        let user = test_user("alice", "host.test");
        let set = MatchSet::for_user(&user);
        let access = AccessControl::new(true);
        assert_eq!(
            access.evaluate(&chan, ListKind::Ban, &set, &user),
            AccessOutcome::Matched { forward: None }
        );
    }

    #[test]
    fn test_exception_overrides_ban() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.add_list_entry(ListKind::Ban, entry("*!*@*.test"), 100);
        chan.add_list_entry(ListKind::Except, entry("alice!*@*"), 100);

        let user = test_user("alice", "host.test");
        let set = MatchSet::for_user(&user);
        let access = AccessControl::new(true);
        assert_eq!(
            access.evaluate(&chan, ListKind::Ban, &set, &user),
            AccessOutcome::Exempted
        );

        // With exceptions disabled the ban stands.
        let strict = AccessControl::new(false);
        assert_eq!(
            strict.evaluate(&chan, ListKind::Ban, &set, &user),
            AccessOutcome::Matched { forward: None }
        );
    }

    #[test]
    fn test_evaluate_idempotent() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.add_list_entry(
            ListKind::Ban,
            BanEntry { forward: Some("#overflow".into()), ..entry("*!*@*.test") },
            100,
        );

        let user = test_user("alice", "host.test");
        let set = MatchSet::for_user(&user);
        let access = AccessControl::new(true);
        let first = access.evaluate(&chan, ListKind::Ban, &set, &user);
        let second = access.evaluate(&chan, ListKind::Ban, &set, &user);
        assert_eq!(first, second);
        assert_eq!(first, AccessOutcome::Matched { forward: Some("#overflow".into()) });
    }

    struct AccountExtban;
    impl ExtbanMatcher for AccountExtban {
        fn name(&self) -> &'static str {
            "account"
        }
        fn matches(&self, mask: &str, user: &User) -> bool {
            mask.strip_prefix("$a:")
                .is_some_and(|account| user.account.as_deref() == Some(account))
        }
    }

    #[test]
    fn test_extban_matcher() {
        let mut chan = Channel::new("#test".into(), 100);
        chan.add_list_entry(ListKind::Ban, entry("$a:spammer"), 100);

        let mut user = test_user("alice", "clean.host");
        let set = MatchSet::for_user(&user);

        let mut access = AccessControl::new(true);
        access.register_extban(Arc::new(AccountExtban));

        assert_eq!(access.evaluate(&chan, ListKind::Ban, &set, &user), AccessOutcome::None);

        user.account = Some("spammer".into());
        assert_eq!(
            access.evaluate(&chan, ListKind::Ban, &set, &user),
            AccessOutcome::Matched { forward: None }
        );
    }

    #[test]
    fn test_cache_invalidated_by_bants() {
        let mut chan = Channel::new("#test".into(), 100);
        let user = test_user("alice", "example.test");
        let set = MatchSet::for_user(&user);
        let access = AccessControl::new(true);

        let mut membership = Membership {
            id: crate::state::MembershipRegistry::new()
                .insert("#test", &user.uid, true)
                .unwrap(),
            channel: "#test".into(),
            uid: user.uid.clone(),
            local: true,
            op: false,
            voice: false,
            cache: None,
        };

        // Not banned; verdict cached against bants == 0.
        assert!(!access.muted_cached(&chan, Some(&mut membership), &set, &user));
        assert_eq!(membership.cache.unwrap().bants, 0);

        // List mutation bumps bants; the stale cache must not be reused.
        chan.add_list_entry(ListKind::Ban, entry("*!*@*.test"), 100);
        assert!(access.muted_cached(&chan, Some(&mut membership), &set, &user));
        assert_eq!(membership.cache.unwrap().bants, chan.bants());
    }

    #[test]
    fn test_remote_member_never_cached() {
        let chan = Channel::new("#test".into(), 100);
        let user = test_user("alice", "example.test");
        let set = MatchSet::for_user(&user);
        let access = AccessControl::new(true);

        let mut membership = Membership {
            id: crate::state::MembershipRegistry::new()
                .insert("#test", &user.uid, false)
                .unwrap(),
            channel: "#test".into(),
            uid: user.uid.clone(),
            local: false,
            op: false,
            voice: false,
            cache: None,
        };

        assert!(!access.muted_cached(&chan, Some(&mut membership), &set, &user));
        assert!(membership.cache.is_none());
    }
}
