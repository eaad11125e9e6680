//! Channel lifecycle: departure and destruction.
//!
//! A channel may only be destroyed while it is provably empty. The removal
//! path is the sole producer of [`EmptyProof`], so destruction cannot be
//! reached from any code path that has not just watched the last member
//! leave. Permanent (`+P`) channels never yield a proof.

use crate::state::{Channel, Membership, MembershipRegistry};
use tracing::debug;

/// Witness that a channel had zero members at the moment its last
/// membership was removed. Not cloneable and not constructible outside
/// this module.
#[derive(Debug)]
pub struct EmptyProof {
    channel: String,
}

impl EmptyProof {
    /// The (lowercase) channel name the proof is about.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// What happened when a member departed.
#[derive(Debug)]
pub enum DepartOutcome {
    /// The user was not a member; nothing changed.
    NotMember,
    /// The membership was removed and the channel retains members (or is
    /// permanent).
    Removed(Membership),
    /// The membership was removed and the channel is now empty; the caller
    /// must destroy it with the enclosed proof.
    Empty(Membership, EmptyProof),
}

/// Remove one membership, reporting whether the channel emptied out.
///
/// `permanent` is the channel's `+P` flag: a permanent channel survives at
/// zero members and never yields a proof.
pub fn depart(
    registry: &mut MembershipRegistry,
    channel: &str,
    uid: &str,
    permanent: bool,
) -> DepartOutcome {
    let Some(id) = registry.find(channel, uid) else {
        return DepartOutcome::NotMember;
    };
    let Some(record) = registry.remove(id) else {
        return DepartOutcome::NotMember;
    };

    if !permanent && registry.member_count(channel) == 0 {
        let proof = EmptyProof { channel: channel.to_string() };
        return DepartOutcome::Empty(record, proof);
    }
    DepartOutcome::Removed(record)
}

/// Tear down an empty channel's state before it is dropped from the
/// channel table. Consumes the proof.
pub fn destroy(channel: &mut Channel, proof: EmptyProof) {
    debug_assert!(tern_proto::irc_eq(proof.channel(), &channel.name));
    debug!(channel = %channel.name, "destroying empty channel");
    channel.bans.clear();
    channel.excepts.clear();
    channel.invex.clear();
    channel.quiets.clear();
    channel.invites.clear();
    channel.topic = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_departure_yields_proof() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#test", "001AAAAAA", true).unwrap();
        reg.insert("#test", "001AAAAAB", true).unwrap();

        assert!(matches!(
            depart(&mut reg, "#test", "001AAAAAA", false),
            DepartOutcome::Removed(_)
        ));
        match depart(&mut reg, "#test", "001AAAAAB", false) {
            DepartOutcome::Empty(record, proof) => {
                assert_eq!(record.uid, "001AAAAAB");
                assert_eq!(proof.channel(), "#test");
            }
            other => panic!("expected Empty, got {other:?}"),
        }
    }

    #[test]
    fn test_permanent_channel_survives_empty() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#keep", "001AAAAAA", true).unwrap();

        assert!(matches!(
            depart(&mut reg, "#keep", "001AAAAAA", true),
            DepartOutcome::Removed(_)
        ));
        assert_eq!(reg.member_count("#keep"), 0);
    }

    #[test]
    fn test_non_member_departure_is_noop() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#test", "001AAAAAA", true).unwrap();
        assert!(matches!(
            depart(&mut reg, "#test", "001AAAAAB", false),
            DepartOutcome::NotMember
        ));
        assert_eq!(reg.member_count("#test"), 1);
    }

    #[test]
    fn test_destroy_clears_channel_state() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#test", "001AAAAAA", true).unwrap();

        let mut chan = Channel::new("#test".into(), 100);
        chan.add_list_entry(
            crate::state::ListKind::Ban,
            crate::state::BanEntry {
                mask: "*!*@x".into(),
                set_by: "x".into(),
                set_at: 0,
                forward: None,
            },
            100,
        );
        chan.topic = Some(crate::state::Topic {
            text: "hi".into(),
            set_by: "x".into(),
            set_at: 0,
        });

        match depart(&mut reg, "#test", "001AAAAAA", false) {
            DepartOutcome::Empty(_, proof) => destroy(&mut chan, proof),
            other => panic!("expected Empty, got {other:?}"),
        }
        assert!(chan.bans.is_empty());
        assert!(chan.topic.is_none());
    }
}
