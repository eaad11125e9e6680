//! The membership registry.
//!
//! Each (channel, user) pair has exactly one membership record, held in an
//! arena keyed by a stable id and linked into three indexes at once: the
//! channel's full member list, the channel's local-member list, and the
//! user's own channel list. A single [`MembershipRegistry::remove`] updates
//! all three, so they cannot drift apart.

use crate::state::Uid;
use std::collections::HashMap;

/// Stable handle for a membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MembershipId(u64);

/// Cached admission verdict, valid only while the channel's `bants` token
/// still equals `bants` here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BanCache {
    /// The `bants` value the verdict was computed against.
    pub bants: u64,
    /// Whether the member was banned or quieted at that point.
    pub muted: bool,
}

/// One (channel, user) membership.
#[derive(Debug)]
pub struct Membership {
    pub id: MembershipId,
    /// Lowercase channel name.
    pub channel: String,
    pub uid: Uid,
    /// Whether the member is connected to this server.
    pub local: bool,
    pub op: bool,
    pub voice: bool,
    /// Cached ban/quiet verdict. Only populated for local members; remote
    /// members are always re-scanned.
    pub cache: Option<BanCache>,
}

impl Membership {
    /// The member's NAMES prefix characters, highest first.
    pub fn prefix_chars(&self) -> String {
        let mut s = String::with_capacity(2);
        if self.op {
            s.push('@');
        }
        if self.voice {
            s.push('+');
        }
        s
    }
}

/// Arena plus indexes for all memberships known to this server.
#[derive(Debug, Default)]
pub struct MembershipRegistry {
    records: HashMap<MembershipId, Membership>,
    by_pair: HashMap<(String, Uid), MembershipId>,
    by_channel: HashMap<String, Vec<MembershipId>>,
    local_by_channel: HashMap<String, Vec<MembershipId>>,
    by_user: HashMap<Uid, Vec<MembershipId>>,
    next_id: u64,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a membership for (channel, uid).
    ///
    /// Returns `None` if the pair is already a member.
    pub fn insert(&mut self, channel: &str, uid: &str, local: bool) -> Option<MembershipId> {
        let key = (channel.to_string(), uid.to_string());
        if self.by_pair.contains_key(&key) {
            return None;
        }

        let id = MembershipId(self.next_id);
        self.next_id += 1;

        self.records.insert(
            id,
            Membership {
                id,
                channel: channel.to_string(),
                uid: uid.to_string(),
                local,
                op: false,
                voice: false,
                cache: None,
            },
        );
        self.by_pair.insert(key, id);
        self.by_channel.entry(channel.to_string()).or_default().push(id);
        if local {
            self.local_by_channel
                .entry(channel.to_string())
                .or_default()
                .push(id);
        }
        self.by_user.entry(uid.to_string()).or_default().push(id);
        Some(id)
    }

    /// Remove a membership, detaching it from all three indexes.
    pub fn remove(&mut self, id: MembershipId) -> Option<Membership> {
        let record = self.records.remove(&id)?;
        self.by_pair.remove(&(record.channel.clone(), record.uid.clone()));

        Self::detach(&mut self.by_channel, &record.channel, id);
        if record.local {
            Self::detach(&mut self.local_by_channel, &record.channel, id);
        }
        Self::detach(&mut self.by_user, &record.uid, id);
        Some(record)
    }

    fn detach(index: &mut HashMap<String, Vec<MembershipId>>, key: &str, id: MembershipId) {
        if let Some(ids) = index.get_mut(key) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                index.remove(key);
            }
        }
    }

    /// Look up the membership id for (channel, uid).
    pub fn find(&self, channel: &str, uid: &str) -> Option<MembershipId> {
        self.by_pair
            .get(&(channel.to_string(), uid.to_string()))
            .copied()
    }

    pub fn get(&self, id: MembershipId) -> Option<&Membership> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: MembershipId) -> Option<&mut Membership> {
        self.records.get_mut(&id)
    }

    /// All members of a channel, in join order.
    pub fn members(&self, channel: &str) -> &[MembershipId] {
        self.by_channel.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locally-connected members of a channel. Most propagation only needs
    /// local sockets, so this subset is indexed separately.
    pub fn local_members(&self, channel: &str) -> &[MembershipId] {
        self.local_by_channel
            .get(channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Channels a user is a member of.
    pub fn channels_of(&self, uid: &str) -> &[MembershipId] {
        self.by_user.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.members(channel).len()
    }

    pub fn is_member(&self, channel: &str, uid: &str) -> bool {
        self.find(channel, uid).is_some()
    }

    /// Whether two users share at least one channel.
    ///
    /// Walks whichever user's channel list is shorter.
    pub fn shares_channel(&self, a: &str, b: &str) -> bool {
        let (walk, probe) = if self.channels_of(a).len() <= self.channels_of(b).len() {
            (a, b)
        } else {
            (b, a)
        };
        self.channels_of(walk).iter().any(|id| {
            self.records
                .get(id)
                .is_some_and(|m| self.is_member(&m.channel, probe))
        })
    }

    /// Remove every membership of a user (quit path). Returns the removed
    /// records so the caller can run per-channel teardown.
    pub fn remove_user(&mut self, uid: &str) -> Vec<Membership> {
        let ids: Vec<MembershipId> = self.channels_of(uid).to_vec();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_links_all_three_indexes() {
        let mut reg = MembershipRegistry::new();
        let id = reg.insert("#test", "001AAAAAA", true).unwrap();

        assert_eq!(reg.members("#test"), &[id]);
        assert_eq!(reg.local_members("#test"), &[id]);
        assert_eq!(reg.channels_of("001AAAAAA"), &[id]);
        assert!(reg.is_member("#test", "001AAAAAA"));
    }

    #[test]
    fn test_remote_member_not_in_local_index() {
        let mut reg = MembershipRegistry::new();
        let id = reg.insert("#test", "9ZZAAAAAA", false).unwrap();

        assert_eq!(reg.members("#test"), &[id]);
        assert!(reg.local_members("#test").is_empty());
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let mut reg = MembershipRegistry::new();
        assert!(reg.insert("#test", "001AAAAAA", true).is_some());
        assert!(reg.insert("#test", "001AAAAAA", true).is_none());
        assert_eq!(reg.member_count("#test"), 1);
    }

    #[test]
    fn test_remove_detaches_everywhere() {
        let mut reg = MembershipRegistry::new();
        let a = reg.insert("#test", "001AAAAAA", true).unwrap();
        let b = reg.insert("#test", "001AAAAAB", true).unwrap();

        let removed = reg.remove(a).unwrap();
        assert_eq!(removed.uid, "001AAAAAA");
        assert_eq!(reg.members("#test"), &[b]);
        assert_eq!(reg.local_members("#test"), &[b]);
        assert!(reg.channels_of("001AAAAAA").is_empty());
        assert!(reg.find("#test", "001AAAAAA").is_none());
    }

    #[test]
    fn test_remove_user_clears_all_channels() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#one", "001AAAAAA", true).unwrap();
        reg.insert("#two", "001AAAAAA", true).unwrap();
        reg.insert("#one", "001AAAAAB", true).unwrap();

        let removed = reg.remove_user("001AAAAAA");
        assert_eq!(removed.len(), 2);
        assert_eq!(reg.member_count("#one"), 1);
        assert_eq!(reg.member_count("#two"), 0);
    }

    #[test]
    fn test_shares_channel() {
        let mut reg = MembershipRegistry::new();
        reg.insert("#one", "001AAAAAA", true).unwrap();
        reg.insert("#one", "001AAAAAB", true).unwrap();
        reg.insert("#two", "001AAAAAC", true).unwrap();

        assert!(reg.shares_channel("001AAAAAA", "001AAAAAB"));
        assert!(!reg.shares_channel("001AAAAAA", "001AAAAAC"));
    }
}
