//! Join and send admission.
//!
//! `can_join` walks the deny checks in a fixed order: bans and key
//! mismatches are final, while the conditional checks (invite-only, limit,
//! registered-only, throttle) are provisional and a standing invite clears
//! them. `can_send` classifies a sender worst-case first and applies the
//! op/voice upgrade last, so channel status defeats moderation and quiets.

use crate::engine::access::{matches_mask, AccessControl, AccessOutcome, MatchSet};
use crate::engine::hooks::HookRegistry;
use crate::state::{Channel, ListKind, Membership, User};

/// Why a join was refused. Most denials carry the channel's `+f` forward
/// target when one is set; a ban denial carries the ban entry's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDenial {
    Banned { forward: Option<String> },
    BadKey,
    InviteOnly { forward: Option<String> },
    Full { forward: Option<String> },
    NeedReggedNick { forward: Option<String> },
    Throttled { forward: Option<String> },
    SplitMode,
}

impl JoinDenial {
    /// The forward-channel target attached to this denial, if any.
    pub fn forward(&self) -> Option<&str> {
        match self {
            Self::Banned { forward }
            | Self::InviteOnly { forward }
            | Self::Full { forward }
            | Self::NeedReggedNick { forward }
            | Self::Throttled { forward } => forward.as_deref(),
            Self::BadKey | Self::SplitMode => None,
        }
    }
}

/// Send classification for a channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendClass {
    /// Sender holds op or voice; all restrictions waived.
    Opv,
    /// Ordinary permitted sender.
    Nonop,
    /// Refused.
    No,
}

/// Decide whether `user` may join `channel`.
///
/// `member_count` is the channel's current membership size; `key` is the
/// key the client supplied with JOIN, if any. Split-mode is the caller's
/// concern since it applies before a channel is even looked up.
#[allow(clippy::too_many_arguments)]
pub fn can_join(
    access: &AccessControl,
    hooks: &HookRegistry,
    channel: &Channel,
    user: &User,
    set: &MatchSet,
    key: Option<&str>,
    member_count: usize,
    now: i64,
) -> Result<(), JoinDenial> {
    let mut verdict = join_verdict(access, channel, user, set, key, member_count, now);
    hooks.can_join(channel, user, &mut verdict);
    verdict
}

fn join_verdict(
    access: &AccessControl,
    channel: &Channel,
    user: &User,
    set: &MatchSet,
    key: Option<&str>,
    member_count: usize,
    now: i64,
) -> Result<(), JoinDenial> {
    // Bans are final; an invite does not override them.
    if let AccessOutcome::Matched { forward } =
        access.evaluate(channel, ListKind::Ban, set, user)
    {
        return Err(JoinDenial::Banned { forward });
    }

    // So is a wrong key.
    if let Some(required) = &channel.modes.key {
        if key != Some(required.as_str()) {
            return Err(JoinDenial::BadKey);
        }
    }

    // The remaining checks are provisional: record the first failure and
    // let a standing invite clear it afterwards.
    let forward = channel.modes.forward.clone();
    let mut provisional = None;

    if channel.modes.invite_only {
        let excepted = matches!(
            access.evaluate(channel, ListKind::InviteExcept, set, user),
            AccessOutcome::Matched { .. }
        );
        if !excepted {
            provisional = Some(JoinDenial::InviteOnly { forward: forward.clone() });
        }
    }

    if provisional.is_none() {
        if let Some(limit) = channel.modes.limit {
            if member_count >= limit as usize {
                provisional = Some(JoinDenial::Full { forward: forward.clone() });
            }
        }
    }

    if provisional.is_none() && channel.modes.registered_only && !user.modes.registered {
        provisional = Some(JoinDenial::NeedReggedNick { forward: forward.clone() });
    }

    if provisional.is_none() && channel.join_throttled(now) {
        provisional = Some(JoinDenial::Throttled { forward });
    }

    if provisional.is_some() && channel.invites.contains(&user.uid) {
        provisional = None;
    }

    provisional.map_or(Ok(()), Err)
}

/// Classify `user` as a sender to `channel`.
///
/// `membership` is the sender's record if they are a member; local member
/// records get their ban cache refreshed as a side effect. `resv` is the
/// server's reserved-channel mask list; `from_server` marks traffic whose
/// origin is a server rather than a user.
#[allow(clippy::too_many_arguments)]
pub fn can_send(
    access: &AccessControl,
    hooks: &HookRegistry,
    channel: &Channel,
    user: &User,
    set: &MatchSet,
    membership: Option<&mut Membership>,
    resv: &[String],
    from_server: bool,
) -> SendClass {
    // Server-originated traffic is never filtered.
    if from_server {
        return SendClass::Opv;
    }

    // Reserved channels refuse local unprivileged senders outright.
    if user.local
        && !user.modes.oper
        && resv.iter().any(|mask| matches_mask(mask, &channel.name))
    {
        return SendClass::No;
    }

    let (is_member, op, voice) = match membership.as_deref() {
        Some(m) => (true, m.op, m.voice),
        None => (false, false, false),
    };

    let mut class = SendClass::Nonop;

    if !is_member && (channel.modes.no_external || channel.modes.moderated) {
        class = SendClass::No;
    }
    if channel.modes.moderated {
        class = SendClass::No;
    }
    if class != SendClass::No && access.muted_cached(channel, membership, set, user) {
        class = SendClass::No;
    }

    // Status upgrade comes last so it defeats moderation and quiets.
    if op || voice {
        class = SendClass::Opv;
    }

    hooks.can_send(channel, user, &mut class);
    class
}
