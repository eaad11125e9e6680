//! Channel MODE: flag changes, parameterized modes, ban-family list
//! edits and queries, and member status grants.
//!
//! Accepted changes are packed with [`ModeLineBatcher`] and re-broadcast
//! to the channel, so a long edit never produces an oversized line.

use crate::batch::{ModeChange, ModeLineBatcher};
use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use crate::state::{BanEntry, Channel, JoinThrottle, ListKind};
use async_trait::async_trait;
use tern_proto::{ChannelExt, Command, Message, Response};
use tracing::debug;

pub struct ModeHandler;

/// One parsed request item from a MODE argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModeOp {
    Flag(char, bool),
    Key(bool, Option<String>),
    Limit(bool, Option<u32>),
    Throttle(bool, Option<JoinThrottle>),
    Forward(bool, Option<String>),
    /// A list edit, or a list query when the mask is absent.
    List(ListKind, bool, Option<String>),
    /// `+o`/`+v` grants; the argument is a nick.
    Member(char, bool, String),
}

/// Parse a modestring plus its parameters into typed operations.
/// Unknown letters and missing required parameters are dropped.
pub(crate) fn parse_mode_args(args: &[String]) -> Vec<ModeOp> {
    let Some(modestring) = args.first() else {
        return Vec::new();
    };
    let mut params = args[1..].iter();
    let mut add = true;
    let mut ops = Vec::new();

    for letter in modestring.chars() {
        match letter {
            '+' => add = true,
            '-' => add = false,
            'i' | 'm' | 'n' | 's' | 't' | 'r' | 'P' => ops.push(ModeOp::Flag(letter, add)),
            'k' => ops.push(ModeOp::Key(add, params.next().cloned())),
            'l' => {
                let arg = if add { params.next() } else { None };
                ops.push(ModeOp::Limit(add, arg.and_then(|a| a.parse().ok())));
            }
            'j' => {
                let arg = if add { params.next() } else { None };
                ops.push(ModeOp::Throttle(add, arg.and_then(|a| parse_throttle(a))));
            }
            'f' => {
                let arg = if add { params.next() } else { None };
                ops.push(ModeOp::Forward(add, arg.cloned()));
            }
            'o' | 'v' => {
                if let Some(nick) = params.next() {
                    ops.push(ModeOp::Member(letter, add, nick.clone()));
                }
            }
            _ => {
                if let Some(kind) = ListKind::from_letter(letter) {
                    ops.push(ModeOp::List(kind, add, params.next().cloned()));
                }
            }
        }
    }
    ops
}

fn parse_throttle(arg: &str) -> Option<JoinThrottle> {
    let (count, secs) = arg.split_once(':')?;
    Some(JoinThrottle {
        count: count.parse().ok()?,
        window_secs: secs.parse().ok()?,
    })
}

/// Split a ban mask carrying a `$#channel` forward suffix.
fn split_forward(mask: &str) -> (String, Option<String>) {
    match mask.split_once('$') {
        Some((m, fwd)) if fwd.is_channel_name() => (m.to_string(), Some(fwd.to_string())),
        _ => (mask.to_string(), None),
    }
}

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::MODE(target, args) = &msg.command else {
            return Ok(());
        };
        // User modes are out of this handler's scope.
        if !target.is_channel_name() {
            return Ok(());
        }
        let lower = tern_proto::irc_to_lower(target);
        let chan_arc = ctx
            .mesh
            .get_channel(target)
            .ok_or_else(|| HandlerError::NoSuchChannel(target.to_string()))?;

        if args.is_empty() {
            let chan = chan_arc.read().await;
            ctx.reply(
                Response::RPL_CHANNELMODEIS,
                mode_is_args(target, &chan),
            )
            .await;
            ctx.reply(
                Response::RPL_CREATIONTIME,
                vec![target.clone(), chan.created.to_string()],
            )
            .await;
            return Ok(());
        }

        let ops = parse_mode_args(args);
        let is_op = {
            let registry = ctx.mesh.memberships.read();
            registry
                .find(&lower, &ctx.uid)
                .and_then(|id| registry.get(id))
                .is_some_and(|m| m.op)
        };

        // Pure list queries come first; they need no privileges beyond
        // what each list demands.
        let mut changes_requested = false;
        for op in &ops {
            match op {
                ModeOp::List(kind, true, None) => {
                    send_list(ctx, target, &chan_arc, *kind, is_op).await;
                }
                ModeOp::List(_, false, None) => {}
                _ => changes_requested = true,
            }
        }
        if !changes_requested {
            return Ok(());
        }
        if !is_op {
            return Err(HandlerError::ChanOpPrivsNeeded(target.to_string()));
        }

        let is_oper = match ctx.mesh.get_user(&ctx.uid) {
            Some(user) => user.read().await.modes.oper,
            None => false,
        };
        let set_by = match ctx.mesh.get_user(&ctx.uid) {
            Some(user) => user.read().await.hostmask(),
            None => ctx.nick.clone(),
        };
        let now = helpers::now_ts();
        let max_list = ctx.mesh.config.channel.max_list_size;

        let mut applied = Vec::new();
        {
            let mut chan = chan_arc.write().await;
            for op in ops {
                match op {
                    ModeOp::Flag('P', add) => {
                        // Permanence is a network-operator decision.
                        if is_oper && chan.modes.permanent != add {
                            chan.modes.permanent = add;
                            applied.push(ModeChange::flag('P', add));
                        }
                    }
                    ModeOp::Flag(letter, add) => {
                        if apply_flag(&mut chan, letter, add) {
                            applied.push(ModeChange::flag(letter, add));
                        }
                    }
                    ModeOp::Key(true, Some(key)) if !key.is_empty() => {
                        chan.modes.key = Some(key.clone());
                        applied.push(ModeChange::with_arg('k', true, key));
                    }
                    ModeOp::Key(false, _) => {
                        if chan.modes.key.take().is_some() {
                            applied.push(ModeChange::with_arg('k', false, "*"));
                        }
                    }
                    ModeOp::Key(..) => {}
                    ModeOp::Limit(true, Some(limit)) => {
                        chan.modes.limit = Some(limit);
                        applied.push(ModeChange::with_arg('l', true, limit.to_string()));
                    }
                    ModeOp::Limit(false, _) => {
                        if chan.modes.limit.take().is_some() {
                            applied.push(ModeChange::flag('l', false));
                        }
                    }
                    ModeOp::Limit(..) => {}
                    ModeOp::Throttle(true, Some(throttle)) => {
                        chan.modes.throttle = Some(throttle);
                        applied.push(ModeChange::with_arg(
                            'j',
                            true,
                            format!("{}:{}", throttle.count, throttle.window_secs),
                        ));
                    }
                    ModeOp::Throttle(false, _) => {
                        if chan.modes.throttle.take().is_some() {
                            applied.push(ModeChange::flag('j', false));
                        }
                    }
                    ModeOp::Throttle(..) => {}
                    ModeOp::Forward(true, Some(fwd)) if fwd.is_channel_name() => {
                        chan.modes.forward = Some(fwd.clone());
                        applied.push(ModeChange::with_arg('f', true, fwd));
                    }
                    ModeOp::Forward(false, _) => {
                        if chan.modes.forward.take().is_some() {
                            applied.push(ModeChange::flag('f', false));
                        }
                    }
                    ModeOp::Forward(..) => {}
                    ModeOp::List(kind, true, Some(mask)) => {
                        if chan.list(kind).len() >= max_list {
                            ctx.reply(
                                Response::ERR_BANLISTFULL,
                                vec![
                                    target.clone(),
                                    mask.clone(),
                                    "Channel list is full".to_string(),
                                ],
                            )
                            .await;
                            continue;
                        }
                        let (bare, forward) = split_forward(&mask);
                        let entry = BanEntry {
                            mask: bare,
                            set_by: set_by.clone(),
                            set_at: now,
                            forward,
                        };
                        if chan.add_list_entry(kind, entry, max_list) {
                            applied.push(ModeChange::with_arg(kind.letter(), true, mask));
                        }
                    }
                    ModeOp::List(kind, false, Some(mask)) => {
                        let (bare, _) = split_forward(&mask);
                        if chan.remove_list_entry(kind, &bare).is_some() {
                            applied.push(ModeChange::with_arg(kind.letter(), false, mask));
                        }
                    }
                    ModeOp::List(..) => {}
                    ModeOp::Member(letter, add, nick) => {
                        match set_member_status(ctx, &lower, &nick, letter, add) {
                            Ok(true) => {
                                applied.push(ModeChange::with_arg(letter, add, nick));
                            }
                            Ok(false) => {}
                            Err(err) => {
                                ctx.send(err.to_reply(&ctx.mesh.server.name, &ctx.nick))
                                    .await;
                            }
                        }
                    }
                }
            }
        }

        if applied.is_empty() {
            return Ok(());
        }
        debug!(channel = %target, changes = applied.len(), "applying mode changes");

        let prefix = format!(":{set_by} MODE {target} ");
        let mut batcher =
            ModeLineBatcher::new(prefix, ctx.mesh.config.channel.max_modes_per_line);
        for change in applied {
            batcher.push(change);
        }
        for line in batcher.finish() {
            if let Ok(mode_msg) = line.parse::<Message>() {
                ctx.mesh.broadcast_to_channel(&lower, mode_msg, None).await;
            }
        }
        Ok(())
    }
}

pub(crate) fn apply_flag(chan: &mut Channel, letter: char, add: bool) -> bool {
    let slot = match letter {
        'i' => &mut chan.modes.invite_only,
        'm' => &mut chan.modes.moderated,
        'n' => &mut chan.modes.no_external,
        's' => &mut chan.modes.secret,
        't' => &mut chan.modes.topic_lock,
        'r' => &mut chan.modes.registered_only,
        _ => return false,
    };
    if *slot == add {
        return false;
    }
    *slot = add;
    true
}

fn set_member_status(
    ctx: &Context,
    lower: &str,
    nick: &str,
    letter: char,
    add: bool,
) -> Result<bool, HandlerError> {
    let uid = helpers::resolve_nick(&ctx.mesh, nick)
        .ok_or_else(|| HandlerError::NoSuchNick(nick.to_string()))?;
    let mut registry = ctx.mesh.memberships.write();
    let id = registry.find(lower, &uid).ok_or_else(|| HandlerError::UserNotInChannel {
        nick: nick.to_string(),
        channel: lower.to_string(),
    })?;
    let Some(membership) = registry.get_mut(id) else {
        return Ok(false);
    };
    let slot = if letter == 'o' { &mut membership.op } else { &mut membership.voice };
    if *slot == add {
        return Ok(false);
    }
    *slot = add;
    Ok(true)
}

fn mode_is_args(target: &str, chan: &Channel) -> Vec<String> {
    let mode_string = chan.modes.as_mode_string();
    let mut args = vec![target.to_string()];
    args.extend(mode_string.split(' ').map(str::to_string));
    args
}

async fn send_list(
    ctx: &Context,
    target: &str,
    chan_arc: &std::sync::Arc<tokio::sync::RwLock<Channel>>,
    kind: ListKind,
    is_op: bool,
) {
    // Exception and invite-exception lists are operator-only; bans and
    // quiets are public.
    if matches!(kind, ListKind::Except | ListKind::InviteExcept) && !is_op {
        ctx.send(
            HandlerError::ChanOpPrivsNeeded(target.to_string())
                .to_reply(&ctx.mesh.server.name, &ctx.nick),
        )
        .await;
        return;
    }

    let (item, end, end_text) = match kind {
        ListKind::Ban => (
            Response::RPL_BANLIST,
            Response::RPL_ENDOFBANLIST,
            "End of Channel Ban List",
        ),
        ListKind::Except => (
            Response::RPL_EXCEPTLIST,
            Response::RPL_ENDOFEXCEPTLIST,
            "End of Channel Exception List",
        ),
        ListKind::InviteExcept => (
            Response::RPL_INVEXLIST,
            Response::RPL_ENDOFINVEXLIST,
            "End of Channel Invite Exception List",
        ),
        ListKind::Quiet => (
            Response::RPL_QUIETLIST,
            Response::RPL_ENDOFQUIETLIST,
            "End of Channel Quiet List",
        ),
    };

    let entries: Vec<BanEntry> = chan_arc.read().await.list(kind).to_vec();
    for entry in entries {
        let mut display = entry.mask.clone();
        if let Some(fwd) = &entry.forward {
            display.push('$');
            display.push_str(fwd);
        }
        let mut args = vec![target.to_string()];
        // The quiet numerics carry the list letter.
        if kind == ListKind::Quiet {
            args.push("q".to_string());
        }
        args.extend([display, entry.set_by, entry.set_at.to_string()]);
        ctx.reply(item, args).await;
    }
    ctx.reply(end, vec![target.to_string(), end_text.to_string()]).await;
}
