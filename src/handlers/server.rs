//! Server-to-server mode sync: TMODE and BMASK.
//!
//! Both carry the originating side's channel timestamp. A claim whose
//! timestamp is newer than ours describes a younger channel and loses;
//! it is dropped without effect. Claims at or before our timestamp apply.

use crate::batch::{ModeChange, ModeLineBatcher};
use crate::error::HandlerError;
use crate::handlers::mode::{parse_mode_args, ModeOp};
use crate::handlers::{helpers, Context, Handler};
use crate::state::BanEntry;
use async_trait::async_trait;
use tern_proto::{Command, Message, Prefix};
use tracing::debug;

pub struct TmodeHandler;

#[async_trait]
impl Handler for TmodeHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::TMODE(ts, channel, args) = &msg.command else {
            return Ok(());
        };
        let Some(Prefix::ServerName(source)) = &msg.prefix else {
            // Only servers speak TMODE.
            return Ok(());
        };
        let lower = tern_proto::irc_to_lower(channel);
        let Some(chan_arc) = ctx.mesh.get_channel(channel) else {
            return Ok(());
        };

        let mut applied = Vec::new();
        {
            let mut chan = chan_arc.write().await;
            if *ts > chan.created {
                debug!(channel = %channel, ts, ours = chan.created, "dropping stale TMODE");
                return Ok(());
            }
            let max_list = ctx.mesh.config.channel.max_list_size;
            let now = helpers::now_ts();

            for op in parse_mode_args(args) {
                match op {
                    ModeOp::Flag(letter, add) => {
                        let ok = match letter {
                            'P' => {
                                let changed = chan.modes.permanent != add;
                                chan.modes.permanent = add;
                                changed
                            }
                            _ => super::mode::apply_flag(&mut chan, letter, add),
                        };
                        if ok {
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
                    ModeOp::Limit(true, Some(limit)) => {
                        chan.modes.limit = Some(limit);
                        applied.push(ModeChange::with_arg('l', true, limit.to_string()));
                    }
                    ModeOp::Limit(false, _) => {
                        if chan.modes.limit.take().is_some() {
                            applied.push(ModeChange::flag('l', false));
                        }
                    }
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
                    ModeOp::Forward(true, Some(fwd)) => {
                        chan.modes.forward = Some(fwd.clone());
                        applied.push(ModeChange::with_arg('f', true, fwd));
                    }
                    ModeOp::Forward(false, _) => {
                        if chan.modes.forward.take().is_some() {
                            applied.push(ModeChange::flag('f', false));
                        }
                    }
                    ModeOp::List(kind, true, Some(mask)) => {
                        let entry = BanEntry {
                            mask: mask.clone(),
                            set_by: source.clone(),
                            set_at: now,
                            forward: None,
                        };
                        if chan.add_list_entry(kind, entry, max_list) {
                            applied.push(ModeChange::with_arg(kind.letter(), true, mask));
                        }
                    }
                    ModeOp::List(kind, false, Some(mask)) => {
                        if chan.remove_list_entry(kind, &mask).is_some() {
                            applied.push(ModeChange::with_arg(kind.letter(), false, mask));
                        }
                    }
                    ModeOp::Member(letter, add, uid) => {
                        let mut registry = ctx.mesh.memberships.write();
                        if let Some(id) = registry.find(&lower, &uid) {
                            if let Some(membership) = registry.get_mut(id) {
                                let slot = if letter == 'o' {
                                    &mut membership.op
                                } else {
                                    &mut membership.voice
                                };
                                if *slot != add {
                                    *slot = add;
                                    applied.push(ModeChange::with_arg(letter, add, uid));
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if applied.is_empty() {
            return Ok(());
        }
        let prefix = format!(":{source} MODE {channel} ");
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

pub struct BmaskHandler;

#[async_trait]
impl Handler for BmaskHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::BMASK(ts, channel, letter, masks) = &msg.command else {
            return Ok(());
        };
        let Some(Prefix::ServerName(source)) = &msg.prefix else {
            return Ok(());
        };
        let Some(kind) = crate::state::ListKind::from_letter(*letter) else {
            return Ok(());
        };
        let Some(chan_arc) = ctx.mesh.get_channel(channel) else {
            return Ok(());
        };

        let mut chan = chan_arc.write().await;
        if *ts > chan.created {
            debug!(channel = %channel, ts, ours = chan.created, "dropping stale BMASK");
            return Ok(());
        }
        let max_list = ctx.mesh.config.channel.max_list_size;
        let now = helpers::now_ts();
        let mut accepted = 0usize;
        for mask in masks.split_whitespace() {
            let entry = BanEntry {
                mask: mask.to_string(),
                set_by: source.clone(),
                set_at: now,
                forward: None,
            };
            if chan.add_list_entry(kind, entry, max_list) {
                accepted += 1;
            }
        }
        debug!(channel = %channel, list = %letter, accepted, "merged BMASK burst");
        Ok(())
    }
}
