//! JOIN: admission, channel creation, and denial forwarding.

use crate::engine::{can_join, JoinDenial, MatchSet};
use crate::error::HandlerError;
use crate::handlers::{channel, helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{ChannelExt, Command, Message, Response};
use tracing::{debug, info};

pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::JOIN(channels, keys) = &msg.command else {
            return Ok(());
        };

        // JOIN 0 parts every channel.
        if channels == "0" {
            let names: Vec<String> = {
                let registry = ctx.mesh.memberships.read();
                registry
                    .channels_of(&ctx.uid)
                    .iter()
                    .filter_map(|id| registry.get(*id))
                    .map(|m| m.channel.clone())
                    .collect()
            };
            for name in names {
                channel::part::part_one(ctx, &name, None).await?;
            }
            return Ok(());
        }

        let keys: Vec<&str> = keys
            .as_deref()
            .map(|k| k.split(',').collect())
            .unwrap_or_default();

        for (i, name) in helpers::split_targets(channels).enumerate() {
            let key = keys.get(i).copied().filter(|k| !k.is_empty());
            if let Err(err) = join_one(ctx, name, key).await {
                ctx.send(err.to_reply(&ctx.mesh.server.name, &ctx.nick)).await;
            }
        }
        Ok(())
    }
}

async fn join_one(ctx: &Context, name: &str, key: Option<&str>) -> Result<(), HandlerError> {
    let mut target = name.to_string();
    let mut forwarded = false;

    loop {
        if !target.is_channel_name() {
            return Err(HandlerError::NoSuchChannel(target));
        }
        let lower = tern_proto::irc_to_lower(&target);

        if ctx.mesh.split.blocks_join() {
            send_denial(ctx, &target, &JoinDenial::SplitMode).await;
            return Ok(());
        }
        if ctx.mesh.memberships.read().is_member(&lower, &ctx.uid) {
            return Ok(());
        }

        let now = helpers::now_ts();
        let (chan_arc, created) = match ctx.mesh.get_channel(&target) {
            Some(chan) => (chan, false),
            None => {
                if ctx.mesh.split.blocks_create() {
                    unavailable(ctx, &target, "Channel creation is temporarily disabled (split-mode)")
                        .await;
                    return Ok(());
                }
                ctx.mesh.get_or_create_channel(&target, now)
            }
        };

        // The creator skips admission; there is nothing to check against
        // on a channel that did not exist a moment ago.
        if !created {
            let user_arc = ctx
                .mesh
                .get_user(&ctx.uid)
                .ok_or(HandlerError::NotRegistered)?;
            let user = user_arc.read().await;
            let set = MatchSet::for_user(&user);
            let count = ctx.mesh.memberships.read().member_count(&lower);
            let chan = chan_arc.read().await;
            let verdict = can_join(
                &ctx.mesh.access,
                &ctx.mesh.hooks,
                &chan,
                &user,
                &set,
                key,
                count,
                now,
            );
            drop(chan);
            drop(user);

            if let Err(denial) = verdict {
                // One forwarding hop at most; the second target's verdict
                // is final.
                if !forwarded {
                    if let Some(next) = denial.forward() {
                        let next = next.to_string();
                        debug!(channel = %target, forward = %next, "forwarding denied join");
                        ctx.reply(
                            Response::RPL_LINKCHANNEL,
                            vec![
                                target.clone(),
                                next.clone(),
                                "Forwarding to another channel".to_string(),
                            ],
                        )
                        .await;
                        target = next;
                        forwarded = true;
                        continue;
                    }
                }
                send_denial(ctx, &target, &denial).await;
                return Ok(());
            }
        }

        complete_join(ctx, &target, &lower, created, now).await;
        return Ok(());
    }
}

async fn complete_join(ctx: &Context, name: &str, lower: &str, created: bool, now: i64) {
    let Some(chan_arc) = ctx.mesh.get_channel(name) else {
        return;
    };
    {
        let mut chan = chan_arc.write().await;
        if created {
            chan.modes.no_external = true;
            chan.modes.topic_lock = true;
        }
        chan.note_join(now);
        chan.invites.remove(&ctx.uid);
    }
    if let Some(user_arc) = ctx.mesh.get_user(&ctx.uid) {
        user_arc.write().await.invites.remove(lower);
    }

    {
        let mut registry = ctx.mesh.memberships.write();
        if let Some(id) = registry.insert(lower, &ctx.uid, true) {
            if created {
                if let Some(membership) = registry.get_mut(id) {
                    membership.op = true;
                }
            }
        }
    }
    ctx.mesh.hooks.member_added(lower, &ctx.uid);
    info!(channel = name, uid = %ctx.uid, created, "user joined channel");

    if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
        let join_msg = Message {
            prefix: Some(prefix),
            command: Command::JOIN(name.to_string(), None),
        };
        ctx.mesh.broadcast_to_channel(lower, join_msg, None).await;
    }

    let topic = chan_arc.read().await.topic.clone();
    if let Some(topic) = topic {
        ctx.reply(Response::RPL_TOPIC, vec![name.to_string(), topic.text]).await;
        ctx.reply(
            Response::RPL_TOPICWHOTIME,
            vec![name.to_string(), topic.set_by, topic.set_at.to_string()],
        )
        .await;
    }
    channel::names::send_names(ctx, name).await;
}

async fn unavailable(ctx: &Context, channel: &str, text: &str) {
    ctx.reply(
        Response::ERR_UNAVAILRESOURCE,
        vec![channel.to_string(), text.to_string()],
    )
    .await;
}

async fn send_denial(ctx: &Context, channel: &str, denial: &JoinDenial) {
    let chan = channel.to_string();
    let (response, text) = match denial {
        JoinDenial::Banned { .. } => {
            (Response::ERR_BANNEDFROMCHAN, "Cannot join channel (+b)")
        }
        JoinDenial::BadKey => (Response::ERR_BADCHANNELKEY, "Cannot join channel (+k)"),
        JoinDenial::InviteOnly { .. } => {
            (Response::ERR_INVITEONLYCHAN, "Cannot join channel (+i)")
        }
        JoinDenial::Full { .. } => (Response::ERR_CHANNELISFULL, "Cannot join channel (+l)"),
        JoinDenial::NeedReggedNick { .. } => (
            Response::ERR_NEEDREGGEDNICK,
            "Cannot join channel (+r): you need to be identified with services",
        ),
        JoinDenial::Throttled { .. } => (
            Response::ERR_UNAVAILRESOURCE,
            "Channel is temporarily unavailable (+j)",
        ),
        JoinDenial::SplitMode => (
            Response::ERR_UNAVAILRESOURCE,
            "Channel is temporarily unavailable (split-mode)",
        ),
    };
    ctx.reply(response, vec![chan, text.to_string()]).await;
}
