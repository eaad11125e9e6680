//! KICK: forced removal by a channel operator.

use crate::engine::{depart, destroy, DepartOutcome};
use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{Command, Message};
use tracing::info;

pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::KICK(channel, targets, comment) = &msg.command else {
            return Ok(());
        };
        for nick in helpers::split_targets(targets) {
            if let Err(err) = kick_one(ctx, channel, nick, comment.as_deref()).await {
                ctx.send(err.to_reply(&ctx.mesh.server.name, &ctx.nick)).await;
            }
        }
        Ok(())
    }
}

async fn kick_one(
    ctx: &Context,
    channel: &str,
    target_nick: &str,
    comment: Option<&str>,
) -> Result<(), HandlerError> {
    let lower = tern_proto::irc_to_lower(channel);
    let chan_arc = ctx
        .mesh
        .get_channel(channel)
        .ok_or_else(|| HandlerError::NoSuchChannel(channel.to_string()))?;

    {
        let registry = ctx.mesh.memberships.read();
        let source_id = registry
            .find(&lower, &ctx.uid)
            .ok_or_else(|| HandlerError::NotOnChannel(channel.to_string()))?;
        let is_op = registry.get(source_id).is_some_and(|m| m.op);
        if !is_op {
            return Err(HandlerError::ChanOpPrivsNeeded(channel.to_string()));
        }
    }

    let target_uid = helpers::resolve_nick(&ctx.mesh, target_nick)
        .ok_or_else(|| HandlerError::NoSuchNick(target_nick.to_string()))?;
    if !ctx.mesh.memberships.read().is_member(&lower, &target_uid) {
        return Err(HandlerError::UserNotInChannel {
            nick: target_nick.to_string(),
            channel: channel.to_string(),
        });
    }

    // Policy hooks get a veto with a reason relayed to the kicker.
    {
        let source_arc = ctx.mesh.get_user(&ctx.uid).ok_or(HandlerError::NotRegistered)?;
        let target_arc = ctx
            .mesh
            .get_user(&target_uid)
            .ok_or_else(|| HandlerError::NoSuchNick(target_nick.to_string()))?;
        let source = source_arc.read().await;
        let target = target_arc.read().await;
        let chan = chan_arc.read().await;
        let mut verdict = Ok(());
        ctx.mesh.hooks.can_kick(&chan, &source, &target, &mut verdict);
        if let Err(reason) = verdict {
            ctx.send(
                Message::notice(&ctx.nick, format!("Cannot kick {target_nick}: {reason}"))
                    .with_prefix(tern_proto::Prefix::ServerName(ctx.mesh.server.name.clone())),
            )
            .await;
            return Ok(());
        }
    }

    // Announce while the target is still a member.
    if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
        let kick_msg = Message {
            prefix: Some(prefix),
            command: Command::KICK(
                channel.to_string(),
                target_nick.to_string(),
                Some(comment.unwrap_or(&ctx.nick).to_string()),
            ),
        };
        ctx.mesh.broadcast_to_channel(&lower, kick_msg, None).await;
    }

    let permanent = chan_arc.read().await.modes.permanent;
    let outcome = {
        let mut registry = ctx.mesh.memberships.write();
        depart(&mut registry, &lower, &target_uid, permanent)
    };
    match outcome {
        DepartOutcome::NotMember => {}
        DepartOutcome::Removed(_) => {
            ctx.mesh.hooks.member_removed(&lower, &target_uid);
        }
        DepartOutcome::Empty(_, proof) => {
            ctx.mesh.hooks.member_removed(&lower, &target_uid);
            {
                let mut chan = chan_arc.write().await;
                destroy(&mut chan, proof);
            }
            ctx.mesh.remove_channel(channel);
            ctx.mesh.hooks.channel_destroyed(&lower);
        }
    }
    info!(channel, target = target_nick, by = %ctx.nick, "user kicked");
    Ok(())
}
