//! INVITE: standing invites.
//!
//! An invite is recorded on both the channel and the invited user, so
//! either side can revoke it; it is consumed by the next successful join.

use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{Command, Message, Response};
use tracing::debug;

pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::INVITE(target_nick, channel) = &msg.command else {
            return Ok(());
        };
        let lower = tern_proto::irc_to_lower(channel);
        let chan_arc = ctx
            .mesh
            .get_channel(channel)
            .ok_or_else(|| HandlerError::NoSuchChannel(channel.to_string()))?;

        let source_op = {
            let registry = ctx.mesh.memberships.read();
            registry
                .find(&lower, &ctx.uid)
                .and_then(|id| registry.get(id).map(|m| m.op))
        };
        let source_op =
            source_op.ok_or_else(|| HandlerError::NotOnChannel(channel.to_string()))?;

        // Anyone may invite to an open channel; an invite that actually
        // unlocks +i takes an operator.
        if chan_arc.read().await.modes.invite_only && !source_op {
            return Err(HandlerError::ChanOpPrivsNeeded(channel.to_string()));
        }

        let target_uid = helpers::resolve_nick(&ctx.mesh, target_nick)
            .ok_or_else(|| HandlerError::NoSuchNick(target_nick.to_string()))?;
        if ctx.mesh.memberships.read().is_member(&lower, &target_uid) {
            return Err(HandlerError::UserOnChannel {
                nick: target_nick.to_string(),
                channel: channel.to_string(),
            });
        }

        chan_arc.write().await.invites.insert(target_uid.clone());
        if let Some(target_arc) = ctx.mesh.get_user(&target_uid) {
            target_arc.write().await.invites.insert(lower.clone());
        }
        debug!(channel, target = target_nick, by = %ctx.nick, "standing invite recorded");

        ctx.reply(
            Response::RPL_INVITING,
            vec![target_nick.clone(), channel.clone()],
        )
        .await;

        if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
            let invite_msg = Message {
                prefix: Some(prefix),
                command: Command::INVITE(target_nick.clone(), channel.clone()),
            };
            ctx.mesh.send_to_user(&target_uid, invite_msg).await;
        }
        Ok(())
    }
}
