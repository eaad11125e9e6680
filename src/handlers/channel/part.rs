//! PART and the shared departure path.

use crate::engine::{depart, destroy, DepartOutcome};
use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{Command, Message};
use tracing::info;

pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::PART(channels, reason) = &msg.command else {
            return Ok(());
        };
        for name in helpers::split_targets(channels) {
            if let Err(err) = part_one(ctx, name, reason.as_deref()).await {
                ctx.send(err.to_reply(&ctx.mesh.server.name, &ctx.nick)).await;
            }
        }
        Ok(())
    }
}

/// Remove the client from one channel: announce, depart, and destroy the
/// channel if it emptied out. Also used by JOIN 0 and the quit path.
pub(crate) async fn part_one(
    ctx: &Context,
    name: &str,
    reason: Option<&str>,
) -> Result<(), HandlerError> {
    let lower = tern_proto::irc_to_lower(name);
    let chan_arc = ctx
        .mesh
        .get_channel(name)
        .ok_or_else(|| HandlerError::NoSuchChannel(name.to_string()))?;
    if !ctx.mesh.memberships.read().is_member(&lower, &ctx.uid) {
        return Err(HandlerError::NotOnChannel(name.to_string()));
    }

    // Announce while the leaver is still a member so they see their own
    // PART echoed.
    if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
        let part_msg = Message {
            prefix: Some(prefix),
            command: Command::PART(name.to_string(), reason.map(str::to_string)),
        };
        ctx.mesh.broadcast_to_channel(&lower, part_msg, None).await;
    }

    let permanent = chan_arc.read().await.modes.permanent;
    let outcome = {
        let mut registry = ctx.mesh.memberships.write();
        depart(&mut registry, &lower, &ctx.uid, permanent)
    };
    match outcome {
        DepartOutcome::NotMember => return Err(HandlerError::NotOnChannel(name.to_string())),
        DepartOutcome::Removed(_) => {
            ctx.mesh.hooks.member_removed(&lower, &ctx.uid);
        }
        DepartOutcome::Empty(_, proof) => {
            ctx.mesh.hooks.member_removed(&lower, &ctx.uid);
            {
                let mut chan = chan_arc.write().await;
                destroy(&mut chan, proof);
            }
            ctx.mesh.remove_channel(name);
            ctx.mesh.hooks.channel_destroyed(&lower);
            info!(channel = name, "channel destroyed");
        }
    }
    Ok(())
}
