//! PRIVMSG and NOTICE relay.
//!
//! Channel traffic goes through send classification and then the flood
//! governor. NOTICE follows the same checks but never generates replies,
//! per the no-auto-response rule.

use crate::engine::{can_send, flood_tick, FloodVerdict, MatchSet, SendClass};
use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{ChannelExt, Command, Message, Prefix};
use tracing::warn;

pub struct MessageHandler;

#[async_trait]
impl Handler for MessageHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let (target, text, is_notice) = match &msg.command {
            Command::PRIVMSG(target, text) => (target, text, false),
            Command::NOTICE(target, text) => (target, text, true),
            _ => return Ok(()),
        };

        let result = if target.is_channel_name() {
            to_channel(ctx, target, text, is_notice).await
        } else {
            to_user(ctx, target, text, is_notice).await
        };
        // A NOTICE never elicits an error reply.
        match result {
            Err(_) if is_notice => Ok(()),
            other => other,
        }
    }
}

async fn to_channel(
    ctx: &Context,
    target: &str,
    text: &str,
    is_notice: bool,
) -> Result<(), HandlerError> {
    if text.is_empty() {
        return Err(HandlerError::NoTextToSend);
    }
    let lower = tern_proto::irc_to_lower(target);
    let chan_arc = ctx
        .mesh
        .get_channel(target)
        .ok_or_else(|| HandlerError::NoSuchChannel(target.to_string()))?;
    let user_arc = ctx.mesh.get_user(&ctx.uid).ok_or(HandlerError::NotRegistered)?;

    let class = {
        let user = user_arc.read().await;
        let set = MatchSet::for_user(&user);
        let chan = chan_arc.read().await;
        let mut registry = ctx.mesh.memberships.write();
        let membership = registry
            .find(&lower, &ctx.uid)
            .and_then(|id| registry.get_mut(id));
        can_send(
            &ctx.mesh.access,
            &ctx.mesh.hooks,
            &chan,
            &user,
            &set,
            membership,
            &ctx.mesh.config.channel.resv,
            false,
        )
    };
    if class == SendClass::No {
        return Err(HandlerError::CannotSendToChan(target.to_string()));
    }

    // Admitted senders feed the flood counter regardless of status.
    let verdict = {
        let mut chan = chan_arc.write().await;
        flood_tick(&mut chan.flood, &ctx.mesh.config.flood, helpers::now_ts())
    };
    match verdict {
        FloodVerdict::Allow => {}
        FloodVerdict::Flooding { first } => {
            if first {
                warn!(channel = %target, "channel flood threshold crossed");
                notify_ops(ctx, target, &lower).await;
            }
            if !is_notice {
                let note = Message::notice(
                    &ctx.nick,
                    format!("Your message to {target} was dropped (channel flood)"),
                )
                .with_prefix(Prefix::ServerName(ctx.mesh.server.name.clone()));
                ctx.send(note).await;
            }
            return Ok(());
        }
    }

    if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
        let command = if is_notice {
            Command::NOTICE(target.to_string(), text.to_string())
        } else {
            Command::PRIVMSG(target.to_string(), text.to_string())
        };
        let relay = Message { prefix: Some(prefix), command };
        ctx.mesh
            .broadcast_to_channel(&lower, relay, Some(&ctx.uid))
            .await;
    }
    Ok(())
}

async fn to_user(
    ctx: &Context,
    target: &str,
    text: &str,
    is_notice: bool,
) -> Result<(), HandlerError> {
    if text.is_empty() {
        return Err(HandlerError::NoTextToSend);
    }
    let target_uid = helpers::resolve_nick(&ctx.mesh, target)
        .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;

    if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
        let command = if is_notice {
            Command::NOTICE(target.to_string(), text.to_string())
        } else {
            Command::PRIVMSG(target.to_string(), text.to_string())
        };
        ctx.mesh
            .send_to_user(&target_uid, Message { prefix: Some(prefix), command })
            .await;
    }
    Ok(())
}

/// One-shot operator notice when a channel starts flooding.
async fn notify_ops(ctx: &Context, target: &str, lower: &str) {
    let ops: Vec<String> = {
        let registry = ctx.mesh.memberships.read();
        registry
            .local_members(lower)
            .iter()
            .filter_map(|id| registry.get(*id))
            .filter(|m| m.op)
            .map(|m| m.uid.clone())
            .collect()
    };
    for uid in ops {
        let nick = match ctx.mesh.get_user(&uid) {
            Some(user) => user.read().await.nick.clone(),
            None => continue,
        };
        let note = Message::notice(
            &nick,
            format!("Flood detected on {target}; messages are being dropped"),
        )
        .with_prefix(Prefix::ServerName(ctx.mesh.server.name.clone()));
        ctx.mesh.send_to_user(&uid, note).await;
    }
}
