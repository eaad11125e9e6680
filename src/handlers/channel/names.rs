//! NAMES replies.

use crate::batch::{names_lines, NamesEntry, NamesOptions};
use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use async_trait::async_trait;
use tern_proto::{Command, Message, Response};

pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        match &msg.command {
            Command::NAMES(Some(channels)) => {
                for name in helpers::split_targets(channels) {
                    send_names(ctx, name).await;
                }
            }
            Command::NAMES(None) => {
                // Listing every visible channel's members is not offered;
                // just terminate the query.
                end_of_names(ctx, "*").await;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Emit the full 353/366 sequence for one channel. Also runs after a
/// successful join.
pub(crate) async fn send_names(ctx: &Context, name: &str) {
    let lower = tern_proto::irc_to_lower(name);
    let shares = ctx.mesh.memberships.read().is_member(&lower, &ctx.uid);

    let Some(chan_arc) = ctx.mesh.get_channel(name) else {
        end_of_names(ctx, name).await;
        return;
    };
    let secret = chan_arc.read().await.modes.secret;
    if secret && !shares {
        end_of_names(ctx, name).await;
        return;
    }
    let symbol = if secret { '@' } else { '=' };

    let member_info: Vec<(String, String)> = {
        let registry = ctx.mesh.memberships.read();
        registry
            .members(&lower)
            .iter()
            .filter_map(|id| registry.get(*id))
            .map(|m| (m.uid.clone(), m.prefix_chars()))
            .collect()
    };

    let mut entries = Vec::with_capacity(member_info.len());
    for (uid, prefixes) in member_info {
        if let Some(user_arc) = ctx.mesh.get_user(&uid) {
            let user = user_arc.read().await;
            entries.push(NamesEntry {
                nick: user.nick.clone(),
                userhost: format!("{}@{}", user.user, user.host),
                prefixes,
                invisible: user.modes.invisible,
            });
        }
    }

    let opts = {
        match ctx.mesh.get_user(&ctx.uid) {
            Some(viewer_arc) => {
                let viewer = viewer_arc.read().await;
                NamesOptions {
                    multi_prefix: viewer.caps.contains("multi-prefix"),
                    userhost_in_names: viewer.caps.contains("userhost-in-names"),
                    shares_channel: shares,
                }
            }
            None => NamesOptions { shares_channel: shares, ..Default::default() },
        }
    };

    for line in names_lines(&ctx.mesh.server.name, &ctx.nick, symbol, name, &entries, opts) {
        if let Ok(reply) = line.parse::<Message>() {
            ctx.send(reply).await;
        }
    }
    end_of_names(ctx, name).await;
}

async fn end_of_names(ctx: &Context, target: &str) {
    ctx.reply(
        Response::RPL_ENDOFNAMES,
        vec![target.to_string(), "End of /NAMES list".to_string()],
    )
    .await;
}
