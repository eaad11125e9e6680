//! Command handlers.
//!
//! Each command is a unit struct implementing [`Handler`]; [`dispatch`]
//! routes a parsed message to it and turns any [`HandlerError`] into its
//! numeric reply. Registration commands (NICK/USER/QUIT) are handled by
//! the connection itself before messages reach this layer.

pub mod channel;
pub mod helpers;
pub mod messaging;
pub mod mode;
pub mod server;

use crate::error::HandlerError;
use crate::state::{Mesh, Uid};
use async_trait::async_trait;
use std::sync::Arc;
use tern_proto::{Command, Message, Prefix, Response};
use tracing::debug;

/// Per-message handler context: the shared mesh plus the originating
/// client's identity.
pub struct Context {
    pub mesh: Arc<Mesh>,
    pub uid: Uid,
    pub nick: String,
}

impl Context {
    pub fn new(mesh: Arc<Mesh>, uid: Uid, nick: String) -> Self {
        Self { mesh, uid, nick }
    }

    /// Queue a message to the originating client.
    pub async fn send(&self, message: Message) {
        self.mesh.send_to_user(&self.uid, message).await;
    }

    /// Queue a numeric reply, addressed to the client's nick.
    pub async fn reply(&self, response: Response, args: Vec<String>) {
        let mut full_args = vec![self.nick.clone()];
        full_args.extend(args);
        self.send(Message {
            prefix: Some(Prefix::ServerName(self.mesh.server.name.clone())),
            command: Command::Response(response, full_args),
        })
        .await;
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError>;
}

/// Route one registered-client message to its handler and report errors as
/// numerics.
pub async fn dispatch(ctx: &Context, msg: Message) {
    let result = match &msg.command {
        Command::JOIN(..) => channel::join::JoinHandler.handle(ctx, &msg).await,
        Command::PART(..) => channel::part::PartHandler.handle(ctx, &msg).await,
        Command::KICK(..) => channel::kick::KickHandler.handle(ctx, &msg).await,
        Command::TOPIC(..) => channel::topic::TopicHandler.handle(ctx, &msg).await,
        Command::INVITE(..) => channel::invite::InviteHandler.handle(ctx, &msg).await,
        Command::NAMES(..) => channel::names::NamesHandler.handle(ctx, &msg).await,
        Command::MODE(..) => mode::ModeHandler.handle(ctx, &msg).await,
        Command::PRIVMSG(..) | Command::NOTICE(..) => {
            messaging::MessageHandler.handle(ctx, &msg).await
        }
        // Server-to-server sync is only reachable through [`dispatch_link`];
        // a client sending these gets the same 421 as any unknown command.
        Command::TMODE(..) => Err(HandlerError::UnknownCommand("TMODE".into())),
        Command::BMASK(..) => Err(HandlerError::UnknownCommand("BMASK".into())),
        Command::PING(token) => {
            ctx.send(Message {
                prefix: Some(Prefix::ServerName(ctx.mesh.server.name.clone())),
                command: Command::PONG(token.clone()),
            })
            .await;
            Ok(())
        }
        Command::PONG(_) | Command::Response(..) => Ok(()),
        Command::NICK(_) | Command::USER(..) | Command::QUIT(_) => Ok(()),
        Command::Raw(cmd, _) => Err(HandlerError::UnknownCommand(cmd.clone())),
    };

    if let Err(err) = result {
        debug!(uid = %ctx.uid, error = %err, "command rejected");
        ctx.send(err.to_reply(&ctx.mesh.server.name, &ctx.nick)).await;
    }
}

/// Route one message from an authenticated peer link. This is the only
/// table that reaches the TMODE/BMASK handlers; link errors are logged,
/// not replied, since there is no client to address.
pub async fn dispatch_link(ctx: &Context, msg: Message) {
    let result = match &msg.command {
        Command::TMODE(..) => server::TmodeHandler.handle(ctx, &msg).await,
        Command::BMASK(..) => server::BmaskHandler.handle(ctx, &msg).await,
        _ => return dispatch(ctx, msg).await,
    };
    if let Err(err) = result {
        debug!(error = %err, "link command rejected");
    }
}
