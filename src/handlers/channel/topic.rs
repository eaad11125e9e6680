//! TOPIC: query, set, and clear.

use crate::error::HandlerError;
use crate::handlers::{helpers, Context, Handler};
use crate::state::Topic;
use async_trait::async_trait;
use tern_proto::{Command, Message, Response};

pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &Context, msg: &Message) -> Result<(), HandlerError> {
        let Command::TOPIC(channel, new_topic) = &msg.command else {
            return Ok(());
        };
        let lower = tern_proto::irc_to_lower(channel);
        let chan_arc = ctx
            .mesh
            .get_channel(channel)
            .ok_or_else(|| HandlerError::NoSuchChannel(channel.to_string()))?;

        let Some(new_topic) = new_topic else {
            // Query.
            let topic = chan_arc.read().await.topic.clone();
            match topic {
                Some(topic) => {
                    ctx.reply(Response::RPL_TOPIC, vec![channel.clone(), topic.text])
                        .await;
                    ctx.reply(
                        Response::RPL_TOPICWHOTIME,
                        vec![channel.clone(), topic.set_by, topic.set_at.to_string()],
                    )
                    .await;
                }
                None => {
                    ctx.reply(
                        Response::RPL_NOTOPIC,
                        vec![channel.clone(), "No topic is set".to_string()],
                    )
                    .await;
                }
            }
            return Ok(());
        };

        let membership = {
            let registry = ctx.mesh.memberships.read();
            registry
                .find(&lower, &ctx.uid)
                .and_then(|id| registry.get(id).map(|m| m.op))
        };
        let is_op = membership.ok_or_else(|| HandlerError::NotOnChannel(channel.to_string()))?;

        {
            let mut chan = chan_arc.write().await;
            if chan.modes.topic_lock && !is_op {
                return Err(HandlerError::ChanOpPrivsNeeded(channel.to_string()));
            }
            // An empty topic argument clears it.
            chan.topic = if new_topic.is_empty() {
                None
            } else {
                let set_by = match ctx.mesh.get_user(&ctx.uid) {
                    Some(user) => user.read().await.hostmask(),
                    None => ctx.nick.clone(),
                };
                Some(Topic {
                    text: new_topic.clone(),
                    set_by,
                    set_at: helpers::now_ts(),
                })
            };
        }

        if let Some(prefix) = helpers::user_prefix(&ctx.mesh, &ctx.uid).await {
            let topic_msg = Message {
                prefix: Some(prefix),
                command: Command::TOPIC(channel.clone(), Some(new_topic.clone())),
            };
            ctx.mesh.broadcast_to_channel(&lower, topic_msg, None).await;
        }
        Ok(())
    }
}
