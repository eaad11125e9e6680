//! Handler errors and their numeric replies.

use tern_proto::{Message, Prefix, Response};
use thiserror::Error;

/// Errors raised while handling a client command. Each maps to exactly one
/// numeric reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("not registered")]
    NotRegistered,
    #[error("not enough parameters for {0}")]
    NeedMoreParams(String),
    #[error("no such nick: {0}")]
    NoSuchNick(String),
    #[error("no such channel: {0}")]
    NoSuchChannel(String),
    #[error("not on channel: {0}")]
    NotOnChannel(String),
    #[error("{nick} is not on {channel}")]
    UserNotInChannel { nick: String, channel: String },
    #[error("{nick} is already on {channel}")]
    UserOnChannel { nick: String, channel: String },
    #[error("cannot send to channel {0}")]
    CannotSendToChan(String),
    #[error("no text to send")]
    NoTextToSend,
    #[error("channel operator privileges needed on {0}")]
    ChanOpPrivsNeeded(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl HandlerError {
    /// Render the numeric reply for this error, addressed to `nick` from
    /// `server`.
    pub fn to_reply(&self, server: &str, nick: &str) -> Message {
        let (response, args) = match self {
            Self::NotRegistered => (
                Response::ERR_NOTREGISTERED,
                vec!["You have not registered".to_string()],
            ),
            Self::NeedMoreParams(cmd) => (
                Response::ERR_NEEDMOREPARAMS,
                vec![cmd.clone(), "Not enough parameters".to_string()],
            ),
            Self::NoSuchNick(target) => (
                Response::ERR_NOSUCHNICK,
                vec![target.clone(), "No such nick/channel".to_string()],
            ),
            Self::NoSuchChannel(channel) => (
                Response::ERR_NOSUCHCHANNEL,
                vec![channel.clone(), "No such channel".to_string()],
            ),
            Self::NotOnChannel(channel) => (
                Response::ERR_NOTONCHANNEL,
                vec![channel.clone(), "You're not on that channel".to_string()],
            ),
            Self::UserNotInChannel { nick, channel } => (
                Response::ERR_USERNOTINCHANNEL,
                vec![
                    nick.clone(),
                    channel.clone(),
                    "They aren't on that channel".to_string(),
                ],
            ),
            Self::UserOnChannel { nick, channel } => (
                Response::ERR_USERONCHANNEL,
                vec![
                    nick.clone(),
                    channel.clone(),
                    "is already on channel".to_string(),
                ],
            ),
            Self::CannotSendToChan(channel) => (
                Response::ERR_CANNOTSENDTOCHAN,
                vec![channel.clone(), "Cannot send to channel".to_string()],
            ),
            Self::NoTextToSend => (
                Response::ERR_NOTEXTTOSEND,
                vec!["No text to send".to_string()],
            ),
            Self::ChanOpPrivsNeeded(channel) => (
                Response::ERR_CHANOPRIVSNEEDED,
                vec![channel.clone(), "You're not channel operator".to_string()],
            ),
            Self::UnknownCommand(cmd) => (
                Response::ERR_UNKNOWNCOMMAND,
                vec![cmd.clone(), "Unknown command".to_string()],
            ),
        };

        let mut full_args = vec![nick.to_string()];
        full_args.extend(args);
        Message {
            prefix: Some(Prefix::ServerName(server.to_string())),
            command: tern_proto::Command::Response(response, full_args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_shape() {
        let err = HandlerError::ChanOpPrivsNeeded("#test".into());
        let reply = err.to_reply("irc.tern.test", "alice");
        assert_eq!(
            reply.to_string(),
            ":irc.tern.test 482 alice #test :You're not channel operator"
        );
    }

    #[test]
    fn test_need_more_params() {
        let err = HandlerError::NeedMoreParams("KICK".into());
        let reply = err.to_reply("irc.tern.test", "alice");
        assert_eq!(
            reply.to_string(),
            ":irc.tern.test 461 alice KICK :Not enough parameters"
        );
    }
}
