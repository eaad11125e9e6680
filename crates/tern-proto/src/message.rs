//! IRC message types: prefix, command, and the owned [`Message`] container.
//!
//! This is the subset of the IRC grammar the Tern daemon speaks: channel
//! membership and mode commands, the messaging path, registration, and the
//! server-to-server mode sync commands (`TMODE`, `BMASK`).

use crate::error::ProtocolError;
use crate::response::Response;
use std::fmt;
use std::str::FromStr;

/// Maximum length of a wire line in bytes, including the trailing CR-LF.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum usable payload of a wire line (excludes CR-LF).
pub const MAX_MSG_LEN: usize = MAX_LINE_LEN - 2;

/// The source of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A server origin (`:irc.example.net`).
    ServerName(String),
    /// A user origin (`:nick!user@host`).
    Nickname(String, String, String),
}

impl Prefix {
    /// Build a user prefix from its three components.
    pub fn new(nick: &str, user: &str, host: &str) -> Self {
        Self::Nickname(nick.to_string(), user.to_string(), host.to_string())
    }

    /// Parse a raw prefix (without the leading `:`).
    pub fn parse(raw: &str) -> Self {
        if let Some((nick, rest)) = raw.split_once('!') {
            if let Some((user, host)) = rest.split_once('@') {
                return Self::Nickname(nick.to_string(), user.to_string(), host.to_string());
            }
        }
        Self::ServerName(raw.to_string())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerName(name) => write!(f, "{name}"),
            Self::Nickname(nick, user, host) => write!(f, "{nick}!{user}@{host}"),
        }
    }
}

/// An IRC command with typed arguments.
///
/// Commands outside the daemon's surface round-trip through [`Command::Raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    /// `JOIN <channels> [keys]`
    JOIN(String, Option<String>),
    /// `PART <channels> [reason]`
    PART(String, Option<String>),
    /// `MODE <target> [modestring] [args...]`
    MODE(String, Vec<String>),
    /// `NAMES [channels]`
    NAMES(Option<String>),
    /// `KICK <channel> <users> [comment]`
    KICK(String, String, Option<String>),
    /// `TOPIC <channel> [topic]` — `Some("")` clears the topic.
    TOPIC(String, Option<String>),
    /// `INVITE <nick> <channel>`
    INVITE(String, String),
    /// `PRIVMSG <target> <text>`
    PRIVMSG(String, String),
    /// `NOTICE <target> <text>`
    NOTICE(String, String),
    /// `NICK <nick>`
    NICK(String),
    /// `USER <user> <mode> <unused> <realname>`
    USER(String, String, String, String),
    /// `PING <token>`
    PING(String),
    /// `PONG <token>`
    PONG(String),
    /// `QUIT [reason]`
    QUIT(Option<String>),
    /// `TMODE <ts> <channel> <modestring> [args...]` — server-to-server
    /// timestamped mode change. The vector holds the modestring followed
    /// by its arguments.
    TMODE(i64, String, Vec<String>),
    /// `BMASK <ts> <channel> <letter> :<masks>` — server-to-server ban-family
    /// burst for one list (`b`, `e`, `I`, or `q`).
    BMASK(i64, String, char, String),
    /// A numeric reply.
    Response(Response, Vec<String>),
    /// Any other command, verbatim.
    Raw(String, Vec<String>),
}

impl Command {
    fn from_parts(cmd: &str, args: Vec<String>) -> Result<Self, ProtocolError> {
        let mut args = args;
        let too_few = || ProtocolError::InvalidMessage(format!("{cmd}: missing arguments"));

        let upper = cmd.to_ascii_uppercase();
        let parsed = match upper.as_str() {
            "JOIN" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                let keys = if args.len() > 1 { Some(args.remove(1)) } else { None };
                Self::JOIN(args.remove(0), keys)
            }
            "PART" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                let reason = if args.len() > 1 { Some(args.remove(1)) } else { None };
                Self::PART(args.remove(0), reason)
            }
            "MODE" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                let target = args.remove(0);
                Self::MODE(target, args)
            }
            "NAMES" => Self::NAMES(if args.is_empty() { None } else { Some(args.remove(0)) }),
            "KICK" => {
                if args.len() < 2 {
                    return Err(too_few());
                }
                let comment = if args.len() > 2 { Some(args.remove(2)) } else { None };
                Self::KICK(args.remove(0), args.remove(0), comment)
            }
            "TOPIC" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                let topic = if args.len() > 1 { Some(args.remove(1)) } else { None };
                Self::TOPIC(args.remove(0), topic)
            }
            "INVITE" => {
                if args.len() < 2 {
                    return Err(too_few());
                }
                Self::INVITE(args.remove(0), args.remove(0))
            }
            "PRIVMSG" => {
                if args.len() < 2 {
                    return Err(too_few());
                }
                Self::PRIVMSG(args.remove(0), args.remove(0))
            }
            "NOTICE" => {
                if args.len() < 2 {
                    return Err(too_few());
                }
                Self::NOTICE(args.remove(0), args.remove(0))
            }
            "NICK" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                Self::NICK(args.remove(0))
            }
            "USER" => {
                if args.len() < 4 {
                    return Err(too_few());
                }
                Self::USER(args.remove(0), args.remove(0), args.remove(0), args.remove(0))
            }
            "PING" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                Self::PING(args.remove(0))
            }
            "PONG" => {
                if args.is_empty() {
                    return Err(too_few());
                }
                Self::PONG(args.remove(0))
            }
            "QUIT" => Self::QUIT(if args.is_empty() { None } else { Some(args.remove(0)) }),
            "TMODE" => {
                if args.len() < 3 {
                    return Err(too_few());
                }
                let ts = parse_ts(&args.remove(0))?;
                let channel = args.remove(0);
                Self::TMODE(ts, channel, args)
            }
            "BMASK" => {
                if args.len() < 4 {
                    return Err(too_few());
                }
                let ts = parse_ts(&args.remove(0))?;
                let channel = args.remove(0);
                let letter_arg = args.remove(0);
                let mut letters = letter_arg.chars();
                let letter = letters
                    .next()
                    .filter(|_| letters.next().is_none())
                    .ok_or_else(|| {
                        ProtocolError::InvalidMessage(format!("BMASK: bad list letter {letter_arg:?}"))
                    })?;
                Self::BMASK(ts, channel, letter, args.remove(0))
            }
            _ => {
                if let Ok(code) = upper.parse::<u16>() {
                    if let Some(resp) = Response::from_code(code) {
                        return Ok(Self::Response(resp, args));
                    }
                }
                Self::Raw(upper, args)
            }
        };
        Ok(parsed)
    }

    /// Decompose into a command word and argument list for serialization.
    fn to_parts(&self) -> (String, Vec<String>) {
        match self {
            Self::JOIN(chans, keys) => {
                let mut args = vec![chans.clone()];
                args.extend(keys.clone());
                ("JOIN".into(), args)
            }
            Self::PART(chans, reason) => {
                let mut args = vec![chans.clone()];
                args.extend(reason.clone());
                ("PART".into(), args)
            }
            Self::MODE(target, rest) => {
                let mut args = vec![target.clone()];
                args.extend(rest.iter().cloned());
                ("MODE".into(), args)
            }
            Self::NAMES(chans) => ("NAMES".into(), chans.clone().into_iter().collect()),
            Self::KICK(chan, users, comment) => {
                let mut args = vec![chan.clone(), users.clone()];
                args.extend(comment.clone());
                ("KICK".into(), args)
            }
            Self::TOPIC(chan, topic) => {
                let mut args = vec![chan.clone()];
                args.extend(topic.clone());
                ("TOPIC".into(), args)
            }
            Self::INVITE(nick, chan) => ("INVITE".into(), vec![nick.clone(), chan.clone()]),
            Self::PRIVMSG(target, text) => ("PRIVMSG".into(), vec![target.clone(), text.clone()]),
            Self::NOTICE(target, text) => ("NOTICE".into(), vec![target.clone(), text.clone()]),
            Self::NICK(nick) => ("NICK".into(), vec![nick.clone()]),
            Self::USER(user, mode, unused, realname) => (
                "USER".into(),
                vec![user.clone(), mode.clone(), unused.clone(), realname.clone()],
            ),
            Self::PING(token) => ("PING".into(), vec![token.clone()]),
            Self::PONG(token) => ("PONG".into(), vec![token.clone()]),
            Self::QUIT(reason) => ("QUIT".into(), reason.clone().into_iter().collect()),
            Self::TMODE(ts, chan, rest) => {
                let mut args = vec![ts.to_string(), chan.clone()];
                args.extend(rest.iter().cloned());
                ("TMODE".into(), args)
            }
            Self::BMASK(ts, chan, letter, masks) => (
                "BMASK".into(),
                vec![ts.to_string(), chan.clone(), letter.to_string(), masks.clone()],
            ),
            Self::Response(resp, args) => (format!("{:03}", resp.code()), args.clone()),
            Self::Raw(cmd, args) => (cmd.clone(), args.clone()),
        }
    }

    /// Whether the final argument is free text that keeps its `:` marker
    /// even as a single word, so parse and re-serialize agree.
    fn last_is_trailing(&self) -> bool {
        match self {
            Self::PRIVMSG(..) | Self::NOTICE(..) | Self::USER(..) | Self::BMASK(..) => true,
            Self::PART(_, reason) | Self::QUIT(reason) | Self::TOPIC(_, reason) => {
                reason.is_some()
            }
            Self::KICK(_, _, comment) => comment.is_some(),
            Self::Response(_, args) => !args.is_empty(),
            _ => false,
        }
    }
}

fn parse_ts(raw: &str) -> Result<i64, ProtocolError> {
    raw.parse::<i64>()
        .map_err(|_| ProtocolError::InvalidMessage(format!("invalid timestamp: {raw}")))
}

/// A complete IRC message: optional prefix plus a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The message source, if any.
    pub prefix: Option<Prefix>,
    /// The command and its arguments.
    pub command: Command,
}

impl Message {
    /// Build a prefix-less message from a command.
    pub fn from_command(command: Command) -> Self {
        Self { prefix: None, command }
    }

    /// Build a `PRIVMSG`.
    pub fn privmsg<T: Into<String>>(target: &str, text: T) -> Self {
        Self::from_command(Command::PRIVMSG(target.to_string(), text.into()))
    }

    /// Build a `NOTICE`.
    pub fn notice<T: Into<String>>(target: &str, text: T) -> Self {
        Self::from_command(Command::NOTICE(target.to_string(), text.into()))
    }

    /// Attach a prefix, consuming the message.
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        let (cmd, args) = self.command.to_parts();
        write!(f, "{cmd}")?;
        let trailing = self.command.last_is_trailing();
        let last = args.len().saturating_sub(1);
        for (i, arg) in args.iter().enumerate() {
            if i == last && (trailing || arg.is_empty() || arg.contains(' ') || arg.starts_with(':')) {
                write!(f, " :{arg}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty line".into()));
        }

        let (prefix, rest) = if let Some(stripped) = line.strip_prefix(':') {
            let (raw, rest) = stripped
                .split_once(' ')
                .ok_or_else(|| ProtocolError::InvalidMessage("prefix without command".into()))?;
            (Some(Prefix::parse(raw)), rest.trim_start())
        } else {
            (None, line)
        };

        let mut args = Vec::new();
        let (cmd, mut params) = match rest.split_once(' ') {
            Some((cmd, params)) => (cmd, params.trim_start()),
            None => (rest, ""),
        };
        if cmd.is_empty() {
            return Err(ProtocolError::InvalidMessage("missing command".into()));
        }

        while !params.is_empty() {
            if let Some(trailing) = params.strip_prefix(':') {
                args.push(trailing.to_string());
                break;
            }
            match params.split_once(' ') {
                Some((word, rest)) => {
                    args.push(word.to_string());
                    params = rest.trim_start();
                }
                None => {
                    args.push(params.to_string());
                    break;
                }
            }
        }

        Ok(Self {
            prefix,
            command: Command::from_parts(cmd, args)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_with_key() {
        let msg: Message = "JOIN #test,#other key1".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::JOIN("#test,#other".into(), Some("key1".into()))
        );
    }

    #[test]
    fn test_parse_privmsg_with_prefix() {
        let msg: Message = ":nick!user@host PRIVMSG #chan :hello there".parse().unwrap();
        assert_eq!(
            msg.prefix,
            Some(Prefix::Nickname("nick".into(), "user".into(), "host".into()))
        );
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#chan".into(), "hello there".into())
        );
    }

    #[test]
    fn test_parse_topic_clear() {
        let msg: Message = "TOPIC #chan :".parse().unwrap();
        assert_eq!(msg.command, Command::TOPIC("#chan".into(), Some(String::new())));
    }

    #[test]
    fn test_parse_tmode() {
        let msg: Message = ":1AB TMODE 1609459200 #chan +be *!*@a *!*@b".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::TMODE(
                1609459200,
                "#chan".into(),
                vec!["+be".into(), "*!*@a".into(), "*!*@b".into()]
            )
        );
    }

    #[test]
    fn test_parse_bmask() {
        let msg: Message = ":1AB BMASK 1609459200 #chan b :*!*@x.net *!*@y.net"
            .parse()
            .unwrap();
        assert_eq!(
            msg.command,
            Command::BMASK(1609459200, "#chan".into(), 'b', "*!*@x.net *!*@y.net".into())
        );
    }

    #[test]
    fn test_parse_numeric() {
        let msg: Message = ":server 474 nick #chan :Cannot join channel (+b)"
            .parse()
            .unwrap();
        match msg.command {
            Command::Response(resp, args) => {
                assert_eq!(resp.code(), 474);
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let raw = ":nick!user@host PRIVMSG #chan :hello there";
        let msg: Message = raw.parse().unwrap();
        assert_eq!(msg.to_string(), raw);
    }

    #[test]
    fn test_display_trailing_colon() {
        let msg = Message::privmsg("#chan", ":starts with colon");
        assert_eq!(msg.to_string(), "PRIVMSG #chan ::starts with colon");
    }

    #[test]
    fn test_single_word_trailing_keeps_marker() {
        // A one-token names list or message body must survive a parse and
        // re-serialize unchanged.
        let raw = ":srv 353 alice = #new :@alice";
        let msg: Message = raw.parse().unwrap();
        assert_eq!(msg.to_string(), raw);

        let msg = Message::privmsg("#chan", "one");
        assert_eq!(msg.to_string(), "PRIVMSG #chan :one");

        // Mode parameters are not trailing text.
        let raw = ":a!b@c MODE #chan +b *!*@spam.example";
        let msg: Message = raw.parse().unwrap();
        assert_eq!(msg.to_string(), raw);
    }

    #[test]
    fn test_parse_unknown_command_raw() {
        let msg: Message = "FROBNICATE a b".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::Raw("FROBNICATE".into(), vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_parse_missing_args() {
        assert!("KICK #chan".parse::<Message>().is_err());
        assert!("".parse::<Message>().is_err());
    }
}
