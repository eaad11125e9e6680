//! # tern-proto
//!
//! Wire-protocol types for the Tern IRC daemon: message parsing and
//! serialization, the numeric reply set, RFC 1459 case mapping, channel
//! name validation, and an optional tokio line codec.
//!
//! The daemon keeps all protocol *semantics* out of this crate; tern-proto
//! only knows how bytes become [`Message`]s and back.
//!
//! ```rust
//! use tern_proto::Message;
//!
//! let msg: Message = ":nick!user@host PRIVMSG #tern :hello".parse().unwrap();
//! assert_eq!(msg.to_string(), ":nick!user@host PRIVMSG #tern :hello");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod chan;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod response;

pub use self::casemap::{irc_eq, irc_to_lower};
pub use self::chan::ChannelExt;
pub use self::error::ProtocolError;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{Command, Message, Prefix, MAX_LINE_LEN, MAX_MSG_LEN};
pub use self::response::Response;
