//! Per-client connection lifecycle: registration, the read loop, and
//! teardown.

use crate::engine::{depart, destroy, DepartOutcome};
use crate::handlers::{self, Context};
use crate::state::{Mesh, User};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tern_proto::{Command, LineCodec, Message, Prefix, Response};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info};

const OUTBOUND_QUEUE: usize = 64;

/// Capabilities this server offers during CAP negotiation.
const SUPPORTED_CAPS: &[&str] = &["multi-prefix", "userhost-in-names"];

pub async fn handle(
    mesh: Arc<Mesh>,
    uid: String,
    stream: TcpStream,
    peer: SocketAddr,
) -> anyhow::Result<()> {
    let framed = Framed::new(stream, LineCodec::new());
    let (mut sink, mut lines) = framed.split();

    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg.to_string()).await.is_err() {
                break;
            }
        }
    });

    // Registration: collect NICK and USER (and any CAP negotiation) before
    // anything else runs.
    let mut nick: Option<String> = None;
    let mut userinfo: Option<(String, String)> = None;
    let mut caps: HashSet<String> = HashSet::new();
    let mut negotiating = false;
    let registered = loop {
        let Some(line) = lines.next().await else {
            break false;
        };
        let Ok(line) = line else {
            break false;
        };
        let Ok(msg) = line.parse::<Message>() else {
            continue;
        };
        match msg.command {
            Command::NICK(candidate) => {
                if !valid_nick(&candidate) {
                    send_numeric(
                        &tx,
                        &mesh,
                        Response::ERR_ERRONEUSNICKNAME,
                        &["*", &candidate, "Erroneous nickname"],
                    )
                    .await;
                    continue;
                }
                if mesh.lookup_nick(&candidate).is_some() {
                    send_numeric(
                        &tx,
                        &mesh,
                        Response::ERR_NICKNAMEINUSE,
                        &["*", &candidate, "Nickname is already in use"],
                    )
                    .await;
                    continue;
                }
                nick = Some(candidate);
            }
            Command::USER(username, _, _, realname) => {
                userinfo = Some((username, realname));
            }
            Command::QUIT(_) => break false,
            Command::Raw(cmd, args) if cmd == "CAP" => {
                if let Some((sub, payload)) = negotiate_cap(&args, &mut caps, &mut negotiating) {
                    let reply = Message {
                        prefix: Some(Prefix::ServerName(mesh.server.name.clone())),
                        command: Command::Raw(
                            "CAP".into(),
                            vec!["*".into(), sub.into(), payload],
                        ),
                    };
                    let _ = tx.send(reply).await;
                }
            }
            _ => {
                send_numeric(
                    &tx,
                    &mesh,
                    Response::ERR_NOTREGISTERED,
                    &["*", "You have not registered"],
                )
                .await;
            }
        }
        if nick.is_some() && userinfo.is_some() && !negotiating {
            break true;
        }
    };
    if !registered {
        writer.abort();
        return Ok(());
    }
    let (Some(nick), Some((username, realname))) = (nick, userinfo) else {
        writer.abort();
        return Ok(());
    };

    let ip = peer.ip().to_string();
    let mut user = User::new_local(uid.clone(), nick.clone(), username, realname, ip.clone(), ip);
    user.caps = caps;
    mesh.add_user(user);
    mesh.register_sender(&uid, tx.clone());
    mesh.refresh_split();
    info!(%peer, nick = %nick, uid = %uid, "client registered");

    send_numeric(
        &tx,
        &mesh,
        Response::RPL_WELCOME,
        &[
            &nick,
            &format!("Welcome to the {} IRC Network {nick}", mesh.server.network),
        ],
    )
    .await;

    let ctx = Context::new(Arc::clone(&mesh), uid.clone(), nick.clone());
    let mut quit_reason = None;
    while let Some(line) = lines.next().await {
        let Ok(line) = line else {
            break;
        };
        let mut msg = match line.parse::<Message>() {
            Ok(msg) => msg,
            Err(err) => {
                debug!(%peer, error = %err, "unparseable line");
                continue;
            }
        };
        // Clients do not get to assert an origin.
        msg.prefix = None;
        if let Command::QUIT(reason) = msg.command {
            quit_reason = reason;
            break;
        }
        handlers::dispatch(&ctx, msg).await;
    }

    teardown(&mesh, &uid, &nick, quit_reason.as_deref()).await;
    writer.abort();
    Ok(())
}

/// Remove a departed user from every channel, announcing the quit once per
/// interested local client, then drop them from the mesh.
pub async fn teardown(mesh: &Mesh, uid: &str, nick: &str, reason: Option<&str>) {
    let channels: Vec<String> = {
        let registry = mesh.memberships.read();
        registry
            .channels_of(uid)
            .iter()
            .filter_map(|id| registry.get(*id))
            .map(|m| m.channel.clone())
            .collect()
    };

    let quit_msg = user_prefix(mesh, uid).await.map(|prefix| Message {
        prefix: Some(prefix),
        command: Command::QUIT(Some(reason.unwrap_or("Client quit").to_string())),
    });

    // One QUIT per local client sharing any channel with the leaver.
    if let Some(quit_msg) = quit_msg {
        let mut notified = HashSet::new();
        let targets: Vec<String> = {
            let registry = mesh.memberships.read();
            channels
                .iter()
                .flat_map(|chan| registry.local_members(chan))
                .filter_map(|id| registry.get(*id))
                .map(|m| m.uid.clone())
                .filter(|target| target.as_str() != uid && notified.insert(target.clone()))
                .collect()
        };
        for target in targets {
            mesh.send_to_user(&target, quit_msg.clone()).await;
        }
    }

    for channel in channels {
        let permanent = match mesh.get_channel(&channel) {
            Some(chan) => chan.read().await.modes.permanent,
            None => false,
        };
        let outcome = {
            let mut registry = mesh.memberships.write();
            depart(&mut registry, &channel, uid, permanent)
        };
        match outcome {
            DepartOutcome::NotMember => {}
            DepartOutcome::Removed(_) => mesh.hooks.member_removed(&channel, uid),
            DepartOutcome::Empty(_, proof) => {
                mesh.hooks.member_removed(&channel, uid);
                if let Some(chan_arc) = mesh.get_channel(&channel) {
                    let mut chan = chan_arc.write().await;
                    destroy(&mut chan, proof);
                }
                mesh.remove_channel(&channel);
                mesh.hooks.channel_destroyed(&channel);
            }
        }
    }

    mesh.remove_user(uid).await;
    mesh.refresh_split();
    info!(nick, uid, "client disconnected");
}

async fn user_prefix(mesh: &Mesh, uid: &str) -> Option<Prefix> {
    let user = mesh.get_user(uid)?;
    let user = user.read().await;
    Some(Prefix::new(&user.nick, &user.user, &user.host))
}

async fn send_numeric(
    tx: &mpsc::Sender<Message>,
    mesh: &Mesh,
    response: Response,
    args: &[&str],
) {
    let msg = Message {
        prefix: Some(Prefix::ServerName(mesh.server.name.clone())),
        command: Command::Response(response, args.iter().map(|s| s.to_string()).collect()),
    };
    let _ = tx.send(msg).await;
}

/// Handle one CAP subcommand during registration, updating the negotiated
/// set. Returns the (subcommand, payload) to send back, if any. A REQ is
/// acknowledged as a unit: one unknown capability refuses the whole list.
fn negotiate_cap(
    args: &[String],
    caps: &mut HashSet<String>,
    negotiating: &mut bool,
) -> Option<(&'static str, String)> {
    match args.first().map(String::as_str) {
        Some("LS") => {
            *negotiating = true;
            Some(("LS", SUPPORTED_CAPS.join(" ")))
        }
        Some("REQ") => {
            *negotiating = true;
            let requested = args.get(1).cloned().unwrap_or_default();
            let known = !requested.is_empty()
                && requested
                    .split_whitespace()
                    .all(|cap| SUPPORTED_CAPS.contains(&cap));
            if known {
                caps.extend(requested.split_whitespace().map(str::to_string));
                Some(("ACK", requested))
            } else {
                Some(("NAK", requested))
            }
        }
        Some("END") => {
            *negotiating = false;
            None
        }
        _ => None,
    }
}

fn valid_nick(nick: &str) -> bool {
    if nick.is_empty() || nick.len() > 30 {
        return false;
    }
    let mut chars = nick.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || "[]\\`_^{|}".contains(c));
    first_ok
        && nick
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "[]\\`_^{|}-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_negotiation() {
        let mut caps = HashSet::new();
        let mut negotiating = false;

        let (sub, payload) =
            negotiate_cap(&["LS".into()], &mut caps, &mut negotiating).unwrap();
        assert_eq!(sub, "LS");
        assert!(payload.contains("multi-prefix"));
        assert!(negotiating);

        let (sub, payload) = negotiate_cap(
            &["REQ".into(), "multi-prefix userhost-in-names".into()],
            &mut caps,
            &mut negotiating,
        )
        .unwrap();
        assert_eq!(sub, "ACK");
        assert_eq!(payload, "multi-prefix userhost-in-names");
        assert!(caps.contains("multi-prefix"));
        assert!(caps.contains("userhost-in-names"));

        // One unknown capability refuses the whole request.
        let mut fresh = HashSet::new();
        let (sub, _) = negotiate_cap(
            &["REQ".into(), "sasl multi-prefix".into()],
            &mut fresh,
            &mut negotiating,
        )
        .unwrap();
        assert_eq!(sub, "NAK");
        assert!(fresh.is_empty());

        assert!(negotiate_cap(&["END".into()], &mut caps, &mut negotiating).is_none());
        assert!(!negotiating);
    }

    #[test]
    fn test_valid_nick() {
        assert!(valid_nick("alice"));
        assert!(valid_nick("[w]ork"));
        assert!(valid_nick("nick-42"));
        assert!(!valid_nick("9alice"));
        assert!(!valid_nick("with space"));
        assert!(!valid_nick(""));
    }
}
