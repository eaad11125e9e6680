//! The shared server state.
//!
//! `Mesh` owns every table the handlers touch: channels, users, nick
//! lookups, per-connection senders, and the membership registry, plus the
//! engine pieces (access control, hooks, split sentinel) that operate on
//! them. Channel and user records sit behind their own locks so handlers
//! only contend on what they actually touch.

use crate::config::Config;
use crate::engine::{AccessControl, HookRegistry, SplitSentinel};
use crate::state::{Channel, MembershipRegistry, Uid, User};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tern_proto::Message;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Static identity of this server.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub network: String,
    pub sid: String,
    pub description: String,
}

pub struct Mesh {
    pub server: ServerInfo,
    pub config: Config,
    /// Channels, keyed by lowercase name.
    pub channels: DashMap<String, Arc<RwLock<Channel>>>,
    /// Users by UID.
    pub users: DashMap<Uid, Arc<RwLock<User>>>,
    /// Lowercase nick to UID.
    pub nicks: DashMap<String, Uid>,
    /// Outbound queues for locally-connected clients.
    pub senders: DashMap<Uid, mpsc::Sender<Message>>,
    /// The membership arena. Guarded by a synchronous lock; hold it only
    /// for table work, never across an await.
    pub memberships: parking_lot::RwLock<MembershipRegistry>,
    pub access: AccessControl,
    pub hooks: HookRegistry,
    pub split: Arc<SplitSentinel>,
    /// Burst-complete peer servers currently linked.
    linked_servers: AtomicU32,
    /// Back-reference for tasks that outlive the calling scope.
    me: Weak<Mesh>,
}

impl Mesh {
    pub fn new(config: Config) -> Arc<Self> {
        let server = ServerInfo {
            name: config.server.name.clone(),
            network: config.server.network.clone(),
            sid: config.server.sid.clone(),
            description: config.server.description.clone(),
        };
        let access = AccessControl::new(config.channel.use_exceptions);
        let split = Arc::new(SplitSentinel::new(config.split));
        Arc::new_cyclic(|me| Self {
            server,
            config,
            channels: DashMap::new(),
            users: DashMap::new(),
            nicks: DashMap::new(),
            senders: DashMap::new(),
            memberships: parking_lot::RwLock::new(MembershipRegistry::new()),
            access,
            hooks: HookRegistry::new(),
            split,
            linked_servers: AtomicU32::new(0),
            me: me.clone(),
        })
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<RwLock<Channel>>> {
        self.channels
            .get(&tern_proto::irc_to_lower(name))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Fetch a channel, creating it if absent. Returns the channel and
    /// whether this call created it.
    pub fn get_or_create_channel(&self, name: &str, now: i64) -> (Arc<RwLock<Channel>>, bool) {
        let key = tern_proto::irc_to_lower(name);
        let mut created = false;
        let entry = self
            .channels
            .entry(key)
            .or_insert_with(|| {
                created = true;
                debug!(channel = name, "creating channel");
                Arc::new(RwLock::new(Channel::new(name.to_string(), now)))
            })
            .value()
            .clone();
        (entry, created)
    }

    pub fn remove_channel(&self, name: &str) {
        self.channels.remove(&tern_proto::irc_to_lower(name));
    }

    pub fn get_user(&self, uid: &str) -> Option<Arc<RwLock<User>>> {
        self.users.get(uid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn lookup_nick(&self, nick: &str) -> Option<Uid> {
        self.nicks
            .get(&tern_proto::irc_to_lower(nick))
            .map(|entry| entry.value().clone())
    }

    pub fn add_user(&self, user: User) -> Arc<RwLock<User>> {
        let uid = user.uid.clone();
        self.nicks
            .insert(tern_proto::irc_to_lower(&user.nick), uid.clone());
        let user = Arc::new(RwLock::new(user));
        self.users.insert(uid, Arc::clone(&user));
        user
    }

    /// Drop a user from every table. Membership teardown is the caller's
    /// job, since it involves per-channel lifecycle.
    pub async fn remove_user(&self, uid: &str) {
        if let Some((_, user)) = self.users.remove(uid) {
            let nick = user.read().await.nick.clone();
            self.nicks.remove(&tern_proto::irc_to_lower(&nick));
        }
        self.senders.remove(uid);
    }

    pub fn register_sender(&self, uid: &str, sender: mpsc::Sender<Message>) {
        self.senders.insert(uid.to_string(), sender);
    }

    pub async fn send_to_user(&self, uid: &str, message: Message) {
        let sender = self.senders.get(uid).map(|s| s.value().clone());
        if let Some(sender) = sender {
            if sender.send(message).await.is_err() {
                warn!(uid, "dropping message for closed connection");
            }
        }
    }

    /// Deliver a message to every locally-connected member of a channel,
    /// optionally skipping one UID (the originator).
    pub async fn broadcast_to_channel(
        &self,
        channel: &str,
        message: Message,
        skip_uid: Option<&str>,
    ) {
        let key = tern_proto::irc_to_lower(channel);
        let targets: Vec<Uid> = {
            let registry = self.memberships.read();
            registry
                .local_members(&key)
                .iter()
                .filter_map(|id| registry.get(*id))
                .filter(|m| skip_uid != Some(m.uid.as_str()))
                .map(|m| m.uid.clone())
                .collect()
        };
        for uid in targets {
            self.send_to_user(&uid, message.clone()).await;
        }
    }

    /// Current (server, user) counts for the split sentinel: this server
    /// plus burst-complete peers, and every visible user.
    pub fn topology_counts(&self) -> (u32, u32) {
        let servers = 1 + self.linked_servers.load(Ordering::Acquire);
        (servers, self.users.len() as u32)
    }

    pub fn server_linked(&self) {
        self.linked_servers.fetch_add(1, Ordering::AcqRel);
        self.refresh_split();
    }

    pub fn server_delinked(&self) {
        self.linked_servers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .ok();
        self.refresh_split();
    }

    /// Re-evaluate split-mode against current counts. Whenever the check
    /// leaves split-mode engaged, the sentinel's recheck timer is (re)armed
    /// so recovery is noticed even without further topology events.
    pub fn refresh_split(&self) {
        let (servers, users) = self.topology_counts();
        if self.split.update(servers, users) {
            if let Some(mesh) = self.me.upgrade() {
                Arc::clone(&self.split).maybe_arm(move || mesh.topology_counts());
            }
        }
    }
}
