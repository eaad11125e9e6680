//! Policy hook points.
//!
//! Hooks run after the built-in checks and see their verdict; a hook may
//! tighten a decision (deny a join the core allowed, mute a sender) but the
//! core's hard denials are already final by the time hooks run.

use crate::engine::admission::{JoinDenial, SendClass};
use crate::state::{Channel, User};
use std::sync::Arc;

/// A pluggable policy module. All methods default to no-ops so a policy
/// only implements the hook points it cares about.
pub trait Policy: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Runs after the built-in join checks with their verdict.
    fn can_join(&self, _channel: &Channel, _user: &User, _verdict: &mut Result<(), JoinDenial>) {}

    /// Runs after the built-in send classification.
    fn can_send(&self, _channel: &Channel, _user: &User, _class: &mut SendClass) {}

    /// Runs after the built-in kick permission check. A hook may veto the
    /// kick with a reason to relay to the kicker.
    fn can_kick(
        &self,
        _channel: &Channel,
        _source: &User,
        _target: &User,
        _verdict: &mut Result<(), String>,
    ) {
    }

    /// Notification: a member was added to a channel.
    fn member_added(&self, _channel: &str, _uid: &str) {}

    /// Notification: a member left or was removed from a channel.
    fn member_removed(&self, _channel: &str, _uid: &str) {}

    /// Notification: a channel reached zero members and was destroyed.
    fn channel_destroyed(&self, _channel: &str) {}
}

/// Ordered collection of registered policies. Registration order is
/// invocation order, and every decision hook sees the verdict left by the
/// previous one.
#[derive(Default)]
pub struct HookRegistry {
    policies: Vec<Arc<dyn Policy>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, policy: Arc<dyn Policy>) {
        tracing::debug!(policy = policy.name(), "registering channel policy");
        self.policies.push(policy);
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn can_join(&self, channel: &Channel, user: &User, verdict: &mut Result<(), JoinDenial>) {
        for policy in &self.policies {
            policy.can_join(channel, user, verdict);
        }
    }

    pub fn can_send(&self, channel: &Channel, user: &User, class: &mut SendClass) {
        for policy in &self.policies {
            policy.can_send(channel, user, class);
        }
    }

    pub fn can_kick(
        &self,
        channel: &Channel,
        source: &User,
        target: &User,
        verdict: &mut Result<(), String>,
    ) {
        for policy in &self.policies {
            policy.can_kick(channel, source, target, verdict);
        }
    }

    pub fn member_added(&self, channel: &str, uid: &str) {
        for policy in &self.policies {
            policy.member_added(channel, uid);
        }
    }

    pub fn member_removed(&self, channel: &str, uid: &str) {
        for policy in &self.policies {
            policy.member_removed(channel, uid);
        }
    }

    pub fn channel_destroyed(&self, channel: &str) {
        for policy in &self.policies {
            policy.channel_destroyed(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DenyGuests;
    impl Policy for DenyGuests {
        fn name(&self) -> &'static str {
            "deny-guests"
        }
        fn can_join(&self, _channel: &Channel, user: &User, verdict: &mut Result<(), JoinDenial>) {
            if verdict.is_ok() && user.nick.starts_with("Guest") {
                *verdict = Err(JoinDenial::InviteOnly { forward: None });
            }
        }
        fn can_send(&self, _channel: &Channel, user: &User, class: &mut SendClass) {
            if user.nick.starts_with("Guest") {
                *class = SendClass::No;
            }
        }
    }

    fn guest() -> User {
        User::new_local(
            "001AAAAAA".into(),
            "Guest1234".into(),
            "g".into(),
            "guest".into(),
            "host".into(),
            "192.0.2.1".into(),
        )
    }

    #[test]
    fn test_hook_tightens_join_verdict() {
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(DenyGuests));

        let chan = Channel::new("#test".into(), 100);
        let mut verdict = Ok(());
        hooks.can_join(&chan, &guest(), &mut verdict);
        assert!(matches!(verdict, Err(JoinDenial::InviteOnly { .. })));
    }

    #[test]
    fn test_hook_downgrades_send_class() {
        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(DenyGuests));

        let chan = Channel::new("#test".into(), 100);
        let mut class = SendClass::Nonop;
        hooks.can_send(&chan, &guest(), &mut class);
        assert_eq!(class, SendClass::No);
    }

    #[test]
    fn test_empty_registry_leaves_verdict_alone() {
        let hooks = HookRegistry::new();
        let chan = Channel::new("#test".into(), 100);
        let mut verdict: Result<(), JoinDenial> = Ok(());
        hooks.can_join(&chan, &guest(), &mut verdict);
        assert!(verdict.is_ok());
    }
}
