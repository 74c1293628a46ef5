//! Role state machine
//!
//! Pure bookkeeping of who this peer believes is MAIN. Every input returns
//! the [`Action`] the coordinator has to carry out; timers and broadcasting
//! live elsewhere.

use serde::Serialize;

use super::identity::PeerId;
use crate::config::ElectionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No leader observed yet, startup grace window running
    Init,
    /// Single writer of the shared state
    Main,
    /// Follower applying replicated state
    Secondary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Init => write!(f, "init"),
            Role::Main => write!(f, "main"),
            Role::Secondary => write!(f, "secondary"),
        }
    }
}

/// Which UI affordances are enabled for a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub delete_last: bool,
    pub become_main: bool,
    pub become_secondary: bool,
}

impl Controls {
    pub fn for_role(role: Role) -> Self {
        let is_main = role == Role::Main;
        Self {
            delete_last: is_main,
            become_main: !is_main,
            become_secondary: is_main,
        }
    }
}

/// Follow-up the coordinator must perform after feeding an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Entered MAIN: announce, push state, start heartbeats, stop the watchdog
    Promote,
    /// Entered SECONDARY: stop heartbeats, arm the watchdog
    StepDown,
    /// Leader confirmed alive: restart the watchdog
    RearmWatchdog,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct RoleMachine {
    id: PeerId,
    role: Role,
    believed_main: Option<PeerId>,
    policy: ElectionPolicy,
    grace_elapsed: bool,
}

impl RoleMachine {
    pub fn new(id: PeerId, policy: ElectionPolicy) -> Self {
        Self {
            id,
            role: Role::Init,
            believed_main: None,
            policy,
            grace_elapsed: false,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_main(&self) -> bool {
        self.role == Role::Main
    }

    pub fn believed_main(&self) -> Option<&PeerId> {
        self.believed_main.as_ref()
    }

    pub fn controls(&self) -> Controls {
        Controls::for_role(self.role)
    }

    /// No channel could be joined: this peer is alone and leads itself
    pub fn on_channel_unavailable(&mut self) -> Action {
        self.promote()
    }

    pub fn on_heartbeat(&mut self, sender: &PeerId, is_main: bool) -> Action {
        if !is_main || *sender == self.id {
            return Action::Ignore;
        }
        if self.is_main() {
            // A heartbeat from another MAIN only matters when ids break ties
            let policy = self.policy;
            return match policy {
                ElectionPolicy::YieldToNewest => Action::Ignore,
                ElectionPolicy::LowestIdWins if *sender < self.id => self.follow(sender),
                ElectionPolicy::LowestIdWins => Action::Ignore,
            };
        }
        self.follow(sender)
    }

    pub fn on_new_main(&mut self, sender: &PeerId) -> Action {
        if *sender == self.id {
            return Action::Ignore;
        }
        if self.is_main() && self.policy == ElectionPolicy::LowestIdWins && *sender > self.id {
            return Action::Ignore;
        }
        self.follow(sender)
    }

    pub fn on_main_closed(&mut self, visible: bool) -> Action {
        if !self.is_main() && visible {
            return self.promote();
        }
        Action::Ignore
    }

    pub fn on_grace_expired(&mut self, visible: bool) -> Action {
        if self.role != Role::Init {
            return Action::Ignore;
        }
        self.grace_elapsed = true;
        if self.believed_main.is_none() && visible {
            return self.promote();
        }
        Action::Ignore
    }

    /// A hidden peer that sat out its grace window claims MAIN once it is
    /// shown, provided nobody else has claimed it meanwhile
    pub fn on_visibility_changed(&mut self, visible: bool) -> Action {
        if visible && self.role == Role::Init && self.grace_elapsed && self.believed_main.is_none()
        {
            return self.promote();
        }
        Action::Ignore
    }

    pub fn on_watchdog_fired(&mut self) -> Action {
        if self.is_main() {
            return Action::Ignore;
        }
        self.promote()
    }

    pub fn request_main(&mut self) -> Action {
        if self.is_main() {
            return Action::Ignore;
        }
        self.promote()
    }

    pub fn request_secondary(&mut self) -> Action {
        if !self.is_main() {
            return Action::Ignore;
        }
        self.role = Role::Secondary;
        self.believed_main = None;
        Action::StepDown
    }

    fn promote(&mut self) -> Action {
        self.role = Role::Main;
        self.believed_main = Some(self.id.clone());
        Action::Promote
    }

    fn follow(&mut self, leader: &PeerId) -> Action {
        self.believed_main = Some(leader.clone());
        match self.role {
            Role::Secondary => Action::RearmWatchdog,
            Role::Init | Role::Main => {
                self.role = Role::Secondary;
                Action::StepDown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(id: &str) -> RoleMachine {
        RoleMachine::new(PeerId::from(id), ElectionPolicy::YieldToNewest)
    }

    fn peer(id: &str) -> PeerId {
        PeerId::from(id)
    }

    #[test]
    fn test_grace_expiry_promotes_visible_peer() {
        let mut m = machine("a");
        assert_eq!(m.role(), Role::Init);
        assert_eq!(m.on_grace_expired(true), Action::Promote);
        assert!(m.is_main());
        assert_eq!(m.believed_main(), Some(&peer("a")));
    }

    #[test]
    fn test_hidden_peer_waits_until_shown() {
        let mut m = machine("a");
        assert_eq!(m.on_grace_expired(false), Action::Ignore);
        assert_eq!(m.role(), Role::Init);

        assert_eq!(m.on_visibility_changed(false), Action::Ignore);
        assert_eq!(m.on_visibility_changed(true), Action::Promote);
        assert!(m.is_main());
    }

    #[test]
    fn test_visibility_before_grace_does_not_promote() {
        let mut m = machine("a");
        assert_eq!(m.on_visibility_changed(true), Action::Ignore);
        assert_eq!(m.role(), Role::Init);
    }

    #[test]
    fn test_heartbeat_during_grace_makes_secondary() {
        let mut m = machine("b");
        assert_eq!(m.on_heartbeat(&peer("a"), true), Action::StepDown);
        assert_eq!(m.role(), Role::Secondary);
        assert_eq!(m.believed_main(), Some(&peer("a")));

        // Grace expiry after a leader was seen changes nothing
        assert_eq!(m.on_grace_expired(true), Action::Ignore);
        assert_eq!(m.role(), Role::Secondary);

        assert_eq!(m.on_heartbeat(&peer("a"), true), Action::RearmWatchdog);
    }

    #[test]
    fn test_non_main_heartbeat_ignored() {
        let mut m = machine("b");
        assert_eq!(m.on_heartbeat(&peer("a"), false), Action::Ignore);
        assert_eq!(m.believed_main(), None);
        assert_eq!(m.role(), Role::Init);
    }

    #[test]
    fn test_watchdog_promotes_secondary_only() {
        let mut m = machine("b");
        m.on_heartbeat(&peer("a"), true);
        assert_eq!(m.on_watchdog_fired(), Action::Promote);
        assert_eq!(m.on_watchdog_fired(), Action::Ignore);
    }

    #[test]
    fn test_new_main_from_other_yields() {
        let mut m = machine("a");
        m.on_grace_expired(true);

        assert_eq!(m.on_new_main(&peer("a")), Action::Ignore);
        assert!(m.is_main());

        assert_eq!(m.on_new_main(&peer("z")), Action::StepDown);
        assert_eq!(m.role(), Role::Secondary);
        assert_eq!(m.believed_main(), Some(&peer("z")));
    }

    #[test]
    fn test_main_ignores_other_heartbeats_by_default() {
        let mut m = machine("b");
        m.on_grace_expired(true);
        assert_eq!(m.on_heartbeat(&peer("a"), true), Action::Ignore);
        assert!(m.is_main());
        assert_eq!(m.believed_main(), Some(&peer("b")));
    }

    #[test]
    fn test_lowest_id_wins_tie_break() {
        let mut low = RoleMachine::new(peer("aaa"), ElectionPolicy::LowestIdWins);
        let mut high = RoleMachine::new(peer("zzz"), ElectionPolicy::LowestIdWins);
        low.on_grace_expired(true);
        high.on_grace_expired(true);

        // Each hears the other's claim
        assert_eq!(low.on_new_main(&peer("zzz")), Action::Ignore);
        assert_eq!(high.on_new_main(&peer("aaa")), Action::StepDown);
        assert!(low.is_main());
        assert!(!high.is_main());

        // A stale higher claimant also yields on the smaller id's heartbeat
        high.request_main();
        assert_eq!(high.on_heartbeat(&peer("aaa"), true), Action::StepDown);
        assert_eq!(low.on_heartbeat(&peer("zzz"), true), Action::Ignore);
    }

    #[test]
    fn test_main_closed_requires_visibility() {
        let mut m = machine("b");
        m.on_heartbeat(&peer("a"), true);

        assert_eq!(m.on_main_closed(false), Action::Ignore);
        assert_eq!(m.role(), Role::Secondary);
        assert_eq!(m.on_main_closed(true), Action::Promote);
        assert_eq!(m.on_main_closed(true), Action::Ignore);
    }

    #[test]
    fn test_manual_role_requests() {
        let mut m = machine("a");
        assert_eq!(m.request_secondary(), Action::Ignore);
        assert_eq!(m.request_main(), Action::Promote);
        assert_eq!(m.request_main(), Action::Ignore);

        assert_eq!(m.request_secondary(), Action::StepDown);
        assert_eq!(m.role(), Role::Secondary);
        assert_eq!(m.believed_main(), None);
    }

    #[test]
    fn test_controls_follow_role() {
        let main = Controls::for_role(Role::Main);
        assert!(main.delete_last && main.become_secondary && !main.become_main);

        for role in [Role::Init, Role::Secondary] {
            let c = Controls::for_role(role);
            assert!(!c.delete_last && !c.become_secondary && c.become_main);
        }
    }
}
