//! Channel scope decisions.
//!
//! An actor counts for attendance when one of the requested channels is
//! enabled in the configuration and the actor belongs to it. Membership comes
//! from the actor's own flag first; the maintained roster set is the fallback
//! for hosts that cannot report the flag.
//!
//! The host does not always report the observer's own channel leave, so a
//! roster may be stale by one entry until the next rebuild or tick re-scan.
//! The primary roster is rebuilt from the host's roster. The secondary roster
//! only grows through join events, so it is emptied at session start and
//! rebuilt from the actors' own flags on every re-scan.

use attendance_protocol::{Actor, Channel};
use std::collections::BTreeSet;

use crate::config::ChannelMode;
use crate::identity::{normalize, IdentityKey};

#[derive(Debug, Default)]
pub struct RosterFilter {
    mode: ChannelMode,
    primary: BTreeSet<IdentityKey>,
    secondary: BTreeSet<IdentityKey>,
}

impl RosterFilter {
    pub fn new(mode: ChannelMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn reconfigure(&mut self, mode: ChannelMode) {
        self.mode = mode;
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Primary => self.mode.primary_enabled(),
            Channel::Secondary => self.mode.secondary_enabled(),
        }
    }

    pub fn is_in_scope(&self, actor: &Actor, via_primary: bool, via_secondary: bool) -> bool {
        let key = normalize(&actor.name);
        (via_primary && self.belongs_to(Channel::Primary, actor, &key))
            || (via_secondary && self.belongs_to(Channel::Secondary, actor, &key))
    }

    /// Scope check through a single channel.
    pub fn is_in_scope_via(&self, actor: &Actor, channel: Channel) -> bool {
        match channel {
            Channel::Primary => self.is_in_scope(actor, true, false),
            Channel::Secondary => self.is_in_scope(actor, false, true),
        }
    }

    fn belongs_to(&self, channel: Channel, actor: &Actor, key: &IdentityKey) -> bool {
        self.is_enabled(channel) && (actor.is_member_of(channel) || self.roster(channel).contains(key))
    }

    /// Wholesale replacement of the primary roster; `None` clears it.
    pub fn roster_changed(&mut self, roster: Option<&[String]>) {
        self.primary.clear();
        if let Some(names) = roster {
            self.primary.extend(names.iter().map(|name| normalize(name)));
        }
    }

    /// Replaces the secondary roster with the visible actors flagged as
    /// secondary members.
    pub fn rebuild_secondary<'a>(&mut self, visible: impl IntoIterator<Item = &'a Actor>) {
        self.secondary = visible
            .into_iter()
            .filter(|actor| actor.secondary_member)
            .map(|actor| normalize(&actor.name))
            .collect();
    }

    pub fn clear_secondary(&mut self) {
        self.secondary.clear();
    }

    pub fn member_joined(&mut self, channel: Channel, name: &str) {
        if !self.is_enabled(channel) {
            return;
        }
        self.roster_mut(channel).insert(normalize(name));
    }

    pub fn member_left(&mut self, channel: Channel, name: &str) {
        if !self.is_enabled(channel) {
            return;
        }
        self.roster_mut(channel).remove(&normalize(name));
    }

    pub fn roster(&self, channel: Channel) -> &BTreeSet<IdentityKey> {
        match channel {
            Channel::Primary => &self.primary,
            Channel::Secondary => &self.secondary,
        }
    }

    fn roster_mut(&mut self, channel: Channel) -> &mut BTreeSet<IdentityKey> {
        match channel {
            Channel::Primary => &mut self.primary,
            Channel::Secondary => &mut self.secondary,
        }
    }
}
