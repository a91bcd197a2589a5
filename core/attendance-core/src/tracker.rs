//! The owned aggregate that ingests notifications.
//!
//! Every notification goes through [`Tracker::handle`], one at a time, in
//! delivery order. Each arm decides scope first (roster filter), then mutates
//! the ledger. Presence marking is idempotent, so the same actor reported by
//! several upstream sources is counted once.

use attendance_protocol::{Actor, AttendanceEvent, Channel, Tick};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::autosave::should_autosave;
use crate::config::AttendanceConfig;
use crate::error::Result;
use crate::identity::{normalize, IdentityKey};
use crate::ledger::{AttendanceLedger, MemberSnapshot};
use crate::report::{render_report, Report};
use crate::roster::RosterFilter;
use crate::session::Session;

/// What a tick produced for the display and save collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    pub tick: Tick,
    /// Live (non-final) render after the fold pass.
    pub report: Report,
    pub rescanned: bool,
    /// The host should persist a final render and call [`Tracker::mark_autosaved`].
    pub autosave_due: bool,
}

#[derive(Debug)]
pub struct Tracker {
    config: AttendanceConfig,
    roster: RosterFilter,
    ledger: AttendanceLedger,
    session: Session,
    /// Last known actors in view, with their direct membership flags.
    visible: BTreeMap<IdentityKey, Actor>,
}

impl Tracker {
    pub fn new(config: AttendanceConfig) -> Self {
        let mut session = Session::new();
        session.rescan().set_interval(config.rescan_interval_ticks);
        Self {
            roster: RosterFilter::new(config.channel_mode),
            config,
            ledger: AttendanceLedger::new(),
            session,
            visible: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }

    /// Swaps in a new configuration snapshot. Ledger state is kept.
    pub fn apply_config(&mut self, config: AttendanceConfig) {
        self.roster.reconfigure(config.channel_mode);
        self.session.rescan().set_interval(config.rescan_interval_ticks);
        debug!(channel_mode = ?config.channel_mode, "Configuration applied");
        self.config = config;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    pub fn roster(&self) -> &RosterFilter {
        &self.roster
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn snapshot(&self) -> Vec<MemberSnapshot> {
        self.ledger.snapshot()
    }

    pub fn start_session(&mut self, tick: Tick) -> Result<()> {
        if let Err(err) = self.session.start(&mut self.ledger, tick) {
            warn!(tick, error = %err, "Session start rejected");
            return Err(err);
        }
        self.roster.clear_secondary();
        info!(tick, "Event started");
        Ok(())
    }

    pub fn stop_session(&mut self, tick: Tick) -> Result<()> {
        if let Err(err) = self.session.stop(&mut self.ledger, tick) {
            warn!(tick, error = %err, "Session stop rejected");
            return Err(err);
        }
        info!(
            tick,
            members = self.ledger.len(),
            duration_ticks = self.session.duration_ticks(tick),
            "Event stopped"
        );
        Ok(())
    }

    pub fn render_report(&self, final_render: bool, current_tick: Tick) -> Report {
        render_report(
            &self.ledger.snapshot(),
            &self.session,
            &self.config,
            final_render,
            current_tick,
        )
    }

    /// Whether the export collaborator may copy the report right now.
    pub fn can_export(&self) -> bool {
        !self.config.block_copy_while_running || !self.is_running()
    }

    pub fn should_autosave_now(&self, current_tick: Tick) -> bool {
        self.config.save_locally
            && self.is_running()
            && should_autosave(
                current_tick,
                self.session.last_autosave_tick(),
                self.config.autosave_interval_minutes,
            )
    }

    pub fn mark_autosaved(&mut self, tick: Tick) {
        self.session.mark_autosaved(tick);
    }

    /// Ingests one notification. Only ticks produce an outcome.
    pub fn handle(&mut self, event: AttendanceEvent) -> Option<TickOutcome> {
        debug!(event = event.kind(), tick = ?event.tick(), "Ingesting event");

        match event {
            AttendanceEvent::ActorAppeared { tick, actor } => {
                self.actor_appeared(tick, actor);
                None
            }
            AttendanceEvent::ActorDisappeared { tick, name } => {
                let key = normalize(&name);
                self.visible.remove(&key);
                if self.is_running() {
                    self.ledger.mark_absent(&key, tick);
                }
                None
            }
            AttendanceEvent::RosterChanged { roster } => {
                self.roster.roster_changed(roster.as_deref());
                if roster.is_some() {
                    self.session.rescan().schedule();
                }
                None
            }
            AttendanceEvent::MemberJoined {
                tick,
                channel,
                name,
                same_world,
            } => {
                self.member_joined(tick, channel, &name, same_world);
                None
            }
            AttendanceEvent::MemberLeft {
                tick,
                channel,
                name,
                same_world,
            } => {
                self.member_left(tick, channel, &name, same_world);
                None
            }
            AttendanceEvent::Relocated => {
                self.session.rescan().schedule();
                None
            }
            AttendanceEvent::Tick {
                tick,
                visible,
                roster,
            } => self.tick(tick, visible, roster),
        }
    }

    fn actor_appeared(&mut self, tick: Tick, actor: Actor) {
        let key = normalize(&actor.name);
        if self.is_running() && self.roster.is_in_scope(&actor, true, true) {
            self.admit(&actor.name, tick);
        }
        self.visible.insert(key, actor);
    }

    fn member_joined(&mut self, tick: Tick, channel: Channel, name: &str, same_world: bool) {
        if !self.is_running() || !self.roster.is_enabled(channel) {
            return;
        }
        self.roster.member_joined(channel, name);

        let key = normalize(name);
        let Some(actor) = self.visible.get_mut(&key) else {
            return;
        };
        actor.set_member_of(channel, true);
        if !same_world {
            return;
        }
        let display_name = actor.name.clone();
        self.admit(&display_name, tick);
    }

    fn member_left(&mut self, tick: Tick, channel: Channel, name: &str, same_world: bool) {
        if !self.is_running() || !self.roster.is_enabled(channel) {
            return;
        }
        self.roster.member_left(channel, name);

        let key = normalize(name);
        if let Some(actor) = self.visible.get_mut(&key) {
            actor.set_member_of(channel, false);
        }
        if !same_world || !self.ledger.contains(&key) {
            return;
        }

        let still_in_scope = match self.visible.get(&key) {
            Some(actor) => self.roster.is_in_scope_via(actor, channel.other()),
            None => self
                .roster
                .is_in_scope_via(&Actor::new(name), channel.other()),
        };
        if still_in_scope {
            debug!(member = %key, ?channel, "Left one channel but still in scope");
            return;
        }
        self.ledger.mark_absent(&key, tick);
    }

    fn tick(
        &mut self,
        tick: Tick,
        visible: Vec<Actor>,
        roster: Option<Vec<String>>,
    ) -> Option<TickOutcome> {
        if !self.is_running() {
            return None;
        }

        let rescanned = self.session.rescan().advance();
        if rescanned {
            self.rescan(tick, visible, roster.as_deref());
        }

        self.ledger.fold_all(tick);

        Some(TickOutcome {
            tick,
            report: self.render_report(false, tick),
            rescanned,
            autosave_due: self.should_autosave_now(tick),
        })
    }

    /// Rebuilds both rosters and the visible cache from the host's view,
    /// then admits every in-scope actor.
    fn rescan(&mut self, tick: Tick, visible: Vec<Actor>, roster: Option<&[String]>) {
        self.roster.roster_changed(roster);
        self.visible = visible
            .into_iter()
            .map(|actor| (normalize(&actor.name), actor))
            .collect();
        self.roster.rebuild_secondary(self.visible.values());

        let in_scope: Vec<String> = self
            .visible
            .values()
            .filter(|actor| self.roster.is_in_scope(actor, true, true))
            .map(|actor| actor.name.clone())
            .collect();
        for name in &in_scope {
            self.admit(name, tick);
        }
        debug!(
            tick,
            visible = self.visible.len(),
            admitted = in_scope.len(),
            "Rescanned visible actors"
        );
    }

    fn admit(&mut self, display_name: &str, tick: Tick) {
        self.ledger
            .record_arrival(display_name, tick, self.session.start_tick());
        self.ledger.mark_present(&normalize(display_name), tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelMode;
    use crate::error::AttendanceError;

    fn appeared(tick: Tick, actor: Actor) -> AttendanceEvent {
        AttendanceEvent::ActorAppeared { tick, actor }
    }

    fn quiet_tick(tick: Tick) -> AttendanceEvent {
        AttendanceEvent::Tick {
            tick,
            visible: vec![],
            roster: None,
        }
    }

    fn accumulated(tracker: &Tracker, name: &str) -> Tick {
        tracker
            .ledger()
            .get_by_name(name)
            .expect("record")
            .accumulated_ticks
    }

    #[test]
    fn events_before_start_are_ignored() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.handle(appeared(0, Actor::new("Alice").in_primary()));
        assert!(tracker.handle(quiet_tick(1)).is_none());
        assert!(tracker.ledger().is_empty());
    }

    #[test]
    fn out_of_scope_actor_is_not_recorded() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(1, Actor::new("Stranger")));
        tracker.handle(appeared(1, Actor::new("Friend").in_secondary()));
        assert!(tracker.ledger().is_empty());
    }

    #[test]
    fn appear_disappear_accumulates_segment() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(10, Actor::new("Alice").in_primary()));
        tracker.handle(quiet_tick(20));
        tracker.handle(AttendanceEvent::ActorDisappeared {
            tick: 35,
            name: "alice".to_string(),
        });
        tracker.handle(quiet_tick(60));

        assert_eq!(accumulated(&tracker, "Alice"), 25);
        assert!(!tracker.ledger().get_by_name("Alice").expect("record").is_present);
    }

    #[test]
    fn duplicate_sources_count_once() {
        let mut config = AttendanceConfig::default();
        config.channel_mode = ChannelMode::Both;
        let mut tracker = Tracker::new(config);
        tracker.start_session(0).expect("start");

        tracker.handle(appeared(0, Actor::new("Alice").in_primary().in_secondary()));
        tracker.handle(AttendanceEvent::MemberJoined {
            tick: 5,
            channel: Channel::Secondary,
            name: "Alice".to_string(),
            same_world: true,
        });
        tracker.handle(quiet_tick(100));

        assert_eq!(accumulated(&tracker, "alice"), 100);
    }

    #[test]
    fn member_joined_admits_visible_actor() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Bob")));
        assert!(tracker.ledger().is_empty());

        tracker.handle(AttendanceEvent::MemberJoined {
            tick: 40,
            channel: Channel::Primary,
            name: "bob".to_string(),
            same_world: true,
        });
        let record = tracker.ledger().get_by_name("Bob").expect("record");
        assert!(record.is_present);
        assert_eq!(record.arrival_offset_ticks, 40);
        assert_eq!(record.display_name, "Bob");
    }

    #[test]
    fn member_joined_other_world_only_updates_roster() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Bob")));
        tracker.handle(AttendanceEvent::MemberJoined {
            tick: 1,
            channel: Channel::Primary,
            name: "Bob".to_string(),
            same_world: false,
        });
        assert!(tracker.ledger().is_empty());
        assert!(tracker.roster().roster(Channel::Primary).contains(&normalize("bob")));
    }

    #[test]
    fn member_left_pauses_unless_still_in_other_channel() {
        let mut config = AttendanceConfig::default();
        config.channel_mode = ChannelMode::Both;
        let mut tracker = Tracker::new(config);
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Both").in_primary().in_secondary()));
        tracker.handle(appeared(0, Actor::new("Solo").in_primary()));

        for name in ["Both", "Solo"] {
            tracker.handle(AttendanceEvent::MemberLeft {
                tick: 30,
                channel: Channel::Primary,
                name: name.to_string(),
                same_world: true,
            });
        }

        assert!(tracker.ledger().get_by_name("Both").expect("record").is_present);
        let solo = tracker.ledger().get_by_name("Solo").expect("record");
        assert!(!solo.is_present);
        assert_eq!(solo.accumulated_ticks, 30);
    }

    #[test]
    fn member_events_ignored_for_disabled_channel() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Alice").in_primary()));
        tracker.handle(AttendanceEvent::MemberLeft {
            tick: 10,
            channel: Channel::Secondary,
            name: "Alice".to_string(),
            same_world: true,
        });
        assert!(tracker.ledger().get_by_name("Alice").expect("record").is_present);
    }

    #[test]
    fn rescan_on_second_tick_admits_roster_members() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        let scan = |tick: Tick| AttendanceEvent::Tick {
            tick,
            visible: vec![Actor::new("Carol"), Actor::new("Dave")],
            roster: Some(vec!["carol".to_string()]),
        };

        let first = tracker.handle(scan(1)).expect("outcome");
        assert!(!first.rescanned);
        assert!(tracker.ledger().is_empty());

        let second = tracker.handle(scan(2)).expect("outcome");
        assert!(second.rescanned);
        assert!(tracker.ledger().get_by_name("Carol").is_some());
        assert!(tracker.ledger().get_by_name("Dave").is_none());

        let third = tracker.handle(scan(3)).expect("outcome");
        assert!(!third.rescanned);
        assert_eq!(accumulated(&tracker, "carol"), 1);
    }

    #[test]
    fn relocation_schedules_rescan() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(quiet_tick(1));
        tracker.handle(quiet_tick(2));
        assert!(!tracker.session().rescan_pending());

        tracker.handle(AttendanceEvent::Relocated);
        tracker.handle(quiet_tick(3));
        let outcome = tracker
            .handle(AttendanceEvent::Tick {
                tick: 4,
                visible: vec![Actor::new("Erin").in_primary()],
                roster: None,
            })
            .expect("outcome");
        assert!(outcome.rescanned);
        assert!(tracker.ledger().get_by_name("erin").is_some());
    }

    #[test]
    fn roster_changed_without_roster_clears_and_does_not_schedule() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.handle(AttendanceEvent::RosterChanged {
            roster: Some(vec!["Alice".to_string()]),
        });
        assert_eq!(tracker.roster().roster(Channel::Primary).len(), 1);

        tracker.handle(AttendanceEvent::RosterChanged { roster: None });
        assert!(tracker.roster().roster(Channel::Primary).is_empty());
    }

    fn secondary_mode() -> AttendanceConfig {
        AttendanceConfig {
            channel_mode: ChannelMode::Secondary,
            ..AttendanceConfig::default()
        }
    }

    fn unflagged_scan(tick: Tick) -> AttendanceEvent {
        AttendanceEvent::Tick {
            tick,
            visible: vec![Actor::new("Bob")],
            roster: None,
        }
    }

    #[test]
    fn secondary_roster_does_not_carry_into_next_session() {
        let mut tracker = Tracker::new(secondary_mode());
        tracker.start_session(0).expect("start");
        tracker.handle(AttendanceEvent::MemberJoined {
            tick: 1,
            channel: Channel::Secondary,
            name: "Bob".to_string(),
            same_world: false,
        });
        assert_eq!(tracker.roster().roster(Channel::Secondary).len(), 1);
        tracker.stop_session(10).expect("stop");

        tracker.start_session(20).expect("restart");
        assert!(tracker.roster().roster(Channel::Secondary).is_empty());
        tracker.handle(unflagged_scan(21));
        tracker.handle(unflagged_scan(22));
        assert!(tracker.ledger().get_by_name("bob").is_none());
    }

    #[test]
    fn rescan_reconciles_missed_secondary_leave() {
        let mut tracker = Tracker::new(secondary_mode());
        tracker.start_session(0).expect("start");
        tracker.handle(AttendanceEvent::MemberJoined {
            tick: 1,
            channel: Channel::Secondary,
            name: "Bob".to_string(),
            same_world: false,
        });

        tracker.handle(unflagged_scan(2));
        let outcome = tracker.handle(unflagged_scan(3)).expect("outcome");
        assert!(outcome.rescanned);
        assert!(tracker.roster().roster(Channel::Secondary).is_empty());
        assert!(tracker.ledger().get_by_name("bob").is_none());
    }

    #[test]
    fn rescan_admits_flagged_secondary_member() {
        let mut tracker = Tracker::new(secondary_mode());
        tracker.start_session(0).expect("start");
        let scan = |tick: Tick| AttendanceEvent::Tick {
            tick,
            visible: vec![Actor::new("Bob").in_secondary()],
            roster: None,
        };
        tracker.handle(scan(1));
        tracker.handle(scan(2));
        assert!(tracker.ledger().get_by_name("bob").expect("record").is_present);
    }

    #[test]
    fn apply_config_changes_scope_without_losing_records() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Alice").in_primary()));

        tracker.apply_config(AttendanceConfig {
            channel_mode: ChannelMode::Secondary,
            ..AttendanceConfig::default()
        });
        tracker.handle(appeared(5, Actor::new("Bob").in_primary()));

        assert_eq!(tracker.ledger().len(), 1);
        assert_eq!(tracker.roster().mode(), ChannelMode::Secondary);
    }

    #[test]
    fn tick_outcome_flags_autosave() {
        let config = AttendanceConfig {
            save_locally: true,
            autosave_interval_minutes: 1,
            ..AttendanceConfig::default()
        };
        let mut tracker = Tracker::new(config);
        tracker.start_session(0).expect("start");

        assert!(!tracker.handle(quiet_tick(99)).expect("outcome").autosave_due);
        assert!(tracker.handle(quiet_tick(100)).expect("outcome").autosave_due);
        tracker.mark_autosaved(100);
        assert!(!tracker.handle(quiet_tick(150)).expect("outcome").autosave_due);
    }

    #[test]
    fn autosave_requires_save_locally() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        assert!(!tracker.should_autosave_now(10_000));
    }

    #[test]
    fn export_blocked_while_running_when_configured() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        assert!(tracker.can_export());
        tracker.start_session(0).expect("start");
        assert!(!tracker.can_export());

        tracker.apply_config(AttendanceConfig {
            block_copy_while_running: false,
            ..AttendanceConfig::default()
        });
        assert!(tracker.can_export());
    }

    #[test]
    fn rejected_start_keeps_ledger() {
        let mut tracker = Tracker::new(AttendanceConfig::default());
        tracker.start_session(0).expect("start");
        tracker.handle(appeared(0, Actor::new("Alice").in_primary()));
        let err = tracker.start_session(10).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidTransition { .. }));
        assert_eq!(tracker.ledger().len(), 1);
    }
}
