//! Event schema and validation for attendance event logs.
//!
//! This crate is shared by the tracker core and its hosts to prevent schema
//! drift. A log is JSON lines: one object per line, tagged by `"type"`.
//! Session commands (`session_start`, `session_stop`, `render`) are kept
//! apart from the attendance events the core ingests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_LINE_BYTES: usize = 256 * 1024;
pub const MAX_NAME_CHARS: usize = 64;

/// Host time unit. One tick is 0.6 seconds.
pub type Tick = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Primary,
    Secondary,
}

impl Channel {
    pub fn other(self) -> Self {
        match self {
            Channel::Primary => Channel::Secondary,
            Channel::Secondary => Channel::Primary,
        }
    }
}

/// An actor as reported by the host, with its direct membership signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub primary_member: bool,
    #[serde(default)]
    pub secondary_member: bool,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_member: false,
            secondary_member: false,
        }
    }

    pub fn in_primary(mut self) -> Self {
        self.primary_member = true;
        self
    }

    pub fn in_secondary(mut self) -> Self {
        self.secondary_member = true;
        self
    }

    pub fn is_member_of(&self, channel: Channel) -> bool {
        match channel {
            Channel::Primary => self.primary_member,
            Channel::Secondary => self.secondary_member,
        }
    }

    pub fn set_member_of(&mut self, channel: Channel, member: bool) {
        match channel {
            Channel::Primary => self.primary_member = member,
            Channel::Secondary => self.secondary_member = member,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Notifications ingested by the tracker, one at a time, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttendanceEvent {
    ActorAppeared {
        tick: Tick,
        actor: Actor,
    },
    ActorDisappeared {
        tick: Tick,
        name: String,
    },
    /// Full replacement of the primary channel roster. `None` means the
    /// channel is gone and the roster is cleared.
    RosterChanged {
        #[serde(default)]
        roster: Option<Vec<String>>,
    },
    MemberJoined {
        tick: Tick,
        channel: Channel,
        name: String,
        #[serde(default = "default_true")]
        same_world: bool,
    },
    MemberLeft {
        tick: Tick,
        channel: Channel,
        name: String,
        #[serde(default = "default_true")]
        same_world: bool,
    },
    /// The observer changed worlds or logged in again; visible actors are unsettled.
    Relocated,
    Tick {
        tick: Tick,
        #[serde(default)]
        visible: Vec<Actor>,
        #[serde(default)]
        roster: Option<Vec<String>>,
    },
}

impl AttendanceEvent {
    pub fn tick(&self) -> Option<Tick> {
        match self {
            AttendanceEvent::ActorAppeared { tick, .. }
            | AttendanceEvent::ActorDisappeared { tick, .. }
            | AttendanceEvent::MemberJoined { tick, .. }
            | AttendanceEvent::MemberLeft { tick, .. }
            | AttendanceEvent::Tick { tick, .. } => Some(*tick),
            AttendanceEvent::RosterChanged { .. } | AttendanceEvent::Relocated => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceEvent::ActorAppeared { .. } => "actor_appeared",
            AttendanceEvent::ActorDisappeared { .. } => "actor_disappeared",
            AttendanceEvent::RosterChanged { .. } => "roster_changed",
            AttendanceEvent::MemberJoined { .. } => "member_joined",
            AttendanceEvent::MemberLeft { .. } => "member_left",
            AttendanceEvent::Relocated => "relocated",
            AttendanceEvent::Tick { .. } => "tick",
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            AttendanceEvent::ActorAppeared { actor, .. } => require_name(&actor.name, "actor.name"),
            AttendanceEvent::ActorDisappeared { name, .. }
            | AttendanceEvent::MemberJoined { name, .. }
            | AttendanceEvent::MemberLeft { name, .. } => require_name(name, "name"),
            AttendanceEvent::RosterChanged { roster } => require_roster(roster),
            AttendanceEvent::Tick {
                visible, roster, ..
            } => {
                for actor in visible {
                    require_name(&actor.name, "visible.name")?;
                }
                require_roster(roster)
            }
            AttendanceEvent::Relocated => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    SessionStart {
        tick: Tick,
    },
    SessionStop {
        tick: Tick,
    },
    /// Ask the host to print a report at this point of the log.
    Render {
        tick: Tick,
        #[serde(default)]
        final_render: bool,
    },
}

impl SessionCommand {
    pub fn tick(&self) -> Tick {
        match self {
            SessionCommand::SessionStart { tick }
            | SessionCommand::SessionStop { tick }
            | SessionCommand::Render { tick, .. } => *tick,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Command(SessionCommand),
    Event(AttendanceEvent),
}

impl LogEntry {
    pub fn tick(&self) -> Option<Tick> {
        match self {
            LogEntry::Command(command) => Some(command.tick()),
            LogEntry::Event(event) => event.tick(),
        }
    }
}

const COMMAND_TYPES: [&str; 3] = ["session_start", "session_stop", "render"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Parses and validates a single log line.
pub fn parse_line(line: &str) -> Result<LogEntry, ErrorInfo> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ErrorInfo::new(
            "line_too_large",
            format!("line exceeds {} bytes", MAX_LINE_BYTES),
        ));
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|err| ErrorInfo::new("invalid_json", format!("line is not JSON: {}", err)))?;
    parse_value(value)
}

pub fn parse_value(value: Value) -> Result<LogEntry, ErrorInfo> {
    let is_command = value
        .get("type")
        .and_then(|value| value.as_str())
        .map(|entry_type| COMMAND_TYPES.contains(&entry_type))
        .ok_or_else(|| ErrorInfo::new("missing_field", "type is required"))?;

    if is_command {
        let command: SessionCommand = serde_json::from_value(value).map_err(|err| {
            ErrorInfo::new("invalid_params", format!("command payload is invalid: {}", err))
        })?;
        return Ok(LogEntry::Command(command));
    }

    let event: AttendanceEvent = serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("event payload is invalid: {}", err))
    })?;
    event.validate()?;
    Ok(LogEntry::Event(event))
}

/// Rejects a log whose ticks go backwards.
#[derive(Debug, Default)]
pub struct OrderingGuard {
    last_tick: Option<Tick>,
}

impl OrderingGuard {
    pub fn check(&mut self, entry: &LogEntry) -> Result<(), ErrorInfo> {
        let Some(tick) = entry.tick() else {
            return Ok(());
        };

        if let Some(last) = self.last_tick {
            if tick < last {
                return Err(ErrorInfo::new(
                    "out_of_order",
                    format!("tick {} follows tick {}", tick, last),
                ));
            }
        }
        self.last_tick = Some(tick);
        Ok(())
    }
}

fn require_name(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if !value.chars().any(is_key_char) {
        return Err(ErrorInfo::new(
            "invalid_name",
            format!("{} has no ASCII letters or digits", field),
        ));
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(ErrorInfo::new(
            "invalid_name",
            format!("{} must be {} characters or fewer", field, MAX_NAME_CHARS),
        ));
    }
    Ok(())
}

/// Characters that survive identity normalization. Separators and anything
/// outside ASCII are dropped there, so a name made only of those has no key.
fn is_key_char(c: char) -> bool {
    c.is_ascii() && !c.is_whitespace() && c != '_' && c != '-'
}

fn require_roster(roster: &Option<Vec<String>>) -> Result<(), ErrorInfo> {
    if let Some(names) = roster {
        for name in names {
            require_name(name, "roster")?;
        }
    }
    Ok(())
}
