//! # attendance-core
//!
//! Attendance tracking for timed events: who was present, for how long, and
//! who arrived late.
//!
//! ## Design Principles
//!
//! - **Synchronous, single timeline**: notifications are applied one at a time,
//!   in delivery order, through [`Tracker::handle`]. Nothing blocks.
//! - **Not thread-safe**: the host owns the [`Tracker`] and provides its own
//!   synchronization if it needs any.
//! - **No ambient state**: ledger, roster and session live in the tracker value.
//! - **Pure rendering**: [`render_report`] never mutates; same inputs give the
//!   same bytes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use attendance_core::{AttendanceConfig, Tracker};
//! use attendance_protocol::{Actor, AttendanceEvent};
//!
//! let mut tracker = Tracker::new(AttendanceConfig::default());
//! tracker.start_session(0)?;
//! tracker.handle(AttendanceEvent::ActorAppeared { tick: 0, actor: Actor::new("Zezima").in_primary() });
//! tracker.stop_session(1000)?;
//! println!("{}", tracker.render_report(true, 1000).to_text("\n"));
//! ```

pub mod autosave;
pub mod config;
pub mod error;
pub mod export;
pub mod identity;
pub mod ledger;
pub mod patterns;
pub mod report;
pub mod roster;
pub mod session;
pub mod tracker;

pub use autosave::{should_autosave, TICKS_PER_MINUTE};
pub use config::{load_config, AttendanceConfig, ChannelMode, OutputFormat};
pub use error::{AttendanceError, Result, Transition};
pub use export::{persist_report, ReportSink, EXPORT_LINE_BREAK};
pub use identity::{normalize, IdentityKey};
pub use ledger::{AttendanceLedger, MemberAttendance, MemberSnapshot};
pub use report::{format_duration, render_report, ticks_to_seconds, Palette, Report, ReportLine, RowTone};
pub use roster::RosterFilter;
pub use session::{Session, SessionState};
pub use tracker::{TickOutcome, Tracker};
