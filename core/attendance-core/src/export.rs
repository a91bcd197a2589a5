//! Hand-off of final reports to a persistence collaborator.
//!
//! Persistence is outside the core: a failed save is logged and otherwise
//! ignored, and never touches ledger state.

use attendance_protocol::Tick;
use tracing::{info, warn};

use crate::error::Result;
use crate::tracker::Tracker;

/// Line break used for exported plain text.
pub const EXPORT_LINE_BREAK: &str = "\n";

pub trait ReportSink {
    /// Stores the full plain-text report, replacing any earlier save of the
    /// same event.
    fn persist(&mut self, text: &str) -> Result<()>;
}

/// Renders a final report at `tick` and hands it to `sink`. The autosave
/// clock restarts whether or not the save succeeded.
pub fn persist_report(tracker: &mut Tracker, sink: &mut dyn ReportSink, tick: Tick) -> bool {
    let text = tracker.render_report(true, tick).to_text(EXPORT_LINE_BREAK);
    let saved = match sink.persist(&text) {
        Ok(()) => {
            info!(tick, bytes = text.len(), "Attendance report saved");
            true
        }
        Err(err) => {
            warn!(tick, error = %err, "Failed to save attendance report");
            false
        }
    };
    tracker.mark_autosaved(tick);
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttendanceConfig;
    use crate::error::AttendanceError;
    use attendance_protocol::{Actor, AttendanceEvent};

    #[derive(Default)]
    struct MemorySink {
        saves: Vec<String>,
    }

    impl ReportSink for MemorySink {
        fn persist(&mut self, text: &str) -> Result<()> {
            self.saves.push(text.to_string());
            Ok(())
        }
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn persist(&mut self, _text: &str) -> Result<()> {
            Err(AttendanceError::Io {
                context: "writing report".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn running_tracker() -> Tracker {
        let mut tracker = Tracker::new(AttendanceConfig {
            save_locally: true,
            ..AttendanceConfig::default()
        });
        tracker.start_session(0).expect("start");
        tracker.handle(AttendanceEvent::ActorAppeared {
            tick: 0,
            actor: Actor::new("Alice").in_primary(),
        });
        tracker
    }

    #[test]
    fn persists_final_render_and_restarts_clock() {
        let mut tracker = running_tracker();
        let mut sink = MemorySink::default();

        assert!(persist_report(&mut tracker, &mut sink, 100));
        assert_eq!(sink.saves.len(), 1);
        assert!(sink.saves[0].starts_with("Event name: \nHosted by: \n\nEvent Duration: 01:00"));
        assert!(sink.saves[0].ends_with("Thanks for coming!"));
        assert_eq!(tracker.session().last_autosave_tick(), 100);
    }

    #[test]
    fn failed_save_leaves_ledger_untouched() {
        let mut tracker = running_tracker();
        let before = tracker.snapshot();

        assert!(!persist_report(&mut tracker, &mut FailingSink, 100));
        assert_eq!(tracker.snapshot(), before);
        assert_eq!(tracker.session().last_autosave_tick(), 100);
    }
}
