//! Event log replay.
//!
//! Each line is parsed, checked for tick ordering, then either drives the
//! session lifecycle (commands) or goes through [`Tracker::handle`] (events).
//! Rejected transitions are logged and skipped; a malformed line stops the
//! replay.

use attendance_core::{
    load_config, persist_report, AttendanceConfig, Palette, Report, ReportSink, Tracker,
};
use attendance_protocol::{parse_line, LogEntry, OrderingGuard, SessionCommand, Tick};
use chrono::Local;
use fs_err as fs;
use std::path::PathBuf;

use crate::export::{default_output_dir, FileSink};
use crate::RenderFormat;

pub struct ReplayOptions {
    pub events: PathBuf,
    pub config: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub format: RenderFormat,
}

pub fn run(options: &ReplayOptions) -> Result<(), String> {
    let config = load_config(options.config.clone())?;
    let out_dir = match &options.out_dir {
        Some(dir) => dir.clone(),
        None => default_output_dir()?,
    };
    let content = fs::read_to_string(&options.events)
        .map_err(|e| format!("Failed to read event log: {}", e))?;

    let palette = Palette::from_config(&config);
    let mut replay = Replay::new(config, out_dir);
    replay.ingest(&content)?;

    for report in replay.printable_reports() {
        println!("{}", format_report(&report, options.format, &palette)?);
    }
    Ok(())
}

pub fn format_report(
    report: &Report,
    format: RenderFormat,
    palette: &Palette,
) -> Result<String, String> {
    match format {
        RenderFormat::Text => Ok(report.to_text("\n")),
        RenderFormat::Html => Ok(report.to_html(palette)),
        RenderFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("Failed to serialize report: {}", e)),
    }
}

pub struct Replay {
    tracker: Tracker,
    out_dir: PathBuf,
    sink: Option<FileSink>,
    guard: OrderingGuard,
    last_tick: Tick,
    reports: Vec<Report>,
    saved: Vec<PathBuf>,
}

impl Replay {
    pub fn new(config: AttendanceConfig, out_dir: PathBuf) -> Self {
        Self {
            tracker: Tracker::new(config),
            out_dir,
            sink: None,
            guard: OrderingGuard::default(),
            last_tick: 0,
            reports: Vec::new(),
            saved: Vec::new(),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Reports requested by `render` lines, in log order.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Files written at least once, in the order they were first written.
    pub fn saved_files(&self) -> &[PathBuf] {
        &self.saved
    }

    /// The requested reports, or a report for the last tick when the log
    /// asked for none. That fallback is a live render while export is blocked.
    pub fn printable_reports(&self) -> Vec<Report> {
        if self.reports.is_empty() {
            let final_render = self.tracker.can_export();
            vec![self.tracker.render_report(final_render, self.last_tick)]
        } else {
            self.reports.clone()
        }
    }

    pub fn ingest(&mut self, content: &str) -> Result<(), String> {
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = parse_line(line).map_err(|e| format!("line {}: {}", index + 1, e))?;
            self.guard
                .check(&entry)
                .map_err(|e| format!("line {}: {}", index + 1, e))?;
            if let Some(tick) = entry.tick() {
                self.last_tick = tick;
            }
            self.apply(entry);
        }
        tracing::debug!(
            members = self.tracker.ledger().len(),
            last_tick = self.last_tick,
            "Replay finished"
        );
        Ok(())
    }

    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Command(SessionCommand::SessionStart { tick }) => {
                if self.tracker.start_session(tick).is_ok() {
                    self.sink = self
                        .tracker
                        .config()
                        .save_locally
                        .then(|| FileSink::new(&self.out_dir, Local::now()));
                }
            }
            LogEntry::Command(SessionCommand::SessionStop { tick }) => {
                if self.tracker.stop_session(tick).is_ok() {
                    self.save(tick);
                    self.sink = None;
                }
            }
            LogEntry::Command(SessionCommand::Render { tick, final_render }) => {
                if final_render && !self.tracker.can_export() {
                    tracing::warn!(tick, "Export blocked while the event is running");
                    return;
                }
                self.reports
                    .push(self.tracker.render_report(final_render, tick));
            }
            LogEntry::Event(event) => {
                let Some(outcome) = self.tracker.handle(event) else {
                    return;
                };
                if outcome.autosave_due {
                    self.save(outcome.tick);
                }
            }
        }
    }

    fn save(&mut self, tick: Tick) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if persist_report(&mut self.tracker, sink as &mut dyn ReportSink, tick) {
            let path = sink.path().to_path_buf();
            if !self.saved.contains(&path) {
                self.saved.push(path);
            }
        }
    }
}
