//! Ledger → attendance report.
//!
//! Rendering is a pure projection: it reads a snapshot and never touches the
//! ledger, so two renders of the same inputs are byte-identical. The text
//! layout is consumed downstream (chat posts, saved files) and must not drift:
//!
//! ```text
//! Event Duration: 18:36
//!
//! Present Members
//! ------------------------------
//! Name         | Time   | Late
//! JoRouss      | 06:46  | 01:07
//!
//! Below Threshold (10:00)
//! ------------------------------
//! Name         | Time   | Late
//! SomeDude     | 02:46  | -
//! ```
//!
//! A [`Report`] is the sequence of lines between line breaks, so each host
//! picks its own break representation ([`Report::to_text`], [`Report::to_html`]).

use attendance_protocol::Tick;
use serde::Serialize;

use crate::config::{AttendanceConfig, OutputFormat};
use crate::ledger::MemberSnapshot;
use crate::patterns::split_lines;
use crate::session::Session;

const TIER_RULE: &str = "------------------------------";
const PRESENT_TITLE: &str = "Present Members";
const CODE_FENCE: &str = "```";
const NOT_LATE: &str = "-";
const NEUTRAL_COLOR: &str = "#FFFFFF";

/// Whole seconds in `ticks`, truncated. One tick is 0.6 s.
pub fn ticks_to_seconds(ticks: Tick) -> u64 {
    // Split so the multiply cannot overflow.
    ticks / 5 * 3 + ticks % 5 * 3 / 5
}

/// `mm:ss`, or `mmm:ss` once minutes exceed 99.
pub fn format_duration(total_seconds: u64) -> String {
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    if minutes > 99 {
        format!("{:03}:{:02}", minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Row color class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowTone {
    Present,
    Absent,
    /// Session stopped; rows are no longer distinguished.
    Neutral,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<RowTone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub lines: Vec<ReportLine>,
}

/// Colors for the HTML panel projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub present: String,
    pub absent: String,
    pub neutral: String,
}

impl Palette {
    pub fn from_config(config: &AttendanceConfig) -> Self {
        Self {
            present: config.present_color.clone(),
            absent: config.absent_color.clone(),
            neutral: NEUTRAL_COLOR.to_string(),
        }
    }

    fn color(&self, tone: RowTone) -> &str {
        match tone {
            RowTone::Present => &self.present,
            RowTone::Absent => &self.absent,
            RowTone::Neutral => &self.neutral,
        }
    }
}

impl Report {
    /// Plain text with `line_break` between lines (clipboard and file form).
    pub fn to_text(&self, line_break: &str) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(line_break)
    }

    /// Panel markup with colored rows.
    pub fn to_html(&self, palette: &Palette) -> String {
        let body = self
            .lines
            .iter()
            .map(|line| match line.tone {
                Some(tone) => format!(
                    "<font color='{}'>{}</font>",
                    palette.color(tone),
                    line.text
                ),
                None => line.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("<br/>");
        format!("<html><body><pre>{}</pre></body></html>", body)
    }
}

#[derive(Default)]
struct ReportBuilder {
    lines: Vec<ReportLine>,
    current: ReportLine,
}

impl ReportBuilder {
    fn push(&mut self, text: &str) {
        self.current.text.push_str(text);
    }

    fn push_line(&mut self, text: &str) {
        self.push(text);
        self.line_break();
    }

    /// Appends free text whose own line breaks become report line breaks.
    fn push_multiline(&mut self, text: &str) {
        for (index, part) in split_lines(text).into_iter().enumerate() {
            if index > 0 {
                self.line_break();
            }
            self.push(part);
        }
    }

    fn push_row(&mut self, row: ReportLine) {
        self.push(&row.text);
        self.current.tone = row.tone;
        self.line_break();
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    /// The unterminated tail becomes the last line, possibly empty.
    fn finish(mut self) -> Report {
        self.lines.push(self.current);
        Report { lines: self.lines }
    }
}

/// Renders `members` for the current or finished event.
///
/// `final_render` marks an export render: it adds the configured prefix and
/// suffix, and the markdown fence when the output is text.
pub fn render_report(
    members: &[MemberSnapshot],
    session: &Session,
    config: &AttendanceConfig,
    final_render: bool,
    current_tick: Tick,
) -> Report {
    let present_threshold = u64::from(config.present_threshold_secs);
    let (present, below): (Vec<&MemberSnapshot>, Vec<&MemberSnapshot>) = members
        .iter()
        .partition(|member| ticks_to_seconds(member.accumulated_ticks) >= present_threshold);

    let mut builder = ReportBuilder::default();

    if final_render && !config.list_prefix.is_empty() {
        builder.push_multiline(&config.list_prefix);
        builder.line_break();
        builder.line_break();
    }

    builder.push("Event Duration: ");
    builder.push(&format_duration(ticks_to_seconds(
        session.duration_ticks(current_tick),
    )));
    builder.line_break();
    builder.line_break();

    let fenced =
        final_render && config.markdown_code_block && config.output_format == OutputFormat::Text;
    if fenced {
        builder.push_line(CODE_FENCE);
    }

    if !present.is_empty() {
        builder.push_line(PRESENT_TITLE);
        push_tier(&mut builder, &present, session, config);
    }

    if !below.is_empty() {
        if !present.is_empty() {
            builder.line_break();
        }
        builder.push_line(&format!(
            "Below Threshold ({})",
            format_duration(present_threshold)
        ));
        push_tier(&mut builder, &below, session, config);
    }

    if fenced {
        builder.push(CODE_FENCE);
    }

    if final_render && !config.list_suffix.is_empty() {
        builder.line_break();
        builder.line_break();
        builder.push_multiline(&config.list_suffix);
    }

    builder.finish()
}

fn push_tier(
    builder: &mut ReportBuilder,
    members: &[&MemberSnapshot],
    session: &Session,
    config: &AttendanceConfig,
) {
    builder.push_line(TIER_RULE);
    builder.push_line(&format_columns(config.late_tracking, "Name", "Time", "Late"));
    for member in members {
        builder.push_row(member_row(member, session, config));
    }
}

fn member_row(member: &MemberSnapshot, session: &Session, config: &AttendanceConfig) -> ReportLine {
    let late_seconds = ticks_to_seconds(member.arrival_offset_ticks);
    let late_column = if late_seconds > u64::from(config.late_threshold_secs) {
        format_duration(late_seconds)
    } else {
        NOT_LATE.to_string()
    };

    let tone = match (session.is_running(), member.is_present) {
        (true, true) => RowTone::Present,
        (true, false) => RowTone::Absent,
        (false, _) => RowTone::Neutral,
    };

    ReportLine {
        text: format_columns(
            config.late_tracking,
            &member.display_name,
            &format_duration(ticks_to_seconds(member.accumulated_ticks)),
            &late_column,
        ),
        tone: Some(tone),
    }
}

fn format_columns(late_tracking: bool, name: &str, time: &str, late: &str) -> String {
    if late_tracking {
        format!("{:<12} | {:<6} | {:<6}", name, time, late)
    } else {
        format!("{:<12} | {:<6}", name, time)
    }
}
