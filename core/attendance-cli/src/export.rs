//! File-backed report persistence.

use attendance_core::{AttendanceError, ReportSink};
use chrono::{DateTime, Local};
use fs_err as fs;
use std::path::{Path, PathBuf};

const OUTPUT_DIR_NAME: &str = "clan-event-attendance";

pub fn default_output_dir() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir().ok_or("Cannot determine data directory")?;
    Ok(data_dir.join(OUTPUT_DIR_NAME))
}

pub fn export_file_name(started_at: DateTime<Local>) -> String {
    format!("attendance-{}.txt", started_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// One file per event; every save rewrites it with the latest report.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(dir: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            path: dir.join(export_file_name(started_at)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for FileSink {
    fn persist(&mut self, text: &str) -> attendance_core::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| AttendanceError::Io {
                context: format!("creating {}", parent.display()),
                source,
            })?;
        }
        fs::write(&self.path, format!("{}\n", text)).map_err(|source| AttendanceError::Io {
            context: format!("writing {}", self.path.display()),
            source,
        })
    }
}
