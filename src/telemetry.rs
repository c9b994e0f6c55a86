//! CSV session logs
//!
//! Two append-only streams per session: one row per tick with the raw emotion
//! channels, and one row per adaptive segment choice with the bandit terms and
//! the per-segment emotion means. Writing is best-effort; a failed write is
//! reported through `log` and the simulation carries on.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::settings::RunSettings;
use crate::sim::bandit::Choice;
use crate::sim::emotion::{CHANNEL_COUNT, Emotion, EmotionSample};

/// Destination for log lines
pub trait LogSink {
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

/// Appends to a file, opened on first write
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        if self.file.is_none() {
            self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        match self.file.as_mut() {
            Some(file) => writeln!(file, "{line}"),
            None => Ok(()),
        }
    }
}

/// Keeps lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl LogSink for MemorySink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.borrow_mut().push(line.to_string());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn append_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

fn emotion_header() -> String {
    Emotion::ALL.map(|e| e.as_str()).join(",")
}

fn join_values(values: &[f32; CHANNEL_COUNT]) -> String {
    values.map(|v| v.to_string()).join(",")
}

fn id_or_none(id: Option<usize>) -> String {
    id.map_or_else(|| "-1".to_string(), |id| id.to_string())
}

/// The two streams of a session
pub struct SessionLog {
    ticks: Box<dyn LogSink>,
    summary: Box<dyn LogSink>,
    headers_written: bool,
    failures: u32,
}

impl std::fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLog")
            .field("headers_written", &self.headers_written)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl SessionLog {
    pub fn new(ticks: Box<dyn LogSink>, summary: Box<dyn LogSink>) -> Self {
        Self {
            ticks,
            summary,
            headers_written: false,
            failures: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NullSink), Box::new(NullSink))
    }

    /// File-backed logs under `settings.log_dir`, or disabled when unset
    pub fn from_settings(settings: &RunSettings) -> Self {
        let Some(dir) = settings.log_dir.as_deref() else {
            return Self::disabled();
        };
        let (all, summary) = settings.log_file_names();
        let dir = Path::new(dir);
        Self::new(
            Box::new(FileSink::new(dir.join(all))),
            Box::new(FileSink::new(dir.join(summary))),
        )
    }

    /// Number of writes that failed this session
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn write(sink: &mut dyn LogSink, failures: &mut u32, line: &str) {
        if let Err(e) = sink.append_line(line) {
            *failures += 1;
            // One warning is enough; the same failure tends to repeat every tick
            if *failures == 1 {
                log::warn!("Session log write failed: {e}");
            }
        }
    }

    /// Header rows; only the first call per session writes anything
    pub fn write_headers(&mut self) {
        if self.headers_written {
            return;
        }
        self.headers_written = true;
        let emotions = emotion_header();
        Self::write(
            self.summary.as_mut(),
            &mut self.failures,
            &format!(
                "Game,Section,Current_Section_ID,PCG_Section_ID,PCG_NextID,UCTScore,ExploitScore,ExploreScore,{emotions},Game Score"
            ),
        );
        Self::write(
            self.ticks.as_mut(),
            &mut self.failures,
            &format!("Game,Section,Current_Section_ID,{emotions}"),
        );
    }

    /// One row per tick; channels are left blank when the sensor had no reading
    pub fn tick_row(
        &mut self,
        game: u32,
        section: u32,
        segment: Option<usize>,
        sample: Option<&EmotionSample>,
    ) {
        let values = match sample {
            Some(sample) => join_values(&sample.values),
            None => [""; CHANNEL_COUNT].join(","),
        };
        let line = format!("{game},{section},{},{values}", id_or_none(segment));
        Self::write(self.ticks.as_mut(), &mut self.failures, &line);
    }

    /// One row per adaptive choice
    pub fn summary_row(
        &mut self,
        game: u32,
        section: u32,
        current: Option<usize>,
        choice: &Choice,
        emotion_means: &[f32; CHANNEL_COUNT],
        outcome: f32,
    ) {
        let line = format!(
            "{game},{section},{},{},{},{},{},{},{},{outcome}",
            id_or_none(current),
            choice.previous,
            choice.variant,
            choice.best_score,
            choice.exploit,
            choice.explore,
            join_values(emotion_means),
        );
        Self::write(self.summary.as_mut(), &mut self.failures, &line);
    }
}
