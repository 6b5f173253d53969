// ============================================================
// Layer 6 — Progress Tracking
// ============================================================
// Tracks how far a corpus run has got and projects its total
// runtime.
//
//   position  = groups skipped + groups processed (rows consumed)
//   percent   = position / total_groups × 100
//   projected = elapsed × (work in this run / work done so far)
//
// With no resume offset "work in this run" is the whole file and
// the projection is exactly elapsed × 100 / percent. Before any
// group has been processed, or when the total is unknown, the
// projection is reported as unknown instead of dividing by zero.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct ProgressState {
    pub groups_processed: usize,
    pub groups_skipped:   usize,
    pub total_groups:     Option<usize>,
    start_instant:        Instant,
    start_unix:           u64,
}

impl ProgressState {
    pub fn start(total_groups: Option<usize>) -> Self {
        Self {
            groups_processed: 0,
            groups_skipped:   0,
            total_groups,
            start_instant:    Instant::now(),
            start_unix:       SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn record_skipped(&mut self) {
        self.groups_skipped += 1;
    }

    pub fn record_processed(&mut self) {
        self.groups_processed += 1;
    }

    /// Rows consumed from the input so far.
    pub fn position(&self) -> usize {
        self.groups_skipped + self.groups_processed
    }

    pub fn elapsed(&self) -> Duration {
        self.start_instant.elapsed()
    }

    pub fn report(&self, last_index: usize, topic: &str) -> ProgressReport {
        self.report_at(self.elapsed(), last_index, topic)
    }

    /// Build a report for a given elapsed time.
    pub fn report_at(&self, elapsed: Duration, last_index: usize, topic: &str) -> ProgressReport {
        let percent = self
            .total_groups
            .filter(|&t| t > 0)
            .map(|t| self.position() as f64 * 100.0 / t as f64);

        let projected_total = self.total_groups.and_then(|total| {
            let remaining_work = total.saturating_sub(self.groups_skipped);
            if self.groups_processed == 0 || remaining_work == 0 {
                return None;
            }
            let scale = remaining_work as f64 / self.groups_processed as f64;
            Some(elapsed.mul_f64(scale))
        });

        ProgressReport {
            start_unix: self.start_unix,
            percent,
            elapsed,
            projected_total,
            last_index,
            topic: topic.to_string(),
        }
    }
}

/// A snapshot of run progress, printed as a block of status lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub start_unix:      u64,
    pub percent:         Option<f64>,
    pub elapsed:         Duration,
    pub projected_total: Option<Duration>,
    pub last_index:      usize,
    pub topic:           String,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day_secs = self.start_unix % 86_400;
        writeln!(f, "starttime: {:02}:{:02} UTC", day_secs / 3600, (day_secs % 3600) / 60)?;
        match self.percent {
            Some(p) => writeln!(f, "progress: {p:3.3}%")?,
            None    => writeln!(f, "progress: unknown")?,
        }
        writeln!(f, "running since: {}", format_duration(self.elapsed))?;
        match self.projected_total {
            Some(d) => writeln!(f, "predicted full runtime: {}", format_duration(d))?,
            None    => writeln!(f, "predicted full runtime: unknown")?,
        }
        writeln!(f, "last processed: line {}", self.last_index)?;
        write!(f, "topic: {}", self.topic)
    }
}

/// H:MM:SS, hours unbounded.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
