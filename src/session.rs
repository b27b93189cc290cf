//! The interactive labelling loop.
//!
//! A [`Session`] walks the candidates strictly in order. For each one it
//! acquires the image, presents it, decodes the key press, and applies the
//! result:
//!
//! - a Present or Absent label first places the image, then moves the tally
//!   and is buffered for the history;
//! - Ignore skips the candidate without side effects;
//! - an unrecognized key aborts the session.
//!
//! Every exit path, including errors, flushes the labels still buffered in
//! the [`BatchWriter`] before returning. The aborting candidate itself is
//! never recorded.
//!
//! An [`InterruptHandle`] lets another thread (a Ctrl-C handler) stop the
//! session and flush its pending labels while the loop is blocked waiting
//! for a key. Applying a label holds the writer lock from placement to
//! buffering, so a flush from the handle never sees a placed image without
//! its row.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::dataset::Candidate;
use crate::error::WildlabelError;
use crate::history::{BatchWriter, HistoryRecord};
use crate::label::{Decoded, LabelScheme};
use crate::placement::{Partition, PlacementEngine};
use crate::present::Presenter;
use crate::source::ImageSource;
use crate::tally::Tally;

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionOutcome {
    /// Every candidate was processed.
    Exhausted,
    /// The operator pressed an unbound key.
    Aborted { token: u32 },
    /// The session was stopped through its [`InterruptHandle`].
    Interrupted,
}

/// Summary of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub tally: Tally,
    /// Candidates offered to the loop.
    pub candidates: usize,
    /// New Present/Absent labels recorded this session.
    pub labelled: usize,
    pub ignored: usize,
    /// Labelled images placed in the test partition.
    pub held_out: usize,
    pub flushed_batches: usize,
}

impl SessionReport {
    /// True for any early stop, by key or by interrupt.
    pub fn is_aborted(&self) -> bool {
        !matches!(self.outcome, SessionOutcome::Exhausted)
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            SessionOutcome::Exhausted => writeln!(f, "Labelling complete")?,
            SessionOutcome::Aborted { token } => {
                writeln!(f, "Labelling stopped by key code {token}")?
            }
            SessionOutcome::Interrupted => writeln!(f, "Labelling interrupted")?,
        }
        writeln!(
            f,
            "  labelled {} of {} candidate(s), ignored {}, held out {} for test",
            self.labelled, self.candidates, self.ignored, self.held_out
        )?;
        writeln!(f, "  {}", self.tally)?;
        writeln!(f, "  history written in {} batch(es)", self.flushed_batches)
    }
}

enum Step {
    Continue,
    Abort(u32),
    Interrupted,
}

fn lock(writer: &Mutex<BatchWriter>) -> MutexGuard<'_, BatchWriter> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stops a running session from another thread.
#[derive(Clone)]
pub struct InterruptHandle {
    stop: Arc<AtomicBool>,
    writer: Arc<Mutex<BatchWriter>>,
}

impl InterruptHandle {
    /// Asks the loop to stop and flushes the labels buffered so far.
    ///
    /// Returns the number of rows written. The loop records nothing after
    /// this call, so the caller may exit the process right away.
    pub fn interrupt(&self) -> Result<usize, WildlabelError> {
        let mut writer = lock(&self.writer);
        self.stop.store(true, Ordering::SeqCst);
        writer.flush()
    }

    pub fn is_interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// State owned by one labelling run.
pub struct Session {
    scheme: LabelScheme,
    writer: Arc<Mutex<BatchWriter>>,
    stop: Arc<AtomicBool>,
    placement: PlacementEngine,
    tally: Tally,
    labelled: usize,
    ignored: usize,
    held_out: usize,
}

impl Session {
    /// Starts a session from a reconciled tally.
    pub fn new(
        scheme: LabelScheme,
        writer: BatchWriter,
        placement: PlacementEngine,
        tally: Tally,
    ) -> Self {
        Self {
            scheme,
            writer: Arc::new(Mutex::new(writer)),
            stop: Arc::new(AtomicBool::new(false)),
            placement,
            tally,
            labelled: 0,
            ignored: 0,
            held_out: 0,
        }
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            stop: Arc::clone(&self.stop),
            writer: Arc::clone(&self.writer),
        }
    }

    fn interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Runs the loop to exhaustion, abort or interrupt.
    ///
    /// # Errors
    /// Acquisition, presentation, placement, and history write failures stop
    /// the loop. Pending labels are flushed before the error is returned.
    pub fn run(
        mut self,
        candidates: Vec<Candidate>,
        source: &mut dyn ImageSource,
        presenter: &mut dyn Presenter,
    ) -> Result<SessionReport, WildlabelError> {
        let total = candidates.len();
        let mut outcome = SessionOutcome::Exhausted;

        for candidate in &candidates {
            match self.step(candidate, source, presenter) {
                Ok(Step::Continue) => {}
                Ok(Step::Abort(token)) => {
                    tracing::warn!(id = %candidate.id, token, "labelling aborted by operator");
                    outcome = SessionOutcome::Aborted { token };
                    break;
                }
                Ok(Step::Interrupted) => {
                    tracing::warn!(id = %candidate.id, "labelling interrupted");
                    outcome = SessionOutcome::Interrupted;
                    break;
                }
                Err(err) => {
                    if let Err(flush_err) = lock(&self.writer).flush() {
                        tracing::error!(error = %flush_err, "failed to flush pending labels");
                    }
                    return Err(err);
                }
            }
        }

        let flushed_batches = {
            let mut writer = lock(&self.writer);
            writer.flush()?;
            writer.flushed_batches()
        };

        let report = SessionReport {
            outcome,
            tally: self.tally,
            candidates: total,
            labelled: self.labelled,
            ignored: self.ignored,
            held_out: self.held_out,
            flushed_batches,
        };
        tracing::info!(
            labelled = report.labelled,
            ignored = report.ignored,
            aborted = report.is_aborted(),
            "labelling session finished"
        );
        Ok(report)
    }

    fn step(
        &mut self,
        candidate: &Candidate,
        source: &mut dyn ImageSource,
        presenter: &mut dyn Presenter,
    ) -> Result<Step, WildlabelError> {
        if self.interrupted() {
            return Ok(Step::Interrupted);
        }

        let staged = source.acquire(candidate)?;
        let token = presenter.present(&staged).map_err(WildlabelError::Io)?;

        let label = match self.scheme.decode(token) {
            Decoded::Label(label) => label,
            Decoded::Unrecognized(token) => return Ok(Step::Abort(token)),
        };

        if !label.is_recorded() {
            self.ignored += 1;
            tracing::debug!(id = %candidate.id, "candidate ignored");
            return Ok(Step::Continue);
        }

        let name = self.scheme.name(label).to_string();
        {
            let shared = Arc::clone(&self.writer);
            let mut writer = lock(&shared);
            if self.interrupted() {
                return Ok(Step::Interrupted);
            }

            let placement = self.placement.place(
                &candidate.id,
                &name,
                &staged.path,
                source.staging_mode(),
            )?;
            if placement.partition == Partition::Test {
                self.held_out += 1;
            }

            self.tally.record(label);
            self.labelled += 1;

            writer.push(HistoryRecord::new(candidate.id.clone(), name.clone()))?;
        }

        tracing::info!(id = %candidate.id, label = %name, "labelled image");
        presenter.show_tally(&self.tally);
        Ok(Step::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display_summarises_the_run() {
        let report = SessionReport {
            outcome: SessionOutcome::Aborted { token: 113 },
            tally: Tally::new(4, 2),
            candidates: 10,
            labelled: 3,
            ignored: 1,
            held_out: 1,
            flushed_batches: 1,
        };
        let text = report.to_string();
        assert!(report.is_aborted());
        assert!(text.starts_with("Labelling stopped by key code 113\n"));
        assert!(text.contains("labelled 3 of 10 candidate(s), ignored 1, held out 1 for test"));
        assert!(text.contains("Present count: 4, Absent count: 2"));
    }

    #[test]
    fn report_serializes_outcome_as_status() {
        let report = SessionReport {
            outcome: SessionOutcome::Exhausted,
            tally: Tally::default(),
            candidates: 0,
            labelled: 0,
            ignored: 0,
            held_out: 0,
            flushed_batches: 0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "exhausted");
        assert_eq!(json["tally"]["present"], 0);
    }

    #[test]
    fn interrupted_report_counts_as_aborted() {
        let report = SessionReport {
            outcome: SessionOutcome::Interrupted,
            tally: Tally::new(1, 0),
            candidates: 2,
            labelled: 1,
            ignored: 0,
            held_out: 0,
            flushed_batches: 1,
        };
        assert!(report.is_aborted());
        assert!(report.to_string().starts_with("Labelling interrupted\n"));
        assert_eq!(
            serde_json::to_value(&report).unwrap()["outcome"]["status"],
            "interrupted"
        );
    }
}
