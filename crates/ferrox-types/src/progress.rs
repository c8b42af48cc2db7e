//! Per-batch progress, cancellation and overwrite policy

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::model::{ModificationPrecision, OnceDoneOperation, Operation, OperationSide};
use crate::params::CopyParam;
use crate::query::{Answers, Query, QueryAnswer, QueryKind};
use crate::traits::SessionUi;
use crate::Result;

/// Cooperative cancellation flag polled between files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelStatus {
    /// Keep going
    #[default]
    Continue,
    /// Stop at the next check
    Cancel,
}

/// Sticky answer to overwrite confirmations within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchOverwrite {
    /// Ask for each file
    #[default]
    No,
    /// Overwrite everything
    All,
    /// Overwrite nothing
    None,
    /// Overwrite only older targets
    Older,
    /// Append to targets
    Append,
    /// Resume targets
    Resume,
    /// Resume in a separate pass
    AlternateResume,
}

/// Source and destination details shown with an overwrite question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteFileParams {
    /// Size of the file being transferred
    pub source_size: u64,
    /// Size of the existing file
    pub dest_size: u64,
    /// Modification time of the file being transferred
    pub source_timestamp: DateTime<Utc>,
    /// Modification time of the existing file
    pub dest_timestamp: DateTime<Utc>,
    /// Precision of the source time
    pub source_precision: ModificationPrecision,
    /// Precision of the destination time
    pub dest_precision: ModificationPrecision,
}

impl OverwriteFileParams {
    fn source_is_newer(&self) -> bool {
        let precision = self.source_precision.lesser(self.dest_precision);
        precision.reduce(self.source_timestamp) > precision.reduce(self.dest_timestamp)
    }
}

/// Counters and flags of one batch
pub struct OperationProgress {
    operation: Operation,
    side: OperationSide,
    count: usize,
    processed: usize,
    file_name: String,
    directory: String,
    total_size: Option<u64>,
    transferred: u64,
    skipped: u64,
    cancel: CancelStatus,
    batch_overwrite: BatchOverwrite,
    skip_to_all: bool,
    once_done: OnceDoneOperation,
    confirm_overwriting: bool,
    started: Instant,
    suspended_at: Option<Instant>,
    suspended_total: Duration,
    ui: Option<Arc<dyn SessionUi>>,
}

impl fmt::Debug for OperationProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationProgress")
            .field("operation", &self.operation)
            .field("side", &self.side)
            .field("count", &self.count)
            .field("processed", &self.processed)
            .field("file_name", &self.file_name)
            .field("cancel", &self.cancel)
            .field("batch_overwrite", &self.batch_overwrite)
            .finish_non_exhaustive()
    }
}

impl OperationProgress {
    /// Start a batch over `count` items
    pub fn start(
        operation: Operation,
        side: OperationSide,
        count: usize,
        ui: Option<Arc<dyn SessionUi>>,
    ) -> Self {
        Self {
            operation,
            side,
            count,
            processed: 0,
            file_name: String::new(),
            directory: String::new(),
            total_size: None,
            transferred: 0,
            skipped: 0,
            cancel: CancelStatus::Continue,
            batch_overwrite: BatchOverwrite::No,
            skip_to_all: false,
            once_done: OnceDoneOperation::Idle,
            confirm_overwriting: true,
            started: Instant::now(),
            suspended_at: None,
            suspended_total: Duration::ZERO,
            ui,
        }
    }

    /// Set the target directory shown with the progress
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set whether overwrites are confirmed at all
    pub fn with_confirm_overwriting(mut self, confirm: bool) -> Self {
        self.confirm_overwriting = confirm;
        self
    }

    /// Whether overwrites are confirmed; cleared by "never ask again"
    pub fn confirm_overwriting(&self) -> bool {
        self.confirm_overwriting
    }

    /// Kind of the batch
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Side the batch works on
    pub fn side(&self) -> OperationSide {
        self.side
    }

    /// Number of items in the batch
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of finished items
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Item currently processed
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Target directory of the batch
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Total size, when calculated up front
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Record the precomputed total size
    pub fn set_total_size(&mut self, size: u64) {
        self.total_size = Some(size);
    }

    /// Bytes transferred so far
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Bytes skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Current cancellation state
    pub fn cancel(&self) -> CancelStatus {
        self.cancel
    }

    /// Whether the batch should keep going
    pub fn is_continuing(&self) -> bool {
        self.cancel == CancelStatus::Continue
    }

    /// Update the cancellation state
    pub fn set_cancel(&mut self, cancel: CancelStatus) {
        self.cancel = cancel;
    }

    /// Stored overwrite policy
    pub fn batch_overwrite(&self) -> BatchOverwrite {
        self.batch_overwrite
    }

    /// Store an overwrite policy for the rest of the batch
    pub fn set_batch_overwrite(&mut self, policy: BatchOverwrite) {
        self.batch_overwrite = policy;
    }

    /// Whether errors are skipped without asking
    pub fn skip_to_all(&self) -> bool {
        self.skip_to_all
    }

    /// Skip all further errors without asking
    pub fn set_skip_to_all(&mut self) {
        self.skip_to_all = true;
    }

    /// Action requested by the last `finished` notification
    pub fn once_done(&self) -> OnceDoneOperation {
        self.once_done
    }

    /// Time spent, excluding suspensions
    pub fn elapsed(&self) -> Duration {
        let suspended = self.suspended_total
            + self
                .suspended_at
                .map_or(Duration::ZERO, |since| since.elapsed());
        self.started.elapsed().saturating_sub(suspended)
    }

    /// Stop the clock and reporting, e.g. while the user is asked something
    pub fn suspend(&mut self) {
        if self.suspended_at.is_none() {
            self.suspended_at = Some(Instant::now());
        }
    }

    /// Resume after [`suspend`](Self::suspend)
    pub fn resume(&mut self) {
        if let Some(since) = self.suspended_at.take() {
            self.suspended_total += since.elapsed();
        }
    }

    /// Whether the progress is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Switch to a new item and report
    pub fn set_file(&mut self, file_name: impl Into<String>) -> Result<()> {
        self.file_name = file_name.into();
        self.report()
    }

    /// Count transferred bytes and report
    pub fn add_transferred(&mut self, bytes: u64) -> Result<()> {
        self.transferred += bytes;
        self.report()
    }

    /// Count skipped bytes
    pub fn add_skipped(&mut self, bytes: u64) {
        self.skipped += bytes;
    }

    /// Send the current state to the UI, honouring a cancel request
    pub fn report(&mut self) -> Result<()> {
        if self.is_suspended() {
            return Ok(());
        }
        if let Some(ui) = self.ui.clone() {
            if ui.progress(self)? == CancelStatus::Cancel {
                self.cancel = CancelStatus::Cancel;
            }
        }
        Ok(())
    }

    /// Account for a finished item
    pub fn finish(&mut self, file_name: &str, success: bool) -> Result<()> {
        self.processed += 1;
        if let Some(ui) = self.ui.clone() {
            let once_done = ui.finished(self.operation, self.side, file_name, success)?;
            if once_done != OnceDoneOperation::Idle {
                self.once_done = once_done;
            }
        }
        Ok(())
    }

    /// Overwrite policy in effect for one file
    ///
    /// `special` marks a call that can honour resume-style policies.
    pub fn effective_batch_overwrite(&self, copy_param: &CopyParam, special: bool) -> BatchOverwrite {
        if special && copy_param.resume {
            BatchOverwrite::Resume
        } else if copy_param.append {
            BatchOverwrite::Append
        } else if copy_param.newer_only {
            BatchOverwrite::Older
        } else if copy_param.no_confirmation || !self.confirm_overwriting {
            BatchOverwrite::All
        } else {
            match self.batch_overwrite {
                BatchOverwrite::Older | BatchOverwrite::AlternateResume | BatchOverwrite::Resume
                    if !special =>
                {
                    BatchOverwrite::No
                }
                policy => policy,
            }
        }
    }

    fn applicable_batch_overwrite(
        &self,
        copy_param: &CopyParam,
        params: Option<&OverwriteFileParams>,
        special: bool,
    ) -> BatchOverwrite {
        let policy = self.effective_batch_overwrite(copy_param, special);
        let applicable = match policy {
            BatchOverwrite::Older => params.is_some(),
            BatchOverwrite::AlternateResume | BatchOverwrite::Resume => {
                params.is_some_and(|params| params.dest_size < params.source_size)
            }
            _ => true,
        };
        if applicable || !special {
            policy
        } else {
            self.effective_batch_overwrite(copy_param, false)
        }
    }

    /// Decide whether an existing target file gets overwritten
    ///
    /// Asks the user only when no stored or configured policy applies. The
    /// returned answer is `Yes`/`No` for overwrite/keep, `Retry` for append or
    /// resume, `Skip` for an alternate resume, or whatever else the user chose
    /// from `answers`.
    pub fn confirm_file_overwrite(
        &mut self,
        file_name: &str,
        params: Option<&OverwriteFileParams>,
        answers: Answers,
        copy_param: &CopyParam,
        special: bool,
    ) -> Result<QueryAnswer> {
        let mut policy = self.applicable_batch_overwrite(copy_param, params, special);
        if policy == BatchOverwrite::No {
            let answer = self.ask_overwrite(file_name, params, answers)?;
            let stored = match answer {
                QueryAnswer::NeverAskAgain => {
                    self.confirm_overwriting = false;
                    return Ok(QueryAnswer::Yes);
                }
                QueryAnswer::YesToAll => Some(BatchOverwrite::All),
                QueryAnswer::All => Some(BatchOverwrite::Older),
                QueryAnswer::NoToAll => Some(BatchOverwrite::None),
                _ => None,
            };
            match stored {
                Some(stored) => {
                    self.batch_overwrite = stored;
                    policy = stored;
                }
                None => return Ok(answer),
            }
        }

        Ok(match policy {
            BatchOverwrite::All => QueryAnswer::Yes,
            BatchOverwrite::Older => {
                if params.is_some_and(OverwriteFileParams::source_is_newer) {
                    QueryAnswer::Yes
                } else {
                    QueryAnswer::No
                }
            }
            BatchOverwrite::AlternateResume => QueryAnswer::Skip,
            BatchOverwrite::Append | BatchOverwrite::Resume => QueryAnswer::Retry,
            BatchOverwrite::None | BatchOverwrite::No => QueryAnswer::No,
        })
    }

    fn ask_overwrite(
        &mut self,
        file_name: &str,
        params: Option<&OverwriteFileParams>,
        answers: Answers,
    ) -> Result<QueryAnswer> {
        let Some(ui) = self.ui.clone() else {
            return Ok(QueryAnswer::Yes);
        };
        let mut more_messages = Vec::new();
        if let Some(params) = params {
            more_messages.push(format!(
                "New: {} bytes, {}",
                params.source_size,
                params.source_timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
            more_messages.push(format!(
                "Existing: {} bytes, {}",
                params.dest_size,
                params.dest_timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        let query = Query::new(format!("File '{}' already exists. Overwrite?", file_name), answers)
            .more_messages(more_messages)
            .kind(QueryKind::Confirmation);
        self.suspend();
        let answer = ui.query_user(&query);
        self.resume();
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn progress() -> OperationProgress {
        OperationProgress::start(Operation::Copy, OperationSide::Local, 3, None)
    }

    #[test]
    fn test_finish_counts() {
        let mut progress = progress();
        progress.finish("a", true).unwrap();
        progress.finish("b", false).unwrap();
        assert_eq!(progress.processed(), 2);
        assert_eq!(progress.once_done(), OnceDoneOperation::Idle);
    }

    #[test]
    fn test_suspension_excluded_from_elapsed() {
        let mut progress = progress();
        progress.suspend();
        std::thread::sleep(Duration::from_millis(30));
        assert!(progress.is_suspended());
        progress.resume();
        assert!(progress.elapsed() < Duration::from_millis(30));
    }

    #[rstest]
    #[case(CopyParam { resume: true, ..CopyParam::default() }, true, true, BatchOverwrite::Resume)]
    #[case(CopyParam { resume: true, ..CopyParam::default() }, false, true, BatchOverwrite::No)]
    #[case(CopyParam { append: true, ..CopyParam::default() }, false, true, BatchOverwrite::Append)]
    #[case(CopyParam { newer_only: true, ..CopyParam::default() }, false, true, BatchOverwrite::Older)]
    #[case(CopyParam { no_confirmation: true, ..CopyParam::default() }, false, true, BatchOverwrite::All)]
    #[case(CopyParam::default(), false, false, BatchOverwrite::All)]
    fn test_effective_batch_overwrite(
        #[case] copy_param: CopyParam,
        #[case] special: bool,
        #[case] confirm: bool,
        #[case] expected: BatchOverwrite,
    ) {
        let progress = progress().with_confirm_overwriting(confirm);
        assert_eq!(progress.effective_batch_overwrite(&copy_param, special), expected);
    }

    #[test]
    fn test_stored_policy_downgraded_outside_special_calls() {
        let mut progress = progress();
        progress.set_batch_overwrite(BatchOverwrite::Older);
        let copy_param = CopyParam::default();
        assert_eq!(progress.effective_batch_overwrite(&copy_param, false), BatchOverwrite::No);
        assert_eq!(progress.effective_batch_overwrite(&copy_param, true), BatchOverwrite::Older);
        progress.set_batch_overwrite(BatchOverwrite::None);
        assert_eq!(progress.effective_batch_overwrite(&copy_param, false), BatchOverwrite::None);
    }

    struct FixedAnswer(QueryAnswer);

    impl SessionUi for FixedAnswer {
        fn query_user(&self, _query: &Query) -> Result<QueryAnswer> {
            Ok(self.0)
        }
    }

    fn answering(answer: QueryAnswer) -> OperationProgress {
        OperationProgress::start(
            Operation::Copy,
            OperationSide::Local,
            2,
            Some(Arc::new(FixedAnswer(answer))),
        )
    }

    fn overwrite_params(source_newer: bool) -> OverwriteFileParams {
        let older = DateTime::<Utc>::from(std::time::UNIX_EPOCH);
        let newer = older + chrono::Duration::hours(1);
        OverwriteFileParams {
            source_size: 10,
            dest_size: 20,
            source_timestamp: if source_newer { newer } else { older },
            dest_timestamp: if source_newer { older } else { newer },
            source_precision: ModificationPrecision::Full,
            dest_precision: ModificationPrecision::Full,
        }
    }

    #[test]
    fn test_yes_to_all_is_remembered() {
        let mut progress = answering(QueryAnswer::YesToAll);
        let answers = Answers::of(&[QueryAnswer::Yes, QueryAnswer::No, QueryAnswer::YesToAll]);
        let answer = progress
            .confirm_file_overwrite("a.txt", None, answers, &CopyParam::default(), false)
            .unwrap();
        assert_eq!(answer, QueryAnswer::Yes);
        assert_eq!(progress.batch_overwrite(), BatchOverwrite::All);
    }

    #[rstest]
    #[case(true, QueryAnswer::Yes)]
    #[case(false, QueryAnswer::No)]
    fn test_newer_only_compares_times(#[case] source_newer: bool, #[case] expected: QueryAnswer) {
        let mut progress = answering(QueryAnswer::Cancel);
        let copy_param = CopyParam {
            newer_only: true,
            ..CopyParam::default()
        };
        let params = overwrite_params(source_newer);
        let answer = progress
            .confirm_file_overwrite("a.txt", Some(&params), Answers::NONE, &copy_param, false)
            .unwrap();
        assert_eq!(answer, expected);
    }

    #[test]
    fn test_never_ask_again_disables_confirmation() {
        let mut progress = answering(QueryAnswer::NeverAskAgain);
        let answer = progress
            .confirm_file_overwrite("a.txt", None, Answers::NONE, &CopyParam::default(), false)
            .unwrap();
        assert_eq!(answer, QueryAnswer::Yes);
        assert!(!progress.confirm_overwriting());
        assert_eq!(
            progress.effective_batch_overwrite(&CopyParam::default(), false),
            BatchOverwrite::All
        );
    }

    #[test]
    fn test_plain_answer_passes_through() {
        let mut progress = answering(QueryAnswer::No);
        let answer = progress
            .confirm_file_overwrite("a.txt", None, Answers::NONE, &CopyParam::default(), false)
            .unwrap();
        assert_eq!(answer, QueryAnswer::No);
        assert_eq!(progress.batch_overwrite(), BatchOverwrite::No);
    }
}
