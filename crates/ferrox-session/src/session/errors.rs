//! Error resolution

use ferrox_types::{Answers, Error, Query, QueryAnswer, QueryKind, Result, SessionUi};

use super::Session;

impl Session {
    /// Escalate an error to a fatal one and drop the connection
    ///
    /// The returned error is what the caller propagates. When a callback
    /// guard is active it is a silent abort and the fatal error surfaces when
    /// the guard is left.
    pub fn fatal_error(&mut self, error: Error, message: &str) -> Error {
        let mut fatal = match error {
            Error::Terminate { .. } => error,
            Error::Fatal { .. } if message.is_empty() => error,
            other => Error::fatal_with(&other, message),
        };
        if let (Some(tunnel_error), Error::Fatal { details, .. }) = (&self.tunnel_error, &mut fatal) {
            if !details.contains(tunnel_error) {
                details.push(tunnel_error.clone());
            }
        }
        if self.is_active() {
            self.log.exception(&fatal);
            self.log
                .warning("Attempt to close connection due to fatal exception:");
            self.close();
        } else {
            self.log.exception(&fatal);
        }
        self.callbacks.guard().capture(fatal)
    }

    /// Turn an operation failure into the error its caller propagates
    pub(crate) fn raise(&mut self, error: Error, message: &str) -> Error {
        if error.is_fatal() {
            self.fatal_error(error, message)
        } else if error.is_abort() || error.is_skip() {
            error
        } else {
            Error::command_with(&error, message)
        }
    }

    /// Resolve a failure that offers no choice
    ///
    /// Fatal errors, aborts and failures inside an exception-on-fail region
    /// are returned. Anything else is shown to the user and swallowed.
    pub(crate) fn command_error(&mut self, error: Error, message: &str) -> Result<()> {
        if error.is_fatal() || error.is_abort() || self.exception_on_fail() {
            return Err(self.raise(error, message));
        }
        let error = Error::command_with(&error, message);
        self.handle_extended_exception(&error)
    }

    /// Resolve a failure by asking the user to pick one of `answers`
    ///
    /// Offering `Skip` inside a batch also offers "skip all", which is
    /// remembered for the rest of the batch.
    pub(crate) fn command_error_query(
        &mut self,
        error: Error,
        message: &str,
        answers: Answers,
    ) -> Result<QueryAnswer> {
        if error.is_fatal() || error.is_abort() || self.exception_on_fail() {
            return Err(self.raise(error, message));
        }
        let error = Error::command_with(&error, message);
        self.log.exception(&error);

        let can_skip = answers.contains(QueryAnswer::Skip) && self.progress.is_some();
        if can_skip
            && self
                .progress
                .as_ref()
                .is_some_and(|progress| progress.skip_to_all())
        {
            return Ok(QueryAnswer::Skip);
        }
        let answers = if can_skip {
            answers.with(QueryAnswer::All)
        } else {
            answers
        };
        let query = Query::new(error.to_string(), answers)
            .more_messages(error.details().to_vec())
            .kind(QueryKind::Error);
        let answer = self.ask(&query)?;
        if answer == QueryAnswer::All {
            if let Some(progress) = self.progress.as_mut() {
                progress.set_skip_to_all();
            }
            return Ok(QueryAnswer::Skip);
        }
        Ok(answer)
    }

    /// Run `action`, offering Retry/Skip/Abort when it fails
    ///
    /// Retry runs the action again, Abort ends with [`Error::Abort`] and Skip
    /// ends with a skip error for the current batch item.
    pub(crate) fn retrying<T>(
        &mut self,
        message: &str,
        mut action: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        loop {
            match action(self) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let answers =
                        Answers::of(&[QueryAnswer::Abort, QueryAnswer::Retry, QueryAnswer::Skip]);
                    match self.command_error_query(error, message, answers)? {
                        QueryAnswer::Retry => {}
                        QueryAnswer::Skip => return Err(Error::skip(message)),
                        _ => return Err(Error::Abort),
                    }
                }
            }
        }
    }

    /// Ask whether a failed step of a transfer should be retried
    ///
    /// Returns `Ok(true)` when the user chose the special retry answer
    /// (offered as `Yes` when `special_retry` is set) and `Ok(false)` for a
    /// plain retry. Any other answer ends with a skip error, or a command
    /// error when skipping is not allowed. Abort also cancels the batch.
    pub fn file_operation_loop_query(
        &mut self,
        error: &Error,
        message: &str,
        allow_skip: bool,
        special_retry: bool,
    ) -> Result<bool> {
        if error.is_fatal() || error.is_abort() {
            return Err(error.clone());
        }
        self.log.exception(error);
        let skip_to_all = self
            .progress
            .as_ref()
            .is_some_and(|progress| progress.skip_to_all());

        let mut answer = if allow_skip && skip_to_all {
            QueryAnswer::Skip
        } else {
            let mut answers = Answers::of(&[QueryAnswer::Retry, QueryAnswer::Abort]);
            if allow_skip {
                answers = answers.with(QueryAnswer::Skip).with(QueryAnswer::All);
            }
            if special_retry {
                answers = answers.with(QueryAnswer::Yes);
            }
            let query = Query::new(message, answers)
                .more_messages(vec![error.to_string()])
                .kind(QueryKind::Error);
            self.ask(&query)?
        };

        if answer == QueryAnswer::All {
            if let Some(progress) = self.progress.as_mut() {
                progress.set_skip_to_all();
            }
            answer = QueryAnswer::Skip;
        }
        let special = answer == QueryAnswer::Yes;
        if special {
            answer = QueryAnswer::Retry;
        }
        if answer != QueryAnswer::Retry {
            if answer == QueryAnswer::Abort {
                if let Some(progress) = self.progress.as_mut() {
                    progress.set_cancel(ferrox_types::CancelStatus::Cancel);
                }
            }
            return Err(if allow_skip {
                Error::skip(message)
            } else {
                Error::command_with(error, message)
            });
        }
        Ok(special)
    }

    /// Run a transfer step until it succeeds or the user gives up
    pub fn file_operation_loop<T>(
        &mut self,
        message: &str,
        allow_skip: bool,
        mut action: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        loop {
            match action(self) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    self.file_operation_loop_query(&error, message, allow_skip, false)?;
                }
            }
        }
    }

    /// Treat a skip chosen for a standalone operation as done
    pub(crate) fn skipped(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(error) if error.is_skip() => {
                self.log.debug(format!("Skipped: {}", error));
                Ok(())
            }
            other => other,
        }
    }

    /// Log an error and show it to the user
    pub(crate) fn handle_extended_exception(&mut self, error: &Error) -> Result<()> {
        self.log.exception(error);
        self.callbacks.show_extended_exception(error)
    }

    /// Ask a question with the batch progress suspended
    pub(crate) fn ask(&mut self, query: &Query) -> Result<QueryAnswer> {
        if let Some(progress) = self.progress.as_mut() {
            progress.suspend();
        }
        let answer = self.callbacks.query_user(query);
        if let Some(progress) = self.progress.as_mut() {
            progress.resume();
        }
        answer
    }
}
