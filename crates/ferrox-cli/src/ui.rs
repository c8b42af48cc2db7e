//! Terminal implementation of the session UI

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};
use ferrox_types::{
    CancelStatus, Error, Operation, OperationProgress, OperationSide, OnceDoneOperation, Prompt,
    Query, QueryAnswer, QueryKind, Result, SessionUi,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Session UI drawing progress bars and asking questions on the terminal
pub struct TerminalUi {
    interactive: bool,
    quiet: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalUi {
    /// Create a terminal UI
    ///
    /// A non-interactive UI answers queries with their timeout or abort
    /// answer and never prompts.
    pub fn new(interactive: bool, quiet: bool) -> Self {
        Self {
            interactive,
            quiet,
            bar: Mutex::new(None),
        }
    }

    /// Whether questions are put to the user
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Remove the progress bar, if any
    pub fn clear(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, update: impl FnOnce(&ProgressBar)) {
        if self.quiet {
            return;
        }
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(new_bar);
        update(bar);
    }

    fn suspended<T>(&self, ask: impl FnOnce() -> T) -> T {
        match self.bar.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(bar) => bar.suspend(ask),
                None => ask(),
            },
            Err(_) => ask(),
        }
    }
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(template) =
        ProgressStyle::default_bar().template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(template.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn operation_verb(operation: Operation, side: OperationSide) -> &'static str {
    match (operation, side) {
        (Operation::Copy, OperationSide::Local) => "Uploading",
        (Operation::Copy, OperationSide::Remote) => "Downloading",
        (Operation::Move, _) => "Moving",
        (Operation::Delete, _) => "Deleting",
        (Operation::SetProperties, _) => "Changing properties",
        (Operation::CalculateSize, _) => "Calculating size",
        (Operation::CustomCommand, _) => "Running command",
        (Operation::CalculateChecksum, _) => "Calculating checksum",
        (Operation::RemoteCopy, _) => "Duplicating",
        (Operation::RemoteMove, _) => "Moving",
        (Operation::GetProperties, _) => "Comparing",
    }
}

fn answer_label(answer: QueryAnswer) -> &'static str {
    match answer {
        QueryAnswer::Yes => "Yes",
        QueryAnswer::No => "No",
        QueryAnswer::Ok => "OK",
        QueryAnswer::Cancel => "Cancel",
        QueryAnswer::Abort => "Abort",
        QueryAnswer::Retry => "Retry",
        QueryAnswer::Ignore => "Ignore",
        QueryAnswer::Skip => "Skip",
        QueryAnswer::All => "All",
        QueryAnswer::YesToAll => "Yes to all",
        QueryAnswer::NoToAll => "No to all",
        QueryAnswer::NeverAskAgain => "Never ask again",
    }
}

fn dialog_error(error: dialoguer::Error) -> Error {
    Error::other(format!("Terminal interaction failed: {}", error))
}

impl SessionUi for TerminalUi {
    fn query_user(&self, query: &Query) -> Result<QueryAnswer> {
        let fallback = query
            .timeout_answer
            .unwrap_or_else(|| query.answers.abort_answer());
        if !self.interactive {
            return Ok(fallback);
        }

        let answers: Vec<QueryAnswer> = query.answers.iter().collect();
        let labels: Vec<&str> = answers.iter().copied().map(answer_label).collect();
        let mut message = query.message.clone();
        for line in &query.more_messages {
            message.push('\n');
            message.push_str(line);
        }
        let message = match query.kind {
            QueryKind::Error => style(message).red().to_string(),
            QueryKind::Warning => style(message).yellow().to_string(),
            QueryKind::Confirmation => message,
        };

        let selected = self.suspended(|| {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .items(&labels)
                .default(0)
                .interact_opt()
        });
        Ok(selected
            .map_err(dialog_error)?
            .and_then(|index| answers.get(index).copied())
            .unwrap_or(fallback))
    }

    fn prompt_user(&self, prompt: &Prompt) -> Result<Option<Vec<String>>> {
        if !self.interactive {
            return Ok(None);
        }
        if !prompt.instructions.is_empty() {
            println!("{}", style(&prompt.instructions).dim());
        }

        let mut responses = Vec::with_capacity(prompt.fields.len());
        for field in &prompt.fields {
            let response = self.suspended(|| {
                if field.echo {
                    Input::<String>::with_theme(&ColorfulTheme::default())
                        .with_prompt(&field.text)
                        .allow_empty(true)
                        .interact_text()
                } else {
                    Password::with_theme(&ColorfulTheme::default())
                        .with_prompt(&field.text)
                        .allow_empty_password(true)
                        .interact()
                }
            });
            responses.push(response.map_err(dialog_error)?);
        }
        Ok(Some(responses))
    }

    fn display_banner(&self, session_name: &str, banner: &str) -> Result<()> {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue().bold(), style(session_name).bold());
            println!("{}", style(banner).dim());
        }
        Ok(())
    }

    fn information(&self, text: &str, _status: bool, active: bool) -> Result<()> {
        if active {
            self.with_bar(|bar| bar.set_message(text.to_string()));
        }
        Ok(())
    }

    fn progress(&self, progress: &OperationProgress) -> Result<CancelStatus> {
        self.with_bar(|bar| {
            bar.set_length(progress.count() as u64);
            bar.set_position(progress.processed() as u64);
            bar.set_message(format!(
                "{} {}",
                operation_verb(progress.operation(), progress.side()),
                progress.file_name()
            ));
        });
        Ok(CancelStatus::Continue)
    }

    fn finished(
        &self,
        _operation: Operation,
        _side: OperationSide,
        file_name: &str,
        success: bool,
    ) -> Result<OnceDoneOperation> {
        if !success {
            let line = format!("{} {}", style("✗").red().bold(), file_name);
            self.suspended(|| eprintln!("{}", line));
        }
        Ok(OnceDoneOperation::Idle)
    }

    fn show_extended_exception(&self, error: &Error) -> Result<()> {
        let mut lines = vec![format!("{} {}", style("Error:").red().bold(), error)];
        lines.extend(error.details().iter().map(|detail| format!("  {}", style(detail).dim())));
        self.suspended(|| {
            for line in &lines {
                eprintln!("{}", line);
            }
        });
        Ok(())
    }

    fn closed(&self) -> Result<()> {
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_types::Answers;

    #[test]
    fn test_unattended_terminal_picks_abort_answer() {
        let ui = TerminalUi::new(false, true);
        let query = Query::new(
            "Overwrite?",
            Answers::of(&[QueryAnswer::Yes, QueryAnswer::No, QueryAnswer::Cancel]),
        );
        assert_eq!(ui.query_user(&query).unwrap(), query.answers.abort_answer());
    }

    #[test]
    fn test_unattended_terminal_prefers_timeout_answer() {
        let ui = TerminalUi::new(false, true);
        let query = Query::new("Reconnect?", Answers::of(&[QueryAnswer::Retry, QueryAnswer::Abort]))
            .timeout(Duration::from_secs(5), QueryAnswer::Retry);
        assert_eq!(ui.query_user(&query).unwrap(), QueryAnswer::Retry);
    }

    #[test]
    fn test_unattended_terminal_cancels_prompts() {
        let ui = TerminalUi::new(false, true);
        assert_eq!(ui.prompt_user(&Prompt::password("server")).unwrap(), None);
    }

    #[test]
    fn test_quiet_terminal_draws_no_bar() {
        let ui = TerminalUi::new(false, true);
        ui.information("Reading", true, true).unwrap();
        assert!(ui.bar.lock().unwrap().is_none());
    }
}
