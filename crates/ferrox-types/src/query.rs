//! Questions and prompts put to the user

use std::time::Duration;

/// Answer to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryAnswer {
    /// Yes
    Yes,
    /// No
    No,
    /// OK
    Ok,
    /// Cancel
    Cancel,
    /// Abort
    Abort,
    /// Retry
    Retry,
    /// Ignore
    Ignore,
    /// Skip
    Skip,
    /// Apply to all remaining items
    All,
    /// Yes for all remaining items
    YesToAll,
    /// No for all remaining items
    NoToAll,
    /// Yes, and stop asking
    NeverAskAgain,
}

impl QueryAnswer {
    const ALL: [QueryAnswer; 12] = [
        Self::Yes,
        Self::No,
        Self::Ok,
        Self::Cancel,
        Self::Abort,
        Self::Retry,
        Self::Ignore,
        Self::Skip,
        Self::All,
        Self::YesToAll,
        Self::NoToAll,
        Self::NeverAskAgain,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of answers offered by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Answers(u16);

impl Answers {
    /// No answer at all
    pub const NONE: Self = Self(0);

    /// Build a set from a list of answers
    pub fn of(answers: &[QueryAnswer]) -> Self {
        answers.iter().fold(Self::NONE, |set, answer| set.with(*answer))
    }

    /// Add an answer
    pub fn with(self, answer: QueryAnswer) -> Self {
        Self(self.0 | answer.bit())
    }

    /// Remove an answer
    pub fn without(self, answer: QueryAnswer) -> Self {
        Self(self.0 & !answer.bit())
    }

    /// Whether an answer is offered
    pub fn contains(self, answer: QueryAnswer) -> bool {
        self.0 & answer.bit() != 0
    }

    /// Whether no answer is offered
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Offered answers in declaration order
    pub fn iter(self) -> impl Iterator<Item = QueryAnswer> {
        QueryAnswer::ALL
            .into_iter()
            .filter(move |answer| self.contains(*answer))
    }

    /// The answer meaning "stop" among the offered ones
    pub fn abort_answer(self) -> QueryAnswer {
        [
            QueryAnswer::Cancel,
            QueryAnswer::Abort,
            QueryAnswer::No,
            QueryAnswer::Ok,
        ]
        .into_iter()
        .find(|answer| self.contains(*answer))
        .unwrap_or(QueryAnswer::Cancel)
    }
}

/// Presentation hint of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    /// Plain question
    #[default]
    Confirmation,
    /// Warning
    Warning,
    /// Error report
    Error,
}

/// A question put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Main message
    pub message: String,
    /// Additional messages
    pub more_messages: Vec<String>,
    /// Offered answers
    pub answers: Answers,
    /// Presentation hint
    pub kind: QueryKind,
    /// Answer automatically after this delay
    pub timeout: Option<Duration>,
    /// Answer used when the timeout expires
    pub timeout_answer: Option<QueryAnswer>,
}

impl Query {
    /// Create a confirmation query
    pub fn new(message: impl Into<String>, answers: Answers) -> Self {
        Self {
            message: message.into(),
            more_messages: Vec::new(),
            answers,
            kind: QueryKind::Confirmation,
            timeout: None,
            timeout_answer: None,
        }
    }

    /// Set the presentation hint
    pub fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach additional messages
    pub fn more_messages(mut self, messages: Vec<String>) -> Self {
        self.more_messages = messages;
        self
    }

    /// Answer automatically after `timeout`
    pub fn timeout(mut self, timeout: Duration, answer: QueryAnswer) -> Self {
        self.timeout = Some(timeout);
        self.timeout_answer = Some(answer);
        self
    }
}

/// Kind of a credentials prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// User name
    Username,
    /// Password
    Password,
    /// Key passphrase
    Passphrase,
    /// Keyboard-interactive challenge
    KeyboardInteractive,
    /// Any other text
    Text,
}

/// One field of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptField {
    /// Label
    pub text: String,
    /// Whether input may be shown
    pub echo: bool,
}

/// A request for credentials or other text input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Kind of the prompt
    pub kind: PromptKind,
    /// Prompt title
    pub name: String,
    /// Instructions shown above the fields
    pub instructions: String,
    /// Requested fields
    pub fields: Vec<PromptField>,
}

impl Prompt {
    /// Single hidden password field
    pub fn password(name: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Password,
            name: name.into(),
            instructions: String::new(),
            fields: vec![PromptField {
                text: "Password: ".to_string(),
                echo: false,
            }],
        }
    }

    /// Whether the prompt asks for a password-like secret
    pub fn is_password(&self) -> bool {
        matches!(self.kind, PromptKind::Password | PromptKind::KeyboardInteractive)
            && self.fields.len() == 1
            && !self.fields[0].echo
    }
}
