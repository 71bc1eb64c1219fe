use inquire::{Confirm, InquireError, Select, Text};

use crate::error::Abort;

/// What the user did with a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Answer(T),
    /// Dismissed without an answer (Esc).
    Cancelled,
    /// Ctrl-C while the prompt was up.
    Interrupted,
}

/// Everything the download flow and chat selector ask the user.
pub trait Prompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<Reply<bool>, Abort>;
    fn text(&mut self, message: &str) -> Result<Reply<String>, Abort>;
    /// Index into `options` of the picked entry.
    fn select(&mut self, message: &str, options: &[String]) -> Result<Reply<usize>, Abort>;
}

/// Terminal prompts via `inquire`.
#[derive(Debug, Default)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<Reply<bool>, Abort> {
        lift(Confirm::new(message).with_default(default).prompt())
    }

    fn text(&mut self, message: &str) -> Result<Reply<String>, Abort> {
        lift(Text::new(message).prompt())
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<Reply<usize>, Abort> {
        let picked = Select::new(message, options.to_vec()).with_page_size(15).raw_prompt();
        lift(picked.map(|option| option.index))
    }
}

fn lift<T>(result: Result<T, InquireError>) -> Result<Reply<T>, Abort> {
    match result {
        Ok(value) => Ok(Reply::Answer(value)),
        Err(InquireError::OperationCanceled) => Ok(Reply::Cancelled),
        Err(InquireError::OperationInterrupted) => Ok(Reply::Interrupted),
        Err(e) => Err(Abort::Prompt(e.to_string())),
    }
}
