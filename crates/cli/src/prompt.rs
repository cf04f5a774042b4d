//! Interactive confirmation before destructive operations.

use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> io::Result<bool>;
}

/// Accepts `y`, `yes`, `true` and `1`, ignoring case and surrounding
/// whitespace. Anything else, including an empty answer, is a no.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1"
    )
}

/// Prompts on stderr and reads one line of `input`.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, message: &str) -> io::Result<bool> {
        write!(self.output, "{message} [y/N] ")?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

/// Answers yes without asking; used for `--force`.
pub struct Assume;

impl Confirm for Assume {
    fn confirm(&mut self, _message: &str) -> io::Result<bool> {
        Ok(true)
    }
}
