//! Talking to the user.
//!
//! The pipeline never talks to the terminal directly.  It asks
//! through the capability traits defined here, which lets the mail
//! client plug in its own widgets, lets batch runs refuse to prompt,
//! and lets tests script the user.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use anyhow::Result;

/// An answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Cancels the whole operation.
    Abort,
}

/// The outcome of a selection from a list of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The entry with the given index was chosen.
    Chosen(usize),
    /// The user wants to see the backend's view of the entry's key.
    VerifyKey(usize),
    /// The user wants to see the entry's full user ID.
    ViewId(usize),
    Cancelled,
}

/// Asks for a line of text.
pub trait PromptText {
    /// Returns `None` if the user cancelled.
    ///
    /// If `secret` is set, the input is not echoed.
    fn prompt_text(&self, prompt: &str, default: Option<&str>, secret: bool)
                   -> Result<Option<String>>;
}

/// Asks a yes/no question.
pub trait PromptYesNo {
    fn prompt_yes_no(&self, question: &str, default: Answer) -> Result<Answer>;
}

/// Asks the user to pick one of several letters.
pub trait PromptChoice {
    /// Returns `None` if the user cancelled.
    fn prompt_choice(&self, prompt: &str, letters: &str)
                     -> Result<Option<char>>;
}

/// Presents a list of candidates.
pub trait SelectFromCandidates {
    /// `current` is the entry the cursor starts on.
    fn select(&self, title: &str, entries: &[String], current: usize)
              -> Result<Selection>;
}

/// Informs the user.
pub trait Notify {
    /// Shows a one-line message.
    fn notify(&self, message: &str);

    /// Shows a longer text, e.g. backend output.
    fn show(&self, title: &str, text: &str) -> Result<()>;
}

/// Everything the pipeline needs from the user interface.
pub trait Interaction:
    PromptText + PromptYesNo + PromptChoice + SelectFromCandidates + Notify
{
}

impl<T> Interaction for T
where
    T: PromptText + PromptYesNo + PromptChoice + SelectFromCandidates + Notify,
{
}

/// A line oriented user interface on the terminal.
///
/// Prompts go to stderr, answers are read from stdin.
#[derive(Debug, Default)]
pub struct TerminalUi {
    // Whether stdin hit EOF.  Then, every prompt is cancelled.
    eof: RefCell<bool>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a line, returning `None` on EOF.
    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        if *self.eof.borrow() {
            return Ok(None);
        }

        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            *self.eof.borrow_mut() = true;
            writeln!(stderr)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }
}

impl PromptText for TerminalUi {
    fn prompt_text(&self, prompt: &str, default: Option<&str>, secret: bool)
                   -> Result<Option<String>>
    {
        let prompt = if prompt.ends_with(' ') {
            prompt.to_string()
        } else {
            format!("{} ", prompt)
        };

        if secret {
            let p = rpassword::prompt_password(&prompt)?;
            return Ok((! p.is_empty()).then_some(p));
        }

        let prompt = match default {
            Some(d) if ! d.is_empty() => format!("{}[{}] ", prompt, d),
            _ => prompt,
        };
        match self.read_line(&prompt)? {
            None => Ok(None),
            Some(l) if l.is_empty() =>
                Ok(default.filter(|d| ! d.is_empty()).map(Into::into)),
            Some(l) => Ok(Some(l)),
        }
    }
}

impl PromptYesNo for TerminalUi {
    fn prompt_yes_no(&self, question: &str, default: Answer) -> Result<Answer> {
        let hint = match default {
            Answer::Yes => "([yes]/no)",
            Answer::No => "(yes/[no])",
            Answer::Abort => "(yes/no)",
        };

        loop {
            let line = match self.read_line(&format!("{} {}: ", question, hint))? {
                None => return Ok(Answer::Abort),
                Some(l) => l.trim().to_lowercase(),
            };
            match line.as_str() {
                "" if default != Answer::Abort => return Ok(default),
                "y" | "yes" => return Ok(Answer::Yes),
                "n" | "no" => return Ok(Answer::No),
                _ => weprintln!("Please answer yes or no."),
            }
        }
    }
}

impl PromptChoice for TerminalUi {
    fn prompt_choice(&self, prompt: &str, letters: &str)
                     -> Result<Option<char>>
    {
        loop {
            let line = match self.read_line(prompt)? {
                None => return Ok(None),
                Some(l) => l.trim().to_lowercase(),
            };
            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if letters.contains(c) => return Ok(Some(c)),
                _ => weprintln!("Please enter one of: {}",
                                letters.chars().map(String::from)
                                .collect::<Vec<_>>().join(", ")),
            }
        }
    }
}

impl SelectFromCandidates for TerminalUi {
    fn select(&self, title: &str, entries: &[String], current: usize)
              -> Result<Selection>
    {
        let mut stderr = io::stderr();
        writeln!(stderr, "{}", title)?;
        for entry in entries {
            writeln!(stderr, "{}", entry)?;
        }

        loop {
            let line = match self.read_line(&format!(
                "Select a key by number [{}], v <number> to verify it, \
                 i <number> to view its ID, q to cancel: ", current + 1))?
            {
                None => return Ok(Selection::Cancelled),
                Some(l) => l.trim().to_lowercase(),
            };

            let (action, number) = match line.split_once(' ') {
                Some((a, n)) => (a, n.trim()),
                None if line.is_empty() => ("", ""),
                None if line.chars().all(|c| c.is_ascii_digit()) => ("", line.as_str()),
                None => (line.as_str(), ""),
            };

            let index = if number.is_empty() {
                Some(current)
            } else {
                number.parse::<usize>().ok()
                    .and_then(|n| n.checked_sub(1))
                    .filter(|&i| i < entries.len())
            };

            match (action, index) {
                ("q", _) => return Ok(Selection::Cancelled),
                ("", Some(i)) => return Ok(Selection::Chosen(i)),
                ("v", Some(i)) => return Ok(Selection::VerifyKey(i)),
                ("i", Some(i)) => return Ok(Selection::ViewId(i)),
                (_, None) => weprintln!("Invalid number."),
                _ => weprintln!("Unknown command {:?}.", action),
            }
        }
    }
}

impl Notify for TerminalUi {
    fn notify(&self, message: &str) {
        weprintln!("{}", message);
    }

    fn show(&self, title: &str, text: &str) -> Result<()> {
        let mut stderr = io::stderr();
        writeln!(stderr, "{}", title)?;
        writeln!(stderr)?;
        stderr.write_all(text.as_bytes())?;
        if ! text.ends_with('\n') {
            writeln!(stderr)?;
        }
        Ok(())
    }
}

/// A user interface that never prompts.
///
/// Questions get their default answers, text prompts and selections
/// are cancelled.  Notifications go to stderr unless quiet.
#[derive(Debug, Default)]
pub struct BatchUi {
    quiet: bool,
}

impl BatchUi {
    pub fn new(quiet: bool) -> Self {
        BatchUi { quiet }
    }
}

impl PromptText for BatchUi {
    fn prompt_text(&self, _: &str, _: Option<&str>, _: bool)
                   -> Result<Option<String>>
    {
        Ok(None)
    }
}

impl PromptYesNo for BatchUi {
    fn prompt_yes_no(&self, _: &str, default: Answer) -> Result<Answer> {
        Ok(default)
    }
}

impl PromptChoice for BatchUi {
    fn prompt_choice(&self, _: &str, _: &str) -> Result<Option<char>> {
        Ok(None)
    }
}

impl SelectFromCandidates for BatchUi {
    fn select(&self, _: &str, _: &[String], _: usize) -> Result<Selection> {
        Ok(Selection::Cancelled)
    }
}

impl Notify for BatchUi {
    fn notify(&self, message: &str) {
        qprintln!(quiet=self.quiet, "{}", message);
    }

    fn show(&self, _: &str, text: &str) -> Result<()> {
        if ! self.quiet {
            io::stderr().write_all(text.as_bytes())?;
        }
        Ok(())
    }
}
