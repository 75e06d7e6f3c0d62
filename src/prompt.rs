use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};

/// Checks an answer before it is accepted.
pub type Validator<'a> = &'a dyn Fn(&str) -> Result<()>;

/// Everything the import workflow needs to ask the user.
pub trait Prompter {
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    fn input(&self, message: &str, default: &str, validator: Option<Validator<'_>>)
    -> Result<String>;

    /// Returns the chosen option verbatim.
    fn select(&self, message: &str, options: &[String]) -> Result<String>;
}

/// Asks on stderr and reads answers line by line from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(&self, prompt: &str) -> Result<String> {
        let mut err = io::stderr();
        write!(err, "{}", prompt)?;
        err.flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            bail!("no answer available for prompt: {}", prompt.trim());
        }
        Ok(line.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.ask(&format!("? {} ({}) ", message, hint))?;
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => eprintln!("Please answer yes or no"),
            }
        }
    }

    fn input(
        &self,
        message: &str,
        default: &str,
        validator: Option<Validator<'_>>,
    ) -> Result<String> {
        loop {
            let prompt = if default.is_empty() {
                format!("? {} ", message)
            } else {
                format!("? {} ({}) ", message, default)
            };
            let mut answer = self.ask(&prompt)?;
            if answer.is_empty() {
                answer = default.to_string();
            }
            match validator.map(|v| v(&answer)).unwrap_or(Ok(())) {
                Ok(()) => return Ok(answer),
                Err(err) => eprintln!("X {}", err),
            }
        }
    }

    fn select(&self, message: &str, options: &[String]) -> Result<String> {
        if options.is_empty() {
            bail!("nothing to choose from for: {}", message);
        }
        eprintln!("? {}", message);
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}) {}", i + 1, option);
        }
        loop {
            let answer = self.ask("  Answer: ")?;
            if let Ok(n) = answer.parse::<usize>()
                && (1..=options.len()).contains(&n)
            {
                return Ok(options[n - 1].clone());
            }
            if let Some(option) = options.iter().find(|o| **o == answer) {
                return Ok(option.clone());
            }
            eprintln!("Please pick a number between 1 and {}", options.len());
        }
    }
}

/// Non-interactive prompter for `--batch-mode`: takes every default and
/// refuses questions that have none.
#[derive(Debug, Default)]
pub struct BatchPrompter;

impl Prompter for BatchPrompter {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        tracing::debug!(message, default, "batch: confirm");
        Ok(default)
    }

    fn input(
        &self,
        message: &str,
        default: &str,
        validator: Option<Validator<'_>>,
    ) -> Result<String> {
        tracing::debug!(message, default, "batch: input");
        if let Some(validate) = validator {
            validate(default).map_err(|err| {
                anyhow::anyhow!("batch mode: default answer for '{}' rejected: {}", message, err)
            })?;
        }
        Ok(default.to_string())
    }

    fn select(&self, message: &str, options: &[String]) -> Result<String> {
        bail!(
            "batch mode: cannot choose for '{}' among {} options",
            message,
            options.len()
        )
    }
}

#[cfg(test)]
pub(crate) use scripted::{Answer, ScriptedPrompter};
