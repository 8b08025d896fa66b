//! Program input and output.
//!
//! `ask` reads through an [`InputSource`]; `print` writes through
//! [`Output`], which records every line so embedders and tests can inspect
//! what a program printed.

use std::collections::VecDeque;
use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::RuntimeError;

/// Where `ask` gets its lines from.
#[async_trait(?Send)]
pub trait InputSource {
    /// The next line without its terminator, or `None` at end of input.
    async fn read_line(&mut self) -> Result<Option<String>, RuntimeError>;
}

/// Reads the process's standard input.
#[derive(Default)]
pub struct StdinInput {
    lines: Option<Lines<BufReader<Stdin>>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl InputSource for StdinInput {
    async fn read_line(&mut self) -> Result<Option<String>, RuntimeError> {
        let lines = self
            .lines
            .get_or_insert_with(|| BufReader::new(tokio::io::stdin()).lines());
        lines.next_line().await.map_err(|e| RuntimeError::Input {
            message: e.to_string(),
        })
    }
}

/// Replays a fixed list of lines, then reports end of input.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedInput {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait(?Send)]
impl InputSource for ScriptedInput {
    async fn read_line(&mut self) -> Result<Option<String>, RuntimeError> {
        Ok(self.lines.pop_front())
    }
}

/// Recorded program output, optionally echoed to stdout.
#[derive(Debug, Default)]
pub struct Output {
    echo: bool,
    lines: Vec<String>,
}

impl Output {
    pub fn new(echo: bool) -> Self {
        Output {
            echo,
            lines: Vec::new(),
        }
    }

    pub fn write_line(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.lines.push(line);
    }

    /// Prompts are shown but not recorded as output lines.
    pub fn write_prompt(&mut self, prompt: &str) {
        if self.echo && !prompt.is_empty() {
            print!("{}", prompt);
            // A failed flush only delays the prompt.
            let _ = std::io::stdout().flush();
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_input_ends_with_none() {
        let mut input = ScriptedInput::new(["first", "second"]);
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[test]
    fn output_records_lines() {
        let mut out = Output::new(false);
        out.write_prompt("name? ");
        out.write_line("hello".to_string());
        assert_eq!(out.lines(), ["hello".to_string()]);
    }
}
