//! Terminal console backed by Tokio's stdin and stdout.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::application::ports::Console;

/// Reads lines from stdin and prints to stdout.
pub struct StdConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for StdConsole {
    async fn prompt(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;
        }
        // Windows line endings leave a trailing '\r'.
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim_end_matches('\r').to_string()))
    }

    fn show(&mut self, line: &str) {
        println!("{line}");
    }
}
