//! Where console lines come from

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::io::Output;

/// Outcome of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    /// Nothing to read yet; ask again without changing state
    Retry,
    /// Ctrl-C at the prompt
    Interrupted,
    Eof,
}

#[async_trait(?Send)]
pub trait LineSource {
    /// Show `prompt` and wait for the next line
    async fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine>;
}

/// Lines from the process's standard input
pub struct StdinLines {
    lines: Lines<BufReader<Stdin>>,
    prompt_out: Output,
}

impl StdinLines {
    pub fn new(prompt_out: Output) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt_out,
        }
    }
}

#[async_trait(?Send)]
impl LineSource for StdinLines {
    async fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        self.prompt_out.write_str(prompt);
        tokio::select! {
            line = self.lines.next_line() => Ok(match line? {
                Some(line) => ReadLine::Line(line),
                None => ReadLine::Eof,
            }),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                self.prompt_out.write_str("\n");
                Ok(ReadLine::Interrupted)
            }
        }
    }
}

/// A fixed sequence of reads, recording every prompt shown
#[derive(Debug, Default)]
pub struct ScriptedInput {
    reads: VecDeque<ReadLine>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            reads: lines
                .into_iter()
                .map(|line| ReadLine::Line(line.to_string()))
                .collect(),
            prompts: Vec::new(),
        }
    }

    pub fn push(&mut self, read: ReadLine) -> &mut Self {
        self.reads.push_back(read);
        self
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

#[async_trait(?Send)]
impl LineSource for ScriptedInput {
    async fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        self.prompts.push(prompt.to_string());
        Ok(self.reads.pop_front().unwrap_or(ReadLine::Eof))
    }
}
