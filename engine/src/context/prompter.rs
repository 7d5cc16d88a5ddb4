//! Line-oriented user interaction.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show `prompt` and read one line; `None` at end of input
    async fn ask(&self, prompt: &str) -> anyhow::Result<Option<String>>;

    fn say(&self, text: &str);
}

/// stdin/stdout
#[derive(Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&self, prompt: &str) -> anyhow::Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|n| (n, line))
        })
        .await??;

        Ok(match line {
            (0, _) => None,
            (_, line) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        })
    }

    fn say(&self, text: &str) {
        println!("{}", text);
    }
}

/// Replays canned answers and records everything shown
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, prompt: &str) -> anyhow::Result<Option<String>> {
        self.say(prompt);
        Ok(self
            .answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front())
    }

    fn say(&self, text: &str) {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }
}
