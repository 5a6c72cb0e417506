//! The host side of the protocol: something that can show a step and return
//! the user's answer.
//!
//! [`ScriptedHost`] replays a fixed list of answers and records every step it
//! was shown. It backs the flow tests and the `--script` mode of the binary.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::warn;

use super::freeze::PromptHandle;
use super::generator::StepInput;
use super::step::Step;

#[async_trait]
pub trait PromptHost: Send {
    /// Handle to the prompt the next step will be shown in
    fn prompt_handle(&self) -> Arc<dyn PromptHandle>;

    /// Show a step and wait for the user's answer
    async fn prompt(&mut self, step: &Step) -> StepInput;
}

#[derive(Debug, Default)]
struct PromptRecord {
    frozen: bool,
    freezes: usize,
    placeholder: Option<String>,
    placeholder_history: Vec<Option<String>>,
    ignore_focus_out: bool,
}

/// A [`PromptHandle`] that only records what was asked of it
#[derive(Debug, Default)]
pub struct RecordingPrompt {
    record: Mutex<PromptRecord>,
}

impl RecordingPrompt {
    fn with<R>(&self, f: impl FnOnce(&mut PromptRecord) -> R) -> R {
        f(&mut self.record.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_frozen(&self) -> bool {
        self.with(|r| r.frozen)
    }

    pub fn freeze_count(&self) -> usize {
        self.with(|r| r.freezes)
    }

    /// Every placeholder set through the handle, in order
    pub fn placeholder_history(&self) -> Vec<Option<String>> {
        self.with(|r| r.placeholder_history.clone())
    }

    pub fn ignores_focus_out(&self) -> bool {
        self.with(|r| r.ignore_focus_out)
    }

    fn show(&self, step: &Step) {
        self.with(|r| {
            r.placeholder.clone_from(&step.placeholder);
            r.ignore_focus_out = step.ignore_focus_out;
        });
    }
}

impl PromptHandle for RecordingPrompt {
    fn suspend_dismissal(&self) {
        self.with(|r| {
            r.frozen = true;
            r.freezes += 1;
        });
    }

    fn resume_dismissal(&self) {
        self.with(|r| r.frozen = false);
    }

    fn placeholder(&self) -> Option<String> {
        self.with(|r| r.placeholder.clone())
    }

    fn set_placeholder(&self, placeholder: Option<String>) {
        self.with(|r| {
            r.placeholder_history.push(placeholder.clone());
            r.placeholder = placeholder;
        });
    }

    fn set_ignore_focus_out(&self, ignore: bool) {
        self.with(|r| r.ignore_focus_out = ignore);
    }
}

/// A scripted answer, resolved against the step it is given to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Accept the first item with this label
    Select(String),
    /// Click a button on the first item with this label
    Button(String, &'static str),
    Text(String),
    Back,
    Cancel,
}

impl Answer {
    pub fn select(label: impl Into<String>) -> Self {
        Answer::Select(label.into())
    }

    pub fn button(label: impl Into<String>, button: &'static str) -> Self {
        Answer::Button(label.into(), button)
    }
}

/// A host that replays scripted answers. Runs out as Cancel.
pub struct ScriptedHost {
    answers: VecDeque<Answer>,
    shown: Vec<Step>,
    unmatched: Vec<Answer>,
    prompt: Arc<RecordingPrompt>,
}

impl ScriptedHost {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            shown: Vec::new(),
            unmatched: Vec::new(),
            prompt: Arc::new(RecordingPrompt::default()),
        }
    }

    /// Steps shown so far, in order
    pub fn shown(&self) -> &[Step] {
        &self.shown
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown.iter().map(|s| s.title.clone()).collect()
    }

    /// Answers whose label matched nothing in the step they were given to
    pub fn unmatched(&self) -> &[Answer] {
        &self.unmatched
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn recording(&self) -> Arc<RecordingPrompt> {
        Arc::clone(&self.prompt)
    }

    fn resolve(&mut self, step: &Step, answer: Answer) -> StepInput {
        let found = match &answer {
            Answer::Select(label) => step.position(label).map(|i| StepInput::Accept(vec![i])),
            Answer::Button(label, button) => step.position(label).map(|item| {
                StepInput::ItemButton {
                    item,
                    button: *button,
                }
            }),
            Answer::Text(text) => Some(StepInput::Text(text.clone())),
            Answer::Back => Some(StepInput::Back),
            Answer::Cancel => Some(StepInput::Cancel),
        };

        found.unwrap_or_else(|| {
            warn!(title = %step.title, ?answer, "Scripted answer matched no item");
            self.unmatched.push(answer);
            StepInput::Cancel
        })
    }
}

#[async_trait]
impl PromptHost for ScriptedHost {
    fn prompt_handle(&self) -> Arc<dyn PromptHandle> {
        self.prompt.clone()
    }

    async fn prompt(&mut self, step: &Step) -> StepInput {
        self.prompt.show(step);
        self.shown.push(step.clone());
        match self.answers.pop_front() {
            Some(answer) => self.resolve(step, answer),
            None => StepInput::Cancel,
        }
    }
}
