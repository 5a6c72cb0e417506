//! The step generator protocol.
//!
//! A flow is an explicit, resumable state machine. The driver calls
//! [`StepGenerator::next`] with `None` to start it, shows every yielded
//! [`Step`], and feeds the host's answer back in as the next input. Async work
//! (connecting an integration, fetching issues) happens inside `next`, between
//! receiving an answer and yielding the next step.
//!
//! Delegation is a parent holding a child generator in its current phase and
//! forwarding inputs until the child is `Done`. The parent must check the
//! child's result for Break right away.

use async_trait::async_trait;

use super::state::StepResult;
use super::step::Step;

/// The host's answer to a yielded step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// Indices of the accepted items
    Accept(Vec<usize>),
    /// Text entered in an input step
    Text(String),
    /// A button on an item row was clicked
    ItemButton { item: usize, button: &'static str },
    /// Navigate to the previous step
    Back,
    /// Dismiss the whole wizard
    Cancel,
}

/// What a generator does next
#[derive(Debug)]
pub enum Transition<T> {
    Yield(Step),
    Done(StepResult<T>),
}

#[async_trait]
pub trait StepGenerator: Send {
    type Output: Send;

    /// Resume the flow. `input` is the answer to the last yielded step.
    async fn next(&mut self, input: Option<StepInput>) -> Transition<Self::Output>;
}

/// A named, invocable flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickCommand {
    pub key: &'static str,
    pub label: &'static str,
    pub title: String,
    pub description: &'static str,
}
