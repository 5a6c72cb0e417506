//! Per-run step state and the Break sentinel

use std::ops::{Deref, DerefMut};

/// Outcome of a step or a whole flow: a value, or Break (abort / step back)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult<T> {
    Value(T),
    Break,
}

impl<T> StepResult<T> {
    pub fn is_break(&self) -> bool {
        matches!(self, StepResult::Break)
    }

    pub fn value(self) -> Option<T> {
        match self {
            StepResult::Value(value) => Some(value),
            StepResult::Break => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StepResult<U> {
        match self {
            StepResult::Value(value) => StepResult::Value(f(value)),
            StepResult::Break => StepResult::Break,
        }
    }
}

/// Mutable state of one flow invocation.
///
/// `counter` tracks completed steps. Dropping below `starting_step` means the
/// user backed out of the whole flow. Derefs to the flow's own state `S`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepState<S> {
    pub counter: i32,
    pub starting_step: i32,
    /// Force (or suppress) the confirmation step; `None` uses the flow default
    pub confirm: Option<bool>,
    ended: bool,
    data: S,
}

impl<S> StepState<S> {
    pub fn new(data: S) -> Self {
        Self {
            counter: 0,
            starting_step: 0,
            confirm: None,
            ended: false,
            data,
        }
    }

    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn can_steps_continue(&self) -> bool {
        !self.ended && self.counter >= self.starting_step
    }

    /// Whether a confirmation step should run
    pub fn confirm(&self, default: bool) -> bool {
        self.confirm.unwrap_or(default)
    }

    /// A step was completed
    pub fn advance(&mut self) {
        self.counter += 1;
    }

    /// The user stepped back
    pub fn back(&mut self) {
        self.counter -= 1;
    }

    /// The user dismissed the whole flow
    pub fn cancel(&mut self) {
        self.counter = self.starting_step - 1;
        self.ended = true;
    }

    /// Terminal signal: the flow's logic is done
    pub fn end_steps(&mut self) {
        self.ended = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn backed_out(&self) -> bool {
        self.counter < self.starting_step
    }

    /// Clamp the counter back to the first step without ending the run
    pub fn rearm(&mut self) {
        if self.counter < self.starting_step {
            self.counter = self.starting_step;
        }
    }

    pub fn data(&self) -> &S {
        &self.data
    }
}

impl<S> Deref for StepState<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.data
    }
}

impl<S> DerefMut for StepState<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.data
    }
}
