//! Quick-command engine: resumable, cancellable multi-step prompts.
//!
//! - `step`: prompt descriptors and typed pick steps
//! - `state`: per-run step counter and the Break sentinel
//! - `generator`: the suspend/resume protocol flows implement
//! - `freeze`: keeping a prompt alive across async work
//! - `host`: the prompt host seam, plus a scripted host
//! - `driver`: runs a flow against a host

pub mod driver;
pub mod freeze;
pub mod generator;
pub mod host;
pub mod state;
pub mod step;

pub use driver::run;
pub use freeze::{FreezeGuard, FreezeHandle, PromptHandle};
pub use generator::{QuickCommand, StepGenerator, StepInput, Transition};
pub use host::{Answer, PromptHost, RecordingPrompt, ScriptedHost};
pub use state::{StepResult, StepState};
pub use step::{Choice, Directive, ItemKind, PickStep, QuickPickItem, Step, StepButton, StepKind};
