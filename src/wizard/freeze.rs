//! Keeping a prompt on screen across an async side effect.
//!
//! A step that may run a long external action (connecting an integration)
//! carries a [`FreezeHandle`]. The driver fires it with the host's
//! [`PromptHandle`] when the prompt is shown. Later the flow calls
//! [`FreezeHandle::freeze`], which suspends dismissal until the returned
//! [`FreezeGuard`] is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Host-side control over the prompt currently on screen
pub trait PromptHandle: Send + Sync {
    /// Stop the prompt from closing after it produced a selection
    fn suspend_dismissal(&self);

    /// Allow the prompt to close again
    fn resume_dismissal(&self);

    fn placeholder(&self) -> Option<String>;

    fn set_placeholder(&self, placeholder: Option<String>);

    fn set_ignore_focus_out(&self, ignore: bool);
}

/// Capture hook for the prompt showing a step
#[derive(Clone, Default)]
pub struct FreezeHandle {
    prompt: Arc<Mutex<Option<Arc<dyn PromptHandle>>>>,
}

impl FreezeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the prompt is shown
    pub fn activate(&self, prompt: Arc<dyn PromptHandle>) {
        *self.prompt.lock().unwrap_or_else(PoisonError::into_inner) = Some(prompt);
    }

    pub fn is_active(&self) -> bool {
        self.prompt().is_some()
    }

    pub fn prompt(&self) -> Option<Arc<dyn PromptHandle>> {
        self.prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Freeze the captured prompt. A no-op guard if the prompt was never shown.
    pub fn freeze(&self) -> FreezeGuard {
        let prompt = self.prompt();
        if let Some(prompt) = &prompt {
            prompt.suspend_dismissal();
        }
        FreezeGuard { prompt }
    }
}

impl fmt::Debug for FreezeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreezeHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Disposer returned by [`FreezeHandle::freeze`]; un-freezes on drop
#[must_use = "dropping the guard resumes the prompt immediately"]
pub struct FreezeGuard {
    prompt: Option<Arc<dyn PromptHandle>>,
}

impl FreezeGuard {
    pub fn prompt(&self) -> Option<&Arc<dyn PromptHandle>> {
        self.prompt.as_ref()
    }

    pub fn resume(self) {
        drop(self);
    }
}

impl Drop for FreezeGuard {
    fn drop(&mut self) {
        if let Some(prompt) = self.prompt.take() {
            prompt.resume_dismissal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::host::RecordingPrompt;

    #[test]
    fn test_freeze_before_activation_is_noop() {
        let handle = FreezeHandle::new();
        assert!(!handle.is_active());
        let guard = handle.freeze();
        assert!(guard.prompt().is_none());
    }

    #[test]
    fn test_freeze_and_resume_on_drop() {
        let prompt = Arc::new(RecordingPrompt::default());
        let handle = FreezeHandle::new();
        handle.activate(prompt.clone());

        let guard = handle.freeze();
        assert!(prompt.is_frozen());
        drop(guard);
        assert!(!prompt.is_frozen());
        assert_eq!(prompt.freeze_count(), 1);
    }

    #[test]
    fn test_explicit_resume() {
        let prompt = Arc::new(RecordingPrompt::default());
        let handle = FreezeHandle::new();
        handle.activate(prompt.clone());

        handle.freeze().resume();
        assert!(!prompt.is_frozen());
    }

    #[test]
    fn test_clones_share_capture() {
        let prompt = Arc::new(RecordingPrompt::default());
        let handle = FreezeHandle::new();
        let copy = handle.clone();
        handle.activate(prompt.clone());
        assert!(copy.is_active());
    }
}
