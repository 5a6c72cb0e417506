//! Feature entitlement checks and the access gate step.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{AccessConfig, Plan};
use crate::wizard::{
    Directive, PickStep, QuickPickItem, Step, StepGenerator, StepInput, StepResult, Transition,
};

/// Gated features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    StartWork,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::StartWork => write!(f, "Start Work"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    RequiresSignIn,
    RequiresUpgrade,
}

/// What the user can do about missing access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    SignIn,
    StartTrial,
    Upgrade,
}

#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn check(&self, feature: Feature) -> Access;

    /// Act on missing access, returning the access afterwards
    async fn request(&self, feature: Feature, action: AccessAction) -> Access;
}

/// Access derived from the configured plan
pub struct ConfigAccess {
    plan: Plan,
    allow_preview: bool,
    signed_in: AtomicBool,
    trial: AtomicBool,
}

impl ConfigAccess {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            plan: config.plan,
            allow_preview: config.allow_preview,
            signed_in: AtomicBool::new(config.signed_in),
            trial: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AccessChecker for ConfigAccess {
    async fn check(&self, feature: Feature) -> Access {
        let access = if !self.signed_in.load(Ordering::SeqCst) {
            Access::RequiresSignIn
        } else if self.plan == Plan::Pro
            || self.trial.load(Ordering::SeqCst)
            || self.allow_preview
        {
            Access::Allowed
        } else {
            Access::RequiresUpgrade
        };
        debug!(%feature, ?access, "Checked access");
        access
    }

    async fn request(&self, feature: Feature, action: AccessAction) -> Access {
        info!(%feature, ?action, "Access requested");
        match action {
            AccessAction::SignIn => self.signed_in.store(true, Ordering::SeqCst),
            AccessAction::StartTrial => self.trial.store(true, Ordering::SeqCst),
            // Upgrading happens outside this process
            AccessAction::Upgrade => {}
        }
        self.check(feature).await
    }
}

enum Phase {
    Check,
    Prompt(PickStep<AccessAction>),
    Done,
}

/// Step routine that only prompts when access is missing.
///
/// Returns `Value(())` once access is granted, Break when the user backs
/// out. [`EnsureAccess::cancelled`] tells a Cancel apart from a Back.
pub struct EnsureAccess {
    checker: Arc<dyn AccessChecker>,
    feature: Feature,
    phase: Phase,
    cancelled: bool,
}

impl EnsureAccess {
    pub fn new(checker: Arc<dyn AccessChecker>, feature: Feature) -> Self {
        Self {
            checker,
            feature,
            phase: Phase::Check,
            cancelled: false,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    fn prompt_for(&self, access: Access) -> PickStep<AccessAction> {
        let (placeholder, actions): (_, &[(&str, AccessAction)]) = match access {
            Access::RequiresSignIn => (
                format!("Sign in to use {}", self.feature),
                &[("Sign In", AccessAction::SignIn)],
            ),
            _ => (
                format!("{} requires a Pro plan", self.feature),
                &[
                    ("Start Pro Trial", AccessAction::StartTrial),
                    ("Upgrade to Pro", AccessAction::Upgrade),
                ],
            ),
        };

        let step = Step::confirm(format!("{} (Preview)", self.feature)).with_placeholder(placeholder);
        actions
            .iter()
            .fold(PickStep::new(step), |pick, (label, action)| {
                pick.push(QuickPickItem::new(*label), *action)
            })
            .push_directive(Directive::Cancel, "Cancel")
    }

    fn check_or_prompt(&mut self, access: Access) -> Transition<()> {
        if access == Access::Allowed {
            self.phase = Phase::Done;
            return Transition::Done(StepResult::Value(()));
        }
        let pick = self.prompt_for(access);
        let step = pick.step().clone();
        self.phase = Phase::Prompt(pick);
        Transition::Yield(step)
    }
}

#[async_trait]
impl StepGenerator for EnsureAccess {
    type Output = ();

    async fn next(&mut self, input: Option<StepInput>) -> Transition<()> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Check => {
                let access = self.checker.check(self.feature).await;
                self.check_or_prompt(access)
            }
            Phase::Prompt(pick) => {
                let Some(input) = input else {
                    let step = pick.step().clone();
                    self.phase = Phase::Prompt(pick);
                    return Transition::Yield(step);
                };

                match pick.resolve(&input) {
                    StepResult::Value(action) => {
                        let access = self.checker.request(self.feature, action).await;
                        self.check_or_prompt(access)
                    }
                    StepResult::Break => {
                        self.cancelled = input == StepInput::Cancel
                            || pick.chosen_directive(&input) == Some(Directive::Cancel);
                        Transition::Done(StepResult::Break)
                    }
                }
            }
            Phase::Done => Transition::Done(StepResult::Value(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{run, Answer, ScriptedHost};

    fn checker(plan: Plan, allow_preview: bool, signed_in: bool) -> Arc<dyn AccessChecker> {
        Arc::new(ConfigAccess::new(&AccessConfig {
            plan,
            allow_preview,
            signed_in,
        }))
    }

    #[tokio::test]
    async fn test_config_access() {
        assert_eq!(
            checker(Plan::Pro, false, true).check(Feature::StartWork).await,
            Access::Allowed
        );
        assert_eq!(
            checker(Plan::Community, true, true).check(Feature::StartWork).await,
            Access::Allowed
        );
        assert_eq!(
            checker(Plan::Community, false, true).check(Feature::StartWork).await,
            Access::RequiresUpgrade
        );
        assert_eq!(
            checker(Plan::Pro, true, false).check(Feature::StartWork).await,
            Access::RequiresSignIn
        );
    }

    #[tokio::test]
    async fn test_allowed_yields_nothing() {
        let mut host = ScriptedHost::new(Vec::new());
        let mut gate = EnsureAccess::new(checker(Plan::Pro, false, true), Feature::StartWork);

        assert_eq!(run(&mut host, &mut gate).await, StepResult::Value(()));
        assert!(host.shown().is_empty());
    }

    #[tokio::test]
    async fn test_trial_grants_access() {
        let mut host = ScriptedHost::new([Answer::select("Start Pro Trial")]);
        let mut gate = EnsureAccess::new(checker(Plan::Community, false, true), Feature::StartWork);

        assert_eq!(run(&mut host, &mut gate).await, StepResult::Value(()));
        assert_eq!(host.shown().len(), 1);
        assert_eq!(
            host.shown()[0].placeholder.as_deref(),
            Some("Start Work requires a Pro plan")
        );
    }

    #[tokio::test]
    async fn test_upgrade_reprompts_until_cancel() {
        let mut host = ScriptedHost::new([Answer::select("Upgrade to Pro"), Answer::select("Cancel")]);
        let mut gate = EnsureAccess::new(checker(Plan::Community, false, true), Feature::StartWork);

        assert_eq!(run(&mut host, &mut gate).await, StepResult::Break);
        assert_eq!(host.shown().len(), 2);
        assert!(gate.cancelled());
    }

    #[tokio::test]
    async fn test_back_is_not_cancel() {
        let mut host = ScriptedHost::new([Answer::Back]);
        let mut gate = EnsureAccess::new(checker(Plan::Pro, true, false), Feature::StartWork);

        assert_eq!(run(&mut host, &mut gate).await, StepResult::Break);
        assert!(!gate.cancelled());
    }
}
