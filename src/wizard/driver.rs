//! Drives one generator against one host until it finishes

use tracing::{debug, instrument};

use super::generator::{StepGenerator, Transition};
use super::host::PromptHost;
use super::state::StepResult;

/// Run a flow to completion or cancellation.
///
/// Every yielded step is shown on the host; its answer resumes the flow. A
/// step's activation hook is fired with the host's prompt handle right before
/// the prompt is shown.
#[instrument(skip_all)]
pub async fn run<G, H>(host: &mut H, generator: &mut G) -> StepResult<G::Output>
where
    G: StepGenerator + ?Sized,
    H: PromptHost + ?Sized,
{
    let mut input = None;
    let mut shown = 0usize;

    loop {
        match generator.next(input.take()).await {
            Transition::Yield(step) => {
                if let Some(hook) = &step.on_activate {
                    hook.activate(host.prompt_handle());
                }

                shown += 1;
                debug!(
                    title = %step.title,
                    kind = ?step.kind,
                    items = step.items.len(),
                    shown,
                    "Showing step"
                );

                let answer = host.prompt(&step).await;
                debug!(?answer, "Step answered");
                input = Some(answer);
            }
            Transition::Done(result) => {
                debug!(shown, cancelled = result.is_break(), "Flow finished");
                return result;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::freeze::FreezeHandle;
    use crate::wizard::generator::StepInput;
    use crate::wizard::host::{Answer, ScriptedHost};
    use crate::wizard::step::{Directive, PickStep, QuickPickItem, Step};
    use async_trait::async_trait;

    /// Asks for a colour, then a size, and returns both. Back on the size
    /// step returns to the colour step.
    #[derive(Default)]
    struct TwoQuestions {
        colour: Option<String>,
        freeze: FreezeHandle,
        frozen_while_sizing: bool,
        awaiting: Option<PickStep<String>>,
    }

    impl TwoQuestions {
        fn colour_step(&self) -> PickStep<String> {
            PickStep::new(Step::pick("Colour").with_freeze(self.freeze.clone()))
                .push(QuickPickItem::new("red"), "red".to_string())
                .push(QuickPickItem::new("blue"), "blue".to_string())
                .push_directive(Directive::Cancel, "Cancel")
        }

        fn size_step(&self) -> PickStep<String> {
            PickStep::new(Step::pick("Size"))
                .push(QuickPickItem::new("small"), "small".to_string())
                .push(QuickPickItem::new("large"), "large".to_string())
        }
    }

    #[async_trait]
    impl StepGenerator for TwoQuestions {
        type Output = (String, String);

        async fn next(&mut self, input: Option<StepInput>) -> Transition<Self::Output> {
            let Some(input) = input else {
                let pick = self.colour_step();
                let step = pick.step().clone();
                self.awaiting = Some(pick);
                return Transition::Yield(step);
            };
            let Some(pick) = self.awaiting.take() else {
                return Transition::Done(StepResult::Break);
            };

            match &self.colour {
                None => match pick.resolve(&input) {
                    StepResult::Value(colour) => {
                        let guard = self.freeze.freeze();
                        self.frozen_while_sizing = guard.prompt().is_some();
                        drop(guard);
                        self.colour = Some(colour);
                        let next = self.size_step();
                        let step = next.step().clone();
                        self.awaiting = Some(next);
                        Transition::Yield(step)
                    }
                    StepResult::Break => Transition::Done(StepResult::Break),
                },
                Some(colour) => {
                    if input == StepInput::Back {
                        self.colour = None;
                        let again = self.colour_step();
                        let step = again.step().clone();
                        self.awaiting = Some(again);
                        return Transition::Yield(step);
                    }
                    match pick.resolve(&input) {
                        StepResult::Value(size) => {
                            Transition::Done(StepResult::Value((colour.clone(), size)))
                        }
                        StepResult::Break => Transition::Done(StepResult::Break),
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_runs_to_completion() {
        let mut host = ScriptedHost::new([Answer::select("blue"), Answer::select("large")]);
        let mut flow = TwoQuestions::default();

        let result = run(&mut host, &mut flow).await;

        assert_eq!(
            result,
            StepResult::Value(("blue".to_string(), "large".to_string()))
        );
        assert_eq!(host.titles(), vec!["Colour", "Size"]);
    }

    #[tokio::test]
    async fn test_back_returns_to_previous_step() {
        let mut host = ScriptedHost::new([
            Answer::select("red"),
            Answer::Back,
            Answer::select("blue"),
            Answer::select("small"),
        ]);
        let mut flow = TwoQuestions::default();

        let result = run(&mut host, &mut flow).await;

        assert_eq!(
            result,
            StepResult::Value(("blue".to_string(), "small".to_string()))
        );
        assert_eq!(host.titles(), vec!["Colour", "Size", "Colour", "Size"]);
    }

    #[tokio::test]
    async fn test_cancel_directive_is_break() {
        let mut host = ScriptedHost::new([Answer::select("Cancel")]);
        let mut flow = TwoQuestions::default();

        assert!(run(&mut host, &mut flow).await.is_break());
    }

    #[tokio::test]
    async fn test_activation_hook_receives_host_prompt() {
        let mut host = ScriptedHost::new([Answer::select("red"), Answer::select("small")]);
        let mut flow = TwoQuestions::default();

        run(&mut host, &mut flow).await;

        assert!(flow.frozen_while_sizing);
        assert_eq!(host.recording().freeze_count(), 1);
        assert!(!host.recording().is_frozen());
    }
}
