//! The start work flow: connect a tracker, pick an assigned issue, and hand
//! off to branch creation.
//!
//! Per loop iteration the flow checks that at least one supported integration
//! is connected, checks access, reloads the issue list, then asks for an
//! issue and an action. Backing out of the pick or confirm step clears the
//! chosen issue and starts the iteration over. Backing out of the connect
//! step ends the flow.

pub mod items;
pub mod provider;
pub mod steps;

pub use items::{StartWorkAction, StartWorkItem, StartWorkResult, START_WORK_BUTTON};
pub use provider::{
    has_connected, ConnectedIntegrations, StartWorkProvider, SUPPORTED_START_WORK_INTEGRATIONS,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::access::{AccessChecker, EnsureAccess, Feature};
use crate::branch::{BranchCreateState, CommandArgs, CommandLauncher};
use crate::integrations::{ensure_connected_state, IntegrationId, IntegrationRegistry};
use crate::repositories::RepositoryDiscovery;
use crate::telemetry::{Attributes, EventSource, TelemetrySink};
use crate::text::slugify;
use crate::wizard::{
    Choice, Directive, FreezeHandle, PickStep, QuickCommand, Step, StepGenerator, StepInput,
    StepResult, StepState, Transition,
};

const SOURCE_TAG: &str = "startWork";

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What the user has chosen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartWorkState {
    pub item: Option<StartWorkItem>,
    pub action: Option<StartWorkAction>,
}

/// Per-run data refreshed on every loop iteration
#[derive(Debug, Clone, Default)]
pub struct StartWorkContext {
    pub result: StartWorkResult,
    pub title: String,
    pub connected: ConnectedIntegrations,
}

/// Collaborators the flow talks to
#[derive(Clone)]
pub struct StartWorkServices {
    pub provider: Arc<StartWorkProvider>,
    pub access: Arc<dyn AccessChecker>,
    pub launcher: Arc<dyn CommandLauncher>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub repositories: Arc<RepositoryDiscovery>,
}

impl StartWorkServices {
    fn registry(&self) -> &Arc<dyn IntegrationRegistry> {
        self.provider.registry()
    }
}

/// How a run was invoked
#[derive(Debug, Clone)]
pub struct StartWorkArgs {
    pub source: String,
    /// Use the bulk cloud connect step instead of per-integration entries
    pub cloud_integrations: bool,
    pub slugify_branch_names: bool,
    /// Overrides the confirm step default
    pub confirm: Option<bool>,
    /// Pre-selected issue; skips the pick step
    pub item: Option<StartWorkItem>,
}

impl Default for StartWorkArgs {
    fn default() -> Self {
        Self {
            source: "commandPalette".to_string(),
            cloud_integrations: false,
            slugify_branch_names: true,
            confirm: None,
            item: None,
        }
    }
}

/// Panics unless an item has been chosen
pub fn assert_start_work_state(state: &StepState<StartWorkState>) -> &StartWorkItem {
    match &state.item {
        Some(item) => item,
        None => panic!("Missing item"),
    }
}

enum Phase {
    Init,
    ConnectLocal(PickStep<IntegrationId>),
    ConnectCloud(PickStep<bool>),
    Access(EnsureAccess),
    PickIssue(PickStep<StartWorkItem>),
    Confirm(PickStep<StartWorkAction>),
    Dispatch(Box<dyn StepGenerator<Output = ()>>),
    Finished,
}

impl Phase {
    fn step(&self) -> Option<Step> {
        match self {
            Phase::ConnectLocal(pick) => Some(pick.step().clone()),
            Phase::ConnectCloud(pick) => Some(pick.step().clone()),
            Phase::PickIssue(pick) => Some(pick.step().clone()),
            Phase::Confirm(pick) => Some(pick.step().clone()),
            _ => None,
        }
    }
}

/// Work that runs without waiting for an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    LoopTop,
    Access,
    LoadItems,
    AfterPick,
    Dispatch,
}

enum Next {
    Go(Stage),
    Emit(Transition<()>),
}

pub struct StartWorkCommand {
    command: QuickCommand,
    services: StartWorkServices,
    args: StartWorkArgs,
    source: EventSource,
    instance: u64,
    state: StepState<StartWorkState>,
    context: StartWorkContext,
    /// Whether a connect step has been shown in this run
    opened: bool,
    phase: Phase,
}

impl StartWorkCommand {
    pub fn new(services: StartWorkServices, args: StartWorkArgs) -> Self {
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let source = EventSource::new(args.source.clone());

        let mut state = StepState::new(StartWorkState {
            item: args.item.clone(),
            action: None,
        });
        if let Some(confirm) = args.confirm {
            state = state.with_confirm(confirm);
        }
        if state.item.is_some() {
            state.advance();
        }

        let command = Self::command();
        let this = Self {
            context: StartWorkContext {
                title: command.title.clone(),
                ..StartWorkContext::default()
            },
            command,
            services,
            args,
            source,
            instance,
            state,
            opened: false,
            phase: Phase::Init,
        };
        this.send_event("startWork/open", Attributes::new());
        this
    }

    /// Command metadata
    pub fn command() -> QuickCommand {
        QuickCommand {
            key: "startWork",
            label: "startWork",
            title: "Start Work".to_string(),
            description: "Start work on an issue",
        }
    }

    pub fn state(&self) -> &StepState<StartWorkState> {
        &self.state
    }

    pub fn context(&self) -> &StartWorkContext {
        &self.context
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    fn send_event(&self, name: &str, mut attributes: Attributes) {
        let telemetry = &self.services.telemetry;
        if !telemetry.enabled() {
            return;
        }
        attributes.insert("instance".to_string(), json!(self.instance));
        telemetry.send_event(name, attributes, Some(&self.source));
    }

    fn finish(&mut self) -> Transition<()> {
        self.phase = Phase::Finished;
        let result = if self.state.backed_out() {
            StepResult::Break
        } else {
            StepResult::Value(())
        };
        debug!(counter = self.state.counter, cancelled = result.is_break(), "Start work finished");
        Transition::Done(result)
    }

    fn cancel(&mut self) -> Transition<()> {
        self.state.cancel();
        self.finish()
    }

    fn show(&mut self, phase: Phase) -> Transition<()> {
        match phase.step() {
            Some(step) => {
                self.phase = phase;
                Transition::Yield(step)
            }
            None => self.finish(),
        }
    }

    async fn run_stage(&mut self, stage: Stage) -> Next {
        debug!(?stage, counter = self.state.counter, "Start work stage");
        match stage {
            Stage::Init => {
                if self.services.repositories.is_discovering() {
                    debug!("Waiting for repository discovery");
                    self.services.repositories.wait().await;
                }
                self.context.result = StartWorkResult::default();
                self.context.connected = self.services.provider.get_connected_integrations().await;
                Next::Go(Stage::LoopTop)
            }
            Stage::LoopTop => self.loop_top(),
            Stage::Access => {
                let gate = EnsureAccess::new(Arc::clone(&self.services.access), Feature::StartWork);
                self.drive_access(gate, None).await
            }
            Stage::LoadItems => {
                self.refresh_items().await;
                if self.state.counter < 1 || self.state.item.is_none() {
                    self.send_event("startWork/steps/issue", Attributes::new());
                    let pick =
                        steps::pick_issue_step(&self.context.title, &self.context.result, Utc::now());
                    debug!(choices = pick.choice_count(), "Showing issue pick");
                    return Next::Emit(self.show(Phase::PickIssue(pick)));
                }
                Next::Go(Stage::AfterPick)
            }
            Stage::AfterPick => {
                let item = assert_start_work_state(&self.state).clone();
                if self.state.action.is_none() {
                    if self.state.confirm(true) {
                        self.send_event("startWork/steps/confirm", Attributes::new());
                        let pick = steps::confirm_step(&item, Utc::now());
                        return Next::Emit(self.show(Phase::Confirm(pick)));
                    }
                    // Start is the only action, so it is the default
                    self.state.action = Some(StartWorkAction::Start);
                }
                Next::Go(Stage::Dispatch)
            }
            Stage::Dispatch => self.dispatch().await,
        }
    }

    /// Top of the main loop: connect gate, then access gate
    fn loop_top(&mut self) -> Next {
        if !self.state.can_steps_continue() {
            return Next::Emit(self.finish());
        }
        self.context.title = self.command.title.clone();

        if has_connected(&self.context.connected) {
            return Next::Go(Stage::Access);
        }

        let event = if self.opened {
            "startWork/steps/connect"
        } else {
            "startWork/opened"
        };
        self.opened = true;
        let mut attributes = Attributes::new();
        attributes.insert("connected".to_string(), json!(false));
        self.send_event(event, attributes);

        let freeze = FreezeHandle::new();
        let phase = if self.args.cloud_integrations {
            Phase::ConnectCloud(steps::cloud_connect_step(
                &self.context.title,
                &self.context.connected,
                &freeze,
            ))
        } else {
            Phase::ConnectLocal(steps::local_connect_step(
                &self.context.title,
                &self.context.connected,
                &freeze,
            ))
        };
        Next::Emit(self.show(phase))
    }

    async fn drive_access(&mut self, mut gate: EnsureAccess, input: Option<StepInput>) -> Next {
        match gate.next(input).await {
            Transition::Yield(step) => {
                self.phase = Phase::Access(gate);
                Next::Emit(Transition::Yield(step))
            }
            Transition::Done(StepResult::Value(())) => Next::Go(Stage::LoadItems),
            Transition::Done(StepResult::Break) if gate.cancelled() => Next::Emit(self.cancel()),
            Transition::Done(StepResult::Break) => {
                self.state.back();
                if self.state.backed_out() {
                    debug!("Backed out of the access gate");
                    return Next::Emit(self.finish());
                }
                debug!("Access gate backed out, restarting loop");
                Next::Go(Stage::LoopTop)
            }
        }
    }

    /// Reload the issue list, replacing whatever was loaded before
    pub async fn refresh_items(&mut self) {
        let issues = self
            .services
            .registry()
            .get_my_issues(SUPPORTED_START_WORK_INTEGRATIONS)
            .await;
        if issues.is_none() {
            warn!("No issues could be loaded");
        }
        self.context.result = StartWorkResult::from_issues(issues);
        debug!(count = self.context.result.items.len(), "Loaded issues");
    }

    fn start_work(&mut self, item: Option<StartWorkItem>) {
        self.state.action = Some(StartWorkAction::Start);
        if let Some(item) = item {
            self.state.item = Some(item);
        }
    }

    /// Back out of the pick or confirm step to the top of the loop
    fn restart_from_pick(&mut self) -> Next {
        self.state.back();
        self.state.rearm();
        self.state.item = None;
        self.state.action = None;
        Next::Go(Stage::LoopTop)
    }

    async fn dispatch(&mut self) -> Next {
        let item = assert_start_work_state(&self.state).clone();
        let Some(action) = self.state.action else {
            self.state.end_steps();
            return Next::Emit(self.finish());
        };

        let mut attributes = Attributes::new();
        attributes.insert("action".to_string(), json!(action.as_str()));
        self.send_event("startWork/action", attributes);

        match action {
            StartWorkAction::Start => {
                let raw = item.branch_name();
                let name = if self.args.slugify_branch_names {
                    slugify(&raw)
                } else {
                    raw
                };
                info!(issue = %item.reference(), branch = %name, "Starting work");

                let sub_flow = self.services.launcher.launch(
                    CommandArgs::Branch(BranchCreateState {
                        repo: None,
                        name,
                        suggest_name_only: true,
                    }),
                    Some(SOURCE_TAG),
                );
                self.drive_sub_flow(sub_flow, None).await
            }
        }
    }

    async fn drive_sub_flow(
        &mut self,
        mut sub_flow: Box<dyn StepGenerator<Output = ()>>,
        input: Option<StepInput>,
    ) -> Next {
        let backed = input == Some(StepInput::Back);
        match sub_flow.next(input).await {
            Transition::Yield(step) => {
                self.phase = Phase::Dispatch(sub_flow);
                Next::Emit(Transition::Yield(step))
            }
            Transition::Done(StepResult::Value(())) => {
                debug!("Sub-flow finished");
                self.state.end_steps();
                Next::Emit(self.finish())
            }
            Transition::Done(StepResult::Break) if backed => {
                debug!("Backed out of the sub-flow");
                self.back_from_sub_flow()
            }
            Transition::Done(StepResult::Break) => {
                debug!("Sub-flow cancelled or failed");
                Next::Emit(self.cancel())
            }
        }
    }

    /// Back out of the delegated flow to the step that launched it
    fn back_from_sub_flow(&mut self) -> Next {
        self.state.action = None;
        if !self.state.confirm(true) {
            return self.restart_from_pick();
        }
        self.state.back();
        Next::Go(Stage::AfterPick)
    }

    async fn connect_local(&mut self, pick: PickStep<IntegrationId>, id: IntegrationId) -> Next {
        self.state.advance();
        let guard = pick.freeze_handle().map(FreezeHandle::freeze);

        let connected =
            Self::ensure_integration_connected(Arc::clone(self.services.registry()), id).await;
        info!(integration = %id, connected, "Connect finished");
        self.context.connected = self.services.provider.get_connected_integrations().await;

        drop(guard);
        Next::Go(Stage::LoopTop)
    }

    async fn connect_cloud(&mut self, pick: PickStep<bool>) -> Next {
        self.state.advance();
        let guard = pick.freeze_handle().map(FreezeHandle::freeze);
        let prompt = guard.as_ref().and_then(|g| g.prompt()).cloned();

        let previous = prompt.as_ref().map(|prompt| {
            let previous = prompt.placeholder();
            prompt.set_placeholder(Some(steps::CONNECTING_PLACEHOLDER.to_string()));
            prompt.set_ignore_focus_out(true);
            previous
        });

        let connected = self
            .services
            .registry()
            .connect_cloud_integrations(SUPPORTED_START_WORK_INTEGRATIONS, SOURCE_TAG)
            .await;
        info!(connected, "Cloud connect finished");

        if let (Some(prompt), Some(previous)) = (prompt, previous) {
            prompt.set_placeholder(previous);
        }
        self.context.connected = self.services.provider.get_connected_integrations().await;

        drop(guard);
        Next::Go(Stage::LoopTop)
    }

    async fn ensure_integration_connected(
        registry: Arc<dyn IntegrationRegistry>,
        id: IntegrationId,
    ) -> bool {
        let integration = match registry.get(id).await {
            Ok(integration) => integration,
            Err(e) => {
                warn!(integration = %id, error = %e, "Integration unavailable");
                return false;
            }
        };

        match ensure_connected_state(integration.as_ref()).await {
            Ok(true) => true,
            _ => match integration.connect(SOURCE_TAG).await {
                Ok(connected) => connected,
                Err(e) => {
                    warn!(integration = %id, error = %e, "Failed to connect integration");
                    false
                }
            },
        }
    }

    /// Back or Cancel at the connect gate ends the whole flow
    fn back_out_of_connect(&mut self, input: &StepInput) -> Next {
        if *input == StepInput::Back {
            self.state.back();
            if !self.state.backed_out() {
                self.state.cancel();
            }
            return Next::Emit(self.finish());
        }
        Next::Emit(self.cancel())
    }

    async fn on_answer(&mut self, phase: Phase, input: StepInput) -> Next {
        match phase {
            Phase::ConnectLocal(pick) => match pick.resolve(&input) {
                StepResult::Value(id) => self.connect_local(pick, id).await,
                StepResult::Break => self.back_out_of_connect(&input),
            },
            Phase::ConnectCloud(pick) => match pick.resolve(&input) {
                StepResult::Value(_) => self.connect_cloud(pick).await,
                StepResult::Break => self.back_out_of_connect(&input),
            },
            Phase::PickIssue(pick) => self.on_pick_answer(pick, input),
            Phase::Confirm(pick) => self.on_confirm_answer(pick, input),
            Phase::Access(gate) => self.drive_access(gate, Some(input)).await,
            Phase::Dispatch(sub_flow) => self.drive_sub_flow(sub_flow, Some(input)).await,
            Phase::Init | Phase::Finished => Next::Emit(self.finish()),
        }
    }

    fn on_pick_answer(&mut self, pick: PickStep<StartWorkItem>, input: StepInput) -> Next {
        if let StepInput::ItemButton { item, button } = input {
            return match pick.value_at(item) {
                Some(Choice::Item(chosen)) if button == START_WORK_BUTTON.id => {
                    // Picking and confirming in one action
                    self.start_work(Some(chosen.clone()));
                    self.state.advance();
                    Next::Go(Stage::AfterPick)
                }
                _ => Next::Emit(self.show(Phase::PickIssue(pick))),
            };
        }

        if input == StepInput::Cancel || pick.chosen_directive(&input) == Some(Directive::Cancel) {
            return Next::Emit(self.cancel());
        }

        match pick.resolve(&input) {
            StepResult::Value(item) => {
                self.state.item = Some(item);
                self.state.advance();
                Next::Go(Stage::AfterPick)
            }
            StepResult::Break => self.restart_from_pick(),
        }
    }

    fn on_confirm_answer(&mut self, pick: PickStep<StartWorkAction>, input: StepInput) -> Next {
        if let StepInput::ItemButton { item, button } = input {
            return match pick.value_at(item) {
                Some(Choice::Item(_)) if button == START_WORK_BUTTON.id => {
                    self.start_work(None);
                    self.state.advance();
                    Next::Go(Stage::Dispatch)
                }
                _ => Next::Emit(self.show(Phase::Confirm(pick))),
            };
        }

        if input == StepInput::Cancel {
            return Next::Emit(self.cancel());
        }

        match pick.resolve(&input) {
            StepResult::Value(action) => {
                self.state.action = Some(action);
                self.state.advance();
                Next::Go(Stage::Dispatch)
            }
            StepResult::Break => self.restart_from_pick(),
        }
    }
}

#[async_trait]
impl StepGenerator for StartWorkCommand {
    type Output = ();

    async fn next(&mut self, input: Option<StepInput>) -> Transition<()> {
        let phase = std::mem::replace(&mut self.phase, Phase::Finished);

        let mut next = match (phase, input) {
            (Phase::Init, _) => Next::Go(Stage::Init),
            (Phase::Finished, _) => Next::Emit(self.finish()),
            (Phase::Access(gate), input) => self.drive_access(gate, input).await,
            (Phase::Dispatch(sub_flow), input) => self.drive_sub_flow(sub_flow, input).await,
            (phase, None) => Next::Emit(self.show(phase)),
            (phase, Some(input)) => self.on_answer(phase, input).await,
        };

        loop {
            match next {
                Next::Emit(transition) => return transition,
                Next::Go(stage) => next = self.run_stage(stage).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ConfigAccess;
    use crate::branch::{GitCommandLauncher, MockBranchOps};
    use crate::config::AccessConfig;
    use crate::integrations::{Integrations, MockIntegration};
    use crate::telemetry::RecordingTelemetry;
    use crate::wizard::{run, Answer, ScriptedHost};
    use std::path::PathBuf;

    fn services(github: MockIntegration, telemetry: RecordingTelemetry) -> StartWorkServices {
        let registry: Arc<dyn IntegrationRegistry> = Arc::new(Integrations::new().with(Arc::new(github)));
        let repositories = Arc::new(RepositoryDiscovery::with_repositories(vec![PathBuf::from(
            "/work/app",
        )]));
        StartWorkServices {
            provider: Arc::new(StartWorkProvider::new(registry)),
            access: Arc::new(ConfigAccess::new(&AccessConfig::default())),
            launcher: Arc::new(GitCommandLauncher::new(
                Arc::new(MockBranchOps::new(&["main"])),
                Arc::clone(&repositories),
            )),
            telemetry: Arc::new(telemetry),
            repositories,
        }
    }

    fn issue(id: &str, title: &str) -> crate::integrations::IssueRef {
        MockIntegration::issue(IntegrationId::GitHub, id, title)
    }

    #[test]
    #[should_panic(expected = "Missing item")]
    fn test_assert_state_panics_without_item() {
        let state = StepState::new(StartWorkState::default());
        assert_start_work_state(&state);
    }

    #[tokio::test]
    async fn test_refresh_items_replaces() {
        let github = MockIntegration::connected(IntegrationId::GitHub)
            .with_issues(vec![issue("1", "One"), issue("2", "Two")]);
        let mut flow = StartWorkCommand::new(
            services(github.clone(), RecordingTelemetry::new()),
            StartWorkArgs::default(),
        );

        flow.refresh_items().await;
        let first = flow.context().result.clone();
        flow.refresh_items().await;

        assert_eq!(flow.context().result, first);
        assert_eq!(first.items.len(), 2);
        assert_eq!(github.fetches(), 2);
    }

    #[tokio::test]
    async fn test_telemetry_events() {
        let telemetry = RecordingTelemetry::new();
        let github = MockIntegration::disconnected(IntegrationId::GitHub)
            .connects_to(true)
            .with_issues(vec![issue("42", "Fix crash")]);
        let mut flow = StartWorkCommand::new(services(github, telemetry.clone()), StartWorkArgs::default());
        let mut host = ScriptedHost::new([
            Answer::select("Connect to GitHub..."),
            Answer::select("Fix crash"),
            Answer::select("Start Work..."),
            Answer::Text("42-fix-crash".to_string()),
            Answer::select("Create Branch"),
        ]);

        assert_eq!(run(&mut host, &mut flow).await, StepResult::Value(()));
        assert_eq!(
            telemetry.names(),
            vec![
                "startWork/open",
                "startWork/opened",
                "startWork/steps/issue",
                "startWork/steps/confirm",
                "startWork/action",
            ]
        );
        let action = telemetry.events().pop().unwrap();
        assert_eq!(action.attributes["action"], json!("start"));
        assert_eq!(action.attributes["instance"], json!(flow.instance()));
    }

    #[tokio::test]
    async fn test_back_at_connect_is_break() {
        let github = MockIntegration::disconnected(IntegrationId::GitHub);
        let mut flow = StartWorkCommand::new(
            services(github, RecordingTelemetry::new()),
            StartWorkArgs::default(),
        );
        let mut host = ScriptedHost::new([Answer::Back]);

        assert!(run(&mut host, &mut flow).await.is_break());
        assert_eq!(host.shown().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let github = MockIntegration::disconnected(IntegrationId::GitHub).connects_to(true);
        let mut flow = StartWorkCommand::new(
            services(github, RecordingTelemetry::new()),
            StartWorkArgs::default(),
        );
        let step = flow.next(None);
        assert_send(&step);
        assert!(matches!(step.await, Transition::Yield(_)));

        let connect = flow.next(Some(StepInput::Accept(vec![0])));
        assert_send(&connect);
    }

    #[tokio::test]
    async fn test_failed_connect_reoffers_connect_step() {
        let github = MockIntegration::disconnected(IntegrationId::GitHub).connects_to(false);
        let mut flow = StartWorkCommand::new(
            services(github.clone(), RecordingTelemetry::new()),
            StartWorkArgs::default(),
        );
        let mut host = ScriptedHost::new([Answer::select("Connect to GitHub..."), Answer::select("Cancel")]);

        assert!(run(&mut host, &mut flow).await.is_break());
        assert_eq!(host.shown().len(), 2);
        assert_eq!(host.shown()[0].title, host.shown()[1].title);
        assert_eq!(github.connect_sources(), vec!["startWork".to_string()]);
    }

    #[tokio::test]
    async fn test_preselected_item_skips_pick() {
        let github = MockIntegration::connected(IntegrationId::GitHub);
        let args = StartWorkArgs {
            item: Some(StartWorkItem::new(issue("7", "Docs"))),
            ..StartWorkArgs::default()
        };
        let mut flow = StartWorkCommand::new(services(github, RecordingTelemetry::new()), args);
        let mut host = ScriptedHost::new([
            Answer::select("Start Work..."),
            Answer::Text("7-docs".to_string()),
            Answer::select("Create Branch"),
        ]);

        assert_eq!(run(&mut host, &mut flow).await, StepResult::Value(()));
        assert_eq!(host.shown()[0].title, "Issue acme/app#7");
    }
}
