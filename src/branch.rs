//! Branch creation sub-flow and the launcher flows use to delegate to it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::git::GitCli;
use crate::repositories::RepositoryDiscovery;
use crate::wizard::{
    Directive, PickStep, QuickPickItem, Step, StepGenerator, StepInput, StepResult, Transition,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCreateState {
    pub repo: Option<PathBuf>,
    pub name: String,
    /// Treat `name` as a prefill the user confirms, never as final
    pub suggest_name_only: bool,
}

/// Arguments for a delegated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArgs {
    Branch(BranchCreateState),
}

/// Builds sub-flows for delegated commands
pub trait CommandLauncher: Send + Sync {
    fn launch(
        &self,
        args: CommandArgs,
        picked_via: Option<&str>,
    ) -> Box<dyn StepGenerator<Output = ()>>;
}

#[async_trait]
pub trait BranchOps: Send + Sync {
    /// Local branches, current branch first
    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>>;

    async fn is_valid_name(&self, name: &str) -> bool;

    async fn create(&self, repo: &Path, name: &str, base: &str, switch: bool) -> Result<()>;
}

/// Branch operations through the git CLI
pub struct GitBranchOps;

#[async_trait]
impl BranchOps for GitBranchOps {
    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        GitCli::local_branches(repo).await
    }

    async fn is_valid_name(&self, name: &str) -> bool {
        GitCli::check_ref_format(name).await
    }

    async fn create(&self, repo: &Path, name: &str, base: &str, switch: bool) -> Result<()> {
        if switch {
            GitCli::switch_create(repo, name, base).await
        } else {
            GitCli::create_branch(repo, name, base).await
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBranch {
    pub repo: PathBuf,
    pub name: String,
    pub base: String,
    pub switch: bool,
}

/// In-memory branch operations for tests
#[derive(Clone)]
pub struct MockBranchOps {
    pub branches: Arc<Mutex<Vec<String>>>,
    pub created: Arc<Mutex<Vec<CreatedBranch>>>,
    pub fail_with: Arc<Mutex<Option<String>>>,
}

impl MockBranchOps {
    pub fn new(branches: &[&str]) -> Self {
        Self {
            branches: Arc::new(Mutex::new(branches.iter().map(ToString::to_string).collect())),
            created: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    pub fn created(&self) -> Vec<CreatedBranch> {
        self.created.lock().unwrap().clone()
    }

    /// Make every following `create` fail with `message`
    pub fn fail_create(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl BranchOps for MockBranchOps {
    async fn local_branches(&self, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.branches.lock().unwrap().clone())
    }

    async fn is_valid_name(&self, name: &str) -> bool {
        !name.is_empty() && !name.contains("..") && !name.contains(' ')
    }

    async fn create(&self, repo: &Path, name: &str, base: &str, switch: bool) -> Result<()> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        self.branches.lock().unwrap().push(name.to_string());
        self.created.lock().unwrap().push(CreatedBranch {
            repo: repo.to_path_buf(),
            name: name.to_string(),
            base: base.to_string(),
            switch,
        });
        Ok(())
    }
}

/// Launches sub-flows backed by git
pub struct GitCommandLauncher {
    ops: Arc<dyn BranchOps>,
    repositories: Arc<RepositoryDiscovery>,
}

impl GitCommandLauncher {
    pub fn new(ops: Arc<dyn BranchOps>, repositories: Arc<RepositoryDiscovery>) -> Self {
        Self { ops, repositories }
    }
}

impl CommandLauncher for GitCommandLauncher {
    fn launch(
        &self,
        args: CommandArgs,
        picked_via: Option<&str>,
    ) -> Box<dyn StepGenerator<Output = ()>> {
        debug!(?args, picked_via, "Launching command");
        match args {
            CommandArgs::Branch(state) => Box::new(BranchCreateCommand::new(
                state,
                Arc::clone(&self.ops),
                self.repositories.repositories(),
            )),
        }
    }
}

const TITLE: &str = "Create Branch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateAction {
    Create,
    CreateAndSwitch,
}

enum Phase {
    Start,
    Repo(PickStep<PathBuf>),
    Base(PickStep<String>),
    Name { invalid: Option<String> },
    Confirm(PickStep<CreateAction>),
    Done,
}

/// `branch create`: repository, base, name, confirm
pub struct BranchCreateCommand {
    state: BranchCreateState,
    ops: Arc<dyn BranchOps>,
    repositories: Vec<PathBuf>,
    base: Option<String>,
    /// Whether the repository came from a pick the user can go back to
    picked_repo: bool,
    /// Whether the base came from a pick the user can go back to
    picked_base: bool,
    phase: Phase,
}

impl BranchCreateCommand {
    pub fn new(state: BranchCreateState, ops: Arc<dyn BranchOps>, repositories: Vec<PathBuf>) -> Self {
        Self {
            state,
            ops,
            repositories,
            base: None,
            picked_repo: false,
            picked_base: false,
            phase: Phase::Start,
        }
    }

    fn finish(&mut self, result: StepResult<()>) -> Transition<()> {
        self.phase = Phase::Done;
        Transition::Done(result)
    }

    fn repo_step(&mut self) -> Transition<()> {
        let pick = self.repositories.iter().fold(
            PickStep::new(Step::pick(TITLE).with_placeholder("Choose a repository")),
            |pick, repo| {
                let label = repo
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| repo.display().to_string());
                pick.push(
                    QuickPickItem::new(label).with_description(repo.display().to_string()),
                    repo.clone(),
                )
            },
        );
        let step = pick.step().clone();
        self.phase = Phase::Repo(pick);
        Transition::Yield(step)
    }

    async fn base_step(&mut self) -> Transition<()> {
        let Some(repo) = self.state.repo.clone() else {
            return self.finish(StepResult::Break);
        };

        let branches = match self.ops.local_branches(&repo).await {
            Ok(branches) => branches,
            Err(e) => {
                warn!(repo = %repo.display(), error = %e, "Failed to list branches");
                Vec::new()
            }
        };

        if branches.len() <= 1 {
            self.picked_base = false;
            self.base = Some(branches.into_iter().next().unwrap_or_else(|| "HEAD".to_string()));
            return self.after_base().await;
        }

        let pick = branches.iter().enumerate().fold(
            PickStep::new(
                Step::pick(format!("{TITLE} from"))
                    .with_placeholder("Choose a base to create the new branch from"),
            ),
            |pick, (i, branch)| {
                let item = QuickPickItem::new(branch.clone());
                let item = if i == 0 {
                    item.with_description("current").picked()
                } else {
                    item
                };
                pick.push(item, branch.clone())
            },
        );
        let step = pick.step().clone();
        self.picked_base = true;
        self.phase = Phase::Base(pick);
        Transition::Yield(step)
    }

    /// A final, valid name skips the name step
    async fn after_base(&mut self) -> Transition<()> {
        if !self.state.suggest_name_only
            && !self.state.name.is_empty()
            && self.ops.is_valid_name(&self.state.name).await
        {
            self.confirm_step()
        } else {
            self.name_step(None)
        }
    }

    fn name_step(&mut self, invalid: Option<String>) -> Transition<()> {
        let placeholder = match &invalid {
            Some(name) => format!("'{name}' is not a valid branch name"),
            None => "Branch name".to_string(),
        };
        let step = Step::input(TITLE, self.state.name.clone()).with_placeholder(placeholder);
        self.phase = Phase::Name { invalid };
        Transition::Yield(step)
    }

    fn confirm_step(&mut self) -> Transition<()> {
        let base = self.base.clone().unwrap_or_else(|| "HEAD".to_string());
        let description = format!("{} from {}", self.state.name, base);
        let pick = PickStep::new(Step::confirm(format!("Confirm {TITLE}")))
            .push(
                QuickPickItem::new("Create Branch")
                    .with_description(description.clone())
                    .picked(),
                CreateAction::Create,
            )
            .push(
                QuickPickItem::new("Create & Switch to Branch").with_description(description),
                CreateAction::CreateAndSwitch,
            )
            .push_directive(Directive::Cancel, "Cancel");
        let step = pick.step().clone();
        self.phase = Phase::Confirm(pick);
        Transition::Yield(step)
    }

    /// The step before the name step
    async fn back_from_name(&mut self) -> Transition<()> {
        if self.picked_base {
            self.base_step().await
        } else if self.picked_repo {
            self.repo_step()
        } else {
            self.finish(StepResult::Break)
        }
    }

    async fn create(&mut self, action: CreateAction) -> Transition<()> {
        let (Some(repo), Some(base)) = (self.state.repo.clone(), self.base.clone()) else {
            return self.finish(StepResult::Break);
        };
        let switch = action == CreateAction::CreateAndSwitch;

        match self.ops.create(&repo, &self.state.name, &base, switch).await {
            Ok(()) => {
                info!(repo = %repo.display(), branch = %self.state.name, %base, switch, "Created branch");
                self.finish(StepResult::Value(()))
            }
            Err(e) => {
                warn!(branch = %self.state.name, error = %e, "Failed to create branch");
                self.finish(StepResult::Break)
            }
        }
    }
}

#[async_trait]
impl StepGenerator for BranchCreateCommand {
    type Output = ();

    async fn next(&mut self, input: Option<StepInput>) -> Transition<()> {
        if input == Some(StepInput::Cancel) {
            return self.finish(StepResult::Break);
        }

        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Start => {
                if self.state.repo.is_none() {
                    match self.repositories.len() {
                        0 => {
                            warn!("No repository to create the branch in");
                            return self.finish(StepResult::Break);
                        }
                        1 => self.state.repo = self.repositories.first().cloned(),
                        _ => {
                            self.picked_repo = true;
                            return self.repo_step();
                        }
                    }
                }
                self.base_step().await
            }
            Phase::Repo(pick) => match input.as_ref().map(|i| pick.resolve(i)) {
                Some(StepResult::Value(repo)) => {
                    self.state.repo = Some(repo);
                    self.base_step().await
                }
                _ => self.finish(StepResult::Break),
            },
            Phase::Base(pick) => {
                if input == Some(StepInput::Back) {
                    return if self.picked_repo {
                        self.repo_step()
                    } else {
                        self.finish(StepResult::Break)
                    };
                }
                match input.as_ref().map(|i| pick.resolve(i)) {
                    Some(StepResult::Value(base)) => {
                        self.base = Some(base);
                        self.after_base().await
                    }
                    _ => self.finish(StepResult::Break),
                }
            }
            Phase::Name { invalid } => match input {
                Some(StepInput::Text(name)) => {
                    let name = name.trim().to_string();
                    if self.ops.is_valid_name(&name).await {
                        self.state.name = name;
                        self.confirm_step()
                    } else {
                        debug!(%name, "Rejected branch name");
                        self.name_step(Some(name))
                    }
                }
                Some(StepInput::Back) => self.back_from_name().await,
                None => self.name_step(invalid),
                Some(_) => self.finish(StepResult::Break),
            },
            Phase::Confirm(pick) => {
                if input == Some(StepInput::Back) {
                    return self.name_step(None);
                }
                match input.as_ref().map(|i| pick.resolve(i)) {
                    Some(StepResult::Value(action)) => self.create(action).await,
                    _ => self.finish(StepResult::Break),
                }
            }
            Phase::Done => Transition::Done(StepResult::Break),
        }
    }
}
