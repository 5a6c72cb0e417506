//! Work items and how they render as picker rows

use chrono::{DateTime, Utc};

use crate::integrations::IssueRef;
use crate::text::{from_now, truncate_label};
use crate::wizard::{QuickPickItem, StepButton};

/// Issue titles longer than this are cut and end in `...`
pub const MAX_LABEL_LEN: usize = 60;

/// Inline "start work" action on an issue row
pub const START_WORK_BUTTON: StepButton = StepButton {
    id: "start-work",
    icon: "beaker",
    tooltip: "Start Work on this Item",
};

/// An issue the user can start work on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartWorkItem {
    pub item: IssueRef,
}

impl StartWorkItem {
    pub fn new(item: IssueRef) -> Self {
        Self { item }
    }

    /// `owner/repo#id`, with empty owner and repo when the issue has no repository
    pub fn reference(&self) -> String {
        let (owner, repo) = self
            .item
            .repository
            .as_ref()
            .map_or(("", ""), |r| (r.owner.as_str(), r.repo.as_str()));
        format!("{owner}/{repo}#{}", self.item.id)
    }

    /// Raw branch name before slugification
    pub fn branch_name(&self) -> String {
        format!("{}-{}", self.item.id, self.item.title)
    }
}

/// What to do with the chosen item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartWorkAction {
    Start,
}

impl StartWorkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartWorkAction::Start => "start",
        }
    }
}

/// The result set one load produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartWorkResult {
    pub items: Vec<StartWorkItem>,
}

impl StartWorkResult {
    pub fn from_issues(issues: Option<Vec<IssueRef>>) -> Self {
        Self {
            items: issues
                .unwrap_or_default()
                .into_iter()
                .map(StartWorkItem::new)
                .collect(),
        }
    }
}

/// Pick-step row for an issue
pub fn build_issue_item(item: &StartWorkItem, now: DateTime<Utc>) -> QuickPickItem {
    let issue = &item.item;
    QuickPickItem::new(truncate_label(&issue.title, MAX_LABEL_LEN))
        .with_description(item.reference())
        .with_detail(format!(
            "{} by @{}",
            from_now(issue.updated_date, now),
            issue.author.name
        ))
        .with_icon(issue.author.avatar_url.clone())
        .with_button(START_WORK_BUTTON)
}
