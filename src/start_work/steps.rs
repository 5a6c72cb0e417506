//! Step builders for the start work flow

use chrono::{DateTime, Utc};

use super::items::{build_issue_item, StartWorkAction, StartWorkItem, StartWorkResult, START_WORK_BUTTON};
use super::provider::{ConnectedIntegrations, SUPPORTED_START_WORK_INTEGRATIONS};
use crate::integrations::IntegrationId;
use crate::text::from_now;
use crate::wizard::{Directive, FreezeHandle, PickStep, QuickPickItem, Step};

pub const NO_ISSUES_PLACEHOLDER: &str = "No issues found. Start work anyway.";
pub const CONNECTING_PLACEHOLDER: &str = "Connecting integrations...";

fn connect_title(title: &str, additional: bool) -> String {
    let additional = if additional { "Additional " } else { "" };
    format!("{title} \u{2022} Connect an {additional}Integration")
}

/// One entry per supported integration that isn't connected yet
pub fn local_connect_step(
    title: &str,
    connected: &ConnectedIntegrations,
    freeze: &FreezeHandle,
) -> PickStep<IntegrationId> {
    let step = Step::confirm(connect_title(title, false))
        .with_placeholder("Connect an integration to view their issues in Start Work")
        .with_freeze(freeze.clone());

    SUPPORTED_START_WORK_INTEGRATIONS
        .iter()
        .filter(|&&id| !connected.get(&id).copied().unwrap_or(false))
        .fold(PickStep::new(step), |pick, &id| {
            let name = id.name();
            pick.push(
                QuickPickItem::new(format!("Connect to {name}...")).with_detail(format!(
                    "Will connect to {name} to provide access your pull requests and issues"
                )),
                id,
            )
        })
        .push_directive(Directive::Cancel, "Cancel")
}

/// A single picked entry that connects every supported integration at once
pub fn cloud_connect_step(
    title: &str,
    connected: &ConnectedIntegrations,
    freeze: &FreezeHandle,
) -> PickStep<bool> {
    let additional = connected.values().any(|&c| c);
    let (detail, placeholder) = if additional {
        (
            "Connect additional integrations to view their issues in Start Work",
            "Connect additional integrations to Start Work",
        )
    } else {
        (
            "Connect an integration to accelerate your work",
            "Connect an integration to get started with Start Work",
        )
    };

    let step = Step::confirm(connect_title(title, additional))
        .with_placeholder(placeholder)
        .ignoring_focus_out(true)
        .with_freeze(freeze.clone());
    let label = if additional {
        "Connect an Additional Integration..."
    } else {
        "Connect an Integration..."
    };

    PickStep::new(step)
        .push(QuickPickItem::new(label).with_detail(detail).picked(), true)
        .push_directive(Directive::Cancel, "Cancel")
}

/// Issue list, or a single "Start Work" cancel entry when there are none
pub fn pick_issue_step(
    title: &str,
    result: &StartWorkResult,
    now: DateTime<Utc>,
) -> PickStep<StartWorkItem> {
    let step = Step::pick(title).matching(true, true);

    if result.items.is_empty() {
        return PickStep::new(step.with_placeholder(NO_ISSUES_PLACEHOLDER))
            .push_directive(Directive::Cancel, "Start Work");
    }

    result.items.iter().fold(
        PickStep::new(step.with_placeholder("Choose an item to focus on")),
        |pick, item| pick.push(build_issue_item(item, now), item.clone()),
    )
}

/// Details of the chosen issue plus the actions available for it
pub fn confirm_step(item: &StartWorkItem, now: DateTime<Utc>) -> PickStep<StartWorkAction> {
    let issue = &item.item;
    let step = Step::confirm(format!("Issue {}", item.reference()))
        .with_placeholder("Choose an action to perform");

    PickStep::new(step)
        .push_separator(from_now(issue.updated_date, now))
        .push(
            QuickPickItem::new(issue.title.clone())
                .with_description(item.reference())
                .with_detail(issue.body.clone().unwrap_or_default())
                .with_icon(issue.author.avatar_url.clone())
                .with_button(START_WORK_BUTTON),
            StartWorkAction::Start,
        )
        .push_directive(Directive::Noop, "")
        .push_separator("Actions")
        .push(
            QuickPickItem::new("Start Work...").with_detail("Will start working on this issue"),
            StartWorkAction::Start,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::MockIntegration;
    use crate::wizard::{ItemKind, StepKind};

    fn connected(state: bool) -> ConnectedIntegrations {
        [(IntegrationId::GitHub, state)].into_iter().collect()
    }

    #[test]
    fn test_local_connect_lists_unconnected() {
        let pick = local_connect_step("Start Work", &connected(false), &FreezeHandle::new());
        let labels: Vec<_> = pick.step().items.iter().map(|i| i.label.as_str()).collect();

        assert_eq!(labels, vec!["Connect to GitHub...", "Cancel"]);
        assert_eq!(pick.step().title, "Start Work \u{2022} Connect an Integration");
        assert!(pick.freeze_handle().is_some());
        assert!(!pick.step().ignore_focus_out);
    }

    #[test]
    fn test_cloud_connect_wording() {
        let pick = cloud_connect_step("Start Work", &connected(false), &FreezeHandle::new());
        assert_eq!(pick.step().items[0].label, "Connect an Integration...");
        assert!(pick.step().items[0].picked);
        assert!(pick.step().ignore_focus_out);

        let pick = cloud_connect_step("Start Work", &connected(true), &FreezeHandle::new());
        assert_eq!(pick.step().items[0].label, "Connect an Additional Integration...");
        assert_eq!(
            pick.step().placeholder.as_deref(),
            Some("Connect additional integrations to Start Work")
        );
    }

    #[test]
    fn test_empty_pick_offers_single_directive() {
        let pick = pick_issue_step("Start Work", &StartWorkResult::default(), Utc::now());
        let step = pick.step();

        assert_eq!(step.items.len(), 1);
        assert_eq!(step.items[0].kind, ItemKind::Directive(Directive::Cancel));
        assert_eq!(step.items[0].label, "Start Work");
        assert_eq!(step.placeholder.as_deref(), Some(NO_ISSUES_PLACEHOLDER));
        assert_eq!(pick.choice_count(), 0);
    }

    #[test]
    fn test_pick_matches_on_description_and_detail() {
        let result = StartWorkResult::from_issues(Some(vec![MockIntegration::issue(
            IntegrationId::GitHub,
            "42",
            "Fix crash",
        )]));
        let pick = pick_issue_step("Start Work", &result, Utc::now());

        assert!(pick.step().match_on_description);
        assert!(pick.step().match_on_detail);
        assert_eq!(pick.choice_count(), 1);
    }

    #[test]
    fn test_confirm_layout() {
        let item = StartWorkItem::new(MockIntegration::issue(IntegrationId::GitHub, "42", "Fix crash"));
        let pick = confirm_step(&item, Utc::now());
        let step = pick.step();

        assert_eq!(step.kind, StepKind::Confirm);
        assert_eq!(step.title, "Issue acme/app#42");
        let kinds: Vec<_> = step.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ItemKind::Separator,
                ItemKind::Choice,
                ItemKind::Directive(Directive::Noop),
                ItemKind::Separator,
                ItemKind::Choice,
            ]
        );
        assert_eq!(step.items[4].label, "Start Work...");
        assert_eq!(step.items[1].buttons, vec![START_WORK_BUTTON]);
    }
}
