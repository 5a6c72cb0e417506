//! Step primitives: the prompt descriptors a flow yields to the host.
//!
//! A [`Step`] is purely presentational. The typed value behind each row lives
//! in a [`PickStep`], which keeps a `Choice<T>` aligned with every item so a
//! host selection (an item index) can be mapped back to the flow's own type.

use super::freeze::FreezeHandle;
use super::generator::StepInput;
use super::state::StepResult;

/// Non-selectable or sentinel choices mixed into a normal item list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Go back one step
    Back,
    /// Dismiss the prompt; selecting it is a Break
    Cancel,
    /// Spacer row with no effect
    Noop,
}

/// What kind of row an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemKind {
    /// A real, selectable choice
    #[default]
    Choice,
    /// A directive row
    Directive(Directive),
    /// A group header
    Separator,
}

/// A button rendered on an item row.
///
/// Clicking it is a side channel: the host reports
/// [`StepInput::ItemButton`] and the flow decides whether that advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepButton {
    pub id: &'static str,
    pub icon: &'static str,
    pub tooltip: &'static str,
}

/// One row of a pick or confirm step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuickPickItem {
    pub kind: ItemKind,
    pub label: String,
    pub description: Option<String>,
    pub detail: Option<String>,
    /// Icon or avatar reference
    pub icon_url: Option<String>,
    pub buttons: Vec<StepButton>,
    /// Marks the default path
    pub picked: bool,
}

impl QuickPickItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn directive(directive: Directive, label: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Directive(directive),
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn separator(label: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Separator,
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_icon(mut self, icon_url: Option<String>) -> Self {
        self.icon_url = icon_url;
        self
    }

    pub fn with_button(mut self, button: StepButton) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn picked(mut self) -> Self {
        self.picked = true;
        self
    }

    pub fn is_directive(&self) -> bool {
        matches!(self.kind, ItemKind::Directive(_))
    }

    /// Separators and no-op spacers can't be chosen
    pub fn is_selectable(&self) -> bool {
        !matches!(
            self.kind,
            ItemKind::Separator | ItemKind::Directive(Directive::Noop)
        )
    }

    /// Text used for free-text filtering, honoring the step's match flags
    pub fn matches(&self, filter: &str, on_description: bool, on_detail: bool) -> bool {
        if filter.is_empty() {
            return true;
        }
        let needle = filter.to_lowercase();
        let hit = |text: &str| text.to_lowercase().contains(&needle);

        hit(&self.label)
            || (on_description && self.description.as_deref().is_some_and(hit))
            || (on_detail && self.detail.as_deref().is_some_and(hit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Choose one of N items
    Pick,
    /// Short list with a default path and a trailing cancel
    Confirm,
    /// Free-text entry with a pre-filled value
    Input,
}

/// A prompt descriptor. Built fresh every time a flow yields it.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub title: String,
    pub placeholder: Option<String>,
    pub items: Vec<QuickPickItem>,
    /// Pre-filled text for input steps
    pub value: Option<String>,
    pub match_on_description: bool,
    pub match_on_detail: bool,
    /// Keep the prompt open when focus moves elsewhere
    pub ignore_focus_out: bool,
    /// Fired by the driver once the prompt is shown
    pub on_activate: Option<FreezeHandle>,
}

impl Step {
    fn with_kind(kind: StepKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            placeholder: None,
            items: Vec::new(),
            value: None,
            match_on_description: false,
            match_on_detail: false,
            ignore_focus_out: false,
            on_activate: None,
        }
    }

    pub fn pick(title: impl Into<String>) -> Self {
        Self::with_kind(StepKind::Pick, title)
    }

    pub fn confirm(title: impl Into<String>) -> Self {
        Self::with_kind(StepKind::Confirm, title)
    }

    pub fn input(title: impl Into<String>, value: impl Into<String>) -> Self {
        let mut step = Self::with_kind(StepKind::Input, title);
        step.value = Some(value.into());
        step
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn matching(mut self, on_description: bool, on_detail: bool) -> Self {
        self.match_on_description = on_description;
        self.match_on_detail = on_detail;
        self
    }

    pub fn ignoring_focus_out(mut self, ignore: bool) -> Self {
        self.ignore_focus_out = ignore;
        self
    }

    /// Attach a capture hook so the flow can freeze this prompt later
    pub fn with_freeze(mut self, handle: FreezeHandle) -> Self {
        self.on_activate = Some(handle);
        self
    }

    /// Index of the first item with the given label
    pub fn position(&self, label: &str) -> Option<usize> {
        self.items.iter().position(|item| item.label == label)
    }
}

/// A typed value behind a step row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice<T> {
    Item(T),
    Directive(Directive),
}

/// A step together with the typed values of its rows
#[derive(Debug, Clone)]
pub struct PickStep<T> {
    step: Step,
    values: Vec<Option<Choice<T>>>,
}

impl<T: Clone> PickStep<T> {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            values: Vec::new(),
        }
    }

    pub fn push(mut self, item: QuickPickItem, value: T) -> Self {
        self.step.items.push(QuickPickItem {
            kind: ItemKind::Choice,
            ..item
        });
        self.values.push(Some(Choice::Item(value)));
        self
    }

    pub fn push_directive(mut self, directive: Directive, label: impl Into<String>) -> Self {
        self.step
            .items
            .push(QuickPickItem::directive(directive, label));
        self.values.push(Some(Choice::Directive(directive)));
        self
    }

    pub fn push_separator(mut self, label: impl Into<String>) -> Self {
        self.step.items.push(QuickPickItem::separator(label));
        self.values.push(None);
        self
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn value_at(&self, index: usize) -> Option<&Choice<T>> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Number of real (non-directive, non-separator) choices
    pub fn choice_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| matches!(v, Some(Choice::Item(_))))
            .count()
    }

    /// The freeze hook attached to this step, if any
    pub fn freeze_handle(&self) -> Option<&FreezeHandle> {
        self.step.on_activate.as_ref()
    }

    /// Map a host answer to the chosen value.
    ///
    /// Anything other than accepting a real choice is a Break: directives,
    /// separators, out-of-range indices, back, cancel and item buttons
    /// (buttons are handled by the flow before resolving).
    pub fn resolve(&self, input: &StepInput) -> StepResult<T> {
        let StepInput::Accept(selection) = input else {
            return StepResult::Break;
        };

        match selection.first().and_then(|&index| self.value_at(index)) {
            Some(Choice::Item(value)) => StepResult::Value(value.clone()),
            _ => StepResult::Break,
        }
    }

    /// The directive chosen by an answer, if the answer picked one
    pub fn chosen_directive(&self, input: &StepInput) -> Option<Directive> {
        match input {
            StepInput::Accept(selection) => match selection.first().and_then(|&i| self.value_at(i)) {
                Some(Choice::Directive(directive)) => Some(*directive),
                _ => None,
            },
            _ => None,
        }
    }
}
