//! Quick pick widget: a filterable item list, or a one-line text input.
//!
//! The widget only tracks what the user typed and which row is highlighted.
//! Key handling returns a [`StepInput`] once the user has answered.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::wizard::{ItemKind, Step, StepInput, StepKind};

pub struct Picker {
    kind: StepKind,
    /// Filter text for pick steps, the value for input steps
    text: String,
    /// Item indices left after filtering
    visible: Vec<usize>,
    /// Position of the highlighted row within `visible`
    selected: Option<usize>,
    list_state: ListState,
}

impl Picker {
    pub fn new(step: &Step) -> Self {
        let text = match step.kind {
            StepKind::Input => step.value.clone().unwrap_or_default(),
            _ => String::new(),
        };
        let mut picker = Self {
            kind: step.kind,
            text,
            visible: Vec::new(),
            selected: None,
            list_state: ListState::default(),
        };
        picker.refilter(step);
        picker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Index into `step.items` of the highlighted row
    pub fn selected_item(&self) -> Option<usize> {
        self.selected.map(|pos| self.visible[pos])
    }

    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    fn refilter(&mut self, step: &Step) {
        if self.kind == StepKind::Input {
            return;
        }
        let filtering = !self.text.is_empty();
        self.visible = step
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| match item.kind {
                // Group headers only make sense over the full list
                ItemKind::Separator => !filtering,
                _ => item.matches(
                    &self.text,
                    step.match_on_description,
                    step.match_on_detail,
                ),
            })
            .map(|(i, _)| i)
            .collect();

        let selectable = |&i: &usize| step.items[i].is_selectable();
        self.selected = self
            .visible
            .iter()
            .position(|&i| selectable(&i) && step.items[i].picked)
            .or_else(|| self.visible.iter().position(selectable));
        self.list_state.select(self.selected);
    }

    /// Move the highlight, skipping rows that can't be chosen
    pub fn move_selection(&mut self, step: &Step, down: bool) {
        let Some(current) = self.selected else {
            return;
        };
        let mut candidates: Box<dyn Iterator<Item = usize>> = if down {
            Box::new(current + 1..self.visible.len())
        } else {
            Box::new((0..current).rev())
        };
        if let Some(pos) = candidates.find(|&pos| step.items[self.visible[pos]].is_selectable()) {
            self.selected = Some(pos);
            self.list_state.select(self.selected);
        }
    }

    /// Apply a key press. Returns the answer once the user gave one.
    pub fn handle_key(&mut self, step: &Step, key: KeyEvent) -> Option<StepInput> {
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => Some(StepInput::Cancel),
            KeyCode::Char('c') if ctrl => Some(StepInput::Cancel),
            KeyCode::Left if alt => Some(StepInput::Back),
            KeyCode::Enter => self.submit(),
            KeyCode::Tab => self.click_button(step),
            KeyCode::Up => {
                self.move_selection(step, false);
                None
            }
            KeyCode::Down => {
                self.move_selection(step, true);
                None
            }
            KeyCode::Backspace => {
                if self.text.pop().is_none() {
                    // Backspace on an empty filter steps back
                    return (self.kind != StepKind::Input).then_some(StepInput::Back);
                }
                self.refilter(step);
                None
            }
            KeyCode::Char(c) if !ctrl => {
                self.text.push(c);
                self.refilter(step);
                None
            }
            _ => None,
        }
    }

    fn submit(&self) -> Option<StepInput> {
        match self.kind {
            StepKind::Input => Some(StepInput::Text(self.text.clone())),
            _ => self.selected_item().map(|i| StepInput::Accept(vec![i])),
        }
    }

    fn click_button(&self, step: &Step) -> Option<StepInput> {
        let item = self.selected_item()?;
        let button = step.items[item].buttons.first()?;
        Some(StepInput::ItemButton {
            item,
            button: button.id,
        })
    }

    pub fn render(&mut self, frame: &mut Frame, step: &Step, placeholder: Option<&str>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let entry = if self.text.is_empty() && self.kind != StepKind::Input {
            Span::styled(
                placeholder.unwrap_or_default().to_string(),
                Style::default().fg(Color::DarkGray),
            )
        } else {
            Span::raw(self.text.clone())
        };
        let title = Span::styled(
            format!(" {} ", step.title),
            Style::default().add_modifier(Modifier::BOLD),
        );
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::Cyan)),
                entry,
            ]))
            .block(Block::default().borders(Borders::ALL).title(title)),
            chunks[0],
        );

        if self.kind == StepKind::Input {
            frame.render_widget(
                Paragraph::new(placeholder.unwrap_or_default().to_string())
                    .style(Style::default().fg(Color::Gray))
                    .wrap(Wrap { trim: true }),
                chunks[1],
            );
        } else {
            let rows: Vec<ListItem> = self
                .visible
                .iter()
                .map(|&i| item_row(&step.items[i]))
                .collect();
            let list = List::new(rows)
                .highlight_style(
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("▶ ");
            frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
        }

        frame.render_widget(Paragraph::new(footer(self.kind)), chunks[2]);
    }
}

fn item_row(item: &crate::wizard::QuickPickItem) -> ListItem<'static> {
    if item.kind == ItemKind::Separator {
        return ListItem::new(Line::from(Span::styled(
            format!("── {} ──", item.label),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let label_style = match item.kind {
        ItemKind::Directive(_) => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };
    let mut head = vec![Span::styled(item.label.clone(), label_style)];
    if let Some(description) = &item.description {
        head.push(Span::styled(
            format!("  {description}"),
            Style::default().fg(Color::Gray),
        ));
    }
    for button in &item.buttons {
        head.push(Span::styled(
            format!("  [{}]", button.tooltip),
            Style::default().fg(Color::Cyan),
        ));
    }

    let mut lines = vec![Line::from(head)];
    if let Some(detail) = &item.detail {
        lines.push(Line::from(Span::styled(
            format!("  {detail}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    ListItem::new(lines)
}

fn footer(kind: StepKind) -> Line<'static> {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let mut spans = vec![key("Enter"), Span::raw(" accept  ")];
    if kind != StepKind::Input {
        spans.extend([key("Tab"), Span::raw(" item button  ")]);
    }
    spans.extend([
        key("Alt+←"),
        Span::raw(" back  "),
        key("Esc"),
        Span::raw(" cancel"),
    ]);
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{Directive, QuickPickItem, StepButton};
    use ratatui::{backend::TestBackend, Terminal};

    const START: StepButton = StepButton {
        id: "start-work",
        icon: "beaker",
        tooltip: "Start Work on this Item",
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn pick_step() -> Step {
        let mut step = Step::pick("Start Work • Select an Issue")
            .with_placeholder("Choose an issue")
            .matching(true, true);
        step.items.push(QuickPickItem::separator("Issues"));
        step.items.push(
            QuickPickItem::new("Fix crash")
                .with_description("acme/app#42")
                .with_button(START),
        );
        step.items.push(QuickPickItem::new("Add docs").with_detail("docs/readme"));
        step.items
            .push(QuickPickItem::directive(Directive::Cancel, "Cancel"));
        step
    }

    #[test]
    fn test_first_selectable_row_is_highlighted() {
        let step = pick_step();
        let picker = Picker::new(&step);
        assert_eq!(picker.selected_item(), Some(1));
        assert_eq!(picker.visible().len(), 4);
    }

    #[test]
    fn test_picked_row_wins_highlight() {
        let mut step = pick_step();
        step.items[2].picked = true;
        assert_eq!(Picker::new(&step).selected_item(), Some(2));
    }

    #[test]
    fn test_navigation_skips_unselectable_rows() {
        let step = pick_step();
        let mut picker = Picker::new(&step);

        picker.handle_key(&step, key(KeyCode::Up));
        assert_eq!(picker.selected_item(), Some(1));

        picker.handle_key(&step, key(KeyCode::Down));
        picker.handle_key(&step, key(KeyCode::Down));
        picker.handle_key(&step, key(KeyCode::Down));
        assert_eq!(picker.selected_item(), Some(3));
        assert_eq!(
            picker.handle_key(&step, key(KeyCode::Enter)),
            Some(StepInput::Accept(vec![3]))
        );
    }

    #[test]
    fn test_filter_uses_match_flags() {
        let step = pick_step();
        let mut picker = Picker::new(&step);
        for c in "readme".chars() {
            assert_eq!(picker.handle_key(&step, key(KeyCode::Char(c))), None);
        }
        assert_eq!(picker.visible(), &[2]);
        assert_eq!(picker.selected_item(), Some(2));

        let mut narrow = step.clone();
        narrow.match_on_detail = false;
        let mut picker = Picker::new(&narrow);
        for c in "readme".chars() {
            picker.handle_key(&narrow, key(KeyCode::Char(c)));
        }
        assert!(picker.visible().is_empty());
        assert_eq!(picker.handle_key(&narrow, key(KeyCode::Enter)), None);
    }

    #[test]
    fn test_backspace_on_empty_filter_goes_back() {
        let step = pick_step();
        let mut picker = Picker::new(&step);
        picker.handle_key(&step, key(KeyCode::Char('x')));
        assert_eq!(picker.handle_key(&step, key(KeyCode::Backspace)), None);
        assert_eq!(
            picker.handle_key(&step, key(KeyCode::Backspace)),
            Some(StepInput::Back)
        );
        assert_eq!(
            picker.handle_key(&step, KeyEvent::new(KeyCode::Left, KeyModifiers::ALT)),
            Some(StepInput::Back)
        );
        assert_eq!(
            picker.handle_key(&step, key(KeyCode::Esc)),
            Some(StepInput::Cancel)
        );
    }

    #[test]
    fn test_tab_clicks_first_button() {
        let step = pick_step();
        let mut picker = Picker::new(&step);
        assert_eq!(
            picker.handle_key(&step, key(KeyCode::Tab)),
            Some(StepInput::ItemButton {
                item: 1,
                button: "start-work"
            })
        );

        picker.handle_key(&step, key(KeyCode::Down));
        assert_eq!(picker.handle_key(&step, key(KeyCode::Tab)), None);
    }

    #[test]
    fn test_input_step_edits_prefilled_value() {
        let step = Step::input("Create Branch", "42-fix-crash");
        let mut picker = Picker::new(&step);
        assert_eq!(picker.text(), "42-fix-crash");

        for _ in 0..5 {
            picker.handle_key(&step, key(KeyCode::Backspace));
        }
        picker.handle_key(&step, key(KeyCode::Char('b')));
        assert_eq!(
            picker.handle_key(&step, key(KeyCode::Enter)),
            Some(StepInput::Text("42-fix-b".to_string()))
        );
    }

    #[test]
    fn test_render_shows_title_rows_and_placeholder() {
        let step = pick_step();
        let mut picker = Picker::new(&step);
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();

        terminal
            .draw(|f| picker.render(f, &step, Some("Choose an issue")))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("Start Work • Select an Issue"));
        assert!(screen.contains("Choose an issue"));
        assert!(screen.contains("Fix crash"));
        assert!(screen.contains("Start Work on this Item"));
        assert!(screen.contains("docs/readme"));
    }
}
