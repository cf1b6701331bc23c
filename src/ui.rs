use std::cmp::min;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table,
        TableState, Wrap,
    },
    Frame,
};
use task_board::{
    model::{Task, TaskForm, TaskId, TaskStatus},
    sync::{Intent, Modal, NotificationKind, Phase},
    view::View,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Focus {
    Users,
    Search,
    Tasks,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Status,
    DueDate,
    StartDate,
}

impl FormField {
    const ORDER: [FormField; 5] = [
        FormField::Title,
        FormField::Description,
        FormField::Status,
        FormField::DueDate,
        FormField::StartDate,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Status => "Status",
            FormField::DueDate => "Due date (YYYY-MM-DD)",
            FormField::StartDate => "Start date (YYYY-MM-DD)",
        }
    }

    fn step(self, forward: bool) -> FormField {
        let len = Self::ORDER.len();
        let index = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let next = if forward {
            (index + 1) % len
        } else {
            (index + len - 1) % len
        };
        Self::ORDER[next]
    }
}

pub enum Action {
    None,
    Quit,
    Intent(Intent),
}

/// Terminal-only state: cursor positions, the search box and the form being
/// typed. Task and user data always come from the synchronizer's view.
pub struct Screen {
    pub focus: Focus,
    pub search: String,
    pub users_state: ListState,
    pub tasks_state: TableState,
    pub form: TaskForm,
    pub form_field: FormField,
    form_for: Option<Modal>,
    show_loading_indicator: bool,
}

impl Screen {
    pub fn new(show_loading_indicator: bool) -> Self {
        Screen {
            focus: Focus::Users,
            search: String::new(),
            users_state: ListState::default(),
            tasks_state: TableState::default(),
            form: TaskForm::default(),
            form_field: FormField::Title,
            form_for: None,
            show_loading_indicator,
        }
    }

    /// Keeps cursors in range and reseeds the form whenever a different
    /// dialog opens.
    pub fn sync_with(&mut self, view: &View<'_>) {
        let users = view.users_matching(&self.search).len();
        self.users_state
            .select(clamp(self.users_state.selected(), users));
        self.tasks_state
            .select(clamp(self.tasks_state.selected(), view.tasks.len()));

        if view.modal != self.form_for {
            self.form_for = view.modal;
            self.form = view.form_seed();
            self.form_field = FormField::Title;
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, view: &View<'_>) -> Action {
        match view.modal {
            Some(Modal::AddTask) | Some(Modal::EditTask) => self.on_form_key(key),
            Some(Modal::ViewTask) => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    Action::Intent(Intent::ModalClosed)
                }
                KeyCode::Char('e') => match &view.selection.task {
                    Some(task) => Action::Intent(Intent::EditTaskRequested(task.id)),
                    None => Action::None,
                },
                _ => Action::None,
            },
            Some(Modal::ConfirmDelete(_)) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => Action::Intent(Intent::DeleteConfirmed),
                KeyCode::Char('n') | KeyCode::Esc | KeyCode::Char('q') => {
                    Action::Intent(Intent::DeleteCancelled)
                }
                _ => Action::None,
            },
            None => match self.focus {
                Focus::Users => self.on_users_key(key, view),
                Focus::Search => self.on_search_key(key),
                Focus::Tasks => self.on_tasks_key(key, view),
            },
        }
    }

    fn on_users_key(&mut self, key: KeyEvent, view: &View<'_>) -> Action {
        let users = view.users_matching(&self.search);
        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                self.users_state
                    .select(move_down(self.users_state.selected(), users.len()));
                Action::None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.users_state.select(move_up(self.users_state.selected()));
                Action::None
            }
            KeyCode::Char('/') => {
                self.focus = Focus::Search;
                Action::None
            }
            KeyCode::Char('l') | KeyCode::Enter => match self.users_state.selected() {
                Some(index) if index < users.len() => {
                    self.focus = Focus::Tasks;
                    self.tasks_state.select(None);
                    Action::Intent(Intent::SelectUser(users[index].clone()))
                }
                _ => Action::None,
            },
            KeyCode::Char('x') => {
                self.tasks_state.select(None);
                Action::Intent(Intent::SelectionCleared)
            }
            KeyCode::Char('r') => Action::Intent(Intent::LoadUsers),
            KeyCode::Char('N') => Action::Intent(Intent::AddTaskRequested),
            _ => Action::None,
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char(c) => {
                self.search.push(c);
                self.users_state.select(Some(0));
            }
            KeyCode::Backspace => {
                self.search.pop();
                self.users_state.select(Some(0));
            }
            KeyCode::Esc => {
                self.search.clear();
                self.focus = Focus::Users;
            }
            KeyCode::Enter => self.focus = Focus::Users,
            _ => {}
        }
        Action::None
    }

    fn on_tasks_key(&mut self, key: KeyEvent, view: &View<'_>) -> Action {
        let highlighted = self
            .tasks_state
            .selected()
            .and_then(|index| view.tasks.get(index))
            .map(|task| task.id);
        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                self.tasks_state
                    .select(move_down(self.tasks_state.selected(), view.tasks.len()));
                Action::None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.tasks_state.select(move_up(self.tasks_state.selected()));
                Action::None
            }
            KeyCode::Char('h') | KeyCode::Esc => {
                self.focus = Focus::Users;
                Action::None
            }
            KeyCode::Char('N') => Action::Intent(Intent::AddTaskRequested),
            KeyCode::Char('e') => highlighted
                .map(|id| Action::Intent(Intent::EditTaskRequested(id)))
                .unwrap_or(Action::None),
            KeyCode::Char('v') | KeyCode::Enter => highlighted
                .map(|id| Action::Intent(Intent::ViewTaskRequested(id)))
                .unwrap_or(Action::None),
            KeyCode::Char('D') => highlighted
                .map(|id| Action::Intent(Intent::DeleteTaskRequested(id)))
                .unwrap_or(Action::None),
            _ => Action::None,
        }
    }

    fn on_form_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => return Action::Intent(Intent::ModalClosed),
            KeyCode::Enter => return Action::Intent(Intent::FormSubmitted(self.form.clone())),
            KeyCode::Tab | KeyCode::Down => self.form_field = self.form_field.step(true),
            KeyCode::BackTab | KeyCode::Up => self.form_field = self.form_field.step(false),
            code if self.form_field == FormField::Status => match code {
                KeyCode::Right | KeyCode::Char(' ') => self.form.status = self.form.status.next(),
                KeyCode::Left => self.form.status = self.form.status.previous(),
                _ => {}
            },
            KeyCode::Char(c) => {
                if let Some(text) = self.field_text() {
                    text.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.field_text() {
                    text.pop();
                }
            }
            _ => {}
        }
        Action::None
    }

    fn field_text(&mut self) -> Option<&mut String> {
        match self.form_field {
            FormField::Title => Some(&mut self.form.title),
            FormField::Description => Some(&mut self.form.description),
            FormField::DueDate => Some(&mut self.form.due_date),
            FormField::StartDate => Some(&mut self.form.start_date),
            FormField::Status => None,
        }
    }
}

fn clamp(selected: Option<usize>, len: usize) -> Option<usize> {
    match (selected, len) {
        (_, 0) => None,
        (Some(index), len) => Some(min(index, len - 1)),
        (None, _) => None,
    }
}

fn move_up(selected: Option<usize>) -> Option<usize> {
    match selected {
        Some(0) | None => Some(0),
        Some(v) => Some(v - 1),
    }
}

fn move_down(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match selected {
        Some(v) => Some(min(v + 1, len - 1)),
        None => Some(0),
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Yellow,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Cancelled => Color::Red,
    }
}

fn focused_block(title: String, focused: bool) -> Block<'static> {
    let block = Block::default().title(title).borders(Borders::ALL);
    if focused {
        block.border_type(BorderType::Thick)
    } else {
        block
    }
}

pub fn draw<B: Backend>(frame: &mut Frame<'_, B>, view: &View<'_>, screen: &mut Screen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(frame.size());

    draw_banner(frame, chunks[0], view, screen.show_loading_indicator);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Min(2)].as_ref())
        .split(chunks[1]);
    draw_users(frame, body[0], view, screen);
    draw_tasks(frame, body[1], view, screen);

    frame.render_widget(
        Paragraph::new(help_line(view.modal, screen.focus)).style(Style::default().fg(Color::Gray)),
        chunks[2],
    );

    match view.modal {
        Some(Modal::AddTask) | Some(Modal::EditTask) => draw_task_form(frame, view, screen),
        Some(Modal::ViewTask) => {
            if let Some(task) = &view.selection.task {
                draw_task_details(frame, task);
            }
        }
        Some(Modal::ConfirmDelete(id)) => draw_confirm_delete(frame, id),
        None => {}
    }
}

fn help_line(modal: Option<Modal>, focus: Focus) -> &'static str {
    match (modal, focus) {
        (Some(Modal::AddTask), _) | (Some(Modal::EditTask), _) => {
            "(tab) Next field  (←/→) Status  (enter) Save  (esc) Cancel"
        }
        (Some(Modal::ViewTask), _) => "(e) Edit  (esc) Close",
        (Some(Modal::ConfirmDelete(_)), _) => "(y) Delete  (n) Cancel",
        (None, Focus::Users) => "(j/k) Move  (l) Open  (/) Search  (x) Clear  (N) New task  (r) Reload  (q) Quit",
        (None, Focus::Search) => "Type to filter  (enter) Done  (esc) Clear",
        (None, Focus::Tasks) => "(j/k) Move  (v) View  (e) Edit  (D) Delete  (N) New task  (h) Back  (q) Quit",
    }
}

fn draw_banner<B: Backend>(frame: &mut Frame<'_, B>, area: Rect, view: &View<'_>, show_loading: bool) {
    let line = if show_loading && view.loading {
        Line::from("Loading...".italic())
    } else {
        match view.notification {
            Some(notification) => match notification.kind {
                NotificationKind::Success => Line::from(Span::styled(
                    notification.message.clone(),
                    Style::default().fg(Color::Green),
                )),
                NotificationKind::Error => Line::from(Span::styled(
                    notification.message.clone(),
                    Style::default().fg(Color::Red),
                )),
            },
            None => Line::from(""),
        }
    };
    let title = match view.phase {
        Phase::Error => "Tasks (last action failed)",
        _ => "Tasks",
    };
    frame.render_widget(
        Paragraph::new(line)
            .block(Block::default().title(title).borders(Borders::ALL))
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_users<B: Backend>(frame: &mut Frame<'_, B>, area: Rect, view: &View<'_>, screen: &mut Screen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(2)].as_ref())
        .split(area);

    frame.render_widget(
        Paragraph::new(screen.search.clone()).block(focused_block(
            "Search".to_string(),
            screen.focus == Focus::Search,
        )),
        chunks[0],
    );

    let items: Vec<_> = view
        .users_matching(&screen.search)
        .into_iter()
        .map(|user| {
            let marker = if view.is_selected(user) { "* " } else { "  " };
            ListItem::new(vec![
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(user.full_name(), Style::default().add_modifier(Modifier::BOLD)),
                ]),
                Line::from(Span::styled(
                    format!("  {}", user.email),
                    Style::default().fg(Color::Gray),
                )),
            ])
        })
        .collect();

    let users_ui = List::new(items)
        .block(focused_block("Users".to_string(), screen.focus == Focus::Users))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");

    frame.render_stateful_widget(users_ui, chunks[1], &mut screen.users_state);
}

fn draw_tasks<B: Backend>(frame: &mut Frame<'_, B>, area: Rect, view: &View<'_>, screen: &mut Screen) {
    let title = match &view.selection.user {
        Some(user) => format!("Tasks for {}", user.full_name()),
        None => "Tasks (pick a user)".to_string(),
    };
    let rows: Vec<_> = view
        .tasks
        .iter()
        .map(|task| {
            Row::new(vec![
                Cell::from(task.id.to_string()),
                Cell::from(task.title.clone()),
                Cell::from(task.status.label()).style(Style::default().fg(status_color(task.status))),
                Cell::from(date_text(task.start_date)),
                Cell::from(date_text(task.due_date)),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(6),
        Constraint::Min(10),
        Constraint::Length(12),
        Constraint::Length(11),
        Constraint::Length(11),
    ];

    let table = Table::new(rows)
        .header(
            Row::new(vec!["ID", "Title", "Status", "Start", "Due"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(focused_block(title, screen.focus == Focus::Tasks))
        .widths(&widths)
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");

    frame.render_stateful_widget(table, area, &mut screen.tasks_state);
}

fn date_text(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

fn draw_task_form<B: Backend>(frame: &mut Frame<'_, B>, view: &View<'_>, screen: &Screen) {
    let area = centered_rect(60, 70, frame.size());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Block::default()
            .title(view.modal_title().unwrap_or_default())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
        area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    for (index, field) in FormField::ORDER.iter().enumerate() {
        let value = match field {
            FormField::Title => screen.form.title.clone(),
            FormField::Description => screen.form.description.clone(),
            FormField::Status => format!("< {} >", screen.form.status),
            FormField::DueDate => screen.form.due_date.clone(),
            FormField::StartDate => screen.form.start_date.clone(),
        };
        let style = if *field == FormField::Status {
            Style::default().fg(status_color(screen.form.status))
        } else {
            Style::default()
        };
        frame.render_widget(
            Paragraph::new(value).style(style).block(
                Block::default()
                    .title(field.label())
                    .borders(Borders::ALL)
                    .border_type(if screen.form_field == *field {
                        BorderType::Thick
                    } else {
                        BorderType::Rounded
                    }),
            ),
            chunks[index],
        );
    }
}

fn draw_task_details<B: Backend>(frame: &mut Frame<'_, B>, task: &Task) {
    let area = centered_rect(60, 50, frame.size());
    let label = |name: &'static str| Span::styled(name, Style::default().add_modifier(Modifier::BOLD));
    let text = vec![
        Line::from(vec![label("Title: "), Span::raw(task.title.clone())]),
        Line::from(vec![label("Description: "), Span::raw(task.description.clone())]),
        Line::from(vec![
            label("Status: "),
            Span::styled(task.status.label(), Style::default().fg(status_color(task.status))),
        ]),
        Line::from(vec![label("Start date: "), Span::raw(date_text(task.start_date))]),
        Line::from(vec![label("Due date: "), Span::raw(date_text(task.due_date))]),
        Line::from(vec![
            label("Created: "),
            Span::raw(task.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::from(vec![
            label("Updated: "),
            Span::raw(task.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
    ];

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("Task Details")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            ),
        area,
    );
}

fn draw_confirm_delete<B: Backend>(frame: &mut Frame<'_, B>, id: TaskId) {
    let area = centered_rect(40, 20, frame.size());
    let text = vec![
        Line::from(format!("Delete task {id}?")),
        Line::from(""),
        Line::from("(y) Delete".red()),
        Line::from("(n) Cancel".green().italic()),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            ),
        area,
    );
}
