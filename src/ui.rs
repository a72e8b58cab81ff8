use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use tracker_catalog::approval::ReviewState;
use tracker_catalog::collision::CollisionEntry;
use tracker_catalog::listing::{Scope, PAGE_SIZE};
use tracker_catalog::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Trackers,
    Collisions,
    Views,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Trackers => Page::Collisions,
            Page::Collisions => Page::Views,
            Page::Views => Page::Trackers,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Trackers => Page::Views,
            Page::Collisions => Page::Trackers,
            Page::Views => Page::Collisions,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Trackers => "Trackers",
            Page::Collisions => "Collisions",
            Page::Views => "Views",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    All,
    Scope(Scope),
    Review(ReviewState),
    OnlyCollisions,
}

impl View {
    pub fn label(&self) -> &'static str {
        match self {
            View::All => "All trackers",
            View::Scope(Scope::Exodus) => "In Exodus",
            View::Scope(Scope::Local) => "Only in local catalog",
            View::Scope(Scope::All) => "All trackers",
            View::Review(ReviewState::Approved) => "Approved",
            View::Review(ReviewState::NeedsReview) => "Need review",
            View::Review(ReviewState::NoApprovals) => "No approvals",
            View::OnlyCollisions => "With collisions",
        }
    }
}

/// Views selectable with the number keys, in key order
pub const VIEWS: [View; 7] = [
    View::All,
    View::Scope(Scope::Exodus),
    View::Scope(Scope::Local),
    View::Review(ReviewState::Approved),
    View::Review(ReviewState::NeedsReview),
    View::Review(ReviewState::NoApprovals),
    View::OnlyCollisions,
];

/// One row of the browser with everything the detail panel shows
#[derive(Debug, Clone)]
pub struct BrowseEntry {
    pub tracker: Tracker,
    pub review: ReviewState,
    pub approvers: Vec<String>,
    pub collides: bool,
}

pub struct App {
    pub entries: Vec<BrowseEntry>,
    pub visible: Vec<usize>,
    pub collisions: Vec<CollisionEntry>,
    pub state: TableState,
    pub collisions_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub active_view: View,
}

impl App {
    pub fn new(entries: Vec<BrowseEntry>, collisions: Vec<CollisionEntry>) -> Self {
        let mut state = TableState::default();
        if !entries.is_empty() {
            state.select(Some(0));
        }

        let mut collisions_state = TableState::default();
        if !collisions.is_empty() {
            collisions_state.select(Some(0));
        }

        let visible = (0..entries.len()).collect();

        Self {
            entries,
            visible,
            collisions,
            state,
            collisions_state,
            current_page: Page::Trackers,
            show_detail: false,
            active_view: View::All,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_entry(&self) -> Option<&BrowseEntry> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|idx| self.entries.get(*idx))
    }

    pub fn apply_view(&mut self, view: View) {
        self.active_view = view;

        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| match view {
                View::All | View::Scope(Scope::All) => true,
                View::Scope(Scope::Exodus) => entry.tracker.is_in_exodus,
                View::Scope(Scope::Local) => !entry.tracker.is_in_exodus,
                View::Review(review) => entry.review == review,
                View::OnlyCollisions => entry.collides,
            })
            .map(|(i, _)| i)
            .collect();

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self
            .state
            .selected()
            .map(|i| (i + PAGE_SIZE).min(len - 1))
            .unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self
            .state
            .selected()
            .map(|i| i.saturating_sub(PAGE_SIZE))
            .unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let in_exodus = self.entries.iter().filter(|e| e.tracker.is_in_exodus).count();
        let approved = self
            .entries
            .iter()
            .filter(|e| e.review == ReviewState::Approved)
            .count();
        (self.entries.len(), in_exodus, approved)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.current_page = app.current_page.previous();
                    } else {
                        app.current_page = app.current_page.next();
                    }
                }
                KeyCode::BackTab => app.current_page = app.current_page.previous(),
                KeyCode::Char('c') => {
                    app.apply_view(View::All);
                    app.current_page = Page::Trackers;
                }
                KeyCode::Char(d) if app.current_page == Page::Views && ('1'..='7').contains(&d) => {
                    let idx = d as usize - '1' as usize;
                    app.apply_view(VIEWS[idx]);
                    app.current_page = Page::Trackers;
                }
                KeyCode::Down | KeyCode::Char('j') => match app.current_page {
                    Page::Collisions => step(&mut app.collisions_state, app.collisions.len(), true),
                    _ => app.next(),
                },
                KeyCode::Up | KeyCode::Char('k') => match app.current_page {
                    Page::Collisions => step(&mut app.collisions_state, app.collisions.len(), false),
                    _ => app.previous(),
                },
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.visible.is_empty() {
                        app.state.select(Some(app.visible.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn step(state: &mut TableState, len: usize, forward: bool) {
    if len == 0 {
        return;
    }
    let i = match (state.selected(), forward) {
        (Some(i), true) => (i + 1) % len,
        (Some(0), false) => len - 1,
        (Some(i), false) => i - 1,
        (None, _) => 0,
    };
    state.select(Some(i));
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Trackers {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Trackers => render_table(f, chunks[1], app),
            Page::Collisions => render_collisions(f, chunks[1], app),
            Page::Views => render_views(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let (total, in_exodus, approved) = app.counts();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Trackers, Page::Collisions, Page::Views].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(format!("Total: {}", total), Style::default().fg(Color::White)));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(format!("Exodus: {}", in_exodus), Style::default().fg(Color::Cyan)));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(format!("Approved: {}", approved), Style::default().fg(Color::Green)));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Collisions: {}", app.collisions.len()),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn review_color(review: ReviewState) -> Color {
    match review {
        ReviewState::Approved => Color::Green,
        ReviewState::NeedsReview => Color::Yellow,
        ReviewState::NoApprovals => Color::DarkGray,
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Name", "Code signature", "Network signature", "Exodus", "Review", "Progress"]
        .iter()
        .map(|h| Cell::from(*h).style(header_style()));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visible.iter().filter_map(|i| app.entries.get(*i)).map(|entry| {
        let t = &entry.tracker;
        let name_style = if entry.collides {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };

        Row::new(vec![
            Cell::from(truncate(&t.name, 28)).style(name_style),
            Cell::from(truncate(&t.code_signature, 30)),
            Cell::from(truncate(&t.network_signature, 30)),
            Cell::from(if t.is_in_exodus { "yes" } else { "no" }),
            Cell::from(entry.review.as_str()).style(Style::default().fg(review_color(entry.review))),
            Cell::from(format!("{}%", t.progress())),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Length(32),
            Constraint::Length(32),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Trackers - {} ", app.active_view.label())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_collisions(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["Tracker", "Collides with", "Kind"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.collisions.iter().map(|entry| {
        let names: Vec<&str> = entry.collisions.iter().map(|c| c.name.as_str()).collect();
        let kinds: Vec<String> = entry
            .collisions
            .iter()
            .map(|c| format!("{:?}", c.kind).to_lowercase())
            .collect();
        Row::new(vec![
            Cell::from(truncate(&entry.tracker_name, 30)),
            Cell::from(truncate(&names.join(", "), 50)),
            Cell::from(kinds.join(", ")),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(32), Constraint::Length(52), Constraint::Min(10)],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Signature collisions "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.collisions_state);
}

fn render_views(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![
        Line::from(Span::styled("Select a view", header_style())),
        Line::from(""),
    ];

    for (i, view) in VIEWS.iter().enumerate() {
        let marker = if *view == app.active_view { "●" } else { " " };
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", i + 1), Style::default().fg(Color::Yellow)),
            Span::raw(format!("{} {}", marker, view.label())),
        ]));
    }

    let views = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Views "),
    );

    f.render_widget(views, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let entry = match app.selected_entry() {
        Some(entry) => entry,
        None => {
            let empty = Paragraph::new("No tracker selected")
                .block(Block::default().borders(Borders::ALL).title(" Detail "));
            f.render_widget(empty, area);
            return;
        }
    };
    let t = &entry.tracker;

    let label = |name: &str| Span::styled(format!("{}: ", name), Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(Span::styled(t.name.clone(), header_style())),
        Line::from(""),
        Line::from(vec![label("Code signature"), Span::raw(t.code_signature.clone())]),
        Line::from(vec![label("Network signature"), Span::raw(t.network_signature.clone())]),
        Line::from(vec![label("Website"), Span::raw(t.website.clone())]),
        Line::from(vec![label("Created"), Span::raw(t.creation_date.to_string())]),
        Line::from(vec![label("Progress"), Span::raw(format!("{}%", t.progress()))]),
        Line::from(vec![
            label("Review"),
            Span::styled(entry.review.as_str(), Style::default().fg(review_color(entry.review))),
        ]),
        Line::from(vec![label("Approvers"), Span::raw(entry.approvers.join(", "))]),
    ];

    let missing = t.missing_fields();
    if !missing.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            label("Missing"),
            Span::styled(missing.join(", "), Style::default().fg(Color::Red)),
        ]));
    }

    for link in t.documentation_list() {
        lines.push(Line::from(vec![label("Doc"), Span::raw(link)]));
    }

    if !t.description.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(t.description.clone()));
    }

    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Detail "),
        );

    f.render_widget(detail, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.visible.len()),
        Style::default().fg(Color::Cyan),
    )];

    if app.active_view != View::All {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("View: {}", app.active_view.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    for (key, action) in [("Enter", " Details | "), ("Tab", " Page | "), ("↑/↓", " Nav | ")] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(action));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, exodus: bool, review: ReviewState, collides: bool) -> BrowseEntry {
        BrowseEntry {
            tracker: Tracker::new(name).in_exodus(exodus),
            review,
            approvers: Vec::new(),
            collides,
        }
    }

    fn app() -> App {
        App::new(
            vec![
                entry("a", true, ReviewState::Approved, false),
                entry("b", false, ReviewState::NeedsReview, true),
                entry("c", false, ReviewState::NoApprovals, false),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn test_views_filter_entries() {
        let mut app = app();
        assert_eq!(app.visible.len(), 3);

        app.apply_view(View::Scope(Scope::Local));
        assert_eq!(app.visible, vec![1, 2]);

        app.apply_view(View::OnlyCollisions);
        assert_eq!(app.selected_entry().map(|e| e.tracker.name.as_str()), Some("b"));

        app.apply_view(View::Review(ReviewState::Approved));
        assert_eq!(app.visible, vec![0]);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("élan vital tracker", 8), "élan ...");
    }
}
