//! Application shell: terminal lifecycle and event loop.
//!
//! Deliberately thin — all the interesting work happens in the parser,
//! graph and render layers. The shell owns the mutable session state
//! (rows, cursor, selections, search, in-flight refresh), polls the
//! refresh event stream, and maps key/mouse input onto it.
//!
//! Snapshot rules: batches accumulate off-screen and replace the visible
//! rows wholesale when the final batch lands; a failed refresh keeps the
//! previous snapshot on screen and surfaces the error in the status line;
//! the viewport resets only when a new snapshot actually applies.

use crate::config::{ResolvedConfig, ScrollCache};
use crate::exec::{JjCommand, LogRefresh, RefreshEvent, RefreshRegistry, REFRESH_LOG};
use crate::graph::Graph;
use crate::model::{AppError, Row};
use crate::parser::{annotate_rows, RevisionMeta};
use crate::render::{GraphRowIterator, GraphView, LevelTracer};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use std::collections::HashSet;
use std::io::Stdout;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ===== Terminal lifecycle =====

/// Terminal handle that restores the screen on drop, including on error
/// paths.
struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    fn enter() -> Result<Self, std::io::Error> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = self.terminal.show_cursor();
    }
}

// ===== App state =====

/// Input mode of the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    /// Typing a search query.
    Search(String),
    /// Typing an ace-jump id prefix.
    Ace(String),
}

/// Mutable session state.
pub struct App {
    cmd: JjCommand,
    config: ResolvedConfig,
    registry: RefreshRegistry,
    refresh: Option<LogRefresh>,
    pending_rows: Vec<Row>,
    meta: Vec<RevisionMeta>,
    rows: Vec<Row>,
    graph: Option<Graph>,
    view: GraphView,
    cursor: usize,
    selections: HashSet<String>,
    search: Option<String>,
    mode: InputMode,
    error: Option<String>,
    loading: bool,
    should_quit: bool,
    scroll_cache: ScrollCache,
}

impl App {
    /// Create the shell for a command runner and resolved config.
    pub fn new(cmd: JjCommand, config: ResolvedConfig) -> Self {
        Self {
            cmd,
            config,
            registry: RefreshRegistry::new(),
            refresh: None,
            pending_rows: Vec::new(),
            meta: Vec::new(),
            rows: Vec::new(),
            graph: None,
            view: GraphView::new(80, 24),
            cursor: 0,
            selections: HashSet::new(),
            search: None,
            mode: InputMode::Normal,
            error: None,
            loading: false,
            should_quit: false,
            scroll_cache: ScrollCache::load_default(),
        }
    }

    /// Kick off a (new) refresh, superseding any in-flight one.
    pub fn start_refresh(&mut self) {
        // Replacing the handle drops the old one, which cancels its
        // producer and kills its subprocess.
        let refresh = LogRefresh::start(
            &self.cmd,
            &mut self.registry,
            self.config.revset.clone(),
            self.config.batch_size,
        );
        refresh.request_more();
        self.refresh = Some(refresh);
        self.pending_rows.clear();
        self.meta.clear();
        self.loading = true;
    }

    /// Drain pending refresh events without blocking.
    fn poll_refresh(&mut self) {
        let Some(refresh) = &self.refresh else {
            return;
        };
        if !self.registry.is_current(REFRESH_LOG, refresh.generation()) {
            // Superseded; dropping the handle cancels the producer.
            self.refresh = None;
            return;
        }
        let mut events = Vec::new();
        while let Some(event) = refresh.try_event() {
            events.push(event);
        }
        for event in events {
            self.apply_refresh_event(event);
        }
    }

    fn apply_refresh_event(&mut self, event: RefreshEvent) {
        match event {
            RefreshEvent::Meta(meta) => self.meta = meta,
            RefreshEvent::Batch(batch) => {
                let has_more = batch.has_more;
                self.pending_rows.extend(batch.rows);
                if let Some(refresh) = &self.refresh {
                    // The final batch gets a signal too: the producer
                    // holds for one more control message before exiting.
                    refresh.request_more();
                }
                if !has_more {
                    self.apply_snapshot();
                }
            }
            RefreshEvent::Finished(Ok(())) => {
                self.loading = false;
                self.error = None;
                self.refresh = None;
            }
            RefreshEvent::Finished(Err(e)) => {
                // Keep the previous snapshot on screen; the status line
                // shows the failure out-of-band.
                tracing::warn!(error = %e, "log refresh failed");
                self.loading = false;
                self.error = Some(e.to_string());
                self.refresh = None;
            }
        }
    }

    /// Replace the visible rows with the completed snapshot.
    fn apply_snapshot(&mut self) {
        let mut rows = std::mem::take(&mut self.pending_rows);
        annotate_rows(&mut rows, &self.meta);
        let graph = Graph::build(&rows);

        let anchor = self
            .rows
            .get(self.cursor)
            .map(|row| row.revision.change_id.clone())
            .or_else(|| {
                self.cmd
                    .repo()
                    .and_then(|repo| self.scroll_cache.get(repo))
                    .map(str::to_string)
            });
        self.cursor = anchor
            .and_then(|id| rows.iter().position(|r| r.revision.change_id == id))
            .unwrap_or(0);

        self.rows = rows;
        self.graph = Some(graph);
        self.view.reset_view();
        self.loading = false;
    }

    // ----- navigation -----

    fn move_cursor(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, last as isize) as usize;
    }

    fn toggle_selection(&mut self) {
        let Some(row) = self.rows.get(self.cursor) else {
            return;
        };
        let id = row.revision.change_id.clone();
        if !self.selections.remove(&id) {
            self.selections.insert(id);
        }
    }

    /// Next row (after the cursor, wrapping) with a highlightable line
    /// matching the search text.
    fn next_match(&self, query: &str) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let len = self.rows.len();
        (1..=len)
            .map(|off| (self.cursor + off) % len)
            .find(|&i| row_matches(&self.rows[i], query))
    }

    /// Rows whose change-id or commit-id starts with the ace prefix.
    fn ace_candidates(&self, prefix: &str) -> Vec<usize> {
        let prefix = prefix.to_lowercase();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.revision.change_id.to_lowercase().starts_with(&prefix)
                    || row.revision.commit_id.to_lowercase().starts_with(&prefix)
            })
            .map(|(i, _)| i)
            .collect()
    }

    // ----- input -----

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match std::mem::replace(&mut self.mode, InputMode::Normal) {
            InputMode::Search(mut input) => match key.code {
                KeyCode::Enter => self.search = Some(input).filter(|s| !s.is_empty()),
                KeyCode::Esc => self.search = None,
                KeyCode::Backspace => {
                    input.pop();
                    self.mode = InputMode::Search(input);
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    self.mode = InputMode::Search(input);
                }
                _ => self.mode = InputMode::Search(input),
            },
            InputMode::Ace(mut input) => match key.code {
                KeyCode::Esc => {}
                KeyCode::Backspace => {
                    input.pop();
                    self.mode = InputMode::Ace(input);
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    match self.ace_candidates(&input).as_slice() {
                        [] => {} // dead end, leave ace mode
                        [only] => self.cursor = *only,
                        _ => self.mode = InputMode::Ace(input),
                    }
                }
                _ => self.mode = InputMode::Ace(input),
            },
            InputMode::Normal => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
                KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
                KeyCode::PageDown => self.move_cursor(10),
                KeyCode::PageUp => self.move_cursor(-10),
                KeyCode::Char('g') => self.cursor = 0,
                KeyCode::Char('G') => self.cursor = self.rows.len().saturating_sub(1),
                KeyCode::Char(' ') => self.toggle_selection(),
                KeyCode::Char('/') => self.mode = InputMode::Search(String::new()),
                KeyCode::Char('\'') => self.mode = InputMode::Ace(String::new()),
                KeyCode::Char('n') => {
                    if let Some(query) = self.search.clone() {
                        if let Some(next) = self.next_match(&query) {
                            self.cursor = next;
                        }
                    }
                }
                KeyCode::Char('r') => self.start_refresh(),
                _ => {}
            },
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(row) = self.view.find_row_at_window_line(mouse.row) {
                    self.cursor = row;
                }
            }
            MouseEventKind::ScrollDown => self.move_cursor(1),
            MouseEventKind::ScrollUp => self.move_cursor(-1),
            _ => {}
        }
    }

    // ----- rendering -----

    fn render_graph(&mut self) -> ratatui::text::Text<'static> {
        let ace_prefix = match &self.mode {
            InputMode::Ace(prefix) => Some(prefix.clone()),
            _ => None,
        };
        let mut iter = GraphRowIterator::new(&self.rows)
            .with_cursor(self.cursor)
            .with_width(self.view.width())
            .with_search(self.search.clone())
            .with_ace_prefix(ace_prefix)
            .with_selections(self.selections.clone());
        if let Some(graph) = &self.graph {
            iter = iter.with_tracer(Box::new(LevelTracer::new(
                graph.levels().to_vec(),
                self.cursor,
            )));
        }
        self.view.render(&mut iter)
    }

    fn status_line(&self) -> Line<'static> {
        let mut spans: Vec<Span<'static>> = Vec::new();
        match &self.mode {
            InputMode::Search(input) => {
                spans.push(Span::raw(format!("/{input}")));
            }
            InputMode::Ace(input) => {
                spans.push(Span::raw(format!("'{input}")));
            }
            InputMode::Normal => {
                let revset = self.config.revset.as_deref().unwrap_or("(default)");
                spans.push(Span::raw(format!("revset: {revset}")));
                if !self.rows.is_empty() {
                    spans.push(Span::raw(format!(
                        "  {}/{}",
                        self.cursor + 1,
                        self.rows.len()
                    )));
                }
                if !self.selections.is_empty() {
                    spans.push(Span::raw(format!("  {} selected", self.selections.len())));
                }
                if self.loading {
                    spans.push(Span::styled(
                        "  loading…",
                        Style::default().fg(Color::Yellow),
                    ));
                }
            }
        }
        if let Some(error) = &self.error {
            spans.push(Span::styled(
                format!("  {error}"),
                Style::default().fg(Color::Red),
            ));
        }
        Line::from(spans)
    }

    fn persist_position(&mut self) {
        let Some(repo) = self.cmd.repo().cloned() else {
            return;
        };
        if let Some(row) = self.rows.get(self.cursor) {
            self.scroll_cache.set(&repo, row.revision.change_id.clone());
            self.scroll_cache.save();
        }
    }
}

fn row_matches(row: &Row, query: &str) -> bool {
    use crate::model::row::LineFlags;
    row.lines
        .iter()
        .filter(|line| line.flags.contains(LineFlags::HIGHLIGHTABLE))
        .flat_map(|line| line.segments.iter())
        .any(|seg| seg.find_match(query).is_some())
}

/// Run the TUI until quit.
pub fn run(cmd: JjCommand, config: ResolvedConfig) -> Result<(), AppError> {
    let mut app = App::new(cmd, config);
    app.start_refresh();

    let mut tui = Tui::enter()?;
    let result = event_loop(&mut app, &mut tui);
    drop(tui);

    app.persist_position();
    result
}

fn event_loop(app: &mut App, tui: &mut Tui) -> Result<(), AppError> {
    loop {
        app.poll_refresh();

        let size = tui.terminal.size()?;
        app.view.set_size(size.width, size.height.saturating_sub(1));
        let graph = app.render_graph();
        let status = app.status_line();
        tui.terminal.draw(|frame| {
            let [graph_area, status_area] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
            frame.render_widget(Paragraph::new(graph), graph_area);
            frame.render_widget(Paragraph::new(status), status_area);
        })?;

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
        if app.should_quit {
            return Ok(());
        }
    }
}
