mod draw;
mod form;
mod palette;
mod sanitize;

use std::io::{self, Stdout};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use tracing::{debug, info, warn};

use crate::TERMINAL_UI_ACTIVE;
use crate::api::{ApiError, MembershipInfo};
use crate::app::UiContext;
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::opener::{Opener, SystemOpener};
use crate::route::Route;
use crate::store::{Density, Theme};
use crate::views::RequestTracker;
use crate::views::Ticket;
use crate::views::graph::GraphView;
use crate::views::search::{LineAction, SearchView};
use crate::views::stream_graph::StreamGraphView;
use crate::views::transcript::TranscriptView;
use crate::worker::{Completed, Job, Worker};
use form::{Field, FilterForm, FormOutcome};

const TICK: Duration = Duration::from_millis(200);
const STATUS_DURATION: Duration = Duration::from_secs(3);
const PAGE: usize = 10;

/// Run the interactive browser on `route` until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be set up, drawn, or restored.
pub fn run(ctx: &mut UiContext<'_>, route: Route) -> Result<()> {
    let _quiet_logs = LogSuppression::engage();
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_loop(ctx, route, &mut terminal);

    disable_raw_mode()?;
    terminal
        .backend_mut()
        .execute(crossterm::terminal::LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Keeps log lines off the screen the browser is drawing on.
struct LogSuppression;

impl LogSuppression {
    fn engage() -> Self {
        TERMINAL_UI_ACTIVE.store(true, Ordering::Relaxed);
        Self
    }
}

impl Drop for LogSuppression {
    fn drop(&mut self) {
        TERMINAL_UI_ACTIVE.store(false, Ordering::Relaxed);
    }
}

fn run_loop(
    ctx: &mut UiContext<'_>,
    route: Route,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<()> {
    let worker = Worker::new(ctx.client.clone());
    let mut browser = Browser::new(
        ctx,
        Box::new(SystemClipboard::new()),
        Box::new(SystemOpener),
    );
    browser.navigate(route);

    loop {
        for job in browser.take_jobs() {
            worker.submit(job);
        }
        for done in worker.drain() {
            browser.apply(done);
        }
        browser.tick(Instant::now());
        terminal.draw(|frame| draw::draw(frame, &mut browser))?;
        browser.frame_rendered(Instant::now());
        if browser.should_quit() {
            return Ok(());
        }

        if event::poll(TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            browser.handle_key(key);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Form,
    Results,
}

/// One row of the search result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Row {
    Result(usize),
    Context(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    Home,
    Search,
    Graph,
    Settings,
}

impl Destination {
    pub(crate) const ALL: [Destination; 4] = [
        Destination::Home,
        Destination::Search,
        Destination::Graph,
        Destination::Settings,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Destination::Home => "Home",
            Destination::Search => "Search",
            Destination::Graph => "Graph",
            Destination::Settings => "Settings",
        }
    }

    fn from_digit(ch: char) -> Option<Self> {
        let idx = ch.to_digit(10)?.checked_sub(1)?;
        Self::ALL.get(usize::try_from(idx).ok()?).copied()
    }
}

#[derive(Debug, Default)]
pub(crate) struct HomeScreen {
    pub selected: usize,
}

pub(crate) struct SearchScreen {
    pub view: SearchView,
    pub form: FilterForm,
    pub focus: Focus,
    pub list: ListState,
    pub selected: usize,
}

impl SearchScreen {
    fn new() -> Self {
        Self {
            view: SearchView::default(),
            form: FilterForm::new(Field::FULL),
            focus: Focus::Form,
            list: ListState::default(),
            selected: 0,
        }
    }

    /// Result headers with the context lines of expanded results in between.
    pub(crate) fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for (idx, result) in self.view.results().iter().enumerate() {
            rows.push(Row::Result(idx));
            if self.view.is_expanded(&result.id) {
                rows.extend((0..result.contexts.len()).map(|ctx| Row::Context(idx, ctx)));
            }
        }
        rows
    }

    fn selected_row(&self) -> Option<Row> {
        self.rows().get(self.selected).copied()
    }
}

pub(crate) struct GraphScreen {
    pub view: GraphView,
    pub form: FilterForm,
    pub focus: Focus,
}

pub(crate) struct StreamGraphScreen {
    pub view: StreamGraphView,
    pub form: FilterForm,
    pub focus: Focus,
}

pub(crate) struct TranscriptScreen {
    pub view: TranscriptView,
    pub list: ListState,
    pub cursor: usize,
    pub editing_filter: bool,
    /// Visible index the last frame scrolled to on behalf of a deep link.
    pub applied_scroll: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettingsRow {
    Theme,
    Density,
    Sidebar,
    MembershipKey,
}

impl SettingsRow {
    pub(crate) const ALL: [SettingsRow; 4] = [
        SettingsRow::Theme,
        SettingsRow::Density,
        SettingsRow::Sidebar,
        SettingsRow::MembershipKey,
    ];
}

#[derive(Debug, Default)]
pub(crate) struct SettingsScreen {
    pub cursor: usize,
    pub key_input: String,
    pub editing: bool,
    pub verify: RequestTracker,
    pub error: Option<String>,
}

impl SettingsScreen {
    pub(crate) fn row(&self) -> SettingsRow {
        SettingsRow::ALL[self.cursor.min(SettingsRow::ALL.len() - 1)]
    }
}

pub(crate) enum Screen {
    Home(HomeScreen),
    Search(SearchScreen),
    Graph(GraphScreen),
    StreamGraph(StreamGraphScreen),
    Transcript(TranscriptScreen),
    Settings(SettingsScreen),
    Maintenance,
}

impl Screen {
    pub(crate) fn destination(&self) -> Option<Destination> {
        match self {
            Screen::Home(_) => Some(Destination::Home),
            Screen::Search(_) => Some(Destination::Search),
            Screen::Graph(_) => Some(Destination::Graph),
            Screen::Settings(_) => Some(Destination::Settings),
            Screen::StreamGraph(_) | Screen::Transcript(_) | Screen::Maintenance => None,
        }
    }

    fn is_editing(&self) -> bool {
        match self {
            Screen::Search(screen) => screen.focus == Focus::Form,
            Screen::Graph(screen) => screen.focus == Focus::Form,
            Screen::StreamGraph(screen) => screen.focus == Focus::Form,
            Screen::Transcript(screen) => screen.editing_filter,
            Screen::Settings(screen) => screen.editing,
            Screen::Home(_) | Screen::Maintenance => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineChoice {
    Jump,
    CopyExternal,
    CopyInternal,
    OpenExternal,
    Cancel,
}

impl LineChoice {
    const FROM_SEARCH: &'static [LineChoice] = &[
        LineChoice::Jump,
        LineChoice::CopyExternal,
        LineChoice::OpenExternal,
        LineChoice::Cancel,
    ];
    const FROM_TRANSCRIPT: &'static [LineChoice] = &[
        LineChoice::CopyExternal,
        LineChoice::CopyInternal,
        LineChoice::OpenExternal,
        LineChoice::Cancel,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            LineChoice::Jump => "Jump to line in transcript",
            LineChoice::CopyExternal => "Copy external link",
            LineChoice::CopyInternal => "Copy transcript link",
            LineChoice::OpenExternal => "Open external link",
            LineChoice::Cancel => "Cancel",
        }
    }
}

pub(crate) enum Dialog {
    LineAction {
        action: LineAction,
        choices: &'static [LineChoice],
        selected: usize,
    },
    ConfirmExternal {
        url: String,
    },
}

/// All state of the interactive browser. Network work is queued as [`Job`]s
/// and answered through [`Browser::apply`], so the state machine runs the same
/// with a real worker or in tests.
pub(crate) struct Browser<'a, 'ctx> {
    pub ctx: &'a mut UiContext<'ctx>,
    clipboard: Box<dyn Clipboard + 'a>,
    opener: Box<dyn Opener + 'a>,
    pub screen: Screen,
    pub dialog: Option<Dialog>,
    pub prompt: Option<String>,
    status: Option<(String, Instant)>,
    colorfgbg: Option<String>,
    pub frame: usize,
    jobs: Vec<Job>,
    quit: bool,
}

impl<'a, 'ctx> Browser<'a, 'ctx> {
    pub(crate) fn new(
        ctx: &'a mut UiContext<'ctx>,
        clipboard: Box<dyn Clipboard + 'a>,
        opener: Box<dyn Opener + 'a>,
    ) -> Self {
        Self {
            ctx,
            clipboard,
            opener,
            screen: Screen::Home(HomeScreen::default()),
            dialog: None,
            prompt: None,
            status: None,
            colorfgbg: std::env::var("COLORFGBG").ok(),
            frame: 0,
            jobs: Vec::new(),
            quit: false,
        }
    }

    pub(crate) fn palette(&self) -> palette::Palette {
        palette::Palette::for_theme(self.ctx.store.settings().theme, self.colorfgbg.as_deref())
    }

    pub(crate) fn should_quit(&self) -> bool {
        self.quit
    }

    pub(crate) fn take_jobs(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    pub(crate) fn status_message(&self) -> Option<&str> {
        self.status.as_ref().map(|(text, _)| text.as_str())
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now() + STATUS_DURATION));
    }

    /// Advance timers: the status overlay and any deep-link highlight.
    pub(crate) fn tick(&mut self, now: Instant) {
        self.frame = self.frame.wrapping_add(1);
        if let Some((_, until)) = &self.status
            && now >= *until
        {
            self.status = None;
        }
        if let Screen::Transcript(screen) = &mut self.screen {
            screen.view.tick(now);
        }
    }

    /// Second phase of a deep link: the frame that scrolled to the target has
    /// been drawn, so the highlight window can start.
    pub(crate) fn frame_rendered(&mut self, now: Instant) {
        if let Screen::Transcript(screen) = &mut self.screen
            && let Some(scroll) = screen.view.pending_scroll()
            && screen.applied_scroll == Some(scroll.index)
        {
            screen.view.scroll_settled(now);
            screen.applied_scroll = None;
        }
    }

    /// Switch to `route`. A deep link into the transcript already on screen
    /// re-runs only the locate, scroll and highlight sequence.
    pub(crate) fn navigate(&mut self, route: Route) {
        self.dialog = None;
        if self.ctx.config.maintenance.enabled {
            self.screen = Screen::Maintenance;
            return;
        }
        if let (Screen::Transcript(screen), Route::Transcript { id, at }) =
            (&mut self.screen, &route)
            && screen.view.id() == id
        {
            screen.view.navigate(at.as_deref());
            screen.applied_scroll = None;
            return;
        }

        info!(route = %route, "navigating");
        self.leave_screen();
        self.screen = match route {
            Route::Home => Screen::Home(HomeScreen::default()),
            Route::Search => Screen::Search(SearchScreen::new()),
            Route::Graph => Screen::Graph(GraphScreen {
                view: GraphView::default(),
                form: FilterForm::new(Field::FULL),
                focus: Focus::Form,
            }),
            Route::StreamGraph { id } => {
                let mut view = StreamGraphView::new(id);
                if let Some(request) = view.mount() {
                    self.jobs.push(Job::StreamMetadata(request));
                }
                let mut focus = Focus::Form;
                if !self.ctx.store.query.search_text.trim().is_empty()
                    && let Some(request) = view.begin(&self.ctx.store.query)
                {
                    self.jobs.push(Job::StreamGraph(request));
                    focus = Focus::Results;
                }
                Screen::StreamGraph(StreamGraphScreen {
                    view,
                    form: FilterForm::new(Field::STREAM),
                    focus,
                })
            }
            Route::Transcript { id, at } => {
                let mut view = TranscriptView::new(id);
                if let Some(request) = view.mount() {
                    self.jobs.push(Job::Transcript(request));
                }
                view.navigate(at.as_deref());
                Screen::Transcript(TranscriptScreen {
                    view,
                    list: ListState::default(),
                    cursor: 0,
                    editing_filter: false,
                    applied_scroll: None,
                })
            }
        };
    }

    fn open_settings(&mut self) {
        self.dialog = None;
        if self.ctx.config.maintenance.enabled {
            self.screen = Screen::Maintenance;
            return;
        }
        self.leave_screen();
        self.screen = Screen::Settings(SettingsScreen::default());
    }

    fn go(&mut self, destination: Destination) {
        match destination {
            Destination::Home => self.navigate(Route::Home),
            Destination::Search => self.navigate(Route::Search),
            Destination::Graph => self.navigate(Route::Graph),
            Destination::Settings => self.open_settings(),
        }
    }

    fn leave_screen(&mut self) {
        match &mut self.screen {
            Screen::Search(screen) => screen.view.abandon(),
            Screen::Graph(screen) => screen.view.abandon(),
            Screen::StreamGraph(screen) => screen.view.abandon(),
            Screen::Transcript(screen) => screen.view.abandon(),
            Screen::Settings(screen) => screen.verify.abandon(),
            Screen::Home(_) | Screen::Maintenance => {}
        }
    }

    /// Route a finished request to the screen that asked for it.
    pub(crate) fn apply(&mut self, done: Completed) {
        match (done, &mut self.screen) {
            (Completed::Search { ticket, outcome }, Screen::Search(screen)) => {
                if screen.view.complete(ticket, outcome) {
                    screen.selected = 0;
                    screen.list = ListState::default();
                }
            }
            (Completed::Graph { ticket, outcome }, Screen::Graph(screen)) => {
                screen.view.complete(ticket, outcome);
            }
            (Completed::StreamMetadata { id, ticket, outcome }, Screen::StreamGraph(screen))
                if screen.view.id() == id =>
            {
                screen.view.complete_metadata(ticket, outcome);
            }
            (Completed::StreamGraph { id, ticket, outcome }, Screen::StreamGraph(screen))
                if screen.view.id() == id =>
            {
                screen.view.complete(ticket, outcome);
            }
            (Completed::Transcript { id, ticket, outcome }, Screen::Transcript(screen))
                if screen.view.id() == id =>
            {
                if screen.view.complete(ticket, outcome) {
                    screen.cursor = 0;
                    screen.list = ListState::default();
                }
            }
            (
                Completed::VerifyMembership {
                    ticket,
                    key,
                    outcome,
                },
                Screen::Settings(screen),
            ) => {
                if !screen.verify.accept(ticket) {
                    return;
                }
                match outcome {
                    Ok(info) => {
                        let message = finish_verification(self.ctx, &key, info);
                        screen.key_input.clear();
                        screen.editing = false;
                        screen.error = None;
                        self.status = Some((message, Instant::now() + STATUS_DURATION));
                    }
                    Err(err) => screen.error = Some(verification_message(&err)),
                }
            }
            (done, _) => debug!(?done, "dropping response for a screen that is gone"),
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }
        if self.dialog.is_some() {
            self.handle_dialog_key(key);
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }
        if matches!(self.screen, Screen::Maintenance) {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.quit = true;
            }
            return;
        }
        if !self.screen.is_editing() && self.handle_global_key(key) {
            return;
        }

        match self.screen {
            Screen::Home(_) => self.handle_home_key(key),
            Screen::Search(_) => self.handle_search_key(key),
            Screen::Graph(_) => self.handle_graph_key(key),
            Screen::StreamGraph(_) => self.handle_stream_graph_key(key),
            Screen::Transcript(_) => self.handle_transcript_key(key),
            Screen::Settings(_) => self.handle_settings_key(key),
            Screen::Maintenance => {}
        }
    }

    fn handle_global_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char(':') => self.prompt = Some(String::new()),
            KeyCode::Char('b') => {
                let open = !self.ctx.store.settings().sidebar_open;
                if let Err(err) = self.ctx.store.set_sidebar_open(open) {
                    warn!(error = %err, "failed to save sidebar state");
                    self.set_status(err.to_string());
                }
            }
            KeyCode::Char(ch) if Destination::from_digit(ch).is_some() => {
                if let Some(destination) = Destination::from_digit(ch) {
                    self.go(destination);
                }
            }
            _ => return false,
        }
        true
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Backspace => {
                prompt.pop();
            }
            KeyCode::Char(ch) => prompt.push(ch),
            KeyCode::Enter => {
                let raw = std::mem::take(prompt);
                self.prompt = None;
                match Route::parse(&raw) {
                    Ok(route) => self.navigate(route),
                    Err(err) => self.set_status(err.to_string()),
                }
            }
            _ => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        match dialog {
            Dialog::ConfirmExternal { url } => match key.code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    let url = std::mem::take(url);
                    self.dialog = None;
                    self.open_external(&url);
                }
                KeyCode::Esc | KeyCode::Char('n') => self.dialog = None,
                _ => {}
            },
            Dialog::LineAction {
                choices, selected, ..
            } => match key.code {
                KeyCode::Esc => self.dialog = None,
                KeyCode::Up | KeyCode::Char('k') => *selected = selected.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    *selected = (*selected + 1).min(choices.len() - 1);
                }
                KeyCode::Enter => {
                    let choice = choices[(*selected).min(choices.len() - 1)];
                    self.run_line_choice(choice);
                }
                _ => {}
            },
        }
    }

    fn run_line_choice(&mut self, choice: LineChoice) {
        let Some(Dialog::LineAction { action, .. }) = self.dialog.take() else {
            return;
        };
        match choice {
            LineChoice::Jump => self.navigate(action.jump_route()),
            LineChoice::CopyExternal => self.copy(&action.links.external),
            LineChoice::CopyInternal => self.copy(&action.links.internal),
            LineChoice::OpenExternal => {
                self.dialog = Some(Dialog::ConfirmExternal {
                    url: action.links.external,
                });
            }
            LineChoice::Cancel => {}
        }
    }

    fn copy(&mut self, text: &str) {
        match self.clipboard.set(text) {
            Ok(()) => self.set_status(format!("Copied {text}")),
            Err(err) => {
                warn!(error = %err, "copy failed");
                self.set_status(format!("Could not copy link: {err}"));
            }
        }
    }

    fn open_external(&mut self, url: &str) {
        match self.opener.open(url) {
            Ok(()) => self.set_status(format!("Opened {url}")),
            Err(err) => {
                warn!(url, error = %err, "open failed");
                self.set_status(format!("Could not open link: {err}"));
            }
        }
    }

    fn confirm_external(&mut self, url: String) {
        self.dialog = Some(Dialog::ConfirmExternal { url });
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        let Screen::Home(home) = &mut self.screen else {
            return;
        };
        let last = Destination::ALL.len() - 1;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => home.selected = home.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => home.selected = (home.selected + 1).min(last),
            KeyCode::Enter => {
                let destination = Destination::ALL[home.selected.min(last)];
                self.go(destination);
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let Screen::Search(screen) = &mut self.screen else {
            return;
        };
        if screen.focus == Focus::Form {
            match screen
                .form
                .handle_key(key, &mut self.ctx.store.query, &self.ctx.config.filters)
            {
                FormOutcome::Submit => self.submit_search(),
                FormOutcome::Leave => screen.focus = Focus::Results,
                FormOutcome::Handled | FormOutcome::Ignored => {}
            }
            return;
        }

        let rows = screen.rows();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => screen.selected = screen.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                screen.selected = (screen.selected + 1).min(rows.len().saturating_sub(1));
            }
            KeyCode::PageUp => screen.selected = screen.selected.saturating_sub(PAGE),
            KeyCode::PageDown => {
                screen.selected = (screen.selected + PAGE).min(rows.len().saturating_sub(1));
            }
            KeyCode::Tab | KeyCode::Char('/' | 'e') => screen.focus = Focus::Form,
            KeyCode::Char('r') => self.submit_search(),
            KeyCode::Enter => match screen.selected_row() {
                Some(Row::Result(idx)) => {
                    if let Some(id) = screen.view.results().get(idx).map(|r| r.id.clone()) {
                        screen.view.toggle_expanded(&id);
                    }
                }
                Some(Row::Context(idx, ctx_idx)) => {
                    let action = screen.view.results().get(idx).and_then(|result| {
                        result.contexts.get(ctx_idx).map(|context| {
                            LineAction::new(
                                &self.ctx.links,
                                &result.id,
                                &result.stream_type,
                                &context.start_time,
                                &context.line,
                            )
                        })
                    });
                    if let Some(action) = action {
                        self.dialog = Some(Dialog::LineAction {
                            action,
                            choices: LineChoice::FROM_SEARCH,
                            selected: 0,
                        });
                    }
                }
                None => {}
            },
            KeyCode::Char('o' | 't' | 'G') => {
                let selected = match screen.selected_row() {
                    Some(Row::Result(idx) | Row::Context(idx, _)) => {
                        screen.view.results().get(idx).cloned()
                    }
                    None => None,
                };
                let Some(result) = selected else {
                    return;
                };
                match key.code {
                    KeyCode::Char('o') => {
                        let url = self.ctx.links.stream_url(&result.id, &result.stream_type);
                        self.confirm_external(url);
                    }
                    KeyCode::Char('t') => self.navigate(Route::Transcript {
                        id: result.id,
                        at: None,
                    }),
                    _ => self.navigate(Route::StreamGraph { id: result.id }),
                }
            }
            _ => {}
        }
    }

    fn submit_search(&mut self) {
        if let Err(message) = form::validate_dates(&self.ctx.store.query) {
            self.set_status(message);
            return;
        }
        let Screen::Search(screen) = &mut self.screen else {
            return;
        };
        match screen.view.begin(&self.ctx.store.query) {
            Some(request) => {
                self.jobs.push(Job::Search(request));
                screen.focus = Focus::Results;
            }
            None => self.set_status("A search is already running"),
        }
    }

    fn handle_graph_key(&mut self, key: KeyEvent) {
        let Screen::Graph(screen) = &mut self.screen else {
            return;
        };
        if screen.focus == Focus::Form {
            match screen
                .form
                .handle_key(key, &mut self.ctx.store.query, &self.ctx.config.filters)
            {
                FormOutcome::Submit => self.submit_graph(),
                FormOutcome::Leave => screen.focus = Focus::Results,
                FormOutcome::Handled | FormOutcome::Ignored => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('c') => screen.view.toggle_cumulative(),
            KeyCode::Tab | KeyCode::Char('/' | 'e') => screen.focus = Focus::Form,
            KeyCode::Char('r') | KeyCode::Enter => self.submit_graph(),
            _ => {}
        }
    }

    fn submit_graph(&mut self) {
        if let Err(message) = form::validate_dates(&self.ctx.store.query) {
            self.set_status(message);
            return;
        }
        let Screen::Graph(screen) = &mut self.screen else {
            return;
        };
        match screen.view.begin(&self.ctx.store.query) {
            Ok(Some(request)) => {
                self.jobs.push(Job::Graph(request));
                screen.focus = Focus::Results;
            }
            Ok(None) => self.set_status("A graph request is already running"),
            Err(err) => debug!(error = %err, "graph rejected before request"),
        }
    }

    fn handle_stream_graph_key(&mut self, key: KeyEvent) {
        let Screen::StreamGraph(screen) = &mut self.screen else {
            return;
        };
        if screen.focus == Focus::Form {
            match screen
                .form
                .handle_key(key, &mut self.ctx.store.query, &self.ctx.config.filters)
            {
                FormOutcome::Submit => self.submit_stream_graph(),
                FormOutcome::Leave => screen.focus = Focus::Results,
                FormOutcome::Handled | FormOutcome::Ignored => {}
            }
            return;
        }
        match key.code {
            KeyCode::Tab | KeyCode::Char('/' | 'e') => screen.focus = Focus::Form,
            KeyCode::Char('r') | KeyCode::Enter => self.submit_stream_graph(),
            KeyCode::Char('t') => {
                let id = screen.view.id().to_string();
                self.navigate(Route::Transcript { id, at: None });
            }
            _ => {}
        }
    }

    fn submit_stream_graph(&mut self) {
        let Screen::StreamGraph(screen) = &mut self.screen else {
            return;
        };
        if let Some(request) = screen.view.begin(&self.ctx.store.query) {
            self.jobs.push(Job::StreamGraph(request));
            screen.focus = Focus::Results;
        } else if screen.view.is_loading() {
            self.set_status("A graph request is already running");
        }
    }

    fn handle_transcript_key(&mut self, key: KeyEvent) {
        let Screen::Transcript(screen) = &mut self.screen else {
            return;
        };
        if screen.editing_filter {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => screen.editing_filter = false,
                KeyCode::Backspace => {
                    let mut filter = screen.view.filter().to_string();
                    filter.pop();
                    screen.view.set_filter(filter);
                    screen.cursor = 0;
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    let filter = format!("{}{ch}", screen.view.filter());
                    screen.view.set_filter(filter);
                    screen.cursor = 0;
                }
                _ => {}
            }
            return;
        }

        let last = screen.view.visible_len().saturating_sub(1);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => screen.cursor = screen.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => screen.cursor = (screen.cursor + 1).min(last),
            KeyCode::PageUp => screen.cursor = screen.cursor.saturating_sub(PAGE),
            KeyCode::PageDown => screen.cursor = (screen.cursor + PAGE).min(last),
            KeyCode::Home => screen.cursor = 0,
            KeyCode::End => screen.cursor = last,
            KeyCode::Char('/') => screen.editing_filter = true,
            KeyCode::Esc => {
                if !screen.view.filter().is_empty() {
                    screen.view.set_filter(String::new());
                    screen.cursor = 0;
                }
            }
            KeyCode::Enter => {
                let action = screen.view.transcript().and_then(|transcript| {
                    screen.view.visible_line(screen.cursor).map(|line| {
                        LineAction::new(
                            &self.ctx.links,
                            &transcript.id,
                            &transcript.stream_type,
                            &line.start,
                            &line.text,
                        )
                    })
                });
                if let Some(action) = action {
                    self.dialog = Some(Dialog::LineAction {
                        action,
                        choices: LineChoice::FROM_TRANSCRIPT,
                        selected: 0,
                    });
                }
            }
            KeyCode::Char('o') => {
                if let Some(transcript) = screen.view.transcript() {
                    let url = self
                        .ctx
                        .links
                        .stream_url(&transcript.id, &transcript.stream_type);
                    self.confirm_external(url);
                }
            }
            KeyCode::Char('G') => {
                let id = screen.view.id().to_string();
                self.navigate(Route::StreamGraph { id });
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let Screen::Settings(screen) = &mut self.screen else {
            return;
        };
        if screen.editing {
            match key.code {
                KeyCode::Esc => screen.editing = false,
                KeyCode::Backspace => {
                    screen.key_input.pop();
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    screen.key_input.push(ch);
                }
                KeyCode::Enter => self.submit_membership_key(),
                _ => {}
            }
            return;
        }

        let last = SettingsRow::ALL.len() - 1;
        let saved = match (key.code, screen.row()) {
            (KeyCode::Up | KeyCode::Char('k'), _) => {
                screen.cursor = screen.cursor.saturating_sub(1);
                Ok(())
            }
            (KeyCode::Down | KeyCode::Char('j'), _) => {
                screen.cursor = (screen.cursor + 1).min(last);
                Ok(())
            }
            (KeyCode::Left | KeyCode::Right | KeyCode::Char(' '), SettingsRow::Theme) => {
                let next = cycle(Theme::ALL, self.ctx.store.settings().theme, key.code);
                self.ctx.store.set_theme(next)
            }
            (KeyCode::Left | KeyCode::Right | KeyCode::Char(' '), SettingsRow::Density) => {
                let next = cycle(Density::ALL, self.ctx.store.settings().density, key.code);
                self.ctx.store.set_density(next)
            }
            (KeyCode::Left | KeyCode::Right | KeyCode::Char(' '), SettingsRow::Sidebar) => {
                let open = !self.ctx.store.settings().sidebar_open;
                self.ctx.store.set_sidebar_open(open)
            }
            (KeyCode::Enter, SettingsRow::MembershipKey) => {
                screen.editing = true;
                screen.error = None;
                Ok(())
            }
            (KeyCode::Delete | KeyCode::Char('d'), SettingsRow::MembershipKey) => {
                let result = self.ctx.store.clear_membership();
                if result.is_ok() {
                    self.ctx.client.set_membership_key(None);
                    screen.key_input.clear();
                    screen.verify.abandon();
                    self.status = Some((
                        "Membership key deleted.".to_string(),
                        Instant::now() + STATUS_DURATION,
                    ));
                }
                result
            }
            _ => Ok(()),
        };
        if let Err(err) = saved {
            warn!(error = %err, "failed to save settings");
            self.set_status(format!("Could not save settings: {err}"));
        }
    }

    fn submit_membership_key(&mut self) {
        let Screen::Settings(screen) = &mut self.screen else {
            return;
        };
        if screen.verify.is_loading() {
            return;
        }
        let key = screen.key_input.trim().to_string();
        if key.is_empty() {
            screen.error = Some("Membership key cannot be empty".to_string());
            return;
        }
        screen.error = None;
        let ticket: Ticket = screen.verify.issue();
        self.jobs.push(Job::VerifyMembership { ticket, key });
    }
}

/// Store a verified key and point the client at it.
fn finish_verification(ctx: &mut UiContext<'_>, key: &str, info: MembershipInfo) -> String {
    let channel = info.channel.clone();
    if let Err(err) = ctx.store.accept_membership(key, info) {
        warn!(error = %err, "failed to save membership key");
        return format!("Verified, but the key could not be saved: {err}");
    }
    ctx.client.set_membership_key(Some(key));
    info!(channel = %channel, "membership key verified");
    format!("Membership verified for {channel}")
}

fn verification_message(err: &ApiError) -> String {
    match err {
        ApiError::InvalidMembershipKey | ApiError::VerificationFailed { .. } => err.to_string(),
        other => format!("Verification failed: {other}"),
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, code: KeyCode) -> T {
    let len = all.len();
    let idx = all.iter().position(|value| *value == current).unwrap_or(0);
    let next = if code == KeyCode::Left {
        (idx + len - 1) % len
    } else {
        (idx + 1) % len
    };
    all[next]
}

#[cfg(test)]
mod tests;
