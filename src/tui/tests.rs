use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;

use super::*;
use crate::api::ApiClient;
use crate::clipboard::MemoryClipboard;
use crate::config::Config;
use crate::links::LinkBuilder;
use crate::opener::RecordingOpener;
use crate::store::{Settings, Store};
use crate::test_support::StubTransport;
use crate::views::transcript::NOT_FOUND_HEADING;
use crate::worker;

const SEARCH_BODY: &str = r#"{"result":[{"id":"V1","streamer":"Streamer","date":"2024-01-05","streamType":"Video","title":"Cozy \u001b[2Jstream","contexts":[{"startTime":"00:00:01","line":"hello cat"},{"startTime":"01:02:03","line":"the cat"}]}]}"#;

const TRANSCRIPT_BODY: &str = r#"{"streamer":"Streamer","date":"2024-01-05","streamType":"Video","streamTitle":"Cozy","id":"V1","transcriptLines":[{"id":1,"start":"00:00:01","text":"hello chat"},{"id":2,"start":"01:02:03","text":"the cat"},{"id":3,"start":"01:02:04","text":"bye"}]}"#;

const GRAPH_BODY: &str = r#"{"result":[{"x":"2024-01-01","y":2},{"x":"2024-01-02","y":5},{"x":"2024-01-03","y":1}]}"#;

const STREAM_GRAPH_BODY: &str = r#"{"result":[{"x":"00:01:00","y":1},{"x":"00:05:00","y":2}]}"#;

const MEMBERSHIP_BODY: &str = r#"{"channel":"Dokibird","expiresAt":"2099-01-01T00:00:00Z"}"#;

struct Fixture {
    transport: Arc<StubTransport>,
    config: Config,
    store: Store,
}

impl Fixture {
    fn new(transport: StubTransport) -> Self {
        let mut config = Config::default();
        config.filters.stream_types = vec!["Video".to_string(), "Twitch".to_string()];
        Self {
            transport: Arc::new(transport),
            config,
            store: Store::in_memory(Settings::default()),
        }
    }

    fn context(&mut self) -> UiContext<'_> {
        UiContext {
            config: &self.config,
            store: &mut self.store,
            client: ApiClient::new("http://api.test", self.transport.clone()),
            links: LinkBuilder::new("https://twitch.test", "https://yt.test"),
        }
    }
}

fn press(browser: &mut Browser<'_, '_>, code: KeyCode) {
    browser.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

fn type_text(browser: &mut Browser<'_, '_>, text: &str) {
    for ch in text.chars() {
        press(browser, KeyCode::Char(ch));
    }
}

/// Run queued jobs on this thread until nothing new is queued.
fn pump(browser: &mut Browser<'_, '_>) {
    loop {
        let jobs = browser.take_jobs();
        if jobs.is_empty() {
            return;
        }
        for job in jobs {
            let done = worker::execute(&browser.ctx.client, job);
            browser.apply(done);
        }
    }
}

fn render_to_string(browser: &mut Browser<'_, '_>, width: u16, height: u16) -> Result<String> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|frame| draw::draw(frame, browser))?;
    let buffer = terminal.backend_mut().buffer().clone();
    Ok(buffer_to_string(&buffer))
}

fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area();
    let mut lines = Vec::new();
    for y in 0..area.height {
        let mut line = String::new();
        for x in 0..area.width {
            let symbol = buffer
                .cell((x, y))
                .map_or(" ", ratatui::buffer::Cell::symbol);
            if symbol.is_empty() {
                line.push(' ');
            } else {
                line.push_str(symbol);
            }
        }
        while line.ends_with(' ') {
            line.pop();
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn search_screen<'s>(browser: &'s Browser<'_, '_>) -> &'s SearchScreen {
    match &browser.screen {
        Screen::Search(screen) => screen,
        _ => panic!("expected the search screen"),
    }
}

fn transcript_screen<'s>(browser: &'s Browser<'_, '_>) -> &'s TranscriptScreen {
    match &browser.screen {
        Screen::Transcript(screen) => screen,
        _ => panic!("expected the transcript screen"),
    }
}

fn run_search(browser: &mut Browser<'_, '_>, term: &str) {
    browser.navigate(Route::Search);
    type_text(browser, term);
    press(browser, KeyCode::Enter);
    pump(browser);
}

#[test]
fn search_submits_form_and_lists_results() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new().route("/transcripts", 200, SEARCH_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    run_search(&mut browser, "cat");
    let screen = search_screen(&browser);
    assert_eq!(screen.focus, Focus::Results);
    assert_eq!(screen.view.results().len(), 1);
    assert_eq!(screen.rows(), vec![Row::Result(0)]);

    press(&mut browser, KeyCode::Enter);
    assert_eq!(
        search_screen(&browser).rows(),
        vec![Row::Result(0), Row::Context(0, 0), Row::Context(0, 1)]
    );

    let screen = render_to_string(&mut browser, 110, 30)?;
    assert!(screen.contains("Found 1 streams"));
    assert!(screen.contains("Jan 5, 2024"));
    assert!(screen.contains("[01:02:03] the cat"));
    assert!(screen.contains("Cozy stream"));
    assert!(!screen.contains('\u{1b}'));
    drop(browser);
    drop(ctx);

    let seen = fixture.transport.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("/transcripts?"));
    assert!(seen[0].contains("searchText=cat"));
    Ok(())
}

#[test]
fn line_dialog_copies_external_link() {
    let mut fixture = Fixture::new(StubTransport::new().route("/transcripts", 200, SEARCH_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    run_search(&mut browser, "cat");
    press(&mut browser, KeyCode::Enter);
    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Enter);
    assert!(matches!(browser.dialog, Some(Dialog::LineAction { .. })));

    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Enter);
    assert!(browser.dialog.is_none());
    assert_eq!(
        browser.status_message(),
        Some("Copied https://yt.test/watch?v=V1&t=1s")
    );
    drop(browser);
    drop(ctx);

    assert_eq!(clipboard.contents, vec!["https://yt.test/watch?v=V1&t=1s"]);
    assert!(opener.opened.is_empty());
}

/// Move to the second line and pick "open external link" from its dialog.
fn open_from_dialog(browser: &mut Browser<'_, '_>) {
    press(browser, KeyCode::Down);
    press(browser, KeyCode::Enter);
    press(browser, KeyCode::Down);
    press(browser, KeyCode::Down);
    press(browser, KeyCode::Enter);
}

#[test]
fn opening_a_link_waits_for_confirmation() {
    let mut fixture =
        Fixture::new(StubTransport::new().route("/transcript/V1", 200, TRANSCRIPT_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Transcript {
        id: "V1".to_string(),
        at: None,
    });
    pump(&mut browser);

    open_from_dialog(&mut browser);
    match &browser.dialog {
        Some(Dialog::ConfirmExternal { url }) => {
            assert_eq!(url, "https://yt.test/watch?v=V1&t=3723s");
        }
        _ => panic!("expected a confirmation dialog"),
    }
    press(&mut browser, KeyCode::Char('n'));
    assert!(browser.dialog.is_none());

    press(&mut browser, KeyCode::Up);
    open_from_dialog(&mut browser);
    press(&mut browser, KeyCode::Char('y'));
    drop(browser);
    drop(ctx);

    assert_eq!(opener.opened, vec!["https://yt.test/watch?v=V1&t=3723s"]);
    assert!(clipboard.contents.is_empty());
}

#[test]
fn stream_url_from_results_is_confirmed_too() {
    let mut fixture = Fixture::new(StubTransport::new().route("/transcripts", 200, SEARCH_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    run_search(&mut browser, "cat");
    press(&mut browser, KeyCode::Char('o'));
    press(&mut browser, KeyCode::Enter);
    drop(browser);
    drop(ctx);

    assert_eq!(opener.opened, vec!["https://yt.test/watch?v=V1"]);
}

#[test]
fn jump_scrolls_then_highlights_the_line() -> Result<()> {
    let mut fixture = Fixture::new(
        StubTransport::new()
            .route("/transcripts", 200, SEARCH_BODY)
            .route("/transcript/V1", 200, TRANSCRIPT_BODY),
    );
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    run_search(&mut browser, "cat");
    press(&mut browser, KeyCode::Enter);
    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Enter);
    press(&mut browser, KeyCode::Enter);
    assert_eq!(transcript_screen(&browser).view.id(), "V1");

    pump(&mut browser);
    let screen = transcript_screen(&browser);
    assert_eq!(screen.view.pending_scroll().map(|scroll| scroll.index), Some(1));
    assert_eq!(screen.view.highlighted(), None);

    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("[01:02:03] the cat"));
    assert_eq!(transcript_screen(&browser).applied_scroll, Some(1));
    assert_eq!(transcript_screen(&browser).cursor, 1);

    let now = Instant::now();
    browser.frame_rendered(now);
    assert_eq!(transcript_screen(&browser).view.highlighted(), Some(1));
    assert!(transcript_screen(&browser).view.pending_scroll().is_none());

    browser.tick(now + Duration::from_secs(3));
    assert_eq!(transcript_screen(&browser).view.highlighted(), None);
    Ok(())
}

#[test]
fn deep_link_into_open_transcript_does_not_refetch() {
    let mut fixture =
        Fixture::new(StubTransport::new().route("/transcript/V1", 200, TRANSCRIPT_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Transcript {
        id: "V1".to_string(),
        at: Some("00:00:01".to_string()),
    });
    pump(&mut browser);
    assert_eq!(
        transcript_screen(&browser)
            .view
            .pending_scroll()
            .map(|scroll| scroll.index),
        Some(0)
    );

    browser.navigate(Route::Transcript {
        id: "V1".to_string(),
        at: Some("01:02:04".to_string()),
    });
    assert!(browser.take_jobs().is_empty());
    assert_eq!(
        transcript_screen(&browser)
            .view
            .pending_scroll()
            .map(|scroll| scroll.index),
        Some(2)
    );
    drop(browser);
    drop(ctx);
    assert_eq!(fixture.transport.seen().len(), 1);
}

#[test]
fn transcript_filter_narrows_lines_and_escape_clears_it() {
    let mut fixture =
        Fixture::new(StubTransport::new().route("/transcript/V1", 200, TRANSCRIPT_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Transcript {
        id: "V1".to_string(),
        at: None,
    });
    pump(&mut browser);

    press(&mut browser, KeyCode::Char('/'));
    type_text(&mut browser, "CHAT");
    assert_eq!(transcript_screen(&browser).view.visible_len(), 1);
    press(&mut browser, KeyCode::Char('q'));
    assert!(!browser.should_quit());
    press(&mut browser, KeyCode::Backspace);
    press(&mut browser, KeyCode::Enter);
    assert_eq!(transcript_screen(&browser).view.filter(), "CHAT");

    press(&mut browser, KeyCode::Esc);
    assert_eq!(transcript_screen(&browser).view.visible_len(), 3);
}

fn long_transcript_body(lines: u64) -> String {
    let lines = (0..lines)
        .map(|n| {
            format!(
                r#"{{"id":{n},"start":"{}","text":"line {n}"}}"#,
                crate::timefmt::seconds_to_time(n)
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"{{"streamer":"Streamer","date":"2024-01-05","streamType":"Video","streamTitle":"Long","id":"V9","transcriptLines":[{lines}]}}"#
    )
}

#[test]
fn long_transcripts_render_only_the_visible_window() -> Result<()> {
    let body = long_transcript_body(300);
    let mut fixture = Fixture::new(StubTransport::new().route("/transcript/V9", 200, &body));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Transcript {
        id: "V9".to_string(),
        at: Some("00:04:00".to_string()),
    });
    pump(&mut browser);

    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("[00:04:00] line 240"));
    assert!(!rendered.contains("[00:00:00] line 0"));
    assert!(!rendered.contains("line 299"));
    assert_eq!(transcript_screen(&browser).list.offset(), 240);
    browser.frame_rendered(Instant::now());

    press(&mut browser, KeyCode::Home);
    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("[00:00:00] line 0"));
    assert!(!rendered.contains("line 240"));

    press(&mut browser, KeyCode::End);
    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("[00:04:59] line 299"));
    assert!(!rendered.contains("[00:00:00] line 0"));
    Ok(())
}

#[test]
fn window_offset_follows_the_cursor() {
    assert_eq!(draw::window_offset(0, 0, 10, 100), 0);
    assert_eq!(draw::window_offset(0, 9, 10, 100), 0);
    assert_eq!(draw::window_offset(0, 10, 10, 100), 1);
    assert_eq!(draw::window_offset(50, 20, 10, 100), 20);
    assert_eq!(draw::window_offset(50, 55, 10, 100), 50);
    assert_eq!(draw::window_offset(500, 0, 10, 3), 0);
    assert_eq!(draw::window_offset(0, 0, 10, 0), 0);
}

#[test]
fn missing_transcript_shows_not_found_heading() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Transcript {
        id: "missing".to_string(),
        at: None,
    });
    pump(&mut browser);
    let rendered = render_to_string(&mut browser, 80, 20)?;
    assert!(rendered.contains(NOT_FOUND_HEADING));
    assert!(rendered.contains("Not found"));
    Ok(())
}

#[test]
fn responses_for_other_screens_are_dropped() {
    let mut fixture = Fixture::new(
        StubTransport::new()
            .route("/transcripts", 200, SEARCH_BODY)
            .route("/transcript/V1", 200, TRANSCRIPT_BODY),
    );
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Search);
    type_text(&mut browser, "cat");
    press(&mut browser, KeyCode::Enter);
    let stale = browser.take_jobs();
    assert_eq!(stale.len(), 1);

    browser.navigate(Route::Home);
    browser.navigate(Route::Search);
    press(&mut browser, KeyCode::Enter);
    let fresh = browser.take_jobs();

    for job in stale {
        let done = worker::execute(&browser.ctx.client, job);
        browser.apply(done);
    }
    assert!(search_screen(&browser).view.is_loading());
    assert!(search_screen(&browser).view.results().is_empty());

    for job in fresh {
        let done = worker::execute(&browser.ctx.client, job);
        browser.apply(done);
    }
    assert_eq!(search_screen(&browser).view.results().len(), 1);

    browser.navigate(Route::Transcript {
        id: "V2".to_string(),
        at: None,
    });
    let other = Completed::Transcript {
        id: "V1".to_string(),
        ticket: RequestTracker::default().issue(),
        outcome: browser.ctx.client.get_transcript("V1"),
    };
    browser.apply(other);
    assert!(transcript_screen(&browser).view.transcript().is_none());
}

#[test]
fn graph_rejects_blank_term_before_any_request() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new().route("/graph", 200, GRAPH_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Graph);
    type_text(&mut browser, "   ");
    press(&mut browser, KeyCode::Enter);
    assert!(browser.take_jobs().is_empty());

    let rendered = render_to_string(&mut browser, 110, 30)?;
    assert!(rendered.contains("Search text cannot be empty"));
    drop(browser);
    drop(ctx);
    assert!(fixture.transport.seen().is_empty());
    Ok(())
}

#[test]
fn graph_toggles_cumulative_series() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new().route("/graph", 200, GRAPH_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Graph);
    type_text(&mut browser, "cat");
    press(&mut browser, KeyCode::Enter);
    pump(&mut browser);

    let rendered = render_to_string(&mut browser, 110, 30)?;
    assert!(rendered.contains("Total Hits: 8"));
    assert!(rendered.contains("Max Hits (in one day): 5"));

    press(&mut browser, KeyCode::Char('c'));
    let Screen::Graph(screen) = &browser.screen else {
        panic!("expected the graph screen");
    };
    assert_eq!(screen.view.series_label(), "Cumulative Count");
    let totals = screen
        .view
        .series()
        .into_iter()
        .map(|(_, count)| count)
        .collect::<Vec<_>>();
    assert_eq!(totals, vec![2, 7, 8]);

    let rendered = render_to_string(&mut browser, 110, 30)?;
    assert!(rendered.contains("Cumulative Count"));
    assert!(!rendered.contains("Max Hits"));
    Ok(())
}

#[test]
fn stream_graph_survives_metadata_failure() -> Result<()> {
    let mut fixture = Fixture::new(
        StubTransport::new()
            .route("/graph/V1", 200, STREAM_GRAPH_BODY)
            .route("/stream/V1", 500, r#"{"error":"database offline"}"#),
    );
    fixture.store.query.search_text = "cat".to_string();
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::StreamGraph {
        id: "V1".to_string(),
    });
    assert_eq!(browser.jobs.len(), 2);
    pump(&mut browser);

    let rendered = render_to_string(&mut browser, 110, 30)?;
    assert!(rendered.contains("Graph Transcript"));
    assert!(rendered.contains("Stream details unavailable"));
    assert!(rendered.contains("Total Hits: 3"));
    drop(browser);
    drop(ctx);

    let seen = fixture.transport.seen();
    let graph_url = seen
        .iter()
        .find(|url| url.contains("/graph/V1"))
        .expect("graph request");
    assert!(graph_url.contains("searchText=cat"));
    assert!(!graph_url.contains("streamer="));
    Ok(())
}

#[test]
fn membership_key_is_verified_then_deleted() -> Result<()> {
    let mut fixture =
        Fixture::new(StubTransport::new().route("/membership/verify", 200, MEMBERSHIP_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    press(&mut browser, KeyCode::Char('4'));
    for _ in 0..3 {
        press(&mut browser, KeyCode::Down);
    }
    press(&mut browser, KeyCode::Enter);
    type_text(&mut browser, " abc ");
    press(&mut browser, KeyCode::Enter);
    let jobs = browser.take_jobs();
    assert!(matches!(
        jobs.as_slice(),
        [Job::VerifyMembership { key, .. }] if key == "abc"
    ));
    for job in jobs {
        let done = worker::execute(&browser.ctx.client, job);
        browser.apply(done);
    }

    assert_eq!(browser.ctx.store.membership_key(), Some("abc"));
    assert_eq!(browser.ctx.client.membership_key().as_deref(), Some("abc"));
    assert_eq!(
        browser.status_message(),
        Some("Membership verified for Dokibird")
    );
    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("Channel: Dokibird"));
    assert!(rendered.contains("Expires:"));

    press(&mut browser, KeyCode::Char('d'));
    assert_eq!(browser.ctx.store.membership_key(), None);
    assert_eq!(browser.ctx.client.membership_key(), None);
    assert!(browser.ctx.store.membership_info().is_none());
    Ok(())
}

#[test]
fn rejected_key_leaves_store_untouched() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new().route(
        "/membership/verify",
        401,
        r#"{"error":"bad key"}"#,
    ));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    press(&mut browser, KeyCode::Char('4'));
    for _ in 0..3 {
        press(&mut browser, KeyCode::Down);
    }
    press(&mut browser, KeyCode::Enter);
    type_text(&mut browser, "nope");
    press(&mut browser, KeyCode::Enter);
    pump(&mut browser);

    assert_eq!(browser.ctx.store.membership_key(), None);
    let Screen::Settings(screen) = &browser.screen else {
        panic!("expected the settings screen");
    };
    assert_eq!(screen.error.as_deref(), Some("Invalid membership key"));
    assert!(screen.editing);
    let rendered = render_to_string(&mut browser, 100, 24)?;
    assert!(rendered.contains("Invalid membership key"));
    Ok(())
}

#[test]
fn empty_key_is_not_sent() {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.open_settings();
    if let Screen::Settings(screen) = &mut browser.screen {
        screen.cursor = 3;
    }
    press(&mut browser, KeyCode::Enter);
    type_text(&mut browser, "   ");
    press(&mut browser, KeyCode::Enter);
    assert!(browser.take_jobs().is_empty());
}

#[test]
fn settings_rows_cycle_and_persist_in_store() {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.open_settings();
    let theme = browser.ctx.store.settings().theme;
    press(&mut browser, KeyCode::Right);
    assert_ne!(browser.ctx.store.settings().theme, theme);
    press(&mut browser, KeyCode::Left);
    assert_eq!(browser.ctx.store.settings().theme, theme);

    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Right);
    assert_eq!(browser.ctx.store.settings().density, Density::Comfortable);

    press(&mut browser, KeyCode::Down);
    press(&mut browser, KeyCode::Char(' '));
    assert!(!browser.ctx.store.settings().sidebar_open);
}

#[test]
fn sidebar_toggle_hides_navigation() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    press(&mut browser, KeyCode::Char('2'));
    assert!(render_to_string(&mut browser, 100, 24)?.contains("1 Home"));

    press(&mut browser, KeyCode::Esc);
    press(&mut browser, KeyCode::Char('b'));
    assert!(!browser.ctx.store.settings().sidebar_open);
    assert!(!render_to_string(&mut browser, 100, 24)?.contains("1 Home"));
    Ok(())
}

#[test]
fn maintenance_blocks_every_screen() -> Result<()> {
    let mut fixture = Fixture::new(StubTransport::new().route("/transcripts", 200, SEARCH_BODY));
    fixture.config.maintenance.enabled = true;
    fixture.config.maintenance.message = Some("Back soon".to_string());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.navigate(Route::Search);
    assert!(matches!(browser.screen, Screen::Maintenance));
    press(&mut browser, KeyCode::Char('4'));
    assert!(matches!(browser.screen, Screen::Maintenance));
    assert!(browser.take_jobs().is_empty());
    assert!(render_to_string(&mut browser, 100, 24)?.contains("Back soon"));

    press(&mut browser, KeyCode::Char('q'));
    assert!(browser.should_quit());
    drop(browser);
    drop(ctx);
    assert!(fixture.transport.seen().is_empty());
    Ok(())
}

#[test]
fn route_prompt_navigates_or_reports() {
    let mut fixture =
        Fixture::new(StubTransport::new().route("/transcript/V1", 200, TRANSCRIPT_BODY));
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    press(&mut browser, KeyCode::Char(':'));
    type_text(&mut browser, "/nowhere");
    press(&mut browser, KeyCode::Enter);
    assert!(browser.prompt.is_none());
    assert!(matches!(browser.screen, Screen::Home(_)));
    assert!(
        browser
            .status_message()
            .is_some_and(|status| status.contains("unknown route"))
    );

    press(&mut browser, KeyCode::Char(':'));
    type_text(&mut browser, "/transcript/V1#T01-02-03");
    press(&mut browser, KeyCode::Enter);
    pump(&mut browser);
    assert_eq!(
        transcript_screen(&browser)
            .view
            .pending_scroll()
            .map(|scroll| scroll.index),
        Some(1)
    );
}

#[test]
fn ctrl_c_quits_even_from_a_dialog() {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.dialog = Some(Dialog::ConfirmExternal {
        url: "https://yt.test/watch?v=V1".to_string(),
    });
    browser.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(browser.should_quit());
    drop(browser);
    drop(ctx);
    assert!(opener.opened.is_empty());
}

#[test]
fn status_overlay_expires() {
    let mut fixture = Fixture::new(StubTransport::new());
    let mut ctx = fixture.context();
    let mut clipboard = MemoryClipboard::default();
    let mut opener = RecordingOpener::default();
    let mut browser = Browser::new(&mut ctx, Box::new(&mut clipboard), Box::new(&mut opener));

    browser.set_status("hello");
    browser.tick(Instant::now());
    assert_eq!(browser.status_message(), Some("hello"));
    browser.tick(Instant::now() + STATUS_DURATION + Duration::from_millis(10));
    assert_eq!(browser.status_message(), None);
}

#[test]
fn log_suppression_resets_on_drop() {
    {
        let _guard = LogSuppression::engage();
        assert!(TERMINAL_UI_ACTIVE.load(Ordering::Relaxed));
    }
    assert!(!TERMINAL_UI_ACTIVE.load(Ordering::Relaxed));
}
