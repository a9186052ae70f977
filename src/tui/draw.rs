use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, ListState, Paragraph,
    Wrap,
};
use time::OffsetDateTime;
use unicode_width::UnicodeWidthChar;

use super::form::{Field, FilterForm};
use super::palette::{Palette, stream_type_color};
use super::sanitize::sanitize_line;
use super::{
    Browser, Destination, Dialog, Focus, GraphScreen, HomeScreen, Row, Screen, SearchScreen,
    SettingsRow, SettingsScreen, StreamGraphScreen, TranscriptScreen,
};
use crate::app::{UiContext, maintenance_message, membership_expiry_line};
use crate::highlight::{HighlightMode, Highlighter};
use crate::links;
use crate::store::QueryState;
use crate::timefmt;
use crate::views::FetchError;
use crate::views::search::{self, LIMITED_NOTICE};

const SIDEBAR_WIDTH: u16 = 14;
const LABEL_WIDTH: usize = 12;
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub(crate) fn draw(frame: &mut Frame<'_>, browser: &mut Browser<'_, '_>) {
    let palette = browser.palette();
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let show_sidebar = browser.ctx.store.settings().sidebar_open
        && !matches!(browser.screen, Screen::Maintenance);
    let main = if show_sidebar {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(10)])
            .split(vertical[0]);
        draw_sidebar(frame, columns[0], browser.screen.destination(), &palette);
        columns[1]
    } else {
        vertical[0]
    };

    let spinner = SPINNER[browser.frame % SPINNER.len()];
    let ctx: &UiContext<'_> = &*browser.ctx;
    match &mut browser.screen {
        Screen::Home(home) => draw_home(frame, main, home, &palette),
        Screen::Search(screen) => draw_search(frame, main, screen, ctx, &palette, spinner),
        Screen::Graph(screen) => draw_graph(frame, main, screen, ctx, &palette, spinner),
        Screen::StreamGraph(screen) => {
            draw_stream_graph(frame, main, screen, ctx, &palette, spinner);
        }
        Screen::Transcript(screen) => draw_transcript(frame, main, screen, ctx, &palette, spinner),
        Screen::Settings(screen) => draw_settings(frame, main, screen, ctx, &palette),
        Screen::Maintenance => draw_maintenance(frame, main, ctx, &palette),
    }

    draw_footer(frame, vertical[1], browser, &palette);
    if let Some(dialog) = &browser.dialog {
        draw_dialog(frame, dialog, &palette);
    }
}

fn draw_sidebar(frame: &mut Frame<'_>, area: Rect, current: Option<Destination>, palette: &Palette) {
    let items = Destination::ALL
        .iter()
        .enumerate()
        .map(|(idx, destination)| {
            let style = if Some(*destination) == current {
                palette.selected
            } else {
                Style::default().fg(palette.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", idx + 1), Style::default().fg(palette.muted)),
                Span::styled(destination.label(), style),
            ]))
        })
        .collect::<Vec<_>>();
    let list = List::new(items).block(Block::default().borders(Borders::RIGHT));
    frame.render_widget(list, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, browser: &Browser<'_, '_>, palette: &Palette) {
    let line = if let Some(prompt) = &browser.prompt {
        Line::from(vec![
            Span::styled(":", Style::default().fg(palette.accent)),
            Span::raw(prompt.clone()),
            Span::styled("▏", Style::default().fg(palette.accent)),
        ])
    } else if let Some(status) = browser.status_message() {
        Line::from(Span::styled(
            format!(" {} ", sanitize_line(status)),
            Style::default().fg(palette.warning),
        ))
    } else {
        Line::from(Span::styled(
            format!(" {} ", footer_hint(&browser.screen)),
            Style::default().fg(palette.muted),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn footer_hint(screen: &Screen) -> &'static str {
    match screen {
        Screen::Home(_) => "enter open · 1-4 switch · : go to path · b sidebar · q quit",
        Screen::Search(screen) if screen.focus == Focus::Form => {
            "enter search · tab next field · ←/→ choose · space toggle · esc results"
        }
        Screen::Search(_) => {
            "enter expand/line · o open stream · t transcript · G graph · / edit · q quit"
        }
        Screen::Graph(screen) if screen.focus == Focus::Form => {
            "enter graph · tab next field · esc chart"
        }
        Screen::Graph(_) => "c cumulative · r refresh · / edit · q quit",
        Screen::StreamGraph(screen) if screen.focus == Focus::Form => {
            "enter graph · tab next field · esc chart"
        }
        Screen::StreamGraph(_) => "t transcript · r refresh · / edit · q quit",
        Screen::Transcript(screen) if screen.editing_filter => "type to filter · enter/esc done",
        Screen::Transcript(_) => {
            "enter line actions · / filter · o open stream · G graph · esc clear filter · q quit"
        }
        Screen::Settings(screen) if screen.editing => "enter verify · esc cancel",
        Screen::Settings(_) => "←/→ change · enter edit key · d delete key · q quit",
        Screen::Maintenance => "q quit",
    }
}

fn draw_home(frame: &mut Frame<'_>, area: Rect, home: &HomeScreen, palette: &Palette) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Archived Transcripts",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Search stream transcripts, graph mentions over time, and read full transcripts.",
            Style::default().fg(palette.muted),
        )),
        Line::default(),
    ];
    for (idx, destination) in Destination::ALL.iter().enumerate() {
        let style = if idx == home.selected {
            palette.selected
        } else {
            Style::default().fg(palette.text)
        };
        lines.push(Line::from(Span::styled(
            format!(" {} {} ", idx + 1, destination.label()),
            style,
        )));
    }
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Home"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn form_height(form: &FilterForm) -> u16 {
    u16::try_from(form.fields().len()).unwrap_or(u16::MAX).saturating_add(2)
}

fn draw_form(
    frame: &mut Frame<'_>,
    area: Rect,
    form: &FilterForm,
    active: bool,
    query: &QueryState,
    ctx: &UiContext<'_>,
    palette: &Palette,
) {
    let lines = form
        .fields()
        .iter()
        .map(|field| {
            let focused = active && form.focused() == *field;
            let label_style = if focused {
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.muted)
            };
            let mut spans = vec![Span::styled(
                format!("{:<LABEL_WIDTH$}", field.label()),
                label_style,
            )];
            spans.extend(field_value(*field, form, focused, query, ctx, palette));
            Line::from(spans)
        })
        .collect::<Vec<_>>();
    let border = if active { palette.accent } else { palette.muted };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title("Filters");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_value(
    field: Field,
    form: &FilterForm,
    focused: bool,
    query: &QueryState,
    ctx: &UiContext<'_>,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let cursor = || Span::styled("▏", Style::default().fg(palette.accent));
    let text = |value: &str, placeholder: &str| {
        let mut spans = if value.is_empty() && !focused {
            vec![Span::styled(
                placeholder.to_string(),
                Style::default().fg(palette.muted),
            )]
        } else {
            vec![Span::styled(value.to_string(), Style::default().fg(palette.text))]
        };
        if focused {
            spans.push(cursor());
        }
        spans
    };
    match field {
        Field::SearchText => text(query.search_text.as_str(), "type a word or phrase"),
        Field::StreamTitle => text(query.stream_title.as_str(), "any title"),
        Field::FromDate | Field::ToDate => {
            let value = if field == Field::FromDate {
                query.from_date.as_str()
            } else {
                query.to_date.as_str()
            };
            text(value, "YYYY-MM-DD")
        }
        Field::Streamer => {
            let shown = if query.streamer.is_empty() {
                "any"
            } else {
                query.streamer.as_str()
            };
            let shown = if focused {
                format!("◀ {shown} ▶")
            } else {
                shown.to_string()
            };
            vec![Span::styled(shown, Style::default().fg(palette.text))]
        }
        Field::StreamType => {
            let types = &ctx.config.filters.stream_types;
            if types.is_empty() {
                return vec![Span::styled("none configured", Style::default().fg(palette.muted))];
            }
            types
                .iter()
                .enumerate()
                .flat_map(|(idx, tag)| {
                    let checked = query.stream_type.iter().any(|t| t == tag);
                    let mut style = Style::default().fg(stream_type_color(tag));
                    if focused && idx == form.type_cursor() {
                        style = palette.selected;
                    }
                    [
                        Span::styled(
                            format!("[{}] {tag}", if checked { 'x' } else { ' ' }),
                            style,
                        ),
                        Span::raw(" "),
                    ]
                })
                .collect()
        }
        Field::WholeWord => {
            let style = if focused {
                palette.selected
            } else {
                Style::default().fg(palette.text)
            };
            let mark = if query.match_whole_word { 'x' } else { ' ' };
            vec![Span::styled(format!("[{mark}]"), style)]
        }
    }
}

fn error_line(err: &FetchError, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(
        sanitize_line(&err.message).into_owned(),
        Style::default().fg(palette.error),
    ))
}

fn loading_line(label: &str, spinner: &str, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(
        format!("{spinner} {label}"),
        Style::default().fg(palette.accent),
    ))
}

fn highlighted_spans(
    text: &str,
    highlighter: &Highlighter,
    base: Style,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let clean = sanitize_line(text);
    highlighter
        .split(&clean)
        .into_iter()
        .map(|segment| {
            let style = if segment.matched {
                base.patch(palette.matched)
            } else {
                base
            };
            Span::styled(segment.text.to_string(), style)
        })
        .collect()
}

fn draw_search(
    frame: &mut Frame<'_>,
    area: Rect,
    screen: &mut SearchScreen,
    ctx: &UiContext<'_>,
    palette: &Palette,
    spinner: &str,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(form_height(&screen.form)),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);
    draw_form(
        frame,
        layout[0],
        &screen.form,
        screen.focus == Focus::Form,
        &ctx.store.query,
        ctx,
        palette,
    );

    let status = if screen.view.is_loading() {
        loading_line("Searching...", spinner, palette)
    } else if let Some(err) = screen.view.error() {
        error_line(err, palette)
    } else if let Some(notice) = screen.view.notice() {
        Line::from(Span::styled(notice, Style::default().fg(palette.muted)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(status), layout[1]);

    let density = ctx.store.settings().density;
    let limit = ctx.config.api.context_limit;
    let highlighter = Highlighter::new(screen.view.submitted_term(), ctx.config.highlight.mode);
    let width = usize::from(layout[2].width.saturating_sub(4));
    let rows = screen.rows();
    let results = screen.view.results();
    let items = rows
        .iter()
        .filter_map(|row| match *row {
            Row::Result(idx) => {
                let result = results.get(idx)?;
                let [date, streamer, stream_type, title, found] = search::header_fields(result);
                let marker = if screen.view.is_expanded(&result.id) { "▾" } else { "▸" };
                let mut lines = vec![Line::from(vec![
                    Span::styled(format!("{marker} {date}  "), Style::default().fg(palette.muted)),
                    Span::styled(format!("{streamer}  "), Style::default().fg(palette.text)),
                    Span::styled(
                        format!("{stream_type}  "),
                        Style::default()
                            .fg(stream_type_color(&stream_type))
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        truncate(&sanitize_line(&title), width.saturating_sub(40).max(10)),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  {found}"), Style::default().fg(palette.accent)),
                ])];
                if density.shows_details() {
                    if links::is_members(&result.stream_type) {
                        lines.push(Line::from(Span::styled(
                            "    Members-only stream",
                            Style::default().fg(palette.warning),
                        )));
                    }
                    if search::is_limited(result, limit) {
                        lines.push(Line::from(Span::styled(
                            format!("    {LIMITED_NOTICE}"),
                            Style::default().fg(palette.warning),
                        )));
                    }
                }
                Some(spaced(lines, density.spacing()))
            }
            Row::Context(idx, ctx_idx) => {
                let context = results.get(idx)?.contexts.get(ctx_idx)?;
                let mut spans = vec![Span::styled(
                    format!("    [{}] ", context.start_time),
                    Style::default().fg(palette.muted),
                )];
                spans.extend(highlighted_spans(
                    &context.line,
                    &highlighter,
                    Style::default().fg(palette.text),
                    palette,
                ));
                Some(ListItem::new(Line::from(spans)))
            }
        })
        .collect::<Vec<_>>();

    if screen.focus == Focus::Results && !rows.is_empty() {
        screen.selected = screen.selected.min(rows.len() - 1);
        screen.list.select(Some(screen.selected));
    } else {
        screen.list.select(None);
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Results"))
        .highlight_style(palette.selected)
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, layout[2], &mut screen.list);
}

fn spaced(mut lines: Vec<Line<'static>>, spacing: u16) -> ListItem<'static> {
    lines.extend((0..spacing).map(|_| Line::default()));
    ListItem::new(lines)
}

fn draw_graph(
    frame: &mut Frame<'_>,
    area: Rect,
    screen: &mut GraphScreen,
    ctx: &UiContext<'_>,
    palette: &Palette,
    spinner: &str,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(form_height(&screen.form)),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);
    draw_form(
        frame,
        layout[0],
        &screen.form,
        screen.focus == Focus::Form,
        &ctx.store.query,
        ctx,
        palette,
    );

    let view = &screen.view;
    let status = if view.is_loading() {
        loading_line("Loading graph...", spinner, palette)
    } else if let Some(err) = view.error() {
        error_line(err, palette)
    } else if let Some(notice) = view.notice() {
        Line::from(Span::styled(notice, Style::default().fg(palette.muted)))
    } else {
        stats_line(&view.stat_rows(), palette)
    };
    frame.render_widget(Paragraph::new(status), layout[1]);

    let series = view.series();
    let points = series
        .iter()
        .map(|(date, count)| (f64::from(date.to_julian_day()), count_to_f64(*count)))
        .collect::<Vec<_>>();
    let x_labels = match (series.first(), series.last()) {
        (Some((first, _)), Some((last, _))) => vec![first.to_string(), last.to_string()],
        _ => Vec::new(),
    };
    let chart = line_chart(view.series_label(), &points, x_labels, palette);
    frame.render_widget(chart, layout[2]);
}

fn draw_stream_graph(
    frame: &mut Frame<'_>,
    area: Rect,
    screen: &mut StreamGraphScreen,
    ctx: &UiContext<'_>,
    palette: &Palette,
    spinner: &str,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(form_height(&screen.form)),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    let view = &screen.view;
    let detail = match (view.metadata(), view.metadata_error()) {
        (Some(meta), _) => {
            let date = timefmt::display_date(&meta.date).unwrap_or_else(|| meta.date.clone());
            Span::styled(
                sanitize_line(&format!("{date} - {} - {}", meta.stream_type, meta.streamer))
                    .into_owned(),
                Style::default().fg(palette.muted),
            )
        }
        (None, Some(_)) => Span::styled(
            "Stream details unavailable",
            Style::default().fg(palette.muted),
        ),
        (None, None) => Span::raw(""),
    };
    let header = vec![
        Line::from(Span::styled(
            sanitize_line(&view.title()).into_owned(),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(detail),
    ];
    frame.render_widget(Paragraph::new(header), layout[0]);

    draw_form(
        frame,
        layout[1],
        &screen.form,
        screen.focus == Focus::Form,
        &ctx.store.query,
        ctx,
        palette,
    );

    let status = if view.is_loading() {
        loading_line("Loading graph...", spinner, palette)
    } else if let Some(err) = view.graph_error() {
        error_line(err, palette)
    } else if let Some(notice) = view.notice() {
        Line::from(Span::styled(notice, Style::default().fg(palette.muted)))
    } else if let Some(stats) = view.stats() {
        stats_line(&[("Total Hits", stats.total)], palette)
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(status), layout[2]);

    let series = view.series();
    let points = series
        .iter()
        .map(|(secs, total)| (count_to_f64(*secs), count_to_f64(*total)))
        .collect::<Vec<_>>();
    let x_labels = match (series.first(), series.last()) {
        (Some((first, _)), Some((last, _))) => vec![
            timefmt::seconds_to_time(*first),
            timefmt::seconds_to_time(*last),
        ],
        _ => Vec::new(),
    };
    let chart = line_chart("Cumulative Count", &points, x_labels, palette);
    frame.render_widget(chart, layout[3]);
}

fn stats_line(rows: &[(&'static str, u64)], palette: &Palette) -> Line<'static> {
    let mut spans = Vec::new();
    for (label, value) in rows {
        spans.push(Span::styled(
            format!("{label}: "),
            Style::default().fg(palette.muted),
        ));
        spans.push(Span::styled(
            format!("{value}   "),
            Style::default()
                .fg(palette.text)
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

#[allow(clippy::cast_precision_loss)]
fn count_to_f64(value: u64) -> f64 {
    value as f64
}

fn line_chart<'a>(
    title: &'a str,
    points: &'a [(f64, f64)],
    x_labels: Vec<String>,
    palette: &Palette,
) -> Chart<'a> {
    let (x_min, x_max) = points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), (x, _)| {
        (lo.min(*x), hi.max(*x))
    });
    let (x_min, x_max) = if points.is_empty() {
        (0.0, 1.0)
    } else if x_max <= x_min {
        (x_min, x_min + 1.0)
    } else {
        (x_min, x_max)
    };
    let y_max = points.iter().map(|(_, y)| *y).fold(0.0_f64, f64::max).max(1.0);

    let dataset = Dataset::default()
        .name(title)
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(palette.accent))
        .data(points);
    Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .bounds([x_min, x_max])
                .labels(x_labels.into_iter().map(Span::raw).collect::<Vec<_>>())
                .style(Style::default().fg(palette.muted)),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max * 1.1])
                .labels(vec![Span::raw("0"), Span::raw(format!("{y_max:.0}"))])
                .style(Style::default().fg(palette.muted)),
        )
}

fn draw_transcript(
    frame: &mut Frame<'_>,
    area: Rect,
    screen: &mut TranscriptScreen,
    ctx: &UiContext<'_>,
    palette: &Palette,
    spinner: &str,
) {
    if screen.view.is_loading() {
        let paragraph = Paragraph::new(loading_line("Loading transcript...", spinner, palette))
            .block(Block::default().borders(Borders::ALL).title("Transcript"));
        frame.render_widget(paragraph, area);
        return;
    }
    if let (Some(heading), Some(err)) = (screen.view.error_heading(), screen.view.error()) {
        let lines = vec![
            Line::from(Span::styled(
                heading,
                Style::default()
                    .fg(palette.error)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            error_line(err, palette),
        ];
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Transcript"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    if let Some((title, detail)) = screen.view.header() {
        let stream_type = screen
            .view
            .transcript()
            .map(|transcript| transcript.stream_type.as_str())
            .unwrap_or_default();
        let header = vec![
            Line::from(Span::styled(
                sanitize_line(&title).into_owned(),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                sanitize_line(&detail).into_owned(),
                Style::default().fg(stream_type_color(stream_type)),
            )),
        ];
        frame.render_widget(Paragraph::new(header), layout[0]);
    }

    let filter = screen.view.filter();
    let filter_line = if screen.editing_filter || !filter.is_empty() {
        let mut spans = vec![
            Span::styled("Filter: ", Style::default().fg(palette.muted)),
            Span::styled(filter.to_string(), Style::default().fg(palette.text)),
        ];
        if screen.editing_filter {
            spans.push(Span::styled("▏", Style::default().fg(palette.accent)));
        }
        spans.push(Span::styled(
            format!("  ({} lines)", screen.view.visible_len()),
            Style::default().fg(palette.muted),
        ));
        Line::from(spans)
    } else {
        Line::from(Span::styled(
            "/ to filter lines",
            Style::default().fg(palette.muted),
        ))
    };
    frame.render_widget(Paragraph::new(filter_line), layout[1]);

    let len = screen.view.visible_len();
    if let Some(scroll) = screen.view.pending_scroll() {
        screen.cursor = scroll.index.min(len.saturating_sub(1));
        *screen.list.offset_mut() = screen.cursor;
        screen.applied_scroll = Some(scroll.index);
    }
    screen.cursor = screen.cursor.min(len.saturating_sub(1));

    // Only the rows that fit are turned into list items.
    let spacing = ctx.store.settings().density.spacing();
    let item_height = 1 + usize::from(spacing);
    let rows = (usize::from(layout[2].height.saturating_sub(2)) / item_height).max(1);
    let offset = window_offset(screen.list.offset(), screen.cursor, rows, len);
    *screen.list.offset_mut() = offset;
    screen.list.select((len > 0).then_some(screen.cursor));

    let highlighter = Highlighter::new(filter, HighlightMode::Literal);
    let flashed = screen.view.highlighted();
    let items = screen
        .view
        .visible_lines()
        .enumerate()
        .skip(offset)
        .take(rows)
        .map(|(idx, line)| {
            let base = if flashed == Some(idx) {
                palette.flash
            } else {
                Style::default().fg(palette.text)
            };
            let mut spans = vec![Span::styled(
                format!("[{}] ", line.start),
                Style::default().fg(palette.muted),
            )];
            spans.extend(highlighted_spans(&line.text, &highlighter, base, palette));
            spaced(vec![Line::from(spans)], spacing)
        })
        .collect::<Vec<_>>();

    let mut window =
        ListState::default().with_selected((len > 0).then(|| screen.cursor - offset));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Transcript"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, layout[2], &mut window);
}

/// First visible index of a `rows`-tall window over `len` items that keeps
/// `cursor` on screen, moving as little as possible from `offset`.
pub(super) fn window_offset(offset: usize, cursor: usize, rows: usize, len: usize) -> usize {
    let offset = offset.min(len.saturating_sub(1));
    if cursor < offset {
        cursor
    } else if cursor >= offset + rows {
        cursor + 1 - rows
    } else {
        offset
    }
}

fn draw_settings(
    frame: &mut Frame<'_>,
    area: Rect,
    screen: &SettingsScreen,
    ctx: &UiContext<'_>,
    palette: &Palette,
) {
    let settings = ctx.store.settings();
    let mut lines = Vec::new();
    for (idx, row) in SettingsRow::ALL.iter().enumerate() {
        let (label, value) = match row {
            SettingsRow::Theme => ("Theme", format!("◀ {} ▶", settings.theme)),
            SettingsRow::Density => ("Density", format!("◀ {} ▶", settings.density)),
            SettingsRow::Sidebar => (
                "Sidebar",
                if settings.sidebar_open { "open" } else { "closed" }.to_string(),
            ),
            SettingsRow::MembershipKey => {
                let value = if screen.editing {
                    format!("{}▏", "•".repeat(screen.key_input.chars().count()))
                } else if ctx.store.membership_key().is_some() {
                    "saved".to_string()
                } else {
                    "not set".to_string()
                };
                ("Membership key", value)
            }
        };
        let style = if idx == screen.cursor {
            palette.selected
        } else {
            Style::default().fg(palette.text)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{label:<16}"), Style::default().fg(palette.muted)),
            Span::styled(value, style),
        ]));
    }

    lines.push(Line::default());
    if screen.verify.is_loading() {
        lines.push(Line::from(Span::styled(
            "Verifying membership key...",
            Style::default().fg(palette.accent),
        )));
    }
    if let Some(error) = &screen.error {
        lines.push(Line::from(Span::styled(
            sanitize_line(error).into_owned(),
            Style::default().fg(palette.error),
        )));
    }
    match ctx.store.membership_info() {
        Some(info) => {
            let now = OffsetDateTime::now_utc();
            let color = if info.is_expired(now) {
                palette.error
            } else {
                palette.success
            };
            lines.push(Line::from(vec![
                Span::styled("Channel: ", Style::default().fg(palette.muted)),
                Span::styled(
                    sanitize_line(&info.channel).into_owned(),
                    Style::default().fg(palette.text),
                ),
            ]));
            lines.push(Line::from(Span::styled(
                membership_expiry_line(info, now),
                Style::default().fg(color),
            )));
        }
        None if ctx.store.membership_key().is_some() => {
            lines.push(Line::from(Span::styled(
                "Key saved. Verify it again to see its channel and expiry.",
                Style::default().fg(palette.muted),
            )));
        }
        None => {}
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Settings"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_maintenance(frame: &mut Frame<'_>, area: Rect, ctx: &UiContext<'_>, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.warning))
        .title("Maintenance");
    let paragraph = Paragraph::new(Line::from(Span::styled(
        maintenance_message(ctx.config),
        Style::default()
            .fg(palette.warning)
            .add_modifier(Modifier::BOLD),
    )))
    .block(block)
    .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, centered_rect(70, 30, area));
}

fn draw_dialog(frame: &mut Frame<'_>, dialog: &Dialog, palette: &Palette) {
    let area = centered_rect(70, 40, frame.area());
    let (title, lines) = match dialog {
        Dialog::LineAction {
            action,
            choices,
            selected,
        } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("[{}]", action.timestamp),
                    Style::default().fg(palette.muted),
                )),
                Line::from(Span::styled(
                    sanitize_line(&action.line).into_owned(),
                    Style::default().fg(palette.text),
                )),
                Line::default(),
            ];
            for (idx, choice) in choices.iter().enumerate() {
                let style = if idx == *selected {
                    palette.selected
                } else {
                    Style::default().fg(palette.text)
                };
                lines.push(Line::from(Span::styled(format!(" {} ", choice.label()), style)));
            }
            ("Line", lines)
        }
        Dialog::ConfirmExternal { url } => (
            "Open link",
            vec![
                Line::from("Open this link in your browser?"),
                Line::default(),
                Line::from(Span::styled(
                    sanitize_line(url).into_owned(),
                    Style::default().fg(palette.accent),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "y/enter open · n/esc cancel",
                    Style::default().fg(palette.muted),
                )),
            ],
        ),
    };
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent))
                .title(title),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Cut `input` to `max` display columns, ending in an ellipsis when shortened.
fn truncate(input: &str, max: usize) -> String {
    let total: usize = input.chars().map(|ch| ch.width().unwrap_or(0)).sum();
    if total <= max {
        return input.to_string();
    }
    let mut width = 0;
    let mut out = String::new();
    for ch in input.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width + 1 > max {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out.push('…');
    out
}
