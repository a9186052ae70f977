use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, MembershipInfo, Transport, UreqTransport};
use crate::cli::{
    Cli, ConfigCommand, FilterArgs, GraphCommand, LinkCommand, MembershipCommand,
    SearchCommand, SettingKey, SettingsCommand, StreamGraphCommand, TranscriptCommand,
};
use crate::config::model::{Config, DEFAULT_MAINTENANCE_TITLE, DiagnosticLevel};
use crate::config::{ConfigSourceKind, LoadedConfig};
use crate::highlight::{HighlightMode, Highlighter};
use crate::links::{self, LinkBuilder, MEMBERS_NOTICE};
use crate::route::Route;
use crate::store::{Density, QueryState, Store, StoreError, Theme};
use crate::timefmt::{self, Timestamp};
use crate::tui;
use crate::views::graph::GraphView;
use crate::views::search::{self, LIMITED_NOTICE, SearchView};
use crate::views::stream_graph::StreamGraphView;
use crate::views::transcript::TranscriptView;

const BAR_WIDTH: u64 = 40;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected input; nothing was sent to the server.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Maintenance(String),
}

pub struct App<'cli> {
    pub cli: &'cli Cli,
    pub loaded: LoadedConfig,
    pub store: Store,
    client: ApiClient,
    links: LinkBuilder,
    styled: bool,
}

/// Everything the interactive browser borrows from the app.
pub struct UiContext<'app> {
    pub config: &'app Config,
    pub store: &'app mut Store,
    pub client: ApiClient,
    pub links: LinkBuilder,
}

impl<'cli> App<'cli> {
    /// Load configuration and persisted settings and build the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or decoded.
    pub fn bootstrap(cli: &'cli Cli) -> Result<Self> {
        let loaded = crate::config::load(cli.config_dir.as_deref())?;
        for diag in &loaded.diagnostics {
            debug!(level = ?diag.level, message = %diag.message, "config diagnostic");
        }
        let store = Store::load(loaded.settings_path());
        let transport = Arc::new(UreqTransport::new(
            loaded.config.api.user_agent.as_deref(),
        ));
        Ok(Self::with_transport(cli, loaded, store, transport))
    }

    /// Assemble an app around an explicit transport.
    #[must_use]
    pub fn with_transport(
        cli: &'cli Cli,
        mut loaded: LoadedConfig,
        store: Store,
        transport: Arc<dyn Transport>,
    ) -> Self {
        if let Some(server) = &cli.server {
            info!(server = %server, "using API server override");
            loaded.config.api.base_url.clone_from(server);
        }
        let client = ApiClient::new(loaded.config.api.base_url.clone(), transport);
        client.set_membership_key(store.membership_key());
        let links = LinkBuilder::new(
            &loaded.config.links.twitch_base,
            &loaded.config.links.youtube_base,
        );
        Self {
            cli,
            loaded,
            store,
            client,
            links,
            styled: io::stdout().is_terminal(),
        }
    }

    fn config(&self) -> &Config {
        &self.loaded.config
    }

    fn wants_json(&self, flag: bool) -> bool {
        flag || self.cli.json
    }

    fn ensure_online(&self) -> Result<()> {
        if self.config().maintenance.enabled {
            return Err(AppError::Maintenance(maintenance_message(self.config())).into());
        }
        Ok(())
    }

    fn highlighter(&self, term: &str) -> Highlighter {
        Highlighter::new(term, self.config().highlight.mode)
    }

    /// Run a transcript search and print one block per stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or output cannot be written.
    pub fn search(&self, cmd: &SearchCommand, out: &mut dyn Write) -> Result<()> {
        self.ensure_online()?;
        let query = query_state(cmd.term.as_deref(), &cmd.filters);
        let mut view = SearchView::default();
        let request = view
            .begin(&query)
            .ok_or_else(|| eyre!("a search is already running"))?;
        let output = self
            .client
            .search_transcripts(&request.params)
            .wrap_err("search failed")?;
        view.complete(request.ticket, Ok(output));

        let limit = self.config().api.context_limit;
        if self.wants_json(cmd.json) {
            let payload: Vec<_> = view
                .results()
                .iter()
                .map(|result| {
                    json!({
                        "id": result.id,
                        "streamer": result.streamer,
                        "date": result.date,
                        "streamType": result.stream_type,
                        "title": result.title,
                        "contexts": result.contexts,
                        "limited": search::is_limited(result, limit),
                        "route": Route::Transcript { id: result.id.clone(), at: None }.to_string(),
                    })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            return Ok(());
        }

        if let Some(notice) = view.notice() {
            writeln!(out, "{notice}")?;
        }
        let highlighter = self.highlighter(view.submitted_term());
        for result in view.results() {
            let [date, streamer, stream_type, title, found] = search::header_fields(result);
            writeln!(out)?;
            writeln!(
                out,
                "{date} | {streamer} | {stream_type} | {title} | {found}"
            )?;
            writeln!(
                out,
                "  {}",
                Route::Transcript {
                    id: result.id.clone(),
                    at: None
                }
            )?;
            if links::is_members(&result.stream_type) {
                writeln!(out, "  {MEMBERS_NOTICE}")?;
            }
            if search::is_limited(result, limit) {
                writeln!(out, "  {LIMITED_NOTICE}")?;
            }
            if cmd.expand {
                for context in &result.contexts {
                    writeln!(
                        out,
                        "  [{}] {}",
                        context.start_time,
                        self.emphasize(&highlighter, &context.line)
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Print per-day hit counts for a term.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for blank search text, or an error when
    /// the request fails.
    pub fn graph(&self, cmd: &GraphCommand, out: &mut dyn Write) -> Result<()> {
        let query = query_state(Some(&cmd.term), &cmd.filters);
        let mut view = GraphView::default();
        view.set_cumulative(cmd.cumulative);
        let request = match view.begin(&query) {
            Ok(Some(request)) => request,
            Ok(None) => return Err(eyre!("a graph request is already running")),
            Err(err) => return Err(AppError::Validation(err.to_string()).into()),
        };
        self.ensure_online()?;
        let output = self
            .client
            .get_graph(&request.params)
            .wrap_err("graph request failed")?;
        view.complete(request.ticket, Ok(output));

        let series = view.series();
        if self.wants_json(cmd.json) {
            let stats = view.data().and_then(|data| data.stats);
            let payload = json!({
                "cumulative": view.is_cumulative(),
                "label": view.series_label(),
                "points": series
                    .iter()
                    .map(|(date, count)| json!({ "date": date.to_string(), "count": count }))
                    .collect::<Vec<_>>(),
                "stats": stats.map(|stats| json!({
                    "total": stats.total,
                    "max": (!view.is_cumulative()).then_some(stats.max),
                })),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            return Ok(());
        }

        if let Some(notice) = view.notice() {
            writeln!(out, "{notice}")?;
            return Ok(());
        }
        writeln!(out, "{}", view.series_label())?;
        let peak = series.iter().map(|(_, count)| *count).max().unwrap_or(0);
        for (date, count) in &series {
            writeln!(out, "{date}  {count:>7}  {}", bar(*count, peak))?;
        }
        writeln!(out)?;
        for (label, value) in view.stat_rows() {
            writeln!(out, "{label}: {value}")?;
        }
        Ok(())
    }

    /// Print running hit totals through one stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the graph request fails. A metadata failure is
    /// reported but does not stop the graph.
    pub fn stream_graph(&self, cmd: &StreamGraphCommand, out: &mut dyn Write) -> Result<()> {
        if cmd.id.trim().is_empty() {
            return Err(AppError::Validation("Stream ID is required".to_string()).into());
        }
        self.ensure_online()?;
        let mut view = StreamGraphView::new(cmd.id.clone());
        if let Some(request) = view.mount() {
            let outcome = self.client.get_stream_metadata(&request.id);
            view.complete_metadata(request.ticket, outcome);
        }
        if let Some(err) = view.metadata_error() {
            warn!(id = %cmd.id, "{}", err.message);
            eprintln!("{}", err.message);
        }

        let query = QueryState {
            search_text: cmd.term.clone().unwrap_or_default(),
            match_whole_word: cmd.whole_word,
            ..QueryState::default()
        };
        let request = view
            .begin(&query)
            .ok_or_else(|| eyre!("a graph request is already running"))?;
        let output = self
            .client
            .get_graph_by_id(&request.id, &request.params)
            .wrap_err_with(|| format!("graph request for stream {} failed", cmd.id))?;
        view.complete(request.ticket, Ok(output));

        let series = view.series();
        if self.wants_json(cmd.json) {
            let payload = json!({
                "id": view.id(),
                "title": view.title(),
                "metadata": view.metadata(),
                "points": series
                    .iter()
                    .map(|(seconds, total)| json!({
                        "time": timefmt::seconds_to_time(*seconds),
                        "seconds": seconds,
                        "cumulative": total,
                    }))
                    .collect::<Vec<_>>(),
                "total": view.stats().map(|stats| stats.total),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            return Ok(());
        }

        writeln!(out, "{}", view.title())?;
        if let Some(meta) = view.metadata() {
            writeln!(
                out,
                "Streamer: {} - Date: {} - Type: {}",
                meta.streamer,
                timefmt::display_date(&meta.date).unwrap_or_else(|| meta.date.clone()),
                meta.stream_type
            )?;
            if links::is_members(&meta.stream_type) {
                writeln!(out, "{MEMBERS_NOTICE}")?;
            }
        }
        if let Some(notice) = view.notice() {
            writeln!(out, "{notice}")?;
            return Ok(());
        }
        let peak = series.last().map_or(0, |(_, total)| *total);
        for (seconds, total) in &series {
            writeln!(
                out,
                "{}  {total:>7}  {}",
                timefmt::seconds_to_time(*seconds),
                bar(*total, peak)
            )?;
        }
        if let Some(stats) = view.stats() {
            writeln!(out)?;
            writeln!(out, "Total Hits: {}", stats.total)?;
        }
        Ok(())
    }

    /// Print a transcript, optionally filtered or starting at a deep-link target.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a malformed `--at` or a non-transcript
    /// `--link`, or an error when the request fails.
    pub fn transcript(&self, cmd: &TranscriptCommand, out: &mut dyn Write) -> Result<()> {
        let at = match (&cmd.at, &cmd.link) {
            (Some(at), _) => {
                if Timestamp::parse(at).is_none() {
                    return Err(AppError::Validation(format!(
                        "invalid time '{at}': expected hh:mm:ss"
                    ))
                    .into());
                }
                Some(at.clone())
            }
            (None, Some(link)) => match Route::parse(link) {
                Ok(Route::Transcript { at, .. }) => at,
                _ => {
                    return Err(AppError::Validation(format!(
                        "'{link}' is not a transcript link such as /transcript/ID#T01-02-03"
                    ))
                    .into());
                }
            },
            (None, None) => None,
        };

        let mut view = TranscriptView::new(cmd.id.clone());
        let Some(request) = view.mount() else {
            return Err(AppError::Validation("Transcript ID is required".to_string()).into());
        };
        self.ensure_online()?;
        let output = self
            .client
            .get_transcript(&request.id)
            .wrap_err_with(|| format!("failed to fetch transcript {}", cmd.id))?;
        view.complete(request.ticket, Ok(output));
        if let Some(filter) = &cmd.filter {
            view.set_filter(filter.clone());
        }
        view.navigate(at.as_deref());
        let start = view.pending_scroll().map_or(0, |scroll| scroll.index);

        let Some(transcript) = view.transcript() else {
            return Err(eyre!("transcript {} was not loaded", cmd.id));
        };
        if self.wants_json(cmd.json) {
            let lines: Vec<_> = view.visible_lines().skip(start).collect();
            let payload = json!({
                "id": transcript.id,
                "streamer": transcript.streamer,
                "date": transcript.date,
                "streamType": transcript.stream_type,
                "streamTitle": transcript.stream_title,
                "transcriptLines": lines,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            return Ok(());
        }

        if let Some((title, meta)) = view.header() {
            writeln!(out, "{title}")?;
            writeln!(out, "{meta}")?;
        }
        if links::is_members(&transcript.stream_type) {
            writeln!(out, "{MEMBERS_NOTICE}")?;
        }
        writeln!(out, "{}", "-".repeat(48))?;
        let highlighter = Highlighter::new(view.filter(), HighlightMode::Literal);
        for line in view.visible_lines().skip(start) {
            writeln!(
                out,
                "[{}] {}",
                line.start,
                self.emphasize(&highlighter, &line.text)
            )?;
        }
        Ok(())
    }

    /// Print the links for one transcript line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when the timestamp is not `hh:mm:ss`.
    pub fn link(&self, cmd: &LinkCommand, out: &mut dyn Write) -> Result<()> {
        if Timestamp::parse(&cmd.timestamp).is_none() {
            return Err(AppError::Validation(format!(
                "invalid time '{}': expected hh:mm:ss",
                cmd.timestamp
            ))
            .into());
        }
        let line = self
            .links
            .line_links(&cmd.id, &cmd.stream_type, &cmd.timestamp);
        let stream = self.links.stream_url(&cmd.id, &cmd.stream_type);
        if self.cli.json {
            let payload = json!({
                "external": line.external,
                "internal": line.internal,
                "stream": stream,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
        } else {
            writeln!(out, "external: {}", line.external)?;
            writeln!(out, "internal: {}", line.internal)?;
            writeln!(out, "stream:   {stream}")?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error when verification fails or settings cannot be saved.
    pub fn membership(&mut self, cmd: &MembershipCommand, out: &mut dyn Write) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        match cmd {
            MembershipCommand::Verify(verify) => {
                let key = verify.key.trim();
                if key.is_empty() {
                    return Err(
                        AppError::Validation("Membership key cannot be empty".to_string()).into(),
                    );
                }
                self.ensure_online()?;
                let info = self
                    .client
                    .verify_membership_key(key)
                    .wrap_err("membership verification failed")?;
                self.store
                    .accept_membership(key, info.clone())
                    .wrap_err("failed to save membership key")?;
                self.client.set_membership_key(Some(key));
                info!(channel = %info.channel, "membership key verified");
                self.print_membership(&info, now, out)
            }
            MembershipCommand::Status => {
                let Some(key) = self.store.membership_key().map(str::to_string) else {
                    writeln!(out, "No membership key stored.")?;
                    return Ok(());
                };
                self.ensure_online()?;
                let info = self
                    .client
                    .verify_membership_key(&key)
                    .wrap_err("stored membership key could not be verified")?;
                self.store.set_membership_info(Some(info.clone()));
                self.print_membership(&info, now, out)
            }
            MembershipCommand::Clear => {
                self.store
                    .clear_membership()
                    .wrap_err("failed to clear membership key")?;
                self.client.set_membership_key(None);
                writeln!(out, "Membership key deleted.")?;
                Ok(())
            }
        }
    }

    fn print_membership(
        &self,
        info: &MembershipInfo,
        now: OffsetDateTime,
        out: &mut dyn Write,
    ) -> Result<()> {
        if self.cli.json {
            let payload = json!({
                "channel": info.channel,
                "expiresAt": info.expires_at,
                "expired": info.is_expired(now),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            return Ok(());
        }
        writeln!(out, "Channel: {}", info.channel)?;
        writeln!(out, "{}", membership_expiry_line(info, now))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for unknown values, or an error when
    /// settings cannot be saved.
    pub fn settings(&mut self, cmd: &SettingsCommand, out: &mut dyn Write) -> Result<()> {
        match cmd {
            SettingsCommand::Show => {
                let settings = self.store.settings();
                let has_key = self.store.membership_key().is_some();
                if self.cli.json {
                    let payload = json!({
                        "theme": settings.theme,
                        "density": settings.density,
                        "sidebarOpen": settings.sidebar_open,
                        "membershipKey": has_key,
                    });
                    writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
                    return Ok(());
                }
                if let Some(path) = self.store.path() {
                    writeln!(out, "Settings file: {}", path.display())?;
                }
                writeln!(out, "theme: {}", settings.theme)?;
                writeln!(out, "density: {}", settings.density)?;
                writeln!(
                    out,
                    "sidebar: {}",
                    if settings.sidebar_open { "open" } else { "closed" }
                )?;
                writeln!(
                    out,
                    "membership key: {}",
                    if has_key { "stored" } else { "not set" }
                )?;
                Ok(())
            }
            SettingsCommand::Set(set) => {
                let saved = match set.key {
                    SettingKey::Theme => {
                        let theme = set.value.parse::<Theme>().map_err(invalid_setting)?;
                        self.store.set_theme(theme)
                    }
                    SettingKey::Density => {
                        let density = set.value.parse::<Density>().map_err(invalid_setting)?;
                        self.store.set_density(density)
                    }
                    SettingKey::Sidebar => {
                        let open = parse_sidebar(&set.value)?;
                        self.store.set_sidebar_open(open)
                    }
                };
                saved.wrap_err("failed to save settings")?;
                writeln!(out, "Saved.")?;
                Ok(())
            }
        }
    }

    /// Execute one of the configuration subcommands.
    ///
    /// # Errors
    ///
    /// Returns an error if dumping or linting fails.
    pub fn config_command(&self, cmd: &ConfigCommand, out: &mut dyn Write) -> Result<()> {
        match cmd {
            ConfigCommand::Dump => {
                writeln!(out, "{}", toml::to_string_pretty(&self.loaded.merged)?)?;
                Ok(())
            }
            ConfigCommand::Where => self.config_where(out),
            ConfigCommand::Lint => self.config_lint(out),
            ConfigCommand::Schema => {
                let schema = Config::json_schema();
                writeln!(out, "{}", serde_json::to_string_pretty(&schema)?)?;
                Ok(())
            }
        }
    }

    fn config_where(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(
            out,
            "Configuration directory: {}",
            self.loaded.directories.config_dir.display()
        )?;
        writeln!(
            out,
            "Data directory: {}",
            self.loaded.directories.data_dir.display()
        )?;
        writeln!(
            out,
            "Settings file: {}",
            self.loaded.settings_path().display()
        )?;
        writeln!(out, "API server: {}", self.client.base_url())?;
        writeln!(out, "Sources (in load order):")?;
        for source in &self.loaded.sources {
            let kind = match source.kind {
                ConfigSourceKind::Main => "main",
                ConfigSourceKind::DropIn => "drop-in",
            };
            writeln!(out, "  - {} ({kind})", source.path.display())?;
        }
        Ok(())
    }

    fn config_lint(&self, out: &mut dyn Write) -> Result<()> {
        if self.loaded.diagnostics.is_empty() {
            writeln!(out, "Configuration looks good.")?;
            return Ok(());
        }

        let mut has_error = false;
        for diag in &self.loaded.diagnostics {
            match diag.level {
                DiagnosticLevel::Warning => writeln!(out, "warning: {}", diag.message)?,
                DiagnosticLevel::Error => {
                    writeln!(out, "error: {}", diag.message)?;
                    has_error = true;
                }
            }
        }

        if has_error {
            Err(eyre!("configuration contains errors"))
        } else {
            Ok(())
        }
    }

    /// Launch the interactive browser on `route`.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be set up or restored.
    pub fn run_ui(&mut self, route: Route) -> Result<()> {
        let mut ctx = UiContext {
            config: &self.loaded.config,
            store: &mut self.store,
            client: self.client.clone(),
            links: self.links.clone(),
        };
        tui::run(&mut ctx, route)
    }

    fn emphasize(&self, highlighter: &Highlighter, text: &str) -> String {
        if !self.styled {
            return text.to_string();
        }
        highlighter
            .split(text)
            .into_iter()
            .map(|segment| {
                if segment.matched {
                    format!("\x1b[1;4m{}\x1b[0m", segment.text)
                } else {
                    segment.text.to_string()
                }
            })
            .collect()
    }
}

/// `Expires: …` or `Expired: …`, evaluated against `now`.
#[must_use]
pub fn membership_expiry_line(info: &MembershipInfo, now: OffsetDateTime) -> String {
    let label = if info.is_expired(now) {
        "Expired"
    } else {
        "Expires"
    };
    format!(
        "{label}: {}",
        timefmt::format_expiration(&info.expires_at, now)
    )
}

#[must_use]
pub fn maintenance_message(config: &Config) -> String {
    config
        .maintenance
        .message
        .clone()
        .unwrap_or_else(|| DEFAULT_MAINTENANCE_TITLE.to_string())
}

fn query_state(term: Option<&str>, filters: &FilterArgs) -> QueryState {
    QueryState {
        search_text: term.unwrap_or_default().to_string(),
        stream_title: filters.title.clone().unwrap_or_default(),
        streamer: filters.streamer.clone().unwrap_or_default(),
        from_date: filters.from.clone().unwrap_or_default(),
        to_date: filters.to.clone().unwrap_or_default(),
        stream_type: filters.stream_types.clone(),
        match_whole_word: filters.whole_word,
    }
}

fn invalid_setting(err: StoreError) -> color_eyre::Report {
    AppError::Validation(err.to_string()).into()
}

fn parse_sidebar(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" | "on" | "true" | "yes" => Ok(true),
        "closed" | "off" | "false" | "no" => Ok(false),
        other => Err(AppError::Validation(format!(
            "invalid sidebar `{other}` (expected one of: open, closed)"
        ))
        .into()),
    }
}

fn bar(value: u64, peak: u64) -> String {
    if peak == 0 {
        return String::new();
    }
    let width = value.saturating_mul(BAR_WIDTH) / peak;
    let width = usize::try_from(width).unwrap_or(0).max(usize::from(value > 0));
    "█".repeat(width)
}
