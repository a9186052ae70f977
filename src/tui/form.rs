//! Filter form shared by the search and graph screens. Edits go straight into
//! the store's query state, so every screen sees the same filters.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::model::FilterConfig;
use crate::store::QueryState;
use crate::timefmt;

const DATE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    SearchText,
    StreamTitle,
    Streamer,
    FromDate,
    ToDate,
    StreamType,
    WholeWord,
}

impl Field {
    pub(crate) const FULL: &'static [Field] = &[
        Field::SearchText,
        Field::StreamTitle,
        Field::Streamer,
        Field::FromDate,
        Field::ToDate,
        Field::StreamType,
        Field::WholeWord,
    ];

    /// A single stream only honours the term and whole-word flag.
    pub(crate) const STREAM: &'static [Field] = &[Field::SearchText, Field::WholeWord];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Field::SearchText => "Search",
            Field::StreamTitle => "Title",
            Field::Streamer => "Streamer",
            Field::FromDate => "From",
            Field::ToDate => "To",
            Field::StreamType => "Type",
            Field::WholeWord => "Whole word",
        }
    }

    fn text_mut(self, query: &mut QueryState) -> Option<&mut String> {
        match self {
            Field::SearchText => Some(&mut query.search_text),
            Field::StreamTitle => Some(&mut query.stream_title),
            Field::Streamer => Some(&mut query.streamer),
            Field::FromDate => Some(&mut query.from_date),
            Field::ToDate => Some(&mut query.to_date),
            Field::StreamType | Field::WholeWord => None,
        }
    }

    fn is_date(self) -> bool {
        matches!(self, Field::FromDate | Field::ToDate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormOutcome {
    Submit,
    Leave,
    Handled,
    Ignored,
}

#[derive(Debug, Clone)]
pub(crate) struct FilterForm {
    fields: &'static [Field],
    focus: usize,
    type_cursor: usize,
}

impl FilterForm {
    pub(crate) fn new(fields: &'static [Field]) -> Self {
        Self {
            fields,
            focus: 0,
            type_cursor: 0,
        }
    }

    pub(crate) fn fields(&self) -> &'static [Field] {
        self.fields
    }

    pub(crate) fn focused(&self) -> Field {
        self.fields[self.focus.min(self.fields.len() - 1)]
    }

    pub(crate) fn type_cursor(&self) -> usize {
        self.type_cursor
    }

    fn step(&mut self, delta: isize) {
        let len = self.fields.len();
        self.focus = (self.focus + len).saturating_add_signed(delta) % len;
    }

    pub(crate) fn handle_key(
        &mut self,
        key: KeyEvent,
        query: &mut QueryState,
        choices: &FilterConfig,
    ) -> FormOutcome {
        let field = self.focused();
        match key.code {
            KeyCode::Enter => return FormOutcome::Submit,
            KeyCode::Esc => return FormOutcome::Leave,
            KeyCode::Tab | KeyCode::Down => {
                self.step(1);
                return FormOutcome::Handled;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.step(-1);
                return FormOutcome::Handled;
            }
            _ => {}
        }

        match field {
            Field::StreamType => self.handle_type_key(key, query, &choices.stream_types),
            Field::WholeWord => match key.code {
                KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
                    query.match_whole_word = !query.match_whole_word;
                    FormOutcome::Handled
                }
                _ => FormOutcome::Ignored,
            },
            Field::Streamer if matches!(key.code, KeyCode::Left | KeyCode::Right) => {
                let delta = if key.code == KeyCode::Right { 1 } else { -1 };
                query.streamer = cycle_choice(&query.streamer, &choices.streamers, delta);
                FormOutcome::Handled
            }
            _ => edit_text(field, key, query),
        }
    }

    fn handle_type_key(
        &mut self,
        key: KeyEvent,
        query: &mut QueryState,
        stream_types: &[String],
    ) -> FormOutcome {
        if stream_types.is_empty() {
            return FormOutcome::Ignored;
        }
        match key.code {
            KeyCode::Left => {
                self.type_cursor = self
                    .type_cursor
                    .checked_sub(1)
                    .unwrap_or(stream_types.len() - 1);
                FormOutcome::Handled
            }
            KeyCode::Right => {
                self.type_cursor = (self.type_cursor + 1) % stream_types.len();
                FormOutcome::Handled
            }
            KeyCode::Char(' ') => {
                if let Some(tag) = stream_types.get(self.type_cursor) {
                    query.toggle_stream_type(tag);
                }
                FormOutcome::Handled
            }
            _ => FormOutcome::Ignored,
        }
    }
}

fn edit_text(field: Field, key: KeyEvent, query: &mut QueryState) -> FormOutcome {
    let Some(text) = field.text_mut(query) else {
        return FormOutcome::Ignored;
    };
    match key.code {
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            text.clear();
            FormOutcome::Handled
        }
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => FormOutcome::Ignored,
        KeyCode::Char(ch) => {
            if field.is_date() && (!(ch.is_ascii_digit() || ch == '-') || text.len() >= DATE_LEN) {
                return FormOutcome::Ignored;
            }
            text.push(ch);
            FormOutcome::Handled
        }
        KeyCode::Backspace => {
            text.pop();
            FormOutcome::Handled
        }
        _ => FormOutcome::Ignored,
    }
}

/// Step through `choices` with an empty "any" slot before the first entry.
fn cycle_choice(current: &str, choices: &[String], delta: isize) -> String {
    let slots = choices.len() + 1;
    let position = choices
        .iter()
        .position(|choice| choice == current)
        .map_or(0, |idx| idx + 1);
    let next = (position + slots).saturating_add_signed(delta) % slots;
    next.checked_sub(1)
        .and_then(|idx| choices.get(idx))
        .cloned()
        .unwrap_or_default()
}

/// Reject malformed dates before a request goes out.
pub(crate) fn validate_dates(query: &QueryState) -> Result<(), String> {
    for (label, value) in [("From", &query.from_date), ("To", &query.to_date)] {
        if !value.is_empty() && timefmt::parse_date(value).is_none() {
            return Err(format!("{label} date must be YYYY-MM-DD"));
        }
    }
    Ok(())
}
