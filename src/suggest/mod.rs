//! Trigger-suggestion engine for the compose box.
//!
//! The engine owns the compose line and its caret. Keystrokes are fed
//! through it; when a trigger character lands at a valid position (start of
//! a logical line or after whitespace) it opens a suggestion session over
//! the matching provider's candidates, keeps a keyboard-navigable ranked
//! list in sync with the query, and on confirmation mutates only the span
//! between the trigger anchor and the caret. Positioning and rendering of
//! the suggestion popup belong to the host.

pub mod provider;
pub mod ranking;

use provider::{CandidateItem, CandidateProvider, TriggerKind};
use ranking::{rank, RankedCandidate};

use crate::utils::input::sanitize_text_input;

/// Events the engine emits for the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestEvent {
    Opened(TriggerKind),
    Closed,
    /// Knowledge confirmation: span removed, item attached to the request.
    KnowledgeAttached(CandidateItem),
    /// Model-mention confirmation: span removed, generation target chosen.
    ModelSelected(CandidateItem),
}

/// The live suggestion session. At most one exists at a time.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub kind: TriggerKind,
    /// Byte offset of the trigger character in the compose line.
    pub anchor: usize,
    /// Substring typed since the trigger character.
    pub query: String,
}

pub struct SuggestEngine<P> {
    provider: P,
    input: String,
    caret: usize,
    context: Option<TriggerContext>,
    /// Candidate set fetched once when the session opened.
    candidates: Vec<CandidateItem>,
    results: Vec<RankedCandidate>,
    selected: usize,
}

impl<P: CandidateProvider> SuggestEngine<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            input: String::new(),
            caret: 0,
            context: None,
            candidates: Vec::new(),
            results: Vec::new(),
            selected: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&TriggerContext> {
        self.context.as_ref()
    }

    pub fn results(&self) -> &[RankedCandidate] {
        &self.results
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&CandidateItem> {
        self.results.get(self.selected).map(|r| &r.item)
    }

    /// Inserts one character at the caret. A trigger character typed at the
    /// start of a line or after whitespace opens a session (closing any
    /// prior one first); inside an open session other characters extend the
    /// query and re-rank.
    pub fn insert_char(&mut self, c: char) -> Vec<SuggestEvent> {
        let mut events = Vec::new();

        if let Some(kind) = TriggerKind::from_char(c) {
            if self.at_trigger_position() {
                if self.context.is_some() {
                    self.close(&mut events);
                }
                let anchor = self.caret;
                self.input.insert(self.caret, c);
                self.caret += c.len_utf8();
                self.context = Some(TriggerContext {
                    kind,
                    anchor,
                    query: String::new(),
                });
                self.candidates = self.provider.candidates(kind);
                self.refresh_results();
                events.push(SuggestEvent::Opened(kind));
                return events;
            }
        }

        self.input.insert(self.caret, c);
        self.caret += c.len_utf8();
        if self.context.is_some() {
            self.sync_query();
        }
        events
    }

    /// Inserts sanitized text (paste path) one character at a time so
    /// trigger detection and query tracking stay consistent.
    pub fn insert_str(&mut self, text: &str) -> Vec<SuggestEvent> {
        let mut events = Vec::new();
        for c in sanitize_text_input(text).chars() {
            events.extend(self.insert_char(c));
        }
        events
    }

    /// Deletes the character before the caret. Deleting the trigger
    /// character itself closes the session.
    pub fn backspace(&mut self) -> Vec<SuggestEvent> {
        let mut events = Vec::new();
        let Some(prev) = self.input[..self.caret].chars().next_back() else {
            return events;
        };
        let start = self.caret - prev.len_utf8();
        self.input.replace_range(start..self.caret, "");
        self.caret = start;

        if let Some(ctx) = &self.context {
            if self.caret <= ctx.anchor {
                self.close(&mut events);
            } else {
                self.sync_query();
            }
        }
        events
    }

    /// Moves the caret. Host-supplied offsets are clamped to the line and
    /// snapped down to a char boundary. Leaving the active span closes the
    /// session without touching the document.
    pub fn set_caret(&mut self, pos: usize) -> Vec<SuggestEvent> {
        let mut events = Vec::new();
        let mut pos = pos.min(self.input.len());
        while !self.input.is_char_boundary(pos) {
            pos -= 1;
        }
        self.caret = pos;
        if let Some(ctx) = &self.context {
            let query_start = ctx.anchor + ctx.kind.as_char().len_utf8();
            let span_end = query_start + ctx.query.len();
            if self.caret < query_start || self.caret > span_end {
                self.close(&mut events);
            }
        }
        events
    }

    /// Advances the selection with wraparound; no-op on an empty list.
    /// Navigation never resets the cursor — only query edits do.
    pub fn select_next(&mut self) {
        if !self.results.is_empty() {
            self.selected = (self.selected + 1) % self.results.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.results.is_empty() {
            if self.selected == 0 {
                self.selected = self.results.len() - 1;
            } else {
                self.selected -= 1;
            }
        }
    }

    /// Materializes the selected candidate. With an empty result list this
    /// is a no-op and the session stays open. Document mutation is confined
    /// to the span from the trigger anchor to the caret.
    pub fn confirm(&mut self) -> Vec<SuggestEvent> {
        let mut events = Vec::new();
        let Some(ctx) = self.context.clone() else {
            return events;
        };
        let Some(choice) = self.results.get(self.selected).map(|r| r.item.clone()) else {
            return events;
        };

        let span = ctx.anchor..self.caret;
        match ctx.kind {
            TriggerKind::Prompt => {
                let body = choice.body_text().to_string();
                self.input.replace_range(span, &body);
                self.caret = ctx.anchor + body.len();
            }
            TriggerKind::Knowledge => {
                self.input.replace_range(span, "");
                self.caret = ctx.anchor;
                events.push(SuggestEvent::KnowledgeAttached(choice));
            }
            TriggerKind::Model => {
                self.input.replace_range(span, "");
                self.caret = ctx.anchor;
                events.push(SuggestEvent::ModelSelected(choice));
            }
        }
        self.close(&mut events);
        events
    }

    /// Closes the session without document mutation (Escape).
    pub fn dismiss(&mut self) -> Vec<SuggestEvent> {
        let mut events = Vec::new();
        if self.context.is_some() {
            self.close(&mut events);
        }
        events
    }

    /// Clears the compose line, closing any open session.
    pub fn reset(&mut self) -> Vec<SuggestEvent> {
        let mut events = self.dismiss();
        self.input.clear();
        self.caret = 0;
        events
    }

    fn at_trigger_position(&self) -> bool {
        self.input[..self.caret]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace)
    }

    fn sync_query(&mut self) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let query_start = ctx.anchor + ctx.kind.as_char().len_utf8();
        ctx.query = self.input[query_start..self.caret].to_string();
        self.refresh_results();
    }

    fn refresh_results(&mut self) {
        let query = self
            .context
            .as_ref()
            .map(|ctx| ctx.query.clone())
            .unwrap_or_default();
        self.results = rank(&query, &self.candidates);
        self.selected = 0;
    }

    fn close(&mut self, events: &mut Vec<SuggestEvent>) {
        self.context = None;
        self.candidates.clear();
        self.results.clear();
        self.selected = 0;
        events.push(SuggestEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_provider(trigger: TriggerKind) -> Vec<CandidateItem> {
        match trigger {
            TriggerKind::Model => vec![
                CandidateItem::new("gpt-4", "gpt-4"),
                CandidateItem::new("gpt-3.5", "gpt-3.5"),
                CandidateItem::new("claude", "claude"),
            ],
            TriggerKind::Prompt => vec![
                CandidateItem::new("sum", "Summarize")
                    .with_payload(json!({"content": "Summarize the text above."})),
            ],
            TriggerKind::Knowledge => vec![CandidateItem::new("kb-1", "release notes")],
        }
    }

    fn engine() -> SuggestEngine<fn(TriggerKind) -> Vec<CandidateItem>> {
        SuggestEngine::new(model_provider as fn(TriggerKind) -> Vec<CandidateItem>)
    }

    fn type_str(engine: &mut SuggestEngine<fn(TriggerKind) -> Vec<CandidateItem>>, text: &str) {
        for c in text.chars() {
            engine.insert_char(c);
        }
    }

    #[test]
    fn slash_at_line_start_opens_a_session() {
        let mut engine = engine();
        let events = engine.insert_char('/');
        assert_eq!(events, vec![SuggestEvent::Opened(TriggerKind::Prompt)]);
        assert!(engine.is_open());
    }

    #[test]
    fn trigger_after_non_whitespace_does_not_open() {
        let mut engine = engine();
        type_str(&mut engine, "Hi");
        let events = engine.insert_char('/');
        assert!(events.is_empty());
        assert!(!engine.is_open());
        assert_eq!(engine.input(), "Hi/");
    }

    #[test]
    fn model_mention_scenario() {
        let mut engine = engine();
        type_str(&mut engine, "Hello ");
        let opened = engine.insert_char('@');
        assert_eq!(opened, vec![SuggestEvent::Opened(TriggerKind::Model)]);
        type_str(&mut engine, "gp");

        let ctx = engine.context().expect("session open");
        assert_eq!(ctx.query, "gp");
        let labels: Vec<&str> = engine
            .results()
            .iter()
            .map(|r| r.item.label.as_str())
            .collect();
        assert_eq!(labels, vec!["gpt-4", "gpt-3.5"]);

        let events = engine.confirm();
        assert_eq!(engine.input(), "Hello ");
        assert_eq!(engine.caret(), 6);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            SuggestEvent::ModelSelected(item) if item.id == "gpt-4"
        ));
        assert_eq!(events[1], SuggestEvent::Closed);
        assert!(!engine.is_open());
    }

    #[test]
    fn prompt_confirmation_replaces_the_span_with_the_body() {
        let mut engine = engine();
        engine.insert_char('/');
        type_str(&mut engine, "Sum");
        let events = engine.confirm();
        assert_eq!(engine.input(), "Summarize the text above.");
        assert_eq!(engine.caret(), engine.input().len());
        assert_eq!(events, vec![SuggestEvent::Closed]);
    }

    #[test]
    fn knowledge_confirmation_removes_span_and_attaches() {
        let mut engine = engine();
        engine.insert_char('#');
        type_str(&mut engine, "rel");
        let events = engine.confirm();
        assert_eq!(engine.input(), "");
        assert!(matches!(
            &events[0],
            SuggestEvent::KnowledgeAttached(item) if item.id == "kb-1"
        ));
    }

    #[test]
    fn confirm_on_empty_results_is_a_noop_and_stays_open() {
        let mut engine = engine();
        engine.insert_char('@');
        type_str(&mut engine, "zzzz");
        assert!(engine.results().is_empty());

        let events = engine.confirm();
        assert!(events.is_empty());
        assert!(engine.is_open());
        assert_eq!(engine.input(), "@zzzz");
    }

    #[test]
    fn selection_wraps_in_both_directions() {
        let mut engine = engine();
        engine.insert_char('@');
        assert_eq!(engine.results().len(), 3);

        engine.select_previous();
        assert_eq!(engine.selected_index(), 2);
        engine.select_next();
        assert_eq!(engine.selected_index(), 0);
        engine.select_next();
        engine.select_next();
        engine.select_next();
        assert_eq!(engine.selected_index(), 0);
    }

    #[test]
    fn query_edits_reset_the_selection_cursor() {
        let mut engine = engine();
        engine.insert_char('@');
        engine.select_next();
        assert_eq!(engine.selected_index(), 1);

        engine.insert_char('g');
        assert_eq!(engine.selected_index(), 0);
    }

    #[test]
    fn backspacing_over_the_trigger_closes_the_session() {
        let mut engine = engine();
        engine.insert_char('@');
        engine.insert_char('g');

        assert!(engine.backspace().is_empty());
        assert!(engine.is_open());
        assert_eq!(engine.context().unwrap().query, "");

        let events = engine.backspace();
        assert_eq!(events, vec![SuggestEvent::Closed]);
        assert_eq!(engine.input(), "");
    }

    #[test]
    fn caret_leaving_the_span_closes_without_mutation() {
        let mut engine = engine();
        type_str(&mut engine, "Hello ");
        engine.insert_char('@');
        engine.insert_char('g');

        let events = engine.set_caret(2);
        assert_eq!(events, vec![SuggestEvent::Closed]);
        assert_eq!(engine.input(), "Hello @g");
    }

    #[test]
    fn caret_moves_within_the_span_keep_the_session() {
        let mut engine = engine();
        engine.insert_char('@');
        engine.insert_char('g');
        assert!(engine.set_caret(1).is_empty());
        assert!(engine.is_open());
    }

    #[test]
    fn caret_snaps_down_to_a_char_boundary() {
        let mut engine = engine();
        engine.insert_char('🌍');

        // Byte offset 2 is inside the four-byte scalar.
        assert!(engine.set_caret(2).is_empty());
        assert_eq!(engine.caret(), 0);

        engine.insert_char('x');
        assert_eq!(engine.input(), "x🌍");

        assert!(engine.set_caret(99).is_empty());
        assert_eq!(engine.caret(), engine.input().len());
    }

    #[test]
    fn dismiss_closes_without_mutation() {
        let mut engine = engine();
        engine.insert_char('@');
        engine.insert_char('g');
        let events = engine.dismiss();
        assert_eq!(events, vec![SuggestEvent::Closed]);
        assert_eq!(engine.input(), "@g");
    }

    #[test]
    fn new_trigger_closes_the_prior_session_first() {
        let mut engine = engine();
        engine.insert_char('@');
        engine.insert_char(' ');
        let events = engine.insert_char('/');
        assert_eq!(
            events,
            vec![SuggestEvent::Closed, SuggestEvent::Opened(TriggerKind::Prompt)]
        );
        assert_eq!(engine.context().unwrap().kind, TriggerKind::Prompt);
    }

    #[test]
    fn empty_query_lists_all_candidates_in_provider_order() {
        let mut engine = engine();
        engine.insert_char('@');
        let labels: Vec<&str> = engine
            .results()
            .iter()
            .map(|r| r.item.label.as_str())
            .collect();
        assert_eq!(labels, vec!["gpt-4", "gpt-3.5", "claude"]);
    }

    #[test]
    fn pasted_text_is_sanitized_before_insertion() {
        let mut engine = engine();
        engine.insert_str("a\tb\x07c");
        assert_eq!(engine.input(), "a    bc");
    }

    #[test]
    fn reset_clears_the_line_and_closes_the_session() {
        let mut engine = engine();
        type_str(&mut engine, "draft ");
        engine.insert_char('@');
        let events = engine.reset();
        assert_eq!(events, vec![SuggestEvent::Closed]);
        assert_eq!(engine.input(), "");
        assert_eq!(engine.caret(), 0);
    }

    #[test]
    fn trigger_on_a_new_line_counts_as_line_start() {
        let mut engine = engine();
        type_str(&mut engine, "first line\n");
        let events = engine.insert_char('/');
        assert_eq!(events, vec![SuggestEvent::Opened(TriggerKind::Prompt)]);
    }
}
