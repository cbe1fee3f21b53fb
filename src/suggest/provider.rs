use serde_json::Value;

/// The trigger characters recognized in the compose box and the candidate
/// family each one queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// `/` — prompt bodies inserted into the compose line.
    Prompt,
    /// `#` — knowledge items attached to the outgoing request.
    Knowledge,
    /// `@` — model mentions selecting the generation target.
    Model,
}

impl TriggerKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '/' => Some(TriggerKind::Prompt),
            '#' => Some(TriggerKind::Knowledge),
            '@' => Some(TriggerKind::Model),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TriggerKind::Prompt => '/',
            TriggerKind::Knowledge => '#',
            TriggerKind::Model => '@',
        }
    }
}

/// Immutable view of one external entity (prompt, knowledge item, model).
/// `payload` is opaque to the engine and returned verbatim on selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub id: String,
    pub label: String,
    pub searchable: String,
    pub payload: Value,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            searchable: label.clone(),
            label,
            payload: Value::Null,
        }
    }

    pub fn with_searchable(mut self, searchable: impl Into<String>) -> Self {
        self.searchable = searchable.into();
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Text inserted for a prompt candidate. A payload without a usable
    /// `content` field falls back to the label; it is never an error.
    pub fn body_text(&self) -> &str {
        self.payload
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or(&self.label)
    }
}

/// Candidate source supplied by the host application. Synchronous and
/// already loaded; the ranking path never fetches.
pub trait CandidateProvider {
    fn candidates(&self, trigger: TriggerKind) -> Vec<CandidateItem>;
}

impl<F> CandidateProvider for F
where
    F: Fn(TriggerKind) -> Vec<CandidateItem>,
{
    fn candidates(&self, trigger: TriggerKind) -> Vec<CandidateItem> {
        self(trigger)
    }
}
