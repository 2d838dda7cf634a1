/// A passage is one user submission plus everything that has happened to it.
///
/// `user_entry` and `ai_response` are write-once. `text` is the working copy,
/// and every change to it after the first response is recorded in `audit_log`.
use serde::{Deserialize, Serialize};

/// Audit operation recorded when the first completion lands.
pub const OP_CREATE: &str = "create";
pub const OP_MANUAL_EDIT: &str = "manual_edit";
pub const OP_REVERT: &str = "revert";

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Short opaque id, the first 8 hex chars of a v4 uuid.
pub fn new_passage_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ── AuditEntry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub previous_text: Option<String>,
    #[serde(default)]
    pub new_text: String,
}

// ── Passage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub id: String,
    pub rank: usize,
    pub user_entry: String,
    pub ai_response: String,
    pub text: String,
    pub model: String,
    pub created_at: String,
    pub manual_edited: bool,
    pub pending: bool,
    pub audit_log: Vec<AuditEntry>,
}

impl Passage {
    /// New passage awaiting its first completion. Shows the user's own text
    /// until then.
    pub fn new_pending(user_entry: &str, rank: usize) -> Self {
        Self {
            id: new_passage_id(),
            rank,
            user_entry: user_entry.to_string(),
            ai_response: String::new(),
            text: user_entry.to_string(),
            model: String::new(),
            created_at: now_timestamp(),
            manual_edited: false,
            pending: true,
            audit_log: Vec::new(),
        }
    }

    pub fn complete_pending(&mut self, ai_response: &str, model: &str) {
        self.ai_response = ai_response.to_string();
        self.text = ai_response.to_string();
        self.model = model.to_string();
        self.pending = false;
        self.audit_log.push(AuditEntry {
            timestamp: now_timestamp(),
            operation: OP_CREATE.to_string(),
            model: Some(model.to_string()),
            previous_text: None,
            new_text: self.text.clone(),
        });
    }

    /// Replace the placeholder with an error marker that still carries the
    /// user's text. No audit entry: the passage never had a real text.
    pub fn fail_pending(&mut self, error: &str) {
        self.pending = false;
        self.text = format!("[ERROR: {error}]\n\n{}", self.user_entry);
    }

    /// Record and apply a new working text. Always appends one audit entry.
    pub fn update_text(&mut self, new_text: &str, operation: &str, model: Option<&str>) {
        self.audit_log.push(AuditEntry {
            timestamp: now_timestamp(),
            operation: operation.to_string(),
            model: model.map(str::to_string),
            previous_text: Some(self.text.clone()),
            new_text: new_text.to_string(),
        });
        self.text = new_text.to_string();
        if operation == OP_MANUAL_EDIT {
            self.manual_edited = true;
        }
    }

    /// Restore the original completion. Returns false when there is nothing
    /// to revert to or the text already matches.
    pub fn revert_to_original(&mut self) -> bool {
        if self.pending || self.ai_response.is_empty() || self.text == self.ai_response {
            return false;
        }
        let original = self.ai_response.clone();
        self.update_text(&original, OP_REVERT, None);
        true
    }

    /// First line of the text, clipped to `max_chars`, for list views.
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self.text.lines().next().unwrap_or("");
        if first.chars().count() > max_chars {
            let clipped: String = first.chars().take(max_chars.saturating_sub(1)).collect();
            format!("{clipped}…")
        } else {
            first.to_string()
        }
    }
}
