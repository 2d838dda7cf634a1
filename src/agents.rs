/// Operations a passage can go through, and how each one turns into a prompt.
///
/// `OperationKind` is the closed set of things the user can ask for. Each
/// dispatchable kind maps onto one of four agents, which own a system prompt
/// and a user-prompt layout.
use std::path::{Path, PathBuf};

use crate::client::TokenLimit;
use crate::config::PromptPaths;
use crate::document::{ContextDirection, Document};

// ── OperationKind ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Edit,
    Fix,
    Condense,
    Expand,
    Reroll,
    RerollUnbounded,
    RerollInstruct,
    Custom,
    ManualEdit,
    Revert,
}

impl OperationKind {
    /// Name recorded in the audit log.
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Edit => "edit",
            OperationKind::Fix => "fix",
            OperationKind::Condense => "condense",
            OperationKind::Expand => "expand",
            OperationKind::Reroll => "reroll",
            OperationKind::RerollUnbounded => "reroll_unbounded",
            OperationKind::RerollInstruct => "reroll_instruct",
            OperationKind::Custom => "custom",
            OperationKind::ManualEdit => "manual_edit",
            OperationKind::Revert => "revert",
        }
    }

    /// Label for menus and status lines.
    pub fn title(self) -> &'static str {
        match self {
            OperationKind::Edit => "Edit",
            OperationKind::Fix => "Fix",
            OperationKind::Condense => "Condense",
            OperationKind::Expand => "Expand",
            OperationKind::Reroll => "Reroll",
            OperationKind::RerollUnbounded => "Reroll Unbounded",
            OperationKind::RerollInstruct => "Reroll w/ Instructions",
            OperationKind::Custom => "Custom",
            OperationKind::ManualEdit => "Manual Edit",
            OperationKind::Revert => "Revert",
        }
    }

    /// Rerolls start again from what the user typed, not the current text.
    pub fn uses_user_entry(self) -> bool {
        matches!(
            self,
            OperationKind::Reroll | OperationKind::RerollUnbounded | OperationKind::RerollInstruct
        )
    }

    /// Kinds that need free-form instructions before dispatch.
    pub fn needs_instructions(self) -> bool {
        matches!(self, OperationKind::RerollInstruct | OperationKind::Custom)
    }

    /// `None` for operations applied locally without a completion.
    pub fn agent(self) -> Option<Agent> {
        match self {
            OperationKind::Edit
            | OperationKind::Reroll
            | OperationKind::RerollUnbounded
            | OperationKind::RerollInstruct
            | OperationKind::Custom => Some(Agent::Edit),
            OperationKind::Fix => Some(Agent::Fix),
            OperationKind::Condense => Some(Agent::Condense),
            OperationKind::Expand => Some(Agent::Expand),
            OperationKind::ManualEdit | OperationKind::Revert => None,
        }
    }

    pub fn token_limit(self, cap: u32) -> TokenLimit {
        match self {
            OperationKind::RerollUnbounded => TokenLimit::Unbounded,
            _ => TokenLimit::Capped(cap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agent {
    Edit,
    Fix,
    Condense,
    Expand,
}

// ── AgentRequest ──────────────────────────────────────────────────────────────

/// A self-contained snapshot of everything a worker needs. Built on the UI
/// side so workers never touch the document.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub passage_id: String,
    pub kind: OperationKind,
    pub source_text: String,
    pub preceding: String,
    pub subsequent: String,
    pub instructions: String,
    pub max_tokens: TokenLimit,
    /// Document-level system prompt file, honoured by the edit agent only.
    pub system_prompt_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSettings {
    pub context_chars: usize,
    pub max_output_tokens: u32,
}

impl AgentRequest {
    /// Snapshot passage `index` for `kind`. `None` when the index is out of
    /// range or the kind has no agent.
    pub fn build(
        doc: &Document,
        index: usize,
        kind: OperationKind,
        instructions: &str,
        settings: RequestSettings,
    ) -> Option<Self> {
        let agent = kind.agent()?;
        let passage = doc.passage(index)?;

        let source_text = if kind.uses_user_entry() {
            passage.user_entry.clone()
        } else {
            passage.text.clone()
        };
        let preceding = if doc.meta.send_prepend_passage {
            doc.context_window(index, settings.context_chars, ContextDirection::Preceding)
        } else {
            String::new()
        };
        let subsequent = if doc.meta.send_append_text {
            doc.context_window(index, settings.context_chars, ContextDirection::Subsequent)
        } else {
            String::new()
        };
        let system_prompt_path = match agent {
            Agent::Edit => doc.meta.system_prompt.as_ref().map(PathBuf::from),
            _ => None,
        };

        Some(Self {
            passage_id: passage.id.clone(),
            kind,
            source_text,
            preceding,
            subsequent,
            instructions: instructions.trim().to_string(),
            max_tokens: kind.token_limit(settings.max_output_tokens),
            system_prompt_path,
        })
    }

    /// Request for a passage that was just submitted and has no text yet.
    pub fn for_new_passage(
        doc: &Document,
        index: usize,
        settings: RequestSettings,
    ) -> Option<Self> {
        Self::build(doc, index, OperationKind::Edit, "", settings)
    }

    pub fn user_prompt(&self) -> String {
        let Some(agent) = self.kind.agent() else {
            return self.source_text.clone();
        };
        match agent {
            Agent::Edit => edit_prompt(self),
            Agent::Fix => fix_prompt(self),
            Agent::Condense => condense_prompt(self),
            Agent::Expand => expand_prompt(self),
        }
    }
}

fn edit_prompt(req: &AgentRequest) -> String {
    let mut parts = Vec::new();
    if !req.preceding.is_empty() {
        parts.push(format!("[PRECEDING TEXT]\n{}", req.preceding));
    }
    parts.push(format!("[TEXT TO EDIT]\n{}", req.source_text));
    if !req.subsequent.is_empty() {
        parts.push(format!("[SUBSEQUENT TEXT]\n{}", req.subsequent));
    }
    if !req.instructions.is_empty() {
        parts.push(format!("[ADDITIONAL INSTRUCTIONS]\n{}", req.instructions));
    }
    parts.join("\n\n")
}

/// Fix works on the passage alone; context would only invite rewrites.
fn fix_prompt(req: &AgentRequest) -> String {
    let mut out = format!("[TEXT TO FIX]\n{}", req.source_text);
    if !req.instructions.is_empty() {
        out.push_str(&format!("\n\n[SPECIFIC ISSUES]\n{}", req.instructions));
    }
    out
}

fn condense_prompt(req: &AgentRequest) -> String {
    let mut parts = Vec::new();
    if !req.preceding.is_empty() {
        parts.push(format!("[PRECEDING TEXT FOR STYLE REFERENCE]\n{}", req.preceding));
    }
    parts.push(format!("[TEXT TO CONDENSE]\n{}", req.source_text));
    if !req.instructions.is_empty() {
        parts.push(format!("[CONDENSATION GOALS]\n{}", req.instructions));
    }
    parts.join("\n\n")
}

const DEFAULT_EXPANSION_GOALS: &str = "Add sensory details, character reactions, \
and atmosphere while preserving the original style and pacing.";

fn expand_prompt(req: &AgentRequest) -> String {
    let mut parts = Vec::new();
    if !req.preceding.is_empty() {
        parts.push(format!("[PRECEDING TEXT]\n{}", req.preceding));
    }
    parts.push(format!("[TEXT TO EXPAND]\n{}", req.source_text));
    if !req.subsequent.is_empty() {
        parts.push(format!("[SUBSEQUENT TEXT]\n{}", req.subsequent));
    }
    let goals = if req.instructions.is_empty() {
        DEFAULT_EXPANSION_GOALS
    } else {
        req.instructions.as_str()
    };
    parts.push(format!("[EXPANSION GOALS]\n{goals}"));
    parts.join("\n\n")
}

// ── System prompts ────────────────────────────────────────────────────────────

const DEFAULT_EDIT_PROMPT: &str = "\
You are a fiction editor. Turn the rough draft in [TEXT TO EDIT] into polished prose.

- Correct spelling, grammar and punctuation silently.
- Tighten weak verbs and cut redundancy with the smallest change that works.
- Keep the author's voice and deliberate stylistic choices.
- Where the draft carries markers such as //note, [[note]] or [TODO: x], write \
the prose they ask for and remove the marker.

[PRECEDING TEXT] and [SUBSEQUENT TEXT], when present, are for continuity only. \
Never repeat them. Return only the edited passage, with no commentary.";

const DEFAULT_FIX_PROMPT: &str = "\
You are a copy editor. Correct spelling, grammar, punctuation and obvious \
continuity slips in [TEXT TO FIX]. Do not restyle, reorder or shorten anything \
that is already correct. If [SPECIFIC ISSUES] is present, address those first. \
Return only the corrected text.";

const DEFAULT_CONDENSE_PROMPT: &str = "\
You are a line editor. Shorten [TEXT TO CONDENSE] while keeping every plot \
point, every line of dialogue that matters, and the narrative voice. Remove \
repetition, filler and over-explained emotion. Use [PRECEDING TEXT FOR STYLE \
REFERENCE] only to match tone. Follow [CONDENSATION GOALS] when given. Return \
only the condensed text.";

const DEFAULT_EXPAND_PROMPT: &str = "\
You are a fiction writer. Expand [TEXT TO EXPAND] into a fuller scene that keeps \
its events, order and voice. Follow [EXPANSION GOALS]. Use the surrounding text \
for continuity but never repeat it. Return only the expanded passage.";

/// Resolved system prompt per agent: a profile-configured file when it can be
/// read, otherwise the built-in text.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPrompts {
    pub edit: String,
    pub fix: String,
    pub condense: String,
    pub expand: String,
    /// Last document prompt file read, with its text when usable
    document: Option<(PathBuf, Option<String>)>,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            edit: DEFAULT_EDIT_PROMPT.to_string(),
            fix: DEFAULT_FIX_PROMPT.to_string(),
            condense: DEFAULT_CONDENSE_PROMPT.to_string(),
            expand: DEFAULT_EXPAND_PROMPT.to_string(),
            document: None,
        }
    }
}

impl AgentPrompts {
    pub fn load(paths: &PromptPaths) -> Self {
        let defaults = Self::default();
        Self {
            edit: read_prompt(paths.edit.as_deref()).unwrap_or(defaults.edit),
            fix: read_prompt(paths.fix.as_deref()).unwrap_or(defaults.fix),
            condense: read_prompt(paths.condense.as_deref()).unwrap_or(defaults.condense),
            expand: read_prompt(paths.expand.as_deref()).unwrap_or(defaults.expand),
            document: None,
        }
    }

    pub fn get(&self, agent: Agent) -> &str {
        match agent {
            Agent::Edit => &self.edit,
            Agent::Fix => &self.fix,
            Agent::Condense => &self.condense,
            Agent::Expand => &self.expand,
        }
    }

    /// System prompt for a request: the document's own prompt file first,
    /// then whatever was loaded for the agent.
    pub fn system_for(&mut self, req: &AgentRequest) -> String {
        let Some(agent) = req.kind.agent() else {
            return String::new();
        };
        if let Some(path) = &req.system_prompt_path {
            if let Some(text) = self.document_prompt(path) {
                return text.to_string();
            }
        }
        self.get(agent).to_string()
    }

    /// The document's prompt file, read from disk only when the path differs
    /// from the last one seen.
    fn document_prompt(&mut self, path: &Path) -> Option<&str> {
        let stale = match &self.document {
            Some((cached, _)) => cached != path,
            None => true,
        };
        if stale {
            self.document = Some((path.to_path_buf(), read_prompt(Some(path))));
        }
        self.document.as_ref().and_then(|(_, text)| text.as_deref())
    }
}

/// Read a prompt file; `None` (with a warning) when it is missing, unreadable
/// or blank.
fn read_prompt(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => Some(s),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "prompt file is empty, using default");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read prompt file, using default");
            None
        }
    }
}
