/// Document model: an ordered list of passages plus metadata, persisted as a
/// single pretty-printed JSON file.
///
/// Loading goes through loosely-typed `Raw*` structs and one `normalize` pass,
/// so everything downstream sees fully-populated values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::passage::{AuditEntry, Passage, new_passage_id, now_timestamp};

// ── DocumentConfig ────────────────────────────────────────────────────────────

/// Completion settings stored alongside the document. Informational: the
/// runtime config decides what is actually sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_spec")]
    pub api_spec: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u32,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub structured_output_schema: Option<String>,
}

fn default_api_url() -> String {
    "https://api.cerebras.ai/v1".into()
}
fn default_api_spec() -> String {
    "openai".into()
}
fn default_model_name() -> String {
    "llama3.1-8b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_input_tokens() -> u32 {
    4096
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_spec: default_api_spec(),
            model_name: default_model_name(),
            temperature: default_temperature(),
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: None,
            structured_output_schema: None,
        }
    }
}

// ── DocumentMeta ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMeta {
    pub document_name: String,
    pub setting: String,
    /// Path to a custom system prompt for the edit family of operations.
    pub system_prompt: Option<String>,
    /// Send preceding passages as context.
    pub send_prepend_passage: bool,
    /// Send subsequent passages as context.
    pub send_append_text: bool,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            document_name: "Untitled".into(),
            setting: "original".into(),
            system_prompt: None,
            send_prepend_passage: false,
            send_append_text: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDirection {
    Preceding,
    Subsequent,
}

// ── Document ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub config: DocumentConfig,
    pub meta: DocumentMeta,
    passages: Vec<Passage>,
    modified: bool,
    file_path: Option<PathBuf>,
}

impl Document {
    pub fn new(name: &str) -> Self {
        let mut doc = Self::default();
        doc.meta.document_name = name.to_string();
        doc
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Point future saves at `path` without writing anything yet.
    pub fn set_file_path(&mut self, path: PathBuf) {
        self.file_path = Some(path);
    }

    pub fn passage(&self, index: usize) -> Option<&Passage> {
        self.passages.get(index)
    }

    pub fn passage_by_id(&self, id: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.id == id)
    }

    fn passage_by_id_mut(&mut self, id: &str) -> Option<&mut Passage> {
        self.passages.iter_mut().find(|p| p.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.passages.iter().position(|p| p.id == id)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    pub fn add_pending_passage(&mut self, user_entry: &str) -> &Passage {
        let rank = self.passages.len();
        self.passages.push(Passage::new_pending(user_entry, rank));
        self.modified = true;
        &self.passages[rank]
    }

    pub fn complete_pending_passage(&mut self, id: &str, ai_response: &str, model: &str) -> bool {
        let Some(p) = self.passage_by_id_mut(id) else {
            return false;
        };
        p.complete_pending(ai_response, model);
        self.modified = true;
        true
    }

    pub fn fail_pending_passage(&mut self, id: &str, error: &str) -> bool {
        let Some(p) = self.passage_by_id_mut(id) else {
            return false;
        };
        p.fail_pending(error);
        self.modified = true;
        true
    }

    pub fn update_text(&mut self, id: &str, new_text: &str, operation: &str, model: Option<&str>) -> bool {
        let Some(p) = self.passage_by_id_mut(id) else {
            return false;
        };
        p.update_text(new_text, operation, model);
        self.modified = true;
        true
    }

    pub fn revert_passage(&mut self, id: &str) -> bool {
        let reverted = self
            .passage_by_id_mut(id)
            .map(|p| p.revert_to_original())
            .unwrap_or(false);
        if reverted {
            self.modified = true;
        }
        reverted
    }

    pub fn delete_passage(&mut self, index: usize) -> bool {
        if index >= self.passages.len() {
            return false;
        }
        self.passages.remove(index);
        self.rerank();
        self.modified = true;
        true
    }

    pub fn move_passage(&mut self, from: usize, to: usize) -> bool {
        let n = self.passages.len();
        if from >= n || to >= n {
            return false;
        }
        if from == to {
            return true;
        }
        let p = self.passages.remove(from);
        self.passages.insert(to, p);
        self.rerank();
        self.modified = true;
        true
    }

    fn rerank(&mut self) {
        for (i, p) in self.passages.iter_mut().enumerate() {
            p.rank = i;
        }
    }

    // ── Context ───────────────────────────────────────────────────────────────

    /// Whole passage texts around `index`, nearest first, until the next one
    /// would push the total past `max_chars`. Returned in document order,
    /// joined by blank lines. Never includes `index` itself.
    pub fn context_window(&self, index: usize, max_chars: usize, direction: ContextDirection) -> String {
        let candidates: Box<dyn Iterator<Item = &Passage>> = match direction {
            ContextDirection::Preceding => {
                Box::new(self.passages[..index.min(self.passages.len())].iter().rev())
            }
            ContextDirection::Subsequent => Box::new(self.passages.iter().skip(index + 1)),
        };

        let mut taken: Vec<&str> = Vec::new();
        let mut total = 0usize;
        for p in candidates {
            let len = p.text.chars().count();
            if total + len > max_chars {
                break;
            }
            taken.push(&p.text);
            total += len;
        }
        if direction == ContextDirection::Preceding {
            taken.reverse();
        }
        taken.join("\n\n")
    }

    pub fn full_text(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Write the whole document to `path` (or the remembered path). The dirty
    /// flag is only cleared once the write has succeeded.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path.map(Path::to_path_buf).or_else(|| self.file_path.clone()) {
            Some(p) => p,
            None => bail!("No file path specified"),
        };

        let stored = StoredDocument {
            config: &self.config,
            meta: &self.meta,
            content: StoredContent { passages: &self.passages },
        };
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&target, json).with_context(|| format!("writing {}", target.display()))?;

        self.file_path = Some(target.clone());
        self.modified = false;
        Ok(target)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let raw: RawDocument = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        let mut doc = normalize(raw);
        doc.file_path = Some(path.to_path_buf());
        Ok(doc)
    }
}

// ── On-disk shapes ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StoredDocument<'a> {
    config: &'a DocumentConfig,
    meta: &'a DocumentMeta,
    content: StoredContent<'a>,
}

#[derive(Serialize)]
struct StoredContent<'a> {
    passages: &'a [Passage],
}

#[derive(Deserialize, Default)]
struct RawDocument {
    #[serde(default)]
    config: Option<DocumentConfig>,
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    content: RawContent,
}

#[derive(Deserialize, Default)]
struct RawMeta {
    document_name: Option<String>,
    setting: Option<String>,
    system_prompt: Option<String>,
    send_prepend_passage: Option<bool>,
    send_append_text: Option<bool>,
}

#[derive(Deserialize, Default)]
struct RawContent {
    #[serde(default)]
    passages: Vec<RawPassage>,
}

#[derive(Deserialize, Default)]
struct RawPassage {
    id: Option<String>,
    user_entry: Option<String>,
    ai_response: Option<String>,
    text: Option<String>,
    model: Option<String>,
    created_at: Option<String>,
    manual_edited: Option<bool>,
    pending: Option<bool>,
    #[serde(default)]
    audit_log: Vec<AuditEntry>,
}

/// Fill every missing field. Stored ranks are ignored in favour of file
/// order, and nothing loaded from disk can still be waiting on a job.
fn normalize(raw: RawDocument) -> Document {
    let meta = DocumentMeta {
        document_name: raw.meta.document_name.unwrap_or_else(|| "Untitled".into()),
        setting: raw.meta.setting.unwrap_or_else(|| "original".into()),
        system_prompt: raw.meta.system_prompt.filter(|s| !s.is_empty()),
        send_prepend_passage: raw.meta.send_prepend_passage.unwrap_or(true),
        send_append_text: raw.meta.send_append_text.unwrap_or(false),
    };

    let passages = raw
        .content
        .passages
        .into_iter()
        .enumerate()
        .map(|(rank, rp)| {
            let user_entry = rp.user_entry.unwrap_or_default();
            let ai_response = rp.ai_response.unwrap_or_default();
            let text = rp.text.unwrap_or_else(|| {
                if ai_response.is_empty() {
                    user_entry.clone()
                } else {
                    ai_response.clone()
                }
            });
            if rp.pending == Some(true) {
                tracing::warn!(rank, "passage was saved while pending; marking idle");
            }
            Passage {
                id: rp.id.filter(|s| !s.is_empty()).unwrap_or_else(new_passage_id),
                rank,
                user_entry,
                ai_response,
                text,
                model: rp.model.unwrap_or_default(),
                created_at: rp.created_at.unwrap_or_else(now_timestamp),
                manual_edited: rp.manual_edited.unwrap_or(false),
                pending: false,
                audit_log: rp.audit_log,
            }
        })
        .collect();

    Document {
        config: raw.config.unwrap_or_default(),
        meta,
        passages,
        modified: false,
        file_path: None,
    }
}
