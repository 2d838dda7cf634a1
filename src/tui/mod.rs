/// Ratatui-based editor for scribe.
///
/// Architecture:
///   main task:   event loop: crossterm events + a 120ms tick that drains job results
///   job tasks:   tokio::spawn per completion request, reporting back through JobDispatcher
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  header (document, mode)                       │
///   ├────────────────────────────────────────────────┤
///   │  passages (scrollable, Min(0))                 │
///   ├────────────────────────────────────────────────┤
///   │  compose box / passage editor                  │
///   ├────────────────────────────────────────────────┤
///   │  status bar + key hints (2 lines)              │
///   └────────────────────────────────────────────────┘
///
/// With `--debug` the layout above takes the left 60% and the recent log
/// tail fills the right 40%.
pub mod render;
pub mod passages;
pub mod overlays;
pub mod debug_pane;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::{
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::agents::{AgentRequest, OperationKind, RequestSettings};
use crate::buffer::TextBuffer;
use crate::config::{ResolvedConfig, document_save_path};
use crate::document::Document;
use crate::jobs::JobDispatcher;
use crate::logging::DebugLog;

// ── Mode ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Typing a new submission. The root state.
    Composing,
    /// Moving the selection through the passage list.
    Browsing,
    /// Rewriting the selected passage by hand.
    EditingPassage,
    Menu(MenuSide),
    /// Asking for a file name; quits after a successful save when `then_quit`.
    SaveAs { then_quit: bool },
    /// "Save before quitting?" y/n/c.
    ConfirmQuit,
    /// Collecting instructions for an operation that needs them.
    Instructions(OperationKind),
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Composing => "COMPOSE",
            Mode::Browsing => "BROWSE",
            Mode::EditingPassage => "EDIT",
            Mode::Menu(_) => "MENU",
            Mode::SaveAs { .. } => "SAVE",
            Mode::ConfirmQuit => "QUIT?",
            Mode::Instructions(_) => "INSTRUCT",
        }
    }

    fn is_prompt(self) -> bool {
        matches!(self, Mode::SaveAs { .. } | Mode::ConfirmQuit | Mode::Instructions(_))
    }
}

// ── Menus ─────────────────────────────────────────────────────────────────────

/// Menu entries with their hotkeys, in display order. A hotkey is a letter
/// of the title, unique within its menu.
pub fn menu_items(side: MenuSide) -> &'static [(OperationKind, char)] {
    match side {
        MenuSide::Left => &[
            (OperationKind::Reroll, 'r'),
            (OperationKind::RerollUnbounded, 'u'),
            (OperationKind::RerollInstruct, 'i'),
        ],
        MenuSide::Right => &[
            (OperationKind::Fix, 'f'),
            (OperationKind::Condense, 'c'),
            (OperationKind::Expand, 'e'),
            (OperationKind::Custom, 'u'),
            (OperationKind::Revert, 'v'),
        ],
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub doc: Document,
    pub jobs: JobDispatcher,
    pub mode: Mode,
    /// Where Esc from a prompt goes back to
    pub prompt_return: Mode,
    pub compose: TextBuffer,
    pub editor: TextBuffer,
    /// Single-line input for the save / instructions prompts
    pub prompt: TextBuffer,
    /// Passage text when the editor was opened, to detect no-op edits
    pub edit_snapshot: String,
    pub edit_id: Option<String>,
    pub selected: Option<usize>,
    pub menu_selected: usize,
    /// First visible row of the passage list
    pub list_scroll: usize,
    pub status: Option<String>,
    /// Incremented every tick while jobs are in flight, for the spinner
    pub spinner_tick: u32,
    pub settings: RequestSettings,
    pub works_dir: PathBuf,
    pub profile: String,
    pub model: String,
    /// Shown beside the main view when present
    pub debug_log: Option<DebugLog>,
}

impl AppState {
    pub fn new(doc: Document, jobs: JobDispatcher, resolved: &ResolvedConfig) -> Self {
        let selected = doc.len().checked_sub(1);
        Self {
            doc,
            jobs,
            mode: Mode::Composing,
            prompt_return: Mode::Composing,
            compose: TextBuffer::new(),
            editor: TextBuffer::new(),
            prompt: TextBuffer::new(),
            edit_snapshot: String::new(),
            edit_id: None,
            selected,
            menu_selected: 0,
            list_scroll: 0,
            status: None,
            spinner_tick: 0,
            settings: resolved.request_settings(),
            works_dir: resolved.works_dir.clone(),
            profile: resolved.profile_name.clone(),
            model: resolved.model.clone(),
            debug_log: None,
        }
    }

    pub fn with_debug_log(mut self, log: DebugLog) -> Self {
        self.debug_log = Some(log);
        self
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    /// Pull finished jobs into the document. Called once per tick.
    pub fn drain_jobs(&mut self) -> bool {
        let drained = self.jobs.drain_and_apply(&mut self.doc);
        if let Some(status) = drained.status {
            self.set_status(status);
        }
        if self.jobs.is_busy() {
            self.spinner_tick = self.spinner_tick.wrapping_add(1);
        }
        drained.applied > 0
    }

    fn open_prompt(&mut self, mode: Mode, initial: &str) {
        if !self.mode.is_prompt() {
            self.prompt_return = self.mode;
        }
        self.prompt = TextBuffer::from_text(initial);
        self.prompt.move_end();
        self.mode = mode;
    }

    // ── Composing ─────────────────────────────────────────────────────────────

    fn submit(&mut self) {
        let text = self.compose.text();
        if text.trim().is_empty() {
            self.set_status("Empty input");
            return;
        }
        let id = self.doc.add_pending_passage(&text).id.clone();
        let index = self.doc.len() - 1;
        if let Some(req) = AgentRequest::for_new_passage(&self.doc, index, self.settings) {
            self.jobs.dispatch(req);
        }
        tracing::info!(passage = %id, chars = text.len(), "submitted passage");
        self.compose.clear();
        self.selected = Some(index);
        self.set_status("Submitted");
    }

    // ── Browsing ──────────────────────────────────────────────────────────────

    fn select_prev(&mut self) {
        self.selected = match self.selected {
            Some(i) => Some(i.saturating_sub(1)),
            None => self.doc.len().checked_sub(1),
        };
    }

    fn select_next(&mut self) {
        self.selected = match self.selected {
            Some(i) if i + 1 < self.doc.len() => Some(i + 1),
            Some(i) => Some(i),
            None => self.doc.len().checked_sub(1),
        };
    }

    /// Selected index, or a status message when nothing usable is selected.
    fn selected_idle(&mut self) -> Option<usize> {
        let Some(index) = self.selected.filter(|&i| i < self.doc.len()) else {
            self.set_status("No passage selected");
            return None;
        };
        if self.doc.passage(index).is_some_and(|p| p.pending) {
            self.set_status("Passage is still processing");
            return None;
        }
        Some(index)
    }

    fn delete_selected(&mut self) {
        let Some(index) = self.selected.filter(|&i| i < self.doc.len()) else {
            self.set_status("No passage selected");
            return;
        };
        if self.doc.delete_passage(index) {
            self.selected = if self.doc.is_empty() {
                None
            } else {
                Some(index.min(self.doc.len() - 1))
            };
            self.set_status(format!("Deleted passage {}", index + 1));
        }
    }

    fn move_selected(&mut self, up: bool) {
        let Some(index) = self.selected.filter(|&i| i < self.doc.len()) else {
            self.set_status("No passage selected");
            return;
        };
        let target = if up {
            match index.checked_sub(1) {
                Some(t) => t,
                None => return,
            }
        } else {
            index + 1
        };
        if self.doc.move_passage(index, target) {
            self.selected = Some(target);
        }
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    fn begin_edit(&mut self) {
        let Some(index) = self.selected_idle() else {
            return;
        };
        let Some(p) = self.doc.passage(index) else {
            return;
        };
        self.edit_snapshot = p.text.clone();
        self.edit_id = Some(p.id.clone());
        self.editor = TextBuffer::from_text(&p.text);
        self.mode = Mode::EditingPassage;
    }

    fn commit_edit(&mut self) {
        let text = self.editor.text();
        match self.edit_id.take() {
            Some(id) if text != self.edit_snapshot => {
                if self.doc.update_text(&id, &text, OperationKind::ManualEdit.label(), None) {
                    self.set_status("Passage updated");
                } else {
                    self.set_status("Passage no longer exists");
                }
            }
            _ => self.set_status("No changes"),
        }
        self.mode = Mode::Browsing;
    }

    fn cancel_edit(&mut self) {
        self.edit_id = None;
        self.mode = Mode::Browsing;
        self.set_status("Edit cancelled");
    }

    // ── Operations ────────────────────────────────────────────────────────────

    fn run_operation(&mut self, kind: OperationKind, instructions: Option<&str>) {
        self.mode = Mode::Browsing;
        let Some(index) = self.selected_idle() else {
            return;
        };
        if kind == OperationKind::Revert {
            let id = self.doc.passage(index).map(|p| p.id.clone()).unwrap_or_default();
            if self.doc.revert_passage(&id) {
                self.set_status("Reverted to original");
            } else {
                self.set_status("Nothing to revert");
            }
            return;
        }
        if kind.needs_instructions() && instructions.is_none() {
            self.open_prompt(Mode::Instructions(kind), "");
            return;
        }
        let instructions = instructions.unwrap_or("");
        match AgentRequest::build(&self.doc, index, kind, instructions, self.settings) {
            Some(req) => {
                self.jobs.dispatch(req);
                self.set_status(format!("{}…", kind.title()));
            }
            None => self.set_status(format!("{} is not available", kind.title())),
        }
    }

    // ── Saving ────────────────────────────────────────────────────────────────

    /// Save to the known path, or ask for one. Returns true when the document
    /// is on disk and clean afterwards.
    fn save(&mut self, then_quit: bool) -> bool {
        if self.doc.file_path().is_none() {
            self.open_prompt(Mode::SaveAs { then_quit }, "");
            return false;
        }
        self.save_to(None)
    }

    fn save_to(&mut self, path: Option<PathBuf>) -> bool {
        match self.doc.save(path.as_deref()) {
            Ok(saved) => {
                let name = saved
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                tracing::info!(path = %saved.display(), "document saved");
                self.set_status(format!("Saved: {name}"));
                true
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "save failed");
                self.set_status(format!("Save failed: {e:#}"));
                false
            }
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(state: AppState) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Restore the terminal before the panic message prints
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        tracing::error!(%info, "panic");
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, state).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut state: AppState,
) -> Result<()> {
    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &mut state))?;

    loop {
        tokio::select! {
            // ── Tick: drain finished jobs, animate spinner ────────────────────
            _ = ticker.tick() => {
                let applied = state.drain_jobs();
                if applied || state.jobs.is_busy() {
                    terminal.draw(|f| render::draw(f, &mut state))?;
                }
            }

            // ── Keyboard/paste/resize events ──────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        let keep = handle_key(key, &mut state)?;
                        if !keep { break; }
                    }
                    Event::Paste(text) => handle_paste(&mut state, &text),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &mut state))?;
            }
        }
    }

    if state.jobs.is_busy() {
        tracing::info!(in_flight = state.jobs.in_flight(), "quitting with jobs in flight");
    }
    Ok(())
}

// ── Input ─────────────────────────────────────────────────────────────────────

fn handle_paste(state: &mut AppState, text: &str) {
    match state.mode {
        Mode::Composing => state.compose.insert_str(text),
        Mode::EditingPassage => state.editor.insert_str(text),
        Mode::SaveAs { .. } | Mode::Instructions(_) => {
            // Prompts are single-line.
            state.prompt.insert_str(&text.replace("\r\n", " ").replace(['\r', '\n'], " "));
        }
        _ => {}
    }
}

/// Shared editing keys for any `TextBuffer`. Returns false if the key was not
/// an editing key.
fn edit_buffer(buf: &mut TextBuffer, key: &KeyEvent) -> bool {
    let plain = !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match key.code {
        KeyCode::Char(c) if plain => buf.insert_char(c),
        KeyCode::Backspace => buf.backspace(),
        KeyCode::Delete => buf.delete(),
        KeyCode::Left => buf.move_left(),
        KeyCode::Right => buf.move_right(),
        KeyCode::Up => buf.move_up(),
        KeyCode::Down => buf.move_down(),
        KeyCode::Home => buf.move_home(),
        KeyCode::End => buf.move_end(),
        _ => return false,
    }
    true
}

/// Returns Ok(false) when the editor should exit.
fn handle_key(key: KeyEvent, state: &mut AppState) -> Result<bool> {
    if key.kind != KeyEventKind::Press {
        return Ok(true);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    // ── Global keys ───────────────────────────────────────────────────────────
    if ctrl && key.code == KeyCode::Char('q') && !state.mode.is_prompt() {
        if state.doc.is_modified() {
            state.open_prompt(Mode::ConfirmQuit, "");
            return Ok(true);
        }
        return Ok(false);
    }
    if ctrl && key.code == KeyCode::Char('s') && !state.mode.is_prompt() {
        if state.mode == Mode::EditingPassage {
            state.commit_edit();
        } else {
            state.save(false);
        }
        return Ok(true);
    }
    if key.code == KeyCode::Tab {
        match state.mode {
            Mode::Composing => {
                state.mode = Mode::Browsing;
                if state.selected.is_none() {
                    state.selected = state.doc.len().checked_sub(1);
                }
                return Ok(true);
            }
            Mode::Browsing => {
                state.mode = Mode::Composing;
                return Ok(true);
            }
            _ => {}
        }
    }

    match state.mode {
        // ── Composing ─────────────────────────────────────────────────────────
        Mode::Composing => match key.code {
            KeyCode::Enter if alt => state.compose.insert_newline(),
            KeyCode::Enter => state.submit(),
            KeyCode::Char('d') if ctrl => state.submit(),
            KeyCode::Esc => {}
            _ => {
                edit_buffer(&mut state.compose, &key);
            }
        },

        // ── Browsing ──────────────────────────────────────────────────────────
        Mode::Browsing => match key.code {
            KeyCode::Up if alt => state.move_selected(true),
            KeyCode::Down if alt => state.move_selected(false),
            KeyCode::Up => state.select_prev(),
            KeyCode::Down => state.select_next(),
            KeyCode::Left => {
                state.menu_selected = 0;
                state.mode = Mode::Menu(MenuSide::Left);
            }
            KeyCode::Right => {
                state.menu_selected = 0;
                state.mode = Mode::Menu(MenuSide::Right);
            }
            KeyCode::Enter => state.begin_edit(),
            KeyCode::Delete => state.delete_selected(),
            KeyCode::Esc => state.mode = Mode::Composing,
            _ => {}
        },

        // ── Passage editor ────────────────────────────────────────────────────
        Mode::EditingPassage => match key.code {
            KeyCode::Esc => state.cancel_edit(),
            KeyCode::Enter => state.editor.insert_newline(),
            _ => {
                edit_buffer(&mut state.editor, &key);
            }
        },

        // ── Operation menus ───────────────────────────────────────────────────
        Mode::Menu(side) => {
            let items = menu_items(side);
            match key.code {
                KeyCode::Esc => state.mode = Mode::Browsing,
                KeyCode::Up => state.menu_selected = state.menu_selected.saturating_sub(1),
                KeyCode::Down => {
                    if state.menu_selected + 1 < items.len() {
                        state.menu_selected += 1;
                    }
                }
                KeyCode::Left if side == MenuSide::Right => {
                    state.menu_selected = 0;
                    state.mode = Mode::Menu(MenuSide::Left);
                }
                KeyCode::Right if side == MenuSide::Left => {
                    state.menu_selected = 0;
                    state.mode = Mode::Menu(MenuSide::Right);
                }
                KeyCode::Left | KeyCode::Right => state.mode = Mode::Browsing,
                KeyCode::Enter => {
                    if let Some(&(kind, _)) = items.get(state.menu_selected) {
                        state.run_operation(kind, None);
                    }
                }
                KeyCode::Char(c) => {
                    let c = c.to_ascii_lowercase();
                    if let Some(&(kind, _)) = items.iter().find(|(_, hk)| *hk == c) {
                        state.run_operation(kind, None);
                    }
                }
                _ => {}
            }
        }

        // ── Save-as prompt ────────────────────────────────────────────────────
        Mode::SaveAs { then_quit } => match key.code {
            KeyCode::Esc => state.mode = state.prompt_return,
            KeyCode::Enter => {
                let path = document_save_path(&state.works_dir, &state.prompt.text());
                state.mode = state.prompt_return;
                if state.save_to(Some(path)) && then_quit {
                    return Ok(false);
                }
            }
            _ => {
                edit_buffer(&mut state.prompt, &key);
            }
        },

        // ── Quit confirmation ─────────────────────────────────────────────────
        Mode::ConfirmQuit => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                state.mode = state.prompt_return;
                if state.save(true) {
                    return Ok(false);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') => return Ok(false),
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => {
                state.mode = state.prompt_return;
            }
            _ => {}
        },

        // ── Instructions prompt ───────────────────────────────────────────────
        Mode::Instructions(kind) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Browsing;
                let msg = match kind {
                    OperationKind::RerollInstruct => "Reroll cancelled".to_string(),
                    OperationKind::Custom => "Custom operation cancelled".to_string(),
                    other => format!("{} cancelled", other.title()),
                };
                state.set_status(msg);
            }
            KeyCode::Enter => {
                let text = state.prompt.text();
                if text.trim().is_empty() {
                    state.set_status("Empty instructions");
                } else {
                    state.run_operation(kind, Some(&text));
                }
            }
            _ => {
                edit_buffer(&mut state.prompt, &key);
            }
        },
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentPrompts;
    use crate::client::{Completer, Completion, Prompt};
    use crate::config::ConfigFile;
    use crate::logging::LogContext;
    use futures_util::future::BoxFuture;
    use std::sync::Arc;
    use std::time::Duration;

    struct Echo;

    impl Completer for Echo {
        fn complete(&self, prompt: Prompt) -> BoxFuture<'_, anyhow::Result<Completion>> {
            Box::pin(async move {
                Ok(Completion {
                    text: format!("ai:{}", prompt.user.lines().last().unwrap_or("")),
                    model: "echo".into(),
                })
            })
        }
    }

    fn state_with(doc: Document, works_dir: PathBuf) -> AppState {
        let mut resolved = ResolvedConfig::resolve(&ConfigFile::default(), None, None, None, None);
        resolved.works_dir = works_dir;
        let jobs = JobDispatcher::new(Arc::new(Echo), AgentPrompts::default(), 0.7, LogContext::noop());
        AppState::new(doc, jobs, &resolved)
    }

    fn state() -> AppState {
        state_with(Document::new("t"), PathBuf::from("works"))
    }

    /// Document with completed passages, already saved so it starts clean.
    fn saved_state(texts: &[&str], dir: &std::path::Path) -> AppState {
        let mut doc = Document::new("t");
        for t in texts {
            let id = doc.add_pending_passage(t).id.clone();
            doc.complete_pending_passage(&id, t, "m");
        }
        doc.save(Some(&dir.join("doc.json"))).unwrap();
        state_with(doc, dir.to_path_buf())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn alt(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::ALT)
    }

    fn press(state: &mut AppState, k: KeyEvent) -> bool {
        handle_key(k, state).unwrap()
    }

    fn type_str(state: &mut AppState, s: &str) {
        for c in s.chars() {
            press(state, key(KeyCode::Char(c)));
        }
    }

    async fn settle(state: &mut AppState) {
        for _ in 0..200 {
            state.drain_jobs();
            if !state.jobs.is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("jobs never settled");
    }

    #[test]
    fn test_escape_moves_toward_browsing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["a"], dir.path());
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.mode, Mode::Composing);

        press(&mut s, key(KeyCode::Tab));
        assert_eq!(s.mode, Mode::Browsing);
        press(&mut s, key(KeyCode::Right));
        assert_eq!(s.mode, Mode::Menu(MenuSide::Right));
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.mode, Mode::Browsing);
        press(&mut s, key(KeyCode::Enter));
        assert_eq!(s.mode, Mode::EditingPassage);
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.mode, Mode::Browsing);
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.mode, Mode::Composing);
    }

    #[test]
    fn test_tab_toggles() {
        let mut s = state();
        press(&mut s, key(KeyCode::Tab));
        assert_eq!(s.mode, Mode::Browsing);
        press(&mut s, key(KeyCode::Tab));
        assert_eq!(s.mode, Mode::Composing);
    }

    #[test]
    fn test_empty_submission_rejected() {
        let mut s = state();
        type_str(&mut s, "   ");
        press(&mut s, key(KeyCode::Enter));
        assert!(s.doc.is_empty());
        assert_eq!(s.status.as_deref(), Some("Empty input"));
        assert!(!s.doc.is_modified());
    }

    #[test]
    fn test_alt_enter_inserts_newline() {
        let mut s = state();
        type_str(&mut s, "a");
        press(&mut s, alt(KeyCode::Enter));
        type_str(&mut s, "b");
        assert_eq!(s.compose.text(), "a\nb");
        assert!(s.doc.is_empty());
    }

    #[tokio::test]
    async fn test_submit_creates_pending_passage_and_completes() {
        let mut s = state();
        type_str(&mut s, "my draft");
        press(&mut s, key(KeyCode::Enter));

        assert_eq!(s.doc.len(), 1);
        assert!(s.doc.passage(0).unwrap().pending);
        assert!(s.compose.is_empty());
        assert_eq!(s.selected, Some(0));
        assert!(s.jobs.is_busy());

        settle(&mut s).await;
        let p = s.doc.passage(0).unwrap();
        assert!(!p.pending);
        assert_eq!(p.text, "ai:my draft");
        assert_eq!(s.status.as_deref(), Some("Passage ready"));
    }

    #[tokio::test]
    async fn test_ctrl_d_submits() {
        let mut s = state();
        type_str(&mut s, "x");
        press(&mut s, ctrl('d'));
        assert_eq!(s.doc.len(), 1);
        settle(&mut s).await;
    }

    #[test]
    fn test_unchanged_edit_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["text"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Enter));
        type_str(&mut s, "x");
        press(&mut s, key(KeyCode::Backspace));
        press(&mut s, ctrl('s'));

        assert_eq!(s.mode, Mode::Browsing);
        assert_eq!(s.status.as_deref(), Some("No changes"));
        assert_eq!(s.doc.passage(0).unwrap().audit_log.len(), 1);
        assert!(!s.doc.is_modified());
    }

    #[test]
    fn test_changed_edit_is_manual_edit() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["text"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Enter));
        press(&mut s, key(KeyCode::End));
        type_str(&mut s, "!");
        press(&mut s, key(KeyCode::Enter));
        type_str(&mut s, "more");
        press(&mut s, ctrl('s'));

        let p = s.doc.passage(0).unwrap();
        assert_eq!(p.text, "text!\nmore");
        assert!(p.manual_edited);
        assert_eq!(p.audit_log.last().unwrap().operation, "manual_edit");
        assert!(s.doc.is_modified());
    }

    #[test]
    fn test_cancelled_edit_discards() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["text"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Enter));
        type_str(&mut s, "zzz");
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.doc.passage(0).unwrap().text, "text");
        assert!(!s.doc.is_modified());
    }

    #[test]
    fn test_operation_without_selection() {
        let mut s = state();
        s.mode = Mode::Browsing;
        press(&mut s, key(KeyCode::Right));
        press(&mut s, key(KeyCode::Char('f')));
        assert_eq!(s.status.as_deref(), Some("No passage selected"));
        assert!(!s.jobs.is_busy());
    }

    #[test]
    fn test_operation_on_pending_passage_rejected() {
        let mut s = state();
        s.doc.add_pending_passage("waiting");
        s.selected = Some(0);
        s.mode = Mode::Browsing;
        press(&mut s, key(KeyCode::Left));
        press(&mut s, key(KeyCode::Char('r')));
        assert_eq!(s.status.as_deref(), Some("Passage is still processing"));
        assert!(!s.jobs.is_busy());
        press(&mut s, key(KeyCode::Enter));
        assert_eq!(s.mode, Mode::Browsing);
    }

    #[tokio::test]
    async fn test_menu_operation_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["one"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Right));
        press(&mut s, key(KeyCode::Down));
        press(&mut s, key(KeyCode::Enter));
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.jobs.is_busy());
        settle(&mut s).await;

        let p = s.doc.passage(0).unwrap();
        assert_eq!(p.audit_log.last().unwrap().operation, "condense");
        assert_eq!(s.status.as_deref(), Some("Condense applied"));
    }

    #[tokio::test]
    async fn test_custom_asks_for_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["one"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Right));
        press(&mut s, key(KeyCode::Char('u')));
        assert_eq!(s.mode, Mode::Instructions(OperationKind::Custom));

        press(&mut s, key(KeyCode::Enter));
        assert_eq!(s.status.as_deref(), Some("Empty instructions"));
        assert!(!s.jobs.is_busy());

        type_str(&mut s, "make it rhyme");
        press(&mut s, key(KeyCode::Enter));
        assert_eq!(s.mode, Mode::Browsing);
        settle(&mut s).await;
        assert_eq!(s.doc.passage(0).unwrap().text, "ai:make it rhyme");
    }

    #[test]
    fn test_instructions_escape_returns_to_browsing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["one"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Left));
        press(&mut s, key(KeyCode::Char('i')));
        assert_eq!(s.mode, Mode::Instructions(OperationKind::RerollInstruct));
        type_str(&mut s, "darker");
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.mode, Mode::Browsing);
        assert_eq!(s.status.as_deref(), Some("Reroll cancelled"));
        assert!(!s.jobs.is_busy());

        press(&mut s, key(KeyCode::Right));
        press(&mut s, key(KeyCode::Char('u')));
        assert_eq!(s.mode, Mode::Instructions(OperationKind::Custom));
        press(&mut s, key(KeyCode::Esc));
        assert_eq!(s.status.as_deref(), Some("Custom operation cancelled"));
        assert_eq!(s.doc.passage(0).unwrap().text, "one");
    }

    #[test]
    fn test_revert_from_menu() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["orig"], dir.path());
        let id = s.doc.passage(0).unwrap().id.clone();
        s.doc.update_text(&id, "changed", "fix", None);
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Right));
        press(&mut s, key(KeyCode::Char('v')));
        assert_eq!(s.doc.passage(0).unwrap().text, "orig");
        assert_eq!(s.status.as_deref(), Some("Reverted to original"));
    }

    #[test]
    fn test_delete_and_move_keep_selection_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["a", "b", "c"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        assert_eq!(s.selected, Some(2));

        press(&mut s, alt(KeyCode::Up));
        assert_eq!(s.selected, Some(1));
        assert_eq!(s.doc.passage(1).unwrap().text, "c");

        press(&mut s, key(KeyCode::Delete));
        assert_eq!(s.doc.len(), 2);
        assert_eq!(s.selected, Some(1));
        press(&mut s, key(KeyCode::Delete));
        press(&mut s, key(KeyCode::Delete));
        assert!(s.doc.is_empty());
        assert_eq!(s.selected, None);
        for (i, p) in s.doc.passages().iter().enumerate() {
            assert_eq!(p.rank, i);
        }
    }

    #[test]
    fn test_quit_when_clean() {
        let mut s = state();
        assert!(!press(&mut s, ctrl('q')));
    }

    #[test]
    fn test_quit_when_modified_asks() {
        let mut s = state();
        s.doc.add_pending_passage("x");
        assert!(press(&mut s, ctrl('q')));
        assert_eq!(s.mode, Mode::ConfirmQuit);
        press(&mut s, key(KeyCode::Char('c')));
        assert_eq!(s.mode, Mode::Composing);

        press(&mut s, ctrl('q'));
        assert!(!press(&mut s, key(KeyCode::Char('n'))));
    }

    #[test]
    fn test_save_prompts_for_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state_with(Document::new("t"), dir.path().join("works"));
        s.doc.add_pending_passage("x");

        press(&mut s, ctrl('s'));
        assert_eq!(s.mode, Mode::SaveAs { then_quit: false });
        type_str(&mut s, "chapter");
        press(&mut s, key(KeyCode::Enter));

        let expected = dir.path().join("works").join("chapter.json");
        assert!(expected.exists());
        assert_eq!(s.mode, Mode::Composing);
        assert!(!s.doc.is_modified());
        assert_eq!(s.status.as_deref(), Some("Saved: chapter.json"));

        // Known path: no prompt the second time.
        s.doc.add_pending_passage("y");
        press(&mut s, ctrl('s'));
        assert_eq!(s.mode, Mode::Composing);
        assert!(!s.doc.is_modified());
    }

    #[test]
    fn test_confirm_quit_yes_saves_then_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state_with(Document::new("t"), dir.path().to_path_buf());
        s.doc.add_pending_passage("x");
        press(&mut s, ctrl('q'));
        assert!(press(&mut s, key(KeyCode::Char('y'))));
        assert_eq!(s.mode, Mode::SaveAs { then_quit: true });
        assert!(!press(&mut s, key(KeyCode::Enter)));
        assert!(dir.path().join("document.json").exists());
    }

    #[test]
    fn test_failed_save_keeps_modified() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let mut s = state_with(Document::new("t"), blocker);
        s.doc.add_pending_passage("x");
        press(&mut s, ctrl('s'));
        press(&mut s, key(KeyCode::Enter));
        assert!(s.doc.is_modified());
        assert!(s.status.as_deref().unwrap().starts_with("Save failed"));
    }

    fn render_text(state: &mut AppState) -> String {
        use ratatui::backend::TestBackend;
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| render::draw(f, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_render_header_and_passages() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["The fox ran."], dir.path());
        let screen = render_text(&mut s);
        assert!(screen.contains("scribe"));
        assert!(screen.contains("[COMPOSE]"));
        assert!(screen.contains("The fox ran."));
        assert!(!screen.contains("t *"));

        s.doc.add_pending_passage("draft");
        let screen = render_text(&mut s);
        assert!(screen.contains("t *"));
    }

    #[test]
    fn test_render_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_state(&["one"], dir.path());
        press(&mut s, key(KeyCode::Tab));
        press(&mut s, key(KeyCode::Right));
        let screen = render_text(&mut s);
        assert!(screen.contains("Condense"));
        assert!(screen.contains("Revert"));

        assert!(screen.contains("[f] Fix"));
        assert!(screen.contains("[u] Custom"));

        press(&mut s, key(KeyCode::Esc));
        press(&mut s, key(KeyCode::Left));
        let screen = render_text(&mut s);
        assert!(screen.contains("[u] Reroll Unbounded"));
        assert!(screen.contains("[i] Reroll w/ Instructions"));

        s.mode = Mode::ConfirmQuit;
        assert!(render_text(&mut s).contains("Unsaved changes"));
    }

    #[test]
    fn test_menu_hotkeys_are_unique_letters_of_their_titles() {
        for side in [MenuSide::Left, MenuSide::Right] {
            let items = menu_items(side);
            let keys: std::collections::HashSet<char> = items.iter().map(|(_, k)| *k).collect();
            assert_eq!(keys.len(), items.len());
            for (kind, hotkey) in items {
                assert!(kind.title().to_lowercase().contains(*hotkey), "{hotkey} not in {}", kind.title());
            }
        }
    }

    #[test]
    fn test_render_tiny_terminal_does_not_panic() {
        use ratatui::backend::TestBackend;
        let mut s = state();
        s.doc.add_pending_passage("some words here");
        s.mode = Mode::EditingPassage;
        for (w, h) in [(1, 1), (5, 3), (20, 6)] {
            let mut terminal = Terminal::new(TestBackend::new(w, h)).unwrap();
            terminal.draw(|f| render::draw(f, &mut s)).unwrap();
        }
    }

    #[test]
    fn test_render_debug_pane_follows_newest_lines() {
        use crate::logging::{DEBUG_LOG_CAP, DebugLog, LogLine};
        use tracing::Level;

        let mut plain = state();
        assert!(!render_text(&mut plain).contains("Debug log"));

        let log = DebugLog::new(DEBUG_LOG_CAP);
        let mut s = state().with_debug_log(log.clone());
        assert!(render_text(&mut s).contains("no events yet"));

        for i in 0..50 {
            log.push(LogLine {
                time: "12:00:00".to_string(),
                level: if i == 49 { Level::WARN } else { Level::DEBUG },
                text: format!("event {i}"),
            });
        }
        let text = render_text(&mut s);
        assert!(text.contains("Debug log (50)"));
        assert!(text.contains("12:00:00 WARN  event 49"));
        assert!(text.contains("event 30"));
        assert!(!text.contains("event 0 "));
        // Main view still draws in the remaining columns.
        assert!(text.contains("scribe"));

        for (w, h) in [(1, 1), (6, 3)] {
            let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(w, h)).unwrap();
            terminal.draw(|f| render::draw(f, &mut s)).unwrap();
        }
    }

    #[test]
    fn test_paste_goes_to_active_buffer() {
        let mut s = state();
        handle_paste(&mut s, "line one\rline two\r\nline three");
        assert_eq!(s.compose.text(), "line one\nline two\nline three");
        s.open_prompt(Mode::SaveAs { then_quit: false }, "");
        handle_paste(&mut s, "a\nb\r\nc\rd");
        assert_eq!(s.prompt.text(), "a b c d");
    }
}
