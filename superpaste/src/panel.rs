//! History panel controller
//!
//! Owns the visible list, the query and the selection machine, and carries out
//! the machine's commands against the store, the host actions and the search
//! input focus.

use crate::interface::{
    ActionService, ClipboardItem, FocusControl, StoreEvent, SuperPasteError, SuperPasteResult,
};
use crate::selection::{Command, Key, Mode, SelectionMachine};
use crate::store::ClipboardStore;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

pub struct PanelController<F: FocusControl> {
    store: Arc<ClipboardStore>,
    actions: Arc<dyn ActionService>,
    focus: F,
    machine: SelectionMachine,
    query: String,
    items: Vec<ClipboardItem>,
    limit: usize,
}

impl<F: FocusControl> PanelController<F> {
    pub fn new(
        store: Arc<ClipboardStore>,
        actions: Arc<dyn ActionService>,
        focus: F,
        limit: usize,
    ) -> Self {
        Self {
            store,
            actions,
            focus,
            machine: SelectionMachine::new(),
            query: String::new(),
            items: Vec::new(),
            limit,
        }
    }

    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    pub fn focus(&self) -> &F {
        &self.focus
    }

    /// Reload the visible list for the current query
    pub fn refresh(&mut self) -> SuperPasteResult<()> {
        self.items = self.store.search(&self.query, self.limit)?;
        Ok(())
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> SuperPasteResult<()> {
        self.query = query.into();
        self.refresh()
    }

    /// Drain pending store notifications and reload once if anything changed.
    /// Returns whether a reload happened.
    pub fn sync(&mut self, events: &mut broadcast::Receiver<StoreEvent>) -> SuperPasteResult<bool> {
        let mut changed = false;
        loop {
            match events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if changed {
            self.refresh()?;
        }
        Ok(changed)
    }

    pub fn handle_key(&mut self, key: Key) -> SuperPasteResult<()> {
        if self.focus.is_focused() {
            self.machine.search_focused();
        }
        let commands = self.machine.handle_key(key, self.items.len());
        self.execute(commands)
    }

    pub fn click(&mut self, index: usize) -> SuperPasteResult<()> {
        let commands = self.machine.click(index, self.items.len());
        self.execute(commands)
    }

    /// The global hotkey fired: show the window and start a fresh search
    pub fn summon(&mut self) -> SuperPasteResult<()> {
        self.actions.show_window()?;
        self.panel_shown()
    }

    /// The host showed the panel
    pub fn panel_shown(&mut self) -> SuperPasteResult<()> {
        let commands = self.machine.panel_shown();
        self.execute(commands)
    }

    /// The panel window lost focus
    pub fn focus_lost(&mut self) -> SuperPasteResult<()> {
        let commands = self.machine.focus_lost();
        self.execute(commands)
    }

    /// Run commands in order. The first failure stops the rest.
    fn execute(&mut self, commands: Vec<Command>) -> SuperPasteResult<()> {
        for command in commands {
            match command {
                Command::FocusSearch => self.focus.request_focus(),
                Command::BlurSearch => self.focus.request_blur(),
                Command::ClearQuery => self.set_query(String::new())?,
                Command::Copy(index) => self.copy_item(index)?,
                Command::HidePanel => self.actions.hide_window()?,
                Command::Paste => {
                    // The copy already happened and stays
                    if let Err(e) = self.actions.paste() {
                        tracing::warn!(error = %e, "Paste failed");
                    }
                }
                Command::Delete(index) => self.delete_item(index)?,
                Command::PassThrough => {}
            }
        }
        Ok(())
    }

    fn copy_item(&self, index: usize) -> SuperPasteResult<()> {
        let item = self
            .items
            .get(index)
            .ok_or_else(|| SuperPasteError::NotFound(format!("no item at index {}", index)))?;
        let content = item
            .clipboard_content()
            .ok_or(SuperPasteError::MissingContent(item.id))?;

        self.actions.copy_to_clipboard(content, item.content_type)?;
        if !self.store.touch(&item.content_hash)? {
            tracing::debug!(item_id = item.id, "Copied item no longer stored");
        }
        Ok(())
    }

    fn delete_item(&mut self, index: usize) -> SuperPasteResult<()> {
        let item = match self.items.get(index) {
            Some(item) => item.clone(),
            None => return Ok(()),
        };
        self.store.remove(&item)?;
        self.refresh()?;

        let follow_up = self.machine.item_deleted(index, self.items.len());
        self.execute(follow_up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{ActionError, CapturePayload, ContentType};
    use parking_lot::Mutex;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingActions {
        calls: Mutex<Vec<String>>,
        fail_copy: bool,
        fail_paste: bool,
    }

    impl RecordingActions {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl ActionService for RecordingActions {
        fn copy_to_clipboard(&self, content: &str, content_type: ContentType) -> Result<(), ActionError> {
            if self.fail_copy {
                return Err(ActionError::new("copy_to_clipboard", "clipboard busy"));
            }
            self.calls
                .lock()
                .push(format!("copy:{}:{}", content_type.database_type(), content));
            Ok(())
        }

        fn paste(&self) -> Result<(), ActionError> {
            self.calls.lock().push("paste".to_string());
            if self.fail_paste {
                return Err(ActionError::new("paste", "no accessibility permission"));
            }
            Ok(())
        }

        fn hide_window(&self) -> Result<(), ActionError> {
            self.calls.lock().push("hide".to_string());
            Ok(())
        }

        fn show_window(&self) -> Result<(), ActionError> {
            self.calls.lock().push("show".to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFocus {
        focused: Cell<bool>,
        log: RefCell<Vec<&'static str>>,
    }

    impl FocusControl for FakeFocus {
        fn request_focus(&self) {
            self.focused.set(true);
            self.log.borrow_mut().push("focus");
        }

        fn request_blur(&self) {
            self.focused.set(false);
            self.log.borrow_mut().push("blur");
        }

        fn is_focused(&self) -> bool {
            self.focused.get()
        }
    }

    fn panel_with(
        texts: &[&str],
        actions: Arc<RecordingActions>,
    ) -> (PanelController<FakeFocus>, Arc<ClipboardStore>) {
        let store = Arc::new(ClipboardStore::new_in_memory().unwrap());
        for text in texts {
            store.upsert(&CapturePayload::text(*text, None)).unwrap();
        }
        let mut panel = PanelController::new(store.clone(), actions, FakeFocus::default(), 100);
        panel.panel_shown().unwrap();
        (panel, store)
    }

    fn visible(panel: &PanelController<FakeFocus>) -> Vec<String> {
        panel
            .items()
            .iter()
            .map(|i| i.text_content.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_panel_shown_lists_and_focuses() {
        let (panel, _store) = panel_with(&["a", "b"], Arc::default());
        assert_eq!(visible(&panel), vec!["b", "a"]);
        assert!(panel.focus().is_focused());
        assert_eq!(*panel.focus().log.borrow(), vec!["focus"]);
        assert_eq!(panel.mode(), Mode::Search);
    }

    #[test]
    fn test_summon_shows_window_and_clears_query() {
        let actions = Arc::new(RecordingActions::default());
        let (mut panel, _store) = panel_with(&["keep", "other"], actions.clone());
        panel.set_query("kee").unwrap();
        panel.handle_key(Key::ArrowDown).unwrap();

        panel.summon().unwrap();

        assert_eq!(actions.calls(), vec!["show"]);
        assert_eq!(panel.query(), "");
        assert_eq!(panel.items().len(), 2);
        assert_eq!(panel.mode(), Mode::Search);
    }

    #[test]
    fn test_enter_copies_touches_hides_and_pastes() {
        let actions = Arc::new(RecordingActions::default());
        let (mut panel, store) = panel_with(&["first", "second"], actions.clone());

        panel.handle_key(Key::ArrowDown).unwrap();
        panel.handle_key(Key::ArrowRight).unwrap();
        panel.handle_key(Key::Enter).unwrap();

        assert_eq!(actions.calls(), vec!["copy:text:first", "hide", "paste"]);
        let top = &store.list(1).unwrap()[0];
        assert_eq!(top.text_content.as_deref(), Some("first"));
    }

    #[test]
    fn test_paste_failure_is_not_an_error() {
        let actions = Arc::new(RecordingActions {
            fail_paste: true,
            ..Default::default()
        });
        let (mut panel, _store) = panel_with(&["x"], actions.clone());

        panel.handle_key(Key::ArrowDown).unwrap();
        assert!(panel.handle_key(Key::Enter).is_ok());
        assert_eq!(actions.calls(), vec!["copy:text:x", "hide", "paste"]);
    }

    #[test]
    fn test_copy_failure_stops_before_hide() {
        let actions = Arc::new(RecordingActions {
            fail_copy: true,
            ..Default::default()
        });
        let (mut panel, store) = panel_with(&["old", "new"], actions.clone());

        panel.handle_key(Key::ArrowDown).unwrap();
        panel.handle_key(Key::ArrowRight).unwrap();
        let err = panel.handle_key(Key::CopyShortcut).unwrap_err();

        assert!(matches!(err, SuperPasteError::Action(_)));
        assert!(actions.calls().is_empty());
        assert_eq!(store.list(1).unwrap()[0].text_content.as_deref(), Some("new"));
    }

    #[test]
    fn test_typing_filters_and_arrow_down_blurs() {
        let (mut panel, _store) = panel_with(&["apple", "banana", "apricot"], Arc::default());

        panel.set_query("ap").unwrap();
        assert_eq!(visible(&panel), vec!["apricot", "apple"]);

        panel.handle_key(Key::Other).unwrap();
        assert_eq!(panel.mode(), Mode::Search);

        panel.handle_key(Key::ArrowDown).unwrap();
        assert_eq!(panel.mode(), Mode::Browse(0));
        assert!(!panel.focus().is_focused());
    }

    #[test]
    fn test_delete_last_card_moves_selection_then_returns_to_search() {
        let (mut panel, store) = panel_with(&["a", "b"], Arc::default());

        panel.handle_key(Key::ArrowDown).unwrap();
        panel.handle_key(Key::ArrowRight).unwrap();
        panel.handle_key(Key::Delete).unwrap();
        assert_eq!(visible(&panel), vec!["b"]);
        assert_eq!(panel.mode(), Mode::Browse(0));

        panel.handle_key(Key::Backspace).unwrap();
        assert!(panel.items().is_empty());
        assert_eq!(panel.mode(), Mode::Search);
        assert!(panel.focus().is_focused());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_clicking_search_input_ends_browse() {
        let (mut panel, _store) = panel_with(&["a", "b"], Arc::default());
        panel.handle_key(Key::ArrowDown).unwrap();

        panel.focus().focused.set(true);
        panel.handle_key(Key::Backspace).unwrap();

        assert_eq!(panel.mode(), Mode::Search);
        assert_eq!(panel.items().len(), 2);
    }

    #[test]
    fn test_sync_reloads_after_capture() {
        let (mut panel, store) = panel_with(&["a"], Arc::default());
        let mut events = store.subscribe();
        assert!(!panel.sync(&mut events).unwrap());

        store.upsert(&CapturePayload::text("b", None)).unwrap();
        assert!(panel.sync(&mut events).unwrap());
        assert_eq!(visible(&panel), vec!["b", "a"]);
    }

    #[test]
    fn test_focus_lost_hides() {
        let actions = Arc::new(RecordingActions::default());
        let (mut panel, _store) = panel_with(&[], actions.clone());
        panel.focus_lost().unwrap();
        assert_eq!(actions.calls(), vec!["hide"]);
    }
}
