//! Keyboard selection state machine for the history panel
//!
//! Pure state: every event takes the current list length and returns the
//! commands the panel must carry out, in order. Nothing here touches the
//! store or the window.

/// Where keyboard input goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The search input has focus; text editing is handled by the input itself
    Search,
    /// A card is selected
    Browse(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Enter,
    /// Platform copy chord (Cmd+C / Ctrl+C)
    CopyShortcut,
    Delete,
    Backspace,
    Escape,
    /// Anything else, usually text for the search input
    Other,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    FocusSearch,
    BlurSearch,
    ClearQuery,
    /// Put the item at this index on the clipboard and resurface it
    Copy(usize),
    /// Paste into the previously focused application
    Paste,
    HidePanel,
    /// Delete the item at this index, then report back via `item_deleted`
    Delete(usize),
    /// Let the search input handle the key
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMachine {
    mode: Mode,
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self { mode: Mode::Search }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Selected index, if browsing
    pub fn selected(&self) -> Option<usize> {
        match self.mode {
            Mode::Browse(i) => Some(i),
            Mode::Search => None,
        }
    }

    /// Handle a key press with `len` items currently listed.
    ///
    /// The browse index is not re-clamped when the list changes underneath it;
    /// an index past the end simply selects nothing until a clamping move.
    pub fn handle_key(&mut self, key: Key, len: usize) -> Vec<Command> {
        if key == Key::Escape {
            return vec![Command::HidePanel];
        }

        match self.mode {
            Mode::Search => match key {
                Key::ArrowDown if len > 0 => {
                    self.mode = Mode::Browse(0);
                    vec![Command::BlurSearch]
                }
                Key::ArrowDown => Vec::new(),
                _ => vec![Command::PassThrough],
            },
            Mode::Browse(i) => self.handle_browse_key(i, key, len),
        }
    }

    fn handle_browse_key(&mut self, i: usize, key: Key, len: usize) -> Vec<Command> {
        match key {
            Key::ArrowUp => self.enter_search(),
            Key::ArrowLeft | Key::ArrowRight => {
                if len == 0 {
                    return self.enter_search();
                }
                let next = match key {
                    Key::ArrowLeft => i.saturating_sub(1),
                    _ => i.saturating_add(1),
                };
                self.mode = Mode::Browse(next.min(len - 1));
                Vec::new()
            }
            Key::Enter if i < len => vec![Command::Copy(i), Command::HidePanel, Command::Paste],
            Key::CopyShortcut if i < len => vec![Command::Copy(i), Command::HidePanel],
            Key::Delete | Key::Backspace if i < len => vec![Command::Delete(i)],
            _ => Vec::new(),
        }
    }

    fn enter_search(&mut self) -> Vec<Command> {
        self.mode = Mode::Search;
        vec![Command::FocusSearch]
    }

    /// The item at `index` was deleted and `remaining` items are left
    pub fn item_deleted(&mut self, index: usize, remaining: usize) -> Vec<Command> {
        if remaining == 0 {
            return self.enter_search();
        }
        if let Mode::Browse(_) = self.mode {
            self.mode = Mode::Browse(index.min(remaining - 1));
        }
        Vec::new()
    }

    /// A card was clicked: select it and copy-and-paste it
    pub fn click(&mut self, index: usize, len: usize) -> Vec<Command> {
        if index >= len {
            return Vec::new();
        }
        self.mode = Mode::Browse(index);
        vec![Command::Copy(index), Command::HidePanel, Command::Paste]
    }

    /// The panel was summoned: start over in the search input
    pub fn panel_shown(&mut self) -> Vec<Command> {
        self.mode = Mode::Search;
        vec![Command::ClearQuery, Command::FocusSearch]
    }

    /// The window lost focus. Hiding is unconditional.
    pub fn focus_lost(&self) -> Vec<Command> {
        vec![Command::HidePanel]
    }

    /// The search input gained focus outside of the machine (e.g. a click).
    /// Browsing ends without further commands.
    pub fn search_focused(&mut self) {
        self.mode = Mode::Search;
    }
}
