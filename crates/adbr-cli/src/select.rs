//! Interactive multi-select prompt
//!
//! Draws a checklist under a prompt and lets the user toggle entries with
//! the keyboard. Key handling lives in [`MultiSelect`], apart from the
//! terminal, so it can be tested without one.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, Stylize};
use crossterm::tty::IsTty;
use crossterm::{cursor, queue, terminal};

/// One row of the checklist
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub label: String,
    /// Dimmed text shown after the label
    pub hint: String,
    /// Initially checked
    pub checked: bool,
}

/// Effect of a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Submit,
    Cancel,
}

/// Cursor and check state of a checklist
#[derive(Debug, Clone)]
pub struct MultiSelect {
    cursor: usize,
    checked: Vec<bool>,
}

impl MultiSelect {
    pub fn new(checked: Vec<bool>) -> Self {
        Self { cursor: 0, checked }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.checked.get(index).copied().unwrap_or(false)
    }

    /// Indices of checked rows, in order
    pub fn selected(&self) -> Vec<usize> {
        (0..self.checked.len()).filter(|&i| self.checked[i]).collect()
    }

    pub fn handle(&mut self, key: KeyEvent) -> Step {
        let len = self.checked.len();
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Step::Cancel,
            KeyCode::Esc | KeyCode::Char('q') => Step::Cancel,
            KeyCode::Enter => Step::Submit,
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                self.cursor = (self.cursor + len - 1) % len;
                Step::Continue
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab if len > 0 => {
                self.cursor = (self.cursor + 1) % len;
                Step::Continue
            }
            KeyCode::Char(' ') if len > 0 => {
                self.checked[self.cursor] = !self.checked[self.cursor];
                Step::Continue
            }
            KeyCode::Char('a') => {
                let all = self.checked.iter().all(|c| *c);
                self.checked.iter_mut().for_each(|c| *c = !all);
                Step::Continue
            }
            _ => Step::Continue,
        }
    }
}

/// Ask the user to pick any number of `items`.
///
/// Returns the checked indices, or `None` if the prompt was cancelled.
pub fn multi_select(prompt: &str, items: &[SelectItem]) -> io::Result<Option<Vec<usize>>> {
    let mut out = io::stdout();
    if !io::stdin().is_tty() || !out.is_tty() {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "device selection needs an interactive terminal",
        ));
    }

    let mut state = MultiSelect::new(items.iter().map(|i| i.checked).collect());

    terminal::enable_raw_mode()?;
    let result = run(&mut out, prompt, items, &mut state);
    let _ = queue!(out, cursor::Show);
    let _ = out.flush();
    terminal::disable_raw_mode()?;
    result
}

fn run(
    out: &mut impl Write,
    prompt: &str,
    items: &[SelectItem],
    state: &mut MultiSelect,
) -> io::Result<Option<Vec<usize>>> {
    queue!(out, cursor::Hide)?;
    draw(out, prompt, items, state)?;

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let step = state.handle(key);
        erase(out, items.len())?;
        match step {
            Step::Continue => draw(out, prompt, items, state)?,
            Step::Submit => {
                let picked: Vec<&str> = state
                    .selected()
                    .into_iter()
                    .map(|i| items[i].label.as_str())
                    .collect();
                finish(out, prompt, &picked.join(", "))?;
                return Ok(Some(state.selected()));
            }
            Step::Cancel => {
                finish(out, prompt, "cancelled")?;
                return Ok(None);
            }
        }
    }
}

fn draw(
    out: &mut impl Write,
    prompt: &str,
    items: &[SelectItem],
    state: &MultiSelect,
) -> io::Result<()> {
    queue!(
        out,
        Print("? ".green()),
        Print(prompt.bold()),
        Print(" › Space to select, a to toggle all, Return to submit".dark_grey()),
        Print("\r\n")
    )?;

    for (i, item) in items.iter().enumerate() {
        let pointer = if i == state.cursor() { "❯ ".cyan() } else { "  ".reset() };
        let mark = if state.is_checked(i) { "◉ ".green() } else { "◯ ".reset() };
        let label = if i == state.cursor() {
            item.label.as_str().cyan().underlined()
        } else {
            item.label.as_str().reset()
        };
        queue!(
            out,
            Print(pointer),
            Print(mark),
            Print(label),
            Print(format!(" - {}", item.hint).dark_grey()),
            Print("\r\n")
        )?;
    }
    out.flush()
}

/// Move back over the prompt line and `rows` item lines and clear them
fn erase(out: &mut impl Write, rows: usize) -> io::Result<()> {
    let lines = u16::try_from(rows + 1).unwrap_or(u16::MAX);
    queue!(
        out,
        cursor::MoveUp(lines),
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::FromCursorDown)
    )
}

fn finish(out: &mut impl Write, prompt: &str, answer: &str) -> io::Result<()> {
    queue!(
        out,
        Print("✔ ".green()),
        Print(prompt.bold()),
        Print(" › "),
        Print(answer),
        Print("\r\n")
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_starts_with_given_checks() {
        let state = MultiSelect::new(vec![false, true, false]);
        assert_eq!(state.selected(), vec![1]);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut state = MultiSelect::new(vec![false; 3]);
        state.handle(key(KeyCode::Up));
        assert_eq!(state.cursor(), 2);
        state.handle(key(KeyCode::Char('j')));
        assert_eq!(state.cursor(), 0);
        state.handle(key(KeyCode::Down));
        state.handle(key(KeyCode::Char('k')));
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_space_toggles_current_row() {
        let mut state = MultiSelect::new(vec![true, false]);
        state.handle(key(KeyCode::Char(' ')));
        state.handle(key(KeyCode::Down));
        state.handle(key(KeyCode::Char(' ')));
        assert_eq!(state.selected(), vec![1]);
    }

    #[test]
    fn test_toggle_all() {
        let mut state = MultiSelect::new(vec![true, false]);
        state.handle(key(KeyCode::Char('a')));
        assert_eq!(state.selected(), vec![0, 1]);
        state.handle(key(KeyCode::Char('a')));
        assert!(state.selected().is_empty());
    }

    #[test]
    fn test_submit_and_cancel_keys() {
        let mut state = MultiSelect::new(vec![false]);
        assert_eq!(state.handle(key(KeyCode::Enter)), Step::Submit);
        assert_eq!(state.handle(key(KeyCode::Esc)), Step::Cancel);
        assert_eq!(state.handle(key(KeyCode::Char('q'))), Step::Cancel);
        assert_eq!(
            state.handle(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Step::Cancel
        );
    }

    #[test]
    fn test_empty_list_ignores_movement() {
        let mut state = MultiSelect::new(Vec::new());
        assert_eq!(state.handle(key(KeyCode::Down)), Step::Continue);
        assert_eq!(state.handle(key(KeyCode::Char(' '))), Step::Continue);
        assert!(state.selected().is_empty());
    }
}
