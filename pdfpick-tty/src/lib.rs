//! Terminal presentation: kitty image output, layout and input mapping.

use std::io::{self, Write};

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use pdfpick_core::Command;

pub mod grid;
pub mod kitty;
pub mod layout;
pub mod paint;

pub use grid::ThumbnailGrid;
pub use kitty::{DrawParams, KittyRenderer};
pub use layout::{FrameView, Highlights, TerminalLayout};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    /// Pointer moved over a cell.
    Hover { column: u16, row: u16 },
    /// Left click on a cell.
    Click { column: u16, row: u16 },
    Resize { columns: u16, rows: u16 },
    SelectNext,
    SelectPrev,
    ClearSelection,
    SaveSelected,
    ExtractAll,
    OpenOutline,
    CloseOverlay,
    OutlineMoveSelection { delta: isize },
    OutlineActivateSelection,
    OpenThumbnails,
    /// Moves the thumbnail selection by cells (`dx`) and rows (`dy`).
    ThumbnailMove { dx: i32, dy: i32 },
    ThumbnailActivate,
    /// Decode the selected image and show it on its own.
    PreviewImage,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Outline,
    Thumbnails,
    Preview,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub const PAN_STEP: f32 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Mouse(mouse) => self.map_mouse(mouse),
            Event::Key(key) => match self.mode {
                InputMode::Normal => self.map_key_normal(key),
                InputMode::Outline => self.map_key_outline(key),
                InputMode::Thumbnails => self.map_key_thumbnails(key),
                InputMode::Preview => self.map_key_preview(key),
            },
            _ => UiEvent::None,
        }
    }

    fn map_mouse(&mut self, mouse: MouseEvent) -> UiEvent {
        let (column, row) = (mouse.column, mouse.row);
        match (self.mode, mouse.kind) {
            (InputMode::Normal, _) => {}
            (InputMode::Thumbnails, MouseEventKind::Down(MouseButton::Left)) => {
                return UiEvent::Click { column, row };
            }
            _ => return UiEvent::None,
        }
        match mouse.kind {
            MouseEventKind::Moved => UiEvent::Hover { column, row },
            MouseEventKind::Down(MouseButton::Left) => UiEvent::Click { column, row },
            MouseEventKind::ScrollDown => UiEvent::Command(Command::ScrollBy {
                dx: 0.0,
                dy: Self::PAN_STEP,
            }),
            MouseEventKind::ScrollUp => UiEvent::Command(Command::ScrollBy {
                dx: 0.0,
                dy: -Self::PAN_STEP,
            }),
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Left, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(-Self::PAN_STEP, 0.0)
            }
            (KeyCode::Right, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(Self::PAN_STEP, 0.0)
            }
            (KeyCode::Up, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, -Self::PAN_STEP)
            }
            (KeyCode::Down, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, Self::PAN_STEP)
            }
            (KeyCode::Char('H'), KeyModifiers::SHIFT) | (KeyCode::Char('h'), KeyModifiers::NONE) => {
                self.pan(-Self::PAN_STEP, 0.0)
            }
            (KeyCode::Char('L'), KeyModifiers::SHIFT) | (KeyCode::Char('l'), KeyModifiers::NONE) => {
                self.pan(Self::PAN_STEP, 0.0)
            }
            (KeyCode::Char('K'), KeyModifiers::SHIFT) => self.pan(0.0, -Self::PAN_STEP),
            (KeyCode::Char('J'), KeyModifiers::SHIFT) => self.pan(0.0, Self::PAN_STEP),
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::PageDown, _)
            | (KeyCode::Char(' '), KeyModifiers::NONE) => {
                let count = self.take_count();
                UiEvent::Command(Command::NextPage { count })
            }
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::PageUp, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::PrevPage { count })
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                // `12g` jumps to page 12; a bare `g` to the first page.
                let page = self.pending_count.take().unwrap_or(1).saturating_sub(1);
                self.reset_count();
                UiEvent::Command(Command::GotoPage { page })
            }
            (KeyCode::Char('G'), KeyModifiers::SHIFT) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::Command(Command::GotoPage { page: usize::MAX })
            }
            (KeyCode::Char('+'), _) => {
                let steps = self.take_steps();
                UiEvent::Command(Command::ZoomStep { steps })
            }
            (KeyCode::Char('-'), _) => {
                let steps = self.take_steps();
                UiEvent::Command(Command::ZoomStep { steps: -steps })
            }
            (KeyCode::Char('='), _) => {
                self.reset_count();
                UiEvent::Command(Command::ResetZoom)
            }
            (KeyCode::Char('f'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::FitToWindow)
            }
            (KeyCode::Tab, _) => {
                self.reset_count();
                UiEvent::SelectNext
            }
            (KeyCode::BackTab, _) => {
                self.reset_count();
                UiEvent::SelectPrev
            }
            (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::ClearSelection
            }
            (KeyCode::Enter, _) | (KeyCode::Char('s'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::SaveSelected
            }
            (KeyCode::Char('a'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::ExtractAll
            }
            (KeyCode::Char('t'), _) | (KeyCode::Char('T'), _) => {
                self.reset_count();
                UiEvent::OpenOutline
            }
            (KeyCode::Char('p'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenThumbnails
            }
            (KeyCode::Char('v'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::PreviewImage
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_outline(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => UiEvent::CloseOverlay,
            (KeyCode::Char('t'), _) | (KeyCode::Char('T'), _) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) => UiEvent::OutlineActivateSelection,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::OutlineMoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::OutlineMoveSelection { delta: -1 }
            }
            (KeyCode::PageDown, _) => UiEvent::OutlineMoveSelection { delta: 10 },
            (KeyCode::PageUp, _) => UiEvent::OutlineMoveSelection { delta: -10 },
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_key_thumbnails(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('p'), KeyModifiers::NONE) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) => UiEvent::ThumbnailActivate,
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, KeyModifiers::NONE) => {
                UiEvent::ThumbnailMove { dx: -1, dy: 0 }
            }
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, KeyModifiers::NONE) => {
                UiEvent::ThumbnailMove { dx: 1, dy: 0 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::ThumbnailMove { dx: 0, dy: -1 }
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::ThumbnailMove { dx: 0, dy: 1 }
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_key_preview(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('v'), KeyModifiers::NONE) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) | (KeyCode::Char('s'), KeyModifiers::NONE) => {
                UiEvent::SaveSelected
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    /// Count as a zoom step count, saturating instead of wrapping.
    fn take_steps(&mut self) -> i32 {
        i32::try_from(self.take_count()).unwrap_or(i32::MAX)
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    fn pan(&mut self, dx: f32, dy: f32) -> UiEvent {
        let multiplier = self.take_count() as f32;
        UiEvent::Command(Command::ScrollBy {
            dx: dx * multiplier,
            dy: dy * multiplier,
        })
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse_event(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn event_mapper_uses_numeric_prefix_for_next_page() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('1'))),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('2'))),
            UiEvent::None
        ));

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::Command(Command::NextPage { count }) => assert_eq!(count, 12),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_resets_prefix_after_use() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('3')));

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::Command(Command::PrevPage { count }) => assert_eq!(count, 3),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::Command(Command::PrevPage { count }) => assert_eq!(count, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_drops_prefix_on_other_command() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('a'))),
            UiEvent::ExtractAll
        ));

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::Command(Command::NextPage { count }) => assert_eq!(count, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_pending_input_shows_digits_until_consumed() {
        let mut mapper = EventMapper::new();
        assert!(mapper.pending_input().is_none());
        mapper.map_event(key_event(KeyCode::Char('1')));
        mapper.map_event(key_event(KeyCode::Char('2')));
        assert_eq!(mapper.pending_input().as_deref(), Some("12"));

        mapper.map_event(key_event(KeyCode::Char('j')));
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn event_mapper_prefixed_g_jumps_to_that_page() {
        let mut mapper = EventMapper::new();
        match mapper.map_event(key_event(KeyCode::Char('g'))) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 0),
            other => panic!("unexpected event: {:?}", other),
        }

        mapper.map_event(key_event(KeyCode::Char('1')));
        mapper.map_event(key_event(KeyCode::Char('2')));
        match mapper.map_event(key_event(KeyCode::Char('g'))) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 11),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(mapper.pending_input().is_none());

        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Char('G'),
            KeyModifiers::SHIFT,
        )) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, usize::MAX),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_maps_zoom_keys() {
        let mut mapper = EventMapper::new();
        match mapper.map_event(key_event(KeyCode::Char('+'))) {
            UiEvent::Command(Command::ZoomStep { steps }) => assert_eq!(steps, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        mapper.map_event(key_event(KeyCode::Char('2')));
        match mapper.map_event(key_event(KeyCode::Char('-'))) {
            UiEvent::Command(Command::ZoomStep { steps }) => assert_eq!(steps, -2),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('='))),
            UiEvent::Command(Command::ResetZoom)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('f'))),
            UiEvent::Command(Command::FitToWindow)
        ));
    }

    #[test]
    fn event_mapper_huge_prefix_saturates_zoom_steps() {
        let mut mapper = EventMapper::new();
        for digit in "99999999999".chars() {
            mapper.map_event(key_event(KeyCode::Char(digit)));
        }
        match mapper.map_event(key_event(KeyCode::Char('+'))) {
            UiEvent::Command(Command::ZoomStep { steps }) => assert_eq!(steps, i32::MAX),
            other => panic!("unexpected event: {:?}", other),
        }

        for digit in "4294967297".chars() {
            mapper.map_event(key_event(KeyCode::Char(digit)));
        }
        match mapper.map_event(key_event(KeyCode::Char('-'))) {
            UiEvent::Command(Command::ZoomStep { steps }) => assert_eq!(steps, -i32::MAX),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_maps_ctrl_arrows_to_scrolling() {
        let mut mapper = EventMapper::new();

        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Right,
            KeyModifiers::CONTROL,
        )) {
            UiEvent::Command(Command::ScrollBy { dx, dy }) => {
                assert!((dx - EventMapper::PAN_STEP).abs() < f32::EPSILON);
                assert_eq!(dy, 0.0);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event_with_modifiers(KeyCode::Up, KeyModifiers::CONTROL)) {
            UiEvent::Command(Command::ScrollBy { dx, dy }) => {
                assert_eq!(dx, 0.0);
                assert!((dy + EventMapper::PAN_STEP).abs() < f32::EPSILON);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_numeric_prefix_scales_pan_distance() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('3')));
        match mapper.map_event(key_event(KeyCode::Char('l'))) {
            UiEvent::Command(Command::ScrollBy { dx, dy }) => {
                assert!((dx - 3.0 * EventMapper::PAN_STEP).abs() < f32::EPSILON);
                assert_eq!(dy, 0.0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_maps_selection_and_extraction_keys() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Tab)),
            UiEvent::SelectNext
        ));
        assert!(matches!(
            mapper.map_event(key_event_with_modifiers(KeyCode::BackTab, KeyModifiers::SHIFT)),
            UiEvent::SelectPrev
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::SaveSelected
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('s'))),
            UiEvent::SaveSelected
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::ClearSelection
        ));
    }

    #[test]
    fn event_mapper_maps_mouse_to_pointer_events() {
        let mut mapper = EventMapper::new();
        match mapper.map_event(mouse_event(MouseEventKind::Moved, 4, 7)) {
            UiEvent::Hover { column, row } => assert_eq!((column, row), (4, 7)),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 1, 2)) {
            UiEvent::Click { column, row } => assert_eq!((column, row), (1, 2)),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Right), 1, 2)),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::ScrollDown, 0, 0)),
            UiEvent::Command(Command::ScrollBy { .. })
        ));
    }

    #[test]
    fn event_mapper_ignores_mouse_in_outline_mode() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Outline);
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 1, 2)),
            UiEvent::None
        ));
    }

    #[test]
    fn event_mapper_reports_resizes() {
        let mut mapper = EventMapper::new();
        match mapper.map_event(Event::Resize(120, 40)) {
            UiEvent::Resize { columns, rows } => assert_eq!((columns, rows), (120, 40)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_maps_t_to_open_outline() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('t'))),
            UiEvent::OpenOutline
        ));
    }

    #[test]
    fn event_mapper_outline_mode_maps_navigation_keys() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Outline);

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::OutlineMoveSelection { delta } => assert_eq!(delta, 1),
            other => panic!("unexpected event: {:?}", other),
        }

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::OutlineMoveSelection { delta } => assert_eq!(delta, -1),
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::OutlineActivateSelection
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::CloseOverlay
        ));
    }

    #[test]
    fn event_mapper_opens_thumbnails_and_preview() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('p'))),
            UiEvent::OpenThumbnails
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('v'))),
            UiEvent::PreviewImage
        ));
    }

    #[test]
    fn event_mapper_thumbnail_mode_moves_by_cells_and_rows() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Thumbnails);

        let moves = [
            (KeyCode::Char('h'), (-1, 0)),
            (KeyCode::Right, (1, 0)),
            (KeyCode::Char('k'), (0, -1)),
            (KeyCode::Down, (0, 1)),
        ];
        for (code, expected) in moves {
            match mapper.map_event(key_event(code)) {
                UiEvent::ThumbnailMove { dx, dy } => assert_eq!((dx, dy), expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::ThumbnailActivate
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('p'))),
            UiEvent::CloseOverlay
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('q'))),
            UiEvent::Quit
        ));
    }

    #[test]
    fn event_mapper_thumbnail_mode_takes_clicks_only() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Thumbnails);
        match mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 9, 3)) {
            UiEvent::Click { column, row } => assert_eq!((column, row), (9, 3)),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Moved, 9, 3)),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::ScrollDown, 9, 3)),
            UiEvent::None
        ));
    }

    #[test]
    fn event_mapper_preview_mode_saves_or_closes() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Preview);
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('s'))),
            UiEvent::SaveSelected
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::SaveSelected
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('v'))),
            UiEvent::CloseOverlay
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::None
        ));
        assert!(matches!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 1, 1)),
            UiEvent::None
        ));
    }

    #[test]
    fn event_mapper_switching_modes_clears_pending_count() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('1')));
        assert_eq!(mapper.pending_input().as_deref(), Some("1"));

        mapper.set_mode(InputMode::Outline);
        assert!(mapper.pending_input().is_none());
        mapper.set_mode(InputMode::Normal);
        assert!(mapper.pending_input().is_none());
    }
}
