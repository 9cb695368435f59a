use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    Space,
    LeftShift,
    LeftControl,
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keyboard and mouse state fed by the window layer and read by controllers.
#[derive(Default, Debug, Clone)]
pub struct InputState {
    /// Cursor position inside the window
    pub cursor_position: Vec2,
    /// Cursor movement accumulated since the last `end_frame`
    pub cursor_delta: Vec2,
    /// Scroll accumulated since the last `end_frame`
    pub scroll_delta: Vec2,
    keys: FxHashSet<Key>,
    mouse_buttons: FxHashSet<MouseButton>,
}

/// Input shared between the window layer and components.
pub type SharedInput = Arc<RwLock<InputState>>;

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedInput {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Clears per-frame deltas.
    pub fn end_frame(&mut self) {
        self.cursor_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
    }

    pub fn update_mouse_position(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        self.cursor_delta += position - self.cursor_position;
        self.cursor_position = position;
    }

    pub fn update_mouse_scroll(&mut self, dx: f32, dy: f32) {
        self.scroll_delta += Vec2::new(dx, dy);
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            self.keys.insert(key);
        } else {
            self.keys.remove(&key);
        }
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.mouse_buttons.insert(button);
        } else {
            self.mouse_buttons.remove(&button);
        }
    }

    #[must_use]
    pub fn key_down(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    #[must_use]
    pub fn mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    #[must_use]
    pub fn mouse_dx(&self) -> f32 {
        self.cursor_delta.x
    }

    #[must_use]
    pub fn mouse_dy(&self) -> f32 {
        self.cursor_delta.y
    }

    #[must_use]
    pub fn scroll_dy(&self) -> f32 {
        self.scroll_delta.y
    }
}
