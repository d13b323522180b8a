use crate::scene::camera::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Space,
    LeftShift,
    Q,
    Escape,
}

impl Key {
    /// Keys polled once per frame for camera movement.
    pub const MOVEMENT: [Key; 6] = [Key::W, Key::S, Key::A, Key::D, Key::Space, Key::LeftShift];

    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::W => Some(Direction::Forward),
            Key::S => Some(Direction::Backward),
            Key::A => Some(Direction::Left),
            Key::D => Some(Direction::Right),
            Key::Space => Some(Direction::Up),
            Key::LeftShift => Some(Direction::Down),
            Key::Q | Key::Escape => None,
        }
    }

    pub fn closes_viewer(self) -> bool {
        matches!(self, Key::Q | Key::Escape)
    }
}

/// Events a frontend delivers to the viewer loop, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Cursor position in window pixels.
    PointerMove { x: f32, y: f32 },
    Button { button: MouseButton, pressed: bool },
    Scroll { dy: f32 },
    KeyPressed(Key),
    Resize { width: usize, height: usize },
    CloseRequested,
}

/// What a pointer move asks the camera to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragAction {
    Rotate { dx: f32, dy: f32 },
    Pan { dx: f32, dy: f32 },
}

/// Mouse-drag state machine: left drag rotates, right drag pans.
///
/// The first move after a press only records the cursor, so a drag never
/// starts with a jump from wherever the cursor was last seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDragState {
    left_down: bool,
    right_down: bool,
    last_cursor: (f32, f32),
    has_last_sample: bool,
}

impl InputDragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.left_down || self.right_down
    }

    pub fn has_last_sample(&self) -> bool {
        self.has_last_sample
    }

    pub fn last_cursor(&self) -> (f32, f32) {
        self.last_cursor
    }

    pub fn button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.left_down = pressed,
            MouseButton::Right => self.right_down = pressed,
            MouseButton::Middle => return,
        }

        if pressed {
            self.has_last_sample = false;
        } else if !self.is_dragging() {
            self.has_last_sample = false;
            self.last_cursor = (0.0, 0.0);
        }
    }

    /// Returns the camera action for a cursor move, if any. Left wins when
    /// both buttons are held.
    pub fn pointer_moved(&mut self, x: f32, y: f32) -> Option<DragAction> {
        if !self.is_dragging() {
            return None;
        }

        let dx = x - self.last_cursor.0;
        let dy = y - self.last_cursor.1;
        self.last_cursor = (x, y);

        if !self.has_last_sample {
            self.has_last_sample = true;
            return None;
        }

        if self.left_down {
            Some(DragAction::Rotate { dx, dy })
        } else {
            Some(DragAction::Pan { dx, dy })
        }
    }
}
