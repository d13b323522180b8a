use crate::error::{Result, ViewerError};
use crate::io::config::WindowConfig;
use crate::ui::frontend::Frontend;
use crate::ui::input::{InputEvent, Key, MouseButton};
use minifb::{KeyRepeat, MouseMode, Window, WindowOptions};

/// A `minifb` window. minifb is polled, so button, cursor and size changes
/// are turned into events by comparing against the previous frame.
pub struct WindowFrontend {
    window: Window,
    size: (usize, usize),
    cursor: Option<(f32, f32)>,
    left_down: bool,
    right_down: bool,
}

impl WindowFrontend {
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut window = Window::new(
            &config.title,
            config.width,
            config.height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| ViewerError::Window(e.to_string()))?;
        window.set_target_fps(config.target_fps);

        Ok(Self {
            window,
            size: (config.width, config.height),
            cursor: None,
            left_down: false,
            right_down: false,
        })
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn button_edge(&mut self, button: MouseButton, events: &mut Vec<InputEvent>) {
        let down = self.window.get_mouse_down(match button {
            MouseButton::Left => minifb::MouseButton::Left,
            MouseButton::Right => minifb::MouseButton::Right,
            MouseButton::Middle => minifb::MouseButton::Middle,
        });
        let was_down = match button {
            MouseButton::Left => &mut self.left_down,
            MouseButton::Right => &mut self.right_down,
            MouseButton::Middle => return,
        };
        if down != *was_down {
            *was_down = down;
            events.push(InputEvent::Button {
                button,
                pressed: down,
            });
        }
    }
}

fn to_minifb(key: Key) -> minifb::Key {
    match key {
        Key::W => minifb::Key::W,
        Key::A => minifb::Key::A,
        Key::S => minifb::Key::S,
        Key::D => minifb::Key::D,
        Key::Space => minifb::Key::Space,
        Key::LeftShift => minifb::Key::LeftShift,
        Key::Q => minifb::Key::Q,
        Key::Escape => minifb::Key::Escape,
    }
}

fn from_minifb(key: minifb::Key) -> Option<Key> {
    match key {
        minifb::Key::Q => Some(Key::Q),
        minifb::Key::Escape => Some(Key::Escape),
        _ => None,
    }
}

impl Frontend for WindowFrontend {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();

        if !self.window.is_open() {
            events.push(InputEvent::CloseRequested);
            return events;
        }

        let size = self.window.get_size();
        if size != self.size {
            self.size = size;
            events.push(InputEvent::Resize {
                width: size.0,
                height: size.1,
            });
        }

        // Button edges before the move, so a press starts a fresh sample.
        self.button_edge(MouseButton::Left, &mut events);
        self.button_edge(MouseButton::Right, &mut events);

        if let Some((x, y)) = self.window.get_mouse_pos(MouseMode::Pass)
            && self.cursor != Some((x, y))
        {
            self.cursor = Some((x, y));
            events.push(InputEvent::PointerMove { x, y });
        }

        if let Some((_, dy)) = self.window.get_scroll_wheel()
            && dy != 0.0
        {
            events.push(InputEvent::Scroll { dy });
        }

        events.extend(
            self.window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .filter_map(from_minifb)
                .map(InputEvent::KeyPressed),
        );

        events
    }

    fn is_key_down(&self, key: Key) -> bool {
        self.window.is_key_down(to_minifb(key))
    }

    fn present(&mut self, frame: &[u32], width: usize, height: usize) -> Result<()> {
        self.window
            .update_with_buffer(frame, width, height)
            .map_err(|e| ViewerError::Window(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }
}
