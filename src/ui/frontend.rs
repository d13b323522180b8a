use crate::error::Result;
use crate::ui::input::{InputEvent, Key};

/// Where input comes from and finished frames go.
pub trait Frontend {
    /// Drains the events that arrived since the last call.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    fn is_key_down(&self, key: Key) -> bool;

    /// Shows a finished frame (opaque ARGB pixels, row-major). May block until
    /// the display is ready for the next one.
    fn present(&mut self, frame: &[u32], width: usize, height: usize) -> Result<()>;

    fn is_open(&self) -> bool;
}
