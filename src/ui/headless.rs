use crate::error::Result;
use crate::io::image::save_buffer_to_image;
use crate::ui::frontend::Frontend;
use crate::ui::input::{InputEvent, Key};
use log::info;
use std::collections::{HashSet, VecDeque};
use std::path::Path;

/// A frontend without a window: events are scripted per frame and the last
/// presented frame is kept for inspection or export.
#[derive(Debug, Default)]
pub struct HeadlessFrontend {
    scripted: VecDeque<Vec<InputEvent>>,
    held: HashSet<Key>,
    remaining_frames: usize,
    presented: usize,
    last_frame: Vec<u32>,
    last_size: (usize, usize),
}

impl HeadlessFrontend {
    /// Stays open for `frames` presented frames.
    pub fn new(frames: usize) -> Self {
        Self {
            remaining_frames: frames,
            ..Self::default()
        }
    }

    /// Queues the events delivered on the next frame that has none yet.
    pub fn push_frame(&mut self, events: Vec<InputEvent>) {
        self.scripted.push_back(events);
    }

    pub fn hold(&mut self, key: Key) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn last_frame(&self) -> &[u32] {
        &self.last_frame
    }

    pub fn last_size(&self) -> (usize, usize) {
        self.last_size
    }

    /// Writes the last presented frame as PNG.
    pub fn save(&self, path: &Path) -> Result<()> {
        let (width, height) = self.last_size;
        save_buffer_to_image(&self.last_frame, width, height, path)?;
        info!("Saved frame {} to {:?}", self.presented, path);
        Ok(())
    }
}

impl Frontend for HeadlessFrontend {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        self.scripted.pop_front().unwrap_or_default()
    }

    fn is_key_down(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    fn present(&mut self, frame: &[u32], width: usize, height: usize) -> Result<()> {
        self.last_frame.clear();
        self.last_frame.extend_from_slice(frame);
        self.last_size = (width, height);
        self.presented += 1;
        self.remaining_frames = self.remaining_frames.saturating_sub(1);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.remaining_frames > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_after_requested_frames() {
        let mut frontend = HeadlessFrontend::new(2);
        assert!(frontend.is_open());
        frontend.present(&[0; 4], 2, 2).unwrap();
        assert!(frontend.is_open());
        frontend.present(&[1; 4], 2, 2).unwrap();
        assert!(!frontend.is_open());
        assert_eq!(frontend.last_frame(), [1, 1, 1, 1]);
        assert_eq!(frontend.presented(), 2);
    }

    #[test]
    fn scripted_events_are_delivered_one_frame_at_a_time() {
        let mut frontend = HeadlessFrontend::new(3);
        frontend.push_frame(vec![InputEvent::Scroll { dy: 1.0 }]);
        frontend.push_frame(vec![InputEvent::CloseRequested]);

        assert_eq!(frontend.poll_events(), [InputEvent::Scroll { dy: 1.0 }]);
        assert_eq!(frontend.poll_events(), [InputEvent::CloseRequested]);
        assert!(frontend.poll_events().is_empty());
    }

    #[test]
    fn held_keys_are_reported() {
        let mut frontend = HeadlessFrontend::new(1);
        frontend.hold(Key::W);
        assert!(frontend.is_key_down(Key::W));
        frontend.release(Key::W);
        assert!(!frontend.is_key_down(Key::W));
    }
}
