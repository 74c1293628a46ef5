//! Render collaborator

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::models::Shape;

/// Draws the current shape list. Called after every locally known state
/// change, whatever the peer's role.
pub trait Renderer: Send + Sync {
    fn render(&self, shapes: &[Shape]);
}

/// Renderer that only logs what would be drawn
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn render(&self, shapes: &[Shape]) {
        debug!(shapes = shapes.len(), "render");
    }
}

/// Renderer that keeps every frame, for inspection
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Arc<Mutex<Vec<Vec<Shape>>>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<Shape>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn last_frame(&self) -> Option<Vec<Shape>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Renderer for FrameRecorder {
    fn render(&self, shapes: &[Shape]) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(shapes.to_vec());
    }
}
