//! Render targets
//!
//! The engine hands one complete frame per tick to a [`RenderTarget`]. The
//! target owns colour mapping and delivery; failures are reported back but
//! never stop the engine.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors reported by a render target
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render target not ready")]
    NotReady,

    #[error("frame delivery failed: {0}")]
    Push(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One full vertex intensity array
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Frame<'a> {
    pub tick: u64,
    pub at_ms: i64,
    pub intensities: &'a [f64],
}

/// Consumer of vertex intensity frames
pub trait RenderTarget: Send {
    /// Whether the target can accept a frame right now
    fn is_ready(&self) -> bool {
        true
    }

    /// Replace the whole intensity array atomically
    fn push_frame(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;
}

/// Frame as recorded by [`MemoryRenderTarget`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub tick: u64,
    pub at_ms: i64,
    pub intensities: Vec<f64>,
}

/// In-memory target; clones share the recorded frames and availability
#[derive(Debug, Clone)]
pub struct MemoryRenderTarget {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryRenderTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRenderTarget {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn last_frame(&self) -> Option<RecordedFrame> {
        self.frames.lock().ok().and_then(|f| f.last().cloned())
    }
}

impl RenderTarget for MemoryRenderTarget {
    fn is_ready(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn push_frame(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        if !self.is_ready() {
            return Err(RenderError::NotReady);
        }
        let mut frames = self
            .frames
            .lock()
            .map_err(|e| RenderError::Push(e.to_string()))?;
        frames.push(RecordedFrame {
            tick: frame.tick,
            at_ms: frame.at_ms,
            intensities: frame.intensities.to_vec(),
        });
        Ok(())
    }
}

/// Writes each frame as one JSON line
pub struct NdjsonRenderTarget<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> NdjsonRenderTarget<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RenderTarget for NdjsonRenderTarget<W> {
    fn push_frame(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
