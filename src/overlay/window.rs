//! Software-rendered preview window using `minifb`.

use super::{compose, Canvas, Overlay, OverlayConfig, OverlayFrame, BACKGROUND};
use crate::error::{Error, Result};
use minifb::{Key, Window, WindowOptions};

pub struct WindowOverlay {
    window: Window,
    canvas: Canvas,
}

impl WindowOverlay {
    /// Open a window sized to the processed frame times the configured scale.
    pub fn open(config: &OverlayConfig, frame_width: u32, frame_height: u32) -> Result<Self> {
        let scale = config.scale.clamp(0.25, 4.0);
        let width = ((frame_width as f32 * scale).round() as usize).max(1);
        let height = ((frame_height as f32 * scale).round() as usize).max(1);

        let window = Window::new(
            &config.title,
            width,
            height,
            WindowOptions {
                resize: false,
                topmost: config.always_on_top,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| Error::Overlay(e.to_string()))?;

        tracing::info!("Overlay window opened ({}x{})", width, height);

        Ok(Self {
            window,
            canvas: Canvas::new(width, height, BACKGROUND),
        })
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(Key::Q)
            || self.window.is_key_down(Key::Escape)
    }
}

impl Overlay for WindowOverlay {
    fn show(&mut self, frame: &OverlayFrame<'_>) -> Result<bool> {
        if self.quit_requested() {
            return Ok(false);
        }

        compose(&mut self.canvas, frame);
        self.window
            .update_with_buffer(
                self.canvas.pixels(),
                self.canvas.width(),
                self.canvas.height(),
            )
            .map_err(|e| Error::Overlay(e.to_string()))?;

        Ok(!self.quit_requested())
    }
}
