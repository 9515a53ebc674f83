use crate::render::{draw_overlay_popup, fit_columns, Frame, Renderer};
use std::io::Write;

const HALF_BLOCK: char = '\u{2580}';

type Rgb8 = (u8, u8, u8);

/// Two pixel rows per cell: foreground paints the upper half, background the lower.
pub struct HalfBlockRenderer {
    last_fg: Option<Rgb8>,
    last_bg: Option<Rgb8>,
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }

    /// Pixel size that fills `cols × visual_rows` cells.
    pub fn pixel_size(cols: u16, visual_rows: u16) -> (usize, usize) {
        (cols as usize, visual_rows as usize * 2)
    }

    fn set_colors(&mut self, out: &mut dyn Write, fg: Rgb8, bg: Rgb8) -> std::io::Result<()> {
        if self.last_fg != Some(fg) {
            write!(out, "\x1b[38;2;{};{};{}m", fg.0, fg.1, fg.2)?;
            self.last_fg = Some(fg);
        }
        if self.last_bg != Some(bg) {
            write!(out, "\x1b[48;2;{};{};{}m", bg.0, bg.1, bg.2)?;
            self.last_bg = Some(bg);
        }
        Ok(())
    }
}

fn px(pixels: &[u8], w: usize, x: usize, y: usize) -> Rgb8 {
    let i = (y * w + x) * 4;
    (pixels[i], pixels[i + 1], pixels[i + 2])
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "halfblock"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = frame.term_cols as usize;
        let rows = frame.visual_rows as usize;
        let (w, h) = (frame.pixel_width, frame.pixel_height);

        if cols == 0 || rows == 0 || w != cols || h != rows * 2 {
            return Ok(());
        }
        if frame.pixels_rgba.len() < w * h * 4 {
            return Ok(());
        }

        if frame.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Home, reset, autowrap off so the last column never wraps.
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        for row in 0..rows {
            for x in 0..cols {
                let top = px(frame.pixels_rgba, w, x, row * 2);
                let bottom = px(frame.pixels_rgba, w, x, row * 2 + 1);
                self.set_colors(out, top, bottom)?;
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut hud = frame.hud.lines();
        for i in 0..frame.hud_rows as usize {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", rows + i + 1)?;
            if let Some(line) = hud.next() {
                write!(out, "{}", fit_columns(line, cols))?;
            }
        }

        if let Some(text) = frame.overlay {
            draw_overlay_popup(out, frame.term_cols, frame.term_rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if frame.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}
