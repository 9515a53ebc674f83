mod halfblock;

pub use halfblock::HalfBlockRenderer;

use std::io::Write;

/// One terminal frame: display pixels plus the HUD rows painted below them.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    pub visual_rows: u16,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub hud_rows: u16,
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Longest prefix of `line` that fits in `cols` terminal columns. Never splits a character.
pub fn fit_columns(line: &str, cols: usize) -> &str {
    match line.char_indices().nth(cols) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Centered text box over a dimmed screen. The first line is drawn as a title.
pub fn draw_overlay_popup(
    out: &mut dyn Write,
    term_cols: u16,
    term_rows: u16,
    text: &str,
) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner = cols.saturating_sub(6).max(1);
    let lines: Vec<&str> = text
        .lines()
        .take(rows.saturating_sub(3).max(1))
        .map(|l| fit_columns(l, max_inner))
        .collect();
    let inner = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_inner);

    let box_w = inner + 4;
    let box_h = lines.len() + 2;
    let col0 = cols.saturating_sub(box_w) / 2 + 1;
    let row0 = rows.saturating_sub(box_h) / 2 + 1;
    let horiz = "-".repeat(box_w - 2);

    out.write_all(b"\x1b[0m\x1b[38;2;236;242;255m\x1b[48;2;10;14;24m")?;
    write!(out, "\x1b[{row0};{col0}H+{horiz}+")?;
    for (i, line) in lines.iter().enumerate() {
        let row = row0 + 1 + i;
        let pad = inner - line.chars().count();
        if i == 0 {
            write!(
                out,
                "\x1b[{row};{col0}H| \x1b[1m\x1b[38;2;255;236;160m{line}\x1b[22m\x1b[38;2;236;242;255m{:pad$} |",
                ""
            )?;
        } else {
            write!(out, "\x1b[{row};{col0}H| {line}{:pad$} |", "")?;
        }
    }
    write!(out, "\x1b[{};{col0}H+{horiz}+", row0 + box_h - 1)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}
