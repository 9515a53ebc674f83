use ifs_flame::render::{fit_columns, Frame, HalfBlockRenderer, Renderer};

/// Build a solid-color RGBA pixel buffer.
fn solid_pixels(w: usize, h: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
    let mut buf = vec![0u8; w * h * 4];
    for px in buf.chunks_exact_mut(4) {
        px[0] = r;
        px[1] = g;
        px[2] = b;
        px[3] = 255;
    }
    buf
}

/// Build a gradient pixel buffer (varies across x).
fn gradient_pixels(w: usize, h: usize) -> Vec<u8> {
    let mut buf = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let t = (x as f32 / w.max(1) as f32 * 255.0) as u8;
            buf[i] = t;
            buf[i + 1] = 128;
            buf[i + 2] = 255 - t;
            buf[i + 3] = 255;
        }
    }
    buf
}

fn make_frame<'a>(cols: u16, visual_rows: u16, pixels: &'a [u8], sync: bool) -> Frame<'a> {
    let (pw, ph) = HalfBlockRenderer::pixel_size(cols, visual_rows);
    Frame {
        term_cols: cols,
        term_rows: visual_rows + 2,
        visual_rows,
        pixel_width: pw,
        pixel_height: ph,
        pixels_rgba: pixels,
        hud: "Sierpinski Triangle [ifs] | pts 20000\nbloom off",
        hud_rows: 2,
        overlay: None,
        sync_updates: sync,
    }
}

// ── HalfBlock renderer ─────────────────────────────────────────────────────

#[test]
fn halfblock_renders_gradient_frame() {
    let cols = 8u16;
    let rows = 4u16;
    let pixels = gradient_pixels(cols as usize, rows as usize * 2);
    let frame = make_frame(cols, rows, &pixels, true);
    let mut out = Vec::new();
    let mut renderer = HalfBlockRenderer::new();
    renderer.render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("\x1b[?2026h"), "missing sync-begin");
    assert!(s.contains("\x1b[?2026l"), "missing sync-end");
    assert!(s.contains("\x1b[?7l"), "missing autowrap-off");
    assert!(s.contains("\x1b[?7h"), "missing autowrap-on");
    assert_eq!(s.matches('\u{2580}').count(), 8 * 4);
    assert!(s.contains("38;2;"), "missing FG escape");
    assert!(s.contains("48;2;"), "missing BG escape");
}

#[test]
fn halfblock_name() {
    assert_eq!(HalfBlockRenderer::new().name(), "halfblock");
}

#[test]
fn halfblock_pixel_size_doubles_rows() {
    assert_eq!(HalfBlockRenderer::pixel_size(80, 22), (80, 44));
}

#[test]
fn halfblock_skips_dimension_mismatch() {
    let pixels = solid_pixels(4, 4, 100, 100, 100);
    let mut frame = make_frame(4, 4, &pixels, false);
    frame.pixel_height = 4;
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    assert!(out.is_empty(), "expected empty output for dimension mismatch");
}

#[test]
fn halfblock_skips_short_buffer() {
    let pixels = solid_pixels(4, 3, 100, 100, 100);
    let frame = make_frame(4, 2, &pixels, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn top_and_bottom_pixels_map_to_fg_and_bg() {
    let mut pixels = solid_pixels(1, 2, 0, 0, 0);
    pixels[..3].copy_from_slice(&[200, 10, 20]);
    pixels[4..7].copy_from_slice(&[5, 6, 7]);
    let frame = make_frame(1, 1, &pixels, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("38;2;200;10;20"));
    assert!(s.contains("48;2;5;6;7"));
}

// ── HUD ─────────────────────────────────────────────────────────────────────

#[test]
fn hud_rows_are_drawn_below_image() {
    let pixels = solid_pixels(40, 10, 30, 30, 30);
    let frame = make_frame(40, 5, &pixels, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("\x1b[6;1H"), "first HUD row not positioned");
    assert!(s.contains("\x1b[7;1H"), "second HUD row not positioned");
    assert!(s.contains("Sierpinski Triangle"));
    assert!(s.contains("bloom off"));
}

#[test]
fn hud_is_truncated_to_width() {
    let pixels = solid_pixels(10, 4, 30, 30, 30);
    let frame = make_frame(10, 2, &pixels, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("Sierpinski"));
    assert!(!s.contains("Triangle"));
}

#[test]
fn fit_columns_respects_char_boundaries() {
    assert_eq!(fit_columns("Möbius → Fern", 8), "Möbius →");
    assert_eq!(fit_columns("abc", 10), "abc");
    assert_eq!(fit_columns("abc", 0), "");
}

// ── Overlay rendering ───────────────────────────────────────────────────────

#[test]
fn halfblock_renders_overlay_popup() {
    let cols = 40u16;
    let rows = 20u16;
    let pixels = solid_pixels(cols as usize, rows as usize * 2, 50, 50, 50);
    let mut frame = make_frame(cols, rows, &pixels, false);
    frame.overlay = Some("Keys\nq / Esc    quit");
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("Keys"), "overlay title missing");
    assert!(s.contains("q / Esc    quit"), "overlay body missing");
}

// ── Multiple frames (color cache reset) ─────────────────────────────────────

#[test]
fn halfblock_resets_color_cache_each_frame() {
    let mut renderer = HalfBlockRenderer::new();

    let pixels = solid_pixels(4, 4, 255, 0, 0);
    let mut out1 = Vec::new();
    renderer.render(&make_frame(4, 2, &pixels, false), &mut out1).unwrap();
    assert!(String::from_utf8_lossy(&out1).contains("38;2;255;0;0"));

    // Same colour again: the cache must not suppress the escape on a new frame.
    let mut out2 = Vec::new();
    renderer.render(&make_frame(4, 2, &pixels, false), &mut out2).unwrap();
    assert!(String::from_utf8_lossy(&out2).contains("38;2;255;0;0"));
}
