use crate::fractal::sampler::PointBatch;
use crate::visual::display::{shade_pixel, to_rgba8, DisplayParams};
use crate::visual::{Surface, SurfaceError, ViewTransform};

/// Software surface. Accumulation is an `[r, g, b, density]` float per pixel, rows top-down.
pub struct CpuSurface {
    w: usize,
    h: usize,
    accum: Vec<[f32; 4]>,
    pixels: Vec<u8>,
}

impl CpuSurface {
    pub fn new(w: usize, h: usize) -> Self {
        let mut s = Self {
            w: 0,
            h: 0,
            accum: Vec::new(),
            pixels: Vec::new(),
        };
        s.allocate(w, h);
        s
    }

    fn allocate(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        let n = w.saturating_mul(h);
        self.accum.clear();
        self.accum.resize(n, [0.0; 4]);
        self.pixels.clear();
        self.pixels.resize(n.saturating_mul(4), 0);
    }

    pub fn accumulation(&self) -> &[[f32; 4]] {
        &self.accum
    }

    /// Total density deposited so far.
    pub fn total_density(&self) -> f64 {
        self.accum.iter().map(|p| f64::from(p[3])).sum()
    }

    /// Nearest-texel read; zero outside the target.
    fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        if !(0.0..1.0).contains(&uv[0]) || !(0.0..1.0).contains(&uv[1]) {
            return [0.0; 4];
        }
        let x = ((uv[0] * self.w as f32) as usize).min(self.w.saturating_sub(1));
        let y = ((uv[1] * self.h as f32) as usize).min(self.h.saturating_sub(1));
        self.accum[y * self.w + x]
    }

    fn splat(&mut self, px: isize, py: isize, add: [f32; 4]) {
        if px < 0 || py < 0 || px as usize >= self.w || py as usize >= self.h {
            return;
        }
        let cell = &mut self.accum[py as usize * self.w + px as usize];
        for k in 0..4 {
            cell[k] += add[k];
        }
    }
}

impl Surface for CpuSurface {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resize(&mut self, w: usize, h: usize) -> Result<(), SurfaceError> {
        if w == 0 || h == 0 {
            return Err(SurfaceError::InvalidSize { w, h });
        }
        self.allocate(w, h);
        Ok(())
    }

    fn size(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    fn clear_accumulation(&mut self) {
        self.accum.fill([0.0; 4]);
    }

    fn fade_accumulation(&mut self, decay: f32) {
        for cell in &mut self.accum {
            for v in cell.iter_mut() {
                *v *= decay;
            }
        }
    }

    fn accumulate(&mut self, batch: &PointBatch, view: &ViewTransform) -> Result<(), SurfaceError> {
        if self.w == 0 || self.h == 0 {
            return Err(SurfaceError::InvalidSize { w: self.w, h: self.h });
        }
        let (w, h) = (self.w as f32, self.h as f32);
        let radius = ((view.point_size - 1.0) * 0.5).round().max(0.0) as isize;
        let k = view.intensity;

        for i in 0..batch.len() {
            let (x, y) = batch.position(i);
            let (cx, cy) = view.to_clip(x, y);
            let px = ((cx * 0.5 + 0.5) * w).floor();
            let py = ((0.5 - cy * 0.5) * h).floor();
            if !px.is_finite() || !py.is_finite() {
                continue;
            }
            let c = batch.color(i);
            let add = [c[0] * k, c[1] * k, c[2] * k, k];
            let (px, py) = (px as isize, py as isize);
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    self.splat(px + dx, py + dy, add);
                }
            }
        }
        Ok(())
    }

    fn display(&mut self, params: &DisplayParams) -> Result<(), SurfaceError> {
        let (w, h) = (self.w, self.h);
        let mut out = std::mem::take(&mut self.pixels);
        out.resize(w * h * 4, 0);
        for y in 0..h {
            for x in 0..w {
                let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
                let rgb = shade_pixel(uv, params, |p| self.sample(p));
                let i = (y * w + x) * 4;
                out[i..i + 4].copy_from_slice(&to_rgba8(rgb));
            }
        }
        self.pixels = out;
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::FrameConfig;

    #[test]
    fn centre_point_lands_in_centre_pixel() {
        let mut s = CpuSurface::new(4, 4);
        let batch = PointBatch {
            positions: vec![0.01, 0.01],
            colors: vec![1.0, 1.0, 1.0],
        };
        let view = ViewTransform::new(&FrameConfig::default(), 4, 4);
        s.accumulate(&batch, &view).unwrap();
        assert!(s.accumulation()[1 * 4 + 2][3] > 0.0);
        assert!((s.total_density() - 0.02).abs() < 1e-6);
    }
}
