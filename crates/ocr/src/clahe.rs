//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a `grid × grid` mesh of tiles. Each tile gets its
//! own clipped, equalized lookup table and every output pixel is a bilinear
//! blend of the tables of the four nearest tile centers. When the image size
//! is not a multiple of the grid, tiles are sized as if the image had been
//! padded by mirror reflection.

use image::{GrayImage, Luma};

const BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clahe {
    pub clip_limit: f32,
    pub grid: u32,
}

impl Default for Clahe {
    fn default() -> Self {
        Self { clip_limit: 2.0, grid: 8 }
    }
}

impl Clahe {
    pub fn new(clip_limit: f32, grid: u32) -> Self {
        Self { clip_limit, grid: grid.max(1) }
    }

    pub fn apply(&self, src: &GrayImage) -> GrayImage {
        let (width, height) = src.dimensions();
        if width == 0 || height == 0 {
            return src.clone();
        }

        let grid = self.grid.max(1);
        let tile_w = width.div_ceil(grid);
        let tile_h = height.div_ceil(grid);
        let tile_area = (tile_w * tile_h) as usize;

        let clip = if self.clip_limit > 0.0 {
            ((self.clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
        } else {
            usize::MAX
        };
        let lut_scale = 255.0 / tile_area as f32;

        let mut luts = Vec::with_capacity((grid * grid) as usize);
        for ty in 0..grid {
            for tx in 0..grid {
                let mut hist = [0usize; BINS];
                for y in ty * tile_h..(ty + 1) * tile_h {
                    let sy = reflect(y, height);
                    for x in tx * tile_w..(tx + 1) * tile_w {
                        let sx = reflect(x, width);
                        hist[src.get_pixel(sx, sy)[0] as usize] += 1;
                    }
                }
                clip_histogram(&mut hist, clip);
                luts.push(equalize(&hist, lut_scale));
            }
        }

        let grid = grid as usize;
        let inv_tw = 1.0 / tile_w as f32;
        let inv_th = 1.0 / tile_h as f32;

        GrayImage::from_fn(width, height, |x, y| {
            let (ty1, ty2, ya) = neighbours(y as f32 * inv_th - 0.5, grid);
            let (tx1, tx2, xa) = neighbours(x as f32 * inv_tw - 0.5, grid);
            let v = src.get_pixel(x, y)[0] as usize;

            let lut = |ty: usize, tx: usize| luts[ty * grid + tx][v] as f32;
            let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
            let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
            let out = top * (1.0 - ya) + bottom * ya;

            Luma([out.round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Mirror an index into `0..len` without repeating the edge sample.
fn reflect(i: u32, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i % period;
    if m < len {
        m
    } else {
        period - m
    }
}

/// Tile indices either side of a fractional tile coordinate plus the weight
/// of the second one. Coordinates past the outer tile centers clamp.
fn neighbours(coord: f32, grid: usize) -> (usize, usize, f32) {
    let floor = coord.floor();
    let weight = coord - floor;
    let first = floor as i64;
    let second = first + 1;
    let last = grid as i64 - 1;
    (first.clamp(0, last) as usize, second.clamp(0, last) as usize, weight)
}

/// Cap every bin at `clip` and spread the excess evenly; whatever does not
/// divide evenly goes one count at a time to bins at a fixed stride.
fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut clipped = 0;
    for count in hist.iter_mut() {
        if *count > clip {
            clipped += *count - clip;
            *count = clip;
        }
    }

    let batch = clipped / BINS;
    let mut residual = clipped - batch * BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            i += step;
            residual -= 1;
        }
    }
}

fn equalize(hist: &[usize; BINS], scale: f32) -> [u8; BINS] {
    let mut lut = [0u8; BINS];
    let mut sum = 0usize;
    for (slot, count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *slot = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
