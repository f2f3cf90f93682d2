//! Zero-mean normalized cross-correlation (ZNCC) of a template against every
//! placement inside a larger intensity image.
//!
//! Window sums come from integral images, so each placement costs one dot
//! product with the zero-mean template plus O(1) statistics. Large searches
//! go coarse-to-fine over a 2x2 box pyramid. Rows are scanned in parallel and
//! the reduction is deterministic (higher score, then lower y, then lower x).

use image::GrayImage;
use rayon::prelude::*;

/// Best placement of a template: top-left corner and score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

impl Peak {
    /// True when `self` should replace `other` as the best placement.
    fn beats(&self, other: &Peak) -> bool {
        self.score > other.score
            || (self.score == other.score && (self.y, self.x) < (other.y, other.x))
    }
}

/// Summed-area tables of pixel values and squared pixel values, with a zero
/// guard row and column.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];
        let raw = img.as_raw();

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sum_sq }
    }

    /// (sum, sum of squares) over the `w` x `h` window at (x, y).
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let s = self.stride;
        let (a, b) = (y * s + x, y * s + x + w);
        let (c, d) = ((y + h) * s + x, (y + h) * s + x + w);
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sum_sq[d] + self.sum_sq[a] - self.sum_sq[b] - self.sum_sq[c],
        )
    }
}

/// Template with its mean removed, ready to be correlated.
struct TemplatePlan {
    width: usize,
    height: usize,
    weights: Vec<f64>,
    /// Sum of squared zero-mean weights.
    energy: f64,
}

impl TemplatePlan {
    /// `None` for empty or flat templates, which cannot be normalized.
    fn new(template: &GrayImage) -> Option<Self> {
        let (width, height) = (template.width() as usize, template.height() as usize);
        let n = width * height;
        if n == 0 {
            return None;
        }
        let raw = template.as_raw();
        let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let weights: Vec<f64> = raw.iter().map(|&v| v as f64 - mean).collect();
        let energy: f64 = weights.iter().map(|w| w * w).sum();
        if energy <= f64::EPSILON {
            return None;
        }
        Some(Self {
            width,
            height,
            weights,
            energy,
        })
    }
}

/// Template plan plus image statistics for one pyramid level.
struct Scorer<'a> {
    raw: &'a [u8],
    img_w: usize,
    integral: IntegralImage,
    plan: TemplatePlan,
    last_x: usize,
    last_y: usize,
}

impl<'a> Scorer<'a> {
    fn new(image: &'a GrayImage, template: &GrayImage) -> Option<Self> {
        if template.width() > image.width() || template.height() > image.height() {
            return None;
        }
        let plan = TemplatePlan::new(template)?;
        Some(Self {
            raw: image.as_raw(),
            img_w: image.width() as usize,
            integral: IntegralImage::new(image),
            last_x: image.width() as usize - plan.width,
            last_y: image.height() as usize - plan.height,
            plan,
        })
    }

    fn score_at(&self, x: usize, y: usize) -> f32 {
        let plan = &self.plan;
        let n = (plan.width * plan.height) as u128;
        let (sum, sum_sq) = self.integral.window(x, y, plan.width, plan.height);
        // n * variance, exact in integers
        let spread = n * sum_sq as u128 - (sum as u128) * (sum as u128);
        if spread == 0 {
            return 0.0;
        }
        let mut cross = 0.0f64;
        for ty in 0..plan.height {
            let row = &self.raw[(y + ty) * self.img_w + x..][..plan.width];
            let weights = &plan.weights[ty * plan.width..][..plan.width];
            cross += row
                .iter()
                .zip(weights)
                .map(|(&p, &w)| p as f64 * w)
                .sum::<f64>();
        }
        let denom = (plan.energy * (spread as f64 / n as f64)).sqrt();
        (cross / denom).clamp(0.0, 1.0) as f32
    }

    fn peak(&self, x: usize, y: usize) -> Peak {
        Peak {
            x: x as u32,
            y: y as u32,
            score: self.score_at(x, y),
        }
    }

    /// Best placement over every position, rows in parallel.
    fn scan_full(&self) -> Option<Peak> {
        (0..=self.last_y)
            .into_par_iter()
            .map(|y| self.best_in_row(y, 0, self.last_x))
            .reduce_with(|a, b| if b.beats(&a) { b } else { a })
    }

    fn best_in_row(&self, y: usize, x0: usize, x1: usize) -> Peak {
        let mut best = self.peak(x0, y);
        for x in x0 + 1..=x1 {
            let candidate = self.peak(x, y);
            if candidate.score > best.score {
                best = candidate;
            }
        }
        best
    }

    /// Every score of the level, row-major with stride `last_x + 1`.
    fn score_map(&self) -> Vec<f32> {
        let cols = self.last_x + 1;
        let mut map = vec![0.0f32; cols * (self.last_y + 1)];
        map.par_chunks_mut(cols).enumerate().for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                *slot = self.score_at(x, y);
            }
        });
        map
    }

    /// Best placement within `radius` of `(cx, cy)`, clamped to the level.
    fn refine(&self, cx: usize, cy: usize, radius: usize) -> Peak {
        let x0 = cx.saturating_sub(radius).min(self.last_x);
        let x1 = (cx + radius).min(self.last_x);
        let y0 = cy.saturating_sub(radius).min(self.last_y);
        let y1 = (cy + radius).min(self.last_y);
        let mut best = self.best_in_row(y0, x0, x1);
        for y in y0 + 1..=y1 {
            let row_best = self.best_in_row(y, x0, x1);
            if row_best.beats(&best) {
                best = row_best;
            }
        }
        best
    }
}

/// Placements times template pixels below which the search is exhaustive.
const EXHAUSTIVE_BUDGET: u64 = 1 << 24;
/// Smallest template side allowed at the coarsest pyramid level.
const COARSE_MIN_SIDE: u32 = 6;
const MAX_LEVELS: usize = 3;
/// Candidates carried from the coarse scan down to full resolution.
const BEAM_WIDTH: usize = 8;
const NMS_RADIUS: usize = 3;
const REFINE_RADIUS: usize = 2;

/// 2x2 box downsample with rounding.
fn half(img: &GrayImage) -> GrayImage {
    let (w, h) = (img.width() / 2, img.height() / 2);
    GrayImage::from_fn(w, h, |x, y| {
        let (sx, sy) = (2 * x, 2 * y);
        let sum = img.get_pixel(sx, sy).0[0] as u16
            + img.get_pixel(sx + 1, sy).0[0] as u16
            + img.get_pixel(sx, sy + 1).0[0] as u16
            + img.get_pixel(sx + 1, sy + 1).0[0] as u16;
        image::Luma([((sum + 2) / 4) as u8])
    })
}

/// Number of pyramid levels above full resolution worth searching.
fn pyramid_depth(image: &GrayImage, template: &GrayImage) -> usize {
    let placements = (image.width() - template.width() + 1) as u64
        * (image.height() - template.height() + 1) as u64;
    let work = placements * template.width() as u64 * template.height() as u64;
    if work <= EXHAUSTIVE_BUDGET {
        return 0;
    }
    let min_side = template.width().min(template.height());
    (1..=MAX_LEVELS)
        .take_while(|&level| min_side >> level >= COARSE_MIN_SIDE)
        .last()
        .unwrap_or(0)
}

/// Indices of the strongest scores, at least `NMS_RADIUS + 1` apart.
fn coarse_candidates(map: &[f32], cols: usize) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..map.len()).collect();
    order.sort_by(|&a, &b| map[b].total_cmp(&map[a]).then(a.cmp(&b)));

    let mut kept: Vec<(usize, usize)> = Vec::with_capacity(BEAM_WIDTH);
    for idx in order {
        let (x, y) = (idx % cols, idx / cols);
        let clear = kept
            .iter()
            .all(|&(kx, ky)| kx.abs_diff(x) > NMS_RADIUS || ky.abs_diff(y) > NMS_RADIUS);
        if clear {
            kept.push((x, y));
            if kept.len() == BEAM_WIDTH {
                break;
            }
        }
    }
    kept
}

/// Highest-scoring placement of `template` inside `image`.
///
/// Returns `None` when the template does not fit inside the image or has no
/// variance. Image windows with no variance score 0.
///
/// Small searches scan every placement. Larger ones scan a box-filtered
/// pyramid level in full and refine the best few candidates level by level
/// down to full resolution, where the returned score is exact.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<Peak> {
    let full = Scorer::new(image, template)?;
    let depth = pyramid_depth(image, template);
    if depth == 0 {
        return full.scan_full();
    }

    let mut images = vec![half(image)];
    let mut templates = vec![half(template)];
    for _ in 1..depth {
        let img = half(&images[images.len() - 1]);
        let tpl = half(&templates[templates.len() - 1]);
        images.push(img);
        templates.push(tpl);
    }
    let scorers: Option<Vec<Scorer>> = images
        .iter()
        .zip(&templates)
        .map(|(img, tpl)| Scorer::new(img, tpl))
        .collect();
    // template flattened out when downsampled
    let Some(scorers) = scorers else {
        return full.scan_full();
    };

    let coarsest = &scorers[depth - 1];
    let map = coarsest.score_map();
    let mut beam = coarse_candidates(&map, coarsest.last_x + 1);
    for scorer in scorers[..depth - 1].iter().rev() {
        beam = beam
            .iter()
            .map(|&(x, y)| {
                let p = scorer.refine(2 * x, 2 * y, REFINE_RADIUS);
                (p.x as usize, p.y as usize)
            })
            .collect();
    }

    beam.iter()
        .map(|&(x, y)| full.refine(2 * x, 2 * y, REFINE_RADIUS))
        .reduce(|a, b| if b.beats(&a) { b } else { a })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(w: u32, h: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(w, h, |_, _| Luma([rng.gen()]))
    }

    /// Low-frequency texture, closer to game art than white noise.
    fn smooth(w: u32, h: u32, seed: u64) -> GrayImage {
        let coarse = noise(w / 8 + 1, h / 8 + 1, seed);
        image::imageops::resize(&coarse, w, h, image::imageops::FilterType::Triangle)
    }

    fn paste(dst: &mut GrayImage, src: &GrayImage, x: u32, y: u32) {
        image::imageops::replace(dst, src, x as i64, y as i64);
    }

    #[test]
    fn test_finds_exact_placement() {
        let template = noise(12, 9, 1);
        let mut image = noise(80, 60, 2);
        paste(&mut image, &template, 31, 17);

        let peak = best_match(&image, &template).unwrap();
        assert_eq!((peak.x, peak.y), (31, 17));
        assert!(peak.score > 0.999);
    }

    #[test]
    fn test_invariant_to_brightness_and_contrast() {
        let template = noise(10, 10, 3);
        let shifted = GrayImage::from_fn(10, 10, |x, y| {
            Luma([(template.get_pixel(x, y).0[0] as u32 / 2 + 40) as u8])
        });
        let mut image = GrayImage::from_pixel(40, 40, Luma([90]));
        paste(&mut image, &shifted, 5, 20);

        let peak = best_match(&image, &template).unwrap();
        assert_eq!((peak.x, peak.y), (5, 20));
        assert!(peak.score > 0.99);
    }

    #[test]
    fn test_flat_inputs() {
        let flat = GrayImage::from_pixel(5, 5, Luma([128]));
        assert!(best_match(&noise(20, 20, 4), &flat).is_none());

        let peak = best_match(&GrayImage::from_pixel(20, 20, Luma([7])), &noise(5, 5, 5)).unwrap();
        assert_eq!(peak.score, 0.0);
        assert_eq!((peak.x, peak.y), (0, 0));
    }

    #[test]
    fn test_template_larger_than_image() {
        assert!(best_match(&noise(8, 8, 6), &noise(9, 4, 7)).is_none());
        assert!(best_match(&noise(8, 8, 6), &noise(8, 8, 7)).is_some());
    }

    #[test]
    fn test_ties_prefer_top_left() {
        let template = noise(4, 4, 8);
        let mut image = GrayImage::from_pixel(30, 30, Luma([0]));
        paste(&mut image, &template, 20, 3);
        paste(&mut image, &template, 2, 3);
        paste(&mut image, &template, 10, 22);

        let peak = best_match(&image, &template).unwrap();
        assert_eq!((peak.x, peak.y), (2, 3));
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let template = noise(6, 6, 9);
        let inverted = GrayImage::from_fn(6, 6, |x, y| Luma([255 - template.get_pixel(x, y).0[0]]));
        let peak = best_match(&inverted, &template).unwrap();
        assert!((0.0..=1.0).contains(&peak.score));
        assert_eq!(peak.score, 0.0);
    }

    #[test]
    fn test_pyramid_depth_follows_size() {
        assert_eq!(pyramid_depth(&noise(80, 60, 1), &noise(12, 9, 2)), 0);
        assert_eq!(pyramid_depth(&noise(640, 360, 1), &noise(64, 40, 2)), 2);
        assert_eq!(pyramid_depth(&noise(640, 360, 1), &noise(200, 10, 2)), 0);
        assert_eq!(pyramid_depth(&noise(1600, 900, 1), &noise(80, 32, 2)), 2);
    }

    #[test]
    fn test_coarse_to_fine_finds_odd_placement() {
        let template = smooth(64, 40, 11);
        let mut image = smooth(640, 360, 12);
        paste(&mut image, &template, 301, 157);

        let peak = best_match(&image, &template).unwrap();
        assert_eq!((peak.x, peak.y), (301, 157));
        assert!(peak.score > 0.999);
    }

    #[test]
    fn test_coarse_to_fine_prefers_exact_copy() {
        let template = smooth(48, 32, 13);
        let faded = GrayImage::from_fn(48, 32, |x, y| {
            let v = template.get_pixel(x, y).0[0] as u32;
            // blend toward a horizontal ramp
            Luma([((v * 3 + x * 5) / 4).min(255) as u8])
        });
        let mut image = smooth(480, 320, 14);
        paste(&mut image, &faded, 40, 30);
        paste(&mut image, &template, 377, 251);

        let peak = best_match(&image, &template).unwrap();
        assert_eq!((peak.x, peak.y), (377, 251));
        assert!(peak.score > 0.999);
    }

    #[test]
    fn test_coarse_candidates_are_spread_out() {
        let mut map = vec![0.0f32; 20 * 10];
        map[5 * 20 + 5] = 0.9;
        map[5 * 20 + 6] = 0.8;
        map[2 * 20 + 15] = 0.7;
        let kept = coarse_candidates(&map, 20);
        assert_eq!(kept[0], (5, 5));
        assert_eq!(kept[1], (15, 2));
        assert!(kept.len() <= BEAM_WIDTH);
    }
}
