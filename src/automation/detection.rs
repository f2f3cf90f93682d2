use std::borrow::Cow;
use std::sync::Arc;

use image::imageops::FilterType;
use image::GrayImage;
use imageproc::edges::canny;

use crate::automation::correlation::best_match;
use crate::automation::templates::TemplateStore;
use crate::core::coords::{Point, Rect};
use crate::core::frame::CaptureFrame;

const SCALE_EPSILON: f64 = 1e-9;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Inclusive range of template scale factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ScaleRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub const fn single(scale: f64) -> Self {
        Self::new(scale, scale, 0.0)
    }

    /// Every scale from `min` to `max` inclusive. The upper bound is kept
    /// even when accumulated steps land a hair above it.
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.max < self.min {
            return vec![self.min];
        }
        let mut out = Vec::new();
        let mut k = 0u32;
        loop {
            let s = self.min + k as f64 * self.step;
            if s > self.max + SCALE_EPSILON {
                break;
            }
            out.push(s);
            k += 1;
        }
        out
    }
}

/// Tunables of one full multi-scale search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub threshold: f32,
    pub scales: ScaleRange,
    pub use_edges: bool,
}

impl MatchParams {
    pub const fn new(threshold: f32, scales: ScaleRange, use_edges: bool) -> Self {
        Self {
            threshold,
            scales,
            use_edges,
        }
    }
}

/// Outcome of one match call. When `found` is false the rectangle, template
/// and score still describe the best candidate seen, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub found: bool,
    /// Frame-local placement of the matched (scaled) template.
    pub rect: Rect,
    pub template: Option<String>,
    pub score: f32,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            rect: Rect::default(),
            template: None,
            score: 0.0,
        }
    }

    pub fn center(&self) -> Point {
        self.rect.center()
    }

    pub fn template_name(&self) -> &str {
        self.template.as_deref().unwrap_or("-")
    }
}

/// Running best while candidates are tried.
struct Best {
    result: MatchResult,
}

impl Best {
    fn new() -> Self {
        Self {
            result: MatchResult::not_found(),
        }
    }

    /// The first candidate always sets the template name; later ones must
    /// beat the score strictly.
    fn offer(&mut self, score: f32, rect: Rect, template: &str) {
        if self.result.template.is_none() || score > self.result.score {
            self.result.score = score;
            self.result.rect = rect;
            self.result.template = Some(template.to_string());
        }
    }

    fn finish(mut self, threshold: f32) -> MatchResult {
        self.result.found = self.result.template.is_some() && self.result.score >= threshold;
        self.result
    }
}

/// Clamped search area of a frame, converted to intensity.
struct WorkArea {
    gray: GrayImage,
    offset: Point,
}

impl WorkArea {
    fn prepare(frame: &CaptureFrame, region: Option<Rect>) -> Option<Self> {
        if frame.is_empty() {
            return None;
        }
        let area = region
            .unwrap_or_else(|| frame.bounds())
            .clamp_to(frame.width(), frame.height())?;
        Some(Self {
            gray: frame.gray_view(area),
            offset: area.top_left(),
        })
    }

    fn rect_at(&self, x: u32, y: u32, size: (u32, u32)) -> Rect {
        Rect::new(
            self.offset.x + x as i32,
            self.offset.y + y as i32,
            size.0 as i32,
            size.1 as i32,
        )
    }
}

fn is_unit_scale(scale: f64) -> bool {
    (scale - 1.0).abs() <= SCALE_EPSILON
}

/// `img` resized by `scale` (bilinear, rounded, at least 1 px). Returns `None`
/// for non-positive scales.
fn scaled(img: &GrayImage, scale: f64) -> Option<Cow<'_, GrayImage>> {
    if is_unit_scale(scale) {
        return Some(Cow::Borrowed(img));
    }
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let w = ((img.width() as f64 * scale).round() as u32).max(1);
    let h = ((img.height() as f64 * scale).round() as u32).max(1);
    Some(Cow::Owned(image::imageops::resize(
        img,
        w,
        h,
        FilterType::Triangle,
    )))
}

fn edge_map(gray: &GrayImage) -> GrayImage {
    canny(gray, CANNY_LOW, CANNY_HIGH)
}

/// Locates templates from a [`TemplateStore`] inside captured frames.
#[derive(Clone)]
pub struct Matcher {
    store: Arc<TemplateStore>,
}

impl Matcher {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Full multi-scale search: every template at every scale in
    /// `params.scales`, in intensity and optionally edge domain. Keeps the
    /// single best candidate over all of them.
    pub fn locate<S: AsRef<str>>(
        &self,
        frame: &CaptureFrame,
        region: Option<Rect>,
        names: &[S],
        params: &MatchParams,
    ) -> MatchResult {
        self.locate_with_scales(
            frame,
            region,
            names,
            params.threshold,
            &params.scales.values(),
            params.use_edges,
        )
    }

    /// [`Matcher::locate`] over an explicit list of scales.
    pub fn locate_with_scales<S: AsRef<str>>(
        &self,
        frame: &CaptureFrame,
        region: Option<Rect>,
        names: &[S],
        threshold: f32,
        scales: &[f64],
        use_edges: bool,
    ) -> MatchResult {
        let Some(work) = WorkArea::prepare(frame, region) else {
            return MatchResult::not_found();
        };
        let work_edges = use_edges.then(|| edge_map(&work.gray));

        let mut best = Best::new();
        for name in names {
            let name = name.as_ref();
            // Uncached: the edge map is derived from the original decode
            let Some(template) = self.store.load_fresh(name) else {
                tracing::debug!("Template {} unavailable, skipping", name);
                continue;
            };
            let template_edges = use_edges.then(|| edge_map(&template));

            for &scale in scales {
                let Some(t) = scaled(&template, scale) else {
                    continue;
                };
                if let Some(peak) = best_match(&work.gray, &t) {
                    best.offer(peak.score, work.rect_at(peak.x, peak.y, t.dimensions()), name);
                }

                if let (Some(frame_edges), Some(te)) = (&work_edges, &template_edges) {
                    let Some(te) = scaled(te, scale) else {
                        continue;
                    };
                    if let Some(peak) = best_match(frame_edges, &te) {
                        best.offer(peak.score, work.rect_at(peak.x, peak.y, te.dimensions()), name);
                    }
                }
            }
        }

        let result = best.finish(threshold);
        tracing::debug!(
            "locate: best {} score {:.3} (threshold {:.2}) found={}",
            result.template_name(),
            result.score,
            threshold,
            result.found
        );
        result
    }

    /// Fast single pass at one scale, intensity only, cached templates.
    /// Returns the first template (in `names` order) whose score reaches
    /// `threshold` without trying the rest.
    pub fn locate_fast<S: AsRef<str>>(
        &self,
        frame: &CaptureFrame,
        region: Option<Rect>,
        names: &[S],
        threshold: f32,
        scale: f64,
    ) -> MatchResult {
        match WorkArea::prepare(frame, region) {
            Some(work) => self.fast_pass(&work, names, threshold, scale),
            None => MatchResult::not_found(),
        }
    }

    /// Fast pass at each scale of `ladder` in turn, stopping at the first
    /// pass that finds something. A miss reports the best candidate over all
    /// passes.
    pub fn locate_fast_ladder<S: AsRef<str>>(
        &self,
        frame: &CaptureFrame,
        region: Option<Rect>,
        names: &[S],
        threshold: f32,
        ladder: &[f64],
    ) -> MatchResult {
        let Some(work) = WorkArea::prepare(frame, region) else {
            return MatchResult::not_found();
        };

        let mut best = MatchResult::not_found();
        for &scale in ladder {
            let pass = self.fast_pass(&work, names, threshold, scale);
            if pass.found {
                return pass;
            }
            if best.template.is_none() || (pass.template.is_some() && pass.score > best.score) {
                best = pass;
            }
        }
        best
    }

    fn fast_pass<S: AsRef<str>>(
        &self,
        work: &WorkArea,
        names: &[S],
        threshold: f32,
        scale: f64,
    ) -> MatchResult {
        let mut best = Best::new();
        for name in names {
            let name = name.as_ref();
            let Some(template) = self.store.get(name) else {
                continue;
            };
            let Some(t) = scaled(&template, scale) else {
                continue;
            };
            let Some(peak) = best_match(&work.gray, &t) else {
                continue;
            };
            let rect = work.rect_at(peak.x, peak.y, t.dimensions());
            if peak.score >= threshold {
                return MatchResult {
                    found: true,
                    rect,
                    template: Some(name.to_string()),
                    score: peak.score,
                };
            }
            best.offer(peak.score, rect, name);
        }
        best.finish(threshold)
    }
}
