use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    assets::image_data::ImageData,
    foundation::core::{Canvas, CompositionId, Vec2},
    foundation::error::{StageError, StageResult},
    foundation::math::{opacity_to_u8, over},
    model::layer::{Layer, LayerKind},
    render::sample::{EdgeMode, sample_bilinear},
};

#[derive(Clone, Debug, Default)]
/// Compositor controls.
pub struct RenderSettings {
    /// Force the output size instead of deriving it from the primary subject layer.
    pub canvas: Option<Canvas>,
    /// Dedicated worker thread count. `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

/// Layered image synthesis.
///
/// Painting always starts from a fully transparent canvas and keeps
/// premultiplied alpha through every step. Nothing is flattened onto an opaque
/// color here; that belongs to [`crate::flatten_onto`] at export time.
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    settings: RenderSettings,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Compositor {
    /// Build a compositor, creating a dedicated thread pool when `settings.threads` is set.
    pub fn new(settings: RenderSettings) -> StageResult<Self> {
        let pool = match settings.threads {
            Some(n) => Some(Arc::new(build_thread_pool(n)?)),
            None => None,
        };
        Ok(Self { settings, pool })
    }

    /// Settings in use.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Flatten `layers` (plus an optional backdrop) into one premultiplied image.
    ///
    /// Hidden layers are skipped and the rest are painted in ascending order index.
    /// The backdrop is aspect-filled into the canvas and painted first at full
    /// opacity. Fails with [`StageError::InvalidGeometry`] when the canvas or any
    /// painted source has zero area; inputs are never modified.
    #[tracing::instrument(skip(self, layers, background), fields(layers = layers.len()))]
    pub fn render(&self, layers: &[Layer], background: Option<&ImageData>) -> StageResult<ImageData> {
        let mut visible: Vec<&Layer> = layers.iter().filter(|l| l.is_visible()).collect();
        visible.sort_by_key(|l| l.order_index());

        let canvas = match self.settings.canvas {
            Some(c) => c,
            None => primary_canvas(&visible, background)?,
        };
        if canvas.is_empty() {
            return Err(StageError::invalid_geometry(format!(
                "canvas {}x{} has zero area",
                canvas.width, canvas.height
            )));
        }
        if let Some(bg) = background
            && bg.canvas().is_empty()
        {
            return Err(StageError::invalid_geometry("background has zero area"));
        }
        if let Some(l) = visible.iter().find(|l| l.pixels().canvas().is_empty()) {
            return Err(StageError::invalid_geometry(format!(
                "layer {} has zero area",
                l.id()
            )));
        }

        let mut out = ImageData::transparent(canvas.width, canvas.height)?;
        match &self.pool {
            Some(pool) => pool.install(|| paint_all(&mut out, &visible, background)),
            None => paint_all(&mut out, &visible, background),
        }
        tracing::debug!(
            width = canvas.width,
            height = canvas.height,
            painted = visible.len(),
            "composited"
        );
        Ok(out)
    }
}

fn paint_all(out: &mut ImageData, layers: &[&Layer], background: Option<&ImageData>) {
    if let Some(bg) = background {
        paint_background_fill(out, bg);
    }
    for layer in layers {
        paint_layer(out, layer);
    }
}

/// Output size: first visible subject layer, else first visible layer, else the
/// backdrop's native size.
fn primary_canvas(layers: &[&Layer], background: Option<&ImageData>) -> StageResult<Canvas> {
    layers
        .iter()
        .find(|l| l.kind() == LayerKind::Subject)
        .or_else(|| layers.first())
        .map(|l| l.pixels().canvas())
        .or_else(|| background.map(ImageData::canvas))
        .ok_or_else(|| StageError::invalid_geometry("nothing to render: no visible layers and no background"))
}

/// Aspect-fill: scale by `max(cw/bw, ch/bh)`, centre, crop. The canvas is still
/// transparent at this point, so samples replace the destination.
fn paint_background_fill(out: &mut ImageData, bg: &ImageData) {
    let (cw, ch) = (f64::from(out.width()), f64::from(out.height()));
    let (bw, bh) = (f64::from(bg.width()), f64::from(bg.height()));
    let scale = (cw / bw).max(ch / bh);
    let origin = Vec2::new((cw - bw * scale) * 0.5, (ch - bh * scale) * 0.5);

    let stride = out.width() as usize * 4;
    out.as_bytes_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let py = y as f64 + 0.5;
            let sy = (py - origin.y) / scale - 0.5;
            for (x, d) in row.chunks_exact_mut(4).enumerate() {
                let px = x as f64 + 0.5;
                let sx = (px - origin.x) / scale - 0.5;
                let s = sample_bilinear(bg, sx, sy, EdgeMode::Clamp);
                d.copy_from_slice(&s);
            }
        });
}

/// Source-over one layer through the inverse of its transform.
fn paint_layer(out: &mut ImageData, layer: &Layer) {
    let opacity = opacity_to_u8(layer.opacity());
    if opacity == 0 {
        return;
    }
    let forward = layer.affine();
    let inverse = forward.inverse();
    let src = layer.pixels();

    // Only rows the transformed layer can touch.
    let bounds = forward.transform_rect_bbox(kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(src.width()),
        f64::from(src.height()),
    ));
    let (w, h) = (out.width() as usize, out.height() as usize);
    let y_start = bounds.y0.floor().max(0.0) as usize;
    let y_end = (bounds.y1.ceil().max(0.0) as usize).min(h);
    let x_start = bounds.x0.floor().max(0.0) as usize;
    let x_end = (bounds.x1.ceil().max(0.0) as usize).min(w);
    if y_start >= y_end || x_start >= x_end {
        return;
    }

    let stride = w * 4;
    out.as_bytes_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .skip(y_start)
        .take(y_end - y_start)
        .for_each(|(y, row)| {
            let py = y as f64 + 0.5;
            for x in x_start..x_end {
                let local = inverse * kurbo::Point::new(x as f64 + 0.5, py);
                let s = sample_bilinear(src, local.x - 0.5, local.y - 0.5, EdgeMode::Transparent);
                if s[3] == 0 {
                    continue;
                }
                let d = &mut row[x * 4..x * 4 + 4];
                let blended = over([d[0], d[1], d[2], d[3]], s, opacity);
                d.copy_from_slice(&blended);
            }
        });
}

fn build_thread_pool(threads: usize) -> StageResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(StageError::validation(
            "render threads must be >= 1 when set",
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| StageError::validation(format!("failed to build rayon thread pool: {e}")))
}

/// Owned snapshot of one composition's render inputs.
///
/// Holds deep copies, so it can move to a worker thread while the studio keeps
/// being edited.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub(crate) composition: CompositionId,
    pub(crate) layers: Vec<Layer>,
    pub(crate) background: Option<ImageData>,
}

impl RenderJob {
    /// Composition the snapshot was taken from.
    pub fn composition(&self) -> CompositionId {
        self.composition
    }

    /// Visible layers in paint order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Backdrop pixels, when the composition has a generated or uploaded background.
    pub fn background(&self) -> Option<&ImageData> {
        self.background.as_ref()
    }

    /// Render synchronously on the calling thread.
    pub fn render(&self, compositor: &Compositor) -> StageResult<ImageData> {
        compositor.render(&self.layers, self.background.as_ref())
    }

    /// Render on tokio's blocking pool so async callers (and whatever drives the
    /// UI) are never stalled by pixel work.
    pub async fn render_in_background(self, compositor: Compositor) -> StageResult<ImageData> {
        tokio::task::spawn_blocking(move || self.render(&compositor))
            .await
            .map_err(|e| StageError::Other(anyhow::Error::new(e)))?
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
