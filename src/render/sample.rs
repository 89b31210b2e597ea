use crate::assets::image_data::ImageData;

/// How samples outside the source are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EdgeMode {
    /// Repeat the nearest edge pixel. Used for aspect-filled backdrops so the
    /// crop border never fades to transparent.
    Clamp,
    /// Outside is fully transparent. Used for layers, whose edges are real edges.
    Transparent,
}

fn fetch(img: &ImageData, x: i64, y: i64, edge: EdgeMode) -> [u8; 4] {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let (x, y) = match edge {
        EdgeMode::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        EdgeMode::Transparent => {
            if x < 0 || y < 0 || x >= w || y >= h {
                return [0, 0, 0, 0];
            }
            (x, y)
        }
    };
    let idx = ((y as usize) * (img.width() as usize) + (x as usize)) * 4;
    let p = &img.as_bytes()[idx..idx + 4];
    [p[0], p[1], p[2], p[3]]
}

/// Bilinear sample at continuous pixel coordinates, where integer coordinates
/// hit pixel centres exactly.
///
/// Interpolation happens on premultiplied values, so fully transparent
/// neighbours contribute no color.
pub(crate) fn sample_bilinear(img: &ImageData, x: f64, y: f64, edge: EdgeMode) -> [u8; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (xi, yi) = (x0 as i64, y0 as i64);

    let p00 = fetch(img, xi, yi, edge);
    if fx == 0.0 && fy == 0.0 {
        return p00;
    }
    let p10 = fetch(img, xi + 1, yi, edge);
    let p01 = fetch(img, xi, yi + 1, edge);
    let p11 = fetch(img, xi + 1, yi + 1, edge);

    let w00 = (1.0 - fx) * (1.0 - fy);
    let w10 = fx * (1.0 - fy);
    let w01 = (1.0 - fx) * fy;
    let w11 = fx * fy;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let v = f32::from(p00[c]) * w00
            + f32::from(p10[c]) * w10
            + f32::from(p01[c]) * w01
            + f32::from(p11[c]) * w11;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}
