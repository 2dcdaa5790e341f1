use image::{GrayImage, Luma, RgbImage};

// Fixed-point BT.601 weights scaled by 2^14, matching the usual BGR->gray
// conversion bit for bit: 0.114 B + 0.587 G + 0.299 R.
const B_WEIGHT: u32 = 1868;
const G_WEIGHT: u32 = 9617;
const R_WEIGHT: u32 = 4899;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Gray intensity of a single RGB sample.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (u32::from(b) * B_WEIGHT + u32::from(g) * G_WEIGHT + u32::from(r) * R_WEIGHT + ROUND)
        >> SHIFT;
    // Weights sum to 2^14, so y never exceeds 255.
    y as u8
}

/// Saturating `left - right` per channel, collapsed to one gray intensity per pixel.
///
/// Callers guarantee equal dimensions.
pub fn subtract_to_gray(left: &RgbImage, right: &RgbImage) -> GrayImage {
    GrayImage::from_fn(left.width(), left.height(), |x, y| {
        let [lr, lg, lb] = left.get_pixel(x, y).0;
        let [rr, rg, rb] = right.get_pixel(x, y).0;
        Luma([luma(
            lr.saturating_sub(rr),
            lg.saturating_sub(rg),
            lb.saturating_sub(rb),
        )])
    })
}
