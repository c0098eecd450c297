//! Raster similarity used to rank auto-tune candidates.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

/// Side of the square SSIM window in pixels
const WINDOW: u32 = 8;

const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Score how closely `candidate` resembles `reference`, higher is closer.
///
/// Both rasters are converted to grayscale and the candidate is resized to
/// the reference dimensions. The score is the mean SSIM over 8×8 windows;
/// rasters smaller than one window fall back to `1 - MAD / 255`.
pub fn similarity(reference: &RgbaImage, candidate: &RgbaImage) -> f64 {
    let a = imageops::grayscale(reference);
    let (width, height) = a.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut b = imageops::grayscale(candidate);
    if b.dimensions() != (width, height) {
        b = imageops::resize(&b, width, height, FilterType::Triangle);
    }

    if width < WINDOW || height < WINDOW {
        return mad_score(&a, &b);
    }
    mean_ssim(&a, &b)
}

/// `1 - mean absolute difference / 255`, floored at zero.
fn mad_score(a: &GrayImage, b: &GrayImage) -> f64 {
    let total: f64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| f64::from(pa.0[0].abs_diff(pb.0[0])))
        .sum();
    let count = f64::from(a.width()) * f64::from(a.height());
    (1.0 - total / count / 255.0).max(0.0)
}

fn mean_ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    let (width, height) = a.dimensions();
    let mut sum = 0.0;
    let mut windows = 0_u32;

    for wy in (0..=height - WINDOW).step_by(WINDOW as usize) {
        for wx in (0..=width - WINDOW).step_by(WINDOW as usize) {
            sum += window_ssim(a, b, wx, wy);
            windows += 1;
        }
    }

    if windows == 0 {
        return mad_score(a, b);
    }
    sum / f64::from(windows)
}

fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32) -> f64 {
    let n = f64::from(WINDOW * WINDOW);
    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for y in y0..y0 + WINDOW {
        for x in x0..x0 + WINDOW {
            let va = f64::from(a.get_pixel(x, y).0[0]);
            let vb = f64::from(b.get_pixel(x, y).0[0]);
            sa += va;
            sb += vb;
            saa += va * va;
            sbb += vb * vb;
            sab += va * vb;
        }
    }

    let mean_a = sa / n;
    let mean_b = sb / n;
    let var_a = mean_a.mul_add(-mean_a, saa / n);
    let var_b = mean_b.mul_add(-mean_b, sbb / n);
    let cov = mean_a.mul_add(-mean_b, sab / n);

    let numerator = (2.0 * mean_a).mul_add(mean_b, C1) * 2.0_f64.mul_add(cov, C2);
    let denominator = mean_a.mul_add(mean_a, mean_b * mean_b + C1) * (var_a + var_b + C2);
    numerator / denominator
}
