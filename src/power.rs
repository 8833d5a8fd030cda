//! Power limiting and white-point math.
//!
//! These functions sit between the user-facing 0-100 scales and the raw
//! channel values handed to the fade engine. Power budgets above 100%
//! are meaningful: 300% color power means all three dies may run at full
//! output simultaneously.

use crate::color::Rgb;
use crate::gamma::GammaGroup;

/// Affine `[min, max]` remap of a 0-100 scale.
///
/// Zero stays exactly zero so "off" never leaks light; every non-zero
/// input lands in `[min, max]` and the map is strictly increasing.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_value_limit(value: u8, min: u8, max: u8) -> u8 {
    if value == 0 {
        return 0;
    }
    let fraction = f32::from(value) / 100.0;
    (f32::from(max - min) * fraction + f32::from(min)) as u8
}

/// Cap combined RGB output at `color_max_power` percent of one channel's
/// full range while preserving the gamma-mapped R:G:B ratio.
///
/// The baseline for the cap is the most saturated channel's share of the
/// grayscale sum, so a pure color may reach full output even under a 100%
/// budget while a white mix is scaled down.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn color_power_limit(
    rgb: Rgb,
    gamma: &GammaGroup,
    max_input_value: u16,
    color_max_power: u16,
) -> (u16, u16, u16) {
    if rgb.r == 0 && rgb.g == 0 && rgb.b == 0 {
        return (0, 0, 0);
    }

    let (gamma_r, gamma_g, gamma_b) = gamma.rgb(rgb.r, rgb.g, rgb.b);
    let total = f32::from(max_input_value);

    // Channel ratios decide the rendered color.
    let ratio_r = f32::from(gamma_r) / total;
    let ratio_g = f32::from(gamma_g) / total;
    let ratio_b = f32::from(gamma_b) / total;

    // Grayscale shares give the baseline the power cap scales against.
    let sum = f32::from(gamma_r) + f32::from(gamma_g) + f32::from(gamma_b);
    let share_r = f32::from(gamma_r) / sum;
    let share_g = f32::from(gamma_g) / sum;
    let share_b = f32::from(gamma_b) / sum;
    let baseline = share_r.max(share_g).max(share_b);

    let max_power = f32::from(color_max_power) / 100.0 * total;
    let capped = total.min(baseline * max_power);

    (
        (capped * ratio_r) as u16,
        (capped * ratio_g) as u16,
        (capped * ratio_b) as u16,
    )
}

/// Convert a CCT percentage and brightness into cold/warm raw values for
/// software-mixed white.
///
/// The mixing point is the largest output consistent with the requested
/// cold:warm ratio and the `white_max_power` budget:
/// `m = min(budget_ceiling, 255 / max(cold_ratio, warm_ratio))`, then both
/// channels are scaled by `brightness / 100`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cct_to_cold_warm(cct: u8, brightness: u8, white_max_power: u16) -> (u16, u16) {
    let warm_ratio = f32::from(100 - cct) / 100.0;
    let cold_ratio = f32::from(cct) / 100.0;

    // The mix point rounds up so the dominant die lands exactly on 255
    // after the ratio multiply, rather than one count short.
    let ceiling = f32::from(white_max_power) / 100.0 * 255.0;
    let mix_point = ceiling.min(libm::ceilf(255.0 / warm_ratio.max(cold_ratio)));

    let scale = f32::from(brightness) / 100.0;
    let cold = cold_ratio * mix_point * scale;
    let warm = warm_ratio * mix_point * scale;

    (cold as u16, warm as u16)
}
