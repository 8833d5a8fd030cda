//! Color space conversions.
//!
//! HSV here uses the lighting-industry ranges (hue 0-360, saturation and
//! value 0-100), not the 0-255 wheel of `smart_leds::hsv`. The sector math
//! runs on hundredths in `u32`; the `q`/`t` intermediates reach 10^6 and
//! would wrap a narrower type.

use smart_leds::RGB8;

use crate::error::Error;

/// Crate-wide RGB color type.
pub type Rgb = RGB8;

/// Configurable correlated-color-temperature span.
#[derive(Debug, Clone, Copy)]
pub struct KelvinRange {
    pub min: u16,
    pub max: u16,
}

impl Default for KelvinRange {
    fn default() -> Self {
        Self { min: 2200, max: 7000 }
    }
}

/// Convert HSV to 8-bit RGB.
///
/// `hue` in `0..=360`, `saturation` and `value` in `0..=100`.
pub fn hsv2rgb(hue: u16, saturation: u8, value: u8) -> Result<Rgb, Error> {
    if hue > 360 || saturation > 100 || value > 100 {
        return Err(Error::InvalidArgument);
    }

    let hue = u32::from(hue % 360);
    let value = u32::from(value);
    let saturation = u32::from(saturation);

    let hi = (hue / 60) % 6;
    let f = 100 * hue / 60 - 100 * hi;
    let p = value * (100 - saturation) / 100;
    let q = value * (10000 - f * saturation) / 10000;
    let t = value * (10000 - saturation * (100 - f)) / 10000;

    let (r, g, b) = match hi {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };

    #[allow(clippy::cast_possible_truncation)]
    Ok(Rgb {
        r: (r * 255 / 100) as u8,
        g: (g * 255 / 100) as u8,
        b: (b * 255 / 100) as u8,
    })
}

/// Convert 8-bit RGB back to `(hue, saturation, value)`.
///
/// Components are rounded to the nearest integer, not truncated, so a
/// `hsv2rgb` round trip stays within one unit. Hue is 0 for grays.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::float_cmp
)]
pub fn rgb2hsv(rgb: Rgb) -> (u16, u8, u8) {
    let max = rgb.r.max(rgb.g).max(rgb.b) as f32;
    let min = rgb.r.min(rgb.g).min(rgb.b) as f32;
    let delta = max - min;

    let value = max / 255.0;

    let (hue, saturation) = if delta == 0.0 {
        (0.0, 0.0)
    } else {
        let mut hue = if f32::from(rgb.r) == max {
            (f32::from(rgb.g) - f32::from(rgb.b)) / delta
        } else if f32::from(rgb.g) == max {
            2.0 + (f32::from(rgb.b) - f32::from(rgb.r)) / delta
        } else {
            4.0 + (f32::from(rgb.r) - f32::from(rgb.g)) / delta
        };
        hue *= 60.0;
        if hue < 0.0 {
            hue += 360.0;
        }
        (hue, delta / max)
    };

    (
        (hue + 0.5) as u16,
        (saturation * 100.0 + 0.5) as u8,
        (value * 100.0 + 0.5) as u8,
    )
}

/// Map a CCT percentage onto the configured kelvin span.
///
/// The result is rounded down to a 100 K step, matching typical chip
/// granularity.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn percentage_to_kelvin(percentage: u8, range: KelvinRange) -> u16 {
    let fraction = f32::from(percentage) / 100.0;
    let kelvin = (fraction * f32::from(range.max - range.min) + f32::from(range.min)) as u16;
    (kelvin / 100) * 100
}

/// Map a kelvin value onto the 0-100 percentage scale, clamping to the
/// configured span.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kelvin_to_percentage(kelvin: u16, range: KelvinRange) -> u8 {
    let kelvin = kelvin.clamp(range.min, range.max);
    (100.0 * (f32::from(kelvin - range.min) / f32::from(range.max - range.min))) as u8
}

/// Convert CIE xyY to 8-bit sRGB (D65, 2.4-exponent transfer curve).
///
/// `x` and `y` in `0.0..=1.0`, `big_y` in `0.0..=100.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn xyy2rgb(x: f32, y: f32, big_y: f32) -> Result<Rgb, Error> {
    if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) || !(0.0..=100.0).contains(&big_y) {
        return Err(Error::InvalidArgument);
    }

    let z = 1.0 - x - y;
    let cap_y = big_y / 100.0;
    let cap_x = (cap_y / y) * x;
    let cap_z = (cap_y / y) * z;

    let r = (cap_x * 3.2410) - (cap_y * 1.5374) - (cap_z * 0.4986);
    let g = -(cap_x * 0.9692) + (cap_y * 1.8760) + (cap_z * 0.0416);
    let b = (cap_x * 0.0556) - (cap_y * 0.2040) + (cap_z * 1.0570);

    let transfer = |c: f32| -> f32 {
        let c = if c <= 0.00304 {
            12.92 * c
        } else {
            1.055 * libm::powf(c, 1.0 / 2.4) - 0.055
        };
        c.clamp(0.0, 1.0)
    };

    Ok(Rgb {
        r: (transfer(r) * 255.0 + 0.5) as u8,
        g: (transfer(g) * 255.0 + 0.5) as u8,
        b: (transfer(b) * 255.0 + 0.5) as u8,
    })
}

/// Convert 8-bit sRGB to CIE xyY.
///
/// Black has no chromaticity; it maps to the D65 white point with zero
/// luminance rather than a division by zero.
pub fn rgb2xyy(rgb: Rgb) -> (f32, f32, f32) {
    if rgb.r == 0 && rgb.g == 0 && rgb.b == 0 {
        return (0.3127, 0.3290, 0.0);
    }
    let linearize = |c: u8| -> f32 {
        let c = f32::from(c) / 255.0;
        if c > 0.04045 {
            libm::powf((c + 0.055) / 1.055, 2.4)
        } else {
            c / 12.92
        }
    };

    let r = linearize(rgb.r) * 100.0;
    let g = linearize(rgb.g) * 100.0;
    let b = linearize(rgb.b) * 100.0;

    let cap_x = r * 0.4124 + g * 0.3576 + b * 0.1805;
    let cap_y = r * 0.2126 + g * 0.7152 + b * 0.0722;
    let cap_z = r * 0.0193 + g * 0.1192 + b * 0.9505;

    let sum = cap_x + cap_y + cap_z;
    (cap_x / sum, cap_y / sum, cap_y)
}
