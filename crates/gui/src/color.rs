//! Color-picker math: HSV sliders to the LED's 24-bit RGB.

use harpoon_core::settings::Rgb;

/// Convert hue, saturation, and value (each 0.0-1.0) to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let h6 = 6.0 * h;
    let r = ((h6 - 3.0).abs() - 1.0).clamp(0.0, 1.0);
    let g = (2.0 - (h6 - 2.0).abs()).clamp(0.0, 1.0);
    let b = (2.0 - (h6 - 4.0).abs()).clamp(0.0, 1.0);
    let is = 1.0 - s;
    let channel = |c: f32| (v * (s * c + is) * 255.0) as u8;
    Rgb::new(channel(r), channel(g), channel(b))
}

/// Text color that stays readable on `background`.
///
/// Dim previews always get white text.
pub fn contrasting_text(background: Rgb, brightness: f32) -> Rgb {
    if brightness <= 0.7 {
        return Rgb::WHITE;
    }
    let luma = (800 * background.r as u32 + 587 * background.g as u32 + 114 * background.b as u32)
        / 1000;
    if luma > 127 {
        Rgb::new(0, 0, 0)
    } else {
        Rgb::WHITE
    }
}
