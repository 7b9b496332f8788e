use serde::Serialize;
use sha2::{Digest, Sha256};

pub const LIGHTNESS: f64 = 0.8;
const SATURATION_MIN_PERCENT: u8 = 50;
const SATURATION_SPAN_PERCENT: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }

    /// HSL lightness in `0.0..=1.0`.
    #[must_use]
    pub fn lightness(self) -> f64 {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        (f64::from(max) + f64::from(min)) / 2.0 / 255.0
    }
}

/// Fill color for a participant.
///
/// Hue and saturation come from a SHA-256 digest of `seed` followed by `salt`,
/// lightness is pinned at [`LIGHTNESS`], so the result is stable across runs
/// and platforms and always light enough to read black text on.
#[must_use]
pub fn color_for(seed: &str, salt: &str) -> Color {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();

    let hue = u16::from_be_bytes([digest[0], digest[1]]) % 360;
    let saturation = SATURATION_MIN_PERCENT + digest[2] % SATURATION_SPAN_PERCENT;
    hsl_to_rgb(f64::from(hue), f64::from(saturation) / 100.0, LIGHTNESS)
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Color {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let secondary = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (red, green, blue) = match sector as u32 {
        0 => (chroma, secondary, 0.0),
        1 => (secondary, chroma, 0.0),
        2 => (0.0, chroma, secondary),
        3 => (0.0, secondary, chroma),
        4 => (secondary, 0.0, chroma),
        _ => (chroma, 0.0, secondary),
    };
    let offset = lightness - chroma / 2.0;
    let channel = |value: f64| ((value + offset) * 255.0).round().clamp(0.0, 255.0) as u8;

    Color {
        red: channel(red),
        green: channel(green),
        blue: channel(blue),
    }
}
