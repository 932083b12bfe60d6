use std::fmt;

use thiserror::Error;

/// An 8-bit-per-channel RGB color, the shape used by color uniforms and
/// color pickers alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{input}` is not a 6-digit hex color")]
pub struct ColorParseError {
    pub input: String,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Lowercase `rrggbb`, no leading `#`.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// Accepts `rrggbb` or `#rrggbb`, either case.
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let digits = input.strip_prefix('#').unwrap_or(input);
        let err = || ColorParseError {
            input: input.to_string(),
        };
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(err());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| err())
        };
        Ok(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }

    /// Normalized `[0, 1]` triple as uploaded to a `vec3` uniform.
    pub fn to_floats(self) -> [f32; 3] {
        [
            self.red as f32 / 255.0,
            self.green as f32 / 255.0,
            self.blue as f32 / 255.0,
        ]
    }

    /// Inverse of [`Color::to_floats`]. Channels are rounded to the nearest
    /// integer and clamped, so values a driver hands back slightly out of
    /// range still decode.
    pub fn from_floats(floats: [f32; 3]) -> Self {
        let channel = |v: f32| {
            if v.is_nan() {
                0
            } else {
                (v * 255.0).round().clamp(0.0, 255.0) as u8
            }
        };
        Self {
            red: channel(floats[0]),
            green: channel(floats[1]),
            blue: channel(floats[2]),
        }
    }

    pub fn to_color32(self, alpha: f32) -> egui::Color32 {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        egui::Color32::from_rgba_unmultiplied(self.red, self.green, self.blue, a)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    pub fn from_array(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }

    /// Relative luminance in `[0, 1]`, good enough to pick a contrasting ink.
    pub fn luminance(self) -> f32 {
        let [r, g, b] = self.to_floats();
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}
