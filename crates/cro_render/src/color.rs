//! Colour type.

use std::ops::{Mul, MulAssign};

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::RenderError;

/// An RGBA colour with float channels in `[0.0, 1.0]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Colour {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Colour {
    /// <div style="background-color:rgb(0%, 0%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const BLACK: Colour = Colour::rgb(0.0, 0.0, 0.0);
    /// <div style="background-color:rgb(0%, 0%, 100%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const BLUE: Colour = Colour::rgb(0.0, 0.0, 1.0);
    /// <div style="background-color:rgb(0%, 100%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const GREEN: Colour = Colour::rgb(0.0, 1.0, 0.0);
    /// <div style="background-color:rgba(0%, 0%, 0%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const TRANSPARENT: Colour = Colour::rgba(0.0, 0.0, 0.0, 0.0);
    /// <div style="background-color:rgb(100%, 0%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const RED: Colour = Colour::rgb(1.0, 0.0, 0.0);
    /// <div style="background-color:rgb(100%, 100%, 100%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const WHITE: Colour = Colour::rgb(1.0, 1.0, 1.0);
    /// <div style="background-color:rgb(100%, 100%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const YELLOW: Colour = Colour::rgb(1.0, 1.0, 0.0);

    /// New opaque `Colour` from float channels.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Colour {
        Colour { r, g, b, a: 1.0 }
    }

    /// New `Colour` from float channels.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Colour {
        Colour { r, g, b, a }
    }

    /// New `Colour` from byte channels.
    pub fn rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Colour {
        let f = |c: u8| c as f32 / u8::MAX as f32;
        Colour::rgba(f(r), f(g), f(b), f(a))
    }

    /// Parse a colour from `RRGGBB` or `RRGGBBAA` hex, with an optional leading `#`.
    pub fn hex(hex: &str) -> Result<Colour, RenderError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || RenderError::InvalidHexColour(hex.to_string());
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        match bytes[..] {
            [r, g, b] => Ok(Colour::rgba_u8(r, g, b, u8::MAX)),
            [r, g, b, a] => Ok(Colour::rgba_u8(r, g, b, a)),
            _ => Err(invalid()),
        }
    }

    /// The same colour with a different alpha.
    pub fn with_alpha(self, a: f32) -> Colour {
        Colour { a, ..self }
    }

    /// Converts to `[r, g, b, a]`.
    pub fn as_rgba_f32(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Colour {
    fn default() -> Self {
        Colour::WHITE
    }
}

impl From<Colour> for [f32; 4] {
    fn from(colour: Colour) -> Self {
        colour.as_rgba_f32()
    }
}

impl From<[f32; 4]> for Colour {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Colour::rgba(r, g, b, a)
    }
}

impl From<Colour> for Vec4 {
    fn from(colour: Colour) -> Self {
        Vec4::from_array(colour.as_rgba_f32())
    }
}

impl Mul<Colour> for Colour {
    type Output = Colour;

    fn mul(self, rhs: Colour) -> Self::Output {
        Colour::rgba(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b, self.a * rhs.a)
    }
}

impl MulAssign<Colour> for Colour {
    fn mul_assign(&mut self, rhs: Colour) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn parses_hex() {
        assert_eq!(Colour::hex("#ff0000").unwrap(), Colour::RED);
        assert_eq!(Colour::hex("00000000").unwrap(), Colour::TRANSPARENT);
        assert!(matches!(
            Colour::hex("#ff00"),
            Err(RenderError::InvalidHexColour(_))
        ));
        assert!(Colour::hex("zzzzzz").is_err());
    }

    #[test]
    fn modulates() {
        let c = Colour::rgba(0.5, 1.0, 1.0, 0.5) * Colour::rgba(0.5, 0.5, 1.0, 1.0);
        assert_eq!(c, Colour::rgba(0.25, 0.5, 1.0, 0.5));
        assert_eq!(<[f32; 4]>::from(c), [0.25, 0.5, 1.0, 0.5]);
    }
}
