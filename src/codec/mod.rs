//! Scalar codec - conversions of individual property values.
//!
//! Converts packed color integers and linear-unit names between the
//! source graph's conventions and the record pipeline's. Pure functions,
//! no dependencies on the rest of the crate.

use tracing::warn;

/// RGBA color with unit-interval channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    /// Red channel in [0,1].
    pub r: f64,
    /// Green channel in [0,1].
    pub g: f64,
    /// Blue channel in [0,1].
    pub b: f64,
    /// Alpha channel in [0,1].
    pub a: f64,
}

impl Rgba {
    /// Create a color from unit-interval channels.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Return this color with every channel halved, alpha preserved.
    ///
    /// Used to derive an ambient color from a diffuse one.
    pub fn halved(self) -> Self {
        Self {
            r: self.r / 2.0,
            g: self.g / 2.0,
            b: self.b / 2.0,
            a: self.a,
        }
    }
}

/// Convert an 8-bit channel to the unit interval.
#[inline]
fn unit_channel(channel: u32) -> f64 {
    channel as f64 / 255.0
}

/// Decode a 32-bit packed ARGB integer into unit-interval RGBA.
///
/// Total function: any 32-bit value is valid input.
pub fn rgba_from_argb(argb: u32) -> Rgba {
    let alpha = (argb & 0xFF00_0000) >> 24;
    let red = (argb & 0x00FF_0000) >> 16;
    let green = (argb & 0x0000_FF00) >> 8;
    let blue = argb & 0x0000_00FF;

    Rgba {
        r: unit_channel(red),
        g: unit_channel(green),
        b: unit_channel(blue),
        a: unit_channel(alpha),
    }
}

/// Look up the linear scale factor from a unit name to meters.
///
/// Case-insensitive. Unknown units log a warning and fall back to 1.0;
/// a unit mismatch must never abort a batch.
pub fn unit_scale(units: &str) -> f64 {
    match units.to_ascii_lowercase().as_str() {
        "meters" | "m" => 1.0,
        "centimeters" | "cm" => 0.01,
        "millimeters" | "mm" => 0.001,
        "kilometers" | "km" => 1000.0,
        "inches" | "in" => 0.0254,
        "feet" | "ft" => 0.3048,
        "yards" | "yd" => 0.9144,
        "miles" | "mi" => 1609.34,
        other => {
            warn!(units = other, "unsupported units, assuming meters");
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_boundary_values() {
        assert_eq!(rgba_from_argb(0x0000_0000), Rgba::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(rgba_from_argb(0xFFFF_FFFF), Rgba::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_argb_half_red() {
        let c = rgba_from_argb(0xFF80_0000);
        assert_eq!(c.r, 128.0 / 255.0);
        assert_eq!(c.g, 0.0);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn test_argb_channel_order() {
        // A=0x11 R=0x22 G=0x33 B=0x44
        let c = rgba_from_argb(0x1122_3344);
        assert_eq!(c.a, 0x11 as f64 / 255.0);
        assert_eq!(c.r, 0x22 as f64 / 255.0);
        assert_eq!(c.g, 0x33 as f64 / 255.0);
        assert_eq!(c.b, 0x44 as f64 / 255.0);
    }

    #[test]
    fn test_halved() {
        let c = Rgba::new(1.0, 0.5, 0.0, 1.0).halved();
        assert_eq!(c, Rgba::new(0.5, 0.25, 0.0, 1.0));
    }

    #[test]
    fn test_unit_scale_known() {
        assert_eq!(unit_scale("meters"), 1.0);
        assert_eq!(unit_scale("Millimeters"), 0.001);
        assert_eq!(unit_scale("FT"), 0.3048);
        assert_eq!(unit_scale("yd"), 0.9144);
        assert_eq!(unit_scale("miles"), 1609.34);
    }

    #[test]
    fn test_unit_scale_unknown_fails_soft() {
        assert_eq!(unit_scale("furlongs"), 1.0);
        assert_eq!(unit_scale(""), 1.0);
    }
}
