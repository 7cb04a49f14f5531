use rgb::RGB8;

pub const BLACK: RGB8 = RGB8::new(0, 0, 0);

pub const WHITE: RGB8 = RGB8::new(255, 255, 255);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("Wrong number of hex digits in '{0}'")]
    Length(String),

    #[error("Invalid hex digits in '{0}'")]
    Digits(String),
}

/// Parse `rrggbb`, optionally prefixed with `#`.
pub fn parse_hex_rgb(s: &str) -> Result<RGB8, ColorError> {
    let s = s.strip_prefix('#').unwrap_or(s);
    let [r, g, b] = parse_hex_bytes::<3>(s)?;
    Ok(RGB8::new(r, g, b))
}

/// Parse exactly `N` bytes worth of hex digits.
pub fn parse_hex_bytes<const N: usize>(s: &str) -> Result<[u8; N], ColorError> {
    if s.len() != N * 2 || !s.is_ascii() {
        return Err(ColorError::Length(s.to_string()));
    }

    let mut out = [0; N];
    for (idx, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[idx * 2..idx * 2 + 2], 16)
            .map_err(|_| ColorError::Digits(s.to_string()))?;
    }

    Ok(out)
}

fn hue_to_channel(m1: f64, m2: f64, mut h: f64) -> f64 {
    while h < 0.0 {
        h += 1.0;
    }

    while h > 1.0 {
        h -= 1.0;
    }

    if 6.0 * h < 1.0 {
        m1 + (m2 - m1) * h * 6.0
    } else if 2.0 * h < 1.0 {
        m2
    } else if 3.0 * h < 2.0 {
        m1 + (m2 - m1) * ((2.0 / 3.0) - h) * 6.0
    } else {
        m1
    }
}

/// Hue/lightness/saturation (all `0.0..=1.0`) to 8 bit RGB.
pub fn hls_to_rgb(hue: f64, lightness: f64, saturation: f64) -> RGB8 {
    let (r, g, b) = if saturation == 0.0 {
        (lightness, lightness, lightness)
    } else {
        let m2 = if lightness <= 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let m1 = 2.0 * lightness - m2;

        (
            hue_to_channel(m1, m2, hue + 1.0 / 3.0),
            hue_to_channel(m1, m2, hue),
            hue_to_channel(m1, m2, hue - 1.0 / 3.0),
        )
    };

    RGB8::new((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// Rainbow colour for `row` out of `rows`, hue running top to bottom.
pub fn rainbow_row(row: usize, rows: usize) -> RGB8 {
    if rows == 0 {
        return hls_to_rgb(0.0, 0.5, 0.5);
    }

    hls_to_rgb(row as f64 / rows as f64, 0.5, 0.5)
}

/// Scale every channel of `color` by an 8 bit coverage value.
#[inline]
pub fn scale(color: RGB8, coverage: u8) -> RGB8 {
    let c = u16::from(coverage);
    RGB8::new(
        ((c * u16::from(color.r)) >> 8) as u8,
        ((c * u16::from(color.g)) >> 8) as u8,
        ((c * u16::from(color.b)) >> 8) as u8,
    )
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;

    use super::*;

    #[test]
    fn parse_plain_and_hashed() {
        assert_eq!(parse_hex_rgb("ff8800"), Ok(RGB8::new(255, 136, 0)));
        assert_eq!(parse_hex_rgb("#00FF01"), Ok(RGB8::new(0, 255, 1)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_hex_rgb("ff88"), Err(ColorError::Length(_))));
        assert!(matches!(parse_hex_rgb("gg0000"), Err(ColorError::Digits(_))));
        assert!(matches!(parse_hex_rgb("ffäf0"), Err(ColorError::Length(_))));
    }

    #[test]
    fn parse_rgba() {
        assert_eq!(parse_hex_bytes::<4>("01020304"), Ok([1, 2, 3, 4]));
    }

    #[test]
    fn grey_without_saturation() {
        assert_eq!(hls_to_rgb(0.3, 0.5, 0.0), RGB8::new(127, 127, 127));
    }

    #[test]
    fn rainbow_starts_red() {
        let c = rainbow_row(0, 10);
        assert!(c.r > c.g && c.r > c.b, "{c:?}");
    }

    #[test]
    fn scale_full_and_zero() {
        let c = RGB8::new(255, 128, 0);
        assert_eq!(scale(c, 0), RGB8::new(0, 0, 0));
        assert_eq!(scale(c, 255), RGB8::new(254, 127, 0));
    }
}
