//! Theming engine
//!
//! Colour math on `#rrggbb` strings plus the palettes derived from a single
//! base colour: a five-step status gradient and a complementary UI palette.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::settings::{Settings, StatusPalette, ThemeMode, Theming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees, saturation and lightness in percent (one decimal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

/// Parse `#rgb` or `#rrggbb`, with or without the `#`.
pub fn parse_hex(raw: &str) -> Option<Rgb> {
    let digits = raw.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |index: usize| u8::from_str_radix(&expanded[index..index + 2], 16).ok();
    Some(Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

pub fn to_hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb.r, rgb.g, rgb.b)
}

/// Normalize user input to `#rrggbb`.
pub fn validate_hex(raw: &str) -> Result<String> {
    parse_hex(raw)
        .map(to_hex)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid colour '{raw}' (expected #rrggbb)")))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn rgb_to_hsl(rgb: Rgb) -> Hsl {
    let r = f64::from(rgb.r) / 255.0;
    let g = f64::from(rgb.g) / 255.0;
    let b = f64::from(rgb.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta) % 6.0
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    h = (h * 60.0).round();
    if h < 0.0 {
        h += 360.0;
    }
    let l = (max + min) / 2.0;
    let s = if delta == 0.0 {
        0.0
    } else {
        delta / (1.0 - (2.0 * l - 1.0).abs())
    };
    Hsl {
        h,
        s: round1(s * 100.0),
        l: round1(l * 100.0),
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
    let h = hsl.h.rem_euclid(360.0);
    let s = (hsl.s / 100.0).clamp(0.0, 1.0);
    let l = (hsl.l / 100.0).clamp(0.0, 1.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    }
}

pub fn hex_to_hsl(hex: &str) -> Option<Hsl> {
    parse_hex(hex).map(rgb_to_hsl)
}

pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    to_hex(hsl_to_rgb(Hsl { h, s, l }))
}

/// Perceived brightness in `[0, 1]`. Unparseable colours count as black.
pub fn luminance(hex: &str) -> f64 {
    let Some(rgb) = parse_hex(hex) else {
        return 0.0;
    };
    (0.299 * f64::from(rgb.r) + 0.587 * f64::from(rgb.g) + 0.114 * f64::from(rgb.b)) / 255.0
}

/// Move each channel towards white (positive `amount`) or black
/// (negative) by the given fraction.
pub fn adjust_color(hex: &str, amount: f64) -> String {
    let Some(rgb) = parse_hex(hex) else {
        return hex.to_string();
    };
    let target = if amount < 0.0 { 0.0 } else { 255.0 };
    let p = amount.abs().min(1.0);
    let shift = |channel: u8| {
        let value = f64::from(channel);
        (value + round_half_up((target - value) * p)).clamp(0.0, 255.0) as u8
    };
    to_hex(Rgb {
        r: shift(rgb.r),
        g: shift(rgb.g),
        b: shift(rgb.b),
    })
}

/// Halves round towards positive infinity, so stored colours match the
/// ones older data was written with.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Text colours that read well on a background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextShades {
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
    pub quaternary: String,
    /// Set for mid-luminance backgrounds where plain text is hard to read.
    pub shadow: Option<String>,
}

pub fn contrasting_text(background: &str) -> TextShades {
    let lum = luminance(background);
    let dark = lum < 0.5;
    let (primary, direction) = if dark { ("#ffffff", -1.0) } else { ("#000000", 1.0) };
    let shadow = ((lum - 0.5).abs() < 0.25).then(|| {
        if dark {
            "rgba(0, 0, 0, 0.7)".to_string()
        } else {
            "rgba(255, 255, 255, 0.7)".to_string()
        }
    });
    TextShades {
        primary: primary.to_string(),
        secondary: adjust_color(primary, direction * 0.15),
        tertiary: adjust_color(primary, direction * 0.30),
        quaternary: adjust_color(primary, direction * 0.45),
        shadow,
    }
}

/// Linear blend of two colours; `factor` 0 gives `from`, 1 gives `to`.
pub fn interpolate_color(from: &str, to: &str, factor: f64) -> String {
    let (Some(a), Some(b)) = (parse_hex(from), parse_hex(to)) else {
        return from.to_string();
    };
    let mix = |x: u8, y: u8| {
        let x = f64::from(x);
        round_half_up(x + factor * (f64::from(y) - x)).clamp(0.0, 255.0) as u8
    };
    to_hex(Rgb {
        r: mix(a.r, b.r),
        g: mix(a.g, b.g),
        b: mix(a.b, b.b),
    })
}

/// Colour along black → red → yellow → green → blue for a fraction in
/// `[0, 1]`, with lightness clamped to 25..85 % for legibility.
pub fn interpolate_five(palette: &StatusPalette, percent: f64) -> String {
    let stops = [
        palette.black.as_str(),
        palette.red.as_str(),
        palette.yellow.as_str(),
        palette.green.as_str(),
        palette.blue.as_str(),
    ];
    if percent <= 0.0 {
        return stops[0].to_string();
    }
    if percent >= 1.0 {
        return stops[4].to_string();
    }
    let scaled = percent * 4.0;
    let index = scaled.floor() as usize;
    let blended = interpolate_color(stops[index], stops[index + 1], scaled - index as f64);
    match hex_to_hsl(&blended) {
        Some(hsl) => hsl_to_hex(hsl.h, hsl.s, hsl.l.clamp(25.0, 85.0)),
        None => blended,
    }
}

/// Status colours derived from the base colour, darkest for black. Light
/// mode runs the gradient the other way.
pub fn gradient_palette(base: &str, mode: ThemeMode) -> Result<StatusPalette> {
    let hsl = hex_to_hsl(base)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid base colour '{base}'")))?;
    // (lightness delta, saturation delta) from black to blue.
    let mut stops = [(-45.0, 0.0), (-30.0, 25.0), (-15.0, 15.0), (0.0, 0.0), (15.0, 10.0)];
    if mode.is_light() {
        stops.reverse();
    }
    let color = |(dl, ds): (f64, f64)| {
        hsl_to_hex(hsl.h, (hsl.s + ds).min(100.0), (hsl.l + dl).clamp(0.0, 100.0))
    };
    Ok(StatusPalette {
        black: color(stops[0]),
        red: color(stops[1]),
        yellow: color(stops[2]),
        green: color(stops[3]),
        blue: color(stops[4]),
    })
}

/// UI colours around a base colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplementaryPalette {
    pub main: String,
    pub main_gradient_end: String,
    pub secondary: String,
    pub secondary_highlight: String,
    pub tertiary: String,
    pub accent1: String,
    pub accent2: String,
    pub accent3: String,
}

impl ComplementaryPalette {
    pub fn accents(&self) -> [&str; 3] {
        [&self.accent1, &self.accent2, &self.accent3]
    }
}

pub fn complementary_palette(base: &str, mode: ThemeMode) -> Result<ComplementaryPalette> {
    let hsl = hex_to_hsl(base)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid base colour '{base}'")))?;
    let dark = !mode.is_light();

    let main_lightness = if dark {
        if hsl.l > 50.0 {
            20.0
        } else {
            (hsl.l - 10.0).max(10.0)
        }
    } else if hsl.l < 70.0 {
        95.0
    } else {
        (hsl.l + 20.0).min(100.0)
    };
    let secondary_lightness = if dark { hsl.l.max(40.0) } else { hsl.l.min(60.0) };
    let tertiary_lightness = if dark { hsl.l.max(50.0) } else { hsl.l.min(55.0) };
    let highlight_lightness = if dark {
        secondary_lightness + 10.0
    } else {
        secondary_lightness - 10.0
    };
    let gradient_lightness = if dark { main_lightness + 5.0 } else { main_lightness - 5.0 };
    let accent_saturation = (hsl.s - 10.0).max(0.0);

    Ok(ComplementaryPalette {
        main: hsl_to_hex(hsl.h, hsl.s * 0.8, main_lightness),
        main_gradient_end: hsl_to_hex(hsl.h, hsl.s * 0.8, gradient_lightness.clamp(0.0, 100.0)),
        secondary: hsl_to_hex(hsl.h, hsl.s, secondary_lightness),
        secondary_highlight: hsl_to_hex(hsl.h, hsl.s, highlight_lightness.clamp(0.0, 100.0)),
        tertiary: hsl_to_hex((hsl.h + 150.0) % 360.0, (hsl.s * 1.1).min(100.0), tertiary_lightness),
        accent1: hsl_to_hex((hsl.h + 60.0) % 360.0, accent_saturation, if dark { 60.0 } else { 40.0 }),
        accent2: hsl_to_hex((hsl.h + 180.0) % 360.0, accent_saturation, if dark { 65.0 } else { 35.0 }),
        accent3: hsl_to_hex((hsl.h + 300.0) % 360.0, hsl.s, if dark { 55.0 } else { 45.0 }),
    })
}

/// Colour for a new category. With theming on this cycles the palette
/// accents; otherwise it walks the hue circle in pastel.
pub fn category_color(theming: &Theming, seed: usize) -> String {
    if theming.enabled {
        if let Ok(palette) = complementary_palette(&theming.base_color, theming.mode) {
            return palette.accents()[seed % 3].to_string();
        }
    }
    // Golden-angle steps keep neighbouring seeds far apart.
    let hue = (seed as f64 * 137.508) % 360.0;
    hsl_to_hex(hue.round(), 80.0, 85.0)
}

/// Status colours in effect: the theme gradient when theming drives
/// status colours, otherwise the user's palette.
pub fn resolved_status_colors(settings: &Settings) -> StatusPalette {
    let theming = &settings.theming;
    if theming.enabled && theming.use_theme_for_status {
        match gradient_palette(&theming.base_color, theming.mode) {
            Ok(palette) => return palette,
            Err(err) => tracing::warn!(error = %err, "falling back to stored status colours"),
        }
    }
    settings.status_colors.clone()
}

/// Background colour of a past event: the category colour pulled towards
/// mid grey so history reads as muted.
pub fn dulled(color: &str) -> String {
    let amount = if luminance(color) < 0.5 { 0.2 } else { -0.2 };
    adjust_color(color, amount)
}
