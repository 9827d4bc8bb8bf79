//! Transformation parameters and the permissive query parser.
//!
//! The parser recognizes a fixed set of keys and silently drops anything it
//! cannot accept, so a malformed query degrades to "fewer transformations"
//! rather than an error:
//!
//! | Field   | Keys            | Accepted values                                   |
//! |---------|-----------------|---------------------------------------------------|
//! | width   | `w`, `width`    | integer in `1..=u32::MAX`                         |
//! | height  | `h`, `height`   | integer in `1..=u32::MAX`                         |
//! | format  | `f`, `format`   | `jpeg`, `png`, `webp`, `avif`                     |
//! | quality | `q`, `quality`  | any finite number, rounded and clamped to 1..=100 |
//! | fit     | `fit`           | `scale-down`, `contain`, `cover`, `crop`, `pad`   |
//!
//! When both aliases of a field are present the short one wins.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

/// Default encoder quality for formats that support it.
pub const DEFAULT_QUALITY: u8 = 80;

/// Minimum allowed quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// Enumerations
// =============================================================================

/// Output encodings a derivative can be produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    /// Every accepted format, in declaration order.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Avif,
    ];

    /// The query / cache-key spelling of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// MIME type served for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// Whether the encoder honours a quality setting.
    pub fn supports_quality(&self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Avif)
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a derivative is fitted into the requested width/height box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    ScaleDown,
    Contain,
    Cover,
    Crop,
    Pad,
}

impl FitMode {
    /// Every accepted fit mode, in declaration order.
    pub const ALL: [FitMode; 5] = [
        FitMode::ScaleDown,
        FitMode::Contain,
        FitMode::Cover,
        FitMode::Crop,
        FitMode::Pad,
    ];

    /// The query / cache-key spelling of this fit mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::ScaleDown => "scale-down",
            FitMode::Contain => "contain",
            FitMode::Cover => "cover",
            FitMode::Crop => "crop",
            FitMode::Pad => "pad",
        }
    }
}

impl FromStr for FitMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|fit| fit.as_str() == s).ok_or(())
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transform Parameters
// =============================================================================

/// A validated set of requested transformations.
///
/// Every present field already satisfies its domain constraint. The default
/// value (all fields absent) is the "untransformed request".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransformParameters {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub fit: Option<FitMode>,
}

impl TransformParameters {
    /// Parse parameters from decoded query pairs.
    ///
    /// The first occurrence of a key is used, mirroring how browsers resolve
    /// repeated query keys. The result does not depend on the relative order of
    /// different keys.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut raw = RawParams::default();
        for (key, value) in pairs {
            let slot = match key {
                "w" => &mut raw.w,
                "width" => &mut raw.width,
                "h" => &mut raw.h,
                "height" => &mut raw.height,
                "f" => &mut raw.f,
                "format" => &mut raw.format,
                "q" => &mut raw.q,
                "quality" => &mut raw.quality,
                "fit" => &mut raw.fit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        Self {
            width: pick(raw.w, raw.width).and_then(parse_dimension),
            height: pick(raw.h, raw.height).and_then(parse_dimension),
            format: pick(raw.f, raw.format).and_then(|v| v.parse().ok()),
            quality: pick(raw.q, raw.quality).and_then(parse_quality),
            fit: pick(raw.fit, None).and_then(|v| v.parse().ok()),
        }
    }

    /// Parse parameters from a raw (still percent-encoded) query string.
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// `true` when no transformation was requested.
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.format.is_none()
            && self.quality.is_none()
            && self.fit.is_none()
    }

    /// Builder-style setter for width.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width).filter(|w| *w > 0);
        self
    }

    /// Builder-style setter for height.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height).filter(|h| *h > 0);
        self
    }

    /// Builder-style setter for format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Builder-style setter for quality. The value is clamped into range.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(clamp_quality(quality));
        self
    }

    /// Builder-style setter for fit.
    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = Some(fit);
        self
    }

    /// The quality to encode with, falling back to `default`.
    pub fn quality_or(&self, default: u8) -> u8 {
        self.quality.unwrap_or(clamp_quality(default))
    }
}

/// First-seen raw values for every recognized key.
#[derive(Default)]
struct RawParams<'a> {
    w: Option<&'a str>,
    width: Option<&'a str>,
    h: Option<&'a str>,
    height: Option<&'a str>,
    f: Option<&'a str>,
    format: Option<&'a str>,
    q: Option<&'a str>,
    quality: Option<&'a str>,
    fit: Option<&'a str>,
}

/// Prefer the short alias unless it is empty.
fn pick<'a>(short: Option<&'a str>, long: Option<&'a str>) -> Option<&'a str> {
    [short, long]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|n| *n > 0)
}

fn parse_quality(value: &str) -> Option<u8> {
    let q = value.parse::<f64>().ok().filter(|q| q.is_finite())?;
    let clamped = q.round().clamp(MIN_QUALITY as f64, MAX_QUALITY as f64);
    Some(clamped as u8)
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
