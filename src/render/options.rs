//! Render options, defaults and output naming

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PAPER_SIZE: PaperSize = PaperSize::A4;
pub const DEFAULT_MARGIN_TOP: &str = "0.5in";
pub const DEFAULT_MARGIN_RIGHT: &str = "0.25in";
pub const DEFAULT_MARGIN_BOTTOM: &str = "0.5in";
pub const DEFAULT_MARGIN_LEFT: &str = "0.25in";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const PDF_MIME_TYPE: &str = "application/pdf";

const PX_PER_INCH: f64 = 96.0;
const MIN_SCALE: f64 = 0.1;
const MAX_SCALE: f64 = 2.0;

/// Page orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Recognized paper formats, dimensions in inches (portrait)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PaperSize {
    /// Width and height in inches
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PaperSize::Letter => (8.5, 11.0),
            PaperSize::Legal => (8.5, 14.0),
            PaperSize::Tabloid => (11.0, 17.0),
            PaperSize::Ledger => (17.0, 11.0),
            PaperSize::A0 => (33.1, 46.8),
            PaperSize::A1 => (23.4, 33.1),
            PaperSize::A2 => (16.54, 23.4),
            PaperSize::A3 => (11.7, 16.54),
            PaperSize::A4 => (8.27, 11.7),
            PaperSize::A5 => (5.83, 8.27),
            PaperSize::A6 => (4.13, 5.83),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
            PaperSize::Tabloid => "tabloid",
            PaperSize::Ledger => "ledger",
            PaperSize::A0 => "a0",
            PaperSize::A1 => "a1",
            PaperSize::A2 => "a2",
            PaperSize::A3 => "a3",
            PaperSize::A4 => "a4",
            PaperSize::A5 => "a5",
            PaperSize::A6 => "a6",
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperSize {
    type Err = Error;

    /// Identifiers are matched case-insensitively after trimming.
    fn from_str(s: &str) -> Result<Self> {
        let size = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => PaperSize::Letter,
            "legal" => PaperSize::Legal,
            "tabloid" => PaperSize::Tabloid,
            "ledger" => PaperSize::Ledger,
            "a0" => PaperSize::A0,
            "a1" => PaperSize::A1,
            "a2" => PaperSize::A2,
            "a3" => PaperSize::A3,
            "a4" => PaperSize::A4,
            "a5" => PaperSize::A5,
            "a6" => PaperSize::A6,
            other => {
                return Err(Error::invalid_input(format!(
                    "unrecognized paper size: {:?}",
                    other
                )))
            }
        };
        Ok(size)
    }
}

/// Page margins as CSS lengths (e.g. "0.5in", "12mm", "40px")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarginOptions {
    pub top: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
}

/// Caller-supplied render options. Every field is optional; see
/// [`RenderOptions::resolve`] for the defaults that apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderOptions {
    /// Base name for the generated file (required)
    #[serde(default)]
    pub filename: Option<String>,
    /// "portrait" (default) or "landscape"
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Paper format: letter, legal, tabloid, ledger, a0-a6 (default: a4)
    #[serde(default)]
    pub paper_size: Option<String>,
    /// Margins (default: 0.5in top/bottom, 0.25in left/right)
    #[serde(default)]
    pub margins: Option<MarginOptions>,
    /// Print CSS backgrounds (default: true)
    #[serde(default)]
    pub print_background: Option<bool>,
    /// Render header and footer templates (default: false)
    #[serde(default)]
    pub display_header_footer: Option<bool>,
    /// HTML template for the page header, used with display_header_footer
    #[serde(default)]
    pub header_template: Option<String>,
    /// HTML template for the page footer, used with display_header_footer
    #[serde(default)]
    pub footer_template: Option<String>,
    /// Rendering scale between 0.1 and 2.0 (default: 1.0)
    #[serde(default)]
    pub scale: Option<f64>,
    /// Per-operation timeout in milliseconds (default: 30000)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RenderOptions {
    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let base_name = match self.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(Error::invalid_input("filename is required")),
        };

        let paper_size = match self.paper_size.as_deref() {
            Some(size) => size.parse()?,
            None => DEFAULT_PAPER_SIZE,
        };

        let margins = self.margins.clone().unwrap_or_default();
        let margins = ResolvedMargins {
            top: margins.top.unwrap_or_else(|| DEFAULT_MARGIN_TOP.to_string()),
            right: margins
                .right
                .unwrap_or_else(|| DEFAULT_MARGIN_RIGHT.to_string()),
            bottom: margins
                .bottom
                .unwrap_or_else(|| DEFAULT_MARGIN_BOTTOM.to_string()),
            left: margins.left.unwrap_or_else(|| DEFAULT_MARGIN_LEFT.to_string()),
        };
        // Reject unparsable margins before a browser is involved
        margins.to_inches()?;

        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(Error::invalid_input("timeout_ms must be positive"));
        }

        let scale = self.scale.unwrap_or(1.0);
        if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(Error::invalid_input(format!(
                "scale must be between {} and {}",
                MIN_SCALE, MAX_SCALE
            )));
        }

        Ok(ResolvedOptions {
            base_name,
            orientation: self.orientation.unwrap_or_default(),
            paper_size,
            margins,
            print_background: self.print_background.unwrap_or(true),
            display_header_footer: self.display_header_footer.unwrap_or(false),
            header_template: self.header_template.clone(),
            footer_template: self.footer_template.clone(),
            scale,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Margins with defaults applied, still in their CSS form
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMargins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl ResolvedMargins {
    fn to_inches(&self) -> Result<MarginsInches> {
        Ok(MarginsInches {
            top: parse_length(&self.top)?,
            right: parse_length(&self.right)?,
            bottom: parse_length(&self.bottom)?,
            left: parse_length(&self.left)?,
        })
    }
}

/// Render options with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub base_name: String,
    pub orientation: Orientation,
    pub paper_size: PaperSize,
    pub margins: ResolvedMargins,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub scale: f64,
    pub timeout: Duration,
}

impl ResolvedOptions {
    /// Build the request handed to the export step.
    pub fn pdf_request(&self) -> Result<PdfRequest> {
        let (paper_width, paper_height) = self.paper_size.dimensions();
        let (header_template, footer_template) = if self.display_header_footer {
            (self.header_template.clone(), self.footer_template.clone())
        } else {
            (None, None)
        };

        Ok(PdfRequest {
            landscape: self.orientation == Orientation::Landscape,
            paper_width,
            paper_height,
            margins: self.margins.to_inches()?,
            print_background: self.print_background,
            display_header_footer: self.display_header_footer,
            header_template,
            footer_template,
            scale: self.scale,
        })
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Margins in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginsInches {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Fully normalized export parameters, independent of the browser backend
#[derive(Debug, Clone, PartialEq)]
pub struct PdfRequest {
    pub landscape: bool,
    pub paper_width: f64,
    pub paper_height: f64,
    pub margins: MarginsInches,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub scale: f64,
}

/// Parse a CSS length into inches. Bare numbers are pixels.
pub fn parse_length(value: &str) -> Result<f64> {
    let value = value.trim().to_ascii_lowercase();
    let invalid = || Error::invalid_input(format!("invalid length: {:?}", value));

    let (number, per_inch) = if let Some(n) = value.strip_suffix("in") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("cm") {
        (n, 2.54)
    } else if let Some(n) = value.strip_suffix("mm") {
        (n, 25.4)
    } else if let Some(n) = value.strip_suffix("px") {
        (n, PX_PER_INCH)
    } else {
        (value.as_str(), PX_PER_INCH)
    };

    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }
    Ok(number / per_inch)
}

/// Replace every character outside `[A-Za-z0-9-_]` with `_`.
pub fn sanitize_filename(base: &str) -> String {
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<sanitized-base>_<YYYY-MM-DD_HH-mm-ss>.pdf`
pub fn timestamped_filename<Tz>(base: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}_{}.pdf",
        sanitize_filename(base),
        at.format("%Y-%m-%d_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults_applied() {
        let resolved = RenderOptions::with_filename("x").resolve().unwrap();
        assert_eq!(resolved.base_name, "x");
        assert_eq!(resolved.orientation, Orientation::Portrait);
        assert_eq!(resolved.paper_size, PaperSize::A4);
        assert_eq!(
            resolved.margins,
            ResolvedMargins {
                top: "0.5in".into(),
                right: "0.25in".into(),
                bottom: "0.5in".into(),
                left: "0.25in".into(),
            }
        );
        assert!(resolved.print_background);
        assert!(!resolved.display_header_footer);
        assert_eq!(resolved.timeout, Duration::from_millis(30_000));
        assert_eq!(resolved.scale, 1.0);
    }

    #[test]
    fn test_missing_filename_rejected() {
        let err = RenderOptions::default().resolve().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let err = RenderOptions::with_filename("   ").resolve().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_paper_size_case_normalized() {
        let upper = RenderOptions {
            paper_size: Some("A4".into()),
            ..RenderOptions::with_filename("doc")
        };
        let lower = RenderOptions {
            paper_size: Some("a4".into()),
            ..RenderOptions::with_filename("doc")
        };
        assert_eq!(
            upper.resolve().unwrap().pdf_request().unwrap(),
            lower.resolve().unwrap().pdf_request().unwrap()
        );
    }

    #[rstest]
    #[case("letter", PaperSize::Letter)]
    #[case("Legal", PaperSize::Legal)]
    #[case(" TABLOID ", PaperSize::Tabloid)]
    #[case("ledger", PaperSize::Ledger)]
    #[case("A3", PaperSize::A3)]
    #[case("a6", PaperSize::A6)]
    fn test_paper_size_parse(#[case] input: &str, #[case] expected: PaperSize) {
        assert_eq!(input.parse::<PaperSize>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_paper_size_rejected() {
        let options = RenderOptions {
            paper_size: Some("b5".into()),
            ..RenderOptions::with_filename("doc")
        };
        assert!(matches!(
            options.resolve(),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[rstest]
    #[case("0.5in", 0.5)]
    #[case("2.54cm", 1.0)]
    #[case("25.4mm", 1.0)]
    #[case("96px", 1.0)]
    #[case("48", 0.5)]
    #[case(" 1IN ", 1.0)]
    #[case("0", 0.0)]
    fn test_parse_length(#[case] input: &str, #[case] inches: f64) {
        let parsed = parse_length(input).unwrap();
        assert!((parsed - inches).abs() < 1e-9, "{} -> {}", input, parsed);
    }

    #[rstest]
    #[case("")]
    #[case("in")]
    #[case("abc")]
    #[case("-1in")]
    #[case("1pt")]
    fn test_parse_length_invalid(#[case] input: &str) {
        assert!(parse_length(input).is_err());
    }

    #[test]
    fn test_bad_margin_rejected_at_resolve() {
        let options = RenderOptions {
            margins: Some(MarginOptions {
                left: Some("wide".into()),
                ..MarginOptions::default()
            }),
            ..RenderOptions::with_filename("doc")
        };
        assert!(matches!(
            options.resolve(),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_partial_margins_keep_other_defaults() {
        let options = RenderOptions {
            margins: Some(MarginOptions {
                top: Some("1in".into()),
                ..MarginOptions::default()
            }),
            ..RenderOptions::with_filename("doc")
        };
        let request = options.resolve().unwrap().pdf_request().unwrap();
        assert_eq!(request.margins.top, 1.0);
        assert_eq!(request.margins.right, 0.25);
        assert_eq!(request.margins.bottom, 0.5);
        assert_eq!(request.margins.left, 0.25);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = RenderOptions {
            timeout_ms: Some(0),
            ..RenderOptions::with_filename("doc")
        };
        assert!(matches!(
            options.resolve(),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_scale_bounds() {
        let options = RenderOptions {
            scale: Some(3.0),
            ..RenderOptions::with_filename("doc")
        };
        assert!(options.resolve().is_err());
    }

    #[test]
    fn test_landscape_request() {
        let options = RenderOptions {
            orientation: Some(Orientation::Landscape),
            paper_size: Some("letter".into()),
            ..RenderOptions::with_filename("doc")
        };
        let request = options.resolve().unwrap().pdf_request().unwrap();
        assert!(request.landscape);
        assert_eq!((request.paper_width, request.paper_height), (8.5, 11.0));
    }

    #[test]
    fn test_templates_dropped_without_header_footer() {
        let options = RenderOptions {
            header_template: Some("<span class=\"title\"></span>".into()),
            ..RenderOptions::with_filename("doc")
        };
        let request = options.resolve().unwrap().pdf_request().unwrap();
        assert!(!request.display_header_footer);
        assert_eq!(request.header_template, None);

        let options = RenderOptions {
            display_header_footer: Some(true),
            ..options
        };
        let request = options.resolve().unwrap().pdf_request().unwrap();
        assert!(request.header_template.is_some());
    }

    #[rstest]
    #[case("invoice", "invoice")]
    #[case("Rental Agreement #12", "Rental_Agreement__12")]
    #[case("tax/packet.2024", "tax_packet_2024")]
    #[case("résumé", "r_sum_")]
    #[case("", "")]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(input), expected);
    }

    #[test]
    fn test_sanitize_filename_idempotent() {
        for input in ["a b/c", "ok-name_1", "..\\..", "日本語", "x\ny\tz"] {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn test_timestamped_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            timestamped_filename("Q1 invoice", &at),
            "Q1_invoice_2024-03-09_07-05-01.pdf"
        );
    }

    #[test]
    fn test_options_deserialization() {
        let json = r#"{
            "filename": "invoice",
            "orientation": "landscape",
            "paper_size": "Letter",
            "margins": {"top": "1cm"},
            "timeout_ms": 5000
        }"#;
        let options: RenderOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.orientation, Some(Orientation::Landscape));
        assert_eq!(options.margins.as_ref().unwrap().top.as_deref(), Some("1cm"));
        assert_eq!(options.print_background, None);

        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.paper_size, PaperSize::Letter);
        assert_eq!(resolved.timeout_ms(), 5000);
    }
}
