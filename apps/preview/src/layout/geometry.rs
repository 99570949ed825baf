//! Page geometry for the supported paper formats.
//!
//! Dimensions are CSS px at 96 px/in, matching the preview surface. The usable content
//! height per page is `page_height - 2 * margin`; any change to format or margin
//! invalidates the current placement plan.

use serde::{Deserialize, Serialize};

use crate::layout::paginator::ConfigurationError;

/// CSS pixels per inch.
pub const PX_PER_INCH: f64 = 96.0;

// ────────────────────────────────────────────────────────────────────────────
// Page format
// ────────────────────────────────────────────────────────────────────────────

/// Supported paper formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// 210mm × 297mm.
    A4,
    /// 8.5in × 11in.
    Letter,
}

impl PageFormat {
    /// `(width, height)` in CSS px, rounded to whole pixels.
    pub fn dimensions_px(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (794.0, 1123.0),
            PageFormat::Letter => (8.5 * PX_PER_INCH, 11.0 * PX_PER_INCH),
        }
    }
}

impl std::str::FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "letter" | "us-letter" => Ok(PageFormat::Letter),
            other => Err(format!("unknown page format '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

/// Page format plus a uniform margin on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub format: PageFormat,
    pub margin_px: f64,
}

/// Default geometry: A4 with half-inch margins.
pub fn default_geometry() -> PageGeometry {
    PageGeometry {
        format: PageFormat::A4,
        margin_px: 0.5 * PX_PER_INCH,
    }
}

impl PageGeometry {
    pub fn page_width(&self) -> f64 {
        self.format.dimensions_px().0
    }

    pub fn page_height(&self) -> f64 {
        self.format.dimensions_px().1
    }

    /// Usable content height per page.
    pub fn inner_height(&self) -> f64 {
        self.page_height() - 2.0 * self.margin_px
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.margin_px.is_finite() || self.margin_px < 0.0 || self.inner_height() <= 0.0 {
            return Err(ConfigurationError::InvalidMargin {
                margin: self.margin_px,
                page_height: self.page_height(),
            });
        }
        Ok(())
    }

    /// Top offset of each page in the scrolled preview: `index * page_height`.
    pub fn page_offsets(&self, page_count: usize) -> Vec<f64> {
        let height = self.page_height();
        (0..page_count).map(|i| i as f64 * height).collect()
    }

    /// Index of the page shown at `scroll_top`, clamped to `[0, page_count)`.
    pub fn page_index_at(&self, scroll_top: f64, page_count: usize) -> usize {
        if page_count == 0 || !scroll_top.is_finite() || scroll_top <= 0.0 {
            return 0;
        }
        let index = (scroll_top / self.page_height()).floor() as usize;
        index.min(page_count - 1)
    }

    /// Fraction of the full preview height scrolled past, clamped to `[0, 1]`.
    pub fn scroll_ratio(&self, scroll_top: f64, page_count: usize) -> f64 {
        let total = page_count as f64 * self.page_height();
        if total <= 0.0 || !scroll_top.is_finite() {
            return 0.0;
        }
        (scroll_top / total).clamp(0.0, 1.0)
    }
}
