//! Page content model handed from the document service to the renderer.

use crate::foundation::core::{ProcessColor, Rect};

/// Content of one page, handed over by the document service.
///
/// Geometry is in 96-dpi document units. The paint model is deliberately
/// small: a base process color covering the page plus zero or more spot
/// colorant fills. That is the part of a page description the merge stage
/// acts on; everything else a full document model would carry is outside
/// this crate's boundary.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PageContent {
    /// Page width in 96-dpi units.
    pub width: f64,
    /// Page height in 96-dpi units.
    pub height: f64,
    /// Process color covering the full page extent.
    #[serde(default = "default_base")]
    pub base: ProcessColor,
    /// Spot colorant fills, painted in order on top of the base.
    #[serde(default)]
    pub spot_fills: Vec<SpotFill>,
}

fn default_base() -> ProcessColor {
    ProcessColor::WHITE
}

impl PageContent {
    /// A blank page of the given size in 96-dpi units.
    pub fn blank(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            base: ProcessColor::WHITE,
            spot_fills: Vec::new(),
        }
    }

    /// Full page extent as a rectangle in document units.
    pub fn extent(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// A rectangular region painted with a named spot colorant at a tint.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SpotFill {
    /// Spot colorant name, e.g. `"Foo"`.
    pub colorant: String,
    /// Tint fraction in [0, 1]; 1.0 is solid ink.
    pub tint: f64,
    /// Filled region in document units.
    pub rect: Rect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_content_round_trips_through_json() {
        let content = PageContent {
            width: 96.0,
            height: 96.0,
            base: ProcessColor::new(0.0, 0.0, 0.0, 0.1),
            spot_fills: vec![SpotFill {
                colorant: "Foo".to_owned(),
                tint: 0.5,
                rect: Rect::new(8.0, 8.0, 88.0, 88.0),
            }],
        };

        let json = serde_json::to_string(&content).unwrap();
        let back: PageContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.width, content.width);
        assert_eq!(back.spot_fills.len(), 1);
        assert_eq!(back.spot_fills[0].colorant, "Foo");
    }

    #[test]
    fn base_defaults_to_white_when_omitted() {
        let content: PageContent =
            serde_json::from_str(r#"{"width": 10.0, "height": 20.0}"#).unwrap();
        assert_eq!(content.base, ProcessColor::WHITE);
        assert!(content.spot_fills.is_empty());
        assert_eq!(content.extent(), Rect::new(0.0, 0.0, 10.0, 20.0));
    }
}
