//! Named physical page sizes accepted by the export pipeline.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::core::geometry::Orientation;

/// Physical page size in millimetres, portrait orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    /// ISO A4, the default export format.
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    /// Page dimensions with the orientation applied: landscape swaps the
    /// nominal width and height.
    pub fn oriented(&self, orientation: Orientation) -> (f64, f64) {
        match orientation {
            Orientation::Portrait => (self.width_mm, self.height_mm),
            Orientation::Landscape => (self.height_mm, self.width_mm),
        }
    }
}

static PAGE_FORMATS: Lazy<HashMap<&'static str, PageFormat>> = Lazy::new(|| {
    let mut registry = HashMap::new();

    registry.insert("A0", PageFormat { width_mm: 841.0, height_mm: 1189.0 });
    registry.insert("A1", PageFormat { width_mm: 594.0, height_mm: 841.0 });
    registry.insert("A2", PageFormat { width_mm: 420.0, height_mm: 594.0 });
    registry.insert("A3", PageFormat { width_mm: 297.0, height_mm: 420.0 });
    registry.insert("A4", PageFormat::A4);
    registry.insert("A5", PageFormat { width_mm: 148.0, height_mm: 210.0 });
    registry.insert("LETTER", PageFormat { width_mm: 215.9, height_mm: 279.4 });
    registry.insert("LEGAL", PageFormat { width_mm: 215.9, height_mm: 355.6 });
    registry.insert("TABLOID", PageFormat { width_mm: 279.4, height_mm: 431.8 });
    registry.insert("LEDGER", PageFormat { width_mm: 431.8, height_mm: 279.4 });

    registry
});

/// Case-insensitive lookup of a named page format.
pub fn lookup(name: &str) -> Option<PageFormat> {
    PAGE_FORMATS.get(name.to_ascii_uppercase().as_str()).copied()
}

/// All registered format names with their portrait dimensions.
pub fn all() -> Vec<(&'static str, PageFormat)> {
    let mut formats: Vec<_> = PAGE_FORMATS.iter().map(|(n, f)| (*n, *f)).collect();
    formats.sort_by_key(|(name, _)| *name);
    formats
}
