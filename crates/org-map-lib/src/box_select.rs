//! Rectangle selection on the map
//!
//! A drag is only accepted while the selection modifier is held. On release the two
//! opposite screen corners are unprojected through the host surface and every point whose
//! true coordinate falls inside the resulting lon/lat box is selected.

use crate::{JitteredPoint, MapSurface};
use geo::Coord;

/// Axis-aligned rectangle in screen pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub min: Coord<f64>,
    pub max: Coord<f64>,
}

impl ScreenRect {
    /// Rectangle spanned by two arbitrary corners
    pub fn from_corners(a: Coord<f64>, b: Coord<f64>) -> Self {
        Self {
            min: Coord {
                x: a.x.min(b.x),
                y: a.y.min(b.y),
            },
            max: Coord {
                x: a.x.max(b.x),
                y: a.y.max(b.y),
            },
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Zero width or height
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Box selection gesture and its last result
#[derive(Clone, Debug, Default)]
pub struct BoxSelection {
    modifier_held: bool,
    drag: Option<(Coord<f64>, Coord<f64>)>,
    selected: Vec<usize>,
}

impl BoxSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_modifier(&mut self, held: bool) {
        self.modifier_held = held;
    }

    pub fn modifier_held(&self) -> bool {
        self.modifier_held
    }

    /// Whether the selection overlay should receive pointer events
    pub fn captures_pointer(&self) -> bool {
        self.modifier_held || self.drag.is_some()
    }

    /// Begin a drag at `screen`; ignored unless the modifier is held
    pub fn drag_start(&mut self, screen: Coord<f64>) -> bool {
        if !self.modifier_held {
            return false;
        }
        self.drag = Some((screen, screen));
        true
    }

    pub fn drag_move(&mut self, screen: Coord<f64>) {
        if let Some((_, current)) = &mut self.drag {
            *current = screen;
        }
    }

    /// Rectangle to draw while dragging
    pub fn overlay(&self) -> Option<ScreenRect> {
        self.drag.map(|(start, current)| ScreenRect::from_corners(start, current))
    }

    /// Finish the drag at `screen` and select the points under the rectangle
    ///
    /// Returns `None` when no drag was in progress or no surface is available, leaving the
    /// previous result untouched. Otherwise the previous result is replaced.
    pub fn drag_end(
        &mut self,
        screen: Coord<f64>,
        surface: Option<&dyn MapSurface>,
        points: &[JitteredPoint],
    ) -> Option<&[usize]> {
        let (start, _) = self.drag.take()?;
        let surface = surface?;
        let rect = ScreenRect::from_corners(start, screen);

        self.selected = if rect.is_degenerate() {
            Vec::new()
        } else {
            let a = surface.unproject(rect.min);
            let b = surface.unproject(rect.max);
            select_in_bounds(points, [a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y)])
        };
        tracing::debug!("Box selection picked {} points", self.selected.len());
        Some(&self.selected)
    }

    /// Indices of the points picked by the last completed drag
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn clear(&mut self) {
        self.drag = None;
        self.selected.clear();
    }
}

/// Indices of points whose true coordinate lies in `[west, south, east, north]`
pub fn select_in_bounds(points: &[JitteredPoint], bounds: [f64; 4]) -> Vec<usize> {
    let [west, south, east, north] = bounds;
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let (lon, lat) = (p.point.longitude, p.point.latitude);
            west <= lon && lon <= east && south <= lat && lat <= north
        })
        .map(|(i, _)| i)
        .collect()
}
