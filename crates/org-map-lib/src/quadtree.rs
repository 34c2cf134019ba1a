//! Point quadtree for range and radius queries
//!
//! Each zoom level of the cluster index keeps its nodes in one of these trees.
//! Coordinates live in normalized world space (`[0, 1]²`, see
//! [`crate::utils::lon_lat_to_world`]); the tree stores item indices only.

use geo::{Coord, Rect};

/// Maximum depth of the quadtree to prevent infinite recursion on coincident points
const MAX_DEPTH: u32 = 24;

/// Number of items a leaf node holds before it is subdivided
const MAX_ITEMS_PER_NODE: usize = 16;

/// Spatial index over indexed points
#[derive(Debug, Clone)]
pub(crate) struct Quadtree {
    root: QuadtreeNode,
    len: usize,
}

/// A single node in the quadtree
#[derive(Debug, Clone)]
struct QuadtreeNode {
    /// Bounds in world space
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    level: u32,
    /// Items stored at this node (only leaves and depth-capped nodes hold items)
    items: Vec<(usize, Coord<f64>)>,
    /// Child nodes (NW, NE, SW, SE) if subdivided
    children: Option<Box<[QuadtreeNode; 4]>>,
}

impl Quadtree {
    /// Create an empty tree covering the unit world square
    pub fn new() -> Self {
        Self {
            root: QuadtreeNode::new(
                Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }),
                0,
            ),
            len: 0,
        }
    }

    /// Build a tree from `(index, position)` pairs
    pub fn from_items(items: impl IntoIterator<Item = (usize, Coord<f64>)>) -> Self {
        let mut tree = Self::new();
        for (index, position) in items {
            tree.insert(index, position);
        }
        tree
    }

    pub fn insert(&mut self, index: usize, position: Coord<f64>) {
        self.root.insert(index, clamp_to_world(position));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Indices of all items inside `area` (inclusive bounds)
    pub fn range(&self, area: Rect<f64>) -> Vec<usize> {
        let mut results = Vec::new();
        self.root.query_range(area, &mut results);
        results
    }

    /// Indices of all items within `radius` (Euclidean, world units) of `center`
    pub fn within(&self, center: Coord<f64>, radius: f64) -> Vec<usize> {
        let area = Rect::new(
            Coord {
                x: center.x - radius,
                y: center.y - radius,
            },
            Coord {
                x: center.x + radius,
                y: center.y + radius,
            },
        );
        let radius_sq = radius * radius;

        let mut candidates = Vec::new();
        self.root.query_range_with_positions(area, &mut candidates);
        candidates
            .into_iter()
            .filter(|(_, p)| {
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                dx * dx + dy * dy <= radius_sq
            })
            .map(|(index, _)| index)
            .collect()
    }
}

impl QuadtreeNode {
    fn new(bounding_box: Rect<f64>, level: u32) -> Self {
        Self {
            bounding_box,
            level,
            items: Vec::new(),
            children: None,
        }
    }

    /// Subdivide this node into 4 children and push existing items down
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return; // Already subdivided
        }

        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;
        let child_level = self.level + 1;

        // World space has y growing south, so "north" is the low-y half
        let nw = QuadtreeNode::new(
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            child_level,
        );
        let ne = QuadtreeNode::new(
            Rect::new(Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
            child_level,
        );
        let sw = QuadtreeNode::new(
            Rect::new(Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            child_level,
        );
        let se = QuadtreeNode::new(
            Rect::new(Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            child_level,
        );

        let mut children = Box::new([nw, ne, sw, se]);
        for (index, position) in std::mem::take(&mut self.items) {
            children[self.child_slot(position)].insert(index, position);
        }
        self.children = Some(children);
    }

    /// Which child (NW, NE, SW, SE) a position belongs to
    fn child_slot(&self, position: Coord<f64>) -> usize {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let is_east = position.x >= (min.x + max.x) / 2.0;
        let is_south = position.y >= (min.y + max.y) / 2.0;
        match (is_east, is_south) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    fn insert(&mut self, index: usize, position: Coord<f64>) {
        if self.children.is_none() {
            if self.items.len() < MAX_ITEMS_PER_NODE || self.level >= MAX_DEPTH {
                self.items.push((index, position));
                return;
            }
            self.subdivide();
        }

        let slot = self.child_slot(position);
        if let Some(children) = &mut self.children {
            children[slot].insert(index, position);
        }
    }

    fn intersects(&self, area: Rect<f64>) -> bool {
        let a = self.bounding_box;
        a.min().x <= area.max().x
            && a.max().x >= area.min().x
            && a.min().y <= area.max().y
            && a.max().y >= area.min().y
    }

    fn query_range(&self, area: Rect<f64>, out: &mut Vec<usize>) {
        if !self.intersects(area) {
            return;
        }
        out.extend(
            self.items
                .iter()
                .filter(|(_, p)| contains(area, *p))
                .map(|(index, _)| *index),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_range(area, out);
            }
        }
    }

    fn query_range_with_positions(&self, area: Rect<f64>, out: &mut Vec<(usize, Coord<f64>)>) {
        if !self.intersects(area) {
            return;
        }
        out.extend(self.items.iter().filter(|(_, p)| contains(area, *p)).copied());
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_range_with_positions(area, out);
            }
        }
    }
}

#[inline]
fn contains(area: Rect<f64>, p: Coord<f64>) -> bool {
    p.x >= area.min().x && p.x <= area.max().x && p.y >= area.min().y && p.y <= area.max().y
}

#[inline]
fn clamp_to_world(p: Coord<f64>) -> Coord<f64> {
    Coord {
        x: p.x.clamp(0.0, 1.0),
        y: p.y.clamp(0.0, 1.0),
    }
}
