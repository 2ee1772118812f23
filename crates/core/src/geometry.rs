//! Page-local geometry primitives.
//!
//! All boxes stored in the document model are axis-aligned and expressed in
//! page-local, unrotated pixel coordinates. Screen coordinates are derived
//! from these only when rendering or hit-testing.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (left, top, right, bottom) in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bbox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bbox {
    /// Create a new bounding box
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a normalized box from two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Union of a sequence of boxes, `None` when empty.
    pub fn union_all<'a, I>(boxes: I) -> Option<Bbox>
    where
        I: IntoIterator<Item = &'a Bbox>,
    {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(u) => Some(u.union(b)),
        })
    }

    /// Strict overlap test (touching edges do not count).
    pub fn intersects(&self, other: &Bbox) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    /// Shift the box by the given offset.
    pub fn translate(&self, dx: f64, dy: f64) -> Bbox {
        Bbox {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between two points
    pub fn midpoint(a: Point, b: Point) -> Point {
        Point {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        }
    }

    /// Euclidean distance between two points
    pub fn distance(a: Point, b: Point) -> f64 {
        ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
    }
}

/// Pixel dimensions of a page image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dims {
    pub width: f64,
    pub height: f64,
}

impl Dims {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_dimensions() {
        let b = Bbox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 50.0);
        assert_eq!(b.center_x(), 60.0);
        assert_eq!(b.center_y(), 45.0);
    }

    #[test]
    fn test_bbox_from_corners_normalizes() {
        let b = Bbox::from_corners(Point::new(50.0, 5.0), Point::new(10.0, 40.0));
        assert_eq!(b, Bbox::new(10.0, 5.0, 50.0, 40.0));
    }

    #[test]
    fn test_bbox_union_all() {
        let boxes = [
            Bbox::new(0.0, 10.0, 5.0, 20.0),
            Bbox::new(-3.0, 12.0, 4.0, 30.0),
        ];
        assert_eq!(
            Bbox::union_all(boxes.iter()),
            Some(Bbox::new(-3.0, 10.0, 5.0, 30.0))
        );
        assert_eq!(Bbox::union_all(std::iter::empty()), None);
    }

    #[test]
    fn test_bbox_intersects_excludes_touching() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Bbox::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&Bbox::new(10.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_point_distance_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(6.0, 8.0);
        assert_eq!(Point::distance(a, b), 10.0);
        assert_eq!(Point::midpoint(a, b), Point::new(3.0, 4.0));
    }
}
