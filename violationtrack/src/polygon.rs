//! Zone polygons with boundary-inclusive containment

use crate::bbox::Point;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Tolerance for treating a point as lying on an edge, in squared pixels
const EDGE_EPSILON: f64 = 1e-9;

/// A simple closed polygon in pixel space
///
/// Vertices are stored in the order given; the last vertex connects back
/// to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Build a polygon, rejecting degenerate outlines
    ///
    /// A polygon needs at least 3 finite vertices and a non-zero area.
    pub fn new(vertices: Vec<Point>) -> Result<Self> {
        if vertices.len() < 3 {
            bail!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            );
        }
        if let Some(bad) = vertices.iter().find(|p| !p.is_finite()) {
            bail!("polygon vertex ({}, {}) is not finite", bad.x, bad.y);
        }
        let polygon = Self { vertices };
        if polygon.area() <= f64::EPSILON {
            bail!("polygon has zero area");
        }
        Ok(polygon)
    }

    /// Build a polygon from `[x, y]` pairs
    pub fn from_points(points: &[[f32; 2]]) -> Result<Self> {
        Self::new(points.iter().copied().map(Point::from).collect())
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Unsigned area via the shoelace formula
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.vertices[i];
                let b = self.vertices[(i + 1) % n];
                a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
            })
            .sum();
        twice.abs() / 2.0
    }

    /// True when `point` is inside the polygon or exactly on its outline
    pub fn covers(&self, point: &Point) -> bool {
        let n = self.vertices.len();
        let (px, py) = (point.x as f64, point.y as f64);

        for i in 0..n {
            if on_segment(px, py, self.vertices[i], self.vertices[(i + 1) % n]) {
                return true;
            }
        }

        // Ray casting to the right; edges are half-open in y so shared
        // vertices are not counted twice.
        let mut inside = false;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            if (ay > py) != (by > py) {
                let x_cross = ax + (py - ay) * (bx - ax) / (by - ay);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(px: f64, py: f64, a: Point, b: Point) -> bool {
    let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > EDGE_EPSILON * (1.0 + (bx - ax).abs() + (by - ay).abs()) {
        return false;
    }
    px >= ax.min(bx) - EDGE_EPSILON
        && px <= ax.max(bx) + EDGE_EPSILON
        && py >= ay.min(by) - EDGE_EPSILON
        && py <= ay.max(by) + EDGE_EPSILON
}

impl TryFrom<Vec<[f32; 2]>> for Polygon {
    type Error = anyhow::Error;

    fn try_from(points: Vec<[f32; 2]>) -> Result<Self> {
        Polygon::from_points(&points)
    }
}

impl From<Polygon> for Vec<[f32; 2]> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices.iter().map(|p| [p.x, p.y]).collect()
    }
}
