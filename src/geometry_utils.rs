use nalgebra::Vector3;

use crate::{Point2D, tracking::Landmark};

pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    ((x2 - x1).powf(2.0) + (y2 - y1).powf(2.0)).sqrt()
}

pub fn centroid(points: &[Point2D]) -> Option<Point2D> {
    let count = points.len();
    points
        .iter()
        .cloned()
        .reduce(|acc, el| (acc.0 + el.0, acc.1 + el.1))
        .map(|(x, y)| (x / count as f32, y / count as f32))
}

pub fn distance_points(a: &Point2D, b: &Point2D) -> f32 {
    let (x1, y1) = *a;
    let (x2, y2) = *b;

    f32::sqrt(f32::powi(x1 - x2, 2) + f32::powi(y1 - y2, 2))
}

/// Planar (x/y) distance between two landmarks, ignoring depth
pub fn landmark_distance_2d(a: &Landmark, b: &Landmark) -> f32 {
    distance(a.x, a.y, b.x, b.y)
}

pub fn landmark_distance_3d(a: &Landmark, b: &Landmark) -> f32 {
    Vector3::new(a.x, a.y, a.z).metric_distance(&Vector3::new(b.x, b.y, b.z))
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1. - t) + (b * t)
}
