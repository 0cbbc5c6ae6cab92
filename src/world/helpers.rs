use glam::Vec2;

use crate::world::bsp;

/// Directed partition line `origin + t·dir`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DivLine {
    pub origin: Vec2,
    pub dir: Vec2,
}

impl DivLine {
    #[inline]
    pub fn through(a: Vec2, b: Vec2) -> Self {
        Self {
            origin: a,
            dir: b - a,
        }
    }

    /// 0 = front, 1 = back (same convention as BSP nodes).
    #[inline]
    pub fn point_side(&self, p: Vec2) -> i32 {
        bsp::point_side(self.origin, self.dir, p)
    }

    /// Fraction along `a -> b` where that segment crosses this line.
    ///
    /// `None` when the two are parallel.
    pub fn intercept(&self, a: Vec2, b: Vec2) -> Option<f32> {
        let d = b - a;
        let den = d.x * self.dir.y - d.y * self.dir.x;
        if den.abs() < f32::EPSILON {
            return None;
        }
        let num = (self.origin.x - a.x) * self.dir.y + (a.y - self.origin.y) * self.dir.x;
        Some(num / den)
    }

    /// Point where `a -> b` crosses this line (clamped to the segment).
    pub fn intersection(&self, a: Vec2, b: Vec2) -> Vec2 {
        match self.intercept(a, b) {
            Some(t) => a + (b - a) * t.clamp(0.0, 1.0),
            None => a,
        }
    }
}

/// Distance from `p` to the closed segment `a–b`.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let d = b - a;
    let len_sq = d.length_squared();
    if len_sq < f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(d) / len_sq).clamp(0.0, 1.0);
    p.distance(a + d * t)
}
