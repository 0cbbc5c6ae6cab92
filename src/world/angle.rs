//! Binary angle measurement.
//!
//! A full turn maps onto the whole `u32` range so that wrap-around is plain
//! integer overflow.  `0` points east, angles grow counter-clockwise.

use glam::Vec2;
use std::f64::consts::TAU;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bam(pub u32);

const TURN: f64 = 4_294_967_296.0;

impl Bam {
    pub const ZERO: Bam = Bam(0);
    pub const ANG1: Bam = Bam(0x00B6_0B60);
    pub const ANG45: Bam = Bam(0x2000_0000);
    pub const ANG90: Bam = Bam(0x4000_0000);
    pub const ANG180: Bam = Bam(0x8000_0000);
    pub const ANG270: Bam = Bam(0xC000_0000);

    #[inline]
    pub fn from_radians(r: f32) -> Self {
        Self::from_radians_f64(r as f64)
    }

    #[inline]
    fn from_radians_f64(r: f64) -> Self {
        let turns = (r / TAU).rem_euclid(1.0);
        Bam((turns * TURN) as u64 as u32)
    }

    #[inline]
    pub fn from_degrees(d: f32) -> Self {
        Self::from_radians(d.to_radians())
    }

    /// Radians in `[0, 2π)`.
    #[inline]
    pub fn radians(self) -> f32 {
        (self.0 as f64 / TURN * TAU) as f32
    }

    #[inline]
    pub fn degrees(self) -> f32 {
        (self.0 as f64 / TURN * 360.0) as f32
    }

    /// Direction of the vector `(dx, dy)`.
    #[inline]
    pub fn of_vector(dx: f32, dy: f32) -> Self {
        if dx == 0.0 && dy == 0.0 {
            return Bam::ZERO;
        }
        Self::from_radians_f64((dy as f64).atan2(dx as f64))
    }

    /// Angle of the ray `from -> to`.
    #[inline]
    pub fn between(from: Vec2, to: Vec2) -> Self {
        Self::of_vector(to.x - from.x, to.y - from.y)
    }

    #[inline]
    pub fn sin(self) -> f32 {
        self.radians().sin()
    }

    #[inline]
    pub fn cos(self) -> f32 {
        self.radians().cos()
    }

    /// Unit vector pointing along this angle.
    #[inline]
    pub fn unit(self) -> Vec2 {
        let (s, c) = self.radians().sin_cos();
        Vec2::new(c, s)
    }

    #[inline]
    pub fn wrapping_mul(self, k: u32) -> Self {
        Bam(self.0.wrapping_mul(k))
    }
}

impl Add for Bam {
    type Output = Bam;
    #[inline]
    fn add(self, rhs: Bam) -> Bam {
        Bam(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Bam {
    #[inline]
    fn add_assign(&mut self, rhs: Bam) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Bam {
    type Output = Bam;
    #[inline]
    fn sub(self, rhs: Bam) -> Bam {
        Bam(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Bam {
    #[inline]
    fn sub_assign(&mut self, rhs: Bam) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl Neg for Bam {
    type Output = Bam;
    #[inline]
    fn neg(self) -> Bam {
        Bam(self.0.wrapping_neg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinal_directions() {
        assert_eq!(Bam::of_vector(1.0, 0.0), Bam::ZERO);
        assert_eq!(Bam::of_vector(0.0, 1.0), Bam::ANG90);
        assert_eq!(Bam::of_vector(-1.0, 0.0), Bam::ANG180);
        assert_eq!(Bam::of_vector(0.0, -1.0), Bam::ANG270);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(Bam::ANG270 + Bam::ANG180, Bam::ANG90);
        assert_eq!(Bam::ZERO - Bam::ANG90, Bam::ANG270);
        assert_eq!(-Bam::ANG90, Bam::ANG270);
        assert_eq!(Bam::ANG90.wrapping_mul(2), Bam::ANG180);
    }

    #[test]
    fn negative_radians_wrap_into_range() {
        let a = Bam::from_radians(-std::f32::consts::FRAC_PI_2);
        assert!((a.degrees() - 270.0).abs() < 1e-3);
    }

    #[test]
    fn unit_vector_matches_angle() {
        let v = Bam::ANG45.unit();
        assert!((v.x - v.y).abs() < 1e-6);
        assert!((v.length() - 1.0).abs() < 1e-6);
    }
}
