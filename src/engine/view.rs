//! Per-frame view state derived from the [`Camera`].

use glam::{Vec2, Vec3};

use crate::world::{Bam, Camera};

/// Vertical slope of the classic 320×200 view at a 90° horizontal FoV.
const DOOM_YSLOPE: f32 = 0.525;

/// Angular window the walk clips against, relative to the view angle.
///
/// `scope == ANG180` means "no clipping" (the pitch is so steep that every
/// horizontal direction may be on screen).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipWindow {
    pub left: Bam,
    pub right: Bam,
    pub scope: Bam,
}

impl ClipWindow {
    /// Window spanning `right -> left`.
    pub fn between(left: Bam, right: Bam) -> Self {
        Self {
            left,
            right,
            scope: left - right,
        }
    }

    pub fn unclipped() -> Self {
        Self {
            left: Bam::ANG45,
            right: -Bam::ANG45,
            scope: Bam::ANG180,
        }
    }

    #[inline]
    pub fn is_clipping(&self) -> bool {
        self.scope != Bam::ANG180
    }

    /// Clip the view-relative span `right -> left` to the window.
    ///
    /// `None` when the span lies completely outside.
    pub fn clamp(&self, mut left: Bam, mut right: Bam) -> Option<(Bam, Bam)> {
        if !self.is_clipping() {
            return Some((left, right));
        }
        let tspan1 = left - self.right;
        let tspan2 = self.left - right;

        if tspan1 > self.scope {
            // left edge is off to the left
            if tspan2 >= Bam::ANG180 {
                return None;
            }
            left = self.left;
        }
        if tspan2 > self.scope {
            // right edge is off to the right
            if tspan1 >= Bam::ANG180 {
                return None;
            }
            right = self.right;
        }
        Some((left, right))
    }
}

/// Everything the walk needs to know about the eye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    pub pos: Vec2,
    pub z: f32,
    pub angle: Bam,
    pub sin: f32,
    pub cos: f32,
    /// Pitch in radians, positive looks up.
    pub pitch: f32,
    pub x_slope: f32,
    pub y_slope: f32,
    /// Tilt applied to sprites under mouse-look.
    pub sprite_skew: f32,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub clip: ClipWindow,
}

impl Viewer {
    /// `expand_w` widens the horizontal slope for wide screens
    /// (1.0 for the classic 4:3 view).
    pub fn new(camera: &Camera, expand_w: f32) -> Self {
        let fov = camera.fov().clamp(5f32.to_radians(), 175f32.to_radians());

        let x_slope = (fov * 0.5).tan();
        let y_slope = DOOM_YSLOPE * x_slope;
        let x_slope = x_slope * expand_w;

        let angle = camera.yaw();
        let (sin, cos) = (angle.sin(), angle.cos());
        let pitch = camera.pitch();
        let (lk_sin, lk_cos) = pitch.sin_cos();

        let forward = Vec3::new(lk_cos * cos, lk_cos * sin, lk_sin);
        let up = Vec3::new(-lk_sin * cos, -lk_sin * sin, lk_cos);
        let right = forward.cross(up);

        // 1 ─ project the view rectangle's side edges onto the horizon
        let k = pitch.abs();
        let d = k.cos() - k.sin() * y_slope;

        let clip = if d <= 0.01 {
            ClipWindow::unclipped()
        } else {
            let side = Bam::of_vector(d, x_slope);
            ClipWindow::between(side, -side)
        };

        let pos = camera.pos();
        Self {
            pos: pos.truncate(),
            z: pos.z,
            angle,
            sin,
            cos,
            pitch,
            x_slope,
            y_slope,
            sprite_skew: (-pitch / 2.0).tan(),
            forward,
            up,
            right,
            clip,
        }
    }

    #[inline]
    pub fn eye(&self) -> Vec3 {
        self.pos.extend(self.z)
    }

    /// Absolute angle from the eye to `p`.
    #[inline]
    pub fn angle_to(&self, p: Vec2) -> Bam {
        Bam::between(self.pos, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn cam(pitch: f32) -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 41.0), Bam::ANG90, FRAC_PI_2).with_pitch(pitch)
    }

    #[test]
    fn level_view_clips_to_half_fov() {
        let v = Viewer::new(&cam(0.0), 1.0);
        assert!(v.clip.is_clipping());
        assert!((v.clip.left.degrees() - 45.0).abs() < 0.01);
        assert!((v.clip.right.degrees() - 315.0).abs() < 0.01);
        assert!((v.forward - Vec3::Y).length() < 1e-5);
        assert!((v.right - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn steep_pitch_disables_angular_clipping() {
        let v = Viewer::new(&cam(1.4), 1.0);
        assert!(!v.clip.is_clipping());
        assert!(v.sprite_skew < 0.0);
    }

    #[test]
    fn clamp_trims_and_rejects() {
        let w = ClipWindow::between(Bam::ANG45, -Bam::ANG45);
        let deg = Bam::from_degrees;

        assert_eq!(w.clamp(deg(10.0), deg(350.0)), Some((deg(10.0), deg(350.0))));
        assert_eq!(w.clamp(deg(80.0), deg(20.0)), Some((Bam::ANG45, deg(20.0))));
        assert_eq!(w.clamp(deg(120.0), deg(60.0)), None);
        assert_eq!(w.clamp(deg(300.0), deg(240.0)), None);
    }
}
