use glam::{Vec2, Vec3};

use crate::world::angle::Bam;

/// Viewer in world space.
///
/// * `pos.z` is the absolute eye height (not relative to the floor).
/// * Yaw is a binary angle; pitch is in radians, positive looks up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pos: Vec3,
    yaw: Bam,
    pitch: f32,
    fov: f32, // horizontal FoV (radians, typical 90–110°)
}

impl Camera {
    /// Create a new camera at `pos`, facing `yaw`, with horizontal FoV `fov`.
    pub fn new(pos: Vec3, yaw: Bam, fov: f32) -> Self {
        Self {
            pos,
            yaw,
            pitch: 0.0,
            fov,
        }
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(-1.5, 1.5);
        self
    }

    #[inline]
    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    #[inline]
    pub fn yaw(&self) -> Bam {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    /// Unit vector pointing where the camera looks on the X-Y plane.
    #[inline(always)]
    pub fn forward(self) -> Vec2 {
        self.yaw.unit()
    }

    /// Unit vector pointing to the camera's right on the X-Y plane.
    #[inline(always)]
    pub fn right(self) -> Vec2 {
        let f = self.forward();
        Vec2::new(f.y, -f.x)
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Move by `forward` units and `side` (strafe), preserving eye-height.
    pub fn step(&mut self, forward: f32, side: f32) {
        let f = self.forward();
        let r = self.right();
        self.pos.x += f.x * forward + r.x * side;
        self.pos.y += f.y * forward + r.y * side;
    }

    /// Rotate around Z-axis (positive = turn left).
    pub fn turn(&mut self, delta: Bam) {
        self.yaw += delta;
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
