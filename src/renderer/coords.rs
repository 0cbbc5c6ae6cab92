//! Per-vertex texture mapping for the four kinds of world polygon.
//!
//! A unit is built by asking its [`CoordFunc`] for each vertex in turn.  The
//! function returns the final position, the UV, the face normal and the
//! point at which lighting is sampled (which differs from the position for
//! flood polygons, whose texels belong to a plane behind the wall).

use glam::{Vec2, Vec3};

use crate::world::Bam;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordVertex {
    pub pos: Vec3,
    pub uv: Vec2,
    pub normal: Vec3,
    pub lit_pos: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordFunc {
    /// Wall part: U runs along `origin + t·dir`, V follows z.
    Wall {
        origin: Vec2,
        dir: Vec2,
        tx0: f32,
        ty0: f32,
        tx_mul: f32,
        ty_mul: f32,
        normal: Vec3,
    },
    /// Floor or ceiling polygon: UV from world x/y.
    Plane {
        offset: Vec2,
        image_size: Vec2,
        x_mat: Vec2,
        y_mat: Vec2,
        rotation: Bam,
        normal: Vec3,
    },
    /// Vertical stand-in for a missing step: each vertex is projected from
    /// the eye onto the plane at `plane_h` and textured there.
    Flood {
        eye: Vec3,
        plane_h: f32,
        offset: Vec2,
        image_size: Vec2,
        x_mat: Vec2,
        y_mat: Vec2,
        normal: Vec3,
    },
    /// Camera-facing quad with precomputed UVs.
    Sprite { texc: [Vec2; 4], normal: Vec3 },
}

impl CoordFunc {
    pub fn vertex(&self, index: usize, pos: Vec3) -> CoordVertex {
        match *self {
            CoordFunc::Wall {
                origin,
                dir,
                tx0,
                ty0,
                tx_mul,
                ty_mul,
                normal,
            } => {
                let along = if dir.x.abs() > dir.y.abs() {
                    (pos.x - origin.x) / dir.x
                } else if dir.y.abs() > f32::EPSILON {
                    (pos.y - origin.y) / dir.y
                } else {
                    0.0
                };
                CoordVertex {
                    pos,
                    uv: Vec2::new(tx0 + along * tx_mul, ty0 + pos.z * ty_mul),
                    normal,
                    lit_pos: pos,
                }
            }

            CoordFunc::Plane {
                offset,
                image_size,
                x_mat,
                y_mat,
                rotation,
                normal,
            } => CoordVertex {
                pos,
                uv: flat_uv(offset + pos.truncate(), rotation, image_size, x_mat, y_mat),
                normal,
                lit_pos: pos,
            },

            CoordFunc::Flood {
                eye,
                plane_h,
                offset,
                image_size,
                x_mat,
                y_mat,
                normal,
            } => {
                let dz = eye.z - pos.z;
                let along = if dz.abs() > f32::EPSILON {
                    (eye.z - plane_h) / dz
                } else {
                    1.0
                };
                let lit = Vec3::new(
                    eye.x + along * (pos.x - eye.x),
                    eye.y + along * (pos.y - eye.y),
                    plane_h,
                );
                CoordVertex {
                    pos,
                    uv: flat_uv(offset + lit.truncate(), Bam::ZERO, image_size, x_mat, y_mat),
                    normal,
                    lit_pos: lit,
                }
            }

            CoordFunc::Sprite { texc, normal } => CoordVertex {
                pos,
                uv: texc[index & 3],
                normal,
                lit_pos: pos,
            },
        }
    }
}

fn flat_uv(p: Vec2, rotation: Bam, image_size: Vec2, x_mat: Vec2, y_mat: Vec2) -> Vec2 {
    let mut r = p;
    if rotation != Bam::ZERO {
        r = Vec2::from_angle(rotation.radians()).rotate(r);
    }
    let r = r / image_size.max(Vec2::ONE);
    Vec2::new(r.x * x_mat.x + r.y * x_mat.y, r.x * y_mat.x + r.y * y_mat.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_u_follows_dominant_axis() {
        let f = CoordFunc::Wall {
            origin: Vec2::ZERO,
            dir: Vec2::new(128.0, 0.0),
            tx0: 0.0,
            ty0: 1.0,
            tx_mul: 2.0,
            ty_mul: -0.01,
            normal: Vec3::Y,
        };
        let v = f.vertex(0, Vec3::new(64.0, 0.0, 100.0));
        assert!((v.uv - Vec2::new(1.0, 0.0)).length() < 1e-5);
        assert_eq!(v.lit_pos, v.pos);
    }

    #[test]
    fn plane_uv_scales_by_image() {
        let f = CoordFunc::Plane {
            offset: Vec2::ZERO,
            image_size: Vec2::splat(64.0),
            x_mat: Vec2::X,
            y_mat: Vec2::Y,
            rotation: Bam::ZERO,
            normal: Vec3::Z,
        };
        let v = f.vertex(2, Vec3::new(128.0, 32.0, 0.0));
        assert!((v.uv - Vec2::new(2.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn flood_lights_the_plane_point() {
        let f = CoordFunc::Flood {
            eye: Vec3::new(0.0, 0.0, 40.0),
            plane_h: 20.0,
            offset: Vec2::ZERO,
            image_size: Vec2::splat(64.0),
            x_mat: Vec2::X,
            y_mat: Vec2::Y,
            normal: Vec3::Z,
        };
        // a wall point at z=0, 100 units away: the ray hits z=20 half way
        let v = f.vertex(0, Vec3::new(100.0, 0.0, 0.0));
        assert!((v.lit_pos - Vec3::new(50.0, 0.0, 20.0)).length() < 1e-4);
    }

    #[test]
    fn sprite_indices_pick_corners() {
        let texc = [Vec2::ZERO, Vec2::Y, Vec2::ONE, Vec2::X];
        let f = CoordFunc::Sprite {
            texc,
            normal: -Vec3::X,
        };
        assert_eq!(f.vertex(2, Vec3::ZERO).uv, Vec2::ONE);
    }
}
