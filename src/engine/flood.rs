//! ---- **Flood emulation** ----
//!
//! An untextured step normally leaves a hole the old software renderer
//! "flooded" with whatever plane lay beyond.  The gap is covered with the
//! neighbour's floor (or ceiling) instead: the wall area is cut into small
//! pieces and every vertex is projected from the eye onto the plane height
//! to find its texture coordinate.

use glam::{Vec2, Vec3};

use crate::{
    engine::pipeline::Drawer,
    renderer::{Blend, CoordFunc, Unit, UnitKind},
    world::{PropsRef, SectorId, SegmentId},
};

const MAX_PIECES: usize = 64;
const MAX_COLUMNS: usize = 16;
const PIECE_SIZE: f32 = 16.0;

/// Split a `w × h` area into `(columns, rows)`, halving the larger side
/// until the pieces are small enough or the piece limit is hit.
fn subdivide(mut w: f32, mut h: f32) -> (usize, usize) {
    let (mut cols, mut rows) = (1, 1);
    while w > PIECE_SIZE || h > PIECE_SIZE {
        if cols * rows >= MAX_PIECES {
            break;
        }
        if cols >= MAX_COLUMNS && rows >= MAX_COLUMNS {
            break;
        }
        if w >= h && cols < MAX_COLUMNS {
            w /= 2.0;
            cols *= 2;
        } else {
            h /= 2.0;
            rows *= 2;
        }
    }
    (cols, rows)
}

impl Drawer<'_> {
    /// Fill `h1..h2` along the seg with the floor (`face > 0`) or ceiling
    /// (`face < 0`) of `flood_ref`.
    pub(crate) fn flood(
        &mut self,
        seg_id: SegmentId,
        flood_ref: SectorId,
        face: i32,
        h1: f32,
        h2: f32,
    ) {
        if self.mirrors.depth() > 0 {
            return;
        }

        let level = self.level;
        let sec = &level.sectors[flood_ref as usize];
        let seg = &level.segs[seg_id as usize];
        let surf = if face > 0 { &sec.floor } else { &sec.ceil };

        // 1 ─ nothing worth flooding with
        let Some(image) = surf.image else {
            return;
        };
        if self.is_sky(surf) || surf.translucency < 0.01 {
            return;
        }
        // closed sector: a see-through door
        if sec.floor_h >= sec.ceil_h {
            return;
        }
        // fake bridge
        if let Some(ld) = seg.linedef.map(|l| &level.linedefs[l as usize]) {
            if ld.back_sector == Some(ld.front_sector) {
                return;
            }
        }

        // 2 ─ piece grid
        let (cols, rows) = subdivide(seg.length, h2 - h1);
        let img = self.bank.get(image);
        let normal = Vec3::new(0.0, 0.0, face.signum() as f32);
        let coords = CoordFunc::Flood {
            eye: self.view.eye(),
            plane_h: if face > 0 { h2 } else { h1 },
            offset: surf.offset,
            image_size: Vec2::new(img.width(), img.height()),
            x_mat: surf.x_mat,
            y_mat: surf.y_mat,
            normal,
        };
        let props = level.props(PropsRef::Sector(flood_ref));

        let (s, e) = level.seg_points(seg_id);
        let d = e - s;
        let dh = h2 - h1;
        let at = |col: usize| s + d * (col as f32 / cols as f32);

        // 3 ─ one quad per piece, bottom row first
        for row in 0..rows {
            let z1 = h1 + dh * row as f32 / rows as f32;
            let z2 = z1 + dh / rows as f32;
            for col in 0..cols {
                let (a, b) = (at(col), at(col + 1));
                let quad = [a.extend(z1), a.extend(z2), b.extend(z2), b.extend(z1)];
                let unit = Unit::mix(
                    UnitKind::Flood,
                    Some(image),
                    Blend::empty(),
                    1.0,
                    &quad,
                    &coords,
                    self.shader,
                    props,
                    0.0,
                );
                self.emit_lit(unit, &quad, &coords);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hecs::World;

    use crate::config::RenderConfig;
    use crate::engine::{Engine, Scene};
    use crate::renderer::{FlatShader, RecordingSink};
    use crate::world::{Bam, Camera, Level, sample};

    use super::*;

    /// Step up to 20 with the riser's lower texture taken away.
    fn bare_step() -> Level {
        let mut lvl = sample::step((0.0, 200.0), (20.0, 200.0)).unwrap();
        let ld = &lvl.linedefs[sample::JOIN_LINE as usize];
        for sd in [ld.right_sidedef, ld.left_sidedef].into_iter().flatten() {
            lvl.sidedefs[sd as usize].lower.image = None;
        }
        lvl
    }

    fn render(lvl: &Level, cfg: RenderConfig) -> RecordingSink {
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(cfg);
        let mut sink = RecordingSink::new();
        engine.render_frame(
            &Scene::new(lvl, &bank, &world),
            &Camera::new(Vec3::new(40.0, 128.0, 41.0), Bam::ZERO, std::f32::consts::FRAC_PI_2),
            &FlatShader::default(),
            &mut sink,
        );
        sink
    }

    #[test]
    fn pieces_stay_small_and_few() {
        assert_eq!(subdivide(8.0, 8.0), (1, 1));
        assert_eq!(subdivide(256.0, 20.0), (16, 2));
        let (c, r) = subdivide(4096.0, 4096.0);
        assert!(c <= MAX_COLUMNS && c * r <= MAX_PIECES);
    }

    #[test]
    fn bare_riser_is_flooded_with_the_upper_floor() {
        let lvl = bare_step();
        let sink = render(&lvl, RenderConfig::default());

        let pieces: Vec<_> = sink.of_kind(UnitKind::Flood).collect();
        assert_eq!(pieces.len(), 32);
        for u in pieces {
            assert_eq!(u.image, Some(sample::FLAT));
            assert!(u.verts.iter().all(|v| (0.0..=20.0).contains(&v.pos.z)));
            assert!(u.verts.iter().all(|v| v.normal == Vec3::Z));
        }
    }

    #[test]
    fn no_flooding_when_disabled() {
        let lvl = bare_step();
        let cfg = RenderConfig {
            flood_emulation: false,
            ..RenderConfig::default()
        };
        assert_eq!(render(&lvl, cfg).count(UnitKind::Flood), 0);
    }

    #[test]
    fn textured_risers_are_not_flooded() {
        let lvl = sample::step((0.0, 200.0), (20.0, 200.0)).unwrap();
        assert_eq!(render(&lvl, RenderConfig::default()).count(UnitKind::Flood), 0);
    }
}
