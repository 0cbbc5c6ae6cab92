//! ---- **Sky pieces** ----
//!
//! Sky walls and sky planes carry no texture: they only prime the depth
//! buffer at the sky's position so the back-end's sky fill shows through
//! them and nothing behind them is drawn.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::{
    engine::bsp::Walker,
    renderer::{Blend, Unit, UnitKind},
    world::{SegmentId, SubsectorId},
};

impl Walker<'_> {
    /// Vertical sky pieces along a queued seg.
    pub(crate) fn sky_walls(&mut self, seg_id: SegmentId) {
        let level = self.level;
        let seg = &level.segs[seg_id as usize];
        let Some(fs) = seg.front_sector else {
            return;
        };
        let f = &level.sectors[fs as usize];
        let b = seg.back_sector.map(|bs| &level.sectors[bs as usize]);

        // 1 ─ sky floors: fill the drop between them
        if let Some(b) = b {
            if self.is_sky(&f.floor) && self.is_sky(&b.floor) && f.floor_h < b.floor_h {
                self.sky_wall(seg_id, f.floor_h, b.floor_h);
            }
        }

        // 2 ─ sky ceilings
        if self.is_sky(&f.ceil) {
            let back_open = match b {
                None => true,
                Some(b) => !self.is_sky(&b.ceil) || b.floor_h >= f.ceil_h,
            };
            if f.ceil_h < f.sky_h && back_open {
                self.sky_wall(seg_id, f.ceil_h, f.sky_h);
            } else if let Some(b) = b {
                if self.is_sky(&b.ceil) && f.heightsec.is_none() && b.heightsec.is_none() {
                    let max_f = f.floor_h.max(b.floor_h);
                    if b.ceil_h <= max_f && max_f < f.sky_h {
                        self.sky_wall(seg_id, max_f, f.sky_h);
                    }
                }
            }
        } else if let Some(b) = b {
            // upper part of a sky hole seen from under a normal ceiling
            let upper_blank = seg
                .sidedef
                .is_none_or(|sd| level.sidedefs[sd as usize].upper.image.is_none());
            if self.is_sky(&b.ceil) && upper_blank && b.ceil_h < f.ceil_h {
                self.sky_wall(seg_id, b.ceil_h, f.ceil_h);
            }
        }
    }

    fn sky_wall(&mut self, seg_id: SegmentId, h1: f32, h2: f32) {
        let (mut p1, mut p2) = self.level.seg_points(seg_id);
        p1 = self.mirrors.point(p1);
        p2 = self.mirrors.point(p2);
        let (z1, z2) = (self.mirrors.height(h1), self.mirrors.height(h2));

        let quad = [
            p1.extend(z1),
            p1.extend(z2),
            p2.extend(z2),
            p2.extend(z1),
        ];
        self.emit_sky(UnitKind::SkyWall, &quad);
    }

    /// Horizontal sky piece covering the subsector at height `h`.
    pub(crate) fn sky_plane(&mut self, ss: SubsectorId, h: f32) {
        let level = self.level;
        let z = self.mirrors.height(h);
        let poly: SmallVec<[Vec3; 16]> = level.subsectors[ss as usize]
            .seg_ids()
            .map(|s| {
                let v: Vec2 = level.vertex(level.segs[s].v1);
                self.mirrors.point(v).extend(z)
            })
            .collect();

        if poly.len() < 3 {
            return;
        }
        self.emit_sky(UnitKind::SkyPlane, &poly);
    }

    fn emit_sky(&mut self, kind: UnitKind, points: &[Vec3]) {
        self.stats.sky_units += 1;
        self.sink
            .add_sky(Unit::flat(kind, Blend::empty(), 1.0, Vec3::ONE, points));
    }
}
