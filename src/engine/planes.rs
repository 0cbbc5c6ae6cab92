//! ---- **Floors and ceilings** ----
//!
//! Each draw-floor contributes a floor polygon at its bottom and a ceiling
//! polygon at its top, built from the subsector's seg start points.  Slopes
//! and per-vertex heights only ever apply to the sector's real floor and
//! ceiling.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::{
    engine::{
        frame::{DrawFloorId, DrawSub},
        pipeline::Drawer,
    },
    renderer::{Blend, CoordFunc, Unit, UnitKind},
    world::{Opacity, PropsRef, SurfaceRef},
};

impl Drawer<'_> {
    /// `face` is `+1` for a floor (seen from above), `-1` for a ceiling.
    pub(crate) fn draw_plane(
        &mut self,
        dsub: &DrawSub,
        fid: DrawFloorId,
        orig_h: f32,
        surf_ref: SurfaceRef,
        face: i32,
    ) {
        let level = self.level;
        let frame = self.frame;
        let floor = frame.floor(fid);
        let surf = level.surface(surf_ref);
        let h = self.mirrors.height(orig_h);

        let Some(image) = surf.image else {
            return;
        };
        if self.is_sky(surf) {
            return;
        }

        let sub = &level.subsectors[dsub.sub as usize];
        let sector = &level.sectors[sub.sector as usize];

        // deep water: the outermost planes take the reference's lighting
        let mut props = floor.props;
        if let Some(deep) = sub.deep_ref {
            let first = dsub.floors_r.first() == Some(&fid);
            let last = dsub.floors_r.last() == Some(&fid);
            if (face > 0 && first) || (face < 0 && last) {
                props = PropsRef::Sector(deep);
            }
        }

        let slope = match face {
            1 if floor.is_lowest => sector.floor_slope.as_ref(),
            -1 if floor.is_highest => sector.ceil_slope.as_ref(),
            _ => None,
        };

        // 1 ─ cheap rejections
        let trans = surf.translucency;
        if trans < 0.01 {
            return;
        }
        if (self.view.z > h) != (face > 0) && slope.is_none() && sector.floor_vslope.is_none() {
            return;
        }
        if floor.f_h > floor.c_h && slope.is_none() && sector.ceil_vslope.is_none() {
            return;
        }
        if sub.seg_count == 0 {
            return;
        }

        let img = self.bank.get(image);
        if (trans < 0.99 || img.opacity >= Opacity::Masked) == self.solid {
            return;
        }

        // 2 ─ polygon from the seg start points
        let seg_ids = sub.seg_ids();
        if seg_ids.len() < 3 {
            self.anomaly(format_args!(
                "subsector {} has only {} segs, plane skipped",
                dsub.sub,
                seg_ids.len()
            ));
            return;
        }

        let positions: SmallVec<[Vec3; 16]> = seg_ids
            .take(self.cfg.max_plane_vert)
            .map(|s| {
                let v = &level.vertices[level.segs[s].v1 as usize];
                let mut z = h;

                let vertex_z = match face {
                    1 if sector.floor_vslope.is_some() => v.floor_z,
                    -1 if sector.ceil_vslope.is_some() => v.ceil_z,
                    _ => None,
                };
                if let Some(vz) = vertex_z {
                    z = self.mirrors.height(vz);
                }
                if let Some(s) = slope {
                    z = self.mirrors.height(orig_h + s.height_at(v.pos));
                }
                self.mirrors.point(v.pos).extend(z)
            })
            .collect();

        // 3 ─ texture mapping, scaled down through portals
        let mir_scale = self.mirrors.xy_scale();
        let coords = CoordFunc::Plane {
            offset: surf.offset,
            image_size: Vec2::new(img.width(), img.height()),
            x_mat: surf.x_mat / mir_scale,
            y_mat: surf.y_mat / mir_scale,
            rotation: surf.rotation,
            normal: Vec3::new(0.0, 0.0, if self.view.z > h { 1.0 } else { -1.0 }),
        };

        let unit = Unit::mix(
            UnitKind::Plane,
            Some(image),
            Blend::for_surface(trans, img.opacity),
            trans,
            &positions,
            &coords,
            self.shader,
            level.props(props),
            0.0,
        );
        self.emit_lit(unit, &positions, &coords);
    }
}

#[cfg(test)]
mod tests {
    use hecs::World;

    use crate::config::RenderConfig;
    use crate::engine::{Engine, Scene};
    use crate::renderer::{BlendClass, FlatShader, RecordingSink};
    use crate::world::{Bam, Camera, Level, sample};

    use super::*;

    fn render(lvl: &Level, eye: Vec3) -> (Engine, RecordingSink) {
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(RenderConfig::default());
        let mut sink = RecordingSink::new();
        engine.render_frame(
            &Scene::new(lvl, &bank, &world),
            &Camera::new(eye, Bam::ZERO, std::f32::consts::FRAC_PI_2),
            &FlatShader::default(),
            &mut sink,
        );
        (engine, sink)
    }

    fn heights(sink: &RecordingSink) -> Vec<f32> {
        let mut hs: Vec<f32> = sink
            .of_kind(UnitKind::Plane)
            .map(|u| u.verts[0].pos.z)
            .collect();
        hs.sort_by(f32::total_cmp);
        hs
    }

    #[test]
    fn room_gets_a_floor_and_a_ceiling() {
        let lvl = sample::single_room().unwrap();
        let (_, sink) = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let planes: Vec<_> = sink.of_kind(UnitKind::Plane).collect();
        assert_eq!(planes.len(), 2);

        let floor = planes.iter().find(|u| u.verts[0].pos.z == 0.0).unwrap();
        assert_eq!(floor.verts.len(), 4);
        assert!(floor.verts.iter().all(|v| v.normal == Vec3::Z));
        assert_eq!(floor.class(), BlendClass::Opaque);
    }

    #[test]
    fn planes_facing_away_are_skipped() {
        let lvl = sample::layered_room().unwrap();
        // eye between the bridge (64) and the liquid (128)
        let (_, sink) = render(&lvl, Vec3::new(40.0, 128.0, 100.0));
        // the bridge's underside and the liquid's surface face away
        assert_eq!(heights(&sink), vec![0.0, 64.0, 128.0, 256.0]);
        assert_eq!(sink.count(UnitKind::Plane), 4);
    }

    #[test]
    fn vertex_heights_tilt_the_floor() {
        let lvl = sample::sloped_triangle(32.0).unwrap();
        let (_, sink) = render(&lvl, Vec3::new(64.0, 64.0, 100.0));
        let floor = sink
            .of_kind(UnitKind::Plane)
            .find(|u| u.verts.iter().any(|v| v.pos.z == 0.0))
            .unwrap();
        let raised = floor
            .verts
            .iter()
            .find(|v| v.pos.truncate() == Vec2::new(0.0, sample::ROOM))
            .unwrap();
        assert_eq!(raised.pos.z, 32.0);
    }
}
