//! ---- **Subsector visitor** ----
//!
//! Builds the vertical stack of [`DrawFloor`]s for a subsector, binds its
//! things to those floors, walks its segs and files the finished record.

use smallvec::SmallVec;

use crate::{
    engine::{
        bsp::Walker,
        frame::{DrawFloor, DrawSubId},
    },
    world::{ExtrafloorFlags, PropsRef, SegmentId, SubsectorId, SurfaceRef},
};

impl Walker<'_> {
    pub(crate) fn walk_subsector(&mut self, ss: SubsectorId) {
        let level = self.level;
        let sub = &level.subsectors[ss as usize];
        let sector = &level.sectors[sub.sector as usize];

        self.stats.subsectors_visited += 1;
        let ds = self.frame.new_sub(ss);

        // 1 ─ sky planes go straight to the depth buffer
        if self.is_sky(&sector.floor) && self.view.z > sector.floor_h {
            self.sky_plane(ss, sector.floor_h);
        }
        if self.is_sky(&sector.ceil) && self.view.z < sector.sky_h {
            self.sky_plane(ss, sector.sky_h);
        }

        // 2 ─ vertical regions
        self.build_draw_floors(ds, ss);

        // 3 ─ with distance culling, a subsector out of range is dropped
        if self.cfg.culling && !self.within_farclip(ss) {
            log::trace!("subsector {ss} beyond far clip");
            return;
        }

        // things first: the segs below update the occlusion buffer
        for &ent in self.links.in_subsector(ss) {
            self.walk_thing(ds, ent);
        }
        for seg in sub.seg_ids() {
            self.walk_seg(ds, seg as SegmentId);
        }

        if self.frame.sub(ds).visible {
            self.stats.subsectors_visible += 1;
        }
        self.frame.file_sub(ds, self.mirrors.innermost());
    }

    fn within_farclip(&self, ss: SubsectorId) -> bool {
        let level = self.level;
        let range = self.cfg.cull_distance();
        level.subsectors[ss as usize].seg_ids().any(|seg| {
            let seg = seg as SegmentId;
            if self.mirrors.seg_on_portal(level, seg) {
                return false;
            }
            let (a, b) = level.seg_points(seg);
            crate::world::helpers::point_segment_distance(self.view.pos, a, b) <= range
        })
    }

    /// Stack the sector, its height override and its extrafloors into
    /// draw-floors, bottom to top.
    pub(crate) fn build_draw_floors(&mut self, ds: DrawSubId, ss: SubsectorId) {
        let level = self.level;
        let sub = &level.subsectors[ss as usize];
        let sid = sub.sector;
        let sector = &level.sectors[sid as usize];
        let view_z = self.view.z;

        let mut floor_h = sector.floor_h;
        let mut ceil_h = sector.ceil_h;
        let mut floor_s = SurfaceRef::Floor(sid);
        let mut ceil_s = SurfaceRef::Ceil(sid);
        let mut props = PropsRef::Sector(sid);

        if let Some(hs_id) = sector.heightsec {
            // Boom deep water: which band is the eye in?
            let hs = &level.sectors[hs_id as usize];
            if view_z > hs.ceil_h {
                floor_h = hs.ceil_h;
                floor_s = SurfaceRef::Floor(hs_id);
                ceil_s = SurfaceRef::Ceil(hs_id);
                props = PropsRef::Sector(hs_id);
            } else if view_z < hs.floor_h {
                ceil_h = hs.floor_h;
                floor_s = SurfaceRef::Floor(hs_id);
                ceil_s = SurfaceRef::Ceil(hs_id);
                props = PropsRef::Sector(hs_id);
            } else {
                floor_h = hs.floor_h;
                ceil_h = hs.ceil_h;
            }
        } else if let Some(dr) = sub.deep_ref {
            let deep = &level.sectors[dr as usize];
            floor_h = deep.floor_h;
            floor_s = SurfaceRef::Floor(dr);
            ceil_h = deep.ceil_h;
            ceil_s = SurfaceRef::Ceil(dr);
        }

        // old-style Boom deep water borrows the dummy sector's floor
        if let Some(boom) = sector.bottom_liq.or(sector.bottom_ef) {
            let ef = &level.extrafloors[boom as usize];
            if ef.kind.contains(ExtrafloorFlags::BOOM_TEX) {
                floor_s = SurfaceRef::Floor(level.linedefs[ef.line as usize].front_sector);
            }
        }

        for e in level.extrafloors_upward(sid) {
            let ef = &level.extrafloors[e as usize];

            // liquids inside thick solids, or outside the real sector
            if ef.bottom_h < floor_h || ef.bottom_h > sector.ceil_h {
                continue;
            }
            self.add_draw_floor(
                ds,
                DrawFloor {
                    f_h: floor_h,
                    c_h: ef.bottom_h,
                    top_h: ef.top_h,
                    floor: floor_s,
                    ceil: SurfaceRef::ExtraBottom(e),
                    ef: Some(e),
                    props: PropsRef::Extra(e),
                    is_lowest: false,
                    is_highest: false,
                    things: SmallVec::new(),
                },
            );
            floor_s = SurfaceRef::ExtraTop(e);
            floor_h = ef.top_h;
        }

        self.add_draw_floor(
            ds,
            DrawFloor {
                f_h: floor_h,
                c_h: ceil_h,
                top_h: ceil_h,
                floor: floor_s,
                ceil: ceil_s,
                ef: None,
                props,
                is_lowest: false,
                is_highest: false,
                things: SmallVec::new(),
            },
        );

        let floors = &self.frame.sub(ds).floors;
        if let (Some(&lo), Some(&hi)) = (floors.first(), floors.last()) {
            self.frame.floor_mut(lo).is_lowest = true;
            self.frame.floor_mut(hi).is_highest = true;
        }
    }

    fn add_draw_floor(&mut self, ds: DrawSubId, floor: DrawFloor) {
        let f_h = floor.f_h;
        let id = self.frame.new_floor(floor);
        let view_z = self.view.z;

        let dsub = self.frame.sub_mut(ds);
        dsub.floors.push(id);

        // render order: everything above the eye goes in front
        if dsub.floors_r.is_empty() || f_h > view_z {
            dsub.floors_r.insert(0, id);
        } else {
            dsub.floors_r.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use hecs::World;

    use crate::config::RenderConfig;
    use crate::engine::{Engine, Scene};
    use crate::renderer::{FlatShader, RecordingSink};
    use crate::world::{Bam, Camera, Level, PropsRef, SectorId, SurfaceRef, sample};

    fn frame(lvl: &Level, eye: Vec3) -> Engine {
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(RenderConfig::default());
        let cam = Camera::new(eye, Bam::ZERO, std::f32::consts::FRAC_PI_2);
        engine.render_frame(
            &Scene::new(lvl, &bank, &world),
            &cam,
            &FlatShader::default(),
            &mut RecordingSink::new(),
        );
        engine
    }

    fn ranges(engine: &Engine) -> Vec<(f32, f32, bool, bool)> {
        let pool = engine.frame();
        let ds = pool.top()[0];
        pool.sub(ds)
            .floors
            .iter()
            .map(|&f| {
                let f = pool.floor(f);
                (f.f_h, f.c_h, f.is_lowest, f.is_highest)
            })
            .collect()
    }

    #[test]
    fn extrafloors_split_the_sector_into_three() {
        let lvl = sample::layered_room().unwrap();
        let engine = frame(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert_eq!(
            ranges(&engine),
            vec![
                (0.0, 64.0, true, false),
                (64.0, 128.0, false, false),
                (128.0, 256.0, false, true),
            ]
        );
    }

    #[test]
    fn plain_sector_has_one_floor_flagged_both_ways() {
        let lvl = sample::single_room().unwrap();
        let engine = frame(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert_eq!(ranges(&engine), vec![(0.0, 128.0, true, true)]);
    }

    #[test]
    fn render_order_puts_floors_above_the_eye_first() {
        let lvl = sample::layered_room().unwrap();
        // eye inside the middle slice
        let engine = frame(&lvl, Vec3::new(40.0, 128.0, 100.0));
        let pool = engine.frame();
        let dsub = pool.sub(pool.top()[0]);
        let order: Vec<f32> = dsub.floors_r.iter().map(|&f| pool.floor(f).f_h).collect();
        assert_eq!(order, vec![128.0, 0.0, 64.0]);
    }

    #[test]
    fn deep_water_takes_the_reference_heights() {
        let lvl = sample::deep_water_pool().unwrap();
        let pool_ss = sample::POOL_SUBSECTOR;
        let deep = lvl.subsectors[pool_ss as usize].deep_ref.unwrap();
        let deep = &lvl.sectors[deep as usize];

        let engine = frame(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let pool = engine.frame();
        let ds = pool
            .top()
            .iter()
            .copied()
            .find(|&d| pool.sub(d).sub == pool_ss)
            .unwrap();
        let f = pool.floor(pool.sub(ds).floors[0]);
        assert_eq!((f.f_h, f.c_h), (deep.floor_h, deep.ceil_h));
    }

    /// The one draw-floor of the Boom water room seen from height `z`.
    fn boom_band(z: f32) -> (f32, f32, SurfaceRef, SurfaceRef, PropsRef) {
        let lvl = sample::boom_water().unwrap();
        let engine = frame(&lvl, Vec3::new(40.0, 128.0, z));
        let pool = engine.frame();
        let dsub = pool.sub(pool.top()[0]);
        assert_eq!(dsub.floors.len(), 1);
        let f = pool.floor(dsub.floors[0]);
        (f.f_h, f.c_h, f.floor, f.ceil, f.props)
    }

    fn control() -> SectorId {
        sample::boom_water().unwrap().sectors[0].heightsec.unwrap()
    }

    #[test]
    fn boom_band_below_the_water() {
        let hs = control();
        assert_eq!(
            boom_band(41.0),
            (0.0, sample::WATER_LEVEL, SurfaceRef::Floor(hs), SurfaceRef::Ceil(hs), PropsRef::Sector(hs))
        );
    }

    #[test]
    fn boom_band_between_the_control_heights() {
        assert_eq!(
            boom_band(100.0),
            (
                sample::WATER_LEVEL,
                sample::WATER_CEIL,
                SurfaceRef::Floor(0),
                SurfaceRef::Ceil(0),
                PropsRef::Sector(0)
            )
        );
    }

    #[test]
    fn boom_band_above_the_control_ceiling() {
        let hs = control();
        assert_eq!(
            boom_band(220.0),
            (sample::WATER_CEIL, 256.0, SurfaceRef::Floor(hs), SurfaceRef::Ceil(hs), PropsRef::Sector(hs))
        );
    }
}
