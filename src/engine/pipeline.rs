//! ----------------------------------------------------------------------------
//! **Two-pass emission**
//!
//! Replays the records collected by the walk:
//!
//! 1. *solid pass* – subsectors front to back, opaque units only; mirrors
//!    hanging off a subsector are drawn (with their own two passes) before
//!    that subsector's walls and planes.
//! 2. *translucent pass* – subsectors back to front, masked/blended units
//!    and sprites only.
//! ----------------------------------------------------------------------------

use glam::{Vec2, Vec3};

use crate::{
    config::RenderConfig,
    engine::{
        FrameStats,
        frame::{DrawMirrorId, DrawSubId, FramePool},
        mirror::{MirrorDef, MirrorHost, MirrorScope, MirrorStack},
        view::Viewer,
    },
    renderer::{Blend, BlendClass, CoordFunc, Shader, Unit, UnitKind, UnitSink},
    world::{ImageBank, Level, Rgb, Surface},
};

/// Everything the draw phase reads and writes.
pub(crate) struct Drawer<'a> {
    pub level: &'a Level,
    pub bank: &'a ImageBank,
    pub cfg: &'a RenderConfig,
    pub view: Viewer,
    pub shader: &'a dyn Shader,
    pub frame: &'a FramePool,
    pub mirrors: &'a mut MirrorStack,
    pub sink: &'a mut dyn UnitSink,
    pub stats: &'a mut FrameStats,
    /// `true` while the opaque front-to-back pass runs.
    pub solid: bool,
}

impl MirrorHost for Drawer<'_> {
    fn mirrors(&mut self) -> &mut MirrorStack {
        &mut *self.mirrors
    }

    fn mirrors_changed(&mut self) {
        let planes = self.mirrors.clip_planes(self.level, self.view.pos);
        self.sink.set_clip_planes(&planes);
    }
}

impl Drawer<'_> {
    #[inline]
    pub(crate) fn is_sky(&self, surf: &Surface) -> bool {
        surf.image.is_some_and(|id| self.bank.get(id).is_sky)
    }

    /*──────────────────────────── Output ─────────────────────────────*/

    pub(crate) fn emit(&mut self, unit: Unit) {
        if unit.class() == BlendClass::Opaque {
            self.stats.solid_units += 1;
        } else {
            self.stats.translucent_units += 1;
        }
        self.sink.add_unit(unit);
    }

    /// Emit `unit`, followed by its additive pass when dynamic light
    /// reaches it.
    pub(crate) fn emit_lit(&mut self, unit: Unit, positions: &[Vec3], coords: &CoordFunc) {
        let glow = unit.light_pass(positions, coords, self.shader);
        self.emit(unit);
        if let Some(glow) = glow {
            self.emit(glow);
        }
    }

    /// Count and report a unit that had to be skipped.
    pub(crate) fn anomaly(&mut self, what: std::fmt::Arguments<'_>) {
        self.stats.anomalies += 1;
        log::warn!("{what}");
    }

    /*──────────────────────────── Lists ──────────────────────────────*/

    pub(crate) fn draw_sub_list(&mut self, subs: &[DrawSubId], for_mirror: bool) {
        // 1 ─ solid walls and planes, near to far
        self.solid = true;
        self.sink.begin_units(true);
        for &ds in subs {
            self.draw_subsector(ds, for_mirror);
        }
        self.sink.finish_units();

        // 2 ─ sprites and masked/translucent parts, far to near
        self.solid = false;
        self.sink.begin_units(false);
        for &ds in subs.iter().rev() {
            self.draw_subsector(ds, for_mirror);
        }
        self.sink.finish_units();
    }

    fn draw_subsector(&mut self, ds: DrawSubId, mirror_sub: bool) {
        let frame = self.frame;
        let dsub = frame.sub(ds);

        if self.solid {
            for &m in &dsub.mirrors {
                self.draw_mirror(m);
            }
        }

        for &fid in &dsub.floors_r {
            let floor = frame.floor(fid);
            for &seg in &dsub.segs {
                self.draw_seg(floor, seg, mirror_sub);
            }
            self.draw_plane(dsub, fid, floor.c_h, floor.ceil, -1);
            self.draw_plane(dsub, fid, floor.f_h, floor.floor, 1);

            if !self.solid {
                self.draw_sorted_things(floor);
            }
        }
    }

    /*──────────────────────────── Mirrors ────────────────────────────*/

    fn draw_mirror(&mut self, id: DrawMirrorId) {
        let level = self.level;
        let frame = self.frame;
        let mir = frame.mirror(id);
        level.mark_mapped(mir.def.line);

        self.sink.finish_units();
        if let Some(mut scope) = MirrorScope::enter(self, level, id, mir.def) {
            scope.draw_sub_list(&mir.subs, true);
        }

        if mir.def.is_portal {
            self.portal_polygon(&mir.def);
        } else {
            self.mirror_polygon(&mir.def);
        }

        // resume the outer solid pass
        self.solid = true;
        self.sink.begin_units(true);
    }

    /// Quad over the mirror line, floor to ceiling of its front sector.
    fn surface_quad(&self, def: &MirrorDef) -> [Vec3; 4] {
        let level = self.level;
        let ld = &level.linedefs[def.line as usize];
        let sec = &level.sectors[ld.front_sector as usize];

        let (p1, p2) = level.seg_points(def.seg);
        let (p1, p2) = (self.mirrors.point(p1), self.mirrors.point(p2));
        let z1 = self.mirrors.height(sec.floor_h);
        let z2 = self.mirrors.height(sec.ceil_h);
        [p1.extend(z1), p1.extend(z2), p2.extend(z2), p2.extend(z1)]
    }

    fn mirror_polygon(&mut self, def: &MirrorDef) {
        let depth = self.mirrors.depth() as f32;
        let alpha = 0.15 + 0.10 * depth;

        let special = self.level.linedefs[def.line as usize].special;
        let rgb = match special {
            // reduced colour looks better in multiple reflections
            Some(sp) => sp.fx_color.to_vec3() / (1.0 + 1.5 * depth),
            None => Rgb::RED.to_vec3(),
        };

        let quad = self.surface_quad(def);
        let unit = Unit::flat(UnitKind::Mirror, Blend::ALPHA, alpha, rgb, &quad);
        self.overlay(unit);
    }

    /// A standard portal shows its middle texture over the opening; other
    /// portals are tinted like mirrors.
    fn portal_polygon(&mut self, def: &MirrorDef) {
        let level = self.level;
        let seg = &level.segs[def.seg as usize];
        let ld = &level.linedefs[def.line as usize];

        let surf = seg.sidedef.map(|sd| &level.sidedefs[sd as usize].middle);
        let (Some(surf), Some(special)) = (surf, ld.special) else {
            self.mirror_polygon(def);
            return;
        };
        let Some(image) = surf.image else {
            self.mirror_polygon(def);
            return;
        };
        if !special.portal_standard {
            self.mirror_polygon(def);
            return;
        }

        let img = self.bank.get(image);
        let (total_w, total_h) = (img.total_w as f32, img.total_h as f32);
        let quad = self.surface_quad(def);
        let (z1, z2) = (quad[0].z, quad[1].z);

        let tx1 = seg.offset * surf.x_mat.x / total_w;
        let tx2 = (seg.offset + seg.length) * surf.x_mat.x / total_w;
        let ty2 = (z2 - z1) * surf.y_mat.y / total_h;
        let texc = [
            Vec2::new(tx1, 0.0),
            Vec2::new(tx1, ty2),
            Vec2::new(tx2, ty2),
            Vec2::new(tx2, 0.0),
        ];

        let rgb = special.fx_color.to_vec3();
        let alpha = special.translucency * surf.translucency;
        let mut unit = Unit::flat(UnitKind::Portal, Blend::ALPHA, alpha, rgb, &quad);
        unit.image = Some(image);
        for (v, uv) in unit.verts.iter_mut().zip(texc) {
            v.uv = uv;
        }
        self.overlay(unit);
    }

    /// Overlays go out in a batch of their own, between the passes of the
    /// enclosing list.
    fn overlay(&mut self, unit: Unit) {
        self.sink.begin_units(false);
        self.emit(unit);
        self.sink.finish_units();
    }

    /// Wall coordinate function for the quad `p1 -> p2`.
    pub(crate) fn wall_coords(
        p1: Vec2,
        p2: Vec2,
        tx0: f32,
        ty0: f32,
        tx_mul: f32,
        ty_mul: f32,
    ) -> CoordFunc {
        CoordFunc::Wall {
            origin: p1,
            dir: p2 - p1,
            tx0,
            ty0,
            tx_mul,
            ty_mul,
            normal: Vec3::new(p2.y - p1.y, p1.x - p2.x, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use hecs::World;

    use crate::engine::{Engine, Scene};
    use crate::renderer::{FlatShader, RecordingSink};
    use crate::world::{Bam, Camera, Level, LinedefFlags, LinedefId, sample};

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

    #[test]
    fn solid_pass_precedes_translucent_pass() {
        let lvl = sample::grate().unwrap();
        let (_, sink) = render(&lvl, Vec3::new(40.0, 128.0, 41.0));

        let first_translucent = sink.units.iter().position(|r| !r.solid_pass).unwrap();
        assert!(sink.units[..first_translucent].iter().all(|r| r.unit.class() == BlendClass::Opaque));
        assert!(sink.units[first_translucent..].iter().all(|r| r.unit.class() != BlendClass::Opaque));
        assert_eq!(sink.batches, 2);
    }

    #[test]
    fn two_frames_emit_the_same_units() {
        let lvl = sample::mirror_room(2).unwrap();
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(RenderConfig::default());
        let cam = Camera::new(Vec3::new(40.0, 100.0, 41.0), Bam::from_degrees(10.0), 1.6);

        let mut a = RecordingSink::new();
        let mut b = RecordingSink::new();
        let scene = Scene::new(&lvl, &bank, &world);
        let sa = engine.render_frame(&scene, &cam, &FlatShader::default(), &mut a);
        let sb = engine.render_frame(&scene, &cam, &FlatShader::default(), &mut b);
        assert_eq!(a, b);
        assert_eq!(sa, sb);
    }

    #[test]
    fn mirror_contents_come_before_the_overlay() {
        let lvl = sample::mirror_room(1).unwrap();
        let (engine, sink) = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert_eq!(engine.stats().mirrors_entered, 1);

        let overlay = sink
            .units
            .iter()
            .position(|r| r.unit.kind == UnitKind::Mirror)
            .unwrap();
        let inside = sink.units[..overlay].iter().filter(|r| r.clip_planes == 3).count();
        assert!(inside > 0);
        // the overlay is drawn with the mirror popped
        assert_eq!(sink.units[overlay].clip_planes, 0);
        let tint = &sink.units[overlay].unit;
        assert!((tint.alpha - 0.15).abs() < 1e-6);
        assert_eq!(tint.verts[0].rgb, Vec3::X);
        let line = lvl
            .linedefs
            .iter()
            .position(|l| l.flags.contains(LinedefFlags::MIRROR))
            .unwrap();
        assert!(lvl.is_mapped(line as LinedefId));
    }

    #[test]
    fn standard_portal_shows_its_middle_texture() {
        let lvl = sample::portal_rooms().unwrap();
        let (engine, sink) = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert!(engine.stats().mirrors_entered >= 1);

        let portal: Vec<_> = sink.of_kind(UnitKind::Portal).collect();
        assert!(!portal.is_empty());
        assert!(portal.iter().all(|u| u.image == Some(sample::WALL)));
        assert_eq!(sink.count(UnitKind::Mirror), 0);
    }
}
