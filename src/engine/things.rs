//! ----------------------------------------------------------------------------
//! **Sprites**
//!
//! *Walk phase* – every entity linked into a visited subsector becomes a
//! [`DrawThing`] bound to exactly one draw-floor of that subsector.
//!
//! *Draw phase* – each floor's things are ordered back to front and emitted
//! during the translucent pass: sprites as camera-facing quads, models as
//! [`ModelDraw`] requests for the back-end.
//! ----------------------------------------------------------------------------

use glam::{Vec2, Vec3};
use hecs::Entity;
use smallvec::SmallVec;

use crate::{
    engine::{
        bsp::Walker,
        frame::{DrawFloor, DrawFloorId, DrawSubId, DrawThing, DrawThingId, FramePool, YClip},
        pipeline::Drawer,
    },
    renderer::{Blend, CoordFunc, ModelDraw, Unit, UnitKind},
    world::{
        Bam, ImageId, MISSING_IMAGE, Opacity,
        things::{
            Angle, Appearance, Body, ModelRef, Position, PrevPosition, SpriteFrame, Teleport, ThingFlags, YAlign,
        },
    },
};

/*──────────────────────────── Walk phase ─────────────────────────────*/

impl Walker<'_> {
    /// Build the draw record of one entity and bind it to a floor of `ds`.
    pub(crate) fn walk_thing(&mut self, ds: DrawSubId, ent: Entity) {
        // the camera's own body is only seen in mirrors
        if Some(ent) == self.viewer_entity && self.mirrors.is_empty() {
            return;
        }

        let world = self.world;
        let Ok(mut q) = world.query_one::<(
            &Position,
            Option<&PrevPosition>,
            &Angle,
            &Body,
            &Appearance,
            Option<&Teleport>,
        )>(ent) else {
            return;
        };
        let Some((pos, prev, angle, body, look, teleport)) = q.get() else {
            return;
        };

        if look.flags.contains(ThingFlags::INVISIBLE) || teleport.is_some_and(|t| t.0 > 0) {
            return;
        }

        // 1 ─ interpolate, then move into mirror space
        let mut p = pos.0.extend(pos.1);
        if let Some(prev) = prev {
            let from = prev.0.extend(prev.1);
            p = from + (p - from) * self.lerp;
        }
        let m = self.mirrors.point(p.truncate());

        // 2 ─ view-space depth and side offset; a model's mesh reaches
        //     past its origin, so only sprites are culled here
        let tr = m - self.view.pos;
        let tz = tr.x * self.view.cos + tr.y * self.view.sin;
        let tx = tr.x * self.view.sin - tr.y * self.view.cos;
        if look.model.is_none() {
            if self.view.clip.is_clipping() && tz <= 0.0 {
                return;
            }
            if tz >= self.cfg.sprite_min_z && tx.abs() / self.cfg.sprite_side_ratio > tz {
                return;
            }
        }

        // 3 ─ image, horizontal and vertical extent
        let (image, flip, pos1, pos2, mut gzt, mut gzb) = match look.model {
            Some(model) => {
                let skin = model.skin.unwrap_or(MISSING_IMAGE);
                (skin, false, -body.radius, body.radius, p.z + body.height, p.z)
            }
            None => {
                let (image, flip) = self.pick_rotation(&look.frame, angle.0, m);
                let (pos1, pos2, gzt, gzb) = self.sprite_extent(image, flip, look, body, p.z);
                (image, flip, pos1, pos2, gzt, gzb)
            }
        };

        // 4 ─ fix sprites that poke into the floor or ceiling
        let missile = look.flags.contains(ThingFlags::MISSILE);
        let y_clip = if look.model.is_some() || look.flags.contains(ThingFlags::FUZZY) {
            YClip::Never
        } else if look.floorclip > 0.0 {
            gzt -= look.floorclip;
            gzb -= look.floorclip;
            YClip::Hard
        } else if gzb < body.floor_z {
            if missile {
                YClip::Hard
            } else {
                gzt += body.floor_z - gzb;
                gzb = body.floor_z;
                YClip::Soft
            }
        } else if gzt > body.ceiling_z {
            if missile {
                YClip::Hard
            } else {
                gzb -= gzt - body.ceiling_z;
                gzt = body.ceiling_z;
                YClip::Soft
            }
        } else {
            YClip::Soft
        };

        if gzb >= gzt {
            return;
        }
        let top = self.mirrors.height(gzt);
        let bottom = self.mirrors.height(gzb);

        let xy_scale = self.mirrors.xy_scale();
        let edge = Vec2::new(self.view.sin, -self.view.cos) * xy_scale;

        let floor = self.floor_for_height(ds, (top + bottom) * 0.5);
        let Some(floor) = floor else {
            return;
        };
        let props = self.frame.floor(floor).props;

        let id = self.frame.new_thing(DrawThing {
            entity: ent,
            pos: p,
            tx,
            tz,
            top,
            bottom,
            orig_top: top,
            orig_bottom: bottom,
            radius: body.radius,
            left: edge * pos1,
            right: edge * pos2,
            centre: m,
            image,
            flip,
            model: look.model,
            facing: self.mirrors.turn(angle.0),
            reflected: self.mirrors.is_reflective(),
            y_clip,
            props,
            scale: look.scale,
            translucency: look.translucency,
            fuzzy: look.flags.contains(ThingFlags::FUZZY),
            no_zbuf: look.flags.contains(ThingFlags::NO_ZBUFFER),
            xy_scale,
            z_scale: self.mirrors.z_scale(),
        });
        self.frame.floor_mut(floor).things.push(id);
        self.stats.things += 1;
    }

    /// Quad edges and top/bottom heights of a sprite image standing at `z`.
    fn sprite_extent(&self, image: ImageId, flip: bool, look: &Appearance, body: &Body, z: f32) -> (f32, f32, f32, f32) {
        let img = self.bank.get(image);
        let (w, h) = (img.width(), img.height());

        let mut side = img.offset.x - w * 0.5;
        if flip {
            side = -side;
        }
        let x_scale = look.scale * look.aspect;
        let pos1 = (-w * 0.5 - side) * x_scale;
        let pos2 = (w * 0.5 - side) * x_scale;

        let rise = (img.offset.y - h) * look.scale;
        let span = h * look.scale;
        let (gzt, gzb) = match look.y_align {
            YAlign::TopDown => {
                let t = z + body.height + rise;
                (t, t - span)
            }
            YAlign::Middle => {
                let mid = z + body.height * 0.5 + rise;
                (mid + span * 0.5, mid - span * 0.5)
            }
            YAlign::BottomUp => {
                let b = z + rise;
                (b + span, b)
            }
        };
        (pos1, pos2, gzt, gzb)
    }

    /// The first floor (bottom up) whose top is at or above `z`, else the
    /// highest one.  Sprites are never split between floors.
    fn floor_for_height(&self, ds: DrawSubId, z: f32) -> Option<DrawFloorId> {
        let floors = &self.frame.sub(ds).floors;
        floors
            .iter()
            .copied()
            .find(|&f| z <= self.frame.floor(f).top_h)
            .or_else(|| floors.last().copied())
    }

    /// Rotation slot as seen from the eye; reflection flips the picture.
    fn pick_rotation(&self, frame: &SpriteFrame, facing: Bam, at: Vec2) -> (ImageId, bool) {
        let reflective = self.mirrors.is_reflective();
        let rot = match frame.rotations() {
            n if n >= 8 => {
                let mut ang = self.view.angle_to(at) - self.mirrors.turn(facing) + Bam::ANG180;
                if reflective {
                    ang = -ang;
                }
                if n >= 16 {
                    (ang + Bam(Bam::ANG45.0 / 4)).0 >> 28
                } else {
                    (ang + Bam(Bam::ANG45.0 / 2)).0 >> 29
                }
            }
            _ => 0,
        };
        let (image, flip) = frame.pick(rot as usize);
        (image, flip ^ reflective)
    }
}

/*──────────────────────────── Ordering ───────────────────────────────*/

/// Things of `floor` ordered back to front: largest depth first, equal
/// depths settled by entity id (larger first) so frames are reproducible.
pub fn back_to_front(pool: &FramePool, floor: &DrawFloor) -> SmallVec<[DrawThingId; 8]> {
    let mut order: SmallVec<[DrawThingId; 8]> = floor.things.iter().copied().collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (pool.thing(a), pool.thing(b));
        b.tz.total_cmp(&a.tz)
            .then_with(|| b.entity.to_bits().cmp(&a.entity.to_bits()))
    });
    order
}

/*──────────────────────────── Draw phase ─────────────────────────────*/

impl Drawer<'_> {
    pub(crate) fn draw_sorted_things(&mut self, floor: &DrawFloor) {
        if floor.things.is_empty() {
            return;
        }
        let frame = self.frame;
        for id in back_to_front(frame, floor) {
            self.draw_thing(floor, frame.thing(id));
        }
    }

    /// Bottom and top of a hard-clipped sprite cut to the floor it is bound
    /// to.  Heights within `sy_fudge` of a boundary are left alone.
    fn clip_vertically(&self, floor: &DrawFloor, dt: &DrawThing) -> (f32, f32) {
        let (mut bottom, mut top) = (dt.bottom, dt.top);
        if dt.y_clip != YClip::Hard || !self.mirrors.is_empty() {
            return (bottom, top);
        }
        let fudge = self.cfg.sy_fudge;
        if bottom < floor.f_h - fudge && top >= floor.f_h + fudge {
            bottom = floor.f_h;
        }
        if bottom < floor.c_h - fudge && top >= floor.c_h + fudge {
            top = floor.c_h;
        }
        (bottom, top)
    }

    fn draw_thing(&mut self, floor: &DrawFloor, dt: &DrawThing) {
        if let Some(model) = dt.model {
            self.draw_model(dt, model);
            return;
        }

        let mut alpha = dt.translucency;
        if alpha <= 0.0 {
            return;
        }
        let img = self.bank.get(dt.image);
        let h = img.height().max(1.0);
        let (bottom, top) = self.clip_vertically(floor, dt);
        if bottom >= top {
            return;
        }

        // 1 ─ corners
        let mut x1b = dt.centre + dt.left;
        let mut x2b = dt.centre + dt.right;
        let (mut x1t, mut x2t) = (x1b, x2b);

        // mouse-look: lean the quad so it does not look paper-thin
        if self.mirrors.xy_scale() >= 0.99 {
            let full = (dt.orig_top - dt.orig_bottom).max(f32::EPSILON);
            let mut skew = full;
            if dt.radius >= 1.0 && h > dt.radius {
                skew = dt.radius;
            }
            let lean = Vec2::new(self.view.cos, self.view.sin) * self.view.sprite_skew * skew;
            let top_q = (top - dt.orig_bottom) / full - 0.5;
            let bottom_q = (dt.orig_top - bottom) / full - 0.5;
            x1t += lean * top_q;
            x2t += lean * top_q;
            x1b -= lean * bottom_q;
            x2b -= lean * bottom_q;
        }

        // 2 ─ texture coordinates
        let right = img.right();
        let (mut tex_x1, mut tex_x2) = (0.001, right - 0.001);
        if dt.flip {
            (tex_x1, tex_x2) = (right - tex_x1, right - tex_x2);
        }
        let y_scale = dt.scale * dt.z_scale;
        let tex_y1 = bottom - dt.orig_bottom;
        let tex_y2 = tex_y1 + (top - bottom);
        let tex_y1 = img.top() * tex_y1 / (h * y_scale);
        let tex_y2 = img.top() * tex_y2 / (h * y_scale);

        let positions = [
            x1b.extend(bottom),
            x1t.extend(top),
            x2t.extend(top),
            x2b.extend(bottom),
        ];
        let texc = [
            Vec2::new(tex_x1, tex_y1),
            Vec2::new(tex_x1, tex_y2),
            Vec2::new(tex_x2, tex_y2),
            Vec2::new(tex_x2, tex_y1),
        ];

        // 3 ─ blending
        let mut blend = if alpha >= 0.11 && img.opacity != Opacity::Complex {
            Blend::LESS
        } else {
            Blend::MASKED
        };
        if alpha < 0.99 || img.opacity == Opacity::Complex {
            blend |= Blend::ALPHA;
        }
        if dt.no_zbuf {
            blend |= Blend::NO_ZBUF;
        }
        if dt.fuzzy {
            blend = Blend::MASKED | Blend::ALPHA;
            alpha = 1.0;
        }

        let coords = CoordFunc::Sprite {
            texc,
            normal: Vec3::new(-self.view.cos, -self.view.sin, 0.0),
        };
        let props = self.level.props(dt.props);
        let mut unit = Unit::mix(
            UnitKind::Sprite,
            Some(dt.image),
            blend,
            alpha,
            &positions,
            &coords,
            self.shader,
            props,
            0.0,
        );
        // the shadow effect darkens whatever is behind, and takes no light
        if dt.fuzzy {
            for v in unit.verts.iter_mut() {
                v.rgb = Vec3::ZERO;
            }
            self.emit(unit);
        } else {
            self.emit_lit(unit, &positions, &coords);
        }
    }

    fn draw_model(&mut self, dt: &DrawThing, model: ModelRef) {
        let pos = dt.centre.extend(dt.bottom);
        let props = self.level.props(dt.props);
        self.sink.add_model(ModelDraw {
            model: model.model,
            skin: model.skin,
            pos,
            angle: dt.facing,
            scale: dt.scale,
            reflected: dt.reflected,
            alpha: dt.translucency,
            rgb: self.shader.sample(props, 0.0, pos),
            dynamic: self.shader.dynamic(pos),
        });
        self.stats.models += 1;
    }
}

#[cfg(test)]
mod tests {
    use hecs::World;

    use crate::config::RenderConfig;
    use crate::engine::{Engine, Scene};
    use crate::renderer::{BlendClass, FlatShader, LitShader, PointLight, RecordingSink, Shader};
    use crate::world::things::spawn_thing;
    use crate::world::{Camera, Level, PropsRef, SurfaceRef, sample};

    use super::*;

    fn body(floor_z: f32, ceiling_z: f32) -> Body {
        Body {
            radius: 20.0,
            height: 56.0,
            floor_z,
            ceiling_z,
        }
    }

    fn look() -> Appearance {
        Appearance::new(SpriteFrame::single(sample::TROOPER))
    }

    fn render(lvl: &Level, world: &World, scene_viewer: Option<Entity>) -> (Engine, RecordingSink) {
        render_lit(lvl, world, scene_viewer, &FlatShader::default())
    }

    fn render_lit(lvl: &Level, world: &World, scene_viewer: Option<Entity>, shader: &dyn Shader) -> (Engine, RecordingSink) {
        let bank = sample::bank().unwrap();
        let mut engine = Engine::new(RenderConfig::default());
        let mut sink = RecordingSink::new();
        let mut scene = Scene::new(lvl, &bank, world);
        if let Some(e) = scene_viewer {
            scene = scene.with_viewer(e);
        }
        engine.render_frame(
            &scene,
            &Camera::new(Vec3::new(40.0, 128.0, 41.0), Bam::ZERO, std::f32::consts::FRAC_PI_2),
            shader,
            &mut sink,
        );
        (engine, sink)
    }

    fn thing(pool: &mut FramePool, world: &mut World, tz: f32) -> DrawThingId {
        let entity = world.spawn(());
        pool.new_thing(DrawThing {
            entity,
            pos: Vec3::ZERO,
            tx: 0.0,
            tz,
            top: 56.0,
            bottom: 0.0,
            orig_top: 56.0,
            orig_bottom: 0.0,
            radius: 20.0,
            left: Vec2::ZERO,
            right: Vec2::ZERO,
            centre: Vec2::ZERO,
            image: sample::TROOPER,
            flip: false,
            model: None,
            facing: Bam::ZERO,
            reflected: false,
            y_clip: YClip::Soft,
            props: PropsRef::Sector(0),
            scale: 1.0,
            translucency: 1.0,
            fuzzy: false,
            no_zbuf: false,
            xy_scale: 1.0,
            z_scale: 1.0,
        })
    }

    fn floor_with(things: &[DrawThingId]) -> DrawFloor {
        DrawFloor {
            f_h: 0.0,
            c_h: 128.0,
            top_h: 128.0,
            floor: SurfaceRef::Floor(0),
            ceil: SurfaceRef::Ceil(0),
            ef: None,
            props: PropsRef::Sector(0),
            is_lowest: true,
            is_highest: true,
            things: things.iter().copied().collect(),
        }
    }

    #[test]
    fn sort_is_back_to_front_whatever_the_insertion_order() {
        let mut pool = FramePool::new();
        let mut world = World::new();
        let ids: Vec<_> = [30.0, 250.0, 5.0, 120.0, 64.0]
            .into_iter()
            .map(|tz| thing(&mut pool, &mut world, tz))
            .collect();

        let forward = back_to_front(&pool, &floor_with(&ids));
        let reversed: Vec<_> = ids.iter().rev().copied().collect();
        let backward = back_to_front(&pool, &floor_with(&reversed));
        assert_eq!(forward, backward);

        let depths: Vec<f32> = forward.iter().rev().map(|&t| pool.thing(t).tz).collect();
        assert!(depths.windows(2).all(|w| w[0] < w[1]), "{depths:?}");
    }

    #[test]
    fn equal_depths_are_settled_by_entity() {
        let mut pool = FramePool::new();
        let mut world = World::new();
        let a = thing(&mut pool, &mut world, 100.0);
        let b = thing(&mut pool, &mut world, 100.0);
        let (ea, eb) = (pool.thing(a).entity, pool.thing(b).entity);
        let first = if ea.to_bits() > eb.to_bits() { a } else { b };

        assert_eq!(back_to_front(&pool, &floor_with(&[a, b]))[0], first);
        assert_eq!(back_to_front(&pool, &floor_with(&[b, a]))[0], first);
    }

    #[test]
    fn things_bind_to_the_floor_holding_their_middle() {
        let lvl = sample::layered_room().unwrap();
        let mut world = World::new();
        // middle at 70 + 54 - 57 + 28.5 ≈ 95: the 64..128 slice
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 70.0, Bam::ZERO, body(64.0, 128.0), look());
        let (engine, _) = render(&lvl, &world, None);

        let pool = engine.frame();
        let dsub = pool.sub(pool.top()[0]);
        let counts: Vec<usize> = dsub.floors.iter().map(|&f| pool.floor(f).things.len()).collect();
        assert_eq!(counts, vec![0, 1, 0]);
        assert_eq!(engine.stats().things, 1);
    }

    #[test]
    fn soft_clip_lifts_things_out_of_the_floor() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), look());
        let (engine, sink) = render(&lvl, &world, None);

        assert_eq!(engine.frame().thing_count(), 1);
        let sprite = sink.of_kind(UnitKind::Sprite).next().unwrap();
        let lo = sprite.verts.iter().map(|v| v.pos.z).fold(f32::MAX, f32::min);
        assert!(lo.abs() < 1e-4, "{lo}");
        assert_eq!(sink.count(UnitKind::Sprite), 1);
    }

    #[test]
    fn hidden_and_own_body_things_are_skipped() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        let me = spawn_thing(&mut world, Vec2::new(40.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), look());
        let mut ghost = look();
        ghost.flags |= ThingFlags::INVISIBLE;
        spawn_thing(&mut world, Vec2::new(200.0, 100.0), 0.0, Bam::ZERO, body(0.0, 128.0), ghost);
        let porter = spawn_thing(&mut world, Vec2::new(200.0, 150.0), 0.0, Bam::ZERO, body(0.0, 128.0), look());
        world.insert_one(porter, Teleport(5)).unwrap();
        // behind the eye
        spawn_thing(&mut world, Vec2::new(10.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), look());

        let (engine, _) = render(&lvl, &world, Some(me));
        assert_eq!(engine.frame().thing_count(), 0);
    }

    #[test]
    fn eight_rotations_face_the_viewer() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        let mut l = look();
        l.frame = SpriteFrame::rotated(&[1, 2, 3, 4, 5, 6, 7, 8], &[false; 8]);
        // facing the eye (west): rotation 0 shows the front
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 0.0, Bam::ANG180, body(0.0, 128.0), l.clone());
        let (engine, _) = render(&lvl, &world, None);
        let pool = engine.frame();
        assert_eq!(pool.thing(DrawThingId(0)).image, 1);

        // facing away: rotation 4
        let mut world = World::new();
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), l);
        let (engine, _) = render(&lvl, &world, None);
        assert_eq!(engine.frame().thing(DrawThingId(0)).image, 5);
    }

    fn sprite_bottom(sink: &RecordingSink) -> f32 {
        let sprite = sink.of_kind(UnitKind::Sprite).next().unwrap();
        sprite.verts.iter().map(|v| v.pos.z).fold(f32::MAX, f32::min)
    }

    #[test]
    fn missiles_below_the_floor_are_cut_at_it() {
        let lvl = sample::single_room().unwrap();
        let mut missile = look();
        missile.flags |= ThingFlags::MISSILE;

        // image spans z-3 .. z+54: sunk by 13, well past the fudge
        let mut world = World::new();
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), -10.0, Bam::ZERO, body(0.0, 128.0), missile.clone());
        let (engine, sink) = render(&lvl, &world, None);
        assert_eq!(engine.frame().thing(DrawThingId(0)).y_clip, YClip::Hard);
        assert_eq!(sprite_bottom(&sink), 0.0);

        // sunk by 1: inside the fudge, left as it is
        let mut world = World::new();
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 2.0, Bam::ZERO, body(3.0, 128.0), missile);
        let (_, sink) = render(&lvl, &world, None);
        assert!((sprite_bottom(&sink) + 1.0).abs() < 1e-4);
    }

    #[test]
    fn model_behind_the_eye_is_kept() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        let mesh = look().with_model(ModelRef { model: 3, skin: Some(sample::FLAT) });
        spawn_thing(&mut world, Vec2::new(10.0, 128.0), 0.0, Bam::ANG90, body(0.0, 128.0), mesh);
        let (engine, sink) = render(&lvl, &world, None);

        let dt = engine.frame().thing(DrawThingId(0));
        assert!(dt.tz < 0.0);
        assert_eq!(dt.y_clip, YClip::Never);
        assert_eq!((dt.bottom, dt.top), (0.0, 56.0));

        assert_eq!(sink.count(UnitKind::Sprite), 0);
        assert_eq!(sink.models.len(), 1);
        let m = &sink.models[0];
        assert_eq!((m.model, m.skin), (3, Some(sample::FLAT)));
        assert_eq!(m.pos, Vec3::new(10.0, 128.0, 0.0));
        assert_eq!(m.angle, Bam::ANG90);
        assert!(!m.reflected);
        assert_eq!(engine.stats().models, 1);
    }

    #[test]
    fn lit_sprites_get_an_additive_pass() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), look());
        let mut shader = LitShader::default();
        shader.lights.push(PointLight {
            pos: Vec3::new(190.0, 128.0, 28.0),
            radius: 64.0,
            rgb: Vec3::ONE,
        });
        let (_, sink) = render_lit(&lvl, &world, None, &shader);

        let sprites: Vec<&Unit> = sink.of_kind(UnitKind::Sprite).collect();
        assert_eq!(sprites.len(), 2);
        assert_ne!(sprites[0].class(), BlendClass::Additive);
        assert_eq!(sprites[1].class(), BlendClass::Additive);
        assert!(sprites[1].verts.iter().all(|v| v.rgb.max_element() > 0.0));
        let additive = sink
            .units
            .iter()
            .find(|r| r.unit.kind == UnitKind::Sprite && r.unit.class() == BlendClass::Additive)
            .unwrap();
        assert!(!additive.solid_pass);
    }

    #[test]
    fn no_zbuffer_things_ask_for_it() {
        let lvl = sample::single_room().unwrap();
        let mut world = World::new();
        let mut l = look();
        l.flags |= ThingFlags::NO_ZBUFFER;
        spawn_thing(&mut world, Vec2::new(200.0, 128.0), 0.0, Bam::ZERO, body(0.0, 128.0), l);
        let (_, sink) = render(&lvl, &world, None);
        let sprite = sink.of_kind(UnitKind::Sprite).next().unwrap();
        assert!(sprite.blend.contains(Blend::NO_ZBUF));
    }
}
