//! ----------------------------------------------------------------------------
//! **BSP front‑to‑back traversal**
//!
//! Responsible for
//! * visiting subsectors in **front‑to‑back** order from the real eye
//! * rejecting subtrees whose bounding box is off screen or occluded
//! * clipping every seg against the view window and the 1D occlusion buffer
//! * entering mirrors and portals with a nested walk from the root
//!
//! Nothing is drawn here apart from sky pieces: the walk only collects
//! [`FramePool`] records for the draw phase.
//! ----------------------------------------------------------------------------

use glam::Vec2;
use hecs::{Entity, World};

use crate::{
    config::RenderConfig,
    engine::{
        FrameStats,
        frame::{DrawSubId, FramePool},
        mirror::{MirrorDef, MirrorHost, MirrorScope, MirrorStack},
        occlusion::OcclusionBuffer,
        view::{ClipWindow, Viewer},
    },
    renderer::UnitSink,
    world::{
        Aabb, Bam, ImageBank, Level, SegmentId, Surface,
        bsp::{CHILD_MASK, SUBSECTOR_BIT, point_side},
        helpers::{DivLine, point_segment_distance},
        things::ThingLinks,
    },
};

/// Spans narrower than this are never tested against the occlusion buffer.
const MIN_TEST_SPAN: Bam = Bam(Bam::ANG1.0 / 4);

/// Everything one walk reads and writes.
pub(crate) struct Walker<'a> {
    pub level: &'a Level,
    pub bank: &'a ImageBank,
    pub world: &'a World,
    pub links: &'a ThingLinks,
    pub cfg: &'a RenderConfig,
    /// The eye; `view.clip` narrows while inside a mirror.
    pub view: Viewer,
    /// Entity the camera is attached to (not drawn outside mirrors).
    pub viewer_entity: Option<Entity>,
    /// Interpolation fraction between the previous and current tic.
    pub lerp: f32,
    pub occlusion: &'a mut OcclusionBuffer,
    pub mirrors: &'a mut MirrorStack,
    pub frame: &'a mut FramePool,
    pub sink: &'a mut dyn UnitSink,
    pub stats: &'a mut FrameStats,
}

impl MirrorHost for Walker<'_> {
    fn mirrors(&mut self) -> &mut MirrorStack {
        &mut *self.mirrors
    }

    fn mirrors_changed(&mut self) {
        let planes = self.mirrors.clip_planes(self.level, self.view.pos);
        self.sink.set_clip_planes(&planes);
    }
}

impl Walker<'_> {
    #[inline]
    pub(crate) fn is_sky(&self, surf: &Surface) -> bool {
        surf.image.is_some_and(|id| self.bank.get(id).is_sky)
    }

    /*──────────────────────────── Nodes ──────────────────────────────*/

    /// Recursively walk the tree below `child`, near side first.
    pub(crate) fn walk_node(&mut self, child: u16) {
        // Leaf? ──────
        if child & SUBSECTOR_BIT != 0 {
            self.walk_subsector(child & CHILD_MASK);
            return;
        }

        // Internal node ──────
        self.stats.nodes_visited += 1;
        let level = self.level;
        let node = &level.nodes[child as usize];

        // the splitter moves with the world, the eye stays put
        let (mut a, mut b) = node.endpoints();
        a = self.mirrors.point(a);
        b = self.mirrors.point(b);
        if self.mirrors.is_reflective() {
            std::mem::swap(&mut a, &mut b);
        }
        let side = point_side(a, b - a, self.view.pos) as usize;

        if self.check_bbox(&node.bbox[side]) {
            self.walk_node(node.child[side]);
        }
        if self.check_bbox(&node.bbox[side ^ 1]) {
            self.walk_node(node.child[side ^ 1]);
        }
    }

    /// Might some part of the box be visible?
    pub(crate) fn check_bbox(&mut self, bbox: &Aabb) -> bool {
        // a flipped box may no longer be axis aligned
        let bb = if self.mirrors.is_empty() {
            *bbox
        } else {
            let mut nb = Aabb::EMPTY;
            for i in 0..4 {
                nb.add_point(self.mirrors.point(bbox.corner(i)));
            }
            nb
        };

        // 1 ─ pick the two silhouette corners as seen from the eye
        let v = self.view.pos;
        let boxx = if v.x <= bb.min.x {
            0
        } else if v.x < bb.max.x {
            1
        } else {
            2
        };
        let boxy = if v.y >= bb.max.y {
            0
        } else if v.y > bb.min.y {
            1
        } else {
            2
        };

        let (lo, hi) = (bb.min, bb.max);
        let (p1, p2) = match boxy * 4 + boxx {
            0 => (hi, lo),
            1 => (hi, Vec2::new(lo.x, hi.y)),
            2 => (Vec2::new(hi.x, lo.y), Vec2::new(lo.x, hi.y)),
            4 => (Vec2::new(lo.x, hi.y), lo),
            6 => (Vec2::new(hi.x, lo.y), hi),
            8 => (Vec2::new(lo.x, hi.y), Vec2::new(hi.x, lo.y)),
            9 => (lo, Vec2::new(hi.x, lo.y)),
            10 => (lo, hi),
            // eye inside the box
            _ => return true,
        };

        // 2 ─ angular span against the clip window
        let ang_l = self.view.angle_to(p1);
        let ang_r = self.view.angle_to(p2);

        // sitting on a line?
        if ang_l - ang_r >= Bam::ANG180 {
            return true;
        }

        let (mut l, mut r) = (ang_l - self.view.angle, ang_r - self.view.angle);

        if self.view.clip.is_clipping() {
            let Some((cl, cr)) = self.view.clip.clamp(l, r) else {
                self.stats.boxes_culled += 1;
                return false;
            };
            if cl == cr {
                self.stats.boxes_culled += 1;
                return false;
            }
            (l, r) = (cl, cr);

            if self.cfg.culling {
                let (x1, y1, x2, y2) = (p1.x, p1.y, p2.x, p2.y);
                let closest = [
                    (Vec2::new(x1, y1), Vec2::new(x2, y1)),
                    (Vec2::new(x1, y1), Vec2::new(x1, y2)),
                    (Vec2::new(x2, y1), Vec2::new(x2, y2)),
                    (Vec2::new(x1, y2), Vec2::new(x2, y2)),
                ]
                .iter()
                .map(|&(a, b)| point_segment_distance(v, a, b))
                .fold(f32::MAX, f32::min);

                if closest > self.cfg.cull_distance() {
                    self.stats.boxes_culled += 1;
                    return false;
                }
            }
        }

        // 3 ─ occlusion
        let open = !self.occlusion.test(r, l);
        if !open {
            self.stats.boxes_culled += 1;
        }
        open
    }

    /*───────────────────────────── Segs ──────────────────────────────*/

    /// Clip one seg, update the occlusion buffer and queue it for drawing
    /// (or look through it).
    pub(crate) fn walk_seg(&mut self, ds: DrawSubId, seg_id: SegmentId) {
        let level = self.level;

        // the surface we are looking through is not part of the view
        if self.mirrors.seg_on_portal(level, seg_id) {
            return;
        }

        // 1 ─ flip across every active mirror, keeping only what lies behind it
        let (mut p1, mut p2) = level.seg_points(seg_id);
        for (def, xf) in self.mirrors.levels().rev() {
            p1 = xf.point(p1);
            p2 = xf.point(p2);
            if !def.is_portal {
                std::mem::swap(&mut p1, &mut p2);
            }

            let (c1, c2) = level.seg_points(def.seg);
            let div = DivLine::through(c1, c2);
            let s1 = div.point_side(p1);
            let s2 = div.point_side(p2);

            // completely in front of the mirror?
            if s1 == 0 && s2 == 0 {
                return;
            }
            if s1 != s2 {
                let cut = div.intersection(p1, p2);
                if s2 == 0 {
                    p2 = cut;
                } else {
                    p1 = cut;
                }
            }
        }

        // 2 ─ angular extent; back sides are dropped
        let ang_l = self.view.angle_to(p1);
        let ang_r = self.view.angle_to(p2);
        if ang_l - ang_r >= Bam::ANG180 {
            return;
        }

        let Some((l, r)) = self
            .view
            .clip
            .clamp(ang_l - self.view.angle, ang_r - self.view.angle)
        else {
            return;
        };
        let span = l - r;

        // 3 ─ in range, but maybe hidden
        if span > MIN_TEST_SPAN && self.occlusion.test(r, l) {
            return;
        }

        self.frame.sub_mut(ds).visible = true;

        let seg = &level.segs[seg_id as usize];
        let Some(line) = seg.linedef else {
            return;
        };
        if span == Bam::ZERO {
            return;
        }

        // 4 ─ mirrors and portals (a full stack turns them into walls)
        if !self.mirrors.is_full() {
            let def = MirrorDef::for_seg(level, seg_id, l + self.view.angle, r + self.view.angle);
            if let Some(def) = def {
                if self.walk_mirror(ds, def) {
                    self.occlusion.mark_covered(r, l);
                    return;
                }
            }
        }

        self.frame.sub_mut(ds).segs.push(seg_id);
        self.stats.segs_queued += 1;

        // only closed lines affect the 1D occlusion buffer
        if level.line_blocks_view(line) {
            self.occlusion.mark_covered(r, l);
        }

        self.sky_walls(seg_id);
    }

    /// Walk the whole tree again as seen through `def`.
    ///
    /// `false` if the mirror could not be entered.
    fn walk_mirror(&mut self, ds: DrawSubId, def: MirrorDef) -> bool {
        let level = self.level;
        let id = self.frame.new_mirror(def);
        let saved = self.view.clip;

        let entered = match MirrorScope::enter(self, level, id, def) {
            Some(mut scope) => {
                let depth = scope.mirrors.depth();
                scope.stats.mirrors_entered += 1;
                scope.stats.max_mirror_depth = scope.stats.max_mirror_depth.max(depth);
                log::trace!("mirror {} entered at depth {depth}", def.line);

                scope.view.clip = ClipWindow::between(
                    def.left - scope.view.angle,
                    def.right - scope.view.angle,
                );
                scope.walk_node(level.bsp_root());
                true
            }
            None => false,
        };

        self.view.clip = saved;
        if entered {
            self.frame.sub_mut(ds).mirrors.push(id);
        }
        entered
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::engine::{Engine, Scene};
    use crate::renderer::{FlatShader, RecordingSink};
    use crate::world::{Camera, Level, SubsectorId, sample};

    use super::*;

    fn walk(lvl: &Level, cam: Camera) -> (Engine, RecordingSink) {
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(RenderConfig::default());
        let mut sink = RecordingSink::new();
        engine.render_frame(
            &Scene::new(lvl, &bank, &world),
            &cam,
            &FlatShader::default(),
            &mut sink,
        );
        (engine, sink)
    }

    fn east(x: f32, y: f32) -> Camera {
        Camera::new(Vec3::new(x, y, 41.0), Bam::ZERO, std::f32::consts::FRAC_PI_2)
    }

    #[test]
    fn corridor_is_visited_front_to_back() {
        let lvl = sample::corridor(5).unwrap();
        let eye = Vec2::new(40.0, 128.0);
        let (engine, _) = walk(&lvl, east(eye.x, eye.y));

        let order: Vec<SubsectorId> = engine.frame().visited().collect();
        assert_eq!(order.len(), 5);

        let dist: Vec<f32> = order
            .iter()
            .map(|&ss| {
                let bb = lvl.subsectors[ss as usize].bbox;
                let near = eye.clamp(bb.min, bb.max);
                near.distance(eye)
            })
            .collect();
        assert!(dist.windows(2).all(|w| w[0] <= w[1]), "{dist:?}");
    }

    #[test]
    fn rooms_behind_the_eye_are_culled() {
        let lvl = sample::corridor(5).unwrap();
        // standing in room 3 looking east: rooms 0..2 are behind
        let (engine, _) = walk(&lvl, east(3.0 * sample::ROOM + 40.0, 128.0));
        let order: Vec<SubsectorId> = engine.frame().visited().collect();

        let here = lvl.locate_subsector(Vec2::new(3.0 * sample::ROOM + 40.0, 128.0));
        assert_eq!(order.first(), Some(&here));
        assert!(order.len() < 5);
        assert!(engine.stats().boxes_culled > 0);
    }

    #[test]
    fn zero_mirror_cap_draws_mirrors_as_walls() {
        let lvl = sample::mirror_room(2).unwrap();
        let mut engine = Engine::new(RenderConfig {
            max_mirrors: 0,
            ..RenderConfig::default()
        });
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut sink = RecordingSink::new();
        let stats = engine.render_frame(
            &Scene::new(&lvl, &bank, &world),
            &east(40.0, 128.0),
            &FlatShader::default(),
            &mut sink,
        );
        assert_eq!(stats.mirrors_entered, 0);
        assert_eq!(engine.frame().mirror_count(), 0);
        assert!(stats.segs_queued > 0);
    }

    #[test]
    fn mirror_hall_recursion_is_capped() {
        let lvl = sample::mirror_hall().unwrap();
        let (engine, _) = walk(&lvl, east(128.0, 128.0));
        let stats = engine.stats();

        assert_eq!(stats.max_mirror_depth, 3);
        assert_eq!(stats.mirrors_entered, 3);
        // the mirror seen at the deepest level was queued as a plain wall
        assert_eq!(engine.frame().mirror_count(), 3);
    }
}
