//! ---- **Per-frame draw records** ----
//!
//! The walk fills a [`FramePool`] with draw-subsectors, their vertical
//! draw-floors, the mirrors entered from them and the things bound to each
//! floor.  Records refer to each other through small typed indices; the
//! pool is cleared (capacity kept) at the start of every frame.

use glam::{Vec2, Vec3};
use hecs::Entity;
use smallvec::SmallVec;

use crate::engine::mirror::MirrorDef;
use crate::world::things::ModelRef;
use crate::world::{Bam, ExtrafloorId, ImageId, PropsRef, SegmentId, SubsectorId, SurfaceRef};

/*────────────────────────────── Handles ──────────────────────────────*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawSubId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawFloorId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawMirrorId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawThingId(pub(crate) u32);

/*────────────────────────────── Records ──────────────────────────────*/

/// One visit of a subsector.
#[derive(Debug, Clone)]
pub struct DrawSub {
    pub sub: SubsectorId,
    /// At least one seg survived the view and occlusion tests.
    pub visible: bool,
    /// Height order, bottom first.
    pub floors: SmallVec<[DrawFloorId; 4]>,
    /// Render order: floors above the eye first (top down), then the rest
    /// bottom up.
    pub floors_r: SmallVec<[DrawFloorId; 4]>,
    pub segs: Vec<SegmentId>,
    pub mirrors: SmallVec<[DrawMirrorId; 2]>,
}

/// A vertical slice of a subsector between two horizontal surfaces.
#[derive(Debug, Clone)]
pub struct DrawFloor {
    pub f_h: f32,
    pub c_h: f32,
    /// Top of the owning extrafloor (equals `c_h` for the sector proper).
    pub top_h: f32,
    pub floor: SurfaceRef,
    pub ceil: SurfaceRef,
    /// `None` for the topmost slice.
    pub ef: Option<ExtrafloorId>,
    pub props: PropsRef,
    pub is_lowest: bool,
    pub is_highest: bool,
    pub things: SmallVec<[DrawThingId; 4]>,
}

/// A mirror or portal entered during the walk.
#[derive(Debug, Clone)]
pub struct DrawMirror {
    pub def: MirrorDef,
    /// Subsectors seen through it, nearest first.
    pub subs: Vec<DrawSubId>,
}

/// How a sprite may be cut by the floor and ceiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum YClip {
    /// Drawn whole (fuzzy things).
    Never,
    /// Lifted or lowered to fit between floor and ceiling.
    #[default]
    Soft,
    /// Cut by the depth buffer (missiles, sunk things).
    Hard,
}

/// One sprite or model instance, extents already mirror-transformed.
#[derive(Debug, Clone)]
pub struct DrawThing {
    pub entity: Entity,
    /// Interpolated position, untransformed.
    pub pos: Vec3,
    /// View-space side offset and depth.
    pub tx: f32,
    pub tz: f32,
    pub top: f32,
    pub bottom: f32,
    /// Extents as created, before any vertical cut.
    pub orig_top: f32,
    pub orig_bottom: f32,
    /// Body radius, bounds the mouse-look tilt.
    pub radius: f32,
    /// Horizontal offsets of the quad's edges from `pos` (transformed).
    pub left: Vec2,
    pub right: Vec2,
    /// Transformed centre.
    pub centre: Vec2,
    pub image: ImageId,
    pub flip: bool,
    /// Set for model things, which skip the sprite quad entirely.
    pub model: Option<ModelRef>,
    /// Facing and handedness after the mirror transforms.
    pub facing: Bam,
    pub reflected: bool,
    pub y_clip: YClip,
    pub props: PropsRef,
    pub scale: f32,
    pub translucency: f32,
    pub fuzzy: bool,
    pub no_zbuf: bool,
    /// Mirror scales at creation time.
    pub xy_scale: f32,
    pub z_scale: f32,
}

/*──────────────────────────────── Pool ───────────────────────────────*/

#[derive(Debug, Default)]
pub struct FramePool {
    subs: Vec<DrawSub>,
    floors: Vec<DrawFloor>,
    mirrors: Vec<DrawMirror>,
    things: Vec<DrawThing>,
    /// Subsectors reached without a mirror, nearest first.
    top: Vec<DrawSubId>,
}

impl FramePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record; allocations are kept for the next frame.
    pub fn reset(&mut self) {
        self.subs.clear();
        self.floors.clear();
        self.mirrors.clear();
        self.things.clear();
        self.top.clear();
    }

    pub fn new_sub(&mut self, sub: SubsectorId) -> DrawSubId {
        let id = DrawSubId(self.subs.len() as u32);
        self.subs.push(DrawSub {
            sub,
            visible: false,
            floors: SmallVec::new(),
            floors_r: SmallVec::new(),
            segs: Vec::new(),
            mirrors: SmallVec::new(),
        });
        id
    }

    pub fn new_floor(&mut self, floor: DrawFloor) -> DrawFloorId {
        let id = DrawFloorId(self.floors.len() as u32);
        self.floors.push(floor);
        id
    }

    pub fn new_mirror(&mut self, def: MirrorDef) -> DrawMirrorId {
        let id = DrawMirrorId(self.mirrors.len() as u32);
        self.mirrors.push(DrawMirror {
            def,
            subs: Vec::new(),
        });
        id
    }

    pub fn new_thing(&mut self, thing: DrawThing) -> DrawThingId {
        let id = DrawThingId(self.things.len() as u32);
        self.things.push(thing);
        id
    }

    /// Append a finished subsector to the innermost mirror or the top list.
    pub fn file_sub(&mut self, id: DrawSubId, mirror: Option<DrawMirrorId>) {
        match mirror {
            Some(m) => self.mirrors[m.0 as usize].subs.push(id),
            None => self.top.push(id),
        }
    }

    #[inline]
    pub fn sub(&self, id: DrawSubId) -> &DrawSub {
        &self.subs[id.0 as usize]
    }

    #[inline]
    pub fn sub_mut(&mut self, id: DrawSubId) -> &mut DrawSub {
        &mut self.subs[id.0 as usize]
    }

    #[inline]
    pub fn floor(&self, id: DrawFloorId) -> &DrawFloor {
        &self.floors[id.0 as usize]
    }

    #[inline]
    pub fn floor_mut(&mut self, id: DrawFloorId) -> &mut DrawFloor {
        &mut self.floors[id.0 as usize]
    }

    #[inline]
    pub fn mirror(&self, id: DrawMirrorId) -> &DrawMirror {
        &self.mirrors[id.0 as usize]
    }

    #[inline]
    pub fn thing(&self, id: DrawThingId) -> &DrawThing {
        &self.things[id.0 as usize]
    }

    pub fn top(&self) -> &[DrawSubId] {
        &self.top
    }

    /// Subsectors of the top-level list in visiting order.
    pub fn visited(&self) -> impl Iterator<Item = SubsectorId> + '_ {
        self.top.iter().map(|&id| self.sub(id).sub)
    }

    pub fn sub_count(&self) -> usize {
        self.subs.len()
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn thing_count(&self) -> usize {
        self.things.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor(f_h: f32, c_h: f32) -> DrawFloor {
        DrawFloor {
            f_h,
            c_h,
            top_h: c_h,
            floor: SurfaceRef::Floor(0),
            ceil: SurfaceRef::Ceil(0),
            ef: None,
            props: PropsRef::Sector(0),
            is_lowest: false,
            is_highest: false,
            things: SmallVec::new(),
        }
    }

    #[test]
    fn filing_separates_top_list_and_mirrors() {
        let mut pool = FramePool::new();
        let a = pool.new_sub(3);
        let b = pool.new_sub(5);
        let m = pool.new_mirror(MirrorDef {
            seg: 0,
            line: 0,
            is_portal: false,
            left: crate::world::Bam::ANG45,
            right: -crate::world::Bam::ANG45,
        });
        pool.file_sub(a, None);
        pool.file_sub(b, Some(m));

        assert_eq!(pool.visited().collect::<Vec<_>>(), vec![3]);
        assert_eq!(pool.mirror(m).subs, vec![b]);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut pool = FramePool::new();
        let s = pool.new_sub(0);
        let f = pool.new_floor(floor(0.0, 128.0));
        pool.sub_mut(s).floors.push(f);
        pool.file_sub(s, None);

        pool.reset();
        assert_eq!(pool.sub_count(), 0);
        assert!(pool.top().is_empty());
        assert_eq!(pool.new_sub(1), DrawSubId(0));
    }
}
