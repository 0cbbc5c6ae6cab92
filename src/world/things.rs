//! Map objects as seen by the renderer.
//!
//! The simulation owns the `hecs::World`; the renderer only reads these
//! components and a per-frame [`ThingLinks`] snapshot of which entity sits
//! in which subsector.

use bitflags::bitflags;
use glam::Vec2;
use hecs::{Entity, World};
use smallvec::SmallVec;

use crate::world::angle::Bam;
use crate::world::geometry::Level;
use crate::world::texture::ImageId;

/// World‑space position.  z is separate to match Doom’s 2½‑D maths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub Vec2, pub f32);

/// Position at the previous tic, for frame interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrevPosition(pub Vec2, pub f32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle(pub Bam);

/// Physical extent plus the floor/ceiling heights under the object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub radius: f32,
    pub height: f32,
    pub floor_z: f32,
    pub ceiling_z: f32,
}

/// Remaining tics of a teleport fade; such objects are not drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleport(pub u32);

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ThingFlags: u16 {
        const INVISIBLE = 0x0001;
        const FUZZY     = 0x0002;
        const FLOAT     = 0x0004;
        const MISSILE   = 0x0008;
        /// Drawn over everything, ignoring the depth buffer.
        const NO_ZBUFFER = 0x0010;
    }
}

/// Vertical anchoring of a sprite relative to the object's z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YAlign {
    #[default]
    BottomUp,
    Middle,
    TopDown,
}

/// One animation frame: 1, 8 or 16 view rotations.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteFrame {
    pub images: SmallVec<[ImageId; 8]>,
    pub flip: SmallVec<[bool; 8]>,
}

impl SpriteFrame {
    pub fn single(image: ImageId) -> Self {
        Self {
            images: SmallVec::from_elem(image, 1),
            flip: SmallVec::from_elem(false, 1),
        }
    }

    pub fn rotated(images: &[ImageId], flip: &[bool]) -> Self {
        Self {
            images: images.iter().copied().collect(),
            flip: flip.iter().copied().collect(),
        }
    }

    #[inline]
    pub fn rotations(&self) -> usize {
        self.images.len()
    }

    /// Image and flip flag for rotation slot `rot` (wrapped).
    #[inline]
    pub fn pick(&self, rot: usize) -> (ImageId, bool) {
        let n = self.images.len().max(1);
        let i = rot % n;
        (
            self.images.get(i).copied().unwrap_or_default(),
            self.flip.get(i).copied().unwrap_or(false),
        )
    }
}

/// A 3D model shown instead of the sprite frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelRef {
    pub model: u16,
    pub skin: Option<ImageId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub frame: SpriteFrame,
    pub model: Option<ModelRef>,
    pub scale: f32,
    pub aspect: f32,
    pub y_align: YAlign,
    pub flags: ThingFlags,
    /// Sink depth into liquid floors (Boom "footclip").
    pub floorclip: f32,
    pub translucency: f32,
}

impl Appearance {
    pub fn new(frame: SpriteFrame) -> Self {
        Self {
            frame,
            model: None,
            scale: 1.0,
            aspect: 1.0,
            y_align: YAlign::BottomUp,
            flags: ThingFlags::empty(),
            floorclip: 0.0,
            translucency: 1.0,
        }
    }

    pub fn with_model(mut self, model: ModelRef) -> Self {
        self.model = Some(model);
        self
    }
}

/// Spawn a drawable object standing at `pos`.
pub fn spawn_thing(
    world: &mut World,
    pos: Vec2,
    z: f32,
    angle: Bam,
    body: Body,
    look: Appearance,
) -> Entity {
    world.spawn((
        Position(pos, z),
        PrevPosition(pos, z),
        Angle(angle),
        body,
        look,
    ))
}

/// Entities per subsector, taken once per frame.
#[derive(Debug, Default)]
pub struct ThingLinks {
    per_subsector: Vec<SmallVec<[Entity; 4]>>,
}

impl ThingLinks {
    /// Snapshot every positioned entity into its subsector.  Within one
    /// subsector entities are ordered by id so frames are reproducible.
    pub fn build(world: &World, level: &Level) -> Self {
        let mut per_subsector: Vec<SmallVec<[Entity; 4]>> =
            vec![SmallVec::new(); level.subsectors.len()];

        for (ent, pos) in world.query::<&Position>().iter() {
            let ss = level.locate_subsector(pos.0) as usize;
            if let Some(list) = per_subsector.get_mut(ss) {
                list.push(ent);
            }
        }
        for list in per_subsector.iter_mut() {
            list.sort_by_key(|e| e.to_bits());
        }
        Self { per_subsector }
    }

    pub fn in_subsector(&self, ss: u16) -> &[Entity] {
        self.per_subsector
            .get(ss as usize)
            .map_or(&[][..], |l| l.as_slice())
    }

    pub fn total(&self) -> usize {
        self.per_subsector.iter().map(|l| l.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sample;

    fn body() -> Body {
        Body {
            radius: 16.0,
            height: 56.0,
            floor_z: 0.0,
            ceiling_z: 128.0,
        }
    }

    #[test]
    fn links_group_entities_by_subsector() {
        let lvl = sample::corridor(3).unwrap();
        let mut world = World::new();
        let a = spawn_thing(&mut world, Vec2::new(64.0, 64.0), 0.0, Bam::ZERO, body(), Appearance::new(SpriteFrame::single(1)));
        let b = spawn_thing(&mut world, Vec2::new(300.0, 64.0), 0.0, Bam::ZERO, body(), Appearance::new(SpriteFrame::single(1)));
        let c = spawn_thing(&mut world, Vec2::new(70.0, 90.0), 0.0, Bam::ZERO, body(), Appearance::new(SpriteFrame::single(1)));

        let links = ThingLinks::build(&world, &lvl);
        assert_eq!(links.total(), 3);

        let first = lvl.locate_subsector(Vec2::new(64.0, 64.0));
        let second = lvl.locate_subsector(Vec2::new(300.0, 64.0));
        assert_eq!(links.in_subsector(first), &[a, c]);
        assert_eq!(links.in_subsector(second), &[b]);
    }

    #[test]
    fn rotation_slots_wrap() {
        let f = SpriteFrame::rotated(&[1, 2, 3, 4, 5, 4, 3, 2], &[false, false, false, false, false, true, true, true]);
        assert_eq!(f.rotations(), 8);
        assert_eq!(f.pick(5), (4, true));
        assert_eq!(f.pick(9), (2, false));
        assert_eq!(SpriteFrame::single(7).pick(3), (7, false));
    }
}
