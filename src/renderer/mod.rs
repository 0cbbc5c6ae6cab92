//! Unit submission layer.
//!
//! *The walk never touches a graphics API directly.*
//! Every wall part, plane polygon, sprite quad and sky piece is handed over as
//! a [`Unit`]: a short world-space vertex list with UVs, a per-vertex tint, an
//! image handle and a blend classification.  Anything that implements
//! [`UnitSink`] can consume them (a GL back-end, a software rasteriser, or the
//! [`RecordingSink`] used by tests and the demo binary).
//!
//! * Units arrive in batches opened by [`UnitSink::begin_units`].  The solid
//!   batch comes front-to-back, the translucent one back-to-front.
//! * Sky pieces only prime the depth buffer; they bypass the batches.
//! * A unit lit by dynamic lights is followed by an additive copy carrying
//!   only that light.
//! * Model things are handed over whole as [`ModelDraw`] requests.
//! * Clip planes change only when a mirror or portal is entered or left.

use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::world::{Bam, ImageId, RegionProps};

pub mod coords;

pub use coords::{CoordFunc, CoordVertex};

bitflags! {
    /// Raster state requested for a unit.  Empty means plain opaque.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Blend: u16 {
        /// Alpha-tested: texels below a small threshold are discarded.
        const MASKED   = 0x0001;
        /// Alpha-tested with a higher threshold (sprites, grates).
        const LESS     = 0x0002;
        /// Alpha-blended.
        const ALPHA    = 0x0004;
        /// Additive blending.
        const ADD      = 0x0008;
        /// Clamp V so a masked mid texture does not wrap.
        const CLAMP_Y  = 0x0010;
        /// Ignore the depth buffer.
        const NO_ZBUF  = 0x0020;
    }
}

/// Coarse class of a blend, used for statistics and by simple back-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendClass {
    Opaque,
    Masked,
    Alpha,
    Additive,
}

impl Blend {
    pub fn class(self) -> BlendClass {
        if self.contains(Blend::ADD) {
            BlendClass::Additive
        } else if self.contains(Blend::ALPHA) {
            BlendClass::Alpha
        } else if self.intersects(Blend::MASKED | Blend::LESS) {
            BlendClass::Masked
        } else {
            BlendClass::Opaque
        }
    }

    /// Classification shared by walls and planes.
    pub fn for_surface(translucency: f32, opacity: crate::world::Opacity) -> Blend {
        use crate::world::Opacity;

        let mut blend = if translucency >= 0.99 && opacity == Opacity::Solid {
            Blend::empty()
        } else if translucency < 0.11 || opacity == Opacity::Complex {
            Blend::MASKED
        } else {
            Blend::LESS
        };
        if translucency < 0.99 || opacity == Opacity::Complex {
            blend |= Blend::ALPHA;
        }
        blend
    }
}

/// What produced a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Wall,
    Plane,
    Flood,
    Sprite,
    /// Tinted overlay drawn over a mirror line.
    Mirror,
    /// Overlay drawn over a portal line.
    Portal,
    SkyWall,
    SkyPlane,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitVertex {
    pub pos: Vec3,
    pub uv: Vec2,
    pub normal: Vec3,
    /// Light tint, 0.0 ..= 1.0 per channel.
    pub rgb: Vec3,
}

/// One polygon ready for submission (3+ vertices, convex, world space).
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    pub image: Option<ImageId>,
    pub blend: Blend,
    pub alpha: f32,
    pub verts: SmallVec<[UnitVertex; 8]>,
}

impl Unit {
    /// Build a unit by running every position through `coords` and tinting
    /// the lit position with `shader`.
    #[allow(clippy::too_many_arguments)]
    pub fn mix(
        kind: UnitKind,
        image: Option<ImageId>,
        blend: Blend,
        alpha: f32,
        positions: &[Vec3],
        coords: &CoordFunc,
        shader: &dyn Shader,
        props: &RegionProps,
        lit_adjust: f32,
    ) -> Self {
        let verts = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let v = coords.vertex(i, p);
                UnitVertex {
                    pos: v.pos,
                    uv: v.uv,
                    normal: v.normal,
                    rgb: shader.sample(props, lit_adjust, v.lit_pos),
                }
            })
            .collect();
        Self {
            kind,
            image,
            blend,
            alpha,
            verts,
        }
    }

    /// Untextured polygon with one flat colour.
    pub fn flat(kind: UnitKind, blend: Blend, alpha: f32, rgb: Vec3, positions: &[Vec3]) -> Self {
        let verts = positions
            .iter()
            .map(|&pos| UnitVertex {
                pos,
                uv: Vec2::ZERO,
                normal: Vec3::ZERO,
                rgb,
            })
            .collect();
        Self {
            kind,
            image: None,
            blend,
            alpha,
            verts,
        }
    }

    #[inline]
    pub fn class(&self) -> BlendClass {
        self.blend.class()
    }

    /// Additive copy of a unit built by [`Unit::mix`] from the same
    /// `positions` and `coords`, tinted by the shader's dynamic light.
    /// `None` when no light reaches any vertex.
    pub fn light_pass(&self, positions: &[Vec3], coords: &CoordFunc, shader: &dyn Shader) -> Option<Unit> {
        let mut lit = false;
        let verts: SmallVec<[UnitVertex; 8]> = self
            .verts
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(i, (v, &p))| {
                let rgb = shader.dynamic(coords.vertex(i, p).lit_pos);
                lit |= rgb.max_element() > 0.0;
                UnitVertex { rgb, ..*v }
            })
            .collect();

        lit.then(|| Unit {
            kind: self.kind,
            image: self.image,
            blend: (self.blend - Blend::ALPHA) | Blend::ADD,
            alpha: self.alpha,
            verts,
        })
    }
}

/// A model thing, drawn by the back-end's own mesh path.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDraw {
    pub model: u16,
    pub skin: Option<ImageId>,
    /// Origin, mirror-transformed.
    pub pos: Vec3,
    /// Facing, mirror-transformed.
    pub angle: Bam,
    pub scale: f32,
    /// Seen through an odd number of reflections: draw with flipped winding.
    pub reflected: bool,
    pub alpha: f32,
    pub rgb: Vec3,
    /// Additive light from the shader's dynamic lights.
    pub dynamic: Vec3,
}

/// Light tint at a point of a region.  Stands in for the colormap and
/// lighting subsystem, which is outside the walk.
pub trait Shader {
    fn sample(&self, props: &RegionProps, lit_adjust: f32, pos: Vec3) -> Vec3;

    /// Light added on top of `sample` by dynamic lights and glows.
    fn dynamic(&self, _pos: Vec3) -> Vec3 {
        Vec3::ZERO
    }
}

/// Uniform sector lighting: grey level `light / 255`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatShader {
    /// Added to every light level (e.g. light amplification).
    pub extra_light: f32,
}

impl Shader for FlatShader {
    fn sample(&self, props: &RegionProps, lit_adjust: f32, _pos: Vec3) -> Vec3 {
        let l = (props.light + lit_adjust + self.extra_light).clamp(0.0, 255.0) / 255.0;
        Vec3::splat(l)
    }
}

/// Light source with linear falloff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub pos: Vec3,
    pub radius: f32,
    pub rgb: Vec3,
}

impl PointLight {
    pub fn at(&self, p: Vec3) -> Vec3 {
        let d = self.pos.distance(p);
        if d >= self.radius {
            return Vec3::ZERO;
        }
        self.rgb * (1.0 - d / self.radius)
    }
}

/// [`FlatShader`] plus a set of dynamic lights.
#[derive(Debug, Clone, Default)]
pub struct LitShader {
    pub base: FlatShader,
    pub lights: SmallVec<[PointLight; 4]>,
}

impl Shader for LitShader {
    fn sample(&self, props: &RegionProps, lit_adjust: f32, pos: Vec3) -> Vec3 {
        self.base.sample(props, lit_adjust, pos)
    }

    fn dynamic(&self, pos: Vec3) -> Vec3 {
        self.lights
            .iter()
            .fold(Vec3::ZERO, |acc, l| acc + l.at(pos))
            .min(Vec3::ONE)
    }
}

/// Consumer of emitted units.
pub trait UnitSink {
    fn begin_frame(&mut self) {}

    /// Open a batch; `solid` is true for the opaque front-to-back pass.
    fn begin_units(&mut self, solid: bool);

    fn add_unit(&mut self, unit: Unit);

    /// Sky pieces are written at infinite depth as soon as they are found.
    fn add_sky(&mut self, unit: Unit);

    /// Model things, submitted inside the translucent batch in sprite order.
    fn add_model(&mut self, _model: ModelDraw) {}

    fn finish_units(&mut self);

    /// User clip planes `(a, b, c, d)`; points with `a·x + b·y + c·z + d < 0`
    /// are cut away.  An empty slice disables clipping.
    fn set_clip_planes(&mut self, planes: &[Vec4]);

    fn end_frame(&mut self) {}
}

/// One unit as it reached a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// Batch the unit was submitted in.
    pub batch: usize,
    pub solid_pass: bool,
    /// Number of clip planes active at submission.
    pub clip_planes: usize,
    pub unit: Unit,
}

/// Keeps every unit of the last frame in submission order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingSink {
    pub units: Vec<Recorded>,
    pub sky: Vec<Unit>,
    pub models: Vec<ModelDraw>,
    pub batches: usize,
    pub clip_changes: usize,
    solid: bool,
    open: bool,
    planes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: UnitKind) -> usize {
        self.units.iter().filter(|r| r.unit.kind == kind).count()
    }

    pub fn count_class(&self, class: BlendClass) -> usize {
        self.units.iter().filter(|r| r.unit.class() == class).count()
    }

    pub fn of_kind(&self, kind: UnitKind) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |r| r.unit.kind == kind)
            .map(|r| &r.unit)
    }
}

impl UnitSink for RecordingSink {
    fn begin_frame(&mut self) {
        self.units.clear();
        self.sky.clear();
        self.models.clear();
        self.batches = 0;
        self.clip_changes = 0;
        self.open = false;
        self.planes = 0;
    }

    fn begin_units(&mut self, solid: bool) {
        self.solid = solid;
        self.open = true;
        self.batches += 1;
    }

    fn add_unit(&mut self, unit: Unit) {
        if !self.open {
            log::warn!("unit submitted outside of a batch");
        }
        self.units.push(Recorded {
            batch: self.batches,
            solid_pass: self.solid,
            clip_planes: self.planes,
            unit,
        });
    }

    fn add_sky(&mut self, unit: Unit) {
        self.sky.push(unit);
    }

    fn add_model(&mut self, model: ModelDraw) {
        self.models.push(model);
    }

    fn finish_units(&mut self) {
        self.open = false;
    }

    fn set_clip_planes(&mut self, planes: &[Vec4]) {
        self.planes = planes.len();
        self.clip_changes += 1;
    }
}
