use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;
use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::world::angle::Bam;
use crate::world::texture::ImageId;

pub type SubsectorId = u16;
pub type LinedefId = u16;
pub type SegmentId = u16;
pub type VertexId = u16;
pub type SidedefId = u16;
pub type SectorId = u16;
pub type ExtrafloorId = u16;
pub type SeclistId = u16;

/// Sectors touching one vertex (used to stitch wall edges).
pub type Seclist = SmallVec<[SectorId; 11]>;

/// Runtime snapshot of one map.
///
/// Filled by an external loader, then validated and completed once by
/// [`Level::finalise`].  Afterwards the renderer only ever reads it; the
/// single exception is the automap "seen" mark, which is an atomic flag.
#[derive(Debug, Default)]
pub struct Level {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub sectors: Vec<Sector>,
    pub extrafloors: Vec<Extrafloor>,
    pub segs: Vec<Seg>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    /// filled by `Level::finalise`
    pub seclists: Vec<Seclist>,
    pub(crate) automap: Vec<AtomicBool>,
}

/*--------------------------- vertices -------------------------------*/

#[derive(Clone, Copy, Debug, Default)]
pub struct Vertex {
    pub pos: Vec2,
    /// UDMF per-vertex floor height override.
    pub floor_z: Option<f32>,
    /// UDMF per-vertex ceiling height override.
    pub ceil_z: Option<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            floor_z: None,
            ceil_z: None,
        }
    }
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        const NOT_ON_MAP      = 0x0200;
        const MAPPED          = 0x0100; // seen before load (savegames)
        const MIRROR          = 0x4000;
    }
}

/// Kinds of horizontally sliding door.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideKind {
    Left,
    Right,
    Center,
}

/// A sliding door on the middle texture; `opening` is driven by the
/// simulation (0 = closed, `line.length` = fully open).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlidingDoor {
    pub kind: SlideKind,
    pub opening: f32,
}

/// The parts of a line special the renderer cares about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSpecial {
    pub glass: bool,
    /// Portal surfaces draw the middle texture over the opening.
    pub portal_standard: bool,
    pub fx_color: Rgb,
    pub translucency: f32,
    /// Vertical scroll speed; scrolling mid-masked textures must not clamp V.
    pub y_speed: f32,
}

impl Default for LineSpecial {
    fn default() -> Self {
        Self {
            glass: false,
            portal_standard: false,
            fx_color: Rgb::WHITE,
            translucency: 1.0,
            y_speed: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Linedef {
    pub v1: VertexId,
    pub v2: VertexId,
    pub flags: LinedefFlags,
    pub special: Option<LineSpecial>,
    pub tag: i16,
    pub right_sidedef: Option<SidedefId>,
    pub left_sidedef: Option<SidedefId>,
    pub portal_pair: Option<LinedefId>,
    pub slide: Option<SlidingDoor>,

    /* derived by `Level::finalise` */
    pub dx: f32,
    pub dy: f32,
    pub length: f32,
    pub bbox: Aabb,
    pub front_sector: SectorId,
    pub back_sector: Option<SectorId>,
}

impl Linedef {
    /// Position along the line, `0.0` at `v1` and `1.0` at `v2`, measured on
    /// the dominant axis.
    #[inline]
    pub fn along(&self, start: Vec2, p: Vec2) -> f32 {
        if self.dx == 0.0 && self.dy == 0.0 {
            return 0.0;
        }
        if self.dx.abs() >= self.dy.abs() {
            (p.x - start.x) / self.dx
        } else {
            (p.y - start.y) / self.dy
        }
    }

    #[inline]
    pub fn is_self_referencing(&self) -> bool {
        self.back_sector == Some(self.front_sector)
    }
}

/*--------------------------- surfaces -------------------------------*/

/// 8-bit RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);

    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.0 as f32, self.1 as f32, self.2 as f32) / 255.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    pub color: Rgb,
    pub density: f32,
}

/// Lighting properties of a vertical region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionProps {
    pub light: f32, // 0 ..= 255
    pub fog: Option<Fog>,
}

impl Default for RegionProps {
    fn default() -> Self {
        Self {
            light: 160.0,
            fog: None,
        }
    }
}

/// One textured face: a wall part or a flat.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub image: Option<ImageId>,
    pub offset: Vec2,
    pub x_mat: Vec2,
    pub y_mat: Vec2,
    pub rotation: Bam,
    /// 1.0 = fully opaque
    pub translucency: f32,
    /// Image synthesized to show a fog boundary.
    pub fog_wall: bool,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            image: None,
            offset: Vec2::ZERO,
            x_mat: Vec2::X,
            y_mat: Vec2::Y,
            rotation: Bam::ZERO,
            translucency: 1.0,
            fog_wall: false,
        }
    }
}

impl Surface {
    pub fn with_image(image: ImageId) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }
}

/*--------------------------- sidedefs -------------------------------*/

#[derive(Clone, Debug, Default)]
pub struct Sidedef {
    pub upper: Surface,
    pub middle: Surface,
    pub lower: Surface,
    pub sector: SectorId,
    /// Vertical shift of a mid-masked texture relative to its anchor.
    pub midmask_offset: f32,
}

/*--------------------------- sectors --------------------------------*/

/// Plane tilted along a line: height offset `dz1` at `(x1,y1)` growing
/// linearly to `dz2` at `(x2,y2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlopePlane {
    pub p1: Vec2,
    pub p2: Vec2,
    pub dz1: f32,
    pub dz2: f32,
}

impl SlopePlane {
    /// Offset relative to the flat height at `p`.
    pub fn height_at(&self, p: Vec2) -> f32 {
        let d = self.p2 - self.p1;
        let len_sq = d.length_squared();
        if len_sq < f32::EPSILON {
            return self.dz1;
        }
        let along = (p - self.p1).dot(d) / len_sq;
        self.dz1 + along * (self.dz2 - self.dz1)
    }

    #[inline]
    pub fn min_dz(&self) -> f32 {
        self.dz1.min(self.dz2)
    }

    #[inline]
    pub fn max_dz(&self) -> f32 {
        self.dz1.max(self.dz2)
    }
}

/// Plane through 3 or 4 corners with explicit vertex heights.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexSlope {
    pub corners: SmallVec<[Vec3; 4]>,
    pub normal: Vec3,
    pub high: f32,
    pub low: f32,
}

impl VertexSlope {
    /// Height of the plane above `p`.
    pub fn z_at(&self, p: Vec2) -> f32 {
        let c = self.corners[0];
        c.z - (self.normal.x * (p.x - c.x) + self.normal.y * (p.y - c.y)) / self.normal.z
    }
}

#[derive(Clone, Debug, Default)]
pub struct Sector {
    pub floor_h: f32,
    pub ceil_h: f32,
    /// Top of the sky box for sky ceilings.
    pub sky_h: f32,
    pub floor: Surface,
    pub ceil: Surface,
    pub props: RegionProps,
    pub special: i16,
    pub tag: i16,
    /// Boom deep-water control sector.
    pub heightsec: Option<SectorId>,
    pub floor_slope: Option<SlopePlane>,
    pub ceil_slope: Option<SlopePlane>,
    /// Lowest solid / liquid extrafloor; each links upwards via `higher`.
    pub bottom_ef: Option<ExtrafloorId>,
    pub bottom_liq: Option<ExtrafloorId>,

    /* derived by `Level::finalise` */
    pub floor_vslope: Option<VertexSlope>,
    pub ceil_vslope: Option<VertexSlope>,
    pub line_count: u16,
}

/*------------------------- extrafloors ------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ExtrafloorFlags: u16 {
        const THICK       = 0x0001;
        const LIQUID      = 0x0002;
        const SIDE_UPPER  = 0x0010; // side drawn with the upper texture
        const SIDE_LOWER  = 0x0020; // side drawn with the lower texture
        const SIDE_MID_Y  = 0x0040; // honour the dummy line's y offset
        const BOOM_TEX    = 0x0080; // old Boom deep water: borrow the floor flat
    }
}

/// A 3D floor slab living inside `sector`.
#[derive(Clone, Debug, Default)]
pub struct Extrafloor {
    pub sector: SectorId,
    /// Dummy line whose front side textures the slab's edges.
    pub line: LinedefId,
    /// Sector that defines the slab (front sector of `line`).
    pub control: SectorId,
    pub kind: ExtrafloorFlags,
    pub bottom_h: f32,
    pub top_h: f32,
    pub top: Surface,
    pub bottom: Surface,
    pub props: RegionProps,
    pub higher: Option<ExtrafloorId>,
}

/*------------------------ segs & subsectors -------------------------*/

#[derive(Clone, Debug, Default)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    /// `None` for minisegs.
    pub linedef: Option<LinedefId>,
    pub dir: u16, // 0: right side of the line, 1: left
    pub offset: f32,
    pub partner: Option<SegmentId>,

    /* derived by `Level::finalise` */
    pub length: f32,
    pub angle: Bam,
    pub front_sub: SubsectorId,
    pub back_sub: Option<SubsectorId>,
    pub sidedef: Option<SidedefId>,
    pub front_sector: Option<SectorId>,
    pub back_sector: Option<SectorId>,
    pub nb_sec: [Option<SeclistId>; 2],
}

impl Seg {
    #[inline]
    pub fn is_miniseg(&self) -> bool {
        self.linedef.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Subsector {
    pub seg_count: u16,
    pub first_seg: SegmentId,

    /* derived by `Level::finalise` */
    pub sector: SectorId,
    pub deep_ref: Option<SectorId>,
    pub bbox: Aabb,
}

impl Subsector {
    #[inline]
    pub fn seg_ids(&self) -> std::ops::Range<usize> {
        self.first_seg as usize..self.first_seg as usize + self.seg_count as usize
    }
}

/*--------------------------- bsp nodes ------------------------------*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec2::splat(f32::MAX),
        max: Vec2::splat(f32::MIN),
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn add_point(&mut self, p: Vec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Corner `i` in the order (min,min) (max,min) (min,max) (max,max).
    #[inline]
    pub fn corner(&self, i: usize) -> Vec2 {
        Vec2::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
        )
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub bbox: [Aabb; 2],
    pub child: [u16; 2],
}

/*------------------------- surface handles --------------------------*/

/// Handle to a surface of the static graph, stored in per-frame records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRef {
    Floor(SectorId),
    Ceil(SectorId),
    ExtraTop(ExtrafloorId),
    ExtraBottom(ExtrafloorId),
    /// Middle surface of the dummy line's front side.
    ExtraSide(ExtrafloorId),
}

/// Handle to region lighting properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropsRef {
    Sector(SectorId),
    Extra(ExtrafloorId),
}

impl Level {
    pub fn surface(&self, r: SurfaceRef) -> &Surface {
        match r {
            SurfaceRef::Floor(s) => &self.sectors[s as usize].floor,
            SurfaceRef::Ceil(s) => &self.sectors[s as usize].ceil,
            SurfaceRef::ExtraTop(e) => &self.extrafloors[e as usize].top,
            SurfaceRef::ExtraBottom(e) => &self.extrafloors[e as usize].bottom,
            SurfaceRef::ExtraSide(e) => {
                let line = &self.linedefs[self.extrafloors[e as usize].line as usize];
                match line.right_sidedef {
                    Some(sd) => &self.sidedefs[sd as usize].middle,
                    None => &self.extrafloors[e as usize].top,
                }
            }
        }
    }

    pub fn props(&self, r: PropsRef) -> &RegionProps {
        match r {
            PropsRef::Sector(s) => &self.sectors[s as usize].props,
            PropsRef::Extra(e) => &self.extrafloors[e as usize].props,
        }
    }

    #[inline]
    pub fn vertex(&self, v: VertexId) -> Vec2 {
        self.vertices[v as usize].pos
    }

    /// Seg endpoints in world space.
    #[inline]
    pub fn seg_points(&self, seg: SegmentId) -> (Vec2, Vec2) {
        let s = &self.segs[seg as usize];
        (self.vertex(s.v1), self.vertex(s.v2))
    }

    /// Both extrafloor chains merged bottom to top by `bottom_h`.
    pub fn extrafloors_upward(&self, sector: SectorId) -> ExtrafloorsUpward<'_> {
        let sec = &self.sectors[sector as usize];
        ExtrafloorsUpward {
            level: self,
            solid: sec.bottom_ef,
            liquid: sec.bottom_liq,
        }
    }

    /// Mark a line as seen on the automap.
    #[inline]
    pub fn mark_mapped(&self, line: LinedefId) {
        if let Some(flag) = self.automap.get(line as usize) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_mapped(&self, line: LinedefId) -> bool {
        let seen = self
            .automap
            .get(line as usize)
            .is_some_and(|f| f.load(Ordering::Relaxed));
        seen || self.linedefs[line as usize].flags.contains(LinedefFlags::MAPPED)
    }

    /// Does the line close off the view completely (one-sided or no gap)?
    pub fn line_blocks_view(&self, line: LinedefId) -> bool {
        let ld = &self.linedefs[line as usize];
        let Some(back) = ld.back_sector else {
            return true;
        };
        let f = &self.sectors[ld.front_sector as usize];
        let b = &self.sectors[back as usize];
        f.floor_h.max(b.floor_h) >= f.ceil_h.min(b.ceil_h)
    }
}

/// Iterator produced by [`Level::extrafloors_upward`].
pub struct ExtrafloorsUpward<'a> {
    level: &'a Level,
    solid: Option<ExtrafloorId>,
    liquid: Option<ExtrafloorId>,
}

impl Iterator for ExtrafloorsUpward<'_> {
    type Item = ExtrafloorId;

    fn next(&mut self) -> Option<ExtrafloorId> {
        let efs = &self.level.extrafloors;
        let take_solid = match (self.solid, self.liquid) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(s), Some(l)) => efs[s as usize].bottom_h < efs[l as usize].bottom_h,
        };
        let slot = if take_solid {
            &mut self.solid
        } else {
            &mut self.liquid
        };
        let cur = slot.take()?;
        *slot = efs[cur as usize].higher;
        Some(cur)
    }
}
