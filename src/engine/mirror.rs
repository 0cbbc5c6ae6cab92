//! ----------------------------------------------------------------------------
//! **Mirror / portal stack**
//!
//! Mirrors and portals do not move the eye: they move the *world*.  Every
//! coordinate emitted while a mirror is active is run through the stack of
//! [`MirrorTransform`]s, newest entry first.
//!
//! * a true mirror reflects across its seg (an involution);
//! * a portal maps the space behind its paired line onto the space behind
//!   its own line, with rotation, xy scale and a height ratio.
//!
//! The stack is bounded; a mirror met when it is full is just a wall.
//! ----------------------------------------------------------------------------

use std::ops::{Deref, DerefMut};

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use crate::engine::frame::DrawMirrorId;
use crate::world::{Bam, Level, LinedefFlags, LinedefId, SegmentId};

/*──────────────────────────── Definitions ────────────────────────────*/

/// What was looked through, and the absolute angles bounding it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorDef {
    pub seg: SegmentId,
    pub line: LinedefId,
    pub is_portal: bool,
    pub left: Bam,
    pub right: Bam,
}

impl MirrorDef {
    /// `None` for minisegs and for lines that are neither mirrors nor
    /// paired portals.
    pub fn for_seg(level: &Level, seg: SegmentId, left: Bam, right: Bam) -> Option<Self> {
        let line = level.segs[seg as usize].linedef?;
        let ld = &level.linedefs[line as usize];

        let is_portal = if ld.flags.contains(LinedefFlags::MIRROR) {
            false
        } else if ld.portal_pair.is_some() {
            true
        } else {
            return None;
        };
        Some(Self {
            seg,
            line,
            is_portal,
            left,
            right,
        })
    }
}

/// Affine map of one stack entry:
/// `x' = xc + x·xx + y·xy`, `y' = yc + x·yx + y·yy`, `z' = zc + z·z_scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorTransform {
    pub xc: f32,
    pub xx: f32,
    pub xy: f32,
    pub yc: f32,
    pub yx: f32,
    pub yy: f32,
    pub zc: f32,
    pub z_scale: f32,
    pub xy_scale: f32,
    pub tc: Bam,
    pub is_portal: bool,
}

impl MirrorTransform {
    pub fn for_def(level: &Level, def: &MirrorDef) -> Option<Self> {
        if def.is_portal {
            Self::portal(level, def.seg)
        } else {
            Some(Self::reflect(level, def.seg))
        }
    }

    /// Reflection across the seg's line.
    pub fn reflect(level: &Level, seg: SegmentId) -> Self {
        let s = &level.segs[seg as usize];
        let (v1, v2) = level.seg_points(seg);
        let d = v2 - v1;

        let len_sq = (s.length * s.length).max(f32::EPSILON);
        let a = (d.x * d.x - d.y * d.y) / len_sq;
        let b = (d.x * d.y * 2.0) / len_sq;

        Self {
            xc: v1.x * (1.0 - a) - v1.y * b,
            xx: a,
            xy: b,
            yc: v1.y * (1.0 + a) - v1.x * b,
            yx: b,
            yy: -a,
            zc: 0.0,
            z_scale: 1.0,
            xy_scale: 1.0,
            // turn(a) = 2·seg_angle - a
            tc: s.angle.wrapping_mul(2),
            is_portal: false,
        }
    }

    /// Map the paired line's space onto this seg's space.
    ///
    /// `None` if the seg is a miniseg or its line has no pair.
    pub fn portal(level: &Level, seg: SegmentId) -> Option<Self> {
        let s = &level.segs[seg as usize];
        let line = &level.linedefs[s.linedef? as usize];
        let other = &level.linedefs[line.portal_pair? as usize];

        // 1 ─ matching points on the partner (it runs the other way)
        let (a1, a2) = level.seg_points(seg);
        let start = level.vertex(line.v1);
        let along1 = line.along(start, a1);
        let along2 = line.along(start, a2);

        let o_end = level.vertex(other.v2);
        let o_d = Vec2::new(other.dx, other.dy);
        let b1 = o_end - o_d * along1;
        let b2 = o_end - o_d * along2;

        // 2 ─ rotation and xy scale
        let tc = Bam::ANG180 + Bam::of_vector(other.dx, other.dy) - s.angle;
        let xy_scale = s.length / b1.distance(b2).max(1.0);
        let (sin, cos) = (tc.sin(), tc.cos());

        let (xx, xy) = (cos * xy_scale, sin * xy_scale);
        let (yx, yy) = (-sin * xy_scale, cos * xy_scale);

        // 3 ─ heights: the partner's floor..ceiling fills ours
        let here = &level.sectors[line.front_sector as usize];
        let there = &level.sectors[other.front_sector as usize];
        let z_scale = (here.ceil_h - here.floor_h) / (there.ceil_h - there.floor_h).max(1.0);

        Some(Self {
            xc: a1.x - b1.x * xx - b1.y * xy,
            xx,
            xy,
            yc: a1.y - b1.x * yx - b1.y * yy,
            yx,
            yy,
            zc: here.floor_h - there.floor_h * z_scale,
            z_scale,
            xy_scale,
            tc,
            is_portal: true,
        })
    }

    #[inline]
    pub fn point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.xc + p.x * self.xx + p.y * self.xy,
            self.yc + p.x * self.yx + p.y * self.yy,
        )
    }

    #[inline]
    pub fn height(&self, z: f32) -> f32 {
        self.zc + z * self.z_scale
    }

    #[inline]
    pub fn turn(&self, a: Bam) -> Bam {
        if self.is_portal { a - self.tc } else { self.tc - a }
    }
}

/*────────────────────────────── Stack ────────────────────────────────*/

#[derive(Clone, Copy, Debug)]
struct Active {
    /// Draw record collecting the subsectors seen through this entry.
    id: DrawMirrorId,
    def: MirrorDef,
    xf: MirrorTransform,
}

/// Active mirrors, outermost first.
#[derive(Debug, Clone)]
pub struct MirrorStack {
    active: Vec<Active>,
    cap: usize,
}

impl MirrorStack {
    pub fn new(cap: usize) -> Self {
        Self {
            active: Vec::with_capacity(cap),
            cap,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.active.len() >= self.cap
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// `false` (and nothing pushed) when full or the portal is unpaired.
    pub fn push(&mut self, level: &Level, id: DrawMirrorId, def: MirrorDef) -> bool {
        if self.is_full() {
            return false;
        }
        let Some(xf) = MirrorTransform::for_def(level, &def) else {
            return false;
        };
        self.active.push(Active { id, def, xf });
        true
    }

    pub fn pop(&mut self) -> Option<MirrorDef> {
        self.active.pop().map(|a| a.def)
    }

    /// Draw record of the innermost mirror.
    pub fn innermost(&self) -> Option<DrawMirrorId> {
        self.active.last().map(|a| a.id)
    }

    /// Entries with their transforms, outermost first.
    pub fn levels(&self) -> impl DoubleEndedIterator<Item = (&MirrorDef, &MirrorTransform)> {
        self.active.iter().map(|a| (&a.def, &a.xf))
    }

    pub fn point(&self, p: Vec2) -> Vec2 {
        self.active.iter().rev().fold(p, |p, a| a.xf.point(p))
    }

    pub fn height(&self, z: f32) -> f32 {
        self.active.iter().rev().fold(z, |z, a| a.xf.height(z))
    }

    pub fn turn(&self, ang: Bam) -> Bam {
        self.active.iter().rev().fold(ang, |ang, a| a.xf.turn(ang))
    }

    pub fn xy_scale(&self) -> f32 {
        self.active.iter().map(|a| a.xf.xy_scale).product()
    }

    pub fn z_scale(&self) -> f32 {
        self.active.iter().map(|a| a.xf.z_scale).product()
    }

    /// Odd number of true mirrors: winding is flipped.
    pub fn is_reflective(&self) -> bool {
        self.active.iter().filter(|a| !a.def.is_portal).count() % 2 == 1
    }

    /// Is `seg` the surface we are currently looking through (or, for a
    /// portal, the partner we are looking out of)?
    pub fn seg_on_portal(&self, level: &Level, seg: SegmentId) -> bool {
        let Some(top) = self.active.last() else {
            return false;
        };
        let Some(line) = level.segs[seg as usize].linedef else {
            return false;
        };
        if top.def.is_portal {
            level.linedefs[top.def.line as usize].portal_pair == Some(line)
        } else {
            line == top.def.line
        }
    }

    /// Clip planes for the current depth: the two side planes of the
    /// innermost mirror, then one "behind the surface" plane per level.
    /// Empty when no mirror is active.
    pub fn clip_planes(&self, level: &Level, eye: Vec2) -> SmallVec<[Vec4; 8]> {
        let mut planes = SmallVec::new();
        let Some(inner) = self.active.last() else {
            return planes;
        };

        planes.push(eye_angle_plane(eye, inner.def.left));
        planes.push(eye_angle_plane(eye, inner.def.right + Bam::ANG180));

        for (i, mir) in self.active.iter().enumerate() {
            let (mut v1, mut v2) = level.seg_points(mir.def.seg);
            for k in (0..i).rev() {
                let outer = &self.active[k];
                if !outer.def.is_portal {
                    std::mem::swap(&mut v1, &mut v2);
                }
                v1 = outer.xf.point(v1);
                v2 = outer.xf.point(v2);
            }
            planes.push(horizontal_line_plane(v2, v1));
        }
        planes
    }
}

/// Vertical plane through `s -> e`; the kept side is on the left.
fn horizontal_line_plane(s: Vec2, e: Vec2) -> Vec4 {
    Vec4::new(e.y - s.y, s.x - e.x, 0.0, e.x * s.y - s.x * e.y)
}

fn eye_angle_plane(eye: Vec2, ang: Bam) -> Vec4 {
    horizontal_line_plane(eye, eye + ang.unit())
}

/*───────────────────────────── Scoping ───────────────────────────────*/

/// Anything that owns a [`MirrorStack`] and must react when it changes.
pub trait MirrorHost {
    fn mirrors(&mut self) -> &mut MirrorStack;

    /// Called after every push and pop.
    fn mirrors_changed(&mut self);
}

/// Holds one pushed mirror; popping happens on drop, on every exit path.
pub struct MirrorScope<'a, H: MirrorHost> {
    host: &'a mut H,
}

impl<'a, H: MirrorHost> MirrorScope<'a, H> {
    /// `None` when the stack refused the push.
    pub fn enter(host: &'a mut H, level: &Level, id: DrawMirrorId, def: MirrorDef) -> Option<Self> {
        if !host.mirrors().push(level, id, def) {
            return None;
        }
        host.mirrors_changed();
        Some(Self { host })
    }
}

impl<H: MirrorHost> Deref for MirrorScope<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: MirrorHost> DerefMut for MirrorScope<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: MirrorHost> Drop for MirrorScope<'_, H> {
    fn drop(&mut self) {
        self.host.mirrors().pop();
        self.host.mirrors_changed();
    }
}

/*────────────────────────────── Tests ────────────────────────────────*/
