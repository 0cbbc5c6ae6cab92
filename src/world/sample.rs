//! Small hand-built levels.
//!
//! Every scene is a row of 256×256 rooms laid out west to east along the
//! x axis, split by vertical BSP partitions at the room boundaries.  Rooms
//! are convex, so each one is a single subsector.  The scenes are shared by
//! the unit tests and the `bspwalk` demo; no WAD file is needed.

use glam::Vec2;

use crate::config::RenderConfig;
use crate::world::bsp::SUBSECTOR_BIT;
use crate::world::geometry::{
    Aabb, Extrafloor, ExtrafloorFlags, ExtrafloorId, Fog, Level, LineSpecial, Linedef,
    LinedefFlags, LinedefId, Node, RegionProps, Rgb, Sector, SectorId, Seg, SegmentId, Sidedef,
    Subsector, SubsectorId, Surface, Vertex, VertexId,
};
use crate::world::setup::MapError;
use crate::world::texture::{Image, ImageBank, ImageId, Opacity, TextureError};

/// Room edge length.
pub const ROOM: f32 = 256.0;

/* image ids handed out by `bank()` */
pub const WALL: ImageId = 1;
pub const FLAT: ImageId = 2;
pub const SKY: ImageId = 3;
pub const GRATE: ImageId = 4;
pub const WATER: ImageId = 5;
pub const TROOPER: ImageId = 6;
pub const GLASS: ImageId = 7;

pub const FOG_RED: Rgb = Rgb(160, 32, 32);

/// Images referenced by the sample levels, with fixed ids.
pub fn bank() -> Result<ImageBank, TextureError> {
    let mut bank = ImageBank::default();
    let images = [
        Image::new("STARTAN3", 64, 128),
        Image::new("FLOOR4_8", 64, 64),
        Image::new("F_SKY1", 256, 128).sky(),
        Image::new("MIDGRATE", 64, 128).with_opacity(Opacity::Masked),
        Image::new("FWATER1", 64, 64),
        Image::new("TROOA1", 41, 57)
            .with_opacity(Opacity::Masked)
            .with_offset(Vec2::new(21.0, 54.0)),
        Image::new("GLASS", 64, 128).with_opacity(Opacity::Complex),
    ];
    for img in images {
        bank.insert(img)?;
    }
    bank.fog_wall(FOG_RED);
    Ok(bank)
}

/*──────────────────────────── builder ───────────────────────────────*/

/// How two neighbouring rooms meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Join {
    /// Two-sided line.
    Open,
    /// Two one-sided walls back to back.
    Solid,
    /// Two-sided line with the self-referencing room's sector on both sides.
    SelfRef,
}

#[derive(Clone, Copy, Debug)]
pub struct RoomSpec {
    pub floor_h: f32,
    pub ceil_h: f32,
    /// North/south edges are self-referencing lines (deep-water pool).
    pub self_ref: bool,
}

impl RoomSpec {
    pub fn new(floor_h: f32, ceil_h: f32) -> Self {
        Self {
            floor_h,
            ceil_h,
            self_ref: false,
        }
    }
}

impl Default for RoomSpec {
    fn default() -> Self {
        Self::new(0.0, 128.0)
    }
}

/// Line ids of one room's four edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoomLines {
    pub west: LinedefId,
    pub east: LinedefId,
    pub north: LinedefId,
    pub south: LinedefId,
}

struct Builder {
    lvl: Level,
}

impl Builder {
    fn vertex(&mut self, x: f32, y: f32) -> VertexId {
        let p = Vec2::new(x, y);
        if let Some(i) = self.lvl.vertices.iter().position(|v| v.pos == p) {
            return i as VertexId;
        }
        self.lvl.vertices.push(Vertex::new(x, y));
        (self.lvl.vertices.len() - 1) as VertexId
    }

    fn sector(&mut self, spec: &RoomSpec) -> SectorId {
        self.lvl.sectors.push(Sector {
            floor_h: spec.floor_h,
            ceil_h: spec.ceil_h,
            sky_h: spec.ceil_h,
            floor: Surface::with_image(FLAT),
            ceil: Surface::with_image(FLAT),
            ..Sector::default()
        });
        (self.lvl.sectors.len() - 1) as SectorId
    }

    fn side(&mut self, sector: SectorId, textured: bool, one_sided: bool) -> u16 {
        let tex = |on: bool| if on { Surface::with_image(WALL) } else { Surface::default() };
        self.lvl.sidedefs.push(Sidedef {
            upper: tex(textured && !one_sided),
            middle: tex(textured && one_sided),
            lower: tex(textured && !one_sided),
            sector,
            midmask_offset: 0.0,
        });
        (self.lvl.sidedefs.len() - 1) as u16
    }

    fn line(&mut self, a: Vec2, b: Vec2, front: SectorId, back: Option<SectorId>) -> LinedefId {
        let v1 = self.vertex(a.x, a.y);
        let v2 = self.vertex(b.x, b.y);
        let self_ref = back == Some(front);
        let right = self.side(front, !self_ref, back.is_none());
        let left = back.map(|bk| self.side(bk, !self_ref, false));
        self.lvl.linedefs.push(Linedef {
            v1,
            v2,
            flags: if back.is_some() {
                LinedefFlags::TWO_SIDED
            } else {
                LinedefFlags::IMPASSABLE
            },
            right_sidedef: Some(right),
            left_sidedef: left,
            ..Linedef::default()
        });
        (self.lvl.linedefs.len() - 1) as LinedefId
    }

    fn seg(&mut self, line: LinedefId, dir: u16) -> SegmentId {
        let ld = &self.lvl.linedefs[line as usize];
        let (v1, v2) = if dir == 0 { (ld.v1, ld.v2) } else { (ld.v2, ld.v1) };
        self.lvl.segs.push(Seg {
            v1,
            v2,
            linedef: Some(line),
            dir,
            ..Seg::default()
        });
        (self.lvl.segs.len() - 1) as SegmentId
    }

    /// Vertical partitions at room boundaries; returns the child handle.
    fn nodes(&mut self, lo: usize, hi: usize) -> u16 {
        if hi - lo == 1 {
            return SUBSECTOR_BIT | lo as u16;
        }
        let mid = (lo + hi) / 2;
        let east = self.nodes(mid, hi);
        let west = self.nodes(lo, mid);
        let x = mid as f32 * ROOM;
        let span = |a: usize, b: usize| {
            Aabb::new(Vec2::new(a as f32 * ROOM, 0.0), Vec2::new(b as f32 * ROOM, ROOM))
        };
        self.lvl.nodes.push(Node {
            x,
            y: 0.0,
            dx: 0.0,
            dy: ROOM,
            bbox: [span(mid, hi), span(lo, mid)],
            child: [east, west],
        });
        (self.lvl.nodes.len() - 1) as u16
    }
}

/// Build (but do not finalise) a row of rooms.
///
/// `joins[i]` separates room `i` from room `i + 1`.
pub fn build_rooms(rooms: &[RoomSpec], joins: &[Join]) -> (Level, Vec<RoomLines>) {
    let mut b = Builder {
        lvl: Level {
            name: "SAMPLE".into(),
            ..Level::default()
        },
    };
    let sectors: Vec<SectorId> = rooms.iter().map(|r| b.sector(r)).collect();
    let mut lines = vec![RoomLines::default(); rooms.len()];

    for (i, spec) in rooms.iter().enumerate() {
        let (x0, x1) = (i as f32 * ROOM, (i + 1) as f32 * ROOM);
        let sec = sectors[i];
        let edge_back = spec.self_ref.then_some(sec);
        lines[i].south = b.line(Vec2::new(x1, 0.0), Vec2::new(x0, 0.0), sec, edge_back);
        lines[i].north = b.line(Vec2::new(x0, ROOM), Vec2::new(x1, ROOM), sec, edge_back);
        if i == 0 {
            lines[i].west = b.line(Vec2::new(x0, 0.0), Vec2::new(x0, ROOM), sec, None);
        }
        if i + 1 == rooms.len() {
            lines[i].east = b.line(Vec2::new(x1, ROOM), Vec2::new(x1, 0.0), sec, None);
        }
    }

    for (i, join) in joins.iter().enumerate().take(rooms.len().saturating_sub(1)) {
        let x = (i + 1) as f32 * ROOM;
        let (west, east) = (sectors[i], sectors[i + 1]);
        let (bottom, top) = (Vec2::new(x, 0.0), Vec2::new(x, ROOM));
        match join {
            Join::Open => {
                let l = b.line(bottom, top, east, Some(west));
                lines[i].east = l;
                lines[i + 1].west = l;
            }
            Join::SelfRef => {
                let pool = if rooms[i].self_ref { west } else { east };
                let l = b.line(bottom, top, pool, Some(pool));
                lines[i].east = l;
                lines[i + 1].west = l;
            }
            Join::Solid => {
                lines[i].east = b.line(top, bottom, west, None);
                lines[i + 1].west = b.line(bottom, top, east, None);
            }
        }
    }

    // one subsector per room, room on the right of each of its segs
    for (i, rl) in lines.iter().enumerate() {
        let first = b.lvl.segs.len() as SegmentId;
        // shared join lines point north, so their right side is the east room
        let east_dir = match joins.get(i) {
            Some(Join::Open | Join::SelfRef) => 1,
            _ => 0,
        };
        b.seg(rl.south, 0);
        b.seg(rl.east, east_dir);
        b.seg(rl.north, 0);
        b.seg(rl.west, 0);
        b.lvl.subsectors.push(Subsector {
            first_seg: first,
            seg_count: 4,
            ..Subsector::default()
        });
    }

    // partners: the two directions of one line
    for i in 0..b.lvl.segs.len() {
        let (line, dir) = (b.lvl.segs[i].linedef, b.lvl.segs[i].dir);
        b.lvl.segs[i].partner = b
            .lvl
            .segs
            .iter()
            .position(|s| s.linedef == line && s.dir != dir)
            .map(|p| p as SegmentId);
    }

    if rooms.len() > 1 {
        b.nodes(0, rooms.len());
    }
    (b.lvl, lines)
}

fn finish(mut lvl: Level) -> Result<Level, MapError> {
    lvl.finalise(&RenderConfig::default(), &mut bank()?)?;
    Ok(lvl)
}

/// Add an extrafloor on top of `sector`'s chain, controlled by a fresh
/// dummy sector/line placed outside the map.
fn add_extrafloor(
    lvl: &mut Level,
    sector: SectorId,
    bottom_h: f32,
    top_h: f32,
    kind: ExtrafloorFlags,
) -> ExtrafloorId {
    let n = lvl.extrafloors.len() as f32;
    let control = lvl.sectors.len() as SectorId;
    lvl.sectors.push(Sector {
        floor_h: bottom_h,
        ceil_h: top_h,
        sky_h: top_h,
        floor: Surface::with_image(FLAT),
        ceil: Surface::with_image(if kind.contains(ExtrafloorFlags::LIQUID) { WATER } else { FLAT }),
        ..Sector::default()
    });

    let base = 4096.0 + n * 64.0;
    lvl.vertices.push(Vertex::new(base, 4096.0));
    lvl.vertices.push(Vertex::new(base + 32.0, 4096.0));
    let v = lvl.vertices.len() as VertexId;
    lvl.sidedefs.push(Sidedef {
        middle: Surface::with_image(WALL),
        sector: control,
        ..Sidedef::default()
    });
    lvl.linedefs.push(Linedef {
        v1: v - 2,
        v2: v - 1,
        right_sidedef: Some((lvl.sidedefs.len() - 1) as u16),
        ..Linedef::default()
    });
    let line = (lvl.linedefs.len() - 1) as LinedefId;

    let top_surf = lvl.sectors[control as usize].ceil.clone();
    let bottom_surf = lvl.sectors[control as usize].floor.clone();
    let id = lvl.extrafloors.len() as ExtrafloorId;
    lvl.extrafloors.push(Extrafloor {
        sector,
        line,
        control,
        kind,
        bottom_h,
        top_h,
        top: top_surf,
        bottom: bottom_surf,
        props: RegionProps::default(),
        higher: None,
    });

    // append to the right chain, keeping it ordered by height
    let liquid = kind.contains(ExtrafloorFlags::LIQUID);
    let sec = &mut lvl.sectors[sector as usize];
    let head = if liquid { &mut sec.bottom_liq } else { &mut sec.bottom_ef };
    match *head {
        None => *head = Some(id),
        Some(mut cur) => {
            while let Some(next) = lvl.extrafloors[cur as usize].higher {
                cur = next;
            }
            lvl.extrafloors[cur as usize].higher = Some(id);
        }
    }
    id
}

/*──────────────────────────── scenes ────────────────────────────────*/

/// `n` open rooms in a row, floor 0 / ceiling 128.
pub fn corridor(n: usize) -> Result<Level, MapError> {
    finish(corridor_raw(n))
}

/// Unfinalised [`corridor`].
pub fn corridor_raw(n: usize) -> Level {
    let rooms = vec![RoomSpec::default(); n.max(1)];
    let joins = vec![Join::Open; n.saturating_sub(1)];
    build_rooms(&rooms, &joins).0
}

/// One room and no BSP nodes.
pub fn single_room() -> Result<Level, MapError> {
    corridor(1)
}

/// Two open rooms with given (floor, ceiling) pairs: west room first.
pub fn step(front: (f32, f32), back: (f32, f32)) -> Result<Level, MapError> {
    let rooms = [RoomSpec::new(front.0, front.1), RoomSpec::new(back.0, back.1)];
    finish(build_rooms(&rooms, &[Join::Open]).0)
}

/// Open line between the two rooms of [`step`] and friends.
pub const JOIN_LINE: LinedefId = 6;

/// One room (floor 0, ceiling 256) holding a thin bridge at 64 and a
/// liquid surface at 128.
pub fn layered_room() -> Result<Level, MapError> {
    let (mut lvl, _) = build_rooms(&[RoomSpec::new(0.0, 256.0)], &[]);
    // liquid first so the merge has to interleave the chains
    add_extrafloor(&mut lvl, 0, 128.0, 128.0, ExtrafloorFlags::LIQUID);
    add_extrafloor(&mut lvl, 0, 64.0, 64.0, ExtrafloorFlags::empty());
    finish(lvl)
}

/// Two open rooms (0..192); the east room holds a thick 48..80 slab whose
/// sides use the dummy line's middle texture.
pub fn thick_slab() -> Result<Level, MapError> {
    let rooms = [RoomSpec::new(0.0, 192.0), RoomSpec::new(0.0, 192.0)];
    let (mut lvl, _) = build_rooms(&rooms, &[Join::Open]);
    // a different tag means a different set of extrafloors
    lvl.sectors[1].tag = 1;
    add_extrafloor(&mut lvl, 1, 48.0, 80.0, ExtrafloorFlags::THICK);
    finish(lvl)
}

/// West room plain, east room with a mid-masked grate across the join.
pub fn grate() -> Result<Level, MapError> {
    let (mut lvl, lines) = build_rooms(&[RoomSpec::default(), RoomSpec::default()], &[Join::Open]);
    let ld = &lvl.linedefs[lines[0].east as usize];
    for sd in [ld.right_sidedef, ld.left_sidedef].into_iter().flatten() {
        lvl.sidedefs[sd as usize].middle = Surface::with_image(GRATE);
    }
    finish(lvl)
}

/// Three rooms: outer, deep-water pool bounded by self-referencing lines,
/// outer again.
pub fn deep_water_pool() -> Result<Level, MapError> {
    let rooms = [
        RoomSpec::default(),
        RoomSpec {
            floor_h: -64.0,
            ceil_h: 128.0,
            self_ref: true,
        },
        RoomSpec::default(),
    ];
    finish(build_rooms(&rooms, &[Join::SelfRef, Join::SelfRef]).0)
}

pub const POOL_SUBSECTOR: SubsectorId = 1;

/// Heights of the control sector in [`boom_water`].
pub const WATER_LEVEL: f32 = 64.0;
pub const WATER_CEIL: f32 = 192.0;

/// One room (0..256) whose heights are overridden by a Boom control
/// sector (64..192) with a water floor.  The control sector is the last
/// one and sits outside the map.
pub fn boom_water() -> Result<Level, MapError> {
    let (mut lvl, _) = build_rooms(&[RoomSpec::new(0.0, 256.0)], &[]);
    let control = lvl.sectors.len() as SectorId;
    lvl.sectors.push(Sector {
        floor_h: WATER_LEVEL,
        ceil_h: WATER_CEIL,
        sky_h: WATER_CEIL,
        floor: Surface::with_image(WATER),
        ceil: Surface::with_image(FLAT),
        props: RegionProps {
            light: 96.0,
            fog: None,
        },
        ..Sector::default()
    });
    lvl.sectors[0].heightsec = Some(control);
    finish(lvl)
}

/// A triangular sector whose north corner carries a floor height override.
pub fn sloped_triangle(raised: f32) -> Result<Level, MapError> {
    let mut lvl = Level {
        name: "TRIANGLE".into(),
        ..Level::default()
    };
    lvl.vertices = vec![
        Vertex::new(0.0, 0.0),
        Vertex {
            floor_z: Some(raised),
            ..Vertex::new(0.0, ROOM)
        },
        Vertex::new(ROOM, 0.0),
    ];
    lvl.sectors.push(Sector {
        ceil_h: 128.0,
        sky_h: 128.0,
        floor: Surface::with_image(FLAT),
        ceil: Surface::with_image(FLAT),
        ..Sector::default()
    });
    for (i, (a, b)) in [(0u16, 1u16), (1, 2), (2, 0)].into_iter().enumerate() {
        lvl.sidedefs.push(Sidedef {
            middle: Surface::with_image(WALL),
            ..Sidedef::default()
        });
        lvl.linedefs.push(Linedef {
            v1: a,
            v2: b,
            flags: LinedefFlags::IMPASSABLE,
            right_sidedef: Some(i as u16),
            ..Linedef::default()
        });
        lvl.segs.push(Seg {
            v1: a,
            v2: b,
            linedef: Some(i as LinedefId),
            ..Seg::default()
        });
    }
    lvl.subsectors.push(Subsector {
        first_seg: 0,
        seg_count: 3,
        ..Subsector::default()
    });
    finish(lvl)
}

/// Two open rooms; the east one is filled with red fog.
pub fn fog_boundary() -> Result<Level, MapError> {
    let (mut lvl, _) = build_rooms(&[RoomSpec::default(), RoomSpec::default()], &[Join::Open]);
    lvl.sectors[1].props.fog = Some(Fog {
        color: FOG_RED,
        density: 0.005,
    });
    finish(lvl)
}

pub const FOG_LINE: LinedefId = JOIN_LINE;

/// Two open rooms, the east one under a sky ceiling at 192 with the sky
/// box reaching 256.
pub fn courtyard() -> Result<Level, MapError> {
    let rooms = [RoomSpec::new(0.0, 128.0), RoomSpec::new(0.0, 192.0)];
    let (mut lvl, _) = build_rooms(&rooms, &[Join::Open]);
    for sec in lvl.sectors.iter_mut() {
        sec.sky_h = 256.0;
    }
    lvl.sectors[1].ceil = Surface::with_image(SKY);
    finish(lvl)
}

/// `n` open rooms whose far east wall is a mirror.
pub fn mirror_room(n: usize) -> Result<Level, MapError> {
    let rooms = vec![RoomSpec::default(); n.max(1)];
    let joins = vec![Join::Open; rooms.len() - 1];
    let (mut lvl, lines) = build_rooms(&rooms, &joins);
    let east = lines[rooms.len() - 1].east;
    lvl.linedefs[east as usize].flags |= LinedefFlags::MIRROR;
    finish(lvl)
}

/// One room with mirrors on both the west and the east wall: an endless
/// hall of reflections.
pub fn mirror_hall() -> Result<Level, MapError> {
    let (mut lvl, lines) = build_rooms(&[RoomSpec::default()], &[]);
    for l in [lines[0].west, lines[0].east] {
        lvl.linedefs[l as usize].flags |= LinedefFlags::MIRROR;
    }
    finish(lvl)
}

/// Two rooms separated by a double wall.  The west room's east wall is a
/// portal onto the east room's east wall.
pub fn portal_rooms() -> Result<Level, MapError> {
    let rooms = [RoomSpec::default(), RoomSpec::new(16.0, 160.0)];
    let (mut lvl, lines) = build_rooms(&rooms, &[Join::Solid]);
    let (a, b) = (lines[0].east, lines[1].east);
    lvl.linedefs[a as usize].portal_pair = Some(b);
    lvl.linedefs[b as usize].portal_pair = Some(a);
    lvl.linedefs[a as usize].special = Some(LineSpecial {
        portal_standard: true,
        ..LineSpecial::default()
    });
    finish(lvl)
}

/// Line ids of the portal pair in [`portal_rooms`].
pub fn portal_lines(lvl: &Level) -> Option<(LinedefId, LinedefId)> {
    let a = lvl.linedefs.iter().position(|l| l.portal_pair.is_some())?;
    Some((a as LinedefId, lvl.linedefs[a].portal_pair?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_ids_are_stable() {
        let bank = bank().unwrap();
        assert_eq!(bank.id("STARTAN3"), Some(WALL));
        assert_eq!(bank.id("TROOA1"), Some(TROOPER));
        assert_eq!(bank.id("GLASS"), Some(GLASS));
        assert!(bank.get(SKY).is_sky);
    }

    #[test]
    fn image_errors_reach_the_level_builders() {
        let mut dup = bank().unwrap();
        let err = dup.insert(Image::new("STARTAN3", 64, 128)).unwrap_err();
        let err = MapError::from(err);
        assert!(matches!(err, MapError::Images(TextureError::Duplicate(ref n)) if n == "STARTAN3"));
    }

    #[test]
    fn corridor_rooms_are_closed_and_linked() {
        let lvl = corridor(3).unwrap();
        assert_eq!(lvl.subsectors.len(), 3);
        assert_eq!(lvl.nodes.len(), 2);
        // two open joins, each with a partnered pair of segs
        let partnered = lvl.segs.iter().filter(|s| s.partner.is_some()).count();
        assert_eq!(partnered, 4);
        for ss in &lvl.subsectors {
            assert_eq!(ss.bbox.max - ss.bbox.min, Vec2::splat(ROOM));
        }
    }

    #[test]
    fn join_line_constant_matches_layout() {
        let lvl = step((0.0, 128.0), (0.0, 128.0)).unwrap();
        let ld = &lvl.linedefs[JOIN_LINE as usize];
        assert_eq!(ld.front_sector, 1);
        assert_eq!(ld.back_sector, Some(0));
    }

    #[test]
    fn segs_face_into_their_room() {
        let lvl = corridor(2).unwrap();
        for seg in &lvl.segs {
            let (a, b) = (lvl.vertex(seg.v1), lvl.vertex(seg.v2));
            let bbox = lvl.subsectors[seg.front_sub as usize].bbox;
            let centre = (bbox.min + bbox.max) * 0.5;
            let d = b - a;
            // right-hand side of the seg direction
            let side = (centre - a).perp_dot(d);
            assert!(side > 0.0);
        }
    }

    #[test]
    fn layered_room_chains_are_ordered() {
        let lvl = layered_room().unwrap();
        let order: Vec<f32> = lvl
            .extrafloors_upward(0)
            .map(|e| lvl.extrafloors[e as usize].bottom_h)
            .collect();
        assert_eq!(order, vec![64.0, 128.0]);
    }

    #[test]
    fn portal_lines_pair_both_ways() {
        let lvl = portal_rooms().unwrap();
        let (a, b) = portal_lines(&lvl).unwrap();
        assert_eq!(lvl.linedefs[b as usize].portal_pair, Some(a));
    }
}
