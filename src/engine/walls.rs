//! ----------------------------------------------------------------------------
//! **Wall tiles**
//!
//! A queued seg is cut into tiles against one draw-floor:
//!
//! * one-sided lines get a single middle tile;
//! * two-sided lines get a lower tile (step up), an upper tile (step down),
//!   an optional mid-masked tile (grates, fog walls, sliding doors, glass)
//!   and the sides of the neighbour's thick extrafloors.
//!
//! Every tile ends up in [`Drawer::wall_part`], which turns it into one
//! polygon.  In the solid pass its vertical edges are stitched with the
//! heights of the sectors meeting at each vertex, so neighbouring walls
//! share vertices and no cracks open between them.
//! ----------------------------------------------------------------------------

use bitflags::bitflags;
use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::{
    engine::{frame::DrawFloor, pipeline::Drawer},
    renderer::{Blend, Unit, UnitKind},
    world::{
        ExtrafloorFlags, ImageId, LinedefFlags, MISSING_IMAGE, Opacity, PropsRef, Seclist,
        SegmentId, SlideKind, Surface, SurfaceRef,
    },
};

/// Heights beyond anything a map uses.
const UNBOUNDED: f32 = 32767.0;

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    struct TileFlags: u8 {
        /// Middle texture of a two-sided line.
        const MID_MASK = 0x01;
        /// Thick extrafloor side.
        const EXTRA    = 0x02;
        /// Add the dummy line's x offset.
        const EXTRA_X  = 0x04;
        /// Add the dummy line's y offset.
        const EXTRA_Y  = 0x08;
    }
}

/// One seg against one draw-floor.
struct SegWalls<'f> {
    seg: SegmentId,
    floor: &'f DrawFloor,
    /// Tiles are clamped into `f_min ..= c_max`.
    f_min: f32,
    c_max: f32,
    /// The subsector is drawn through a mirror.
    mirror_sub: bool,
}

/// A wall polygon before the mirror transform.
struct WallPart<'s> {
    surf: &'s Surface,
    image: ImageId,
    p1: Vec2,
    p2: Vec2,
    /// Bottom and top height at each end.
    left: (f32, f32),
    right: (f32, f32),
    /// World height of the texture's top edge.
    tex_top_h: f32,
    /// Texture x at each end, in world units.
    tex_x: (f32, f32),
    mid_masked: bool,
    props: Option<PropsRef>,
}

impl Drawer<'_> {
    /*──────────────────────────── Seg entry ──────────────────────────*/

    pub(crate) fn draw_seg(&mut self, floor: &DrawFloor, seg_id: SegmentId, mirror_sub: bool) {
        let level = self.level;
        let seg = &level.segs[seg_id as usize];
        let Some(line) = seg.linedef else {
            return;
        };
        level.mark_mapped(line);

        let f_min = if floor.is_lowest { -UNBOUNDED } else { floor.f_h };
        let mut c_max = if floor.is_highest { UNBOUNDED } else { floor.c_h };

        // translucent thick floors: keep the walls below their top
        if let Some(e) = floor.ef {
            let ef = &level.extrafloors[e as usize];
            if !floor.is_highest
                && ef.kind.contains(ExtrafloorFlags::THICK)
                && ef.top.translucency < 0.99
            {
                c_max = ef.top_h;
            }
        }

        let walls = SegWalls {
            seg: seg_id,
            floor,
            f_min,
            c_max,
            mirror_sub,
        };
        self.wall_tiles(&walls);

        if self.solid && self.cfg.flood_emulation {
            self.flood_steps(floor, seg_id);
        }
    }

    /// Untextured steps show the neighbour's plane instead of a hole.
    fn flood_steps(&mut self, floor: &DrawFloor, seg_id: SegmentId) {
        let level = self.level;
        let seg = &level.segs[seg_id as usize];
        let (Some(sd), Some(back_sub)) = (seg.sidedef, seg.back_sub) else {
            return;
        };
        let side = &level.sidedefs[sd as usize];
        let f_id = level.subsectors[seg.front_sub as usize].sector;
        let b_id = level.subsectors[back_sub as usize].sector;
        let (f, b) = (&level.sectors[f_id as usize], &level.sectors[b_id as usize]);

        if f.heightsec.is_some() || b.heightsec.is_some() {
            return;
        }
        let view_z = self.view.z;

        if floor.is_lowest
            && side.lower.image.is_none()
            && b.floor_h > f.floor_h
            && b.floor_h < view_z
        {
            self.flood(seg_id, b_id, 1, f.floor_h, b.floor_h);
        }
        if floor.is_highest
            && side.upper.image.is_none()
            && b.ceil_h < f.ceil_h
            && b.ceil_h > view_z
        {
            self.flood(seg_id, b_id, -1, b.ceil_h, f.ceil_h);
        }
    }

    /*──────────────────────────── Tiling ─────────────────────────────*/

    fn wall_tiles(&mut self, w: &SegWalls<'_>) {
        let level = self.level;
        let seg = &level.segs[w.seg as usize];
        let Some(line) = seg.linedef else {
            return;
        };
        let Some(sd_id) = seg.sidedef else {
            return;
        };
        let ld = &level.linedefs[line as usize];
        let sd = &level.sidedefs[sd_id as usize];
        let sec = &level.sectors[sd.sector as usize];

        let mut slope_fh = sec.floor_h;
        if let Some(s) = &sec.floor_slope {
            slope_fh += s.min_dz();
        }
        let mut slope_ch = sec.ceil_h;
        if let Some(s) = &sec.ceil_slope {
            slope_ch += s.max_dz();
        }
        // Boom invisible walkways
        if let Some(hs) = sec.heightsec {
            slope_fh = slope_fh.min(level.sectors[hs as usize].floor_h);
        }

        let lower_unpegged = ld.flags.contains(LinedefFlags::LOWER_UNPEGGED);
        let upper_unpegged = ld.flags.contains(LinedefFlags::UPPER_UNPEGGED);
        let bank = self.bank;
        let img_h = |s: &Surface| s.image.map_or(0.0, |id| bank.get(id).height());

        // fog walls are dropped while distance culling hides the fog
        let middle_image = if sd.middle.fog_wall && self.cfg.culling {
            None
        } else {
            sd.middle.image
        };

        // 1 ─ one-sided: a single middle tile
        let Some(other_id) = seg.back_sector else {
            if middle_image.is_none() && sec.props.fog.is_some() {
                return;
            }
            let tex_z = if lower_unpegged {
                sec.floor_h + img_h(&sd.middle) / sd.middle.y_mat.y
            } else {
                sec.ceil_h
            };
            self.add_wall_tile(w, &sd.middle, slope_fh, slope_ch, tex_z, TileFlags::empty());
            return;
        };
        let other = &level.sectors[other_id as usize];

        let (v1, v2) = (
            &level.vertices[seg.v1 as usize],
            &level.vertices[seg.v2 as usize],
        );

        // 2 ─ lower tile
        let mut lower_invis = false;
        let vslope_f = (sec.floor_vslope.is_some(), other.floor_vslope.is_some());
        if slope_fh < other.floor_h || vslope_f.0 || vslope_f.1 {
            let (mut zv1, mut zv2) = (v1.floor_z, v2.floor_z);
            if w.mirror_sub {
                std::mem::swap(&mut zv1, &mut zv2);
            }

            match vslope_f {
                (false, true) => {
                    let surf = if sd.lower.image.is_some() { &sd.lower } else { &other.floor };
                    let (l, r) = (zv1.unwrap_or(sec.floor_h), zv2.unwrap_or(sec.floor_h));
                    let tex_z = if lower_unpegged { sec.ceil_h } else { sec.floor_h.max(l).max(r) };
                    self.tile2(w, surf, (sec.floor_h, l), (sec.floor_h, r), tex_z, TileFlags::empty());
                }
                (true, false) => {
                    let surf = if sd.lower.image.is_some() { &sd.lower } else { &sec.floor };
                    let (l, r) = (zv1.unwrap_or(other.floor_h), zv2.unwrap_or(other.floor_h));
                    let tex_z = if lower_unpegged {
                        other.ceil_h
                    } else {
                        other.floor_h.max(l).max(r)
                    };
                    self.tile2(w, surf, (l, other.floor_h), (r, other.floor_h), tex_z, TileFlags::empty());
                }
                _ if sd.lower.image.is_none() && !self.cfg.lower_fallback => lower_invis = true,
                _ => {
                    let surf = if sd.lower.image.is_some() { &sd.lower } else { &other.floor };
                    let tex_z = if lower_unpegged { sec.ceil_h } else { other.floor_h };
                    match &other.floor_slope {
                        Some(s) => {
                            let l = other.floor_h + s.height_at(v1.pos);
                            let r = other.floor_h + s.height_at(v2.pos);
                            self.tile2(w, surf, (slope_fh, l), (slope_fh, r), tex_z, TileFlags::empty());
                        }
                        None => self.add_wall_tile(
                            w,
                            surf,
                            slope_fh,
                            other.floor_h,
                            tex_z,
                            TileFlags::empty(),
                        ),
                    }
                }
            }
        }

        // 3 ─ upper tile (two sky ceilings meet without one)
        let mut upper_invis = false;
        let vslope_c = (sec.ceil_vslope.is_some(), other.ceil_vslope.is_some());
        let both_sky = self.is_sky(&sec.ceil) && self.is_sky(&other.ceil);
        if (slope_ch > other.ceil_h || vslope_c.0 || vslope_c.1) && !both_sky {
            let (mut zv1, mut zv2) = (v1.ceil_z, v2.ceil_z);
            if w.mirror_sub {
                std::mem::swap(&mut zv1, &mut zv2);
            }

            match vslope_c {
                (false, true) => {
                    let surf = if sd.upper.image.is_some() { &sd.upper } else { &other.ceil };
                    let (l, r) = (zv1.unwrap_or(sec.ceil_h), zv2.unwrap_or(sec.ceil_h));
                    let tex_z = if upper_unpegged { sec.floor_h } else { l.min(r) };
                    self.tile2(w, surf, (sec.ceil_h, l), (sec.ceil_h, r), tex_z, TileFlags::empty());
                }
                (true, false) => {
                    let surf = if sd.upper.image.is_some() { &sd.upper } else { &sec.ceil };
                    let (l, r) = (zv1.unwrap_or(other.ceil_h), zv2.unwrap_or(other.ceil_h));
                    let tex_z = if upper_unpegged { other.floor_h } else { l.min(r) };
                    self.tile2(w, surf, (other.ceil_h, l), (other.ceil_h, r), tex_z, TileFlags::empty());
                }
                _ if sd.upper.image.is_none() && !self.cfg.lower_fallback => upper_invis = true,
                _ => {
                    let surf = if sd.upper.image.is_some() { &sd.upper } else { &other.ceil };
                    let tex_z = if upper_unpegged {
                        sec.ceil_h
                    } else {
                        other.ceil_h + img_h(surf)
                    };
                    match &other.ceil_slope {
                        Some(s) => {
                            let l = other.ceil_h + s.height_at(v1.pos);
                            let r = other.ceil_h + s.height_at(v2.pos);
                            self.tile2(w, surf, (l, slope_ch), (r, slope_ch), tex_z, TileFlags::empty());
                        }
                        None => self.add_wall_tile(
                            w,
                            surf,
                            other.ceil_h,
                            slope_ch,
                            tex_z,
                            TileFlags::empty(),
                        ),
                    }
                }
            }
        }

        // 4 ─ mid-masked tile
        if let Some(mid) = middle_image {
            let mid_h = bank.get(mid).height() / sd.middle.y_mat.y;
            let mut f1 = sec.floor_h.max(other.floor_h);
            let mut c1 = sec.ceil_h.min(other.ceil_h);

            let (mut f2, mut c2) = if sd.middle.fog_wall {
                (f1, c1)
            } else if lower_unpegged {
                let f2 = f1 + sd.midmask_offset;
                (f2, f2 + mid_h)
            } else {
                let c2 = c1 + sd.midmask_offset;
                (c2 - mid_h, c2)
            };
            let tex_z = c2;

            // transparent doors
            if lower_invis {
                f1 = sec.floor_h;
            }
            if upper_invis {
                c1 = sec.ceil_h;
            }

            // see-through lines keep their full texture
            if sd.sector != other_id {
                f2 = f2.max(f1);
                c2 = c2.min(c1);
            }

            if c2 > f2 {
                self.add_wall_tile(w, &sd.middle, f2, c2, tex_z, TileFlags::MID_MASK);
            }
        }

        // 5 ─ sides of the neighbour's thick extrafloors
        if other.tag == sec.tag {
            return;
        }
        let mut floor_h = other.floor_h;
        for e in level.extrafloors_upward(other_id) {
            let ef = &level.extrafloors[e as usize];

            // liquids inside thick solids, or outside the real sector
            if ef.bottom_h < floor_h || ef.bottom_h > other.ceil_h {
                continue;
            }

            if ef.kind.contains(ExtrafloorFlags::THICK) {
                let mut flags = TileFlags::EXTRA;
                let surf = if ef.kind.contains(ExtrafloorFlags::SIDE_UPPER) {
                    &sd.upper
                } else if ef.kind.contains(ExtrafloorFlags::SIDE_LOWER) {
                    &sd.lower
                } else {
                    flags |= TileFlags::EXTRA_X;
                    if ef.kind.contains(ExtrafloorFlags::SIDE_MID_Y) {
                        flags |= TileFlags::EXTRA_Y;
                    }
                    level.surface(SurfaceRef::ExtraSide(e))
                };

                if surf.image.is_some() {
                    let ef_line = &level.linedefs[ef.line as usize];
                    let tex_z = if ef_line.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                        ef.bottom_h + img_h(surf) / surf.y_mat.y
                    } else {
                        ef.top_h
                    };
                    self.add_wall_tile(w, surf, ef.bottom_h, ef.top_h, tex_z, flags);
                }
            }
            floor_h = ef.top_h;
        }
    }

    /// Flat-topped tile, clamped to the draw-floor.
    fn add_wall_tile(
        &mut self,
        w: &SegWalls<'_>,
        surf: &Surface,
        z1: f32,
        z2: f32,
        tex_z: f32,
        flags: TileFlags,
    ) {
        let z1 = z1.max(w.f_min);
        let z2 = z2.min(w.c_max);
        if z1 >= z2 - 0.01 {
            return;
        }
        self.draw_tile(w, (z1, z2), (z1, z2), tex_z, flags, surf);
    }

    /// Tile with different heights at each end; never clamped.
    fn tile2(
        &mut self,
        w: &SegWalls<'_>,
        surf: &Surface,
        left: (f32, f32),
        right: (f32, f32),
        tex_z: f32,
        flags: TileFlags,
    ) {
        self.draw_tile(w, left, right, tex_z, flags, surf);
    }

    fn draw_tile(
        &mut self,
        w: &SegWalls<'_>,
        left: (f32, f32),
        right: (f32, f32),
        tex_z: f32,
        flags: TileFlags,
        surf: &Surface,
    ) {
        let level = self.level;
        let seg = &level.segs[w.seg as usize];
        let (Some(line), Some(sd)) = (seg.linedef, seg.sidedef) else {
            return;
        };
        let ld = &level.linedefs[line as usize];
        let side = &level.sidedefs[sd as usize];

        let mut tex_top_h = tex_z + surf.offset.y;
        let mut x_offset = surf.offset.x;
        if flags.contains(TileFlags::EXTRA_X) {
            x_offset += side.middle.offset.x;
        }
        if flags.contains(TileFlags::EXTRA_Y) {
            tex_top_h += side.middle.offset.y;
        }

        let mid_mask = flags.contains(TileFlags::MID_MASK);
        if mid_mask {
            if let Some(door) = ld.slide {
                if let Some(image) = surf.image {
                    self.sliding_door(w, door.kind, door.opening, left, tex_top_h, surf, image, x_offset);
                }
                return;
            }
            if ld.special.is_some_and(|sp| sp.glass) {
                if let Some(image) = surf.image {
                    self.glass(w, left, tex_top_h, surf, image, x_offset);
                }
                return;
            }
        }

        let (p1, p2) = level.seg_points(w.seg);
        let tex_x1 = seg.offset + x_offset;
        self.wall_part(
            w,
            WallPart {
                surf,
                image: surf.image.unwrap_or(MISSING_IMAGE),
                p1,
                p2,
                left,
                right,
                tex_top_h,
                tex_x: (tex_x1, tex_x1 + seg.length),
                mid_masked: mid_mask,
                props: mid_mask.then_some(PropsRef::Sector(side.sector)),
            },
        );
    }

    /*───────────────────────── Moving middles ────────────────────────*/

    /// Extent of the current seg along its line, from the line's start.
    fn seg_extent(&self, seg_id: SegmentId) -> (f32, f32) {
        let level = self.level;
        let seg = &level.segs[seg_id as usize];
        let length = seg.linedef.map_or(0.0, |l| level.linedefs[l as usize].length);
        if seg.dir == 0 {
            (seg.offset, seg.offset + seg.length)
        } else {
            let e = length - seg.offset;
            (e - seg.length, e)
        }
    }

    /// Point at distance `along` from the start of the seg's line.
    fn along_line(&self, seg_id: SegmentId, along: f32) -> Vec2 {
        let level = self.level;
        let Some(line) = level.segs[seg_id as usize].linedef else {
            return Vec2::ZERO;
        };
        let ld = &level.linedefs[line as usize];
        let start = level.vertex(ld.v1);
        if ld.length <= 0.0 {
            return start;
        }
        start + Vec2::new(ld.dx, ld.dy) * (along / ld.length)
    }

    /// Draw one door leaf `s_along .. e_along` (line coordinates) cut down to
    /// the current seg.
    #[allow(clippy::too_many_arguments)]
    fn door_leaf(
        &mut self,
        w: &SegWalls<'_>,
        (mut s_along, mut e_along): (f32, f32),
        (mut s_tex, mut e_tex): (f32, f32),
        heights: (f32, f32),
        tex_top_h: f32,
        surf: &Surface,
        image: ImageId,
        x_offset: f32,
    ) {
        let (s_seg, e_seg) = self.seg_extent(w.seg);
        if s_along < s_seg {
            s_tex += s_seg - s_along;
            s_along = s_seg;
        }
        if e_along > e_seg {
            e_tex += e_seg - e_along;
            e_along = e_seg;
        }
        if s_along >= e_along {
            return;
        }

        let p1 = self.along_line(w.seg, s_along);
        let p2 = self.along_line(w.seg, e_along);
        self.wall_part(
            w,
            WallPart {
                surf,
                image,
                p1,
                p2,
                left: heights,
                right: heights,
                tex_top_h,
                tex_x: (s_tex + x_offset, e_tex + x_offset),
                mid_masked: true,
                props: None,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn sliding_door(
        &mut self,
        w: &SegWalls<'_>,
        kind: SlideKind,
        opening: f32,
        heights: (f32, f32),
        tex_top_h: f32,
        surf: &Surface,
        image: ImageId,
        x_offset: f32,
    ) {
        let level = self.level;
        let Some(line) = level.segs[w.seg as usize].linedef else {
            return;
        };
        let len = level.linedefs[line as usize].length;

        let mut leaves: SmallVec<[((f32, f32), (f32, f32)); 2]> = SmallVec::new();
        match kind {
            SlideKind::Left => {
                let e = len - opening;
                leaves.push(((0.0, e), (-e, 0.0)));
            }
            SlideKind::Right => leaves.push(((opening, len), (0.0, len - opening))),
            SlideKind::Center => {
                let half = (len - opening) / 2.0;
                let e_tex = len / 2.0;
                leaves.push(((0.0, half), (e_tex - half, e_tex)));
                let s = (len + opening) / 2.0;
                let s_tex = len / 2.0;
                leaves.push(((s, len), (s_tex, s_tex + (len - s))));
            }
        }

        for (along, tex) in leaves {
            self.door_leaf(w, along, tex, heights, tex_top_h, surf, image, x_offset);
        }
    }

    /// Breakable glass: the texture runs backwards so it reads the same from
    /// both sides.
    fn glass(
        &mut self,
        w: &SegWalls<'_>,
        heights: (f32, f32),
        tex_top_h: f32,
        surf: &Surface,
        image: ImageId,
        x_offset: f32,
    ) {
        self.sliding_door(w, SlideKind::Left, 0.0, heights, tex_top_h, surf, image, x_offset);
    }

    /*──────────────────────────── Polygon ────────────────────────────*/

    fn wall_part(&mut self, w: &SegWalls<'_>, part: WallPart<'_>) {
        let level = self.level;
        let props = level.props(part.props.unwrap_or(w.floor.props));
        let img = self.bank.get(part.image);
        let trans = part.surf.translucency;

        // solid walls in the solid pass only, the rest in the other
        if (trans < 0.99 || img.opacity >= Opacity::Masked) == self.solid {
            return;
        }

        // 1 ─ into mirror space
        let mut p1 = self.mirrors.point(part.p1);
        let mut p2 = self.mirrors.point(part.p2);
        let (mut tex_x1, mut tex_x2) = part.tex_x;
        if self.mirrors.is_reflective() {
            std::mem::swap(&mut p1, &mut p2);
            std::mem::swap(&mut tex_x1, &mut tex_x2);
        }

        // 2 ─ fake contrast on axis-aligned walls
        let (s1, s2) = level.seg_points(w.seg);
        let mut lit_adjust = 0.0;
        if props.light > 0.0 {
            if (s1.y - s2.y).abs() < 0.0001 {
                lit_adjust = -16.0;
            } else if (s1.x - s2.x).abs() < 0.0001 {
                lit_adjust = 16.0;
            }
        }

        // 3 ─ texture mapping
        let (total_w, total_h) = (img.total_w as f32, img.total_h as f32);
        let tx0 = tex_x1 * part.surf.x_mat.x / total_w;
        let tx_mul = tex_x2 * part.surf.x_mat.x / total_w - tx0;

        let tex_top_h = self.mirrors.height(part.tex_top_h);
        let ty_mul = part.surf.y_mat.y / (total_h * self.mirrors.z_scale());
        let ty0 = img.top() - tex_top_h * ty_mul;

        // 4 ─ edges, stitched to the neighbours in the solid pass
        let mut left_h: SmallVec<[f32; 8]> = SmallVec::from_slice(&[part.left.0, part.left.1]);
        let mut right_h: SmallVec<[f32; 8]> = SmallVec::from_slice(&[part.right.0, part.right.1]);
        if self.solid && !part.mid_masked {
            let seg = &level.segs[w.seg as usize];
            if let Some(list) = seg.nb_sec[0] {
                self.greet_neighbours(&mut left_h, &level.seclists[list as usize]);
            }
            if let Some(list) = seg.nb_sec[1] {
                self.greet_neighbours(&mut right_h, &level.seclists[list as usize]);
            }
        }

        let positions: SmallVec<[Vec3; 16]> = left_h
            .iter()
            .map(|&z| p1.extend(self.mirrors.height(z)))
            .chain(right_h.iter().rev().map(|&z| p2.extend(self.mirrors.height(z))))
            .collect();

        // 5 ─ blending
        let mut blend = Blend::for_surface(trans, img.opacity);
        let scrolls = level.segs[w.seg as usize]
            .linedef
            .and_then(|l| level.linedefs[l as usize].special)
            .is_some_and(|sp| sp.y_speed != 0.0);
        if part.mid_masked && !scrolls {
            blend |= Blend::CLAMP_Y;
        }

        let coords = Self::wall_coords(p1, p2, tx0, ty0, tx_mul, ty_mul);
        let unit = Unit::mix(
            UnitKind::Wall,
            Some(part.image),
            blend,
            trans,
            &positions,
            &coords,
            self.shader,
            props,
            lit_adjust,
        );
        self.emit_lit(unit, &positions, &coords);
    }

    /// Insert the floor and ceiling heights of the sectors around a vertex
    /// into an ascending edge height list.
    fn greet_neighbours(&self, hts: &mut SmallVec<[f32; 8]>, list: &Seclist) {
        let tol = self.cfg.stitch_tolerance;
        let level = self.level;

        for &sid in list {
            let sec = &level.sectors[sid as usize];
            for h in [sec.floor_h, sec.ceil_h] {
                if hts.len() >= self.cfg.max_edge_vert {
                    return;
                }
                let (lo, hi) = (hts[0], hts[hts.len() - 1]);
                if h <= lo + tol || h >= hi - tol {
                    continue;
                }

                let mut at = None;
                for pos in 1..hts.len() {
                    if h < hts[pos] - tol {
                        at = Some(pos);
                        break;
                    }
                    if h < hts[pos] + tol {
                        // already present
                        break;
                    }
                }
                if let Some(pos) = at {
                    hts.insert(pos, h);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hecs::World;

    use crate::config::RenderConfig;
    use crate::engine::{Engine, Scene};
    use crate::renderer::{BlendClass, FlatShader, RecordingSink};
    use crate::world::{Bam, Camera, Level, SlidingDoor, sample};

    use super::*;

    fn render(lvl: &Level, eye: Vec3) -> RecordingSink {
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
        sink
    }

    fn z_range(u: &Unit) -> (f32, f32) {
        let lo = u.verts.iter().map(|v| v.pos.z).fold(f32::MAX, f32::min);
        let hi = u.verts.iter().map(|v| v.pos.z).fold(f32::MIN, f32::max);
        (lo, hi)
    }

    /// Walls on the join line between the two rooms, seen from the west.
    fn join_walls(sink: &RecordingSink) -> Vec<(f32, f32)> {
        let x = sample::ROOM;
        let mut parts: Vec<_> = sink
            .of_kind(UnitKind::Wall)
            .filter(|u| u.verts.iter().all(|v| (v.pos.x - x).abs() < 1e-3))
            .map(z_range)
            .collect();
        parts.sort_by(|a, b| a.0.total_cmp(&b.0));
        parts
    }

    #[test]
    fn steps_get_lower_and_upper_tiles() {
        let lvl = sample::step((0.0, 200.0), (100.0, 150.0)).unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert_eq!(join_walls(&sink), vec![(0.0, 100.0), (150.0, 200.0)]);
    }

    #[test]
    fn no_upper_tile_under_a_higher_ceiling() {
        let lvl = sample::step((0.0, 128.0), (32.0, 200.0)).unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert_eq!(join_walls(&sink), vec![(0.0, 32.0)]);
    }

    #[test]
    fn one_sided_walls_span_floor_to_ceiling() {
        let lvl = sample::single_room().unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let walls: Vec<_> = sink.of_kind(UnitKind::Wall).collect();
        assert!(!walls.is_empty());
        for u in walls {
            assert_eq!(z_range(u), (0.0, 128.0));
            assert_eq!(u.class(), BlendClass::Opaque);
        }
    }

    #[test]
    fn axis_aligned_walls_get_fake_contrast() {
        let lvl = sample::single_room().unwrap();
        let sink = render(&lvl, Vec3::new(128.0, 128.0, 41.0));
        let east = sink
            .of_kind(UnitKind::Wall)
            .find(|u| u.verts.iter().all(|v| v.pos.x == sample::ROOM))
            .unwrap();
        // light 160 brightened by 16
        assert!((east.verts[0].rgb.x - 176.0 / 255.0).abs() < 1e-5);
    }

    #[test]
    fn stitching_adds_neighbour_heights_to_the_edges() {
        // the step's 100 and 150 lie inside the west room's 0..200 walls
        let lvl = sample::step((0.0, 200.0), (100.0, 150.0)).unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let north = sink
            .of_kind(UnitKind::Wall)
            .find(|u| u.verts.iter().all(|v| v.pos.y == sample::ROOM && v.pos.x <= sample::ROOM))
            .unwrap();
        let at_join: Vec<f32> = north
            .verts
            .iter()
            .filter(|v| v.pos.x == sample::ROOM)
            .map(|v| v.pos.z)
            .collect();
        assert!(at_join.len() > 2, "{at_join:?}");
        assert!(at_join.contains(&100.0) && at_join.contains(&150.0));
    }

    #[test]
    fn grate_is_drawn_in_the_translucent_pass_and_clamped() {
        let lvl = sample::grate().unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let grates: Vec<_> = sink
            .units
            .iter()
            .filter(|r| r.unit.image == Some(sample::GRATE))
            .collect();
        assert_eq!(grates.len(), 1);
        assert!(!grates[0].solid_pass);
        assert!(grates[0].unit.blend.contains(Blend::CLAMP_Y | Blend::LESS));
        // 128 high texture hung from the 128 ceiling
        assert_eq!(z_range(&grates[0].unit), (0.0, 128.0));
    }

    #[test]
    fn thick_slab_sides_face_the_open_room() {
        let lvl = sample::thick_slab().unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        assert!(join_walls(&sink).contains(&(48.0, 80.0)));
    }

    #[test]
    fn fog_boundary_gets_a_translucent_fog_wall() {
        let lvl = sample::fog_boundary().unwrap();
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let fog: Vec<_> = sink
            .units
            .iter()
            .filter(|r| r.unit.image.is_some_and(|i| i > sample::GLASS))
            .collect();
        assert_eq!(fog.len(), 1);
        assert!(!fog[0].solid_pass);
        assert_eq!(fog[0].unit.class(), BlendClass::Alpha);
    }

    #[test]
    fn fog_walls_vanish_with_culling() {
        let lvl = sample::fog_boundary().unwrap();
        let bank = sample::bank().unwrap();
        let world = World::new();
        let mut engine = Engine::new(RenderConfig {
            culling: true,
            ..RenderConfig::default()
        });
        let mut sink = RecordingSink::new();
        engine.render_frame(
            &Scene::new(&lvl, &bank, &world),
            &Camera::new(Vec3::new(40.0, 128.0, 41.0), Bam::ZERO, 1.6),
            &FlatShader::default(),
            &mut sink,
        );
        assert!(sink.units.iter().all(|r| r.unit.image.is_none_or(|i| i <= sample::GLASS)));
    }

    #[test]
    fn half_open_door_leaves_half_a_leaf() {
        let mut lvl = sample::grate().unwrap();
        let join = sample::JOIN_LINE as usize;
        lvl.linedefs[join].slide = Some(SlidingDoor {
            kind: SlideKind::Left,
            opening: sample::ROOM / 2.0,
        });
        let sink = render(&lvl, Vec3::new(40.0, 128.0, 41.0));
        let leaf = sink.of_kind(UnitKind::Wall).find(|u| u.image == Some(sample::GRATE)).unwrap();
        let ys: Vec<f32> = leaf.verts.iter().map(|v| v.pos.y).collect();
        let span = ys.iter().copied().fold(f32::MIN, f32::max) - ys.iter().copied().fold(f32::MAX, f32::min);
        assert!((span - sample::ROOM / 2.0).abs() < 1e-3, "{ys:?}");
    }
}
