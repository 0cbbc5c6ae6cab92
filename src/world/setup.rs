// ──────────────────────────────────────────────────────────────────────────
// world/setup.rs
//
//  *   Level filled by an external loader   ──╮
//  *   RenderConfig                           │   --->  validated Level with
//  *   ImageBank (mut, fog walls)             │         every derived field set
//                                             ╯
// ──────────────────────────────────────────────────────────────────────────

use std::sync::atomic::AtomicBool;

use glam::Vec3;
use log::{debug, warn};
use smallvec::SmallVec;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::world::angle::Bam;
use crate::world::bsp::{CHILD_MASK, SUBSECTOR_BIT};
use crate::world::geometry::{Aabb, Level, Seclist, SectorId, SubsectorId, Vertex, VertexSlope};
use crate::world::texture::{ImageBank, TextureError};

/*──────────────────────────── Error type ───────────────────────────*/

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MapError {
    #[error("level contains 0 {0}")]
    Empty(&'static str),

    #[error("malformed geometry: {what} #{index}: {reason}")]
    MalformedGeometry {
        what: &'static str,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    Images(#[from] TextureError),
}

fn malformed(what: &'static str, index: usize, reason: impl Into<String>) -> MapError {
    MapError::MalformedGeometry {
        what,
        index,
        reason: reason.into(),
    }
}

/// Heights inside this band are considered "unset" vertex overrides.
const VERTEX_Z_RANGE: std::ops::Range<f32> = -32768.0..32767.0;

/*====================================================================*/
/*                       Public API                                   */
/*====================================================================*/

impl Level {
    /// Validate the graph and compute every derived field the renderer
    /// relies on.  Must run once before the first frame.
    pub fn finalise(&mut self, config: &RenderConfig, bank: &mut ImageBank) -> Result<(), MapError> {
        self.validate()?;
        self.compute_bounds();
        self.link_segs();
        self.assign_subsector_sectors();
        self.detect_deep_water(config.deep_water_passes);
        self.compute_vertex_slopes();
        self.build_vertex_seclists(config.seclist_max);
        if config.fog_walls {
            self.synthesize_fog_walls(bank);
        }
        self.automap = (0..self.linedefs.len())
            .map(|_| AtomicBool::new(false))
            .collect();

        debug!(
            "finalised `{}`: {} subsectors, {} segs, {} nodes, {} seclists",
            self.name,
            self.subsectors.len(),
            self.segs.len(),
            self.nodes.len(),
            self.seclists.len()
        );
        Ok(())
    }

    /// Bounds-check every cross reference.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.segs.is_empty() {
            return Err(MapError::Empty("segs"));
        }
        if self.subsectors.is_empty() {
            return Err(MapError::Empty("subsectors"));
        }
        if self.sectors.is_empty() {
            return Err(MapError::Empty("sectors"));
        }

        let nv = self.vertices.len();
        let nl = self.linedefs.len();
        let nsd = self.sidedefs.len();
        let nsec = self.sectors.len();
        let nef = self.extrafloors.len();
        let nseg = self.segs.len();

        let check = |ok: bool, what, i, reason: &str| {
            if ok { Ok(()) } else { Err(malformed(what, i, reason)) }
        };

        for (i, ld) in self.linedefs.iter().enumerate() {
            check((ld.v1 as usize) < nv && (ld.v2 as usize) < nv, "linedef", i, "vertex out of range")?;
            let right = ld
                .right_sidedef
                .ok_or_else(|| malformed("linedef", i, "no right side"))?;
            check((right as usize) < nsd, "linedef", i, "right side out of range")?;
            check(
                ld.left_sidedef.is_none_or(|s| (s as usize) < nsd),
                "linedef",
                i,
                "left side out of range",
            )?;
            check(
                ld.portal_pair.is_none_or(|p| (p as usize) < nl),
                "linedef",
                i,
                "portal pair out of range",
            )?;
        }

        for (i, sd) in self.sidedefs.iter().enumerate() {
            check((sd.sector as usize) < nsec, "sidedef", i, "sector out of range")?;
        }

        for (i, sec) in self.sectors.iter().enumerate() {
            check(sec.heightsec.is_none_or(|h| (h as usize) < nsec), "sector", i, "heightsec out of range")?;
            check(
                sec.bottom_ef.is_none_or(|e| (e as usize) < nef)
                    && sec.bottom_liq.is_none_or(|e| (e as usize) < nef),
                "sector",
                i,
                "extrafloor out of range",
            )?;
        }

        for (i, ef) in self.extrafloors.iter().enumerate() {
            check(
                (ef.sector as usize) < nsec && (ef.control as usize) < nsec,
                "extrafloor",
                i,
                "sector out of range",
            )?;
            check((ef.line as usize) < nl, "extrafloor", i, "line out of range")?;
            check(ef.higher.is_none_or(|e| (e as usize) < nef), "extrafloor", i, "chain out of range")?;
        }

        for (i, seg) in self.segs.iter().enumerate() {
            check((seg.v1 as usize) < nv && (seg.v2 as usize) < nv, "seg", i, "vertex out of range")?;
            check(seg.dir <= 1, "seg", i, "direction must be 0 or 1")?;
            check(seg.partner.is_none_or(|p| (p as usize) < nseg), "seg", i, "partner out of range")?;
            if let Some(l) = seg.linedef {
                let ld = self
                    .linedefs
                    .get(l as usize)
                    .ok_or_else(|| malformed("seg", i, "linedef out of range"))?;
                let side = if seg.dir == 0 { ld.right_sidedef } else { ld.left_sidedef };
                check(side.is_some(), "seg", i, "linedef has no side in this direction")?;
            }
        }

        for (i, ss) in self.subsectors.iter().enumerate() {
            check(ss.seg_count > 0, "subsector", i, "no segs")?;
            check(ss.seg_ids().end <= nseg, "subsector", i, "segs out of range")?;
        }

        for (i, node) in self.nodes.iter().enumerate() {
            for &child in &node.child {
                let ok = if child & SUBSECTOR_BIT != 0 {
                    ((child & CHILD_MASK) as usize) < self.subsectors.len()
                } else {
                    (child as usize) < self.nodes.len()
                };
                check(ok, "node", i, "child out of range")?;
            }
        }
        Ok(())
    }

    /// Line deltas/lengths/boxes and sectors, seg lengths/angles and
    /// subsector boxes.
    pub fn compute_bounds(&mut self) {
        for sec in self.sectors.iter_mut() {
            sec.line_count = 0;
        }

        for i in 0..self.linedefs.len() {
            let (a, b) = {
                let ld = &self.linedefs[i];
                (self.vertex(ld.v1), self.vertex(ld.v2))
            };
            let front = self.linedefs[i]
                .right_sidedef
                .map_or(0, |s| self.sidedefs[s as usize].sector);
            let back = self.linedefs[i]
                .left_sidedef
                .map(|s| self.sidedefs[s as usize].sector);

            let ld = &mut self.linedefs[i];
            ld.dx = b.x - a.x;
            ld.dy = b.y - a.y;
            ld.length = a.distance(b);
            ld.bbox = Aabb::new(a.min(b), a.max(b));
            ld.front_sector = front;
            ld.back_sector = back;

            self.sectors[front as usize].line_count += 1;
            if let Some(bk) = back.filter(|&bk| bk != front) {
                self.sectors[bk as usize].line_count += 1;
            }
        }

        for i in 0..self.segs.len() {
            let (a, b) = self.seg_points(i as u16);
            let seg = &mut self.segs[i];
            seg.length = a.distance(b);
            seg.angle = Bam::between(a, b);
        }

        for i in 0..self.subsectors.len() {
            let mut bbox = Aabb::EMPTY;
            for s in self.subsectors[i].seg_ids() {
                let (a, b) = self.seg_points(s as u16);
                bbox.add_point(a);
                bbox.add_point(b);
            }
            self.subsectors[i].bbox = bbox;
        }
    }

    /// Resolve the seg ↔ subsector and seg → side/sector back references.
    pub fn link_segs(&mut self) {
        for (i, ss) in self.subsectors.iter().enumerate() {
            for s in ss.seg_ids() {
                self.segs[s].front_sub = i as SubsectorId;
            }
        }

        for i in 0..self.segs.len() {
            let back_sub = self.segs[i]
                .partner
                .map(|p| self.segs[p as usize].front_sub);

            let (sidedef, front, back) = match self.segs[i].linedef {
                Some(l) => {
                    let ld = &self.linedefs[l as usize];
                    let (this, other) = if self.segs[i].dir == 0 {
                        (ld.right_sidedef, ld.left_sidedef)
                    } else {
                        (ld.left_sidedef, ld.right_sidedef)
                    };
                    (
                        this,
                        this.map(|s| self.sidedefs[s as usize].sector),
                        other.map(|s| self.sidedefs[s as usize].sector),
                    )
                }
                None => (None, None, None),
            };

            let seg = &mut self.segs[i];
            seg.back_sub = back_sub;
            seg.sidedef = sidedef;
            seg.front_sector = front;
            seg.back_sector = back;
        }
    }

    /// Give every subsector a sector, steering subsectors touching
    /// self-referencing lines towards the surrounding sector.
    pub fn assign_subsector_sectors(&mut self) {
        let mut resolved: Vec<Option<SectorId>> = vec![None; self.subsectors.len()];

        while self.assign_pass(0, &mut resolved) {}
        while self.assign_pass(1, &mut resolved) {}
        // only needed for badly broken nodes
        self.assign_pass(2, &mut resolved);

        for (ss, sec) in self.subsectors.iter_mut().zip(resolved) {
            ss.sector = sec.unwrap_or(0);
        }
    }

    fn assign_pass(&self, pass: u8, resolved: &mut [Option<SectorId>]) -> bool {
        let mut progress = false;
        for i in 0..self.subsectors.len() {
            if resolved[i].is_some() {
                continue;
            }
            resolved[i] = self.subsector_sector(i, pass, resolved);
            if resolved[i].is_some() {
                progress = true;
                if pass == 2 {
                    warn!("subsector {i}: no sector found, using sector 0");
                }
            }
        }
        progress
    }

    fn subsector_sector(
        &self,
        ss: usize,
        pass: u8,
        resolved: &[Option<SectorId>],
    ) -> Option<SectorId> {
        let segs = &self.segs[self.subsectors[ss].seg_ids()];

        // ignore self-referencing linedefs
        if let Some(seg) = segs
            .iter()
            .find(|s| !s.is_miniseg() && s.front_sector != s.back_sector)
        {
            return seg.front_sector;
        }

        for seg in segs.iter() {
            let Some(partner) = seg.partner else {
                continue;
            };
            if seg.front_sector == seg.back_sector {
                // tagged sectors wait for a later pass
                if let Some(f) = seg.front_sector
                    && self.sectors[f as usize].tag == 0
                {
                    return Some(f);
                }
            } else if let Some(sec) = resolved[self.segs[partner as usize].front_sub as usize] {
                return Some(sec);
            }
        }

        match pass {
            1 => segs.iter().find(|s| !s.is_miniseg()).and_then(|s| s.front_sector),
            2 => Some(0),
            _ => None,
        }
    }

    /// Flag subsectors enclosed only by self-referencing lines and point
    /// them at the sector outside (the "deep water" trick).
    pub fn detect_deep_water(&mut self, max_passes: usize) {
        let mut marks = vec![0u8; self.subsectors.len()];

        for seg in self.segs.iter() {
            let Some(l) = seg.linedef else {
                continue;
            };
            let bit = if self.linedefs[l as usize].is_self_referencing() { 1 } else { 2 };
            marks[seg.front_sub as usize] |= bit;
        }

        for _ in 0..max_passes {
            let mut count = 0;
            for j in 0..self.subsectors.len() {
                if marks[j] != 1 {
                    continue;
                }
                let found = self.segs[self.subsectors[j].seg_ids()]
                    .iter()
                    .filter_map(|s| s.back_sub)
                    .find(|&k| marks[k as usize] & 2 != 0);

                if let Some(k) = found {
                    let other = &self.subsectors[k as usize];
                    let deep = other.deep_ref.unwrap_or(other.sector);
                    self.subsectors[j].deep_ref = Some(deep);
                    marks[j] = 3;
                    count += 1;
                }
            }
            if count == 0 {
                break;
            }
        }
    }

    /// Planes for triangular and quad sectors with per-vertex heights.
    pub fn compute_vertex_slopes(&mut self) {
        let mut lines_of: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); self.sectors.len()];
        for (i, ld) in self.linedefs.iter().enumerate() {
            for sec in [Some(ld.front_sector), ld.back_sector].into_iter().flatten() {
                let list = &mut lines_of[sec as usize];
                if list.len() < 5 && !list.contains(&i) {
                    list.push(i);
                }
            }
        }

        for (s, lines) in lines_of.iter().enumerate() {
            if lines.len() != 3 && lines.len() != 4 {
                continue;
            }
            let (f_h, c_h) = (self.sectors[s].floor_h, self.sectors[s].ceil_h);
            let floor = self.vertex_plane(lines, f_h, |v| v.floor_z);
            let ceil = self.vertex_plane(lines, c_h, |v| v.ceil_z);
            let sec = &mut self.sectors[s];
            sec.floor_vslope = floor;
            sec.ceil_vslope = ceil;
        }
    }

    fn vertex_plane(
        &self,
        lines: &[usize],
        base_h: f32,
        z_of: impl Fn(&Vertex) -> Option<f32>,
    ) -> Option<VertexSlope> {
        let set = |z: Option<f32>| z.filter(|z| VERTEX_Z_RANGE.contains(z));

        let mut corners: SmallVec<[Vec3; 4]> = SmallVec::new();
        let mut any_set = false;
        let mut flat_lines = 0;
        let (mut high, mut low) = (-40000.0f32, 40000.0f32);

        for &l in lines {
            let ld = &self.linedefs[l];
            let (a, b) = (&self.vertices[ld.v1 as usize], &self.vertices[ld.v2 as usize]);
            for v in [a, b] {
                if corners.iter().any(|c| c.truncate().abs_diff_eq(v.pos, 1e-3)) {
                    continue;
                }
                let z = match set(z_of(v)) {
                    Some(z) => {
                        any_set = true;
                        high = high.max(z);
                        low = low.min(z);
                        z
                    }
                    None => base_h,
                };
                corners.push(v.pos.extend(z));
            }
            if let (Some(za), Some(zb)) = (set(z_of(a)), set(z_of(b)))
                && (za - zb).abs() < 1e-3
            {
                flat_lines += 1;
            }
        }

        let sloped = match lines.len() {
            3 => any_set && corners.len() == 3,
            _ => flat_lines == 1 && corners.len() == 4,
        };
        if !sloped {
            return None;
        }

        let mut normal = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
        if normal.z < 0.0 {
            normal = -normal;
        }
        if normal.z.abs() < f32::EPSILON {
            return None;
        }
        Some(VertexSlope {
            corners,
            normal,
            high: high.max(base_h),
            low: low.min(base_h),
        })
    }

    /// Sectors meeting at each vertex with three or more line branches.
    pub fn build_vertex_seclists(&mut self, cap: usize) {
        let mut branches = vec![0usize; self.vertices.len()];
        for ld in self.linedefs.iter() {
            branches[ld.v1 as usize] += 1;
            branches[ld.v2 as usize] += 1;
        }

        let mut index: Vec<Option<u16>> = vec![None; self.vertices.len()];
        self.seclists.clear();
        for (v, &n) in branches.iter().enumerate() {
            if n >= 3 {
                index[v] = Some(self.seclists.len() as u16);
                self.seclists.push(Seclist::new());
            }
        }
        if self.seclists.is_empty() {
            return;
        }

        let add = |lists: &mut Vec<Seclist>, v1: u16, v2: u16, sec: SectorId| {
            for v in [v1, v2] {
                if let Some(li) = index[v as usize] {
                    let list = &mut lists[li as usize];
                    if list.len() < cap && !list.contains(&sec) {
                        list.push(sec);
                    }
                }
            }
        };

        // plain sectors get the limited slots first
        for ld in self.linedefs.iter() {
            for sec in [Some(ld.front_sector), ld.back_sector].into_iter().flatten() {
                add(&mut self.seclists, ld.v1, ld.v2, sec);
            }
        }
        for ld in self.linedefs.iter() {
            for sec in [Some(ld.front_sector), ld.back_sector].into_iter().flatten() {
                let efs: SmallVec<[u16; 4]> = self.extrafloors_upward(sec).collect();
                for ef in efs {
                    let control = self.extrafloors[ef as usize].control;
                    add(&mut self.seclists, ld.v1, ld.v2, control);
                }
            }
        }

        for seg in self.segs.iter_mut() {
            seg.nb_sec = [
                index.get(seg.v1 as usize).copied().flatten(),
                index.get(seg.v2 as usize).copied().flatten(),
            ];
        }
    }

    /// Put fog-wall images on untextured middles between sectors of
    /// different fog.
    pub fn synthesize_fog_walls(&mut self, bank: &mut ImageBank) {
        for i in 0..self.linedefs.len() {
            let ld = &self.linedefs[i];
            let Some(back) = ld.back_sector else {
                continue;
            };
            let front = ld.front_sector;
            let sides = [(ld.right_sidedef, front, back), (ld.left_sidedef, back, front)];

            for (sd, this, other) in sides {
                let Some(sd) = sd else {
                    continue;
                };
                if self.sidedefs[sd as usize].middle.image.is_some() {
                    continue;
                }
                let this_fog = self.sectors[this as usize].props.fog;
                let other_fog = self.sectors[other as usize].props.fog;
                let fog = match (this_fog, other_fog) {
                    (None, Some(o)) => o,
                    (Some(t), o) if o.map(|o| o.color) != Some(t.color) => t,
                    _ => continue,
                };
                let image = bank.fog_wall(fog.color);
                let mid = &mut self.sidedefs[sd as usize].middle;
                mid.image = Some(image);
                mid.translucency = fog.density * 100.0;
                mid.fog_wall = true;
            }
        }
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sample;

    #[test]
    fn empty_level_is_rejected() {
        let lvl = Level::default();
        assert_eq!(lvl.validate(), Err(MapError::Empty("segs")));
    }

    #[test]
    fn out_of_range_seg_linedef_is_malformed() {
        let mut lvl = sample::corridor_raw(2);
        lvl.segs[0].linedef = Some(9999);
        let err = lvl
            .finalise(&RenderConfig::default(), &mut ImageBank::default())
            .unwrap_err();
        assert!(matches!(
            err,
            MapError::MalformedGeometry { what: "seg", index: 0, .. }
        ));
    }

    #[test]
    fn subsector_without_segs_is_malformed() {
        let mut lvl = sample::corridor_raw(2);
        lvl.subsectors[1].seg_count = 0;
        assert!(matches!(
            lvl.validate(),
            Err(MapError::MalformedGeometry { what: "subsector", index: 1, .. })
        ));
    }

    #[test]
    fn every_subsector_gets_its_room_sector() {
        let lvl = sample::corridor(3).unwrap();
        for (i, ss) in lvl.subsectors.iter().enumerate() {
            assert_eq!(ss.sector, i as SectorId);
            assert!(ss.deep_ref.is_none());
        }
    }

    #[test]
    fn seg_back_references_are_linked() {
        let lvl = sample::corridor(2).unwrap();
        for (i, seg) in lvl.segs.iter().enumerate() {
            assert!(lvl.subsectors[seg.front_sub as usize].seg_ids().contains(&i));
            if let Some(p) = seg.partner {
                assert_eq!(seg.back_sub, Some(lvl.segs[p as usize].front_sub));
                assert_eq!(seg.back_sector, lvl.segs[p as usize].front_sector);
            }
        }
    }

    #[test]
    fn self_referencing_pool_points_at_outer_sector() {
        let lvl = sample::deep_water_pool().unwrap();
        let pool = &lvl.subsectors[sample::POOL_SUBSECTOR as usize];
        assert_eq!(pool.deep_ref, Some(0));
    }

    #[test]
    fn triangle_with_one_raised_corner_is_sloped() {
        let lvl = sample::sloped_triangle(32.0).unwrap();
        let vs = lvl.sectors[0].floor_vslope.as_ref().unwrap();
        assert_eq!(vs.corners.len(), 3);
        assert_eq!((vs.low, vs.high), (0.0, 32.0));
        assert!(vs.normal.z > 0.0);
        assert!(lvl.sectors[0].ceil_vslope.is_none());
    }

    #[test]
    fn seclists_only_on_junction_vertices() {
        let lvl = sample::corridor(3).unwrap();
        // interior portal lines meet two outer walls at each end
        assert!(!lvl.seclists.is_empty());
        for list in &lvl.seclists {
            assert!(list.len() >= 2 && list.len() <= 11);
        }
        let with_lists = lvl.segs.iter().filter(|s| s.nb_sec[0].is_some()).count();
        assert!(with_lists > 0);
    }

    #[test]
    fn fog_boundary_gets_a_fog_wall() {
        let lvl = sample::fog_boundary().unwrap();
        let ld = &lvl.linedefs[sample::FOG_LINE as usize];
        let right = &lvl.sidedefs[ld.right_sidedef.unwrap() as usize];
        assert!(right.middle.fog_wall);
        assert!(right.middle.image.is_some());
    }

    #[test]
    fn automap_marks_start_clear() {
        let lvl = sample::corridor(2).unwrap();
        assert!(!lvl.is_mapped(0));
        lvl.mark_mapped(0);
        assert!(lvl.is_mapped(0));
    }
}
