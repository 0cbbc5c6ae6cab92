use crate::world::geometry::{Level, Node, SubsectorId};
use glam::Vec2;

pub const CHILD_MASK: u16 = 0x7FFF;

pub const SUBSECTOR_BIT: u16 = 0x8000;

// ──────────────────────────────────────────────────────────────────────────
//                       Level – public helpers
// ──────────────────────────────────────────────────────────────────────────
impl Level {
    /// Child handle of the BSP root (`nodes.len()-1` in Doom).
    ///
    /// A level without nodes is a single implicit subsector: the root is then
    /// the tagged handle of subsector 0.
    #[inline(always)]
    pub fn bsp_root(&self) -> u16 {
        match self.nodes.len() {
            0 => SUBSECTOR_BIT,
            n => (n - 1) as u16,
        }
    }

    /// Walk the BSP and return the subsector id containing `p`.
    pub fn locate_subsector(&self, p: Vec2) -> SubsectorId {
        let mut idx = self.bsp_root();
        loop {
            if idx & SUBSECTOR_BIT != 0 {
                return idx & CHILD_MASK;
            }
            let node = &self.nodes[idx as usize];
            idx = node.child[node.point_side(p) as usize];
        }
    }

    /// Floor height (Z) of the sector under `p`.
    pub fn floor_height_at(&self, p: Vec2) -> f32 {
        let ss = self.locate_subsector(p);
        let sector = self.subsectors[ss as usize].sector;
        self.sectors[sector as usize].floor_h
    }
}

// ──────────────────────────────────────────────────────────────────────────
//                       Node geometry helpers
// ──────────────────────────────────────────────────────────────────────────
impl Node {
    /// 0 = *front* of splitter, 1 = *back*.
    #[inline(always)]
    pub fn point_side(&self, p: Vec2) -> i32 {
        point_side(Vec2::new(self.x, self.y), Vec2::new(self.dx, self.dy), p)
    }

    /// The partition line's two defining points.
    #[inline]
    pub fn endpoints(&self) -> (Vec2, Vec2) {
        let a = Vec2::new(self.x, self.y);
        (a, a + Vec2::new(self.dx, self.dy))
    }
}

/// Side of the directed line `origin + t·dir` that `p` lies on.
#[inline(always)]
pub fn point_side(origin: Vec2, dir: Vec2, p: Vec2) -> i32 {
    let d = (p.x - origin.x) * dir.y - (p.y - origin.y) * dir.x;
    if d >= 0.0 { 0 } else { 1 }
}

// ──────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sample;

    #[test]
    fn point_side_matches_bbox() {
        let lvl = sample::corridor(4).unwrap();
        let root = &lvl.nodes[lvl.bsp_root() as usize];

        for side in 0..=1 {
            let bb = &root.bbox[side];
            let mid = (bb.min + bb.max) * 0.5;
            assert_eq!(root.point_side(mid), side as i32);
        }
    }

    #[test]
    fn locate_finds_each_room() {
        let lvl = sample::corridor(4).unwrap();
        for (i, ss) in lvl.subsectors.iter().enumerate() {
            let mid = (ss.bbox.min + ss.bbox.max) * 0.5;
            assert_eq!(lvl.locate_subsector(mid), i as SubsectorId);
        }
    }

    #[test]
    fn nodeless_level_is_one_subsector() {
        let lvl = sample::single_room().unwrap();
        assert_eq!(lvl.bsp_root(), SUBSECTOR_BIT);
        assert_eq!(lvl.locate_subsector(Vec2::new(10.0, 10.0)), 0);
    }

    #[test]
    fn floor_height_follows_the_step() {
        let lvl = sample::step((0.0, 200.0), (24.0, 200.0)).unwrap();
        assert_eq!(lvl.floor_height_at(Vec2::new(40.0, 128.0)), 0.0);
        assert_eq!(lvl.floor_height_at(Vec2::new(300.0, 128.0)), 24.0);
    }
}
