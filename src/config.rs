//! Renderer tuning values.
//!
//! Every heuristic constant used by the walk and the wall/sprite builders
//! lives here so front-ends can override it.  The defaults reproduce the
//! classic behaviour.

/// Tuning knobs consumed by [`crate::engine::Engine`] and the load-time
/// finalisation passes.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Maximum number of nested mirrors/portals walked at once.
    pub max_mirrors: usize,
    /// Vertical slack (map units) when sprites poke into floors/ceilings.
    pub sy_fudge: f32,
    /// Heights closer than this are merged when stitching wall edges.
    pub stitch_tolerance: f32,
    /// Upper bound of vertices along one wall edge after stitching.
    pub max_edge_vert: usize,
    /// Upper bound of vertices in one floor/ceiling polygon.
    pub max_plane_vert: usize,
    /// Capacity of a per-vertex neighbour-sector list.
    pub seclist_max: usize,

    /// Distance culling of subtrees, subsectors and fog walls.
    pub culling: bool,
    pub farclip: f32,
    /// Added to `farclip` before rejecting a box.
    pub farclip_margin: f32,

    /// Sprites nearer than this skip the side test.
    pub sprite_min_z: f32,
    /// `|tx| / ratio > tz` rejects a sprite as too far off the side.
    pub sprite_side_ratio: f32,

    /// Draw the neighbour floor/ceiling surface on untextured lower/upper
    /// walls instead of treating them as invisible.
    pub lower_fallback: bool,
    /// Synthesize fog-wall images between sectors of different fog.
    pub fog_walls: bool,
    /// Fill untextured steps with the neighbour plane (flat flooding).
    pub flood_emulation: bool,
    /// Iteration cap of the deep-water detection pass.
    pub deep_water_passes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_mirrors: 3,
            sy_fudge: 2.0,
            stitch_tolerance: 0.1,
            max_edge_vert: 20,
            max_plane_vert: 64,
            seclist_max: 11,
            culling: false,
            farclip: 64000.0,
            farclip_margin: 500.0,
            sprite_min_z: 4.0,
            sprite_side_ratio: 32.0,
            lower_fallback: false,
            fog_walls: true,
            flood_emulation: true,
            deep_water_passes: 100,
        }
    }
}

impl RenderConfig {
    /// Distance beyond which boxes and subsectors are culled.
    #[inline]
    pub fn cull_distance(&self) -> f32 {
        self.farclip + self.farclip_margin
    }
}
