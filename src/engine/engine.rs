use hecs::{Entity, World};

use crate::{
    config::RenderConfig,
    engine::{
        bsp::Walker,
        frame::FramePool,
        mirror::MirrorStack,
        occlusion::OcclusionBuffer,
        pipeline::Drawer,
        view::Viewer,
    },
    renderer::{Shader, UnitSink},
    world::{Camera, ImageBank, Level, things::ThingLinks},
};

/// What one frame looks at.  Borrowed for the duration of `render_frame`
/// only; the engine keeps nothing that points into it.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub level: &'a Level,
    pub bank: &'a ImageBank,
    pub world: &'a World,
    /// Entity the camera is attached to; hidden unless seen in a mirror.
    pub viewer_entity: Option<Entity>,
    /// Fraction of the way from the previous tic to the current one.
    pub lerp: f32,
}

impl<'a> Scene<'a> {
    pub fn new(level: &'a Level, bank: &'a ImageBank, world: &'a World) -> Self {
        Self {
            level,
            bank,
            world,
            viewer_entity: None,
            lerp: 1.0,
        }
    }

    pub fn with_viewer(mut self, ent: Entity) -> Self {
        self.viewer_entity = Some(ent);
        self
    }

    pub fn with_lerp(mut self, lerp: f32) -> Self {
        self.lerp = lerp.clamp(0.0, 1.0);
        self
    }
}

/// Counters for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub nodes_visited: usize,
    /// Subtrees rejected by their bounding box.
    pub boxes_culled: usize,
    pub subsectors_visited: usize,
    pub subsectors_visible: usize,
    pub segs_queued: usize,
    pub mirrors_entered: usize,
    pub max_mirror_depth: usize,
    pub sky_units: usize,
    /// Sprites and models collected (inside mirrors too).
    pub things: usize,
    /// Model requests handed to the sink.
    pub models: usize,
    pub solid_units: usize,
    pub translucent_units: usize,
    /// Units skipped because the geometry under them was degenerate.
    pub anomalies: usize,
}

/// Per-frame state that outlives a frame only for its allocations.
pub struct Engine {
    cfg: RenderConfig,
    occlusion: OcclusionBuffer,
    mirrors: MirrorStack,
    frame: FramePool,
    stats: FrameStats,
    expand_w: f32,
}

impl Engine {
    pub fn new(cfg: RenderConfig) -> Self {
        let mirrors = MirrorStack::new(cfg.max_mirrors);
        Self {
            cfg,
            occlusion: OcclusionBuffer::new(),
            mirrors,
            frame: FramePool::new(),
            stats: FrameStats::default(),
            expand_w: 1.0,
        }
    }

    /// Widen the horizontal view for screens wider than 4:3.
    pub fn with_expand_w(mut self, expand_w: f32) -> Self {
        self.expand_w = expand_w.max(0.1);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    /// Records of the last frame.
    pub fn frame(&self) -> &FramePool {
        &self.frame
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Walk the tree from `camera` and hand every drawable unit to `sink`.
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        shader: &dyn Shader,
        sink: &mut dyn UnitSink,
    ) -> FrameStats {
        sink.begin_frame();

        // start of frame: nothing covered, nothing collected
        self.frame.reset();
        self.stats = FrameStats::default();
        self.occlusion.clear();
        self.mirrors.clear();

        let level = scene.level;
        let view = Viewer::new(camera, self.expand_w);
        let links = ThingLinks::build(scene.world, level);

        // 1 ─ walk: collect draw records, sky goes out immediately
        let mut walker = Walker {
            level,
            bank: scene.bank,
            world: scene.world,
            links: &links,
            cfg: &self.cfg,
            view,
            viewer_entity: scene.viewer_entity,
            lerp: scene.lerp,
            occlusion: &mut self.occlusion,
            mirrors: &mut self.mirrors,
            frame: &mut self.frame,
            sink: &mut *sink,
            stats: &mut self.stats,
        };
        walker.walk_node(level.bsp_root());

        log::trace!(
            "walk: {} subsectors, {} mirrors, {} things",
            self.frame.sub_count(),
            self.frame.mirror_count(),
            self.frame.thing_count()
        );

        // 2 ─ draw: solid pass then translucent pass
        let mut drawer = Drawer {
            level,
            bank: scene.bank,
            cfg: &self.cfg,
            view,
            shader,
            frame: &self.frame,
            mirrors: &mut self.mirrors,
            sink: &mut *sink,
            stats: &mut self.stats,
            solid: true,
        };
        drawer.draw_sub_list(self.frame.top(), false);

        sink.end_frame();

        if self.stats.anomalies > 0 {
            log::debug!("frame finished with {} anomalies", self.stats.anomalies);
        }
        self.stats.clone()
    }
}
