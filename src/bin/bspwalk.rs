//! bspwalk.rs - walk a synthetic level and report what a frame would draw.
//!
//! USAGE:
//! ```bash
//! cargo run --bin bspwalk -- --scene mirrors --yaw 10 --frames 3
//! ```

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use glam::{Vec2, Vec3};
use hecs::World;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use bspwalk_rs::{
    config::RenderConfig,
    engine::{Engine, FrameStats, Scene},
    renderer::{BlendClass, LitShader, PointLight, RecordingSink},
    world::{
        Bam, Camera, Level, sample,
        things::{Appearance, Body, SpriteFrame, spawn_thing},
    },
};

const EYE_HEIGHT: f32 = 41.0;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SceneKind {
    /// Open rooms in a row
    Corridor,
    /// Room with a bridge and a liquid layer
    Extrafloors,
    /// Rooms ending in a mirror
    Mirrors,
    /// Room with mirrors on opposite walls
    Hall,
    /// Two rooms joined by a portal
    Portal,
    /// Outdoor area under a sky ceiling
    Courtyard,
    /// Two rooms with a masked grate between them
    Grate,
}

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    #[arg(long, value_enum, default_value = "corridor")]
    scene: SceneKind,

    /// Rooms in the corridor / mirror scenes
    #[arg(long, default_value_t = 3)]
    rooms: usize,

    /// Eye position on the map
    #[arg(long, default_value_t = 40.0)]
    x: f32,
    #[arg(long, default_value_t = 128.0)]
    y: f32,

    /// Eye height above the floor under it
    #[arg(long, default_value_t = EYE_HEIGHT)]
    height: f32,

    /// View direction in degrees, 0 = east
    #[arg(long, default_value_t = 0.0)]
    yaw: f32,

    /// Look up/down in degrees
    #[arg(long, default_value_t = 0.0)]
    pitch: f32,

    /// Horizontal field of view in degrees
    #[arg(long, default_value_t = 90.0)]
    fov: f32,

    /// Frames to render; every frame must match the first
    #[arg(long, default_value_t = 2)]
    frames: usize,

    /// Monsters placed down the middle of the level
    #[arg(long, default_value_t = 0)]
    things: usize,

    #[arg(long, default_value_t = RenderConfig::default().max_mirrors)]
    max_mirrors: usize,

    /// Reject geometry beyond the far clip distance
    #[arg(long)]
    culling: bool,

    #[arg(long, default_value_t = RenderConfig::default().farclip)]
    farclip: f32,

    #[arg(long)]
    no_flood: bool,

    #[arg(long)]
    no_fog_walls: bool,

    #[arg(long)]
    lower_fallback: bool,

    /// Radius of a white dynamic light hung just above the eye
    #[arg(long)]
    lamp: Option<f32>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Opts {
    fn config(&self) -> RenderConfig {
        RenderConfig {
            max_mirrors: self.max_mirrors,
            culling: self.culling,
            farclip: self.farclip,
            flood_emulation: !self.no_flood,
            fog_walls: !self.no_fog_walls,
            lower_fallback: self.lower_fallback,
            ..RenderConfig::default()
        }
    }

    fn shader(&self, eye: Vec3) -> LitShader {
        let mut shader = LitShader::default();
        if let Some(radius) = self.lamp {
            shader.lights.push(PointLight {
                pos: eye + Vec3::Z * 16.0,
                radius,
                rgb: Vec3::ONE,
            });
        }
        shader
    }

    fn level(&self) -> anyhow::Result<Level> {
        let lvl = match self.scene {
            SceneKind::Corridor => sample::corridor(self.rooms),
            SceneKind::Extrafloors => sample::layered_room(),
            SceneKind::Mirrors => sample::mirror_room(self.rooms),
            SceneKind::Hall => sample::mirror_hall(),
            SceneKind::Portal => sample::portal_rooms(),
            SceneKind::Courtyard => sample::courtyard(),
            SceneKind::Grate => sample::grate(),
        };
        lvl.with_context(|| format!("building the {:?} scene", self.scene))
    }
}

/// Spread `n` troopers along the level's horizontal centre line.
fn populate(world: &mut World, level: &Level, n: usize) {
    if n == 0 {
        return;
    }
    let (lo, hi) = level
        .vertices
        .iter()
        .fold((Vec2::MAX, Vec2::MIN), |(lo, hi), v| (lo.min(v.pos), hi.max(v.pos)));
    let mid_y = (lo.y + hi.y) * 0.5;

    for i in 0..n {
        let x = lo.x + (hi.x - lo.x) * (i as f32 + 1.0) / (n as f32 + 1.0);
        let pos = Vec2::new(x, mid_y);
        let floor_z = level.floor_height_at(pos);
        let body = Body {
            radius: 20.0,
            height: 56.0,
            floor_z,
            ceiling_z: floor_z + 56.0,
        };
        let look = Appearance::new(SpriteFrame::single(sample::TROOPER));
        spawn_thing(world, pos, floor_z, Bam::ANG180, body, look);
    }
}

fn summary(frame: usize, stats: &FrameStats, sink: &RecordingSink) {
    log::info!(
        "frame {frame}: {} subsectors ({} visible), {} segs, mirror depth {}",
        stats.subsectors_visited,
        stats.subsectors_visible,
        stats.segs_queued,
        stats.max_mirror_depth,
    );
    log::info!(
        "  units: {} opaque, {} masked, {} alpha, {} additive, {} sky",
        sink.count_class(BlendClass::Opaque),
        sink.count_class(BlendClass::Masked),
        sink.count_class(BlendClass::Alpha),
        sink.count_class(BlendClass::Additive),
        sink.sky.len(),
    );
    log::info!(
        "  {} things ({} models), {} batches, {} clip plane changes, {} anomalies",
        stats.things,
        stats.models,
        sink.batches,
        sink.clip_changes,
        stats.anomalies,
    );
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    TermLogger::init(
        opts.log_level,
        ConfigBuilder::default()
            .set_time_level(LevelFilter::Off)
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    // ─────────── level & objects ───────────
    let level = opts.level()?;
    let bank = sample::bank().context("building the sample images")?;
    let mut world = World::new();
    populate(&mut world, &level, opts.things);

    let eye_xy = Vec2::new(opts.x, opts.y);
    let eye = eye_xy.extend(level.floor_height_at(eye_xy) + opts.height);
    let camera = Camera::new(eye, Bam::from_degrees(opts.yaw), opts.fov.to_radians())
        .with_pitch(opts.pitch.to_radians());
    log::debug!("{:?} scene, eye at {eye}", opts.scene);

    // ─────────── frames ───────────
    let mut engine = Engine::new(opts.config());
    let scene = Scene::new(&level, &bank, &world);
    let shader = opts.shader(eye);

    let mut first: Option<(FrameStats, RecordingSink)> = None;
    for frame in 0..opts.frames.max(1) {
        let mut sink = RecordingSink::new();
        let stats = engine.render_frame(&scene, &camera, &shader, &mut sink);
        summary(frame, &stats, &sink);

        match &first {
            None => first = Some((stats, sink)),
            Some((s0, k0)) => {
                if *s0 != stats || *k0 != sink {
                    bail!("frame {frame} differs from frame 0");
                }
            }
        }
    }

    if let Some((stats, _)) = first {
        println!(
            "{} solid + {} translucent units, {} sky pieces",
            stats.solid_units, stats.translucent_units, stats.sky_units
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_land_in_the_config() {
        let opts = Opts::parse_from(["bspwalk", "--culling", "--no-flood", "--max-mirrors", "1"]);
        let cfg = opts.config();
        assert!(cfg.culling);
        assert!(!cfg.flood_emulation);
        assert_eq!(cfg.max_mirrors, 1);
        assert!(cfg.fog_walls);
    }

    #[test]
    fn lamp_hangs_above_the_eye() {
        let eye = Vec3::new(40.0, 128.0, 41.0);
        let none = Opts::parse_from(["bspwalk"]).shader(eye);
        assert!(none.lights.is_empty());

        let lit = Opts::parse_from(["bspwalk", "--lamp", "128"]).shader(eye);
        assert_eq!(lit.lights[0].radius, 128.0);
        assert_eq!(lit.lights[0].pos, Vec3::new(40.0, 128.0, 57.0));
    }

    #[test]
    fn troopers_are_spread_along_the_level() {
        let level = sample::corridor(2).unwrap();
        let mut world = World::new();
        populate(&mut world, &level, 3);
        assert_eq!(world.len(), 3);
    }
}
