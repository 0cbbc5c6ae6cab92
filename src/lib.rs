//! BSP traversal and draw-list construction for a Doom-style 3D renderer.
//!
//! * [`world`]    – immutable map graph, load-time finalisation, map objects.
//! * [`engine`]   – per-frame walk (occlusion, mirrors, draw floors) and the
//!   two-pass emission of drawable units.
//! * [`renderer`] – the unit submission API a rasterising back-end implements.

pub mod config;
pub mod engine;
pub mod renderer;
pub mod world;
