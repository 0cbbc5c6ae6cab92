//! Per-frame walk and draw.
//!
//! A frame runs in two phases over borrowed, read-only map data:
//!
//! * **walk** ([`bsp`]) – front-to-back BSP traversal with bounding-box and
//!   angular occlusion culling; mirrors and portals re-enter the tree under
//!   a transform.  Produces [`FramePool`] records and the sky pieces.
//! * **draw** ([`pipeline`]) – replays the records as walls, planes, flood
//!   fills, sprites and mirror overlays, opaque first, then translucent.

mod bsp;
mod engine;
pub mod frame;
mod flood;
pub mod mirror;
pub mod occlusion;
mod pipeline;
mod planes;
mod sky;
mod subsector;
mod things;
pub mod view;
mod walls;

pub use engine::{Engine, FrameStats, Scene};

pub use frame::{DrawFloor, DrawMirror, DrawSub, DrawThing, FramePool};

pub use mirror::{MirrorDef, MirrorStack, MirrorTransform};

pub use occlusion::OcclusionBuffer;

pub use view::{ClipWindow, Viewer};
