mod angle;
pub mod bsp;
mod camera;
pub mod geometry;
pub mod helpers;
pub mod sample;
mod setup;
pub mod texture;
pub mod things;

pub use angle::Bam;

pub use geometry::{
    Aabb, Extrafloor, ExtrafloorFlags, ExtrafloorId, Fog, LineSpecial, Level, Linedef,
    LinedefFlags, LinedefId, Node, PropsRef, RegionProps, Rgb, Seclist, Sector, SectorId, Seg,
    SegmentId, Sidedef, SidedefId, SlideKind, SlidingDoor, SlopePlane, Subsector, SubsectorId,
    Surface, SurfaceRef, Vertex, VertexId, VertexSlope,
};

pub use camera::Camera;

pub use setup::MapError;

pub use texture::{Image, ImageBank, ImageId, MISSING_IMAGE, Opacity, TextureError};
