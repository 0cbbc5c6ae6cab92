// Format-agnostic repository of image metadata supplied by the asset loader.
// The walk only needs sizes, offsets and opacity; pixels stay with the
// rasterizer.  Everything else refers to images through `ImageId`.

use std::collections::HashMap;

use glam::Vec2;

use crate::world::geometry::Rgb;

/// Runtime handle for an image in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type ImageId = u16;

/// `ImageId` of the fallback image.
/// Always = 0 because `ImageBank::new()` inserts it first.
pub const MISSING_IMAGE: ImageId = 0;

/// How an image blends over what is behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Opacity {
    #[default]
    Solid,
    /// Fully transparent texels only (alpha-tested).
    Masked,
    /// Partial alpha.
    Complex,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub name: String,
    /// Actual size.
    pub w: u32,
    pub h: u32,
    /// Size rounded up to powers of two (texture-space extent).
    pub total_w: u32,
    pub total_h: u32,
    /// Sprite hot-spot, Doom patch style: distance of the origin from the
    /// image's left edge and from its top edge.
    pub offset: Vec2,
    pub opacity: Opacity,
    pub is_sky: bool,
}

impl Image {
    pub fn new(name: impl Into<String>, w: u32, h: u32) -> Self {
        Self {
            name: name.into(),
            w,
            h,
            total_w: w.max(1).next_power_of_two(),
            total_h: h.max(1).next_power_of_two(),
            offset: Vec2::ZERO,
            opacity: Opacity::Solid,
            is_sky: false,
        }
    }

    pub fn with_opacity(mut self, opacity: Opacity) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn sky(mut self) -> Self {
        self.is_sky = true;
        self
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w as f32
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h as f32
    }

    /// Fraction of texture space covered vertically.
    #[inline]
    pub fn top(&self) -> f32 {
        self.h as f32 / self.total_h as f32
    }

    /// Fraction of texture space covered horizontally.
    #[inline]
    pub fn right(&self) -> f32 {
        self.w as f32 / self.total_w as f32
    }
}

/// Convenience 8×8 fallback.
impl Default for Image {
    fn default() -> Self {
        Image::new("MISSING", 8, 8)
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    /// Attempted to insert a second image with an existing name.
    #[error("image name `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("image id {0} out of range")]
    BadId(ImageId),
}

/// A format-agnostic cache of image descriptions.
///
/// * Does **not** know about WADs, PNG, OpenGL; that is the loader’s job.
/// * Stores exactly one copy of every name.
/// * ID **0** is always the “missing” image.
pub struct ImageBank {
    by_name: HashMap<String, ImageId>,
    data: Vec<Image>,
    fog_walls: HashMap<Rgb, ImageId>,
}

impl Default for ImageBank {
    fn default() -> Self {
        Self::new(Image::default())
    }
}

impl ImageBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    /// Create an empty bank with a mandatory *missing* image used as
    /// fallback.  It is inserted under the fixed name `"MISSING"` and
    /// obtains the handle **0**.
    pub fn new(missing: Image) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), MISSING_IMAGE);
        Self {
            by_name,
            data: vec![missing],
            fog_walls: HashMap::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    /// Number of images stored (including the “missing” one).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    } // only the fallback

    pub fn id(&self, name: &str) -> Option<ImageId> {
        self.by_name.get(name).copied()
    }

    /// Borrow an image by id, with bounds-checking.
    pub fn image(&self, id: ImageId) -> Result<&Image, TextureError> {
        self.data.get(id as usize).ok_or(TextureError::BadId(id))
    }

    /// Infallible lookup: bad ids resolve to the fallback image.
    #[inline]
    pub fn get(&self, id: ImageId) -> &Image {
        self.data.get(id as usize).unwrap_or(&self.data[0])
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Insert an image under its name.
    ///
    /// * Returns the newly assigned `ImageId`.
    /// * Fails if the name already exists (`Duplicate`).
    pub fn insert(&mut self, img: Image) -> Result<ImageId, TextureError> {
        if self.by_name.contains_key(&img.name) {
            return Err(TextureError::Duplicate(img.name));
        }
        let id = self.data.len() as ImageId;
        self.by_name.insert(img.name.clone(), id);
        self.data.push(img);
        Ok(id)
    }

    /// Image shown on a boundary between differently fogged regions.
    ///
    /// Created on first request and cached per colour.
    pub fn fog_wall(&mut self, color: Rgb) -> ImageId {
        if let Some(&id) = self.fog_walls.get(&color) {
            return id;
        }
        let id = self.data.len() as ImageId;
        let name = format!("FOGWALL_{:02X}{:02X}{:02X}", color.0, color.1, color.2);
        self.by_name.insert(name.clone(), id);
        self.data
            .push(Image::new(name, 4, 4).with_opacity(Opacity::Complex));
        self.fog_walls.insert(color, id);
        id
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut bank = ImageBank::default();
        let red = bank.insert(Image::new("RED", 64, 128)).unwrap();
        let blue = bank.insert(Image::new("BLUE", 48, 72)).unwrap();

        assert_ne!(red, MISSING_IMAGE);
        assert_ne!(blue, red);
        assert_eq!(bank.id("RED"), Some(red));
        assert_eq!(bank.id("NOPE"), None);

        let b = bank.image(blue).unwrap();
        assert_eq!((b.total_w, b.total_h), (64, 128));
        assert!((b.top() - 72.0 / 128.0).abs() < 1e-6);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut bank = ImageBank::default();
        bank.insert(Image::new("WOOD", 64, 64)).unwrap();
        let err = bank.insert(Image::new("WOOD", 32, 32)).unwrap_err();
        assert_eq!(err, TextureError::Duplicate("WOOD".into()));
        // image count still 2 (fallback + first WOOD)
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn bad_id_guard() {
        let bank = ImageBank::default();
        let bad = ImageId::MAX;
        assert_eq!(bank.image(bad).unwrap_err(), TextureError::BadId(bad));
        assert_eq!(bank.get(bad).name, "MISSING");
    }

    #[test]
    fn fog_walls_are_cached_per_colour() {
        let mut bank = ImageBank::default();
        let a = bank.fog_wall(Rgb(10, 20, 30));
        let b = bank.fog_wall(Rgb(10, 20, 30));
        let c = bank.fog_wall(Rgb(0, 0, 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(bank.get(a).opacity, Opacity::Complex);
    }
}
