mod bitmap;
mod names;
mod palette;
mod resource;
mod sprites;

pub use bitmap::{Bitmap, BitmapError, Rgba, TRANSPARENT};
pub use names::ResourceNameError;
pub(crate) use names::validate_resource_name;
pub use palette::{Palette, PaletteError};
pub use resource::{load_resource, LoadOptions, ResourceCache, ResourceLoadError, SearchPath};
pub use sprites::{slice_sheet, FacingImages, SpriteSheetSpec};
