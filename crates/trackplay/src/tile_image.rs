use bytes::Bytes;
use image::ImageFormat;

use crate::tile_source::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    /// File extensions probed in the cache, in lookup order.
    pub const CACHE_EXTENSIONS: [&'static str; 3] = ["jpg", "jpeg", "png"];

    /// Extension used when writing a tile of this format.
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(TileFormat::Jpeg),
            ImageFormat::Png => Some(TileFormat::Png),
            other => {
                tracing::warn!("Unsupported tile image format: {other:?}");
                None
            }
        }
    }
}

impl From<TileFormat> for ImageFormat {
    fn from(format: TileFormat) -> Self {
        match format {
            TileFormat::Jpeg => ImageFormat::Jpeg,
            TileFormat::Png => ImageFormat::Png,
        }
    }
}

/// Encoded tile bytes that are known to decode, with their pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    bytes: Bytes,
    format: TileFormat,
    width: u32,
    height: u32,
}

impl TileImage {
    /// Sniffs the format and decodes the image once to make sure it is
    /// usable. The input bytes are kept untouched.
    pub fn decode(bytes: Bytes) -> Result<Self, FetchError> {
        let format = image::guess_format(&bytes)?;
        let format = TileFormat::from_image_format(format).ok_or(FetchError::UnsupportedFormat)?;
        let decoded = image::load_from_memory_with_format(&bytes, format.into())?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            format,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
