//! File and image loading.

use std::path::Path;

use image::ImageReader;
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

/// Decoded image with tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Expected byte length of `pixels`.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Reads a whole file into memory.
pub fn read_file(path: impl AsRef<Path>) -> ResourceResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ResourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Loads an image file and converts it to RGBA8.
pub fn load_image(path: impl AsRef<Path>) -> ResourceResult<ImageData> {
    let path = path.as_ref();
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let rgba = decoded.into_rgba8();

    let (width, height) = rgba.dimensions();
    info!("Loaded image {} ({}x{})", path.display(), width, height);

    Ok(ImageData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_reports_path() {
        let err = read_file("does/not/exist.spv").unwrap_err();
        match err {
            ResourceError::Read { path, .. } => {
                assert_eq!(path, Path::new("does/not/exist.spv"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_png_as_rgba8() {
        let path = std::env::temp_dir().join(format!("tessera_loader_{}.png", std::process::id()));
        let source = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        source.save(&path).unwrap();

        let data = load_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixels.len(), data.byte_len());
        assert_eq!(&data.pixels[..4], &[10, 20, 30, 255]);
    }
}
