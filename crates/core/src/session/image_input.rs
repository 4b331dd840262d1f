use std::ffi::c_int;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use serde::{Deserialize, Serialize};

use crate::shared::error::{PrivIdError, Result};

/// Channel order of the pixel bytes handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Rgb,
    Bgr,
    Rgba,
}

impl ImageFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Bgr => "bgr",
            Self::Rgba => "rgba",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = PrivIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "bgr" => Ok(Self::Bgr),
            "rgba" => Ok(Self::Rgba),
            other => Err(PrivIdError::InvalidImage(format!(
                "unsupported image format `{other}`, expected rgb, bgr or rgba"
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-major pixels in a declared channel order, ready for one engine call.
#[derive(Clone, Debug)]
pub struct ImageInputArg {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: ImageFormat,
    orientation: u8,
}

impl ImageInputArg {
    /// Wrap caller-provided pixels after checking them against the shape.
    pub fn from_pixels(data: Vec<u8>, width: u32, height: u32, format: ImageFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PrivIdError::InvalidImage(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or_else(|| PrivIdError::InvalidImage("image dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(PrivIdError::InvalidImage(format!(
                "{width}x{height} {format} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            orientation: 1,
        })
    }

    /// Decode a file and convert it to `format`.
    ///
    /// With `apply_rotation` the EXIF orientation is applied to the pixels
    /// and the stored tag becomes 1; otherwise the raw tag is kept.
    pub fn from_path(path: impl AsRef<Path>, format: ImageFormat, apply_rotation: bool) -> Result<Self> {
        let path = path.as_ref();
        let decode_err = |source: ImageError| PrivIdError::ImageDecode {
            path: path.to_path_buf(),
            source,
        };

        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| decode_err(ImageError::IoError(e)))?;
        let mut decoder = reader.into_decoder().map_err(decode_err)?;
        let orientation = decoder.orientation().map_err(decode_err)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

        let tag = if apply_rotation {
            image.apply_orientation(orientation);
            1
        } else {
            orientation.to_exif()
        };
        log::debug!(
            "Decoded {} as {}x{} (orientation {tag})",
            path.display(),
            image.width(),
            image.height()
        );

        let mut input = Self::from_pixels(
            convert(&image, format),
            image.width(),
            image.height(),
            format,
        )?;
        input.orientation = tag;
        Ok(input)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn orientation(&self) -> u8 {
        self.orientation
    }

    /// Width and height as the engine's `int` parameters.
    pub(crate) fn native_dims(&self) -> Result<(c_int, c_int)> {
        let too_large = |_| {
            PrivIdError::InvalidImage(format!(
                "{}x{} exceeds the engine's size limit",
                self.width, self.height
            ))
        };
        Ok((
            c_int::try_from(self.width).map_err(too_large)?,
            c_int::try_from(self.height).map_err(too_large)?,
        ))
    }
}

fn convert(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    match format {
        ImageFormat::Rgb => image.to_rgb8().into_raw(),
        ImageFormat::Rgba => image.to_rgba8().into_raw(),
        ImageFormat::Bgr => {
            let mut bytes = image.to_rgb8().into_raw();
            for px in bytes.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rstest::rstest;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir) -> std::path::PathBuf {
        // 3x2, red channel encodes x, green encodes y.
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 200]));
        let path = dir.path().join("face.png");
        img.save(&path).unwrap();
        path
    }

    #[rstest]
    #[case("rgb", ImageFormat::Rgb)]
    #[case("BGR", ImageFormat::Bgr)]
    #[case(" Rgba ", ImageFormat::Rgba)]
    fn test_format_parse(#[case] raw: &str, #[case] expected: ImageFormat) {
        assert_eq!(raw.parse::<ImageFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_parse_rejects_unknown() {
        assert!(matches!(
            "yuv".parse::<ImageFormat>(),
            Err(PrivIdError::InvalidImage(_))
        ));
        assert!("".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_format_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ImageFormat::Bgr).unwrap(), "\"bgr\"");
    }

    #[test]
    fn test_from_pixels_accepts_matching_shape() {
        let input = ImageInputArg::from_pixels(vec![0; 2 * 2 * 4], 2, 2, ImageFormat::Rgba).unwrap();
        assert_eq!(input.width(), 2);
        assert_eq!(input.height(), 2);
        assert_eq!(input.orientation(), 1);
        assert_eq!(input.native_dims().unwrap(), (2, 2));
    }

    #[rstest]
    #[case(vec![0; 11], 2, 2, ImageFormat::Rgb)]
    #[case(vec![0; 12], 2, 2, ImageFormat::Rgba)]
    #[case(vec![], 0, 2, ImageFormat::Rgb)]
    fn test_from_pixels_rejects_bad_shape(
        #[case] data: Vec<u8>,
        #[case] width: u32,
        #[case] height: u32,
        #[case] format: ImageFormat,
    ) {
        let err = ImageInputArg::from_pixels(data, width, height, format).unwrap_err();
        assert!(matches!(err, PrivIdError::InvalidImage(_)));
    }

    #[test]
    fn test_from_path_rgb() {
        let tmp = TempDir::new().unwrap();
        let input = ImageInputArg::from_path(write_png(&tmp), ImageFormat::Rgb, true).unwrap();

        assert_eq!((input.width(), input.height()), (3, 2));
        assert_eq!(input.data().len(), 18);
        // Pixel (2, 1).
        assert_eq!(&input.data()[15..18], &[20, 20, 200]);
        assert_eq!(input.orientation(), 1);
    }

    #[test]
    fn test_from_path_bgr_swaps_channels() {
        let tmp = TempDir::new().unwrap();
        let input = ImageInputArg::from_path(write_png(&tmp), ImageFormat::Bgr, false).unwrap();
        assert_eq!(&input.data()[15..18], &[200, 20, 20]);
        assert_eq!(input.orientation(), 1);
    }

    #[test]
    fn test_from_path_rgba_adds_opaque_alpha() {
        let tmp = TempDir::new().unwrap();
        let input = ImageInputArg::from_path(write_png(&tmp), ImageFormat::Rgba, true).unwrap();
        assert_eq!(input.data().len(), 24);
        assert!(input.data().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_from_path_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = ImageInputArg::from_path(tmp.path().join("nope.png"), ImageFormat::Rgb, true)
            .unwrap_err();
        assert!(matches!(err, PrivIdError::ImageDecode { .. }));
    }

    #[test]
    fn test_from_path_not_an_image() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        std::fs::write(&path, b"plain text").unwrap();
        let err = ImageInputArg::from_path(&path, ImageFormat::Rgb, true).unwrap_err();
        assert!(matches!(err, PrivIdError::ImageDecode { .. }));
    }
}
