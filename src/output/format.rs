use std::str::FromStr;

use crate::foundation::error::FramepassError;

/// Image (or movie) format configured in the host's render settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputFormat {
    /// PNG, 8-bit RGBA.
    #[default]
    Png,
    /// JPEG, 8-bit RGB.
    Jpeg,
    /// TIFF, 8-bit RGBA.
    Tiff,
    /// OpenEXR, 32-bit float RGBA.
    OpenExr,
    /// BMP, 8-bit RGBA.
    Bmp,
    /// FFmpeg movie container.
    Ffmpeg,
    /// AVI with JPEG frames.
    AviJpeg,
    /// Uncompressed AVI.
    AviRaw,
    /// Frame server streaming.
    FrameServer,
}

impl OutputFormat {
    /// File extension including the dot. Formats without a still extension use `.png`.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => ".png",
            OutputFormat::Jpeg => ".jpg",
            OutputFormat::Tiff => ".tif",
            OutputFormat::OpenExr => ".exr",
            OutputFormat::Bmp => ".bmp",
            _ => ".png",
        }
    }

    /// `true` for movie formats that cannot store a single still.
    pub fn is_movie(self) -> bool {
        matches!(
            self,
            OutputFormat::Ffmpeg
                | OutputFormat::AviJpeg
                | OutputFormat::AviRaw
                | OutputFormat::FrameServer
        )
    }

    /// Format to use for still output: movie formats become PNG.
    pub fn for_stills(self) -> Self {
        if self.is_movie() {
            OutputFormat::Png
        } else {
            self
        }
    }

    /// Matching encoder in the `image` crate, for still formats.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            OutputFormat::Png => Some(image::ImageFormat::Png),
            OutputFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            OutputFormat::Tiff => Some(image::ImageFormat::Tiff),
            OutputFormat::OpenExr => Some(image::ImageFormat::OpenExr),
            OutputFormat::Bmp => Some(image::ImageFormat::Bmp),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::OpenExr => "OPEN_EXR",
            OutputFormat::Bmp => "BMP",
            OutputFormat::Ffmpeg => "FFMPEG",
            OutputFormat::AviJpeg => "AVI_JPEG",
            OutputFormat::AviRaw => "AVI_RAW",
            OutputFormat::FrameServer => "FRAMESERVER",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = FramepassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "png" => OutputFormat::Png,
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "tiff" | "tif" => OutputFormat::Tiff,
            "exr" | "open_exr" | "openexr" => OutputFormat::OpenExr,
            "bmp" => OutputFormat::Bmp,
            "ffmpeg" => OutputFormat::Ffmpeg,
            "avi_jpeg" => OutputFormat::AviJpeg,
            "avi_raw" => OutputFormat::AviRaw,
            "frameserver" => OutputFormat::FrameServer,
            other => {
                return Err(FramepassError::validation(format!(
                    "unknown output format '{other}'"
                )));
            }
        };
        Ok(format)
    }
}
