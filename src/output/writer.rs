use std::path::Path;

use crate::foundation::error::{FramepassError, FramepassResult};
use crate::host::RenderedImage;
use crate::output::format::OutputFormat;

/// Writes rendered images to storage.
pub trait ImageWriter {
    /// Encode `image` as `format` at `path`, replacing any existing file.
    fn write(
        &mut self,
        image: &RenderedImage,
        path: &Path,
        format: OutputFormat,
    ) -> FramepassResult<()>;
}

/// Writes through the `image` crate to the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskWriter;

impl ImageWriter for DiskWriter {
    fn write(
        &mut self,
        image: &RenderedImage,
        path: &Path,
        format: OutputFormat,
    ) -> FramepassResult<()> {
        write_image(image, path, format)
    }
}

/// Encode `image` to `path`. Movie formats are written as PNG.
pub fn write_image(image: &RenderedImage, path: &Path, format: OutputFormat) -> FramepassResult<()> {
    let format = format.for_stills();
    let Some(encoder) = format.image_format() else {
        return Err(FramepassError::validation(format!(
            "format {format} cannot store still images"
        )));
    };

    let result = match format {
        OutputFormat::OpenExr => {
            let buf =
                image::Rgba32FImage::from_raw(image.width, image.height, image.pixels.clone())
                    .ok_or_else(|| FramepassError::render("float buffer does not match size"))?;
            image::DynamicImage::ImageRgba32F(buf).save_with_format(path, encoder)
        }
        OutputFormat::Jpeg => image::save_buffer_with_format(
            path,
            &image.to_rgb8(),
            image.width,
            image.height,
            image::ColorType::Rgb8,
            encoder,
        ),
        _ => image::save_buffer_with_format(
            path,
            &image.to_rgba8(),
            image.width,
            image.height,
            image::ColorType::Rgba8,
            encoder,
        ),
    };

    result.map_err(|e| match e {
        image::ImageError::IoError(io) => {
            FramepassError::io(format!("write image '{}'", path.display()), io)
        }
        other => FramepassError::render(format!(
            "encode {format} image '{}': {other}",
            path.display()
        )),
    })
}
