use std::collections::HashMap;
use std::io::Cursor;

use camino::Utf8Path;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use thiserror::Error;

use crate::{Task, TaskContext, TaskResult};

const JPEG_QUALITY: u8 = 75;

/// Errors that can occur when processing images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// An I/O error occurred while reading or writing image files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image decoding or encoding.
    #[error("Image processing error in '{0}': {1}")]
    Image(String, image::ImageError),

    #[error("Unsupported image format: '{0}'")]
    Unsupported(String),

    /// Two sources would be encoded into the same file.
    #[error("'{0}' and '{1}' both encode to '{2}'")]
    Collision(String, String, String),
}

/// Recompresses raster images and minifies SVGs found by `globs`, writing
/// them to `output`. When recompression doesn't make a file smaller, the
/// original bytes are kept.
pub fn optimize_images(globs: &[&str], output: &str) -> Task {
    globs
        .iter()
        .fold(Task::new("images", optimize_all), |task, glob| task.input(*glob))
        .output(output)
}

/// Encodes every raster image found by `glob` as lossless WebP next to the
/// other images in `output`.
pub fn webp(glob: &str, output: &str) -> Task {
    Task::new("webp", encode_webp_all).input(glob).output(output)
}

fn optimize_all(ctx: &TaskContext) -> TaskResult {
    ctx.files
        .par_iter()
        .map(|file| -> anyhow::Result<()> {
            let original = crate::io::read(&file.path)?;
            let optimized = optimize(&file.path, &original)?;

            let data = match optimized {
                Some(optimized) if optimized.len() < original.len() => optimized,
                _ => original,
            };

            crate::io::write(ctx.output.join(&file.relative), data)?;
            Ok(())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(ctx.files.len())
}

fn optimize(path: &Utf8Path, data: &[u8]) -> Result<Option<Vec<u8>>, ImageError> {
    let extension = path.extension().unwrap_or_default().to_ascii_lowercase();

    match extension.as_str() {
        "png" => {
            let rgba = decode(path, data)?.to_rgba8();
            let mut buffer = Vec::new();

            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive)
                .write_image(&rgba, rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
                .map_err(|e| ImageError::Image(path.to_string(), e))?;

            Ok(Some(buffer))
        }
        "jpg" | "jpeg" => {
            let rgb = decode(path, data)?.to_rgb8();
            let mut buffer = Vec::new();

            JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
                .write_image(&rgb, rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(|e| ImageError::Image(path.to_string(), e))?;

            Ok(Some(buffer))
        }
        "svg" => {
            let text = String::from_utf8_lossy(data);
            Ok(Some(super::minify_svg(&text).into_bytes()))
        }
        _ => Ok(None),
    }
}

fn encode_webp_all(ctx: &TaskContext) -> TaskResult {
    let mut targets = HashMap::with_capacity(ctx.files.len());
    for file in &ctx.files {
        let path = ctx.output.join(&file.relative).with_extension("webp");
        if let Some(other) = targets.insert(path.clone(), &file.path) {
            let (first, second) = (other.to_string(), file.path.to_string());
            return Err(ImageError::Collision(first, second, path.to_string()).into());
        }
    }

    targets
        .par_iter()
        .map(|(path, source)| -> anyhow::Result<()> {
            let data = encode_webp(source)?;
            crate::io::write(path, data)?;
            Ok(())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(ctx.files.len())
}

fn encode_webp(path: &Utf8Path) -> Result<Vec<u8>, ImageError> {
    let extension = path.extension().unwrap_or_default().to_ascii_lowercase();
    if !matches!(extension.as_str(), "png" | "jpg" | "jpeg") {
        return Err(ImageError::Unsupported(path.to_string()));
    }

    let data = std::fs::read(path)?;
    let rgba = decode(path, &data)?.to_rgba8();
    let mut buffer = Vec::new();

    WebPEncoder::new_lossless(&mut buffer)
        .encode(&rgba, rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ImageError::Image(path.to_string(), e))?;

    Ok(buffer)
}

fn decode(path: &Utf8Path, data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImageError::Image(path.to_string(), e))
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use crate::{Error, Orchestrator};

    fn setup() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        let img = RgbaImage::from_pixel(16, 16, Rgba([200, 40, 40, 255]));
        std::fs::create_dir_all(root.join("source/img/photos")).unwrap();
        img.save(root.join("source/img/photos/red.png")).unwrap();

        crate::io::write(
            root.join("source/img/icon.svg"),
            "<?xml version=\"1.0\"?>\n<!-- exported -->\n<svg viewBox=\"0 0 1 1\">\n  <path d=\"M0 0\"/>\n</svg>\n",
        )
        .unwrap();

        (dir, root)
    }

    #[test]
    fn test_optimize_images() {
        let (_guard, root) = setup();

        let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
        orchestrator
            .register(super::optimize_images(&["img/**/*.{png,svg}"], "img"))
            .unwrap();

        let report = orchestrator.run_task("images").unwrap();
        assert_eq!(report.files, 2);

        let png = root.join("build/img/photos/red.png");
        let decoded = image::open(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.get_pixel(3, 3), &Rgba([200, 40, 40, 255]));

        let svg = std::fs::read_to_string(root.join("build/img/icon.svg")).unwrap();
        assert_eq!(svg, "<svg viewBox=\"0 0 1 1\"><path d=\"M0 0\"/></svg>");
    }

    #[test]
    fn test_webp_lossless() {
        let (_guard, root) = setup();

        let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
        orchestrator
            .register(super::webp("img/**/*.{jpg,png}", "img"))
            .unwrap();

        orchestrator.run_task("webp").unwrap();

        let webp = root.join("build/img/photos/red.webp");
        let decoded = image::open(&webp).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(15, 15), &Rgba([200, 40, 40, 255]));
        // sources stay untouched
        assert!(!root.join("source/img/photos/red.webp").exists());
    }

    #[test]
    fn test_webp_name_collision() {
        let (_guard, root) = setup();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
            .save(root.join("source/img/photos/red.jpg"))
            .unwrap();

        let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
        orchestrator
            .register(super::webp("img/**/*.{jpg,png}", "img"))
            .unwrap();

        let err = orchestrator.run_task("webp").unwrap_err();
        assert!(matches!(&err, Error::TaskExecution { task, .. } if task == "webp"));
        assert!(err.to_string().contains("red.webp"), "{err}");
        assert!(!root.join("build/img/photos/red.webp").exists());
    }
}
