//! Static assets: the stylesheet and the site's own images.
//!
//! Everything under `<source>/images/` with an image extension is copied to
//! `<output>/images/`, keeping its relative path. When `[images] max_width`
//! is set, JPEG and PNG files wider than that are downscaled with Lanczos3
//! and re-encoded in place of the copy. Any decode or encode failure falls
//! back to a verbatim copy, so a single odd file never fails the build.

use crate::config::ImagesConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

pub const STYLESHEET: &str = "styles.css";
pub const IMAGES_DIR: &str = "images";

const BUILTIN_CSS: &str = include_str!("../static/styles.css");

/// Copied to the output; anything else under `images/` is ignored.
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "ico"];

const JPEG_QUALITY: u8 = 85;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StylesheetSource {
    /// Copied from the source directory.
    Source,
    /// No `styles.css` in the source; the built-in one was written.
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAction {
    Copied,
    Resized { from: (u32, u32), to: (u32, u32) },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedImage {
    /// Path relative to `images/`, with `/` separators.
    pub path: String,
    pub action: ImageAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub stylesheet: StylesheetSource,
    pub images: Vec<CopiedImage>,
}

/// Copy the stylesheet and images from `source_dir` into `out_dir`.
pub fn copy_assets(
    source_dir: &Path,
    out_dir: &Path,
    config: &ImagesConfig,
) -> Result<AssetReport, AssetError> {
    Ok(AssetReport {
        stylesheet: copy_stylesheet(source_dir, out_dir)?,
        images: copy_images(source_dir, out_dir, config)?,
    })
}

pub fn copy_stylesheet(source_dir: &Path, out_dir: &Path) -> Result<StylesheetSource, AssetError> {
    let src = source_dir.join(STYLESHEET);
    let dst = out_dir.join(STYLESHEET);
    if src.is_file() {
        fs::copy(&src, &dst)?;
        Ok(StylesheetSource::Source)
    } else {
        fs::write(&dst, BUILTIN_CSS)?;
        Ok(StylesheetSource::Builtin)
    }
}

/// Copy every image under `<source>/images/`, in file-name order.
pub fn copy_images(
    source_dir: &Path,
    out_dir: &Path,
    config: &ImagesConfig,
) -> Result<Vec<CopiedImage>, AssetError> {
    let src_root = source_dir.join(IMAGES_DIR);
    if !src_root.is_dir() {
        return Ok(Vec::new());
    }
    let dst_root = out_dir.join(IMAGES_DIR);

    let mut copied = Vec::new();
    for entry in WalkDir::new(&src_root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let rel = entry.path().strip_prefix(&src_root).unwrap_or(entry.path());
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let dst = dst_root.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let action = match config.max_width {
            Some(max_width) if !keeps_original(config, &rel_str) => {
                optimize_image(entry.path(), &dst, max_width)?
            }
            _ => {
                fs::copy(entry.path(), &dst)?;
                ImageAction::Copied
            }
        };
        copied.push(CopiedImage {
            path: rel_str,
            action,
        });
    }
    Ok(copied)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// `keep_original` entries match either the file name or the path relative
/// to `images/`.
fn keeps_original(config: &ImagesConfig, rel: &str) -> bool {
    let file_name = rel.rsplit('/').next().unwrap_or(rel);
    config
        .keep_original
        .iter()
        .any(|k| k == rel || k == file_name)
}

/// Downscale when possible, otherwise copy verbatim.
fn optimize_image(src: &Path, dst: &Path, max_width: u32) -> Result<ImageAction, AssetError> {
    match downscale(src, dst, max_width) {
        Ok(Some((from, to))) => return Ok(ImageAction::Resized { from, to }),
        Ok(None) => {}
        Err(e) => warn!(image = %src.display(), error = %e, "resize failed, copying original"),
    }
    fs::copy(src, dst)?;
    Ok(ImageAction::Copied)
}

/// Returns `None` when the image needs no resize or its format is not one
/// we re-encode.
fn downscale(
    src: &Path,
    dst: &Path,
    max_width: u32,
) -> Result<Option<((u32, u32), (u32, u32))>, ImageError> {
    let format = match ImageFormat::from_path(src) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png)) => f,
        _ => return Ok(None),
    };
    let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;
    let from = (img.width(), img.height());
    if from.0 <= max_width {
        return Ok(None);
    }

    let resized = img.resize(max_width, u32::MAX, FilterType::Lanczos3);
    let to = (resized.width(), resized.height());
    match format {
        ImageFormat::Jpeg => {
            let writer = BufWriter::new(fs::File::create(dst)?);
            let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
            DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder)?;
        }
        _ => resized.save_with_format(dst, format)?,
    }
    Ok(Some((from, to)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, TempDir) {
        (TempDir::new().unwrap(), TempDir::new().unwrap())
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    // =========================================================================
    // Stylesheet
    // =========================================================================

    #[test]
    fn stylesheet_copied_from_source() {
        let (src, out) = dirs();
        fs::write(src.path().join("styles.css"), "body { color: red; }").unwrap();
        assert_eq!(
            copy_stylesheet(src.path(), out.path()).unwrap(),
            StylesheetSource::Source
        );
        assert_eq!(
            fs::read_to_string(out.path().join("styles.css")).unwrap(),
            "body { color: red; }"
        );
    }

    #[test]
    fn stylesheet_falls_back_to_builtin() {
        let (src, out) = dirs();
        assert_eq!(
            copy_stylesheet(src.path(), out.path()).unwrap(),
            StylesheetSource::Builtin
        );
        let css = fs::read_to_string(out.path().join("styles.css")).unwrap();
        assert!(css.contains(".portfolio-table"));
    }

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn no_images_dir_is_fine() {
        let (src, out) = dirs();
        assert!(copy_images(src.path(), out.path(), &ImagesConfig::default())
            .unwrap()
            .is_empty());
        assert!(!out.path().join("images").exists());
    }

    #[test]
    fn copies_images_preserving_paths() {
        let (src, out) = dirs();
        let images = src.path().join("images");
        fs::create_dir_all(images.join("team")).unwrap();
        fs::write(images.join("cn.png"), b"png").unwrap();
        fs::write(images.join("team/photo.JPG"), b"jpg").unwrap();
        fs::write(images.join("notes.txt"), b"skip").unwrap();

        let copied = copy_images(src.path(), out.path(), &ImagesConfig::default()).unwrap();
        let paths: Vec<&str> = copied.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["cn.png", "team/photo.JPG"]);
        assert!(copied.iter().all(|c| c.action == ImageAction::Copied));
        assert_eq!(fs::read(out.path().join("images/team/photo.JPG")).unwrap(), b"jpg");
        assert!(!out.path().join("images/notes.txt").exists());
    }

    #[test]
    fn downscales_wide_png() {
        let (src, out) = dirs();
        write_png(&src.path().join("images/hero.png"), 40, 20);
        let config = ImagesConfig {
            max_width: Some(10),
            keep_original: vec![],
        };

        let copied = copy_images(src.path(), out.path(), &config).unwrap();
        assert_eq!(
            copied[0].action,
            ImageAction::Resized {
                from: (40, 20),
                to: (10, 5)
            }
        );
        assert_eq!(
            image::image_dimensions(out.path().join("images/hero.png")).unwrap(),
            (10, 5)
        );
    }

    #[test]
    fn narrow_images_are_copied() {
        let (src, out) = dirs();
        write_png(&src.path().join("images/small.png"), 8, 8);
        let config = ImagesConfig {
            max_width: Some(10),
            keep_original: vec![],
        };
        let copied = copy_images(src.path(), out.path(), &config).unwrap();
        assert_eq!(copied[0].action, ImageAction::Copied);
    }

    #[test]
    fn keep_original_skips_resize() {
        let (src, out) = dirs();
        write_png(&src.path().join("images/favicon512.png"), 40, 40);
        let config = ImagesConfig {
            max_width: Some(10),
            keep_original: vec!["favicon512.png".to_string()],
        };
        let copied = copy_images(src.path(), out.path(), &config).unwrap();
        assert_eq!(copied[0].action, ImageAction::Copied);
        assert_eq!(
            image::image_dimensions(out.path().join("images/favicon512.png")).unwrap(),
            (40, 40)
        );
    }

    #[test]
    fn undecodable_image_falls_back_to_copy() {
        let (src, out) = dirs();
        fs::create_dir_all(src.path().join("images")).unwrap();
        fs::write(src.path().join("images/broken.jpg"), b"not really a jpeg").unwrap();
        let config = ImagesConfig {
            max_width: Some(10),
            keep_original: vec![],
        };
        let copied = copy_images(src.path(), out.path(), &config).unwrap();
        assert_eq!(copied[0].action, ImageAction::Copied);
        assert_eq!(
            fs::read(out.path().join("images/broken.jpg")).unwrap(),
            b"not really a jpeg"
        );
    }

    #[test]
    fn keep_original_matches_relative_path() {
        let config = ImagesConfig {
            max_width: Some(10),
            keep_original: vec!["team/a.png".to_string()],
        };
        assert!(keeps_original(&config, "team/a.png"));
        assert!(!keeps_original(&config, "other/b.png"));
    }
}
