//! Payload inspection: is this response an image, and what file extension
//! should it be stored under?
//!
//! Servers routinely lie here. Soft-404 pages come back as `200 text/html`
//! from `/favicon.ico`, and real icons are served as
//! `application/octet-stream`. Magic bytes are therefore checked first and
//! `Content-Type` and the URL path only break ties.

use image::ImageFormat;
use url::Url;

/// Bytes inspected when looking for SVG or HTML markup.
const MARKUP_PREFIX: usize = 512;

/// Extension used when nothing else identifies the payload.
pub const FALLBACK_EXTENSION: &str = "ico";

/// Identify the format from the payload itself.
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if looks_like_svg(bytes) {
        return Some("svg");
    }
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Ico => Some("ico"),
        ImageFormat::Bmp => Some("bmp"),
        _ => None,
    }
}

/// Map a `Content-Type` header value to an extension.
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/svg+xml" => Some("svg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/x-icon" | "image/vnd.microsoft.icon" | "image/ico" => Some("ico"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

/// Extension of the last path segment, if it is a known image type.
pub fn extension_from_url(url: &Url) -> Option<&'static str> {
    let path = url.path().to_ascii_lowercase();
    let ext = path.rsplit_once('.')?.1;
    match ext {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "svg" => Some("svg"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "ico" => Some("ico"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

/// Pick the storage extension: payload, then header, then URL, then `ico`.
pub fn icon_extension(bytes: &[u8], content_type: Option<&str>, url: &Url) -> &'static str {
    sniff_extension(bytes)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .or_else(|| extension_from_url(url))
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Whether a payload can be shown as an icon.
///
/// Recognized magic bytes or SVG markup always pass. An `image/*` content
/// type passes too, unless the body is obviously an HTML page.
pub fn is_image_like(bytes: &[u8], content_type: Option<&str>) -> bool {
    if sniff_extension(bytes).is_some() {
        return true;
    }
    let declared_image = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);
    declared_image && !looks_like_html(bytes)
}

fn markup_prefix(bytes: &[u8]) -> String {
    let end = bytes.len().min(MARKUP_PREFIX);
    String::from_utf8_lossy(&bytes[..end])
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_ascii_lowercase()
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = markup_prefix(bytes);
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = markup_prefix(bytes);
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<head")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const ICO: &[u8] = b"\0\0\x01\0\x01\0\x10\x10";
    const GIF: &[u8] = b"GIF89a\x01\0\x01\0";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn sniffs_common_raster_formats() {
        assert_eq!(sniff_extension(PNG), Some("png"));
        assert_eq!(sniff_extension(ICO), Some("ico"));
        assert_eq!(sniff_extension(GIF), Some("gif"));
        assert_eq!(sniff_extension(JPEG), Some("jpg"));
    }

    #[test]
    fn sniffs_svg_markup() {
        assert_eq!(sniff_extension(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), Some("svg"));
        assert_eq!(
            sniff_extension(b"<?xml version=\"1.0\"?>\n<svg></svg>"),
            Some("svg")
        );
    }

    #[test]
    fn html_is_not_sniffed_as_image() {
        assert_eq!(sniff_extension(b"<!DOCTYPE html><html></html>"), None);
    }

    #[test]
    fn content_type_mapping_ignores_parameters() {
        assert_eq!(extension_from_content_type("image/png; charset=binary"), Some("png"));
        assert_eq!(extension_from_content_type("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(extension_from_content_type("image/vnd.microsoft.icon"), Some("ico"));
        assert_eq!(extension_from_content_type("image/svg+xml"), Some("svg"));
        assert_eq!(extension_from_content_type("text/html"), None);
    }

    #[test]
    fn url_extension_mapping() {
        assert_eq!(extension_from_url(&url("https://a.org/icons/touch.PNG")), Some("png"));
        assert_eq!(extension_from_url(&url("https://a.org/logo.jpeg?v=2")), Some("jpg"));
        assert_eq!(extension_from_url(&url("https://a.org/s2/favicons")), None);
    }

    #[test]
    fn payload_wins_over_header_and_url() {
        let ext = icon_extension(PNG, Some("image/x-icon"), &url("https://a.org/favicon.ico"));
        assert_eq!(ext, "png");
    }

    #[test]
    fn header_used_when_payload_unknown() {
        let ext = icon_extension(b"????", Some("image/webp"), &url("https://a.org/icon"));
        assert_eq!(ext, "webp");
    }

    #[test]
    fn falls_back_to_ico() {
        assert_eq!(icon_extension(b"????", None, &url("https://a.org/icon")), "ico");
    }

    #[test]
    fn image_like_accepts_magic_bytes_without_header() {
        assert!(is_image_like(PNG, Some("application/octet-stream")));
        assert!(is_image_like(ICO, None));
    }

    #[test]
    fn image_like_trusts_image_header_for_unknown_bytes() {
        assert!(is_image_like(b"\x00\x01binary", Some("image/avif")));
    }

    #[test]
    fn image_like_rejects_soft_404_pages() {
        let page = b"<!doctype html><html><head><title>Not found</title></head></html>";
        assert!(!is_image_like(page, Some("text/html")));
        assert!(!is_image_like(page, Some("image/x-icon")));
    }

    #[test]
    fn image_like_rejects_unknown_without_header() {
        assert!(!is_image_like(b"plain text", None));
    }
}
