//! MIME type detection for the images sent to the vision model.

use std::path::Path;

/// MIME type used in the `data:` URL, by file extension. Unknown
/// extensions fall back to PNG, which the vision endpoints sniff anyway.
pub fn detect_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        _              => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_image_mime(&PathBuf::from("photo.JPG")), "image/jpeg");
        assert_eq!(detect_image_mime(&PathBuf::from("3.jpeg")), "image/jpeg");
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_image_mime(&PathBuf::from("file.xyz")), "image/png");
    }
}
