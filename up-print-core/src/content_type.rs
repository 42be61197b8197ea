//! Content type detection for the document being printed.
//!
//! Precedence, first match wins: explicit override, file extension, magic
//! bytes of the file header, then `application/octet-stream`.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// How many header bytes the magic sniffer looks at.
const HEADER_LEN: usize = 16;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const ZIP_SIGNATURES: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

/// Where a resolved content type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeSource {
    Override,
    Extension,
    Magic,
    Fallback,
}

impl ContentTypeSource {
    pub fn tag(&self) -> &'static str {
        match self {
            ContentTypeSource::Override => "override",
            ContentTypeSource::Extension => "extension",
            ContentTypeSource::Magic => "magic",
            ContentTypeSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ContentTypeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContentType {
    pub content_type: String,
    pub source: ContentTypeSource,
}

/// Resolve the MIME type of `path`, honouring `explicit_override` first.
pub fn resolve(path: &Path, explicit_override: Option<&str>) -> ResolvedContentType {
    let resolved = if let Some(ct) = explicit_override.map(str::trim).filter(|s| !s.is_empty()) {
        ResolvedContentType {
            content_type: ct.to_string(),
            source: ContentTypeSource::Override,
        }
    } else if let Some(ct) = guess_from_extension(path).filter(|ct| *ct != OCTET_STREAM) {
        ResolvedContentType {
            content_type: ct.to_string(),
            source: ContentTypeSource::Extension,
        }
    } else if let Some(ct) = read_header(path).and_then(|header| sniff_magic(&header, path)) {
        ResolvedContentType {
            content_type: ct.to_string(),
            source: ContentTypeSource::Magic,
        }
    } else {
        ResolvedContentType {
            content_type: OCTET_STREAM.to_string(),
            source: ContentTypeSource::Fallback,
        }
    };
    debug!(
        path = %path.display(),
        content_type = %resolved.content_type,
        source = %resolved.source,
        "Resolved document content type"
    );
    resolved
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extension table for formats a print queue is likely to be handed.
pub fn guess_from_extension(path: &Path) -> Option<&'static str> {
    let ct = match extension(path)?.as_str() {
        "pdf" => "application/pdf",
        "xps" => "application/vnd.ms-xpsdocument",
        "oxps" => "application/oxps",
        "ps" | "eps" => "application/postscript",
        "pcl" => "application/vnd.hp-pcl",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "txt" | "text" => "text/plain",
        "htm" | "html" => "text/html",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "bin" | "dat" => OCTET_STREAM,
        _ => return None,
    };
    Some(ct)
}

/// ZIP containers are ambiguous; only the extension tells them apart.
fn zip_container_type(path: &Path) -> Option<&'static str> {
    match extension(path)?.as_str() {
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "pptx" => Some("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
        "oxps" => Some("application/oxps"),
        "xps" => Some("application/vnd.ms-xpsdocument"),
        _ => None,
    }
}

/// Match the file header against known signatures.
pub fn sniff_magic(header: &[u8], path: &Path) -> Option<&'static str> {
    if header.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if header.starts_with(PNG_SIGNATURE) {
        Some("image/png")
    } else if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if header.starts_with(b"II*\x00") || header.starts_with(b"MM\x00*") {
        Some("image/tiff")
    } else if header.starts_with(b"%!PS-") {
        Some("application/postscript")
    } else if ZIP_SIGNATURES.iter().any(|sig| header.starts_with(sig)) {
        zip_container_type(path)
    } else {
        None
    }
}

fn read_header(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header).ok()?;
    Some(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(name: &str, bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn pdf_magic_without_extension() {
        let (_dir, path) = file_with("scan", b"%PDF-1.7\n%\xe2\xe3");
        let resolved = resolve(&path, None);
        assert_eq!(resolved.content_type, "application/pdf");
        assert_eq!(resolved.source, ContentTypeSource::Magic);
    }

    #[test]
    fn override_beats_extension_and_content() {
        let (_dir, path) = file_with("photo.png", PNG_SIGNATURE);
        let resolved = resolve(&path, Some("application/oxps"));
        assert_eq!(resolved.content_type, "application/oxps");
        assert_eq!(resolved.source, ContentTypeSource::Override);
    }

    #[test]
    fn extension_beats_magic() {
        let (_dir, path) = file_with("notes.txt", b"%PDF-1.4");
        let resolved = resolve(&path, None);
        assert_eq!(resolved.content_type, "text/plain");
        assert_eq!(resolved.source, ContentTypeSource::Extension);
    }

    #[test]
    fn octet_stream_extension_falls_through_to_magic() {
        let (_dir, path) = file_with("blob.bin", b"GIF89a....");
        let resolved = resolve(&path, None);
        assert_eq!(resolved.content_type, "image/gif");
        assert_eq!(resolved.source, ContentTypeSource::Magic);
    }

    #[test]
    fn unknown_content_falls_back() {
        let (_dir, path) = file_with("mystery", b"\x00\x01\x02\x03");
        let resolved = resolve(&path, None);
        assert_eq!(resolved.content_type, OCTET_STREAM);
        assert_eq!(resolved.source, ContentTypeSource::Fallback);
    }

    #[test]
    fn zip_signature_needs_known_extension() {
        let header = b"PK\x03\x04\x14\x00\x06\x00";
        assert_eq!(
            sniff_magic(header, Path::new("print.oxps")),
            Some("application/oxps")
        );
        assert_eq!(
            sniff_magic(b"PK\x05\x06", Path::new("sheet.xlsx")),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
        assert_eq!(sniff_magic(header, Path::new("archive.zip")), None);
        assert_eq!(sniff_magic(header, Path::new("noext")), None);
    }

    #[test]
    fn image_and_postscript_signatures() {
        let p = Path::new("x");
        assert_eq!(sniff_magic(&[0xFF, 0xD8, 0xFF, 0xE0], p), Some("image/jpeg"));
        assert_eq!(sniff_magic(b"II*\x00\x08\x00", p), Some("image/tiff"));
        assert_eq!(sniff_magic(b"MM\x00*\x00\x00", p), Some("image/tiff"));
        assert_eq!(sniff_magic(b"%!PS-Adobe-3.0", p), Some("application/postscript"));
        assert_eq!(sniff_magic(b"GIF87a", p), Some("image/gif"));
    }
}
