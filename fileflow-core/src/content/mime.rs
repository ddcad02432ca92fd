//! MIME type detection
//!
//! Known extensions win; otherwise the file header is matched against magic
//! numbers, and finally sniffed for text.

use std::path::Path;

/// Bytes of file header read for detection
pub const SNIFF_LEN: usize = 8192;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a known extension (case-insensitive, no leading dot)
pub fn from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" | "text" => TEXT_PLAIN,
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "tsv" => "text/tab-separated-values; charset=utf-8",
        "htm" | "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "rs" => "text/x-rust; charset=utf-8",
        "py" => "text/x-python; charset=utf-8",
        "go" => "text/x-go; charset=utf-8",
        "java" => "text/x-java; charset=utf-8",
        "c" | "h" => "text/x-c; charset=utf-8",
        "cpp" | "hpp" | "cc" => "text/x-c++; charset=utf-8",
        "sh" => "text/x-shellscript; charset=utf-8",
        "toml" => "text/x-toml; charset=utf-8",
        "yaml" | "yml" => "text/yaml; charset=utf-8",
        "json" => "application/json",
        "xml" => "text/xml; charset=utf-8",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "exe" => "application/vnd.microsoft.portable-executable",
        _ => return None,
    };
    Some(mime)
}

/// Detect the MIME type of a file from its path and the first bytes of its content
pub fn detect(path: &Path, header: &[u8]) -> String {
    if let Some(mime) = path.extension().and_then(|e| from_extension(&e.to_string_lossy())) {
        return mime.to_string();
    }
    if let Some(kind) = infer::get(header) {
        return kind.mime_type().to_string();
    }
    if looks_like_text(header) {
        TEXT_PLAIN.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}

/// No NUL bytes and valid UTF-8, allowing a code point cut off at the end of the header
fn looks_like_text(header: &[u8]) -> bool {
    if header.contains(&0) {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && header.len() - e.valid_up_to() < 4,
    }
}
