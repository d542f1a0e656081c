// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容类型解析
//!
//! - 取回时：按文件扩展名查表得到 `Content-Type`。
//! - 上传时：优先使用请求的 `Content-Type` 推断扩展名，无法识别时检查请求体开头的魔数，
//!   仍无法识别则使用 `.bin`。

use std::path::Path;

use crate::param::{DEFAULT_EXTENSION, MIME_TYPES, OCTET_STREAM, UPLOAD_EXTENSIONS};

/// 已知的文件签名：(偏移, 魔数, 扩展名)
const SIGNATURES: [(usize, &[u8], &str); 6] = [
    (0, &[0xFF, 0xD8, 0xFF], ".jpg"),
    (0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], ".png"),
    (0, b"GIF8", ".gif"),
    (0, b"%PDF", ".pdf"),
    (0, &[b'P', b'K', 0x03, 0x04], ".zip"),
    (8, b"WEBP", ".webp"),
];

/// 按文件名扩展名（大小写不敏感）得到 MIME 类型。
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return OCTET_STREAM,
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => OCTET_STREAM,
    }
}

/// 由 `Content-Type` 头的值推断扩展名，参数部分（`;` 之后）被忽略。
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    UPLOAD_EXTENSIONS.get(essence.as_str()).copied()
}

/// 检查请求体开头的文件签名。
pub fn extension_from_magic(body: &[u8]) -> &'static str {
    for &(offset, magic, extension) in SIGNATURES.iter() {
        // WEBP 的签名位于 RIFF 容器头之后
        if offset == 8 && !body.starts_with(b"RIFF") {
            continue;
        }
        if body.len() >= offset + magic.len() && &body[offset..offset + magic.len()] == magic {
            return extension;
        }
    }
    DEFAULT_EXTENSION
}

/// 上传文件的扩展名：`Content-Type` 优先，魔数兜底。
pub fn detect_upload_extension(content_type: Option<&str>, body: &[u8]) -> &'static str {
    content_type
        .and_then(extension_from_content_type)
        .unwrap_or_else(|| extension_from_magic(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_known() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("x.tar.webp"), "image/webp");
        assert_eq!(content_type_for("notes.txt"), "text/plain");
    }

    #[test]
    fn test_content_type_for_unknown() {
        assert_eq!(content_type_for("noext"), OCTET_STREAM);
        assert_eq!(content_type_for("a.exe"), OCTET_STREAM);
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_from_content_type("image/png"), Some(".png"));
        assert_eq!(
            extension_from_content_type("image/jpeg; charset=binary"),
            Some(".jpg")
        );
        assert_eq!(extension_from_content_type("IMAGE/WEBP"), Some(".webp"));
        assert_eq!(extension_from_content_type("text/plain"), None);
        assert_eq!(extension_from_content_type(""), None);
    }

    #[test]
    fn test_magic_signatures() {
        assert_eq!(extension_from_magic(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), ".jpg");
        assert_eq!(
            extension_from_magic(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            ".png"
        );
        assert_eq!(extension_from_magic(b"GIF89a...."), ".gif");
        assert_eq!(extension_from_magic(b"%PDF-1.7"), ".pdf");
        assert_eq!(extension_from_magic(b"PK\x03\x04rest"), ".zip");
        assert_eq!(extension_from_magic(b"RIFF\x10\x00\x00\x00WEBPVP8 "), ".webp");
    }

    #[test]
    fn test_magic_fallback() {
        assert_eq!(extension_from_magic(b"hello"), ".bin");
        assert_eq!(extension_from_magic(b""), ".bin");
        // RIFF 容器但不是 WEBP（例如 WAV）
        assert_eq!(extension_from_magic(b"RIFF\x10\x00\x00\x00WAVEfmt "), ".bin");
        // 截断的签名
        assert_eq!(extension_from_magic(&[0xFF, 0xD8]), ".bin");
    }

    #[test]
    fn test_detect_upload_extension() {
        assert_eq!(detect_upload_extension(Some("image/png"), b"hello"), ".png");
        assert_eq!(detect_upload_extension(Some("text/plain"), b"hello"), ".bin");
        assert_eq!(detect_upload_extension(Some("text/plain"), b"%PDF-1.4"), ".pdf");
        assert_eq!(detect_upload_extension(None, b"GIF87a"), ".gif");
    }
}
