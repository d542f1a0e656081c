// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `imagecurry` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 响应状态码及其原因短语（Reason Phrase）。
//! - 扩展名与 MIME 类型之间的双向映射表。
//! - 固定的 CORS 头部集合与缓存控制策略。
//! - HTTP 方法、版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "imagecurry";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 头部结束标记
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 头部缓冲区上限
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

/// 单个请求（以及上传文件）允许的最大字节数
pub const MAX_REQUEST_SIZE: u64 = 128 * 1024 * 1024;

/// 连接接收截止时间（秒）
pub const RECEIVE_TIMEOUT_SECS: u64 = 30;

/// 文件流式发送时的分块大小
pub const CHUNK_SIZE: usize = 8 * 1024;

/// 文件名最大长度
pub const MAX_FILENAME_LEN: usize = 255;

/// 成功取回与 304 响应使用的缓存策略
pub const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// 无法识别类型时使用的扩展名
pub const DEFAULT_EXTENSION: &str = ".bin";

/// 兜底的 MIME 类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 每个响应都携带的 CORS 头部
pub const CORS_HEADERS: [(&str, &str); 6] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, HEAD, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type, Content-Length, If-None-Match, If-Modified-Since, Authorization",
    ),
    ("Access-Control-Expose-Headers", "Content-Length, Content-Type"),
    ("Access-Control-Max-Age", "86400"),
    ("Vary", "Origin"),
];

lazy_static! {
    /// 状态行使用的原因短语。
    ///
    /// 错误页面只使用其中 400/404/413/500/501 五项，其余错误码一律显示 `Error`。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(304, "Not Modified");
        map.insert(400, "Bad Request");
        map.insert(404, "Not Found");
        map.insert(413, "Payload Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表（键均为小写）。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("txt", "text/plain");
        map.insert("html", "text/html");
        map.insert("css", "text/css");
        map.insert("js", "application/javascript");
        map.insert("json", "application/json");
        map.insert("xml", "application/xml");
        map.insert("pdf", "application/pdf");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("gif", "image/gif");
        map.insert("svg", "image/svg+xml");
        map.insert("webp", "image/webp");
        map.insert("zip", "application/zip");
        map
    };
}

lazy_static! {
    /// 上传时 `Content-Type` 到存储扩展名的映射表。
    pub static ref UPLOAD_EXTENSIONS: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("image/jpeg", ".jpg");
        map.insert("image/jpg", ".jpg");
        map.insert("image/png", ".png");
        map.insert("image/gif", ".gif");
        map.insert("image/webp", ".webp");
        map.insert("image/bmp", ".bmp");
        map.insert("image/tiff", ".tiff");
        map.insert("image/svg+xml", ".svg");
        map.insert("application/pdf", ".pdf");
        map.insert("application/zip", ".zip");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本
    V1_0,
    /// HTTP/1.1 版本
    V1_1,
}

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 上传文件
    Post,
    /// CORS 预检
    Options,
    /// 其他任何方法，统一回复 501
    Other,
}

impl HttpRequestMethod {
    /// 按请求行中的原始字段识别方法（区分大小写）。
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "POST" => HttpRequestMethod::Post,
            "OPTIONS" => HttpRequestMethod::Options,
            _ => HttpRequestMethod::Other,
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Other => write!(f, "OTHER"),
        }
    }
}
