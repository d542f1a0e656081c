// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 缓存校验器
//!
//! 由文件元数据推导 `ETag` 与 `Last-Modified`，并与请求中的条件头比较。
//! 两个值在每次 GET/HEAD 时重新计算，从不落盘。

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::request::Request;

/// 一个文件在某一时刻的校验值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidator {
    etag: String,
    last_modified: String,
    size: u64,
}

impl CacheValidator {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        Self::from_parts(modified, metadata.len())
    }

    /// ETag 形如 `"<mtime 秒, 十六进制>-<大小, 十六进制>"`。
    pub fn from_parts(modified: SystemTime, size: u64) -> Self {
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            etag: format!("\"{:x}-{:x}\"", secs, size),
            last_modified: format_http_date(modified),
            size,
        }
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 条件请求是否命中。
    ///
    /// 比较采用子串包含：`If-None-Match` 的值包含当前 ETag，
    /// 或 `If-Modified-Since` 的值包含当前 Last-Modified 字符串即视为未修改。
    pub fn is_not_modified(&self, request: &Request) -> bool {
        if let Some(value) = request.header("If-None-Match") {
            if value.contains(&self.etag) {
                return true;
            }
        }
        if let Some(value) = request.header("If-Modified-Since") {
            if value.contains(&self.last_modified) {
                return true;
            }
        }
        false
    }
}

/// RFC 1123 格式的 GMT 时间，例如 `Sun, 06 Nov 1994 08:49:37 GMT`。
pub fn format_http_date(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
