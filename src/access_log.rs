// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问日志
//!
//! 每个有意义的事件（请求完成、上传保存、后台压缩失败）都记为一行：
//!
//! ```text
//! [2026-01-01 12:00:00] INFO  | 10.0.0.7:51234 | GET /retrieve | 200 | Served a.webp
//! [2026-01-01 12:00:01] ERROR | SYSTEM | Compressor script not found
//! ```
//!
//! 时间戳与级别由 log4rs 的 pattern 负责，这里只拼接消息本身。
//! 日志的去向通过 `sink` 注入，生产环境使用全局 logger，测试中使用内存 logger。

use log::{Level, Log, Metadata, Record};

use std::net::SocketAddr;

/// 访问日志使用的 target，log4rs 据此将其路由到文件 appender
pub const ACCESS_TARGET: &str = "imagecurry::access";

#[derive(Clone, Copy)]
pub struct AccessLog {
    sink: &'static dyn Log,
}

impl AccessLog {
    pub fn new(sink: &'static dyn Log) -> Self {
        Self { sink }
    }

    /// 写入 `log` 的全局 logger。
    pub fn global() -> Self {
        Self::new(log::logger())
    }

    /// 与某个客户端请求相关的一行日志。
    pub fn client(
        &self,
        level: Level,
        peer: SocketAddr,
        method: &str,
        path: &str,
        status: u16,
        message: &str,
    ) {
        let line = format!(
            "{}:{} | {} {} | {} | {}",
            peer.ip(),
            peer.port(),
            method,
            path,
            status,
            message
        );
        self.emit(level, &line);
    }

    /// 与具体客户端无关的系统事件。
    pub fn system(&self, level: Level, message: &str) {
        self.emit(level, &format!("SYSTEM | {}", message));
    }

    fn emit(&self, level: Level, line: &str) {
        let metadata = Metadata::builder()
            .level(level)
            .target(ACCESS_TARGET)
            .build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("{}", line))
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }
}

impl std::fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessLog")
    }
}


#[cfg(test)]
mod tests {
    use super::capture::CaptureLog;
    use super::*;

    #[test]
    fn test_client_line() {
        let capture = CaptureLog::leak();
        let log = AccessLog::new(capture);

        log.client(
            Level::Info,
            "10.0.0.7:51234".parse().unwrap(),
            "GET",
            "/retrieve",
            200,
            "Served a.webp",
        );

        assert_eq!(
            capture.lines(),
            vec![(
                Level::Info,
                "10.0.0.7:51234 | GET /retrieve | 200 | Served a.webp".to_string()
            )]
        );
    }

    #[test]
    fn test_system_line() {
        let capture = CaptureLog::leak();
        let log = AccessLog::new(capture);

        log.system(Level::Error, "Compressor script not found");

        assert_eq!(
            capture.lines(),
            vec![(
                Level::Error,
                "SYSTEM | Compressor script not found".to_string()
            )]
        );
    }

    #[test]
    fn test_ipv6_peer() {
        let capture = CaptureLog::leak();
        AccessLog::new(capture).client(
            Level::Warn,
            "[::1]:8080".parse().unwrap(),
            "POST",
            "/upload",
            413,
            "Payload Too Large",
        );
        assert_eq!(
            capture.lines()[0].1,
            "::1:8080 | POST /upload | 413 | Payload Too Large"
        );
    }
}
