// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 负责将 `RequestReader` 缓冲好的头部字节解析为 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 路径与查询字符串的拆分，以及查询参数的解码。
//! 3. 头部取值。
//!
//! 头部取值沿用子串扫描的语义：在整个头部块中查找 `Name:`，读到下一个 CRLF 为止。
//! 这意味着查找区分大小写、不锚定行首，极少数情况下可能命中其他头部的值内部。
//! 同时提供按行拆分的 `headers()` 视图，供需要结构化访问的调用方使用。

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, error};

use crate::{exception::Exception, param::*, util::url_decode};

/// 请求的查询字符串。
#[derive(Debug, Clone, Default)]
pub struct QueryString {
    raw: String,
    params: HashMap<String, String>,
}

impl QueryString {
    pub fn parse(raw: &str) -> Self {
        let mut params = HashMap::new();
        for pair in raw.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            if key.is_empty() {
                continue;
            }
            // 重复的键以最后一次出现为准
            params.insert(url_decode(key), url_decode(value));
        }
        Self {
            raw: raw.to_string(),
            params,
        }
    }

    /// 结构化取值，值已解码；空值视为缺失。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// 子串扫描取值：在原始查询串中查找第一个 `key=`，读到空格、`&` 或换行为止。
    pub fn find(&self, key: &str) -> Option<String> {
        let search = format!("{}=", key);
        let start = self.raw.find(&search)? + search.len();
        let rest = &self.raw[start..];
        let end = rest.find([' ', '&', '\r', '\n']).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        Some(url_decode(&rest[..end]))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// 一次连接上的完整请求。构造后不再修改，连接关闭时丢弃。
#[derive(Debug, Clone)]
pub struct Request {
    /// 连接序号，仅用于日志追踪
    id: u128,
    method: HttpRequestMethod,
    /// 请求行中方法字段的原文
    method_token: String,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// `?` 之前的部分
    route: String,
    query: QueryString,
    version: HttpVersion,
    /// 原始头部块（含请求行），头部查找在其上进行
    head: String,
    peer: SocketAddr,
    body: Bytes,
}

impl Request {
    /// 从缓冲好的头部字节构建 `Request`。
    ///
    /// # 错误处理
    /// - 头部不是合法 UTF-8：`RequestIsNotUtf8`
    /// - 请求行不是恰好三个字段：`MalformedRequest`
    /// - 版本不是 `HTTP/1.1` 或 `HTTP/1.0`：`UnsupportedHttpVersion`
    pub fn parse(buffer: &[u8], peer: SocketAddr, id: u128) -> Result<Self, Exception> {
        let head = match std::str::from_utf8(buffer) {
            Ok(s) => s.to_string(),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求：头部不是UTF-8", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_line = head.split(CRLF).next().unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method_token = parts[0].to_string();
        let method = HttpRequestMethod::from_token(parts[0]);

        let version = match parts[2] {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let path = parts[1].to_string();
        let (route, query) = match path.split_once('?') {
            Some((r, q)) => (r.to_string(), QueryString::parse(q)),
            None => (path.clone(), QueryString::default()),
        };
        debug!(
            "[ID{}]请求行解析完毕：{} {} {}",
            id, method_token, path, version
        );

        Ok(Self {
            id,
            method,
            method_token,
            path,
            route,
            query,
            version,
            head,
            peer,
            body: Bytes::new(),
        })
    }

    /// 附加读取完毕的请求体。
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// 子串扫描取头部值：`name` 区分大小写，值去掉首尾空白。
    pub fn header(&self, name: &str) -> Option<&str> {
        let search = format!("{}:", name);
        let start = self.head.find(&search)? + search.len();
        let rest = &self.head[start..];
        let end = rest.find(CRLF).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }

    /// 按行拆分的头部视图（不含请求行），名称保持原样。
    pub fn headers(&self) -> Vec<(&str, &str)> {
        self.head
            .split(CRLF)
            .skip(1)
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
            .collect()
    }

    /// `Content-Length` 的值。
    ///
    /// 只取值开头的十进制数字；没有数字时视为 0，溢出时视为无穷大。
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length").map(parse_leading_digits)
    }
}

fn parse_leading_digits(value: &str) -> u64 {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().unwrap_or(u64::MAX)
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 请求行中方法字段的原文，用于日志
    pub fn method_token(&self) -> &str {
        &self.method_token
    }

    /// 请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 不含查询字符串的路径
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn query(&self) -> &QueryString {
        &self.query
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.7:51234".parse().unwrap()
    }

    fn parse(raw: &str) -> Result<Request, Exception> {
        Request::parse(raw.as_bytes(), peer(), 0)
    }

    #[test]
    fn test_parse_get_request() {
        let request = parse("GET /retrieve?name=a.png HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/retrieve?name=a.png");
        assert_eq!(request.route(), "/retrieve");
        assert_eq!(request.query().get("name"), Some("a.png"));
        assert_eq!(request.version(), HttpVersion::V1_1);
        assert_eq!(request.peer(), peer());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_http_1_0() {
        let request = parse("HEAD /retrieve?name=a.png HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.version(), HttpVersion::V1_0);
    }

    #[test]
    fn test_parse_options_request() {
        let request = parse("OPTIONS * HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Options);
        assert_eq!(request.path(), "*");
    }

    #[test]
    fn test_unknown_method_is_other() {
        let request = parse("DELETE /retrieve HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Other);
        assert_eq!(request.method_token(), "DELETE");
    }

    #[test]
    fn test_request_line_token_count() {
        assert_eq!(
            parse("GET /\r\n\r\n").unwrap_err(),
            Exception::MalformedRequest
        );
        assert_eq!(
            parse("GET / a b HTTP/1.1\r\n\r\n").unwrap_err(),
            Exception::MalformedRequest
        );
        assert_eq!(parse("\r\n\r\n").unwrap_err(), Exception::MalformedRequest);
    }

    #[test]
    fn test_unsupported_http_version() {
        for version in ["HTTP/2.0", "HTTP/999.999", "http/1.1", "INVALID"] {
            let raw = format!("GET / {}\r\n\r\n", version);
            assert_eq!(parse(&raw).unwrap_err(), Exception::UnsupportedHttpVersion);
        }
    }

    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD, b'\r', b'\n', b'\r', b'\n'];
        let result = Request::parse(&buffer, peer(), 0);
        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    #[test]
    fn test_header_substring_lookup() {
        let request = parse(
            "POST /upload HTTP/1.1\r\nContent-Type: image/png; q=1\r\nContent-Length:  42 \r\n\r\n",
        )
        .unwrap();
        assert_eq!(request.header("Content-Type"), Some("image/png; q=1"));
        assert_eq!(request.header("Content-Length"), Some("42"));
        assert_eq!(request.content_length(), Some(42));
        assert_eq!(request.header("If-None-Match"), None);
    }

    #[test]
    fn test_header_lookup_is_case_sensitive() {
        let request = parse("POST /upload HTTP/1.1\r\ncontent-length: 5\r\n\r\n").unwrap();
        assert_eq!(request.content_length(), None);
    }

    #[test]
    fn test_header_lookup_not_anchored() {
        // 子串扫描会命中其他头部值内部的文本
        let request = parse("GET / HTTP/1.1\r\nX-Note: ETag: \"abc\"\r\n\r\n").unwrap();
        assert_eq!(request.header("ETag"), Some("\"abc\""));
    }

    #[test]
    fn test_structured_headers() {
        let request = parse("GET / HTTP/1.1\r\nHost: localhost\r\nX-A: 1:2\r\n\r\n").unwrap();
        let headers = request.headers();
        assert_eq!(headers, vec![("Host", "localhost"), ("X-A", "1:2")]);
    }

    #[test]
    fn test_content_length_leading_digits() {
        assert_eq!(parse_leading_digits("12abc"), 12);
        assert_eq!(parse_leading_digits("abc"), 0);
        assert_eq!(parse_leading_digits("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_query_last_wins_and_decoding() {
        let query = QueryString::parse("name=a.png&x=1&name=b%2Epng");
        assert_eq!(query.get("name"), Some("b.png"));
        assert_eq!(query.get("x"), Some("1"));
        assert_eq!(query.get("missing"), None);
    }

    #[test]
    fn test_query_empty_value_is_missing() {
        let query = QueryString::parse("name=&x=1");
        assert_eq!(query.get("name"), None);
        assert_eq!(query.find("name"), None);
    }

    #[test]
    fn test_query_substring_scan() {
        let query = QueryString::parse("filename=x.png&name=y.png");
        // 子串扫描命中的是 `filename=` 中的 `name=`
        assert_eq!(query.find("name"), Some("x.png".to_string()));
        assert_eq!(query.get("name"), Some("y.png"));
    }

    #[test]
    fn test_with_body() {
        let request = parse("POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\n")
            .unwrap()
            .with_body(Bytes::from_static(b"hello"));
        assert_eq!(request.body().as_ref(), b"hello");
    }
}
