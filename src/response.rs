//! # HTTP 响应构建模块
//!
//! 所有响应都是 `HTTP/1.1`，都携带完整的 CORS 头部集合和 `Connection: close`。
//! 文件内容不经过 `Response`：取回时先发送响应头，再由存储层分块写出文件。

use crate::{
    exception::Exception,
    param::*,
    util::HtmlBuilder,
    validator::{format_http_date, CacheValidator},
};

use bytes::Bytes;
use log::{debug, error};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use std::{io, time::SystemTime};

#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    information: String,
    content_type: Option<String>,
    /// 204 与 304 不发送 Content-Length
    content_length: Option<u64>,
    date: SystemTime,
    server_name: String,
    etag: Option<String>,
    last_modified: Option<String>,
    cache_control: Option<&'static str>,
    content: Option<Bytes>,
}

impl Response {
    fn with_code(code: u16) -> Self {
        let information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Error".to_string()
            }
        };
        Self {
            status_code: code,
            information,
            content_type: None,
            content_length: None,
            date: SystemTime::now(),
            server_name: SERVER_NAME.to_string(),
            etag: None,
            last_modified: None,
            cache_control: None,
            content: None,
        }
    }

    /// CORS 预检应答：204，无响应体。
    pub fn preflight() -> Self {
        Self::with_code(204)
    }

    /// 由异常生成错误页面。
    pub fn from_exception(exception: Exception) -> Self {
        let code = exception.status_code();
        let html = HtmlBuilder::from_status_code(code, exception.message()).build();
        let mut response = Self::with_code(code);
        response.content_type = Some("text/html".to_string());
        response.content_length = Some(html.len() as u64);
        response.content = Some(Bytes::from(html));
        response
    }

    /// 304：只带校验值与缓存策略。
    pub fn not_modified(validator: &CacheValidator) -> Self {
        let mut response = Self::with_code(304);
        response.set_validator(validator);
        response
    }

    /// 200 文件响应头；文件内容由调用方随后流式写出。
    pub fn from_file(validator: &CacheValidator, mime: &str) -> Self {
        let mut response = Self::with_code(200);
        response.content_type = Some(mime.to_string());
        response.content_length = Some(validator.size());
        response.set_validator(validator);
        response
    }

    /// 200 JSON 响应。
    pub fn json(value: &serde_json::Value) -> Self {
        let body = value.to_string();
        let mut response = Self::with_code(200);
        response.content_type = Some("application/json".to_string());
        response.content_length = Some(body.len() as u64);
        response.content = Some(Bytes::from(body));
        response
    }

    fn set_validator(&mut self, validator: &CacheValidator) {
        self.etag = Some(validator.etag().to_string());
        self.last_modified = Some(validator.last_modified().to_string());
        self.cache_control = Some(CACHE_CONTROL);
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "HTTP/1.1 {} {}{}",
            self.status_code, self.information, CRLF
        );

        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(len) = self.content_length {
            header.push_str(&format!("Content-Length: {}{}", len, CRLF));
        }
        if let Some(etag) = &self.etag {
            header.push_str(&["ETag: ", etag, CRLF].concat());
        }
        if let Some(modified) = &self.last_modified {
            header.push_str(&["Last-Modified: ", modified, CRLF].concat());
        }
        if let Some(cache_control) = self.cache_control {
            header.push_str(&["Cache-Control: ", cache_control, CRLF].concat());
        }
        for &(name, value) in CORS_HEADERS.iter() {
            header.push_str(&[name, ": ", value, CRLF].concat());
        }
        header.push_str(&["Date: ", &format_http_date(self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        header.push_str(&["Connection: close", CRLF, CRLF].concat());

        let mut bytes = header.into_bytes();
        if let Some(content) = &self.content {
            bytes.extend_from_slice(content);
        }
        bytes
    }

    /// 写出整个响应（头部及内存中的响应体）。
    pub async fn write_to<W>(&self, stream: &mut W, id: u128) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.as_bytes();
        debug!("[ID{}]发送响应，状态码{}，长度{}", id, self.status_code, bytes.len());
        stream.write_all(&bytes).await?;
        stream.flush().await
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}
