// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了上传/取回服务器在请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了报文接收、协议解析、参数校验以及文件系统写入等阶段。
//! - **语义映射**：每个变体都对应一个确定的 HTTP 状态码与返回给客户端的提示文本。
//! - **就地处理**：异常在检测点被转换为错误响应并记录日志，不会继续向上传播，也不会重试。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求行无法拆分为恰好三个字段（方法、路径、版本）。
    MalformedRequest,
    /// 请求头部分不是合法的 UTF-8。
    RequestIsNotUtf8,
    /// 协议版本既不是 `HTTP/1.1` 也不是 `HTTP/1.0`。
    UnsupportedHttpVersion,
    /// 在头部缓冲区写满之前没有找到 `\r\n\r\n`。
    HeaderTooLarge,
    /// 缺少 `name` 查询参数，或其值为空。
    MissingParameter,
    /// 文件名未通过校验（路径穿越、非法字符、超长等）。
    InvalidFilename,
    /// 方法受支持，但路径不是该方法对应的端点。
    InvalidPath,
    /// 旧版上传模式下，调用方提供的文件名缺少扩展名。
    MissingExtension,
    /// `Content-Length` 或实际请求体超过允许的最大值。
    PayloadTooLarge,
    /// 公共目录下不存在所请求的文件。
    FileNotFound,
    /// 文件存在但无法打开读取。
    FileOpenFailed,
    /// 无法创建临时文件。
    CreateFailed,
    /// 写入临时文件失败。
    WriteFailed,
    /// 临时文件重命名为最终文件失败。
    RenameFailed,
    /// 读取套接字时发生错误。
    ReceiveError,
    /// 对端在请求接收完整之前关闭了连接。
    ConnectionClosed,
    /// 超过了连接的接收截止时间。
    ReceiveTimeout,
    /// 未实现的 HTTP 方法。
    MethodNotImplemented,
}

use Exception::*;

impl Exception {
    /// 该异常映射到的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            MalformedRequest | RequestIsNotUtf8 | UnsupportedHttpVersion | HeaderTooLarge
            | MissingParameter | InvalidFilename | InvalidPath | MissingExtension => 400,
            FileNotFound => 404,
            PayloadTooLarge => 413,
            FileOpenFailed | CreateFailed | WriteFailed | RenameFailed => 500,
            MethodNotImplemented => 501,
            // 接收阶段的失败不会产生响应，这里的值仅用于日志
            ReceiveError | ConnectionClosed | ReceiveTimeout => 0,
        }
    }

    /// 写入错误页面的提示文本。
    pub fn message(&self) -> &'static str {
        match self {
            MalformedRequest | RequestIsNotUtf8 => "Malformed request",
            UnsupportedHttpVersion => "Invalid HTTP version",
            HeaderTooLarge => "Headers too large or malformed",
            MissingParameter => "Missing 'name' parameter",
            InvalidFilename => "Invalid filename",
            InvalidPath => "Invalid path",
            MissingExtension => "Filename must have extension",
            PayloadTooLarge => "Payload Too Large",
            FileNotFound => "File not found",
            FileOpenFailed => "Internal server error",
            CreateFailed => "Failed to create file",
            WriteFailed => "Write failed",
            RenameFailed => "Failed to save file",
            ReceiveError => "Receive error",
            ConnectionClosed => "Connection closed",
            ReceiveTimeout => "Receive timeout",
            MethodNotImplemented => "Method not implemented",
        }
    }

    /// 是否应当向客户端发送错误响应。
    ///
    /// 接收阶段的失败意味着对端已不可用，只记录日志。
    pub fn is_responsive(&self) -> bool {
        !matches!(self, ReceiveError | ConnectionClosed | ReceiveTimeout)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedRequest => write!(f, "Request line is malformed"),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            HeaderTooLarge => write!(f, "Header block exceeds the buffer limit"),
            MissingParameter => write!(f, "Missing query parameter (400)"),
            InvalidFilename => write!(f, "Invalid filename (400)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            MissingExtension => write!(f, "Filename has no extension (400)"),
            PayloadTooLarge => write!(f, "Payload too large (413)"),
            FileNotFound => write!(f, "File not found (404)"),
            FileOpenFailed => write!(f, "Couldn't open file for reading"),
            CreateFailed => write!(f, "Couldn't create temporary file"),
            WriteFailed => write!(f, "Couldn't write temporary file"),
            RenameFailed => write!(f, "Couldn't rename temporary file"),
            ReceiveError => write!(f, "Socket receive error"),
            ConnectionClosed => write!(f, "Connection closed by peer"),
            ReceiveTimeout => write!(f, "Receive deadline exceeded"),
            MethodNotImplemented => write!(f, "Method not implemented (501)"),
        }
    }
}
