// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由与分发
//!
//! ## 路由规则
//! 1. `OPTIONS` -> 无论路径如何，一律回复 204 预检响应。
//! 2. `GET` / `HEAD` + 取回端点 -> 需要合法的 `name` 查询参数。
//! 3. `POST` + 上传端点 -> 上传；旧版模式下还需要带扩展名的 `name`。
//! 4. 受支持的方法但路径不对 -> 400；其他方法 -> 501。
//!
//! 路由只依赖请求行与头部，在读取请求体之前完成。

use bytes::Bytes;
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::io::AsyncWrite;

use std::{path::Path, sync::Arc};

use crate::{
    access_log::AccessLog,
    compressor::{CompressionJob, Compressor},
    config::{Config, QueryLookup, UploadMode},
    exception::Exception,
    identifier::generate_identifier,
    mime::{content_type_for, detect_upload_extension},
    param::HttpRequestMethod,
    request::Request,
    response::Response,
    storage::{stream_file, Storage},
    util::{format_file_size, valid_filename},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Preflight,
    Retrieve { name: String, head_only: bool },
    /// `name` 仅在旧版上传模式下存在
    Upload { name: Option<String> },
}

impl Route {
    /// 该路由是否需要读取请求体。
    pub fn reads_body(&self) -> bool {
        !matches!(self, Route::Preflight)
    }
}

pub fn route(request: &Request, config: &Config) -> Result<Route, Exception> {
    let id = request.id();
    match request.method() {
        HttpRequestMethod::Options => Ok(Route::Preflight),
        HttpRequestMethod::Get | HttpRequestMethod::Head => {
            if request.route() != config.retrieve_endpoint() {
                warn!("[ID{}]请求的路径：{} 不是取回端点", id, request.route());
                return Err(Exception::InvalidPath);
            }
            let name = required_name(request, config)?;
            Ok(Route::Retrieve {
                name,
                head_only: request.method() == HttpRequestMethod::Head,
            })
        }
        HttpRequestMethod::Post => {
            if request.route() != config.upload_endpoint() {
                warn!("[ID{}]请求的路径：{} 不是上传端点", id, request.route());
                return Err(Exception::InvalidPath);
            }
            match config.upload_mode() {
                UploadMode::Identifier => Ok(Route::Upload { name: None }),
                UploadMode::Legacy => {
                    let name = required_name(request, config)?;
                    if Path::new(&name).extension().is_none() {
                        warn!("[ID{}]文件名{}缺少扩展名", id, name);
                        return Err(Exception::MissingExtension);
                    }
                    Ok(Route::Upload { name: Some(name) })
                }
            }
        }
        HttpRequestMethod::Other => {
            warn!("[ID{}]未实现的请求方法：{}", id, request.method_token());
            Err(Exception::MethodNotImplemented)
        }
    }
}

fn required_name(request: &Request, config: &Config) -> Result<String, Exception> {
    let name = match config.query_lookup() {
        QueryLookup::Structured => request.query().get("name").map(str::to_string),
        QueryLookup::Scan => request.query().find("name"),
    };
    let name = match name {
        Some(n) => n,
        None => return Err(Exception::MissingParameter),
    };
    if !valid_filename(&name) {
        warn!("[ID{}]非法的文件名：{:?}", request.id(), name);
        return Err(Exception::InvalidFilename);
    }
    Ok(name)
}

/// 一次分发的结果：已发送的状态码与写入访问日志的说明。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: u16,
    pub message: String,
}

impl Outcome {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// 请求分发器，持有处理请求所需的全部协作者。
pub struct Dispatcher {
    config: Arc<Config>,
    storage: Storage,
    compressor: Arc<dyn Compressor>,
    access_log: AccessLog,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        compressor: Arc<dyn Compressor>,
        access_log: AccessLog,
    ) -> Self {
        let storage = Storage::new(config.public_root(), config.private_root());
        Self {
            config,
            storage,
            compressor,
            access_log,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn access_log(&self) -> AccessLog {
        self.access_log
    }

    /// 执行路由对应的操作并写出响应。
    ///
    /// 返回 `Err` 时尚未向客户端写出任何字节，调用方负责发送错误响应。
    pub async fn dispatch<S>(
        &self,
        route: &Route,
        request: &Request,
        stream: &mut S,
    ) -> Result<Outcome, Exception>
    where
        S: AsyncWrite + Unpin,
    {
        match route {
            Route::Preflight => {
                send(Response::preflight(), stream, request.id()).await;
                Ok(Outcome::new(204, "Preflight"))
            }
            Route::Retrieve { name, head_only } => {
                self.retrieve(request, name, *head_only, stream).await
            }
            Route::Upload { name } => {
                let (response, message) = self.upload(request, name.as_deref()).await?;
                let outcome = Outcome::new(response.status_code(), message);
                send(response, stream, request.id()).await;
                Ok(outcome)
            }
        }
    }

    /// 取回公共目录中的文件。只有 GET 会检查条件请求头。
    async fn retrieve<S>(
        &self,
        request: &Request,
        name: &str,
        head_only: bool,
        stream: &mut S,
    ) -> Result<Outcome, Exception>
    where
        S: AsyncWrite + Unpin,
    {
        let id = request.id();
        let validator = self.storage.stat_public(name, id).await?;

        if !head_only && validator.is_not_modified(request) {
            debug!("[ID{}]{}未修改，返回304", id, name);
            send(Response::not_modified(&validator), stream, id).await;
            return Ok(Outcome::new(304, format!("Not modified {}", name)));
        }

        let mime = content_type_for(name);
        debug!("[ID{}]MIME类型: {}", id, mime);

        if head_only {
            send(Response::from_file(&validator, mime), stream, id).await;
            return Ok(Outcome::new(200, format!("Metadata for {}", name)));
        }

        // 响应头取自打开后的文件，与实际发送的字节一致
        let (mut file, opened) = self.storage.open_public(name, id).await?;
        if !send(Response::from_file(&opened, mime), stream, id).await {
            return Ok(Outcome::new(200, format!("Header send failed for {}", name)));
        }
        match stream_file(&mut file, stream, self.config.chunk_size()).await {
            Ok(sent) => {
                debug!("[ID{}]流式传输完成，共发送 {} 字节", id, sent);
                Ok(Outcome::new(200, format!("Served {}", name)))
            }
            Err(e) => {
                error!("[ID{}]流式写入失败: {}", id, e);
                Ok(Outcome::new(200, format!("Transfer aborted for {}", name)))
            }
        }
    }

    /// 保存上传的原始文件并提交压缩任务。
    ///
    /// 响应在压缩完成之前发出，其中的派生文件名可能暂时取不到。
    async fn upload(
        &self,
        request: &Request,
        legacy_name: Option<&str>,
    ) -> Result<(Response, String), Exception> {
        let id = request.id();
        let body: &Bytes = request.body();
        if body.len() as u64 > self.config.max_request_size() {
            return Err(Exception::PayloadTooLarge);
        }

        let (stored_name, stem) = match legacy_name {
            Some(name) => {
                let stem = Path::new(name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name)
                    .to_string();
                (name.to_string(), stem)
            }
            None => {
                let identifier = generate_identifier();
                let extension = detect_upload_extension(request.header("Content-Type"), body);
                (format!("{}{}", identifier, extension), identifier)
            }
        };
        let derived_name = format!("{}.{}", stem, self.config.derived_extension());

        let input = self.storage.private_path(&stored_name);
        self.storage.write_atomic(&input, body, id).await?;

        self.compressor.submit(CompressionJob {
            id,
            input,
            output: self.storage.public_path(&derived_name),
        });

        info!(
            "[ID{}]已保存{}（{}），派生文件：{}",
            id,
            stored_name,
            format_file_size(body.len() as u64),
            derived_name
        );
        let message = format!(
            "Uploaded {} bytes to save directory as {}, compressing to {}",
            body.len(),
            stored_name,
            derived_name
        );

        Ok((Response::json(&json!({ "name": derived_name })), message))
    }
}

/// 写出响应；失败只记录日志，返回是否成功。
async fn send<S>(response: Response, stream: &mut S, id: u128) -> bool
where
    S: AsyncWrite + Unpin,
{
    match response.write_to(stream, id).await {
        Ok(()) => true,
        Err(e) => {
            error!("[ID{}]发送响应失败: {}", id, e);
            false
        }
    }
}
