// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理
//!
//! 每个 TCP 连接由一个独立的 tokio 任务处理，依次经过：
//! 接收头部 -> 解析 -> 路由 -> 接收请求体 -> 分发 -> 关闭连接。
//! 一个连接只处理一个请求。

use log::{debug, error, info, warn, Level};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::{timeout_at, Instant},
};

use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    access_log::AccessLog,
    compressor::Compressor,
    config::Config,
    exception::Exception,
    reader::RequestReader,
    request::Request,
    response::Response,
    router::{route, Dispatcher, Route},
};

const LINGER_TIMEOUT: Duration = Duration::from_secs(2);
const LINGER_LIMIT: usize = 256 * 1024;

pub struct Server {
    dispatcher: Arc<Dispatcher>,
    active_connection: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(config: Config, compressor: Arc<dyn Compressor>, access_log: AccessLog) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(config), compressor, access_log)),
            active_connection: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// 当前活跃连接数的共享计数器。
    pub fn active_connection(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_connection)
    }

    /// 创建根目录。根目录不可用时服务器无法工作，由调用方决定是否退出。
    pub async fn prepare(&self) -> io::Result<()> {
        self.dispatcher.storage().ensure_roots().await?;
        info!(
            "公共目录：{}，私有目录：{}",
            self.dispatcher.storage().public_root().display(),
            self.dispatcher.storage().private_root().display()
        );
        Ok(())
    }

    /// 持续接收新连接，直到 `shutdown` 完成。
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut id: u128 = 0;

        loop {
            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("主循环接收到停机指令，正在退出...");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败: {}", e);
                        continue;
                    }
                },
            };
            debug!("[ID{}]TCP连接已建立：{}", id, addr);

            let dispatcher = Arc::clone(&self.dispatcher);
            let active_connection = Arc::clone(&self.active_connection);
            tokio::spawn(async move {
                active_connection.fetch_add(1, Ordering::SeqCst);
                let mut stream = stream;
                handle_connection(&dispatcher, &mut stream, addr, id).await;
                linger_close(&mut stream, id).await;
                active_connection.fetch_sub(1, Ordering::SeqCst);
            });
            id += 1;
        }
    }
}

/// 关闭写端后丢弃对端仍在发送的数据，直到对端关闭或超时。
///
/// 接收缓冲区残留未读数据时直接关闭会触发 RST。
async fn linger_close<S>(stream: &mut S, id: u128)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭写端失败: {}", id, e);
        return;
    }
    let mut sink = [0u8; 4096];
    let mut drained = 0usize;
    let deadline = Instant::now() + LINGER_TIMEOUT;
    while drained < LINGER_LIMIT {
        match timeout_at(deadline, stream.read(&mut sink)).await {
            Ok(Ok(n)) if n > 0 => drained += n,
            _ => break,
        }
    }
}

/// 处理单个连接上的唯一一个请求。
pub async fn handle_connection<S>(
    dispatcher: &Dispatcher,
    stream: &mut S,
    peer: SocketAddr,
    id: u128,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = dispatcher.config();
    let start_time = std::time::Instant::now();
    let deadline = Instant::now() + Duration::from_secs(config.receive_timeout_secs());
    let reader = RequestReader::new(
        id,
        deadline,
        config.max_header_size(),
        config.max_request_size(),
    );

    let head = match reader.read_head(stream).await {
        Ok(head) => head,
        Err(e) => return fail(dispatcher, stream, peer, id, None, e).await,
    };

    let request = match Request::parse(&head.head, peer, id) {
        Ok(req) => req,
        Err(e) => return fail(dispatcher, stream, peer, id, None, e).await,
    };
    debug!(
        "[ID{}]成功解析HTTP请求：{} {}，头部：{:?}",
        id,
        request.method_token(),
        request.path(),
        request.headers()
    );

    let route = match route(&request, config) {
        Ok(r) => r,
        Err(e) => return fail(dispatcher, stream, peer, id, Some(&request), e).await,
    };
    debug!("[ID{}]HTTP路由解析完毕：{:?}", id, route);

    let request = if route.reads_body() {
        let content_length = request.content_length().unwrap_or(0);
        match reader.read_body(stream, head.leftover, content_length).await {
            Ok(body) => request.with_body(body),
            Err(e) => return fail(dispatcher, stream, peer, id, Some(&request), e).await,
        }
    } else {
        request
    };

    let outcome = match dispatcher.dispatch(&route, &request, stream).await {
        Ok(outcome) => outcome,
        Err(e) => return fail(dispatcher, stream, peer, id, Some(&request), e).await,
    };

    debug!(
        "[ID{}]请求处理完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    let method = if route == Route::Preflight {
        "OPTIONS"
    } else {
        request.method_token()
    };
    let path = if route == Route::Preflight { "*" } else { request.path() };
    dispatcher.access_log().client(
        level_for(outcome.status),
        peer,
        method,
        path,
        outcome.status,
        &outcome.message,
    );
}

/// 将异常转换为错误响应并写一行访问日志。接收阶段的失败不发送响应，只写日志。
async fn fail<S>(
    dispatcher: &Dispatcher,
    stream: &mut S,
    peer: SocketAddr,
    id: u128,
    request: Option<&Request>,
    exception: Exception,
) where
    S: AsyncWrite + Unpin,
{
    let (method, path) = match request {
        Some(r) => (r.method_token(), r.path()),
        None => ("-", "-"),
    };

    if !exception.is_responsive() {
        warn!("[ID{}]{}：{}，不发送响应", id, peer, exception);
        // 状态码记为 0，表示没有发出任何响应
        dispatcher.access_log().client(
            Level::Warn,
            peer,
            method,
            path,
            0,
            exception.message(),
        );
        return;
    }

    warn!("[ID{}]{}，返回{}", id, exception, exception.status_code());
    let response = Response::from_exception(exception);
    if let Err(e) = response.write_to(stream, id).await {
        error!("[ID{}]发送错误响应失败: {}", id, e);
    }

    dispatcher.access_log().client(
        level_for(exception.status_code()),
        peer,
        method,
        path,
        exception.status_code(),
        exception.message(),
    );
}

fn level_for(status: u16) -> Level {
    match status {
        500.. => Level::Error,
        400.. => Level::Warn,
        _ => Level::Info,
    }
}
