// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的服务器启动器与原始 HTTP 客户端。

#![allow(dead_code)]

use imagecurry::{AccessLog, CompressionJob, Compressor, Config, Server};

use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
};

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

/// 只记录任务、不启动子进程的压缩器。
#[derive(Default)]
pub struct RecordingCompressor {
    jobs: Mutex<Vec<CompressionJob>>,
}

impl RecordingCompressor {
    pub fn jobs(&self) -> Vec<CompressionJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Compressor for RecordingCompressor {
    fn submit(&self, job: CompressionJob) {
        self.jobs.lock().unwrap().push(job);
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub compressor: Arc<RecordingCompressor>,
    stop: Arc<Notify>,
}

impl TestServer {
    /// 在 127.0.0.1 的随机端口上启动服务器，根目录位于临时目录中。
    pub async fn start(config: Config) -> Self {
        let dir = TempDir::new().unwrap();
        let config = config.with_roots(
            dir.path().join("serve").to_str().unwrap(),
            dir.path().join("save").to_str().unwrap(),
        );
        let compressor = Arc::new(RecordingCompressor::default());
        let server = Server::new(config, compressor.clone(), AccessLog::global());
        server.prepare().await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(Notify::new());
        let signal = Arc::clone(&stop);
        tokio::spawn(async move {
            server
                .serve(listener, async move { signal.notified().await })
                .await;
        });

        Self {
            addr,
            dir,
            compressor,
            stop,
        }
    }

    pub fn public_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("serve").join(name)
    }

    pub fn private_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("save").join(name)
    }

    /// 发送原始请求并读取完整响应（服务器在响应后关闭连接）。
    pub async fn send(&self, request: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(request).await.unwrap();

        let mut buffer = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut buffer))
            .await
            .expect("server did not close the connection")
            .unwrap();
        buffer
    }

    pub async fn send_str(&self, request: &str) -> HttpReply {
        HttpReply::parse(&self.send(request.as_bytes()).await)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.notify_one();
    }
}

/// 测试端解析出的响应。
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn parse(raw: &[u8]) -> Self {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|p| p + 4)
            .unwrap_or(raw.len());
        let head = String::from_utf8_lossy(&raw[..split]).into_owned();
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        Self {
            status,
            head,
            body: raw[split..].to_vec(),
        }
    }

    /// 大小写敏感地查找响应头。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            (k == name).then(|| v.trim())
        })
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
