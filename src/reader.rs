// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求接收模块
//!
//! 从套接字中分两个阶段读取一个请求：
//! 1. 头部阶段：读到 `\r\n\r\n` 为止，缓冲区有固定上限。
//! 2. 请求体阶段：按 `Content-Length` 精确读取，头部阶段多读的字节作为请求体的开头。
//!
//! 所有读操作共享同一个截止时间，该时间在连接建立时确定，不随每次读取刷新。

use bytes::Bytes;
use log::{debug, error, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::{timeout_at, Instant},
};

use std::io::ErrorKind;

use crate::{exception::Exception, param::HEADER_TERMINATOR};

const READ_CHUNK: usize = 64 * 1024;
/// 收到请求体字节之前最多预留的容量，其余部分随数据到达再增长。
const INITIAL_BODY_RESERVE: usize = READ_CHUNK * 16;

/// 请求头部块与头部之后已读到的字节。
#[derive(Debug)]
pub struct RequestHead {
    pub head: Vec<u8>,
    pub leftover: Vec<u8>,
}

pub struct RequestReader {
    id: u128,
    deadline: Instant,
    max_header_size: usize,
    max_request_size: u64,
}

impl RequestReader {
    pub fn new(id: u128, deadline: Instant, max_header_size: usize, max_request_size: u64) -> Self {
        Self {
            id,
            deadline,
            max_header_size,
            max_request_size,
        }
    }

    /// 读取头部块。
    ///
    /// 缓冲区达到上限仍未出现终止符时返回 `HeaderTooLarge`。
    pub async fn read_head<S>(&self, stream: &mut S) -> Result<RequestHead, Exception>
    where
        S: AsyncRead + Unpin,
    {
        let mut buffer: Vec<u8> = Vec::with_capacity(1024);
        let mut chunk = vec![0u8; self.max_header_size.max(1)];
        // 只在新到达的字节附近查找终止符
        let mut scanned = 0usize;

        loop {
            let room = self.max_header_size.saturating_sub(buffer.len());
            if room == 0 {
                warn!(
                    "[ID{}]头部超过{}字节仍未结束",
                    self.id, self.max_header_size
                );
                return Err(Exception::HeaderTooLarge);
            }

            let n = self.read_some(stream, &mut chunk[..room]).await?;
            buffer.extend_from_slice(&chunk[..n]);

            let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
            if let Some(pos) = find_terminator(&buffer[from..]) {
                let end = from + pos + HEADER_TERMINATOR.len();
                let leftover = buffer.split_off(end);
                debug!(
                    "[ID{}]头部接收完毕，{}字节，另有{}字节属于请求体",
                    self.id,
                    buffer.len(),
                    leftover.len()
                );
                return Ok(RequestHead {
                    head: buffer,
                    leftover,
                });
            }
            scanned = buffer.len();
        }
    }

    /// 读取恰好 `content_length` 字节的请求体。
    ///
    /// 长度超过上限时在读取任何字节之前返回 `PayloadTooLarge`。
    pub async fn read_body<S>(
        &self,
        stream: &mut S,
        leftover: Vec<u8>,
        content_length: u64,
    ) -> Result<Bytes, Exception>
    where
        S: AsyncRead + Unpin,
    {
        if content_length > self.max_request_size {
            warn!(
                "[ID{}]Content-Length {} 超过上限 {}",
                self.id, content_length, self.max_request_size
            );
            return Err(Exception::PayloadTooLarge);
        }
        let expected = content_length as usize;

        let mut body = leftover;
        if body.len() > expected {
            debug!(
                "[ID{}]丢弃请求体之后的{}字节",
                self.id,
                body.len() - expected
            );
            body.truncate(expected);
        }
        body.reserve(initial_reserve(expected - body.len()));

        let mut chunk = vec![0u8; READ_CHUNK.min(expected.max(1))];
        while body.len() < expected {
            let want = (expected - body.len()).min(chunk.len());
            let n = self.read_some(stream, &mut chunk[..want]).await?;
            body.extend_from_slice(&chunk[..n]);
        }
        debug!("[ID{}]请求体接收完毕，{}字节", self.id, body.len());
        Ok(Bytes::from(body))
    }

    /// 在截止时间内完成一次读取，返回读到的字节数（总是大于 0）。
    async fn read_some<S>(&self, stream: &mut S, buf: &mut [u8]) -> Result<usize, Exception>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            match timeout_at(self.deadline, stream.read(buf)).await {
                Err(_) => {
                    warn!("[ID{}]接收超时", self.id);
                    return Err(Exception::ReceiveTimeout);
                }
                Ok(Ok(0)) => {
                    debug!("[ID{}]对端提前关闭了连接", self.id);
                    return Err(Exception::ConnectionClosed);
                }
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue
                }
                Ok(Err(e)) => {
                    error!("[ID{}]读取TCPStream时遇到错误: {}", self.id, e);
                    return Err(Exception::ReceiveError);
                }
            }
        }
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

fn initial_reserve(remaining: usize) -> usize {
    remaining.min(INITIAL_BODY_RESERVE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt};

    fn reader(max_header: usize, max_request: u64) -> RequestReader {
        RequestReader::new(
            0,
            Instant::now() + Duration::from_secs(5),
            max_header,
            max_request,
        )
    }

    #[tokio::test]
    async fn test_read_head_splits_leftover() {
        let (mut client, mut server) = duplex(4096);
        client
            .write_all(b"POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel")
            .await
            .unwrap();

        let head = reader(8192, 1024).read_head(&mut server).await.unwrap();
        assert!(head.head.ends_with(b"\r\n\r\n"));
        assert_eq!(head.leftover, b"hel");
    }

    #[tokio::test]
    async fn test_read_head_terminator_across_reads() {
        let (mut client, mut server) = duplex(4096);
        let task = tokio::spawn(async move {
            client.write_all(b"GET / HTTP/1.1\r\nHost: x\r").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.write_all(b"\n\r\n").await.unwrap();
            client
        });

        let head = reader(8192, 1024).read_head(&mut server).await.unwrap();
        assert_eq!(head.head, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(head.leftover.is_empty());
        drop(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_head_too_large() {
        let (mut client, mut server) = duplex(64 * 1024);
        let junk = format!("GET / HTTP/1.1\r\nX-Pad: {}", "a".repeat(10_000));
        client.write_all(junk.as_bytes()).await.unwrap();

        let result = reader(8192, 1024).read_head(&mut server).await;
        assert_eq!(result.unwrap_err(), Exception::HeaderTooLarge);
    }

    #[tokio::test]
    async fn test_read_head_connection_closed() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        drop(client);

        let result = reader(8192, 1024).read_head(&mut server).await;
        assert_eq!(result.unwrap_err(), Exception::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_read_head_timeout() {
        let (_client, mut server) = duplex(1024);
        let reader = RequestReader::new(0, Instant::now() + Duration::from_millis(50), 8192, 1024);

        let result = reader.read_head(&mut server).await;
        assert_eq!(result.unwrap_err(), Exception::ReceiveTimeout);
    }

    #[tokio::test]
    async fn test_read_body_exact_length() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(b"lo world").await.unwrap();

        let body = reader(8192, 1024)
            .read_body(&mut server, b"hel".to_vec(), 5)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_read_body_at_limit() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(&[7u8; 16]).await.unwrap();

        let body = reader(8192, 16)
            .read_body(&mut server, Vec::new(), 16)
            .await
            .unwrap();
        assert_eq!(body.len(), 16);
    }

    #[tokio::test]
    async fn test_read_body_over_limit_reads_nothing() {
        let (_client, mut server) = duplex(4096);
        let result = reader(8192, 16)
            .read_body(&mut server, Vec::new(), 17)
            .await;
        assert_eq!(result.unwrap_err(), Exception::PayloadTooLarge);
    }

    #[tokio::test]
    async fn test_read_body_peer_closes_early() {
        let (mut client, mut server) = duplex(4096);
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = reader(8192, 1024)
            .read_body(&mut server, Vec::new(), 10)
            .await;
        assert_eq!(result.unwrap_err(), Exception::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_read_empty_body() {
        let (_client, mut server) = duplex(16);
        let body = reader(8192, 1024)
            .read_body(&mut server, Vec::new(), 0)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_initial_reserve_is_capped() {
        assert_eq!(initial_reserve(0), 0);
        assert_eq!(initial_reserve(5), 5);
        assert_eq!(initial_reserve(128 * 1024 * 1024), INITIAL_BODY_RESERVE);
    }

    #[tokio::test]
    async fn test_read_body_larger_than_initial_reserve() {
        let (mut client, mut server) = duplex(64 * 1024);
        let size = INITIAL_BODY_RESERVE * 3 + 17;
        let writer = tokio::spawn(async move {
            let data: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
            client.write_all(&data).await.unwrap();
            (client, data)
        });

        let body = reader(8192, size as u64)
            .read_body(&mut server, Vec::new(), size as u64)
            .await
            .unwrap();
        let (_client, data) = writer.await.unwrap();
        assert_eq!(body.as_ref(), data.as_slice());
    }
}
