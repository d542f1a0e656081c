// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 后台压缩
//!
//! 上传成功后，请求处理方只负责把一个 `CompressionJob` 交给后台 worker，随即返回响应。
//! worker 为每个任务：
//! 1. 检查压缩脚本是否存在；
//! 2. 等待一个固定的延迟；
//! 3. 以可执行文件所在目录为工作目录启动 `<script> <input> <output>`；
//! 4. 等待子进程退出并记录退出状态。
//!
//! 任何失败都只写日志，不会影响已经发出的上传响应。派生文件在脚本完成之前不存在，
//! 期间取回它会得到 404。

use log::{debug, error, info, warn, Level};
use tokio::{process::Command, sync::mpsc};

use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{access_log::AccessLog, config::Config};

/// 一次压缩任务：把私有目录中的原始文件转换为公共目录中的派生文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionJob {
    pub id: u128,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// 压缩任务的接收方。`submit` 必须立即返回。
#[cfg_attr(test, mockall::automock)]
pub trait Compressor: Send + Sync {
    fn submit(&self, job: CompressionJob);
}

#[derive(Debug, Clone)]
pub struct CompressorSettings {
    /// 压缩脚本的绝对路径（或相对于工作目录的路径）
    pub script: PathBuf,
    pub working_dir: PathBuf,
    pub delay: Duration,
}

impl CompressorSettings {
    /// 脚本路径为相对路径时，相对于服务器可执行文件所在目录解析。
    pub fn from_config(config: &Config) -> Self {
        let working_dir = executable_dir();
        let configured = Path::new(config.compressor_script());
        let script = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            working_dir.join(configured)
        };
        Self {
            script,
            working_dir,
            delay: Duration::from_millis(config.compression_delay_ms()),
        }
    }
}

fn executable_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        },
        Err(e) => {
            warn!("无法获取可执行文件路径: {}，使用当前目录", e);
            PathBuf::from(".")
        }
    }
}

/// 一个任务的最终结果，仅用于日志与测试。
#[derive(Debug, PartialEq, Eq)]
pub enum JobOutcome {
    MissingScript,
    SpawnFailed,
    WaitFailed,
    Exited(Option<i32>),
}

/// 基于 channel 的后台压缩 worker 句柄。
#[derive(Clone)]
pub struct CompressionTrigger {
    sender: mpsc::UnboundedSender<CompressionJob>,
    submitted: Arc<AtomicU64>,
}

impl CompressionTrigger {
    /// 启动 worker。必须在 tokio 运行时中调用。
    pub fn spawn(settings: CompressorSettings, access_log: AccessLog) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<CompressionJob>();
        info!("压缩脚本路径：{}", settings.script.display());

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let settings = settings.clone();
                tokio::spawn(async move {
                    let outcome = run_job(&settings, &job, access_log).await;
                    debug!("[ID{}]压缩任务结束：{:?}", job.id, outcome);
                });
            }
            debug!("压缩任务队列已关闭");
        });

        Self {
            sender,
            submitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 已提交的任务总数。
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl Compressor for CompressionTrigger {
    fn submit(&self, job: CompressionJob) {
        let id = job.id;
        match self.sender.send(job) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                debug!("[ID{}]压缩任务已提交", id);
            }
            Err(e) => error!("[ID{}]压缩任务提交失败，worker已退出: {:?}", id, e.0),
        }
    }
}

pub async fn run_job(
    settings: &CompressorSettings,
    job: &CompressionJob,
    access_log: AccessLog,
) -> JobOutcome {
    if !settings.script.exists() {
        error!("[ID{}]找不到压缩脚本{}", job.id, settings.script.display());
        access_log.system(
            Level::Error,
            &format!("compressor not found at {}", settings.script.display()),
        );
        return JobOutcome::MissingScript;
    }

    tokio::time::sleep(settings.delay).await;

    let mut child = match Command::new(&settings.script)
        .arg(&job.input)
        .arg(&job.output)
        .current_dir(&settings.working_dir)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("[ID{}]无法启动压缩脚本: {}", job.id, e);
            access_log.system(Level::Error, &format!("Failed to spawn compressor: {}", e));
            return JobOutcome::SpawnFailed;
        }
    };

    match child.wait().await {
        Ok(status) => {
            log_exit(job, status, access_log);
            JobOutcome::Exited(status.code())
        }
        Err(e) => {
            error!("[ID{}]等待压缩进程时出错: {}", job.id, e);
            JobOutcome::WaitFailed
        }
    }
}

fn log_exit(job: &CompressionJob, status: ExitStatus, access_log: AccessLog) {
    if status.success() {
        info!(
            "[ID{}]压缩完成：{} -> {}",
            job.id,
            job.input.display(),
            job.output.display()
        );
    } else {
        warn!("[ID{}]压缩脚本异常退出：{}", job.id, status);
        access_log.system(
            Level::Warn,
            &format!(
                "Compressor exited with {} for {}",
                status,
                job.input.display()
            ),
        );
    }
}
