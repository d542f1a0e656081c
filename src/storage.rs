// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 存储引擎
//!
//! 管理两个根目录：
//! - 公共目录：对外提供取回服务，存放压缩后的派生文件。
//! - 私有目录：存放上传的原始文件，从不直接对外提供。
//!
//! 写入总是先写 `<path>.tmp` 再重命名，取回方只可能看到完整的旧文件或完整的新文件。

use log::{debug, error, info, warn};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{exception::Exception, validator::CacheValidator};

#[derive(Debug, Clone)]
pub struct Storage {
    public_root: PathBuf,
    private_root: PathBuf,
}

impl Storage {
    pub fn new(public_root: impl Into<PathBuf>, private_root: impl Into<PathBuf>) -> Self {
        Self {
            public_root: public_root.into(),
            private_root: private_root.into(),
        }
    }

    /// 确保两个根目录存在。已存在但不是目录时返回错误。
    pub async fn ensure_roots(&self) -> io::Result<()> {
        for root in [&self.public_root, &self.private_root] {
            match fs::metadata(root).await {
                Ok(meta) if meta.is_dir() => {
                    debug!("目录{}已存在", root.display());
                }
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists but is not a directory", root.display()),
                    ));
                }
                Err(_) => {
                    fs::create_dir_all(root).await?;
                    info!("已创建目录{}", root.display());
                }
            }
        }
        Ok(())
    }

    /// 公共目录下的路径。`name` 必须已通过文件名校验。
    pub fn public_path(&self, name: &str) -> PathBuf {
        self.public_root.join(name)
    }

    /// 私有目录下的路径。`name` 必须已通过文件名校验。
    pub fn private_path(&self, name: &str) -> PathBuf {
        self.private_root.join(name)
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    pub fn private_root(&self) -> &Path {
        &self.private_root
    }

    /// 获取公共目录下文件的校验值。不存在或不是普通文件时返回 `FileNotFound`。
    pub async fn stat_public(&self, name: &str, id: u128) -> Result<CacheValidator, Exception> {
        let path = self.public_path(name);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(CacheValidator::from_metadata(&meta)),
            Ok(_) => {
                warn!("[ID{}]{}不是普通文件", id, path.display());
                Err(Exception::FileNotFound)
            }
            Err(e) => {
                debug!("[ID{}]无法获取{}的元数据: {}", id, path.display(), e);
                Err(Exception::FileNotFound)
            }
        }
    }

    /// 打开公共目录下的文件用于读取，同时返回打开后文件的校验值。
    ///
    /// 文件可能在 `stat_public` 之后被整体替换，响应头必须描述实际发送的那个文件。
    pub async fn open_public(
        &self,
        name: &str,
        id: u128,
    ) -> Result<(File, CacheValidator), Exception> {
        let path = self.public_path(name);
        let file = File::open(&path).await.map_err(|e| {
            error!("[ID{}]无法打开路径{}指定的文件。错误：{}", id, path.display(), e);
            Exception::FileOpenFailed
        })?;
        let meta = file.metadata().await.map_err(|e| {
            error!("[ID{}]无法读取已打开文件{}的元数据：{}", id, path.display(), e);
            Exception::FileOpenFailed
        })?;
        Ok((file, CacheValidator::from_metadata(&meta)))
    }

    /// 原子写入：先写临时文件，再重命名为目标文件，最后将权限收紧为 0600。
    ///
    /// 临时文件以独占方式创建：同名写入正在进行时，后来者得到 `CreateFailed`，
    /// 不会截断对方的临时文件。创建之后任一步失败都会删除临时文件。
    /// 权限设置失败只记录警告。
    pub async fn write_atomic(&self, path: &Path, data: &[u8], id: u128) -> Result<(), Exception> {
        let tmp = temp_path(path);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                // 临时文件可能属于另一个写入者，不能删除
                error!("[ID{}]无法创建临时文件{}: {}", id, tmp.display(), e);
                return Err(Exception::CreateFailed);
            }
        };

        let written = async {
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            error!("[ID{}]写入临时文件{}失败: {}", id, tmp.display(), e);
            remove_quietly(&tmp).await;
            return Err(Exception::WriteFailed);
        }

        if let Err(e) = fs::rename(&tmp, path).await {
            error!(
                "[ID{}]无法将{}重命名为{}: {}",
                id,
                tmp.display(),
                path.display(),
                e
            );
            remove_quietly(&tmp).await;
            return Err(Exception::RenameFailed);
        }

        restrict_permissions(path, id).await;
        debug!("[ID{}]已写入{}（{}字节）", id, path.display(), data.len());
        Ok(())
    }
}

/// 按 `chunk_size` 分块把文件写到流中，返回发送的字节数。
///
/// 发送失败时直接返回错误，不重试。
pub async fn stream_file<W>(file: &mut File, stream: &mut W, chunk_size: usize) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total_sent = 0u64;
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&buffer[..n]).await?;
        total_sent += n as u64;
    }
    stream.flush().await?;
    Ok(total_sent)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

async fn remove_quietly(path: &Path) {
    let _ = fs::remove_file(path).await;
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path, id: u128) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        warn!("[ID{}]无法设置{}的权限: {}", id, path.display(), e);
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path, _id: u128) {}
