use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::param::{CHUNK_SIZE, MAX_HEADER_SIZE, MAX_REQUEST_SIZE, RECEIVE_TIMEOUT_SECS};

/// 上传文件的命名方式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// 服务器生成 64 位十六进制标识符，忽略客户端提供的文件名
    Identifier,
    /// 使用 `name` 查询参数作为文件名
    Legacy,
}

/// 查询参数的取值方式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryLookup {
    /// 按 `&` 拆分后取值，重复的键以最后一次为准
    Structured,
    /// 在原始查询串中查找第一个 `key=`
    Scan,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    port: u16,
    local: bool,
    worker_threads: usize,
    public_root: String,
    private_root: String,
    retrieve_endpoint: String,
    upload_endpoint: String,
    upload_mode: UploadMode,
    query_lookup: QueryLookup,
    compressor_script: String,
    compression_delay_ms: u64,
    derived_extension: String,
    receive_timeout_secs: u64,
    max_header_size: usize,
    max_request_size: u64,
    chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 8080,
            local: false,
            worker_threads: 0,
            public_root: "./serve".to_string(),
            private_root: "./save".to_string(),
            retrieve_endpoint: "/retrieve".to_string(),
            upload_endpoint: "/upload".to_string(),
            upload_mode: UploadMode::Identifier,
            query_lookup: QueryLookup::Structured,
            compressor_script: "compressor.sh".to_string(),
            compression_delay_ms: 1000,
            derived_extension: "webp".to_string(),
            receive_timeout_secs: RECEIVE_TIMEOUT_SECS,
            max_header_size: MAX_HEADER_SIZE,
            max_request_size: MAX_REQUEST_SIZE,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// 从 TOML 文件加载配置。文件缺失或无法解析时使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let mut str_val = String::new();
        match File::open(filename) {
            Ok(mut file) => {
                if let Err(e) = file.read_to_string(&mut str_val) {
                    error!("读取配置文件{}失败：{}，使用默认配置", filename, e);
                    return Self::new().normalized();
                }
            }
            Err(e) => {
                warn!("无法打开配置文件{}：{}，使用默认配置", filename, e);
                return Self::new().normalized();
            }
        };
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(content: &str) -> Self {
        let raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        raw_config.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.chunk_size == 0 {
            warn!("chunk_size被设置为0，该值将被改为{}。", CHUNK_SIZE);
            self.chunk_size = CHUNK_SIZE;
        }
        if self.max_header_size < 16 {
            warn!("max_header_size过小，该值将被改为{}。", MAX_HEADER_SIZE);
            self.max_header_size = MAX_HEADER_SIZE;
        }
        self.derived_extension = self.derived_extension.trim_start_matches('.').to_string();
        self
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn public_root(&self) -> &str {
        &self.public_root
    }

    pub fn private_root(&self) -> &str {
        &self.private_root
    }

    pub fn retrieve_endpoint(&self) -> &str {
        &self.retrieve_endpoint
    }

    pub fn upload_endpoint(&self) -> &str {
        &self.upload_endpoint
    }

    pub fn upload_mode(&self) -> UploadMode {
        self.upload_mode
    }

    pub fn query_lookup(&self) -> QueryLookup {
        self.query_lookup
    }

    pub fn compressor_script(&self) -> &str {
        &self.compressor_script
    }

    pub fn compression_delay_ms(&self) -> u64 {
        self.compression_delay_ms
    }

    /// 派生文件扩展名（不含点）
    pub fn derived_extension(&self) -> &str {
        &self.derived_extension
    }

    pub fn receive_timeout_secs(&self) -> u64 {
        self.receive_timeout_secs
    }

    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

// 测试与嵌入场景下按需覆盖部分字段
impl Config {
    pub fn with_roots(mut self, public_root: &str, private_root: &str) -> Self {
        self.public_root = public_root.to_string();
        self.private_root = private_root.to_string();
        self
    }

    pub fn with_upload_mode(mut self, mode: UploadMode) -> Self {
        self.upload_mode = mode;
        self
    }

    pub fn with_query_lookup(mut self, lookup: QueryLookup) -> Self {
        self.query_lookup = lookup;
        self
    }

    pub fn with_max_request_size(mut self, size: u64) -> Self {
        self.max_request_size = size;
        self
    }

    pub fn with_receive_timeout_secs(mut self, secs: u64) -> Self {
        self.receive_timeout_secs = secs;
        self
    }
}
