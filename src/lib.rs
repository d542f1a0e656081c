pub mod access_log;
pub mod compressor;
pub mod config;
pub mod exception;
pub mod identifier;
pub mod mime;
pub mod param;
pub mod reader;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod storage;
pub mod util;
pub mod validator;

pub use access_log::AccessLog;
pub use compressor::{CompressionJob, CompressionTrigger, Compressor, CompressorSettings};
pub use config::{Config, QueryLookup, UploadMode};
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use server::Server;
pub use util::HtmlBuilder;
pub use validator::CacheValidator;
