use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::param::{MAX_FILENAME_LEN, STATUS_CODES};

lazy_static! {
    static ref FILENAME_CHARSET: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
}

/// 错误页面构建器，输出一个最小化的 HTML 文档。
pub struct HtmlBuilder {
    heading: String,
    body: String,
}

impl HtmlBuilder {
    /// 错误页只认识五个原因短语，其余状态码显示 `Error`。
    pub fn from_status_code(code: u16, note: &str) -> Self {
        let reason = match code {
            400 | 404 | 413 | 500 | 501 => STATUS_CODES.get(&code).copied().unwrap_or("Error"),
            _ => "Error",
        };
        Self {
            heading: format!("{} {}", code, reason),
            body: note.to_string(),
        }
    }

    pub fn build(&self) -> String {
        format!(
            "<html><body><h1>{}</h1><p>{}</p></body></html>",
            self.heading, self.body
        )
    }
}

/// URL 解码：`%XX` 还原为对应字节，`+` 还原为空格。
///
/// 不合法的转义序列原样保留；解码结果不是 UTF-8 时以替换字符填充，
/// 随后会被文件名校验拒绝。
pub fn url_decode(src: &str) -> String {
    let spaced = src.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// 文件名校验。
///
/// 通过校验的名字非空、不超过 255 个字符、首字符不是 `.`、`/` 或 `\`，
/// 不含 `..` 与任何路径分隔符，且只由字母、数字、`.`、`_`、`-` 组成。
pub fn valid_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return false;
    }
    if name.starts_with(['.', '/', '\\']) {
        return false;
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    FILENAME_CHARSET.is_match(name)
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}
