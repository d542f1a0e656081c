// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 上传文件标识符。
//!
//! 标识符只用于避免文件名冲突，不是安全边界：它由当前时间与随机熵经过
//! 一个快速的非密码学混合函数得到，固定为 64 个小写十六进制字符。

use std::time::{SystemTime, UNIX_EPOCH};

/// 标识符的字符长度
pub const IDENTIFIER_LEN: usize = 64;

const LANES: u64 = 4;

pub fn generate_identifier() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let time_seed = (nanos as u64) ^ ((nanos >> 64) as u64);

    let mut identifier = String::with_capacity(IDENTIFIER_LEN);
    for lane in 0..LANES {
        let entropy: u64 = rand::random();
        let mixed = splitmix64(time_seed.rotate_left((lane * 16) as u32) ^ entropy ^ lane);
        identifier.push_str(&format!("{:016x}", mixed));
    }
    identifier
}

/// SplitMix64 的单步输出函数。
fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::valid_filename;
    use std::collections::HashSet;

    #[test]
    fn test_identifier_shape() {
        let id = generate_identifier();
        assert_eq!(id.len(), IDENTIFIER_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_identifier_is_valid_filename() {
        let name = format!("{}.webp", generate_identifier());
        assert!(valid_filename(&name));
    }

    #[test]
    fn test_identifiers_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_identifier()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_splitmix_is_deterministic() {
        assert_eq!(splitmix64(0), splitmix64(0));
        assert_ne!(splitmix64(0), splitmix64(1));
    }
}
