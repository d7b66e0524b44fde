//! 设备 ID 与人工输入配对码生成。

use uuid::Uuid;

/// 配对码字符集：去除易混淆的 `0/O/1/I`。
pub(crate) const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
/// 配对码长度。
pub(crate) const CODE_LEN: usize = 6;

/// 生成设备 ID（v4 UUID，122 bit 随机）。
pub(crate) fn new_device_id() -> String {
    format!("dev_{}", Uuid::new_v4().simple())
}

/// 生成 6 位大写配对码；碰撞由存储层负责重试。
pub(crate) fn new_linking_code() -> String {
    let random = Uuid::new_v4();
    // 字符集长度为 32，取每字节低 5 bit 无偏映射。
    random
        .as_bytes()
        .iter()
        .take(CODE_LEN)
        .map(|byte| CODE_ALPHABET[usize::from(byte & 0x1f)] as char)
        .collect()
}

/// 归一化用户输入的配对码：去空白并转大写。
pub(crate) fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{CODE_ALPHABET, CODE_LEN, new_device_id, new_linking_code, normalize_code};

    #[test]
    fn linking_code_uses_restricted_alphabet() {
        for _ in 0..200 {
            let code = new_linking_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
        }
    }

    #[test]
    fn device_ids_do_not_repeat() {
        let ids = (0..500).map(|_| new_device_id()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.starts_with("dev_") && id.len() == 36));
    }

    #[test]
    fn normalization_trims_and_uppercases() {
        assert_eq!(normalize_code(" abc123 "), "ABC123");
        assert_eq!(normalize_code("ABC123"), "ABC123");
        assert_eq!(normalize_code("\tabc123\n"), "ABC123");
    }
}
