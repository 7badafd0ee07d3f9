//! 消息文本处理工具

/// 调度中心持久化处理信息的最大长度
pub const MAX_HANDLE_MSG_CHARS: usize = 15_000;

/// 执行器回调信息的最大长度
pub const MAX_CALLBACK_MSG_CHARS: usize = 50_000;

/// 按字符数截断，不会切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// 超长时截断并追加省略号
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// 解析逗号分隔的列表，忽略空白项
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_keeps_short_text() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("任务执行成功", 2), "任务");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        let long = "a".repeat(MAX_CALLBACK_MSG_CHARS + 10);
        let cut = truncate_with_ellipsis(&long, MAX_CALLBACK_MSG_CHARS);
        assert_eq!(cut.chars().count(), MAX_CALLBACK_MSG_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_with_ellipsis("ok", 10), "ok");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" http://a:9999 ,,http://b:9999,"),
            vec!["http://a:9999".to_string(), "http://b:9999".to_string()]
        );
        assert!(split_list("").is_empty());
    }
}
