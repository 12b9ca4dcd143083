pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_short_values() {
        assert_eq!(truncate_for_log("短訊息", 10), "短訊息");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_for_log("聊天截圖分析", 2), "聊天... (truncated)");
    }
}
