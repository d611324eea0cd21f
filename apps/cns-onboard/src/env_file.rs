//! 入网结果写回 .env 文件（保留其他行）。

use domain::Context;
use std::fs;
use std::io;
use std::path::Path;

/// 写入 `CNS_CONTEXT` 与 `CNS_TOKEN`，已存在的键原地替换。
pub fn persist_context(path: &Path, context: &Context) -> io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };
    let updated = upsert(
        &existing,
        &[
            ("CNS_CONTEXT", context.context.as_str()),
            ("CNS_TOKEN", context.token.as_str()),
        ],
    );
    fs::write(path, updated)
}

fn upsert(contents: &str, entries: &[(&str, &str)]) -> String {
    let mut pending = entries.to_vec();
    let mut lines = Vec::new();
    for line in contents.lines() {
        let replaced = line_key(line)
            .and_then(|key| pending.iter().position(|(pending_key, _)| *pending_key == key));
        match replaced {
            Some(index) => {
                let (key, value) = pending.remove(index);
                lines.push(format_entry(key, value));
            }
            None => lines.push(line.to_string()),
        }
    }
    for (key, value) in pending {
        lines.push(format_entry(key, value));
    }
    let mut updated = lines.join("\n");
    updated.push('\n');
    updated
}

fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let (key, _) = line.split_once('=')?;
    let key = key.trim();
    Some(key.strip_prefix("export ").map(str::trim).unwrap_or(key))
}

fn format_entry(key: &str, value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '#' | '"' | '\'' | '\\' | '$'));
    if !needs_quotes {
        format!("{}={}", key, value)
    } else if !value.contains('\'') {
        // 单引号内不做转义与变量替换
        format!("{}='{}'", key, value)
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}=\"{}\"", key, escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_appends_missing_keys() {
        let updated = upsert("CNS_CODE=ABC123\n", &[("CNS_CONTEXT", "thing-1"), ("CNS_TOKEN", "tok-1")]);
        assert_eq!(updated, "CNS_CODE=ABC123\nCNS_CONTEXT=thing-1\nCNS_TOKEN=tok-1\n");
    }

    #[test]
    fn upsert_replaces_in_place() {
        let contents = "# padi\nexport CNS_TOKEN=old\nCNS_CODE=ABC123\nCNS_CONTEXT=\n";
        let updated = upsert(contents, &[("CNS_CONTEXT", "thing-1"), ("CNS_TOKEN", "tok-1")]);
        assert_eq!(
            updated,
            "# padi\nCNS_TOKEN=tok-1\nCNS_CODE=ABC123\nCNS_CONTEXT=thing-1\n"
        );
    }

    #[test]
    fn commented_keys_are_left_alone() {
        let updated = upsert("# CNS_TOKEN=old\n", &[("CNS_TOKEN", "tok-1")]);
        assert_eq!(updated, "# CNS_TOKEN=old\nCNS_TOKEN=tok-1\n");
    }

    #[test]
    fn values_with_spaces_are_quoted() {
        assert_eq!(format_entry("CNS_TOKEN", "a b"), "CNS_TOKEN='a b'");
        assert_eq!(format_entry("CNS_TOKEN", "it's"), "CNS_TOKEN=\"it's\"");
        assert_eq!(format_entry("CNS_TOKEN", "eyJ.abc-_"), "CNS_TOKEN=eyJ.abc-_");
    }

    #[test]
    fn persist_creates_and_updates_file() {
        let path = std::env::temp_dir().join(format!("cns-onboard-{}.env", std::process::id()));
        let _ = fs::remove_file(&path);

        persist_context(&path, &Context::new("thing-1", "tok-1")).expect("first write");
        persist_context(&path, &Context::new("thing-2", "tok-2")).expect("second write");

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents, "CNS_CONTEXT=thing-2\nCNS_TOKEN=tok-2\n");
        let _ = fs::remove_file(&path);
    }
}
