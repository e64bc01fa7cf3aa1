//! INI 形式のエンジン設定を JSON オブジェクトに変換
//!
//! `section -> {key -> value}` の2階層。キーは小文字化します。

use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};
use std::path::Path;

pub fn parse_ini(content: &str) -> Result<Value> {
    let mut sections: Map<String, Value> = Map::new();
    let mut current: Option<String> = None;
    let mut last_key: Option<(String, usize)> = None;

    for (index, raw_line) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw_line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indent = raw_line.len() - raw_line.trim_start().len();

        // 直前のキー行より深くインデントされた行は値の継続行
        if let (Some(section), Some((key, key_indent))) = (&current, &last_key) {
            if indent > *key_indent {
                if let Some(Value::String(value)) =
                    sections.get_mut(section).and_then(|s| s.get_mut(key))
                {
                    value.push('\n');
                    value.push_str(trimmed);
                }
                continue;
            }
        }

        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = Some(name);
            last_key = None;
            continue;
        }

        let section = current.as_ref().ok_or(ConfigError::IniSyntax {
            line: line_no,
            message: "セクションヘッダーより前にキーがあります".to_string(),
        })?;

        let separator = trimmed
            .find(['=', ':'])
            .ok_or_else(|| ConfigError::IniSyntax {
                line: line_no,
                message: format!("'=' がありません: {}", trimmed),
            })?;
        let key = trimmed[..separator].trim().to_lowercase();
        let value = trimmed[separator + 1..].trim().to_string();

        if let Some(Value::Object(entries)) = sections.get_mut(section) {
            entries.insert(key.clone(), Value::String(value));
        }
        last_key = Some((key, indent));
    }

    Ok(Value::Object(sections))
}

/// INI ファイルを読み込んで JSON に変換
pub fn load_ini(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IniRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "INI ファイルを読み込み");
    parse_ini(&content)
}
