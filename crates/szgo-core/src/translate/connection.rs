//! 接続文字列の解析
//!
//! 形式: `scheme:credentials@location`
//! 例: `sqlite3://na:na@/home/user/project/var/sqlite/G2C.db`

use super::strategy::BackendType;
use crate::error::TranslateError;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

type Result<T> = std::result::Result<T, TranslateError>;

/// 解析済みの接続文字列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConnection<'a> {
    pub scheme: &'a str,
    pub credentials: &'a str,
    pub location: &'a str,
}

/// 最初の ':' でスキームを、続く最初の '@' で場所を分離
pub fn parse_connection(connection: &str) -> Result<ParsedConnection<'_>> {
    let (scheme, rest) = connection
        .split_once(':')
        .ok_or_else(|| TranslateError::ConnectionParse {
            connection: connection.to_string(),
            reason: "データベース種別の区切り ':' が見つかりません",
        })?;

    let (credentials, location) =
        rest.split_once('@')
            .ok_or_else(|| TranslateError::ConnectionParse {
                connection: connection.to_string(),
                reason: "区切り '@' が見つかりません",
            })?;

    Ok(ParsedConnection {
        scheme,
        credentials,
        location,
    })
}

/// 接続文字列が指すファイルの親ディレクトリ（`.` / `..` を除いた絶対パス）
pub fn connection_directory(connection: &str) -> Result<PathBuf> {
    let parsed = parse_connection(connection)?;
    let absolute =
        std::path::absolute(parsed.location).map_err(|_| TranslateError::ConnectionParse {
            connection: connection.to_string(),
            reason: "データベースファイルのパスを解決できません",
        })?;
    let normalized = normalize_path(&absolute);

    Ok(normalized
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(normalized))
}

/// `.` と `..` をパス上で畳み込む（シンボリックリンクは解決しない）
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// 生の設定から取り出した接続情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub backend: BackendType,
    /// `[SQL] connection` の値
    pub base_connection: String,
    /// sqlite クラスタ構成時の各シャードの接続文字列
    pub shard_connections: BTreeSet<String>,
}

impl ConnectionConfig {
    pub fn from_raw(config: &Value) -> Result<Self> {
        let base_connection = string_value(config, "SQL", "connection")?.to_string();
        let backend = BackendType::from_scheme(parse_connection(&base_connection)?.scheme)?;

        let hybrid = config
            .get("SQL")
            .and_then(|sql| sql.get("backend"))
            .and_then(Value::as_str)
            .is_some_and(|b| b.eq_ignore_ascii_case("hybrid"));

        let mut shard_connections = BTreeSet::new();
        if backend == BackendType::Sqlite3 && hybrid {
            // [HYBRID] の値がクラスタキー（C1, C2, ...）で、各キーのセクションに db_1 がある
            let cluster_keys: BTreeSet<&str> = section(config, "HYBRID")?
                .values()
                .filter_map(Value::as_str)
                .collect();

            for cluster_key in cluster_keys {
                shard_connections.insert(string_value(config, cluster_key, "db_1")?.to_string());
            }
        }

        Ok(Self {
            backend,
            base_connection,
            shard_connections,
        })
    }

    /// ベースとシャード全ての親ディレクトリ（重複なし・ソート済み）
    pub fn directories(&self) -> Result<BTreeSet<PathBuf>> {
        std::iter::once(&self.base_connection)
            .chain(self.shard_connections.iter())
            .map(|conn| connection_directory(conn))
            .collect()
    }
}

pub(crate) fn section<'a>(
    config: &'a Value,
    name: &str,
) -> Result<&'a serde_json::Map<String, Value>> {
    config
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| TranslateError::MissingSection(name.to_string()))
}

fn string_value<'a>(config: &'a Value, section_name: &str, key: &str) -> Result<&'a str> {
    section(config, section_name)?
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TranslateError::MissingKey {
            section: section_name.to_string(),
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_connection() {
        let parsed = parse_connection("sqlite3://na:na@/opt/p/var/sqlite/G2C.db").unwrap();
        assert_eq!(parsed.scheme, "sqlite3");
        assert_eq!(parsed.credentials, "//na:na");
        assert_eq!(parsed.location, "/opt/p/var/sqlite/G2C.db");

        let parsed = parse_connection("postgresql://user:pw@dbhost:5432:G2").unwrap();
        assert_eq!(parsed.scheme, "postgresql");
        assert_eq!(parsed.location, "dbhost:5432:G2");
    }

    #[test]
    fn test_parse_connection_errors() {
        assert!(matches!(
            parse_connection("no-separators"),
            Err(TranslateError::ConnectionParse { .. })
        ));
        assert!(matches!(
            parse_connection("sqlite3:/opt/p/G2C.db"),
            Err(TranslateError::ConnectionParse { .. })
        ));
    }

    #[test]
    fn test_connection_directory() {
        assert_eq!(
            connection_directory("sqlite3://na:na@/opt/p/var/sqlite/G2C.db").unwrap(),
            PathBuf::from("/opt/p/var/sqlite")
        );
    }

    #[test]
    fn test_connection_directory_collapses_parent_components() {
        assert_eq!(
            connection_directory("sqlite3://na:na@/data/sqlite/../sqlite/G2_RES.db").unwrap(),
            PathBuf::from("/data/sqlite")
        );
        assert_eq!(
            connection_directory("sqlite3://na:na@/data/./sqlite/G2C.db").unwrap(),
            PathBuf::from("/data/sqlite")
        );
    }

    #[test]
    fn test_from_raw_hybrid_collects_unique_shards() {
        let config = json!({
            "SQL": {"connection": "sqlite3://na:na@/d/G2C.db", "backend": "HYBRID"},
            "HYBRID": {"res_feat_ekey": "C1", "res_feat_lkey": "C1", "lib_feat": "C2"},
            "C1": {"cluster_size": "1", "db_1": "sqlite3://na:na@/d/G2_RES.db"},
            "C2": {"cluster_size": "1", "db_1": "sqlite3://na:na@/d/G2_LIBFEAT.db"},
        });

        let conn = ConnectionConfig::from_raw(&config).unwrap();
        assert_eq!(conn.backend, BackendType::Sqlite3);
        assert!(!conn.shard_connections.is_empty());
        assert_eq!(conn.shard_connections.len(), 2);
    }

    #[test]
    fn test_from_raw_missing_cluster_section() {
        let config = json!({
            "SQL": {"connection": "sqlite3://na:na@/d/G2C.db", "backend": "HYBRID"},
            "HYBRID": {"res_feat_ekey": "C1"},
        });

        assert!(matches!(
            ConnectionConfig::from_raw(&config),
            Err(TranslateError::MissingSection(s)) if s == "C1"
        ));
    }

    #[test]
    fn test_from_raw_missing_connection() {
        let config = json!({"SQL": {}});
        assert!(matches!(
            ConnectionConfig::from_raw(&config),
            Err(TranslateError::MissingKey { .. })
        ));
    }
}
