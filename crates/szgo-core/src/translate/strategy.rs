//! データベース種別ごとの変換戦略
//!
//! 種別は閉じた列挙型で表し、`BackendType::strategy` の一箇所で戦略を選択します。

use super::connection::{ConnectionConfig, parse_connection};
use super::{DB2_CLI_MOUNT, DB2_DRIVER_CONFIG, MYSQL_CLIENT_LIBRARY, SQLITE_MOUNT, TranslateOptions};
use crate::error::TranslateError;
use crate::model::VolumeBinding;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

type Result<T> = std::result::Result<T, TranslateError>;

/// データベース種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Sqlite3,
    Postgresql,
    Mysql,
    Db2,
    Mssql,
}

impl BackendType {
    /// 接続文字列のスキームから判定（未知の種別はここで拒否）
    pub fn from_scheme(scheme: &str) -> Result<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite3" => Ok(Self::Sqlite3),
            "postgresql" => Ok(Self::Postgresql),
            "mysql" => Ok(Self::Mysql),
            "db2" => Ok(Self::Db2),
            "mssql" => Ok(Self::Mssql),
            _ => Err(TranslateError::UnsupportedBackend(scheme.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite3 => "sqlite3",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Db2 => "db2",
            Self::Mssql => "mssql",
        }
    }

    pub fn strategy(&self) -> &'static dyn BackendStrategy {
        match self {
            Self::Sqlite3 => &SqliteStrategy,
            Self::Postgresql => &NetworkServerStrategy,
            Self::Mysql => &MysqlStrategy,
            Self::Db2 => &Db2Strategy,
            Self::Mssql => &UnsupportedStrategy,
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 変換戦略
pub trait BackendStrategy: Sync {
    /// パス補正済みの設定を受け取り、コンテナ用の設定と必要なボリュームを返す
    fn translate(
        &self,
        config: Value,
        connection: &ConnectionConfig,
        options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)>;
}

/// sqlite3: データベースファイルのディレクトリを1つのボリュームとしてマウント
pub struct SqliteStrategy;

impl BackendStrategy for SqliteStrategy {
    fn translate(
        &self,
        config: Value,
        connection: &ConnectionConfig,
        _options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)> {
        let directories = connection.directories()?;
        if directories.len() > 1 {
            return Err(TranslateError::DivergentShardDirectories {
                directories: directories.into_iter().collect(),
            });
        }

        let host_dir = directories.into_iter().next().ok_or_else(|| {
            TranslateError::ConnectionParse {
                connection: connection.base_connection.clone(),
                reason: "データベースファイルのディレクトリを特定できません",
            }
        })?;

        // 接続文字列は表記に関わらずマウント先のファイルを指すように書き換える
        let remapped = std::iter::once(&connection.base_connection)
            .chain(connection.shard_connections.iter())
            .map(|conn| Ok((conn.clone(), remap_sqlite_connection(conn)?)))
            .collect::<Result<BTreeMap<String, String>>>()?;
        let config = replace_exact_strings(config, &remapped);

        let host_dir_str = host_dir.to_string_lossy().into_owned();
        tracing::debug!(host_dir = %host_dir_str, "sqlite ディレクトリを {} に置換", SQLITE_MOUNT);
        let config = replace_in_strings(config, &host_dir_str, SQLITE_MOUNT);

        Ok((config, Some(VolumeBinding::read_write(host_dir, SQLITE_MOUNT))))
    }
}

/// ネットワーク越しのデータベース: 設定はそのまま
pub struct NetworkServerStrategy;

impl BackendStrategy for NetworkServerStrategy {
    fn translate(
        &self,
        config: Value,
        _connection: &ConnectionConfig,
        _options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)> {
        Ok((config, None))
    }
}

/// mysql: クライアントライブラリが SENZING_ROOT/lib に必要
pub struct MysqlStrategy;

impl BackendStrategy for MysqlStrategy {
    fn translate(
        &self,
        config: Value,
        _connection: &ConnectionConfig,
        options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)> {
        let lib = options.senzing_root.join("lib").join(MYSQL_CLIENT_LIBRARY);
        if !lib.is_file() {
            return Err(TranslateError::BackendPrerequisite {
                backend: "mysql",
                message: format!(
                    "{} が {} にありません\n\nヒント:\n  • MySQL クライアントライブラリをインストールし、{} を {}/lib/ にコピーしてください",
                    MYSQL_CLIENT_LIBRARY,
                    lib.display(),
                    MYSQL_CLIENT_LIBRARY,
                    options.senzing_root.display()
                ),
            });
        }

        Ok((config, None))
    }
}

/// db2: ホストの CLI ドライバをコンテナにマウント
pub struct Db2Strategy;

impl BackendStrategy for Db2Strategy {
    fn translate(
        &self,
        config: Value,
        _connection: &ConnectionConfig,
        options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)> {
        let cli_path = options.db2_cli_path.as_deref().ok_or_else(|| {
            TranslateError::BackendPrerequisite {
                backend: "db2",
                message: "Db2 CLI ドライバのパスが指定されていません\n\nヒント:\n  • --db2-cli-path で lib/ と cfg/ を含むディレクトリを指定してください".to_string(),
            }
        })?;

        check_db2_driver(cli_path)?;

        Ok((config, Some(VolumeBinding::read_write(cli_path, DB2_CLI_MOUNT))))
    }
}

fn check_db2_driver(cli_path: &Path) -> Result<()> {
    let prerequisite = |message: String| TranslateError::BackendPrerequisite {
        backend: "db2",
        message,
    };

    if !cli_path.join("lib").is_dir() {
        return Err(prerequisite(format!(
            "{} に lib/ ディレクトリがありません",
            cli_path.display()
        )));
    }

    let cfg_file = cli_path.join(DB2_DRIVER_CONFIG);
    let content = std::fs::read_to_string(&cfg_file)
        .map_err(|e| prerequisite(format!("{} を読み込めません: {}", cfg_file.display(), e)))?;

    for line in content.lines() {
        let check = line.trim_start().to_ascii_lowercase();
        if (check.starts_with("<dsn alias=") || check.starts_with("<database name="))
            && (check.contains("localhost") || check.contains("127.0.0.1"))
        {
            return Err(prerequisite(format!(
                "db2dsdriver.cfg のホストに localhost / 127.0.0.1 は使用できません: {}",
                line.trim()
            )));
        }
    }

    Ok(())
}

/// 認識はするが未対応の種別
pub struct UnsupportedStrategy;

impl BackendStrategy for UnsupportedStrategy {
    fn translate(
        &self,
        _config: Value,
        connection: &ConnectionConfig,
        _options: &TranslateOptions,
    ) -> Result<(Value, Option<VolumeBinding>)> {
        Err(TranslateError::UnsupportedBackend(
            connection.backend.to_string(),
        ))
    }
}

/// `scheme:credentials@/host/dir/file.db` を `scheme:credentials@<SQLITE_MOUNT>/file.db` に
fn remap_sqlite_connection(connection: &str) -> Result<String> {
    let parsed = parse_connection(connection)?;
    let file_name = Path::new(parsed.location)
        .file_name()
        .ok_or_else(|| TranslateError::ConnectionParse {
            connection: connection.to_string(),
            reason: "データベースファイル名がありません",
        })?;

    Ok(format!(
        "{}:{}@{}/{}",
        parsed.scheme,
        parsed.credentials,
        SQLITE_MOUNT,
        file_name.to_string_lossy()
    ))
}

/// 値が完全一致する文字列だけを置き換える
fn replace_exact_strings(value: Value, replacements: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) => match replacements.get(&s) {
            Some(replacement) => Value::String(replacement.clone()),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| replace_exact_strings(v, replacements))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, replace_exact_strings(v, replacements)))
                .collect(),
        ),
        other => other,
    }
}

/// ディレクトリ `dir` をパス要素単位で置換（直後が `/` か末尾の場合のみ）
fn replace_dir(s: &str, dir: &str, to: &str) -> String {
    if dir.is_empty() {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(dir) {
        let end = pos + dir.len();
        out.push_str(&rest[..pos]);
        if matches!(rest[end..].chars().next(), None | Some('/')) {
            out.push_str(to);
        } else {
            out.push_str(dir);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// 設定内の全ての文字列値に対してディレクトリを置換する
fn replace_in_strings(value: Value, from: &str, to: &str) -> Value {
    match value {
        Value::String(s) => Value::String(replace_dir(&s, from, to)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| replace_in_strings(v, from, to))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, replace_in_strings(v, from, to)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_from_scheme() {
        assert_eq!(BackendType::from_scheme("SQLITE3").unwrap(), BackendType::Sqlite3);
        assert_eq!(BackendType::from_scheme("db2").unwrap(), BackendType::Db2);
        assert!(matches!(
            BackendType::from_scheme("oracle"),
            Err(TranslateError::UnsupportedBackend(s)) if s == "oracle"
        ));
    }

    #[test]
    fn test_replace_in_strings() {
        let value = json!({"a": {"b": "/x/y/G2C.db", "n": 1}, "c": ["/x/y/z"]});
        let replaced = replace_in_strings(value, "/x/y", "/var/opt/senzing");
        assert_eq!(
            replaced,
            json!({"a": {"b": "/var/opt/senzing/G2C.db", "n": 1}, "c": ["/var/opt/senzing/z"]})
        );
    }

    #[test]
    fn test_replace_dir_matches_whole_components() {
        assert_eq!(
            replace_dir("/data/sq/G2C.db", "/data/sq", "/var/opt/senzing"),
            "/var/opt/senzing/G2C.db"
        );
        assert_eq!(replace_dir("/data/sq", "/data/sq", "/m"), "/m");
        assert_eq!(
            replace_dir("/data/sqlite_other/G2C.db", "/data/sq", "/m"),
            "/data/sqlite_other/G2C.db"
        );
        assert_eq!(
            replace_dir("a=/data/sqx;b=/data/sq/x", "/data/sq", "/m"),
            "a=/data/sqx;b=/m/x"
        );
    }

    #[test]
    fn test_remap_sqlite_connection() {
        assert_eq!(
            remap_sqlite_connection("sqlite3://na:na@/data/sqlite/../sqlite/G2_RES.db").unwrap(),
            "sqlite3://na:na@/var/opt/senzing/G2_RES.db"
        );
        assert!(remap_sqlite_connection("sqlite3://na:na@/").is_err());
    }

    #[test]
    fn test_db2_driver_checks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        // lib/ がない
        assert!(check_db2_driver(root).is_err());

        std::fs::create_dir(root.join("lib")).unwrap();
        // cfg/db2dsdriver.cfg がない
        assert!(check_db2_driver(root).is_err());

        std::fs::create_dir(root.join("cfg")).unwrap();
        std::fs::write(
            root.join(DB2_DRIVER_CONFIG),
            "<configuration>\n  <dsncollection>\n    <dsn alias=\"G2\" name=\"G2\" host=\"db2.example.com\" port=\"50000\"/>\n",
        )
        .unwrap();
        assert!(check_db2_driver(root).is_ok());

        std::fs::write(
            root.join(DB2_DRIVER_CONFIG),
            "    <dsn alias=\"G2\" name=\"G2\" host=\"localhost\" port=\"50000\"/>\n",
        )
        .unwrap();
        assert!(matches!(
            check_db2_driver(root),
            Err(TranslateError::BackendPrerequisite { backend: "db2", .. })
        ));
    }
}
