//! データベース設定のコンテナ向け変換
//!
//! ホスト上のエンジン設定（INI を JSON 化したもの）を API サーバーコンテナ内で
//! 使える形に書き換えます。
//!
//! 処理順:
//! 1. 接続文字列の localhost / 127.0.0.1 チェック
//! 2. `[PIPELINE]` のパスをコンテナ内の固定パスに置換し、`resourcepath` を削除
//! 3. `[SQL] connection` を解析してデータベース種別を決定（未知の種別はここで失敗）
//! 4. 種別ごとの戦略で変換（sqlite3 はシャードのディレクトリが1つであることを検証）

mod connection;
mod strategy;

pub use connection::{ConnectionConfig, ParsedConnection, connection_directory, parse_connection};
pub use strategy::{BackendStrategy, BackendType};

use crate::error::TranslateError;
use crate::model::VolumeBinding;
use serde_json::Value;
use std::path::PathBuf;

/// コンテナ内のサポートファイルのパス
pub const SUPPORT_PATH: &str = "/opt/senzing/data";
/// コンテナ内の設定ファイルのパス
pub const CONFIG_PATH: &str = "/etc/opt/senzing";
/// sqlite データベースディレクトリのマウント先
pub const SQLITE_MOUNT: &str = "/var/opt/senzing";
/// Db2 CLI ドライバのマウント先
pub const DB2_CLI_MOUNT: &str = "/opt/IBM/db2/clidriver";
pub const DB2_DRIVER_CONFIG: &str = "cfg/db2dsdriver.cfg";
pub const MYSQL_CLIENT_LIBRARY: &str = "libmysqlclient.so.21";

/// 変換に必要なホスト側の情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    pub senzing_root: PathBuf,
    pub db2_cli_path: Option<PathBuf>,
}

/// 変換結果
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub backend: BackendType,
    pub config: Value,
    pub volume: Option<VolumeBinding>,
}

/// 設定を変換
pub fn translate(
    raw: &Value,
    options: &TranslateOptions,
) -> std::result::Result<Translation, TranslateError> {
    check_loopback(raw)?;

    let config = rewrite_pipeline(raw.clone())?;
    let connection = ConnectionConfig::from_raw(&config)?;
    tracing::debug!(
        backend = %connection.backend,
        shards = connection.shard_connections.len(),
        "データベース設定を変換"
    );

    let (config, volume) = connection
        .backend
        .strategy()
        .translate(config, &connection, options)?;

    Ok(Translation {
        backend: connection.backend,
        config,
        volume,
    })
}

fn rewrite_pipeline(mut config: Value) -> std::result::Result<Value, TranslateError> {
    let pipeline = config
        .get_mut("PIPELINE")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| TranslateError::MissingSection("PIPELINE".to_string()))?;

    pipeline.insert("supportpath".to_string(), Value::from(SUPPORT_PATH));
    pipeline.insert("configpath".to_string(), Value::from(CONFIG_PATH));
    pipeline.remove("resourcepath");

    Ok(config)
}

/// `connection` / `db_1` の値がループバックを指していないか確認
pub fn check_loopback(config: &Value) -> std::result::Result<(), TranslateError> {
    let Some(sections) = config.as_object() else {
        return Ok(());
    };

    for (section, entries) in sections {
        let Some(entries) = entries.as_object() else {
            continue;
        };
        for (key, value) in entries {
            let key_lower = key.to_ascii_lowercase();
            if !(key_lower.starts_with("connection") || key_lower.starts_with("db_1")) {
                continue;
            }
            let Some(value) = value.as_str() else {
                continue;
            };
            if is_loopback_connection(value) {
                return Err(TranslateError::LoopbackConnection {
                    section: section.clone(),
                    key: key.clone(),
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn is_loopback_connection(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    value.contains("@localhost:") || value.contains("@127.0.0.1:")
}
