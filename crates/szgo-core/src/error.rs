use std::path::PathBuf;
use thiserror::Error;

/// データベース設定の変換エラー
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("設定エラー: [{0}] セクションがありません")]
    MissingSection(String),

    #[error("設定エラー: [{section}] セクションに '{key}' がありません")]
    MissingKey { section: String, key: String },

    #[error("接続文字列を解析できません: {connection}\n理由: {reason}")]
    ConnectionParse {
        connection: String,
        reason: &'static str,
    },

    #[error(
        "サポートされていないデータベース種別です: {0}\n\nヒント:\n  • sqlite3, postgresql, mysql, db2 のいずれかを使用してください"
    )]
    UnsupportedBackend(String),

    #[error(
        "接続文字列に localhost / 127.0.0.1 は使用できません: [{section}] {key} = {value}\n\nヒント:\n  • コンテナ内からはコンテナ自身を指してしまうため、ホスト名またはIPアドレスを指定してください"
    )]
    LoopbackConnection {
        section: String,
        key: String,
        value: String,
    },

    #[error("{backend} を使用するための前提条件を満たしていません: {message}")]
    BackendPrerequisite {
        backend: &'static str,
        message: String,
    },

    #[error(
        "sqlite クラスタ構成では全てのデータベースファイルを同じディレクトリに配置する必要があります:\n{}",
        format_directories(.directories)
    )]
    DivergentShardDirectories { directories: Vec<PathBuf> },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("デプロイ計画が不正です: {0}")]
    InvalidPlan(String),
}

fn format_directories(directories: &[PathBuf]) -> String {
    directories
        .iter()
        .map(|d| format!("  • {}", d.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, CoreError>;
