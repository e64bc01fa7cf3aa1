use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "データベース設定ファイルが見つかりません: {0}\n\nヒント:\n  • --ini-file で G2Module.ini のパスを指定してください\n  • または SZGO_INI_FILE 環境変数で指定できます"
    )]
    IniFileNotFound(PathBuf),

    #[error(
        "SENZING_ROOT が設定されていません\n\nヒント:\n  • プロジェクトの setupEnv を source してから実行してください\n  • SENZING_ROOT なしで使えるのは save / load のみです"
    )]
    SenzingRootNotSet,

    #[error("{path} を読み込めません: {source}")]
    IniRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("INI ファイルの {line} 行目が不正です: {message}")]
    IniSyntax { line: usize, message: String },

    #[error("JSON 変換エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
