pub mod error;
pub mod ini;

pub use error::*;
pub use ini::{load_ini, parse_ini};

use serde_json::Value;
use std::path::{Path, PathBuf};

/// INI ファイルのパスを指定する環境変数
pub const INI_FILE_ENV: &str = "SZGO_INI_FILE";
pub const SENZING_ROOT_ENV: &str = "SENZING_ROOT";
pub const DEFAULT_INI_NAME: &str = "G2Module.ini";
/// 変換済み JSON のファイル名サフィックス（`G2Module.ini_SzGo.json`）
pub const TRANSLATED_SUFFIX: &str = "_SzGo.json";

/// SENZING_ROOT を取得（未設定または空なら None）
pub fn senzing_root() -> Option<PathBuf> {
    std::env::var_os(SENZING_ROOT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 一時ファイル置き場
///
/// プロジェクト内なら `$SENZING_ROOT/var`、そうでなければ `/tmp`。
pub fn var_path(senzing_root: Option<&Path>) -> PathBuf {
    match senzing_root {
        Some(root) => root.join("var"),
        None => PathBuf::from("/tmp"),
    }
}

/// データベース設定（G2Module.ini）を探す
///
/// 以下の優先順位で検索:
/// 1. 明示的に指定されたパス
/// 2. 環境変数 SZGO_INI_FILE
/// 3. $SENZING_ROOT/etc/G2Module.ini
pub fn find_ini_file(explicit: Option<&Path>, senzing_root: Option<&Path>) -> Result<PathBuf> {
    // 1. 明示指定（存在しなければそのままエラー）
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }

    // 2. 環境変数で指定
    if let Some(path) = std::env::var_os(INI_FILE_ENV).filter(|v| !v.is_empty()) {
        return existing(PathBuf::from(path));
    }

    // 3. プロジェクトのデフォルト
    let root = senzing_root.ok_or(ConfigError::SenzingRootNotSet)?;
    existing(root.join("etc").join(DEFAULT_INI_NAME))
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(std::path::absolute(&path)?)
    } else {
        Err(ConfigError::IniFileNotFound(path))
    }
}

/// SENZING_ROOT のディレクトリ名からプロジェクト名を生成
///
/// Docker のコンテナ名に使えない文字（`[A-Za-z0-9_.-]` 以外）は取り除きます。
pub fn project_name(senzing_root: &Path) -> String {
    let raw = senzing_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    if cleaned != raw {
        tracing::info!(original = %raw, suffix = %cleaned, "プロジェクト名から使用できない文字を除去");
    }

    cleaned
}

/// 変換済み設定ファイルのファイル名（`<ini>_SzGo.json`）
pub fn translated_file_name(ini_file: &Path) -> String {
    let name = ini_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_INI_NAME.to_string());
    format!("{}{}", name, TRANSLATED_SUFFIX)
}

/// 変換済み設定を INI ファイルと同じディレクトリに書き出す
///
/// API サーバーコンテナにマウントされる etc/ に置かれるため、
/// 所有者のみ読み書きできる権限（0600）で作成します。
pub fn write_translated(ini_file: &Path, config: &Value) -> Result<PathBuf> {
    let dir = ini_file.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(translated_file_name(ini_file));
    let json = serde_json::to_string(config)?;

    write_private(&path, json.as_bytes())?;
    tracing::debug!(path = %path.display(), "変換済み設定を書き込み");

    Ok(path)
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // 既存ファイルの場合 mode() は効かないので明示的に設定
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
