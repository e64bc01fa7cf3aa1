//! イメージ解決結果

use super::service::ServiceKey;
use serde::{Deserialize, Serialize};

/// タグの決定元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSource {
    /// 呼び出し側による明示指定
    Override,
    /// リモートのバージョンマニフェスト
    Remote,
    /// マニフェスト取得不可時のローカルイメージ
    LocalFallback,
    /// どれにも該当しない場合の "latest"
    Default,
}

/// サービスごとに解決されたイメージタグ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub service: ServiceKey,
    pub tag: String,
    pub source: TagSource,
}

/// イメージ名とタグを分離
/// 例: "senzing/senzing-api-server:3.4.0" -> ("senzing/senzing-api-server", "3.4.0")
///     "localhost:5000/swagger-ui" -> ("localhost:5000/swagger-ui", "latest")
pub fn parse_image_tag(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        // レジストリのポート番号（"host:5000/..."）はタグではない
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, "latest"),
    }
}
