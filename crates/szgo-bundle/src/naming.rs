//! バンドル関連のファイル名

use chrono::{DateTime, TimeZone};
use szgo_core::{ServiceKey, parse_image_tag};

/// バンドル内エントリのプレフィックス
pub const ENTRY_PREFIX: &str = "SzGoPackage";
pub const ARCHIVE_PREFIX: &str = "SzGoImages";
pub const SCRATCH_PREFIX: &str = "SzGo_Extract";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// イメージ参照からエントリ名を生成
/// 例: "senzing/senzing-api-server:3.4.1" -> "SzGoPackage-senzing-senzing-api-server-3.4.1.tar"
pub fn entry_name(reference: &str) -> String {
    format!("{}-{}.tar", ENTRY_PREFIX, reference.replace(['/', ':'], "-"))
}

/// `SzGoImages_<YYYYmmdd_HHMMSS>.tgz`
pub fn archive_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.tgz", ARCHIVE_PREFIX, at.format(TIMESTAMP_FORMAT))
}

/// 展開用の作業ディレクトリ名（前回の実行と衝突しないよう時刻付き）
pub fn scratch_dir_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", SCRATCH_PREFIX, at.format(TIMESTAMP_FORMAT))
}

/// ローカルイメージからデフォルトの保存対象を選ぶ
///
/// 既知の3イメージそれぞれについて、辞書順で最大のタグを1つだけ残します。
/// `:` を2つ以上含む参照（レジストリ付きのミラータグ）は対象外です。
pub fn select_default_images(references: &[String]) -> Vec<String> {
    ServiceKey::ALL
        .iter()
        .filter_map(|key| {
            references
                .iter()
                .filter(|reference| reference.matches(':').count() == 1)
                .filter(|reference| parse_image_tag(reference).0 == key.image_name())
                .max_by(|a, b| parse_image_tag(a).1.cmp(parse_image_tag(b).1))
                .cloned()
        })
        .collect()
}
