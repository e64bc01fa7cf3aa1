use std::path::PathBuf;
use szgo_container::ContainerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error(
        "保存するイメージがありません\n\nヒント:\n  • 先に szgo up を実行してイメージを取得してください\n  • または --images でイメージを指定してください"
    )]
    NoImages,

    #[error("バンドルファイルが見つかりません: {0}")]
    ArchiveNotFound(PathBuf),

    #[error("バンドルにイメージが含まれていません: {0}")]
    EmptyBundle(PathBuf),

    #[error(
        "バンドル内の {entry} はイメージアーカイブではありません\n\nヒント:\n  • szgo save で作成したバンドルか確認してください"
    )]
    InvalidEntry { entry: PathBuf },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("バンドルの読み書きに失敗しました: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BundleError>;
