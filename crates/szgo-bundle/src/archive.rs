//! tar.gz の作成と展開

use crate::error::Result;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

/// ファイルを1つの tar.gz にまとめる
///
/// ディレクトリ構造は持たず、各ファイルのベース名だけで格納します。
pub fn pack(files: &[PathBuf], destination: &Path) -> Result<()> {
    tracing::debug!(archive = %destination.display(), files = files.len(), "バンドルを作成");

    let file = File::create(destination)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = Builder::new(encoder);

    for path in files {
        let name = path
            .file_name()
            .ok_or_else(|| std::io::Error::other(format!("不正なファイル名: {}", path.display())))?;
        tar.append_path_with_name(path, name)?;
    }

    tar.into_inner()?.finish()?;
    Ok(())
}

/// tar.gz を展開し、展開先直下のファイルを名前順で返す
pub fn unpack(archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    tracing::debug!(archive = %archive.display(), to = %destination.display(), "バンドルを展開");

    let decoder = GzDecoder::new(File::open(archive)?);
    Archive::new(decoder).unpack(destination)?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(destination)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    Ok(files)
}

/// エンジンのイメージエクスポート（manifest.json を含む tar）か
pub fn is_image_archive(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut archive = Archive::new(file);
    let Ok(entries) = archive.entries() else {
        return false;
    };

    entries
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            entry
                .path()
                .map(|p| p == Path::new("manifest.json"))
                .unwrap_or(false)
        })
}
