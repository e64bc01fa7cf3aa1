//! バンドルのエクスポート・インポート

use crate::archive::{is_image_archive, pack, unpack};
use crate::error::{BundleError, Result};
use crate::naming::{archive_name, entry_name, scratch_dir_name, select_default_images};
use chrono::Local;
use std::path::{Path, PathBuf};
use szgo_container::ContainerEngine;

/// インポート結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// 読み込んだエントリのファイル名
    pub loaded: Vec<String>,
}

pub struct BundleManager<'a, E: ContainerEngine> {
    engine: &'a E,
}

impl<'a, E: ContainerEngine> BundleManager<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// 保存対象が指定されなかった場合のデフォルト
    pub async fn default_images(&self) -> Result<Vec<String>> {
        let local = self.engine.list_image_references().await?;
        Ok(select_default_images(&local))
    }

    /// イメージを1つの tar.gz にまとめ、そのパスを返す
    ///
    /// イメージごとの中間ファイルは成否にかかわらず削除します。
    pub async fn export_bundle(
        &self,
        references: &[String],
        destination_dir: &Path,
    ) -> Result<PathBuf> {
        if references.is_empty() {
            return Err(BundleError::NoImages);
        }
        std::fs::create_dir_all(destination_dir)?;

        let mut intermediates = Vec::with_capacity(references.len());
        let mut result: Result<()> = Ok(());

        for reference in references {
            let path = destination_dir.join(entry_name(reference));
            tracing::info!(image = %reference, file = %path.display(), "イメージを書き出し");

            if let Err(e) = self.engine.save_image(reference, &path).await {
                // 途中まで書かれたファイルも削除対象
                intermediates.push(path);
                result = Err(e.into());
                break;
            }
            intermediates.push(path);
        }

        let archive = destination_dir.join(archive_name(&Local::now()));
        if result.is_ok() {
            result = pack(&intermediates, &archive);
        }

        for path in &intermediates {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "中間ファイルを削除できません");
                }
            }
        }

        result?;
        tracing::info!(archive = %archive.display(), images = references.len(), "バンドルを作成しました");
        Ok(archive)
    }

    /// バンドルを展開してイメージを読み込む
    ///
    /// 全エントリがイメージアーカイブであることを確認してから読み込みを始めます。
    /// 作業ディレクトリは成否にかかわらず削除します。
    pub async fn import_bundle(&self, archive: &Path, scratch_root: &Path) -> Result<ImportReport> {
        if !archive.is_file() {
            return Err(BundleError::ArchiveNotFound(archive.to_path_buf()));
        }

        std::fs::create_dir_all(scratch_root)?;
        let scratch = create_scratch_dir(scratch_root, &scratch_dir_name(&Local::now()))?;

        let result = self.load_from(archive, &scratch).await;

        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            tracing::warn!(dir = %scratch.display(), error = %e, "作業ディレクトリを削除できません");
        }

        result
    }

    async fn load_from(&self, archive: &Path, scratch: &Path) -> Result<ImportReport> {
        let entries = unpack(archive, scratch)?;
        if entries.is_empty() {
            return Err(BundleError::EmptyBundle(archive.to_path_buf()));
        }

        if let Some(invalid) = entries.iter().find(|entry| !is_image_archive(entry)) {
            return Err(BundleError::InvalidEntry {
                entry: invalid.file_name().map(PathBuf::from).unwrap_or_default(),
            });
        }

        let mut loaded = Vec::with_capacity(entries.len());
        for entry in &entries {
            tracing::info!(file = %entry.display(), "イメージを読み込み");
            self.engine.load_image(entry).await?;
            loaded.push(
                entry
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }

        Ok(ImportReport { loaded })
    }
}

/// 既存のディレクトリは再利用せず、衝突したら連番を付けて作成する
fn create_scratch_dir(root: &Path, name: &str) -> Result<PathBuf> {
    let mut candidate = root.join(name);
    let mut suffix = 1;
    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(dir = %candidate.display(), "作業ディレクトリが既に存在");
                candidate = root.join(format!("{}_{}", name, suffix));
                suffix += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use szgo_container::ContainerError;
    use szgo_container::testing::{EngineCall, FakeEngine};
    use tempfile::tempdir;

    const API: &str = "senzing/senzing-api-server:3.4.1";
    const WEB: &str = "senzing/entity-search-web-app:2.7.2";

    fn refs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_export_then_import_round_trip() {
        let out = tempdir().unwrap();
        let source = FakeEngine::new().with_image(API).with_image(WEB);

        let archive = BundleManager::new(&source)
            .export_bundle(&refs(&[API, WEB]), out.path())
            .await
            .unwrap();

        // 残るのはバンドルのみ
        let names = dir_entries(out.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("SzGoImages_"));
        assert!(names[0].ends_with(".tgz"));

        let target = FakeEngine::new();
        let scratch = tempdir().unwrap();
        let report = BundleManager::new(&target)
            .import_bundle(&archive, scratch.path())
            .await
            .unwrap();

        assert_eq!(report.loaded.len(), 2);
        assert!(target.has_image(API));
        assert!(target.has_image(WEB));
        // 作業ディレクトリは削除される
        assert!(dir_entries(scratch.path()).is_empty());
    }

    #[test]
    fn test_create_scratch_dir_avoids_existing() {
        let root = tempdir().unwrap();
        let existing = root.path().join("SzGo_Extract_20240101_000000");
        fs::create_dir(&existing).unwrap();
        fs::write(existing.join("other.tar"), b"in use").unwrap();

        let first = create_scratch_dir(root.path(), "SzGo_Extract_20240101_000000").unwrap();
        let second = create_scratch_dir(root.path(), "SzGo_Extract_20240101_000000").unwrap();

        assert_eq!(first, root.path().join("SzGo_Extract_20240101_000000_1"));
        assert_eq!(second, root.path().join("SzGo_Extract_20240101_000000_2"));
        assert_eq!(fs::read(existing.join("other.tar")).unwrap(), b"in use");
    }

    #[tokio::test]
    async fn test_import_leaves_other_scratch_dirs_alone() {
        let out = tempdir().unwrap();
        let source = FakeEngine::new().with_image(API);
        let archive = BundleManager::new(&source)
            .export_bundle(&refs(&[API]), out.path())
            .await
            .unwrap();

        let scratch = tempdir().unwrap();
        let other = scratch.path().join(scratch_dir_name(&Local::now()));
        fs::create_dir(&other).unwrap();
        fs::write(other.join("other.tar"), b"in use").unwrap();

        let target = FakeEngine::new();
        BundleManager::new(&target)
            .import_bundle(&archive, scratch.path())
            .await
            .unwrap();

        assert!(target.has_image(API));
        assert_eq!(fs::read(other.join("other.tar")).unwrap(), b"in use");
        assert_eq!(
            dir_entries(scratch.path()),
            vec![other.file_name().unwrap().to_string_lossy().into_owned()]
        );
    }

    #[tokio::test]
    async fn test_export_missing_image_cleans_up() {
        let out = tempdir().unwrap();
        let engine = FakeEngine::new().with_image(API);

        let result = BundleManager::new(&engine)
            .export_bundle(&refs(&[API, WEB]), out.path())
            .await;

        assert!(matches!(
            result,
            Err(BundleError::Container(ContainerError::ImageUnavailable { .. }))
        ));
        assert!(dir_entries(out.path()).is_empty());
    }

    #[tokio::test]
    async fn test_export_without_images() {
        let out = tempdir().unwrap();
        let engine = FakeEngine::new();

        let result = BundleManager::new(&engine).export_bundle(&[], out.path()).await;
        assert!(matches!(result, Err(BundleError::NoImages)));
    }

    #[tokio::test]
    async fn test_default_images() {
        let engine = FakeEngine::new()
            .with_image("senzing/senzing-api-server:3.4.0")
            .with_image(API)
            .with_image("localhost:5000/senzing/senzing-api-server:9.9.9")
            .with_image("busybox:1.36");

        let images = BundleManager::new(&engine).default_images().await.unwrap();
        assert_eq!(images, refs(&[API]));
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_entry_before_loading() {
        let work = tempdir().unwrap();
        let source = FakeEngine::new().with_image(API);
        let image_tar = work.path().join(entry_name(API));
        source.save_image(API, &image_tar).await.unwrap();
        let notes = work.path().join("notes.txt");
        fs::write(&notes, "not an image").unwrap();

        let archive = work.path().join("bundle.tgz");
        pack(&[image_tar, notes], &archive).unwrap();

        let target = FakeEngine::new();
        let scratch = tempdir().unwrap();
        let result = BundleManager::new(&target)
            .import_bundle(&archive, scratch.path())
            .await;

        match result {
            Err(BundleError::InvalidEntry { entry }) => {
                assert_eq!(entry, PathBuf::from("notes.txt"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(
            !target
                .calls()
                .iter()
                .any(|c| matches!(c, EngineCall::LoadImage(_)))
        );
        assert!(dir_entries(scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_import_missing_archive() {
        let scratch = tempdir().unwrap();
        let engine = FakeEngine::new();

        let result = BundleManager::new(&engine)
            .import_bundle(Path::new("/nonexistent/SzGoImages.tgz"), scratch.path())
            .await;
        assert!(matches!(result, Err(BundleError::ArchiveNotFound(_))));
    }
}
