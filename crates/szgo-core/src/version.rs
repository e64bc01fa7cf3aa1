//! イメージタグの解決
//!
//! 優先順位（最初に一致したものを採用）:
//! 1. 呼び出し側の明示指定
//! 2. リモートのバージョンマニフェスト（取得できた場合）
//! 3. マニフェスト取得不可時、ローカルにあるタグの辞書順最大（"latest" は他にタグがあれば除外）
//! 4. "latest"
//!
//! ローカルタグの比較は文字列比較であり、セマンティックバージョンは考慮しません。

use crate::model::{ResolvedImage, ServiceKey, TagSource};
use std::collections::HashMap;

pub const LATEST_TAG: &str = "latest";

/// リモートのバージョンマニフェスト
///
/// `export SENZING_DOCKER_IMAGE_VERSION_XXX=1.2.3` 形式の行を持つシェルスクリプトです。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionManifest {
    versions: HashMap<String, String>,
}

impl VersionManifest {
    pub fn parse(text: &str) -> Self {
        let versions = text
            .lines()
            .map(|line| line.trim())
            .map(|line| line.strip_prefix("export ").unwrap_or(line).trim_start())
            .filter(|line| line.starts_with("SENZING_"))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        Self { versions }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.versions.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// サービスのイメージタグを解決
///
/// `manifest` が `None` の場合はマニフェストに到達できなかったことを意味します。
pub fn resolve(
    service: ServiceKey,
    override_tag: Option<&str>,
    manifest: Option<&VersionManifest>,
    local_tags: &[String],
) -> ResolvedImage {
    let (tag, source) = match (override_tag, manifest) {
        (Some(tag), _) => (tag.to_string(), TagSource::Override),
        (None, Some(manifest)) => match manifest.get(service.manifest_key()) {
            Some(tag) => (tag.to_string(), TagSource::Remote),
            None => (LATEST_TAG.to_string(), TagSource::Default),
        },
        (None, None) => match newest_local_tag(local_tags) {
            Some(tag) => (tag, TagSource::LocalFallback),
            None => (LATEST_TAG.to_string(), TagSource::Default),
        },
    };

    tracing::debug!(service = %service, tag = %tag, source = ?source, "イメージタグを解決");

    ResolvedImage {
        service,
        tag,
        source,
    }
}

/// ローカルタグから最新と思われるものを選ぶ
///
/// "latest" 以外のタグがあればその中の辞書順最大、"latest" しかなければ "latest"。
pub fn newest_local_tag(tags: &[String]) -> Option<String> {
    tags.iter()
        .filter(|tag| tag.as_str() != LATEST_TAG)
        .max()
        .or_else(|| tags.iter().find(|tag| tag.as_str() == LATEST_TAG))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"#!/usr/bin/env bash
#
# Generated on 2023-01-10 by dockerhub-util.py version: 1.0.3

export SENZING_DOCKER_IMAGE_VERSION_ADMINER=1.0.0
export SENZING_DOCKER_IMAGE_VERSION_ENTITY_SEARCH_WEB_APP=2.7.2
export SENZING_DOCKER_IMAGE_VERSION_SENZING_API_SERVER=3.4.1
"#;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = VersionManifest::parse(MANIFEST);
        assert_eq!(manifest.len(), 3);
        assert_eq!(
            manifest.get("SENZING_DOCKER_IMAGE_VERSION_SENZING_API_SERVER"),
            Some("3.4.1")
        );
        assert_eq!(manifest.get("SENZING_DOCKER_IMAGE_VERSION_APT"), None);
    }

    #[test]
    fn test_override_always_wins() {
        let manifest = VersionManifest::parse(MANIFEST);
        let local = tags(&["9.9.9", "latest"]);

        for m in [Some(&manifest), None] {
            let resolved = resolve(ServiceKey::Api, Some("1.0.0"), m, &local);
            assert_eq!(resolved.tag, "1.0.0");
            assert_eq!(resolved.source, TagSource::Override);
        }
    }

    #[test]
    fn test_remote_manifest() {
        let manifest = VersionManifest::parse(MANIFEST);
        let resolved = resolve(ServiceKey::WebApp, None, Some(&manifest), &tags(&["9.0.0"]));
        assert_eq!(resolved.tag, "2.7.2");
        assert_eq!(resolved.source, TagSource::Remote);
    }

    #[test]
    fn test_remote_manifest_without_key_uses_default() {
        // マニフェストに到達できた場合、ローカルタグは参照しない
        let manifest = VersionManifest::parse(MANIFEST);
        let resolved = resolve(ServiceKey::Swagger, None, Some(&manifest), &tags(&["v4.15.5"]));
        assert_eq!(resolved.tag, "latest");
        assert_eq!(resolved.source, TagSource::Default);
    }

    #[test]
    fn test_local_fallback_excludes_latest() {
        let resolved = resolve(
            ServiceKey::Api,
            None,
            None,
            &tags(&["1.2.0", "1.3.0", "latest"]),
        );
        assert_eq!(resolved.tag, "1.3.0");
        assert_eq!(resolved.source, TagSource::LocalFallback);
    }

    #[test]
    fn test_local_fallback_only_latest() {
        let resolved = resolve(ServiceKey::Api, None, None, &tags(&["latest"]));
        assert_eq!(resolved.tag, "latest");
        assert_eq!(resolved.source, TagSource::LocalFallback);
    }

    #[test]
    fn test_local_fallback_is_lexicographic() {
        // 文字列比較なので "1.9.0" > "1.10.0"
        assert_eq!(
            newest_local_tag(&tags(&["1.10.0", "1.9.0"])),
            Some("1.9.0".to_string())
        );
    }

    #[test]
    fn test_nothing_available_defaults_to_latest() {
        let resolved = resolve(ServiceKey::WebApp, None, None, &[]);
        assert_eq!(resolved.tag, "latest");
        assert_eq!(resolved.source, TagSource::Default);
    }
}
