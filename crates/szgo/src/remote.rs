//! ネットワーク越しのリソース取得

use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use szgo_core::{RetryPolicy, VersionManifest, retry};

pub const DOCKER_LATEST_URL: &str =
    "https://raw.githubusercontent.com/Senzing/knowledge-base/main/lists/docker-versions-latest.sh";
pub const DOCKER_STABLE_URL: &str =
    "https://raw.githubusercontent.com/Senzing/knowledge-base/main/lists/docker-versions-stable.sh";
pub const DOCKERHUB_URL: &str = "https://hub.docker.com/u/senzing/";

/// 使用するバージョン一覧の URL
pub fn manifest_url(stable: bool) -> &'static str {
    if stable {
        DOCKER_STABLE_URL
    } else {
        DOCKER_LATEST_URL
    }
}

/// REST API サーバーが公開する OpenAPI 仕様のパス
pub const API_SPEC_PATH: &str = "specifications/open-api";
/// 取得した API 仕様のファイル名（Swagger UI にマウント）
pub const API_SPEC_FILE: &str = "SzGo-rest-api.json";

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);
const API_SPEC_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RemoteClient {
    http: reqwest::Client,
}

impl RemoteClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("szgo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// URL に到達できるか（3回 × 1秒間隔）
    pub async fn is_reachable(&self, url: &str) -> bool {
        print!("    {}", url);
        flush_stdout();
        let result = retry(
            &RetryPolicy::reachability(),
            |_| async move {
                self.http
                    .get(url)
                    .timeout(REACHABILITY_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()
            },
            |_, _, _| {
                print!(".");
                flush_stdout();
            },
        )
        .await;

        match result {
            Ok(_) => {
                println!(" {}", "Available".green());
                true
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "到達できません");
                println!(" {}", "Unavailable".yellow());
                false
            }
        }
    }

    /// バージョン一覧を取得（取得できなければ None）
    pub async fn fetch_manifest(&self, url: &str) -> Option<VersionManifest> {
        let text: Result<String, reqwest::Error> = async {
            self.http
                .get(url)
                .timeout(REACHABILITY_TIMEOUT)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        }
        .await;

        match text {
            Ok(text) => {
                let manifest = VersionManifest::parse(&text);
                tracing::debug!(%url, entries = manifest.len(), "バージョン一覧を取得");
                Some(manifest)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "バージョン一覧を取得できません");
                None
            }
        }
    }

    /// REST API サーバーから OpenAPI 仕様（`data` 部分）を取得
    pub async fn fetch_api_spec(&self, base_url: &str) -> anyhow::Result<Value> {
        let url = format!("{}/{}", base_url, API_SPEC_PATH);
        let target = url.as_str();

        let response: Value = retry(
            &RetryPolicy::api_spec(),
            |_| async move {
                self.http
                    .get(target)
                    .timeout(API_SPEC_TIMEOUT)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Value>()
                    .await
            },
            |_, err, delay| {
                println!(
                    "    {} REST API サーバーからの応答待ち、{}秒後に再試行します ({})",
                    "ℹ".blue(),
                    delay.as_secs(),
                    err
                );
            },
        )
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "REST API サーバーから API 仕様を取得できません: {}\n\nヒント:\n  • szgo logs で REST API サーバーのログを確認してください",
                e
            )
        })?;

        response
            .get("data")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("API 仕様のレスポンスに data がありません: {}", url))
    }
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

/// API 仕様を書き出す
pub fn write_api_spec(var_path: &Path, spec: &Value) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(var_path)?;
    let path = var_path.join(API_SPEC_FILE);
    std::fs::write(&path, serde_json::to_string(spec)?)?;
    tracing::debug!(path = %path.display(), "API 仕様を書き込み");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_url() {
        assert!(manifest_url(true).ends_with("docker-versions-stable.sh"));
        assert!(manifest_url(false).ends_with("docker-versions-latest.sh"));
    }

    #[test]
    fn test_write_api_spec() {
        let temp_dir = tempfile::tempdir().unwrap();
        let spec = serde_json::json!({"openapi": "3.0.1", "paths": {}});

        let path = write_api_spec(temp_dir.path(), &spec).unwrap();
        assert!(path.ends_with(API_SPEC_FILE));

        let back: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, spec);
    }
}
