//! イメージの取得可否判定

use crate::error::{ContainerError, Result};
use crate::runtime::ContainerEngine;
use szgo_core::{RunContext, ServiceSpec, parse_image_tag};

/// プル結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled,
    /// ローカルに既に存在（ネットワークアクセスなし）
    AlreadyPresent,
    /// 1回のプルに失敗
    NotFound,
}

/// エンジンのイメージストアへの問い合わせとプル
pub struct ImageAvailability<'a, E: ContainerEngine> {
    engine: &'a E,
}

impl<'a, E: ContainerEngine> ImageAvailability<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// イメージを取得
    ///
    /// `force` が false でローカルに存在する場合はプルしません。
    /// プルは1回だけ試行し、失敗の重大度は呼び出し側が判断します。
    pub async fn pull(&self, reference: &str, force: bool) -> Result<PullOutcome> {
        if !force && self.engine.image_exists(reference).await? {
            tracing::debug!(image = %reference, "イメージは既に存在します");
            return Ok(PullOutcome::AlreadyPresent);
        }

        match self.engine.pull_image(reference).await {
            Ok(()) => {
                tracing::info!(image = %reference, "イメージをプルしました");
                Ok(PullOutcome::Pulled)
            }
            Err(ContainerError::EngineUnavailable(message)) => {
                Err(ContainerError::EngineUnavailable(message))
            }
            Err(e) => {
                tracing::warn!(image = %reference, error = %e, "イメージのプルに失敗");
                Ok(PullOutcome::NotFound)
            }
        }
    }

    /// ローカルにある `image_name` のタグ一覧（昇順・重複なし）
    pub async fn local_tags(&self, image_name: &str) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .engine
            .list_image_references()
            .await?
            .iter()
            .filter_map(|reference| {
                let (name, tag) = parse_image_tag(reference);
                (name == image_name).then(|| tag.to_string())
            })
            .collect();

        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    /// サービスのイメージを利用可能にする
    ///
    /// - 必須サービスのイメージが用意できなければ `ImageUnavailable`
    /// - 任意サービスなら警告して `Ok(false)`（そのサービスは起動しない）
    ///
    /// レジストリに到達できない場合（`pull_enabled == false`）は
    /// ローカルの存在確認のみ行います。
    pub async fn ensure_available(
        &self,
        spec: &ServiceSpec,
        reference: &str,
        ctx: &RunContext,
    ) -> Result<bool> {
        let available = if ctx.pull_enabled {
            self.pull(reference, ctx.force_pull).await? != PullOutcome::NotFound
        } else {
            self.engine.image_exists(reference).await?
        };

        if available {
            return Ok(true);
        }

        if spec.required {
            Err(ContainerError::ImageUnavailable {
                image: reference.to_string(),
            })
        } else {
            tracing::warn!(
                service = %spec.key,
                image = %reference,
                "イメージを利用できないためスキップします"
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeEngine};
    use szgo_core::ServiceKey;

    const API: &str = "senzing/senzing-api-server:3.4.1";

    #[tokio::test]
    async fn test_pull_already_present_without_network() {
        let engine = FakeEngine::new().with_image(API);
        let images = ImageAvailability::new(&engine);

        assert_eq!(
            images.pull(API, false).await.unwrap(),
            PullOutcome::AlreadyPresent
        );
        assert!(
            !engine
                .calls()
                .iter()
                .any(|c| matches!(c, EngineCall::PullImage(_)))
        );
    }

    #[tokio::test]
    async fn test_pull_forced() {
        let engine = FakeEngine::new().with_image(API).with_pullable(API);
        let images = ImageAvailability::new(&engine);

        assert_eq!(images.pull(API, true).await.unwrap(), PullOutcome::Pulled);
        assert!(engine.calls().contains(&EngineCall::PullImage(API.to_string())));
    }

    #[tokio::test]
    async fn test_pull_not_found() {
        let engine = FakeEngine::new();
        let images = ImageAvailability::new(&engine);

        assert_eq!(images.pull(API, false).await.unwrap(), PullOutcome::NotFound);
        // 1回だけ試行
        let pulls = engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::PullImage(_)))
            .count();
        assert_eq!(pulls, 1);
    }

    #[tokio::test]
    async fn test_local_tags() {
        let engine = FakeEngine::new()
            .with_image("senzing/senzing-api-server:3.4.1")
            .with_image("senzing/senzing-api-server:latest")
            .with_image("senzing/entity-search-web-app:2.7.2")
            .with_image("myregistry:5000/senzing/senzing-api-server:3.9.9");
        let images = ImageAvailability::new(&engine);

        let tags = images.local_tags("senzing/senzing-api-server").await.unwrap();
        assert_eq!(tags, vec!["3.4.1".to_string(), "latest".to_string()]);
    }

    #[tokio::test]
    async fn test_ensure_available_required_missing_is_fatal() {
        let engine = FakeEngine::new();
        let images = ImageAvailability::new(&engine);
        let ctx = RunContext::new("demo", "localhost");
        let spec = ServiceSpec::new(ServiceKey::Api, "demo");

        let result = images.ensure_available(&spec, API, &ctx).await;
        assert!(matches!(
            result,
            Err(ContainerError::ImageUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_available_optional_missing_is_skipped() {
        let engine = FakeEngine::new();
        let images = ImageAvailability::new(&engine);
        let ctx = RunContext::new("demo", "localhost").with_pull_enabled(false);
        let spec = ServiceSpec::new(ServiceKey::Swagger, "demo");

        let available = images
            .ensure_available(&spec, "swaggerapi/swagger-ui:latest", &ctx)
            .await
            .unwrap();
        assert!(!available);
        // レジストリ到達不可ならプルしない
        assert!(
            !engine
                .calls()
                .iter()
                .any(|c| matches!(c, EngineCall::PullImage(_)))
        );
    }
}
