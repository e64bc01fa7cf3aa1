//! デプロイ計画
//!
//! 実行ごとに一度だけ組み立てられる不変の値です。
//! 並び順がそのまま起動順になり、必須サービス（API）が必ず先頭に来ます。

use super::image::ResolvedImage;
use super::service::{ServiceKey, ServiceSpec};
use super::volume::VolumeBinding;
use crate::error::{CoreError, Result};
use std::collections::HashSet;

/// 計画内の1サービス分のエントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedService {
    pub spec: ServiceSpec,
    pub image: ResolvedImage,
    pub volumes: Vec<VolumeBinding>,
    pub environment: Vec<(String, String)>,
    /// コンテナのコマンド（未指定ならイメージのデフォルト）
    pub command: Option<Vec<String>>,
    pub user: Option<String>,
    pub hostname: Option<String>,
}

impl PlannedService {
    pub fn new(spec: ServiceSpec, image: ResolvedImage) -> Self {
        Self {
            spec,
            image,
            volumes: Vec::new(),
            environment: Vec::new(),
            command: None,
            user: None,
            hostname: None,
        }
    }

    pub fn with_volume(mut self, volume: VolumeBinding) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_volumes(mut self, volumes: impl IntoIterator<Item = VolumeBinding>) -> Self {
        self.volumes.extend(volumes);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn key(&self) -> ServiceKey {
        self.spec.key
    }

    /// `image:tag` 形式の参照
    pub fn image_reference(&self) -> String {
        self.spec.image_reference(&self.image.tag)
    }
}

/// デプロイ計画
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    services: Vec<PlannedService>,
}

impl DeploymentPlan {
    /// 計画を検証して生成
    ///
    /// - 先頭は必須サービスであること
    /// - 必須サービスはちょうど1つ
    /// - サービスキーの重複なし
    /// - 各エントリの解決済みイメージが同じサービスのものであること
    pub fn new(services: Vec<PlannedService>) -> Result<Self> {
        let first = services
            .first()
            .ok_or_else(|| CoreError::InvalidPlan("サービスが1つもありません".to_string()))?;
        if !first.spec.required {
            return Err(CoreError::InvalidPlan(format!(
                "先頭のサービス '{}' が必須サービスではありません",
                first.spec.key
            )));
        }

        let required = services.iter().filter(|s| s.spec.required).count();
        if required != 1 {
            return Err(CoreError::InvalidPlan(format!(
                "必須サービスが{}個あります",
                required
            )));
        }

        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.spec.key) {
                return Err(CoreError::InvalidPlan(format!(
                    "サービス '{}' が重複しています",
                    service.spec.key
                )));
            }
            if service.image.service != service.spec.key {
                return Err(CoreError::InvalidPlan(format!(
                    "サービス '{}' に '{}' のイメージが割り当てられています",
                    service.spec.key, service.image.service
                )));
            }
        }

        Ok(Self { services })
    }

    pub fn required(&self) -> &PlannedService {
        // new() で先頭が必須であることを保証済み
        &self.services[0]
    }

    pub fn optional(&self) -> impl Iterator<Item = &PlannedService> {
        self.services.iter().skip(1)
    }

    pub fn get(&self, key: ServiceKey) -> Option<&PlannedService> {
        self.services.iter().find(|s| s.spec.key == key)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TagSource;

    fn planned(key: ServiceKey) -> PlannedService {
        PlannedService::new(
            ServiceSpec::new(key, "demo"),
            ResolvedImage {
                service: key,
                tag: "latest".to_string(),
                source: TagSource::Default,
            },
        )
    }

    #[test]
    fn test_plan_orders_required_first() {
        let plan = DeploymentPlan::new(vec![
            planned(ServiceKey::Api),
            planned(ServiceKey::WebApp),
            planned(ServiceKey::Swagger),
        ])
        .unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.required().key(), ServiceKey::Api);
        let optional: Vec<_> = plan.optional().map(|s| s.key()).collect();
        assert_eq!(optional, vec![ServiceKey::WebApp, ServiceKey::Swagger]);
    }

    #[test]
    fn test_plan_rejects_optional_first() {
        let result = DeploymentPlan::new(vec![planned(ServiceKey::WebApp), planned(ServiceKey::Api)]);
        assert!(matches!(result, Err(CoreError::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_rejects_empty_and_duplicates() {
        assert!(DeploymentPlan::new(vec![]).is_err());
        assert!(
            DeploymentPlan::new(vec![planned(ServiceKey::Api), planned(ServiceKey::Api)]).is_err()
        );
    }

    #[test]
    fn test_plan_rejects_mismatched_image() {
        let mut web = planned(ServiceKey::WebApp);
        web.image.service = ServiceKey::Swagger;
        assert!(DeploymentPlan::new(vec![planned(ServiceKey::Api), web]).is_err());
    }

    #[test]
    fn test_planned_service_builder() {
        let api = planned(ServiceKey::Api)
            .with_env("A", "1")
            .with_user("1000")
            .with_hostname("SzGo-API-demo")
            .with_volume(VolumeBinding::read_write("/h", "/c"));

        assert_eq!(api.image_reference(), "senzing/senzing-api-server:latest");
        assert_eq!(api.environment, vec![("A".to_string(), "1".to_string())]);
        assert_eq!(api.user.as_deref(), Some("1000"));
        assert_eq!(api.volumes.len(), 1);
    }
}
