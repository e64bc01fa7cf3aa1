//! サービス定義
//!
//! SzGo がデプロイするサービスは3つに固定されています。
//! API サーバーのみが必須で、Web アプリと Swagger UI は欠けても続行します。

use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_IMAGE: &str = "senzing/senzing-api-server";
pub const WEB_APP_IMAGE: &str = "senzing/entity-search-web-app";
pub const SWAGGER_IMAGE: &str = "swaggerapi/swagger-ui";

/// サービスキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKey {
    /// REST API サーバー（必須）
    Api,
    /// Entity Search Web アプリ
    WebApp,
    /// Swagger UI（API ドキュメント）
    Swagger,
}

impl ServiceKey {
    /// 起動順（依存順）に並べた全サービス
    pub const ALL: [ServiceKey; 3] = [ServiceKey::Api, ServiceKey::WebApp, ServiceKey::Swagger];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::WebApp => "webapp",
            Self::Swagger => "swagger",
        }
    }

    pub fn image_name(&self) -> &'static str {
        match self {
            Self::Api => API_IMAGE,
            Self::WebApp => WEB_APP_IMAGE,
            Self::Swagger => SWAGGER_IMAGE,
        }
    }

    /// リモートのバージョンマニフェスト内のキー
    pub fn manifest_key(&self) -> &'static str {
        match self {
            Self::Api => "SENZING_DOCKER_IMAGE_VERSION_SENZING_API_SERVER",
            Self::WebApp => "SENZING_DOCKER_IMAGE_VERSION_ENTITY_SEARCH_WEB_APP",
            Self::Swagger => "SENZING_DOCKER_IMAGE_VERSION_SWAGGERAPI_SWAGGER_UI",
        }
    }

    /// コンテナ名のプレフィックス（`{prefix}-{project}`）
    pub fn container_prefix(&self) -> &'static str {
        match self {
            Self::Api => "SzGo-API",
            Self::WebApp => "SzGo-WEB",
            Self::Swagger => "SzGo-Swagger",
        }
    }

    pub fn container_port(&self) -> u16 {
        match self {
            Self::Api => 8250,
            Self::WebApp => 8081,
            Self::Swagger => 8080,
        }
    }

    pub fn default_host_port(&self) -> u16 {
        match self {
            Self::Api => 8250,
            Self::WebApp => 8251,
            Self::Swagger => 9180,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Api)
    }

    /// 表示用の名前
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Api => "REST API Server",
            Self::WebApp => "Web App demo",
            Self::Swagger => "Swagger UI",
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// サービス定義
///
/// 起動時に静的な知識から一度だけ作られ、以降はオーバーライドによる
/// `container_name` / `host_port` の上書き以外で変更されません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub key: ServiceKey,
    pub image_name: String,
    pub container_name: String,
    pub container_port: u16,
    pub host_port: u16,
    pub required: bool,
}

impl ServiceSpec {
    pub fn new(key: ServiceKey, project_name: &str) -> Self {
        Self {
            key,
            image_name: key.image_name().to_string(),
            container_name: container_name(key, project_name),
            container_port: key.container_port(),
            host_port: key.default_host_port(),
            required: key.is_required(),
        }
    }

    /// 3サービス全てを起動順で生成
    pub fn defaults(project_name: &str) -> Vec<Self> {
        ServiceKey::ALL
            .into_iter()
            .map(|key| Self::new(key, project_name))
            .collect()
    }

    pub fn with_host_port(mut self, port: u16) -> Self {
        self.host_port = port;
        self
    }

    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = name.into();
        self
    }

    /// `image:tag` 形式のイメージ参照
    pub fn image_reference(&self, tag: &str) -> String {
        format!("{}:{}", self.image_name, tag)
    }
}

/// コンテナ名を生成
pub fn container_name(key: ServiceKey, project_name: &str) -> String {
    format!("{}-{}", key.container_prefix(), project_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_order_and_required() {
        let specs = ServiceSpec::defaults("G2Project");

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].key, ServiceKey::Api);
        assert!(specs[0].required);
        assert!(!specs[1].required);
        assert!(!specs[2].required);
        assert_eq!(specs[0].container_name, "SzGo-API-G2Project");
        assert_eq!(specs[1].container_name, "SzGo-WEB-G2Project");
        assert_eq!(specs[2].container_name, "SzGo-Swagger-G2Project");
    }

    #[test]
    fn test_ports() {
        let api = ServiceSpec::new(ServiceKey::Api, "p");
        assert_eq!(api.container_port, 8250);
        assert_eq!(api.host_port, 8250);

        let swagger = ServiceSpec::new(ServiceKey::Swagger, "p").with_host_port(19180);
        assert_eq!(swagger.container_port, 8080);
        assert_eq!(swagger.host_port, 19180);
    }

    #[test]
    fn test_image_reference() {
        let web = ServiceSpec::new(ServiceKey::WebApp, "p");
        assert_eq!(
            web.image_reference("2.3.1"),
            "senzing/entity-search-web-app:2.3.1"
        );
    }
}
