//! デプロイ計画から Docker API パラメータへの変換

use crate::runtime::{ContainerRequest, PortMapping};
use bollard::container::{Config, CreateContainerOptions};
use bollard::models::{HostConfig, PortBinding};
use std::collections::HashMap;
use szgo_core::{PlannedService, RunContext};

pub const LABEL_PROJECT: &str = "szgo.project";
pub const LABEL_SERVICE: &str = "szgo.service";

impl ContainerRequest {
    /// 計画内のサービスからコンテナ作成リクエストを生成
    pub fn from_planned(service: &PlannedService, ctx: &RunContext) -> Self {
        Self {
            name: service.spec.container_name.clone(),
            image: service.image_reference(),
            env: service.environment.clone(),
            ports: vec![PortMapping {
                container: service.spec.container_port,
                host: service.spec.host_port,
            }],
            volumes: service.volumes.clone(),
            network: Some(ctx.network_name.clone()),
            command: service.command.clone(),
            user: service.user.clone(),
            hostname: service.hostname.clone(),
            labels: vec![
                (LABEL_PROJECT.to_string(), ctx.project_name.clone()),
                (LABEL_SERVICE.to_string(), service.key().to_string()),
            ],
        }
    }
}

/// リクエストを Docker のコンテナ設定に変換
#[allow(deprecated)]
pub fn request_to_container_config(
    request: &ContainerRequest,
) -> (Config<String>, CreateContainerOptions<String>) {
    // 環境変数の設定
    let env: Vec<String> = request
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    // ポートバインディングの設定
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();

    for port in &request.ports {
        let container_port = format!("{}/tcp", port.container);

        exposed_ports.insert(container_port.clone(), HashMap::new());
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(port.host.to_string()),
            }]),
        );
    }

    // ボリュームバインディング
    let binds: Vec<String> = request.volumes.iter().map(|v| v.bind_spec()).collect();

    let host_config = Some(HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        network_mode: request.network.clone(),
        ..Default::default()
    });

    let labels: HashMap<String, String> = request.labels.iter().cloned().collect();

    let config = Config {
        image: Some(request.image.clone()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config,
        labels: Some(labels),
        cmd: request.command.clone(),
        user: request.user.clone(),
        hostname: request.hostname.clone(),
        tty: Some(true),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: request.name.clone(),
        platform: None,
    };

    (config, options)
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use szgo_core::{ResolvedImage, ServiceKey, ServiceSpec, TagSource, VolumeBinding};

    fn planned(key: ServiceKey, tag: &str) -> PlannedService {
        PlannedService::new(
            ServiceSpec::new(key, "G2Project"),
            ResolvedImage {
                service: key,
                tag: tag.to_string(),
                source: TagSource::Remote,
            },
        )
    }

    fn ctx() -> RunContext {
        RunContext::new("G2Project", "myhost")
    }

    #[test]
    fn test_basic_request() {
        let request = ContainerRequest::from_planned(&planned(ServiceKey::Api, "3.4.1"), &ctx());
        let (config, options) = request_to_container_config(&request);

        assert_eq!(
            config.image,
            Some("senzing/senzing-api-server:3.4.1".to_string())
        );
        assert_eq!(options.name, "SzGo-API-G2Project");
        assert_eq!(config.tty, Some(true));
        assert_eq!(
            config.host_config.unwrap().network_mode,
            Some("szgo-network".to_string())
        );
    }

    #[test]
    fn test_ports() {
        let web = planned(ServiceKey::WebApp, "2.7.2");
        let (config, _) = request_to_container_config(&ContainerRequest::from_planned(&web, &ctx()));

        let exposed_ports = config.exposed_ports.unwrap();
        assert!(exposed_ports.contains_key("8081/tcp"));

        let port_bindings = config.host_config.unwrap().port_bindings.unwrap();
        let binding = port_bindings.get("8081/tcp").unwrap().as_ref().unwrap();
        assert_eq!(binding[0].host_port, Some("8251".to_string()));
        assert_eq!(binding[0].host_ip, Some("0.0.0.0".to_string()));
    }

    #[test]
    fn test_environment_volumes_and_command() {
        let api = planned(ServiceKey::Api, "latest")
            .with_env("SENZING_INIT_JSON", "")
            .with_volume(VolumeBinding::read_write("/opt/p", "/opt/senzing/g2"))
            .with_volume(VolumeBinding::read_only("/opt/p/var/spec.json", "/var/tmp/spec.json"))
            .with_command(vec!["java".to_string(), "-jar".to_string()])
            .with_user("1000")
            .with_hostname("SzGo-API-G2Project");

        let (config, _) = request_to_container_config(&ContainerRequest::from_planned(&api, &ctx()));

        assert_eq!(config.env.unwrap(), vec!["SENZING_INIT_JSON=".to_string()]);
        let binds = config.host_config.unwrap().binds.unwrap();
        assert_eq!(
            binds,
            vec![
                "/opt/p:/opt/senzing/g2:rw".to_string(),
                "/opt/p/var/spec.json:/var/tmp/spec.json:ro".to_string(),
            ]
        );
        assert_eq!(config.cmd.unwrap(), vec!["java", "-jar"]);
        assert_eq!(config.user, Some("1000".to_string()));
        assert_eq!(config.hostname, Some("SzGo-API-G2Project".to_string()));
    }

    #[test]
    fn test_labels() {
        let swagger = planned(ServiceKey::Swagger, "latest");
        let (config, _) =
            request_to_container_config(&ContainerRequest::from_planned(&swagger, &ctx()));

        let labels = config.labels.unwrap();
        assert_eq!(labels.get(LABEL_PROJECT), Some(&"G2Project".to_string()));
        assert_eq!(labels.get(LABEL_SERVICE), Some(&"swagger".to_string()));
        assert_eq!(labels.len(), 2);
    }
}
