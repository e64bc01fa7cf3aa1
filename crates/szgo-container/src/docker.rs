//! Docker Engine による ContainerEngine 実装

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::converter::request_to_container_config;
use crate::error::{ContainerError, Result};
use crate::runtime::{
    ContainerEngine, ContainerProbe, ContainerRequest, ContainerState, ContainerSummary,
    HealthState, PublishedPort,
};
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerStateStatusEnum, HealthStatusEnum};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use szgo_core::parse_image_tag;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// ログ取得時に遡る行数
const LOG_TAIL_LINES: &str = "200";

/// イメージ読み込み時の転送単位
const LOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Docker Engine への接続
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// ローカルの Docker に接続して疎通を確認
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::EngineUnavailable(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| ContainerError::EngineUnavailable(e.to_string()))?;

        Ok(Self { docker })
    }
}

fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn map_state(status: Option<ContainerStateStatusEnum>) -> ContainerState {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerState::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerState::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerState::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerState::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerState::Dead,
        _ => ContainerState::Unknown,
    }
}

fn map_health(status: Option<HealthStatusEnum>) -> Option<HealthState> {
    match status {
        Some(HealthStatusEnum::STARTING) => Some(HealthState::Starting),
        Some(HealthStatusEnum::HEALTHY) => Some(HealthState::Healthy),
        Some(HealthStatusEnum::UNHEALTHY) => Some(HealthState::Unhealthy),
        // NONE / EMPTY はヘルスチェック未定義
        _ => None,
    }
}

impl ContainerEngine for DockerEngine {
    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name_filter.to_string()]);

        let options = bollard::container::ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        let summaries = containers
            .into_iter()
            .map(|container| {
                let name = container
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                let ports = container
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .map(|p| PublishedPort {
                        container: p.private_port,
                        host: p.public_port,
                    })
                    .collect();

                ContainerSummary {
                    name,
                    image: container.image.unwrap_or_default(),
                    status: container.status.unwrap_or_default(),
                    ports,
                }
            })
            .collect();

        Ok(summaries)
    }

    async fn create_and_start(&self, request: &ContainerRequest) -> Result<()> {
        let (config, options) = request_to_container_config(request);

        tracing::debug!(container = %request.name, image = %request.image, "コンテナを作成");

        match self.docker.create_container(Some(options), config).await {
            Ok(_) => {}
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                return Err(ContainerError::ImageUnavailable {
                    image: request.image.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        match self
            .docker
            .start_container(
                &request.name,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(BollardError::DockerResponseServerError { message, .. })
                if message.contains("port is already allocated")
                    || message.contains("address already in use") =>
            {
                let port = request.ports.first().map(|p| p.host).unwrap_or_default();
                Err(ContainerError::PortAlreadyInUse { port })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        match self
            .docker
            .stop_container(name, None::<bollard::query_parameters::StopContainerOptions>)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(304) => {
                tracing::debug!(container = %name, "コンテナは既に停止しています");
                Ok(())
            }
            Err(e) if status_code(&e) == Some(404) => Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = bollard::query_parameters::RemoveContainerOptions {
            v: true,
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(name, Some(options)).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerProbe> {
        let inspect = match self
            .docker
            .inspect_container(
                name,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await
        {
            Ok(inspect) => inspect,
            Err(e) if status_code(&e) == Some(404) => {
                return Err(ContainerError::ContainerNotFound {
                    container: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let (state, health) = match inspect.state {
            Some(state) => (
                map_state(state.status),
                map_health(state.health.and_then(|h| h.status)),
            ),
            None => (ContainerState::Unknown, None),
        };

        let mut ports = Vec::new();
        if let Some(bindings) = inspect.network_settings.and_then(|n| n.ports) {
            for (container_port, host) in bindings {
                let Some(container) = container_port
                    .split('/')
                    .next()
                    .and_then(|p| p.parse::<u16>().ok())
                else {
                    continue;
                };
                let host = host
                    .and_then(|b| b.into_iter().find_map(|b| b.host_port))
                    .and_then(|p| p.parse::<u16>().ok());
                ports.push(PublishedPort { container, host });
            }
        }

        Ok(ContainerProbe {
            state,
            health,
            image: inspect.config.and_then(|c| c.image).unwrap_or_default(),
            ports,
        })
    }

    async fn container_logs(&self, name: &str) -> Result<String> {
        let options = bollard::container::LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: LOG_TAIL_LINES.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();

        while let Some(log) = stream.next().await {
            match log? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        Ok(output)
    }

    async fn network_exists(&self, name: &str) -> Result<bool> {
        match self
            .docker
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if status_code(&e) == Some(404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let network_config = bollard::models::NetworkCreateRequest {
            name: name.to_string(),
            driver: Some("bridge".to_string()),
            ..Default::default()
        };

        match self.docker.create_network(network_config).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(409) => {
                tracing::debug!(network = %name, "ネットワークは既に存在します");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        match self.docker.remove_network(name).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(e) if status_code(&e) == Some(404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let (image_name, tag) = parse_image_tag(reference);

        let options = bollard::image::CreateImageOptions {
            from_image: image_name,
            tag,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(info) = stream.next().await {
            match info {
                Ok(bollard::models::CreateImageInfo {
                    status: Some(status),
                    ..
                }) => {
                    tracing::trace!(image = %reference, %status, "プル中");
                }
                Ok(_) => {}
                Err(e) if matches!(status_code(&e), Some(404 | 401 | 403)) => {
                    return Err(ContainerError::ImageUnavailable {
                        image: reference.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn list_image_references(&self) -> Result<Vec<String>> {
        let options = bollard::image::ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .flat_map(|image| image.repo_tags)
            .filter(|tag| tag != "<none>:<none>")
            .collect())
    }

    async fn save_image(&self, reference: &str, destination: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = self.docker.export_image(reference);

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => file.write_all(&bytes).await?,
                Err(e) if status_code(&e) == Some(404) => {
                    return Err(ContainerError::ImageUnavailable {
                        image: reference.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        file.flush().await?;
        Ok(())
    }

    async fn load_image(&self, source: &Path) -> Result<()> {
        let file = tokio::fs::File::open(source).await?;
        let read_error = Arc::new(Mutex::new(None));
        let body = archive_chunks(file, Arc::clone(&read_error));

        let options = bollard::image::ImportImageOptions { quiet: true };
        let mut stream = self.docker.import_image_stream(options, body, None);

        while let Some(info) = stream.next().await {
            let info = info?;
            if let Some(error) = info.error {
                return Err(ContainerError::DockerApiError(error));
            }
        }

        let read_error = read_error.lock().ok().and_then(|mut slot| slot.take());
        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// ファイルを一定サイズずつ読み出すストリーム（読み込みエラーは `error` に残して終了）
fn archive_chunks(
    file: tokio::fs::File,
    error: Arc<Mutex<Option<std::io::Error>>>,
) -> impl futures_util::Stream<Item = Bytes> + Send + 'static {
    futures_util::stream::unfold(file, move |mut file| {
        let error = Arc::clone(&error);
        async move {
            let mut buf = BytesMut::with_capacity(LOAD_CHUNK_SIZE);
            match file.read_buf(&mut buf).await {
                Ok(0) => None,
                Ok(_) => Some((buf.freeze(), file)),
                Err(e) => {
                    tracing::warn!(error = %e, "イメージアーカイブの読み込みに失敗");
                    if let Ok(mut slot) = error.lock() {
                        *slot = Some(e);
                    }
                    None
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_state() {
        assert_eq!(
            map_state(Some(ContainerStateStatusEnum::RUNNING)),
            ContainerState::Running
        );
        assert_eq!(
            map_state(Some(ContainerStateStatusEnum::EXITED)),
            ContainerState::Exited
        );
        assert_eq!(map_state(None), ContainerState::Unknown);
    }

    #[test]
    fn test_map_health() {
        assert_eq!(
            map_health(Some(HealthStatusEnum::HEALTHY)),
            Some(HealthState::Healthy)
        );
        assert_eq!(map_health(Some(HealthStatusEnum::NONE)), None);
        assert_eq!(map_health(None), None);
    }

    #[test]
    fn test_status_code() {
        let err = BollardError::DockerResponseServerError {
            status_code: 304,
            message: "not modified".to_string(),
        };
        assert_eq!(status_code(&err), Some(304));
    }

    #[tokio::test]
    async fn test_archive_chunks_streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.tar");
        let data: Vec<u8> = (0..LOAD_CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let error = Arc::new(Mutex::new(None));
        let chunks: Vec<Bytes> = archive_chunks(file, Arc::clone(&error)).collect().await;

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.len() <= LOAD_CHUNK_SIZE));
        assert_eq!(chunks.concat(), data);
        assert!(error.lock().unwrap().is_none());
    }
}
