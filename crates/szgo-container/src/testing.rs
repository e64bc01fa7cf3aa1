//! テスト用のインメモリ ContainerEngine
//!
//! Docker デーモンなしでライフサイクル・バンドル処理を検証するためのものです。
//! コンテナ状態の遷移を台本として与えられ、呼び出されたエンジン操作を記録します。

use crate::error::{ContainerError, Result};
use crate::runtime::{
    ContainerEngine, ContainerProbe, ContainerRequest, ContainerSummary, PublishedPort,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// 記録されるエンジン操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ListContainers(String),
    CreateAndStart(String),
    StopContainer(String),
    RemoveContainer(String),
    InspectContainer(String),
    ContainerLogs(String),
    NetworkExists(String),
    CreateNetwork(String),
    RemoveNetwork(String),
    ImageExists(String),
    PullImage(String),
    ListImages,
    SaveImage(String),
    LoadImage(PathBuf),
}

#[derive(Debug, Clone)]
struct FakeContainer {
    image: String,
    running: bool,
    ports: Vec<PublishedPort>,
}

#[derive(Debug, Default)]
struct State {
    containers: HashMap<String, FakeContainer>,
    networks: BTreeSet<String>,
    images: BTreeSet<String>,
    pullable: BTreeSet<String>,
    /// 最後の1件は以降も返し続ける
    probes: HashMap<String, VecDeque<ContainerProbe>>,
    logs: HashMap<String, String>,
    calls: Vec<EngineCall>,
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: EngineCall) {
        self.lock().calls.push(call);
    }

    /// ローカルに存在するイメージ
    pub fn with_image(self, reference: &str) -> Self {
        self.lock().images.insert(reference.to_string());
        self
    }

    /// レジストリからプル可能なイメージ
    pub fn with_pullable(self, reference: &str) -> Self {
        self.lock().pullable.insert(reference.to_string());
        self
    }

    /// 実行中のコンテナ
    pub fn with_container(self, name: &str, image: &str) -> Self {
        self.lock().containers.insert(
            name.to_string(),
            FakeContainer {
                image: image.to_string(),
                running: true,
                ports: Vec::new(),
            },
        );
        self
    }

    /// inspect が順に返す状態
    pub fn script_probes(self, name: &str, probes: Vec<ContainerProbe>) -> Self {
        self.lock()
            .probes
            .insert(name.to_string(), probes.into_iter().collect());
        self
    }

    pub fn with_logs(self, name: &str, logs: &str) -> Self {
        self.lock().logs.insert(name.to_string(), logs.to_string());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.lock().containers.contains_key(name)
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.lock().images.contains(reference)
    }

    pub fn images(&self) -> Vec<String> {
        self.lock().images.iter().cloned().collect()
    }
}

/// `docker save` 形式を模した tar を書き出す
fn write_image_archive(reference: &str, destination: &Path) -> Result<()> {
    let manifest = serde_json::json!([{ "RepoTags": [reference] }]).to_string();

    let file = std::fs::File::create(destination)?;
    let mut builder = tar::Builder::new(file);

    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "manifest.json", manifest.as_bytes())?;
    builder.finish()?;

    Ok(())
}

fn read_image_archive(source: &Path) -> Result<Vec<String>> {
    use std::io::Read;

    let file = std::fs::File::open(source)?;
    let mut archive = tar::Archive::new(file);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()? != Path::new("manifest.json") {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        let manifest: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ContainerError::DockerApiError(e.to_string()))?;

        let tags = manifest
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|m| m.get("RepoTags").and_then(|t| t.as_array()))
            .flatten()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect();
        return Ok(tags);
    }

    Err(ContainerError::DockerApiError(format!(
        "{} はイメージアーカイブではありません",
        source.display()
    )))
}

impl ContainerEngine for FakeEngine {
    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>> {
        self.record(EngineCall::ListContainers(name_filter.to_string()));

        let state = self.lock();
        let mut summaries: Vec<ContainerSummary> = state
            .containers
            .iter()
            .filter(|(name, _)| name.contains(name_filter))
            .map(|(name, c)| ContainerSummary {
                name: name.clone(),
                image: c.image.clone(),
                status: (if c.running { "Up" } else { "Exited (0)" }).to_string(),
                ports: c.ports.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(summaries)
    }

    async fn create_and_start(&self, request: &ContainerRequest) -> Result<()> {
        self.record(EngineCall::CreateAndStart(request.name.clone()));

        let mut state = self.lock();
        if state.containers.contains_key(&request.name) {
            return Err(ContainerError::DockerApiError(format!(
                "Conflict. The container name \"/{}\" is already in use",
                request.name
            )));
        }

        state.containers.insert(
            request.name.clone(),
            FakeContainer {
                image: request.image.clone(),
                running: true,
                ports: request
                    .ports
                    .iter()
                    .map(|p| PublishedPort {
                        container: p.container,
                        host: Some(p.host),
                    })
                    .collect(),
            },
        );

        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.record(EngineCall::StopContainer(name.to_string()));

        match self.lock().containers.get_mut(name) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            }),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(EngineCall::RemoveContainer(name.to_string()));

        match self.lock().containers.remove(name) {
            Some(_) => Ok(()),
            None => Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            }),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerProbe> {
        self.record(EngineCall::InspectContainer(name.to_string()));

        let mut state = self.lock();
        if let Some(queue) = state.probes.get_mut(name) {
            let probe = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(probe) = probe {
                return Ok(probe);
            }
        }

        match state.containers.get(name) {
            Some(container) => {
                let mut probe = if container.running {
                    ContainerProbe::running()
                } else {
                    ContainerProbe::new(crate::runtime::ContainerState::Exited, None)
                };
                probe.image = container.image.clone();
                probe.ports = container.ports.clone();
                Ok(probe)
            }
            None => Err(ContainerError::ContainerNotFound {
                container: name.to_string(),
            }),
        }
    }

    async fn container_logs(&self, name: &str) -> Result<String> {
        self.record(EngineCall::ContainerLogs(name.to_string()));
        Ok(self.lock().logs.get(name).cloned().unwrap_or_default())
    }

    async fn network_exists(&self, name: &str) -> Result<bool> {
        self.record(EngineCall::NetworkExists(name.to_string()));
        Ok(self.lock().networks.contains(name))
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        self.record(EngineCall::CreateNetwork(name.to_string()));
        self.lock().networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.record(EngineCall::RemoveNetwork(name.to_string()));
        self.lock().networks.remove(name);
        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        self.record(EngineCall::ImageExists(reference.to_string()));
        Ok(self.lock().images.contains(reference))
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        self.record(EngineCall::PullImage(reference.to_string()));

        let mut state = self.lock();
        if state.pullable.contains(reference) {
            state.images.insert(reference.to_string());
            Ok(())
        } else {
            Err(ContainerError::ImageUnavailable {
                image: reference.to_string(),
            })
        }
    }

    async fn list_image_references(&self) -> Result<Vec<String>> {
        self.record(EngineCall::ListImages);
        Ok(self.images())
    }

    async fn save_image(&self, reference: &str, destination: &Path) -> Result<()> {
        self.record(EngineCall::SaveImage(reference.to_string()));

        if !self.has_image(reference) {
            return Err(ContainerError::ImageUnavailable {
                image: reference.to_string(),
            });
        }
        write_image_archive(reference, destination)
    }

    async fn load_image(&self, source: &Path) -> Result<()> {
        self.record(EngineCall::LoadImage(source.to_path_buf()));

        let tags = read_image_archive(source)?;
        self.lock().images.extend(tags);
        Ok(())
    }
}
