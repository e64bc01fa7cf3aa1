use crate::error::Result;
use std::path::Path;
use szgo_core::VolumeBinding;

/// コンテナエンジンのトレイト
///
/// デプロイ・バンドル処理が必要とする操作だけを定義します。
/// 実装は `DockerEngine`（実環境）と `FakeEngine`（テスト用）。
#[allow(async_fn_in_trait)]
pub trait ContainerEngine {
    /// 名前に `name_filter` を含むコンテナ（停止中も含む）
    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>>;
    async fn create_and_start(&self, request: &ContainerRequest) -> Result<()>;
    /// 既に停止している場合も成功
    async fn stop_container(&self, name: &str) -> Result<()>;
    /// ボリュームも含めて削除
    async fn remove_container(&self, name: &str) -> Result<()>;
    async fn inspect_container(&self, name: &str) -> Result<ContainerProbe>;
    async fn container_logs(&self, name: &str) -> Result<String>;

    async fn network_exists(&self, name: &str) -> Result<bool>;
    async fn create_network(&self, name: &str) -> Result<()>;
    async fn remove_network(&self, name: &str) -> Result<()>;

    async fn image_exists(&self, reference: &str) -> Result<bool>;
    /// レジストリから1回だけプル（見つからなければ `ImageUnavailable`）
    async fn pull_image(&self, reference: &str) -> Result<()>;
    /// ローカルにある全イメージの `name:tag` 参照
    async fn list_image_references(&self) -> Result<Vec<String>>;
    /// エンジン形式（tar）でイメージをファイルに書き出す
    async fn save_image(&self, reference: &str, destination: &Path) -> Result<()>;
    /// エンジン形式（tar）のファイルからイメージを読み込む
    async fn load_image(&self, source: &Path) -> Result<()>;
}

/// コンテナ一覧の1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
    /// "Up 5 minutes" などの表示用ステータス
    pub status: String,
    pub ports: Vec<PublishedPort>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedPort {
    pub container: u16,
    pub host: Option<u16>,
}

/// コンテナの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    /// 待機しても Running にならない状態
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited | Self::Dead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

/// ヘルスチェックの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// inspect の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerProbe {
    pub state: ContainerState,
    /// イメージがヘルスチェックを宣言していなければ None
    pub health: Option<HealthState>,
    pub image: String,
    pub ports: Vec<PublishedPort>,
}

impl ContainerProbe {
    pub fn new(state: ContainerState, health: Option<HealthState>) -> Self {
        Self {
            state,
            health,
            image: String::new(),
            ports: Vec::new(),
        }
    }

    pub fn running() -> Self {
        Self::new(ContainerState::Running, None)
    }

    /// 公開されたホストポート
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.container == container_port)
            .and_then(|p| p.host)
    }
}

/// コンテナ作成リクエスト
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRequest {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeBinding>,
    pub network: Option<String>,
    pub command: Option<Vec<String>>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    pub labels: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container: u16,
    pub host: u16,
}
