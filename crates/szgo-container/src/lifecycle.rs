//! デプロイのライフサイクル制御
//!
//! ネットワークの用意、古いデプロイの停止・削除、依存順での起動、
//! ヘルスチェック待機までを担当します。起動は常に1つずつ順番に行います。

use crate::error::{ContainerError, Result};
use crate::runtime::{ContainerEngine, ContainerRequest};
use crate::waiter::{HealthPolicy, WaitOutcome, wait_for_healthy, wait_for_running};
use szgo_core::{DeploymentPlan, PlannedService, RunContext, ServiceKey, ServiceSpec};

/// 停止・削除の対象範囲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownScope {
    pub project_name: String,
    /// 既知のコンテナ名（これ以外には触れない）
    pub container_names: Vec<String>,
    pub network_name: String,
}

impl TeardownScope {
    pub fn from_specs(
        specs: &[ServiceSpec],
        project_name: impl Into<String>,
        network_name: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            container_names: specs.iter().map(|s| s.container_name.clone()).collect(),
            network_name: network_name.into(),
        }
    }

    /// プロジェクトの3サービス全て
    pub fn for_project(ctx: &RunContext) -> Self {
        Self::from_specs(
            &ServiceSpec::defaults(&ctx.project_name),
            ctx.project_name.clone(),
            ctx.network_name.clone(),
        )
    }
}

/// 停止・削除のモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownMode {
    /// 停止のみ
    Stop,
    /// 停止して削除（ネットワークも削除）
    Remove { prompt: bool },
    /// デプロイ前の自動リフレッシュ（停止して削除、ネットワークは残す）
    Refresh,
}

impl TeardownMode {
    fn removes_containers(&self) -> bool {
        !matches!(self, Self::Stop)
    }
}

/// 停止・削除の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub matched: Vec<String>,
    pub stopped: Vec<String>,
    pub removed: Vec<String>,
    pub network_removed: bool,
    /// 確認で中止された
    pub cancelled: bool,
    /// (コンテナ名, エラーメッセージ)
    pub failures: Vec<(String, String)>,
}

impl TeardownReport {
    pub fn is_noop(&self) -> bool {
        self.matched.is_empty()
    }
}

/// サービス起動の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// ヘルスチェックで healthy を確認
    Healthy,
    /// Running（イメージにヘルスチェックなし）
    Running,
    /// ヘルスチェックをスキップ
    Unverified,
    /// 任意サービスが healthy にならなかった
    NotStarted { logs: String },
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        !matches!(self, Self::NotStarted { .. })
    }
}

/// デプロイ結果の1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub key: ServiceKey,
    pub container_name: String,
    pub host_port: u16,
    pub outcome: StartOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    pub teardown: TeardownReport,
    pub network_created: bool,
    pub services: Vec<ServiceReport>,
}

impl DeploymentReport {
    pub fn get(&self, key: ServiceKey) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.key == key)
    }
}

/// デプロイ途中で呼び出し側の処理を差し込むフック
#[allow(async_fn_in_trait)]
pub trait DeployHook {
    /// 必須サービスが起動した後、任意サービスの起動前に呼ばれる
    async fn after_required(&mut self, _plan: &DeploymentPlan, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    /// 各サービスの起動前に呼ばれる
    fn before_service(&mut self, _service: &PlannedService) {}

    /// 各サービスの起動結果が確定した時に呼ばれる
    fn after_service(&mut self, _service: &PlannedService, _outcome: &StartOutcome) {}
}

impl DeployHook for () {}

/// ライフサイクルコントローラ
pub struct LifecycleController<'a, E: ContainerEngine> {
    engine: &'a E,
    policy: HealthPolicy,
}

impl<'a, E: ContainerEngine> LifecycleController<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            policy: HealthPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// ネットワークがなければ作成（作成した場合 true）
    pub async fn ensure_network(&self, name: &str) -> Result<bool> {
        if self.engine.network_exists(name).await? {
            tracing::debug!(network = %name, "ネットワークは既に存在します");
            return Ok(false);
        }

        self.engine.create_network(name).await?;
        tracing::info!(network = %name, "ネットワークを作成しました");
        Ok(true)
    }

    /// プロジェクトのコンテナを停止（必要なら削除）
    ///
    /// 該当コンテナがなければエンジンへの操作は一覧取得のみです。
    /// 個々の停止・削除の失敗は警告として `failures` に記録し、処理を続けます。
    pub async fn teardown<F>(
        &self,
        scope: &TeardownScope,
        mode: TeardownMode,
        confirm: F,
    ) -> Result<TeardownReport>
    where
        F: FnOnce(&[String]) -> bool,
    {
        let mut report = TeardownReport::default();

        let mut matched: Vec<String> = self
            .engine
            .list_containers(&scope.project_name)
            .await?
            .into_iter()
            .map(|c| c.name)
            .filter(|name| scope.container_names.contains(name))
            .collect();
        matched.sort();
        matched.dedup();

        if matched.is_empty() {
            tracing::debug!(project = %scope.project_name, "停止対象のコンテナはありません");
            return Ok(report);
        }
        report.matched = matched;

        let confirmed = match mode {
            TeardownMode::Remove { prompt: true } => confirm(&report.matched),
            _ => true,
        };
        if !confirmed {
            tracing::info!("削除はキャンセルされました");
            report.cancelled = true;
            return Ok(report);
        }

        for name in &report.matched {
            match self.engine.stop_container(name).await {
                Ok(()) => {
                    tracing::info!(container = %name, "コンテナを停止しました");
                    report.stopped.push(name.clone());
                }
                Err(e) => {
                    tracing::warn!(container = %name, error = %e, "コンテナの停止に失敗");
                    report.failures.push((name.clone(), e.to_string()));
                }
            }

            if !mode.removes_containers() {
                continue;
            }

            match self.engine.remove_container(name).await {
                Ok(()) => {
                    tracing::info!(container = %name, "コンテナを削除しました");
                    report.removed.push(name.clone());
                }
                Err(e) => {
                    tracing::warn!(container = %name, error = %e, "コンテナの削除に失敗");
                    report.failures.push((name.clone(), e.to_string()));
                }
            }
        }

        if let TeardownMode::Remove { .. } = mode {
            match self.engine.remove_network(&scope.network_name).await {
                Ok(()) => report.network_removed = true,
                Err(e) => {
                    tracing::warn!(network = %scope.network_name, error = %e, "ネットワークの削除に失敗");
                    report
                        .failures
                        .push((scope.network_name.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// サービスを起動して状態を確認
    ///
    /// Running にならない場合はサービスを問わずエラー（ログ付き）。
    /// healthy にならない場合、必須サービスならエラー、任意サービスなら `NotStarted`。
    pub async fn start_service(
        &self,
        service: &PlannedService,
        ctx: &RunContext,
    ) -> Result<StartOutcome> {
        let request = ContainerRequest::from_planned(service, ctx);
        let name = request.name.as_str();

        self.engine.create_and_start(&request).await?;
        tracing::info!(container = %name, image = %request.image, "コンテナを起動しました");

        if ctx.skip_health_check {
            tracing::debug!(container = %name, "ヘルスチェックをスキップ");
            return Ok(StartOutcome::Unverified);
        }

        let probe = match wait_for_running(self.engine, name, &self.policy).await? {
            WaitOutcome::Reached(probe) => probe,
            WaitOutcome::TimedOut(probe) | WaitOutcome::Failed(probe) => {
                let logs = self.logs_for_diagnosis(name).await;
                return Err(ContainerError::StartFailed {
                    container: name.to_string(),
                    status: probe.state.as_str().to_string(),
                    logs,
                });
            }
        };

        if probe.health.is_none() {
            tracing::debug!(container = %name, "ヘルスチェックが定義されていません");
            return Ok(StartOutcome::Running);
        }

        match wait_for_healthy(self.engine, name, &self.policy).await? {
            WaitOutcome::Reached(_) => Ok(StartOutcome::Healthy),
            WaitOutcome::TimedOut(_) | WaitOutcome::Failed(_) => {
                let logs = self.logs_for_diagnosis(name).await;
                if service.spec.required {
                    Err(ContainerError::Unhealthy {
                        container: name.to_string(),
                        attempts: self.policy.max_attempts,
                        logs,
                    })
                } else {
                    tracing::warn!(container = %name, "healthy にならなかったため起動なしとして扱います");
                    Ok(StartOutcome::NotStarted { logs })
                }
            }
        }
    }

    /// 計画どおりにデプロイ
    ///
    /// 1. 既存コンテナを停止・削除（常に実行）
    /// 2. ネットワークを用意
    /// 3. 必須サービスを起動
    /// 4. `hook.after_required`
    /// 5. 任意サービスを1つずつ起動
    pub async fn deploy<H: DeployHook>(
        &self,
        plan: &DeploymentPlan,
        ctx: &RunContext,
        hook: &mut H,
    ) -> Result<DeploymentReport> {
        let mut report = DeploymentReport {
            teardown: self
                .teardown(&TeardownScope::for_project(ctx), TeardownMode::Refresh, |_| true)
                .await?,
            ..Default::default()
        };

        report.network_created = self.ensure_network(&ctx.network_name).await?;

        let required = plan.required();
        hook.before_service(required);
        let outcome = self.start_service(required, ctx).await?;
        hook.after_service(required, &outcome);
        report.services.push(service_report(required, outcome));

        hook.after_required(plan, ctx).await?;

        for service in plan.optional() {
            hook.before_service(service);
            let outcome = self.start_service(service, ctx).await?;
            hook.after_service(service, &outcome);
            report.services.push(service_report(service, outcome));
        }

        Ok(report)
    }

    async fn logs_for_diagnosis(&self, name: &str) -> String {
        match self.engine.container_logs(name).await {
            Ok(logs) => logs,
            Err(e) => format!("(ログを取得できません: {})", e),
        }
    }
}

fn service_report(service: &PlannedService, outcome: StartOutcome) -> ServiceReport {
    ServiceReport {
        key: service.key(),
        container_name: service.spec.container_name.clone(),
        host_port: service.spec.host_port,
        outcome,
    }
}
