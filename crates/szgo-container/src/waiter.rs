//! コンテナ状態のポーリング
//!
//! 一定間隔・上限回数つきで inspect を繰り返し、
//! `Running` / `Healthy` への到達を待機します。

use crate::error::Result;
use crate::runtime::{ContainerEngine, ContainerProbe, ContainerState, HealthState};
use std::time::Duration;
use tokio::time::sleep;

/// ポーリング設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_secs(5),
        }
    }
}

impl HealthPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// 待機結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached(ContainerProbe),
    /// 上限回数に達した（最後の状態）
    TimedOut(ContainerProbe),
    /// 到達不能な状態になった（exited / dead）
    Failed(ContainerProbe),
}

/// `Running` になるまで待機
///
/// exited / dead を観測した時点で `Failed` を返します。
pub async fn wait_for_running<E: ContainerEngine>(
    engine: &E,
    container_name: &str,
    policy: &HealthPolicy,
) -> Result<WaitOutcome> {
    poll(engine, container_name, policy, |probe| {
        if probe.state == ContainerState::Running {
            Some(true)
        } else if probe.state.is_terminal() {
            Some(false)
        } else {
            None
        }
    })
    .await
}

/// `Healthy` になるまで待機
///
/// ヘルスチェックを宣言していないコンテナには呼ばないこと。
pub async fn wait_for_healthy<E: ContainerEngine>(
    engine: &E,
    container_name: &str,
    policy: &HealthPolicy,
) -> Result<WaitOutcome> {
    poll(engine, container_name, policy, |probe| {
        if probe.health == Some(HealthState::Healthy) {
            Some(true)
        } else if probe.state.is_terminal() {
            Some(false)
        } else {
            None
        }
    })
    .await
}

/// `check` が Some(true) で到達、Some(false) で失敗、None で継続
async fn poll<E, F>(
    engine: &E,
    container_name: &str,
    policy: &HealthPolicy,
    check: F,
) -> Result<WaitOutcome>
where
    E: ContainerEngine,
    F: Fn(&ContainerProbe) -> Option<bool>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let probe = engine.inspect_container(container_name).await?;
        attempt += 1;

        tracing::debug!(
            container = %container_name,
            attempt,
            max_attempts,
            state = probe.state.as_str(),
            health = probe.health.map(|h| h.as_str()),
            "コンテナ状態を確認"
        );

        match check(&probe) {
            Some(true) => return Ok(WaitOutcome::Reached(probe)),
            Some(false) => return Ok(WaitOutcome::Failed(probe)),
            None if attempt >= max_attempts => return Ok(WaitOutcome::TimedOut(probe)),
            None => sleep(policy.interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeEngine};

    fn fast(max_attempts: u32) -> HealthPolicy {
        HealthPolicy::new(max_attempts, Duration::ZERO)
    }

    fn inspections(engine: &FakeEngine) -> usize {
        engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::InspectContainer(_)))
            .count()
    }

    #[tokio::test]
    async fn test_wait_for_running_reached() {
        let engine = FakeEngine::new().script_probes(
            "c1",
            vec![
                ContainerProbe::new(ContainerState::Created, None),
                ContainerProbe::running(),
            ],
        );

        let outcome = wait_for_running(&engine, "c1", &fast(5)).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Reached(_)));
        assert_eq!(inspections(&engine), 2);
    }

    #[tokio::test]
    async fn test_wait_for_running_exited_fails_immediately() {
        let engine = FakeEngine::new().script_probes(
            "c1",
            vec![ContainerProbe::new(ContainerState::Exited, None)],
        );

        let outcome = wait_for_running(&engine, "c1", &fast(5)).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Failed(_)));
        assert_eq!(inspections(&engine), 1);
    }

    #[tokio::test]
    async fn test_wait_for_healthy_times_out() {
        let engine = FakeEngine::new().script_probes(
            "c1",
            vec![ContainerProbe::new(
                ContainerState::Running,
                Some(HealthState::Starting),
            )],
        );

        let outcome = wait_for_healthy(&engine, "c1", &fast(3)).await.unwrap();
        match outcome {
            WaitOutcome::TimedOut(probe) => {
                assert_eq!(probe.health, Some(HealthState::Starting))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(inspections(&engine), 3);
    }

    #[tokio::test]
    async fn test_wait_missing_container_is_error() {
        let engine = FakeEngine::new();
        assert!(wait_for_running(&engine, "missing", &fast(2)).await.is_err());
    }
}
