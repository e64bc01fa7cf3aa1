//! リトライポリシー
//!
//! ネットワーク到達性チェックやリモートリソース取得で使う、回数上限付きの
//! 反復ループです。待機時間は `delay_for_attempt` で明示的に計算します。

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大試行回数（1以上）
    pub max_attempts: u32,
    /// 1回目の失敗後の待機時間
    pub initial_delay: Duration,
    /// 失敗ごとに加算する待機時間
    pub increment: Duration,
    /// 待機時間の上限
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 一定間隔でリトライ
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            increment: Duration::ZERO,
            max_delay: delay,
        }
    }

    /// 失敗ごとに `step` ずつ待機時間を延ばす
    pub fn incremental(max_attempts: u32, step: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: step,
            increment: step,
            max_delay,
        }
    }

    /// 到達性チェック用（3回・1秒間隔）
    pub fn reachability() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }

    /// API 仕様取得用（5回・5秒ずつ増加）
    pub fn api_spec() -> Self {
        Self::incremental(5, Duration::from_secs(5), Duration::from_secs(25))
    }

    /// 指定回数目（0始まり）の失敗後の待機時間
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay + self.increment * attempt;
        delay.min(self.max_delay)
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("{attempts}回試行しましたが失敗しました: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// 成功するか試行回数の上限に達するまで `op` を実行
///
/// `op` には0始まりの試行番号が渡されます。失敗して次の試行が残っている場合、
/// 待機の前に `on_retry(attempt, &error, delay)` が呼ばれます。
pub async fn retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: R,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: FnMut(u32, &E, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(attempt = attempt + 1, max_attempts, ?delay, "リトライします");
                on_retry(attempt, &err, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[test]
    fn test_incremental_delay() {
        let policy = RetryPolicy::api_spec();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(20));
        // 上限でキャップ
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let retries = Cell::new(0);

        let result: Result<u32, RetryError<String>> = retry(
            &policy,
            |attempt| async move {
                if attempt < 2 {
                    Err(format!("失敗 {}", attempt))
                } else {
                    Ok(attempt)
                }
            },
            |_, _, _| retries.set(retries.get() + 1),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(retries.get(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let calls = Cell::new(0);
        let retries = Cell::new(0);

        let result: Result<(), RetryError<&str>> = retry(
            &policy,
            |_| {
                calls.set(calls.get() + 1);
                async { Err("到達できません") }
            },
            |_, _, _| retries.set(retries.get() + 1),
        )
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "到達できません");
            }
            Ok(_) => panic!("成功するはずがない"),
        }
        assert_eq!(calls.get(), 3);
        // 最後の失敗の後は待機しない
        assert_eq!(retries.get(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let calls = Cell::new(0);

        let _ = retry(
            &policy,
            |_| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(()) }
            },
            |_, _, _| {},
        )
        .await;

        assert_eq!(calls.get(), 1);
    }
}
