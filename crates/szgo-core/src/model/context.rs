//! 実行コンテキスト
//!
//! 1回の実行に関わるホスト名・プロジェクト名・各種フラグをまとめた値です。
//! 各コンポーネントへ明示的に渡し、プロセス環境から直接読むことはしません。

use std::path::PathBuf;

/// コンテナ間通信用ネットワークのデフォルト名
pub const DEFAULT_NETWORK: &str = "szgo-network";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// コンテナ名のサフィックス
    pub project_name: String,
    /// URL 表示や API 仕様取得に使うホスト名
    pub host_name: String,
    pub network_name: String,
    /// 一時ファイル・取得した API 仕様の置き場所
    pub var_path: PathBuf,
    pub skip_health_check: bool,
    pub force_pull: bool,
    /// レジストリへ到達可能か（不可ならプルしない）
    pub pull_enabled: bool,
}

impl RunContext {
    pub fn new(project_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            network_name: DEFAULT_NETWORK.to_string(),
            host_name: host_name.into(),
            var_path: std::env::temp_dir(),
            skip_health_check: false,
            force_pull: false,
            pull_enabled: true,
        }
    }

    pub fn with_network(mut self, name: impl Into<String>) -> Self {
        self.network_name = name.into();
        self
    }

    pub fn with_var_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_path = path.into();
        self
    }

    pub fn with_skip_health_check(mut self, skip: bool) -> Self {
        self.skip_health_check = skip;
        self
    }

    pub fn with_force_pull(mut self, force: bool) -> Self {
        self.force_pull = force;
        self
    }

    pub fn with_pull_enabled(mut self, enabled: bool) -> Self {
        self.pull_enabled = enabled;
        self
    }

    /// 公開ポートの URL
    pub fn url_for(&self, host_port: u16) -> String {
        format!("http://{}:{}", self.host_name, host_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = RunContext::new("G2Project", "myhost");
        assert_eq!(ctx.network_name, "szgo-network");
        assert!(ctx.pull_enabled);
        assert!(!ctx.force_pull);
        assert_eq!(ctx.url_for(8250), "http://myhost:8250");
    }
}
