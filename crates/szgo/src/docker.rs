use colored::Colorize;
use szgo_container::{ContainerError, DockerEngine};

/// Docker に接続（失敗時は原因と対処を表示）
pub async fn init_docker_with_error_handling() -> anyhow::Result<DockerEngine> {
    match DockerEngine::connect().await {
        Ok(engine) => Ok(engine),
        Err(e) => {
            let cause = match &e {
                ContainerError::EngineUnavailable(message) => message.clone(),
                other => other.to_string(),
            };
            eprintln!();
            eprintln!("{}", "✗ Docker接続エラー".red().bold());
            eprintln!();
            eprintln!("{}", "原因:".yellow());
            eprintln!("  {}", cause);
            eprintln!();
            eprintln!("{}", "解決方法:".yellow());
            eprintln!("  • Dockerが起動しているか確認してください");
            eprintln!("  • 実行ユーザーが docker グループに所属しているか確認してください");
            eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}
