use crate::docker;
use colored::Colorize;
use szgo_container::ContainerEngine;

pub async fn handle(filter: &str) -> anyhow::Result<()> {
    println!("{}", "ログを取得中...".blue());

    // Docker接続
    let engine = docker::init_docker_with_error_handling().await?;

    let mut containers = engine.list_containers(filter).await?;
    containers.sort_by(|a, b| a.name.cmp(&b.name));

    println!();
    if containers.is_empty() {
        println!(
            "{}",
            format!("'{}' に一致するコンテナはありません", filter).dimmed()
        );
        return Ok(());
    }

    for container in &containers {
        println!(
            "{}",
            format!("********** {} のログ ここから **********", container.name)
                .bold()
                .cyan()
        );
        match engine.container_logs(&container.name).await {
            Ok(logs) => print!("{}", logs),
            Err(e) => eprintln!("  {} ログを取得できません: {}", "⚠".yellow(), e),
        }
        println!(
            "{}",
            format!("********** {} のログ ここまで **********", container.name)
                .bold()
                .cyan()
        );
        println!();
    }

    Ok(())
}
