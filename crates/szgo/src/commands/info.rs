use crate::docker;
use crate::plan;
use crate::{ApiCommandArgs, ProjectArgs};
use colored::Colorize;
use std::path::Path;
use szgo_container::{ContainerEngine, ContainerState};
use szgo_core::{RunContext, ServiceKey, ServiceSpec};

/// 表示用のコンテナ情報
#[derive(Debug, Clone, PartialEq, Eq)]
struct InfoRow {
    key: ServiceKey,
    name: String,
    image: String,
    status: String,
    /// 実行中でホストポートが公開されている場合のみ
    url: Option<String>,
}

pub async fn handle(
    senzing_root: Option<&Path>,
    project: &ProjectArgs,
    api: &ApiCommandArgs,
) -> anyhow::Result<()> {
    let ctx = super::run_context(senzing_root, project)?;
    println!("プロジェクト: {}", ctx.project_name.cyan());

    // Docker接続
    let engine = docker::init_docker_with_error_handling().await?;
    let rows = collect_rows(&engine, &ctx).await?;

    println!();
    if rows.is_empty() {
        println!("{}", "コンテナはありません".dimmed());
    } else {
        println!(
            "{}",
            format!("{:<16} {:<28} {:<20} {:<44} {}", "SERVICE", "NAME", "STATUS", "IMAGE", "URL")
                .bold()
        );
        println!("{}", "─".repeat(130).dimmed());

        for row in &rows {
            let status = if row.url.is_some() {
                row.status.green()
            } else {
                row.status.yellow()
            };
            println!(
                "{:<16} {:<28} {:<20} {:<44} {}",
                row.key.display_name(),
                row.name.cyan(),
                status,
                row.image,
                row.url.as_deref().unwrap_or("-")
            );
        }
    }

    // 起動コマンドは INI がなくても表示する
    let ini_name = szgo_config::find_ini_file(api.ini_file.as_deref(), senzing_root)
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| szgo_config::DEFAULT_INI_NAME.to_string());
    let command = plan::api_command(
        &ini_name,
        api.api_admin,
        api.api_debug,
        api.api_command.as_deref(),
    );

    println!();
    println!("{}", "REST API サーバーの起動コマンド:".bold());
    println!("  {}", command.join(" "));
    Ok(())
}

async fn collect_rows<E: ContainerEngine>(
    engine: &E,
    ctx: &RunContext,
) -> anyhow::Result<Vec<InfoRow>> {
    let specs = ServiceSpec::defaults(&ctx.project_name);
    let mut rows = Vec::new();

    for container in engine.list_containers(&ctx.project_name).await? {
        // 他プロジェクト（名前の一部が一致するもの）は除外
        let Some(spec) = specs.iter().find(|s| s.container_name == container.name) else {
            continue;
        };

        let probe = engine.inspect_container(&container.name).await?;
        let url = match probe.state {
            ContainerState::Running => probe
                .host_port(spec.container_port)
                .or_else(|| {
                    container
                        .ports
                        .iter()
                        .find(|p| p.container == spec.container_port)
                        .and_then(|p| p.host)
                })
                .map(|port| ctx.url_for(port)),
            _ => None,
        };

        rows.push(InfoRow {
            key: spec.key,
            name: container.name,
            image: container.image,
            status: container.status,
            url,
        });
    }

    rows.sort_by_key(|row| row.key);
    Ok(rows)
}
