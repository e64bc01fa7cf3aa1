use crate::docker;
use crate::plan::{self, PlanInputs};
use crate::progress::Spinner;
use crate::remote::{self, RemoteClient};
use crate::{ApiCommandArgs, ImageArgs, ProjectArgs};
use colored::Colorize;
use std::path::PathBuf;
use szgo_container::{
    ContainerEngine, ContainerError, DeployHook, DeploymentReport, ImageAvailability,
    LifecycleController, StartOutcome,
};
use szgo_core::{
    DeploymentPlan, PlannedService, ResolvedImage, RunContext, ServiceKey, ServiceSpec,
    TranslateOptions, VersionManifest,
};

pub struct UpOptions {
    pub senzing_root: Option<PathBuf>,
    pub project: ProjectArgs,
    pub api: ApiCommandArgs,
    pub images: ImageArgs,
    /// API, Web App, Swagger のホストポート
    pub ports: [u16; 3],
    pub db2_cli_path: Option<PathBuf>,
    pub skip_health: bool,
}

pub async fn handle(opts: UpOptions) -> anyhow::Result<()> {
    let root = super::require_root(opts.senzing_root.as_deref())?.to_path_buf();

    // データベース設定の変換（コンテナに触れる前に検証する）
    let ini_file = szgo_config::find_ini_file(opts.api.ini_file.as_deref(), Some(root.as_path()))?;
    println!(
        "データベース設定: {}",
        ini_file.display().to_string().cyan()
    );
    let raw = szgo_config::load_ini(&ini_file)?;
    let translation = szgo_core::translate(
        &raw,
        &TranslateOptions {
            senzing_root: root.clone(),
            db2_cli_path: opts.db2_cli_path.clone(),
        },
    )?;
    println!("  ✓ データベース: {}", translation.backend.as_str().cyan());

    let ctx = super::run_context(Some(root.as_path()), &opts.project)?
        .with_skip_health_check(opts.skip_health)
        .with_force_pull(opts.images.force_pull);
    println!("プロジェクト: {}", ctx.project_name.cyan());

    if ServiceKey::ALL
        .iter()
        .any(|key| super::tag_override(&opts.images, *key).is_some())
    {
        println!(
            "{} イメージタグが指定されています。組み合わせによっては正しく動作しない可能性があります",
            "⚠".yellow()
        );
    }

    // Docker接続
    println!();
    println!("{}", "Dockerに接続中...".blue());
    let engine = docker::init_docker_with_error_handling().await?;

    // レジストリ・バージョン一覧への到達確認
    println!();
    println!("{}", "インターネット接続を確認中...".blue());
    let remote_client = RemoteClient::new()?;
    let manifest_url = remote::manifest_url(opts.images.stable);
    let manifest = if remote_client.is_reachable(manifest_url).await {
        remote_client.fetch_manifest(manifest_url).await
    } else {
        None
    };
    let registry_reachable = remote_client.is_reachable(remote::DOCKERHUB_URL).await;
    let ctx = ctx.with_pull_enabled(registry_reachable);
    if !registry_reachable {
        println!(
            "  {} レジストリに接続できません。ローカルのイメージのみ使用します",
            "ℹ".blue()
        );
    }

    // イメージの用意
    println!();
    println!("{}", "イメージを確認中...".blue());
    let specs = plan::service_specs(&ctx.project_name, opts.ports);
    let selection = select_images(&engine, specs, &opts.images, manifest.as_ref(), &ctx).await?;

    let translated = szgo_config::write_translated(&ini_file, &translation.config)?;
    tracing::debug!(path = %translated.display(), "変換済みの設定を書き込み");

    let ini_name = ini_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| szgo_config::DEFAULT_INI_NAME.to_string());
    let inputs = PlanInputs {
        senzing_root: root.clone(),
        var_path: ctx.var_path.clone(),
        extra_volume: translation.volume,
        api_command: plan::api_command(
            &ini_name,
            opts.api.api_admin,
            opts.api.api_debug,
            opts.api.api_command.as_deref(),
        ),
        user: plan::container_user(),
        init_json: std::env::var(plan::INIT_JSON_ENV).unwrap_or_default(),
    };
    let deployment = plan::build_plan(&inputs, selection.selected)?;

    // デプロイ
    let mut hook = UpHook::new(&remote_client);
    let report = LifecycleController::new(&engine)
        .deploy(&deployment, &ctx, &mut hook)
        .await?;

    print_summary(&report, &ctx, &selection.missing);
    Ok(())
}

/// 利用できるイメージの選定結果
#[derive(Debug, Default)]
struct ImageSelection {
    selected: Vec<(ServiceSpec, ResolvedImage)>,
    /// 用意できなかった任意サービスのイメージ
    missing: Vec<String>,
}

async fn select_images<E: ContainerEngine>(
    engine: &E,
    specs: Vec<ServiceSpec>,
    args: &ImageArgs,
    manifest: Option<&VersionManifest>,
    ctx: &RunContext,
) -> anyhow::Result<ImageSelection> {
    let availability = ImageAvailability::new(engine);
    let mut selection = ImageSelection::default();

    for spec in specs {
        if !super::is_selected(args, spec.key) {
            tracing::info!(service = %spec.key, "指定により対象外");
            continue;
        }

        // プルできない時はバージョン一覧より手元のイメージを優先する
        let manifest = if ctx.pull_enabled { manifest } else { None };
        let local_tags = match manifest {
            Some(_) => Vec::new(),
            None => availability.local_tags(&spec.image_name).await?,
        };
        let resolved = szgo_core::resolve(
            spec.key,
            super::tag_override(args, spec.key),
            manifest,
            &local_tags,
        );
        let reference = spec.image_reference(&resolved.tag);

        if availability.ensure_available(&spec, &reference, ctx).await? {
            println!("  {} {}: {}", "✓".green(), spec.key.display_name(), reference);
            selection.selected.push((spec, resolved));
        } else {
            println!(
                "  {} {}: {} は利用できません",
                "⚠".yellow(),
                spec.key.display_name(),
                reference
            );
            selection.missing.push(reference);
        }
    }

    Ok(selection)
}

/// 起動の進捗表示と、API 仕様の取得
struct UpHook<'a> {
    remote: &'a RemoteClient,
    spinner: Option<Spinner>,
}

impl<'a> UpHook<'a> {
    fn new(remote: &'a RemoteClient) -> Self {
        Self {
            remote,
            spinner: None,
        }
    }
}

impl DeployHook for UpHook<'_> {
    async fn after_required(
        &mut self,
        plan: &DeploymentPlan,
        ctx: &RunContext,
    ) -> szgo_container::Result<()> {
        // Swagger UI にマウントする API 仕様
        let api = plan.required();
        println!();
        println!("{}", "API 仕様を取得中...".blue());

        let spec = self
            .remote
            .fetch_api_spec(&ctx.url_for(api.spec.host_port))
            .await
            .map_err(|e| ContainerError::DependencyFailed(e.to_string()))?;
        let path = remote::write_api_spec(&ctx.var_path, &spec)
            .map_err(|e| ContainerError::DependencyFailed(e.to_string()))?;

        println!("  {} {}", "✓".green(), path.display());
        Ok(())
    }

    fn before_service(&mut self, service: &PlannedService) {
        println!();
        println!(
            "{}",
            format!("▶ {} を起動中...", service.key().display_name())
                .green()
                .bold()
        );
        println!("  → Image: {}", service.image_reference().cyan());
        self.spinner = Some(Spinner::new(&format!(
            "{} の起動を待機中",
            service.spec.container_name
        )));
    }

    fn after_service(&mut self, service: &PlannedService, outcome: &StartOutcome) {
        let message = match outcome {
            StartOutcome::Healthy => format!("{} healthy", "✓".green()),
            StartOutcome::Running => format!("{} 起動完了", "✓".green()),
            StartOutcome::Unverified => format!("{} 起動（ヘルスチェックなし）", "ℹ".blue()),
            StartOutcome::NotStarted { .. } => format!(
                "{} {} は healthy になりませんでした",
                "⚠".yellow(),
                service.spec.container_name
            ),
        };
        match self.spinner.take() {
            Some(spinner) => spinner.finish(&message),
            None => println!("  {}", message),
        }
    }
}

fn print_summary(report: &DeploymentReport, ctx: &RunContext, missing: &[String]) {
    println!();
    if !report.teardown.is_noop() {
        println!(
            "{} 既存のコンテナを作り直しました: {}",
            "ℹ".blue(),
            report.teardown.removed.join(", ")
        );
    }
    if report.network_created {
        println!(
            "{} ネットワークを作成しました: {}",
            "ℹ".blue(),
            ctx.network_name
        );
    }

    println!();
    println!("{}", "✓ SzGo の起動が完了しました".green().bold());
    for key in ServiceKey::ALL {
        let label = format!("{:<16}", key.display_name());
        match report.get(key) {
            Some(service) if service.outcome.is_started() => {
                println!("  {} {}", label.bold(), ctx.url_for(service.host_port).cyan());
            }
            Some(service) => {
                println!(
                    "  {} {}",
                    label.bold(),
                    format!("起動していません（szgo logs {} で確認）", service.container_name)
                        .yellow()
                );
            }
            None => {
                println!("  {} {}", label.bold(), "起動していません".dimmed());
            }
        }
    }

    if ctx.skip_health_check {
        println!();
        println!(
            "{} ヘルスチェックを省略しました。サービスが応答するまで少し時間がかかる場合があります",
            "ℹ".blue()
        );
    }

    if !missing.is_empty() {
        println!();
        println!(
            "{} 次のイメージを利用できませんでした: {}",
            "⚠".yellow(),
            missing.join(", ")
        );
        println!("  インターネットに接続できる環境で szgo save を実行し、");
        println!("  作成したバンドルをこのホストにコピーして szgo load で読み込んでください");
    }
}
