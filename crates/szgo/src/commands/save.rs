use crate::ImageArgs;
use crate::docker;
use crate::remote::{self, RemoteClient};
use colored::Colorize;
use std::path::{Path, PathBuf};
use szgo_bundle::BundleManager;
use szgo_container::{ContainerEngine, ContainerError, ImageAvailability, PullOutcome};
use szgo_core::{ServiceKey, VersionManifest, parse_image_tag};

pub async fn handle(
    senzing_root: Option<&Path>,
    images: Vec<String>,
    output: Option<PathBuf>,
    args: &ImageArgs,
) -> anyhow::Result<()> {
    println!("{}", "イメージバンドルを作成中...".blue());

    // Docker接続
    let engine = docker::init_docker_with_error_handling().await?;

    println!();
    println!("{}", "インターネット接続を確認中...".blue());
    let remote_client = RemoteClient::new()?;
    let pull_enabled = remote_client.is_reachable(remote::DOCKERHUB_URL).await;
    if !pull_enabled {
        println!(
            "  {} レジストリに接続できません。ローカルのイメージのみ保存します",
            "⚠".yellow()
        );
    }

    // 明示指定がない場合だけバージョン一覧を参照する
    let manifest = if images.is_empty() && pull_enabled {
        remote_client
            .fetch_manifest(remote::manifest_url(args.stable))
            .await
    } else {
        None
    };

    println!();
    println!("{}", "保存するイメージを確認中...".blue());
    let references = collect_images(&engine, images, args, pull_enabled, manifest.as_ref()).await?;
    for reference in &references {
        println!("  • {}", reference.cyan());
    }

    let destination = output.unwrap_or_else(|| szgo_config::var_path(senzing_root));
    println!();
    println!("{}", "バンドルを書き出し中...".blue());
    let archive = BundleManager::new(&engine)
        .export_bundle(&references, &destination)
        .await?;

    println!();
    println!(
        "{}",
        format!("✓ バンドルを作成しました: {}", archive.display())
            .green()
            .bold()
    );
    println!("  このファイルを移送先のホストにコピーし、次のコマンドで読み込んでください:");
    println!("    szgo load {}", archive.display());
    Ok(())
}

/// 保存対象のイメージ参照を決める
///
/// - 明示指定あり: 到達可能ならプルし、ローカルに存在することを確認
/// - 明示指定なし: 到達可能なら3サービスの既定イメージをプルし、ローカルから選ぶ
async fn collect_images<E: ContainerEngine>(
    engine: &E,
    explicit: Vec<String>,
    args: &ImageArgs,
    pull_enabled: bool,
    manifest: Option<&VersionManifest>,
) -> anyhow::Result<Vec<String>> {
    let availability = ImageAvailability::new(engine);

    if !explicit.is_empty() {
        for reference in &explicit {
            if pull_enabled && availability.pull(reference, args.force_pull).await? == PullOutcome::NotFound {
                tracing::warn!(image = %reference, "プルできませんでした");
            }
            if !engine.image_exists(reference).await? {
                return Err(ContainerError::ImageUnavailable {
                    image: reference.clone(),
                }
                .into());
            }
        }
        return Ok(explicit);
    }

    if pull_enabled {
        for key in ServiceKey::ALL {
            if !super::is_selected(args, key) {
                continue;
            }
            let resolved = szgo_core::resolve(key, super::tag_override(args, key), manifest, &[]);
            let reference = format!("{}:{}", key.image_name(), resolved.tag);
            if availability.pull(&reference, args.force_pull).await? == PullOutcome::NotFound {
                println!(
                    "  {} {} をプルできませんでした",
                    "⚠".yellow(),
                    reference
                );
            }
        }
    }

    let references: Vec<String> = BundleManager::new(engine)
        .default_images()
        .await?
        .into_iter()
        .filter(|reference| {
            let name = parse_image_tag(reference).0;
            ServiceKey::ALL
                .iter()
                .find(|key| key.image_name() == name)
                .is_some_and(|key| super::is_selected(args, *key))
        })
        .collect();

    Ok(references)
}
