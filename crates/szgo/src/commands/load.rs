use crate::docker;
use colored::Colorize;
use std::path::Path;
use szgo_bundle::BundleManager;

pub async fn handle(senzing_root: Option<&Path>, file: &Path) -> anyhow::Result<()> {
    println!(
        "{}",
        format!("バンドルを読み込み中: {}", file.display()).blue()
    );

    // Docker接続
    let engine = docker::init_docker_with_error_handling().await?;

    let scratch_root = szgo_config::var_path(senzing_root);
    std::fs::create_dir_all(&scratch_root)?;

    let report = BundleManager::new(&engine)
        .import_bundle(file, &scratch_root)
        .await?;

    println!();
    for entry in &report.loaded {
        println!("  {} {}", "✓".green(), entry);
    }
    println!();
    println!(
        "{}",
        format!("✓ {} 個のイメージを読み込みました", report.loaded.len())
            .green()
            .bold()
    );
    Ok(())
}
