use crate::ProjectArgs;
use crate::docker;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::Path;
use szgo_container::{LifecycleController, TeardownMode, TeardownReport, TeardownScope};
use szgo_core::ServiceSpec;

/// `stop`（`remove == false`）と `down` の共通処理
pub async fn handle(
    senzing_root: Option<&Path>,
    project: &ProjectArgs,
    remove: bool,
    prompt: bool,
) -> anyhow::Result<()> {
    let project_name = super::project_name(senzing_root, project)?;
    if remove {
        println!("{}", "コンテナを停止・削除中...".yellow());
    } else {
        println!("{}", "コンテナを停止中...".yellow());
    }
    println!("プロジェクト: {}", project_name.cyan());

    // Docker接続
    println!();
    println!("{}", "Dockerに接続中...".blue());
    let engine = docker::init_docker_with_error_handling().await?;

    let scope = TeardownScope::from_specs(
        &ServiceSpec::defaults(&project_name),
        project_name.clone(),
        project.network.clone(),
    );
    let mode = if remove {
        TeardownMode::Remove { prompt }
    } else {
        TeardownMode::Stop
    };

    let report = LifecycleController::new(&engine)
        .teardown(&scope, mode, confirm_removal)
        .await?;

    print_report(&report, &scope);
    Ok(())
}

/// 削除前の確認（y/N）
fn confirm_removal(containers: &[String]) -> bool {
    println!();
    println!("{}", "次のコンテナを削除します:".bold());
    for name in containers {
        println!("  • {}", name.cyan());
    }
    print!("よろしいですか? [y/N]: ");
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_report(report: &TeardownReport, scope: &TeardownScope) {
    println!();
    if report.is_noop() {
        println!("{}", "対象のコンテナはありません".dimmed());
        return;
    }
    if report.cancelled {
        println!("{} 削除を中止しました", "ℹ".blue());
        return;
    }

    for name in &report.matched {
        println!("{}", format!("■ {}", name).yellow().bold());
        if report.stopped.contains(name) {
            println!("  ✓ 停止完了");
        }
        if report.removed.contains(name) {
            println!("  ✓ 削除完了");
        }
    }

    if report.network_removed {
        println!();
        println!("  ✓ ネットワーク削除完了: {}", scope.network_name);
    }

    if !report.failures.is_empty() {
        println!();
        for (target, error) in &report.failures {
            println!("  {} {}: {}", "⚠".yellow(), target, error);
        }
    }

    println!();
    println!("{}", "✓ 完了しました".green().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
