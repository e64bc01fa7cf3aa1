pub mod down;
pub mod info;
pub mod ini;
pub mod load;
pub mod logs;
pub mod save;
pub mod up;

use crate::{ImageArgs, ProjectArgs};
use colored::Colorize;
use std::path::Path;
use szgo_config::ConfigError;
use szgo_core::{RunContext, ServiceKey};

/// SENZING_ROOT が必要なコマンド用
pub fn require_root(senzing_root: Option<&Path>) -> anyhow::Result<&Path> {
    senzing_root.ok_or_else(|| ConfigError::SenzingRootNotSet.into())
}

/// コンテナ名のサフィックス
///
/// `--project-suffix` が優先、なければ SENZING_ROOT のディレクトリ名。
pub fn project_name(senzing_root: Option<&Path>, args: &ProjectArgs) -> anyhow::Result<String> {
    if let Some(suffix) = &args.project_suffix {
        return Ok(suffix.clone());
    }

    let name = szgo_config::project_name(require_root(senzing_root)?);
    if name.is_empty() {
        return Err(anyhow::anyhow!(
            "プロジェクト名を決められません\n\nヒント:\n  • --project-suffix で指定してください"
        ));
    }
    Ok(name)
}

/// 実行コンテキストを組み立てる
pub fn run_context(senzing_root: Option<&Path>, args: &ProjectArgs) -> anyhow::Result<RunContext> {
    let project = project_name(senzing_root, args)?;
    let host = crate::plan::host_name(args.host.as_deref());

    if host == "localhost" {
        println!(
            "{} ホスト名が localhost です。他のホストからはアクセスできません（--host で指定できます）",
            "⚠".yellow()
        );
    }

    Ok(RunContext::new(project, host)
        .with_network(args.network.clone())
        .with_var_path(szgo_config::var_path(senzing_root)))
}

/// サービスが `--no-web-app` / `--no-swagger` で除外されていないか
pub fn is_selected(args: &ImageArgs, key: ServiceKey) -> bool {
    match key {
        ServiceKey::Api => true,
        ServiceKey::WebApp => !args.no_web_app,
        ServiceKey::Swagger => !args.no_swagger,
    }
}

/// 明示指定されたイメージタグ
pub fn tag_override(args: &ImageArgs, key: ServiceKey) -> Option<&str> {
    match key {
        ServiceKey::Api => args.api_tag.as_deref(),
        ServiceKey::WebApp => args.web_app_tag.as_deref(),
        ServiceKey::Swagger => args.swagger_tag.as_deref(),
    }
    .filter(|tag| !tag.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(suffix: Option<&str>) -> ProjectArgs {
        ProjectArgs {
            project_suffix: suffix.map(str::to_string),
            network: szgo_core::DEFAULT_NETWORK.to_string(),
            host: Some("example.com".to_string()),
        }
    }

    #[test]
    fn test_project_name_suffix_wins() {
        let name = project_name(Some(Path::new("/opt/G2Project")), &args(Some("demo"))).unwrap();
        assert_eq!(name, "demo");
    }

    #[test]
    fn test_project_name_from_root() {
        let name = project_name(Some(Path::new("/opt/My Project")), &args(None)).unwrap();
        assert_eq!(name, "MyProject");
    }

    #[test]
    fn test_project_name_requires_root() {
        assert!(project_name(None, &args(None)).is_err());
    }

    #[test]
    fn test_run_context() {
        let ctx = run_context(Some(Path::new("/opt/G2Project")), &args(None)).unwrap();
        assert_eq!(ctx.project_name, "G2Project");
        assert_eq!(ctx.host_name, "example.com");
        assert_eq!(ctx.var_path, Path::new("/opt/G2Project/var"));
    }

    #[test]
    fn test_is_selected() {
        let images = ImageArgs {
            no_swagger: true,
            ..Default::default()
        };
        assert!(is_selected(&images, ServiceKey::Api));
        assert!(is_selected(&images, ServiceKey::WebApp));
        assert!(!is_selected(&images, ServiceKey::Swagger));
    }

    #[test]
    fn test_tag_override() {
        let images = ImageArgs {
            api_tag: Some("3.4.1".to_string()),
            web_app_tag: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(tag_override(&images, ServiceKey::Api), Some("3.4.1"));
        assert_eq!(tag_override(&images, ServiceKey::WebApp), None);
        assert_eq!(tag_override(&images, ServiceKey::Swagger), None);
    }
}
