//! デプロイ計画の組み立て

use crate::remote::API_SPEC_FILE;
use std::path::{Path, PathBuf};
use szgo_core::{
    CoreError, DeploymentPlan, PlannedService, ResolvedImage, ServiceKey, ServiceSpec,
    VolumeBinding,
};

/// API サーバーに渡す初期化 JSON（そのまま引き継ぐ）
pub const INIT_JSON_ENV: &str = "SENZING_INIT_JSON";

/// 計画に必要なホスト側の情報
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub senzing_root: PathBuf,
    pub var_path: PathBuf,
    /// 変換で追加されたマウント（SQLite のデータ / Db2 CLI ドライバ）
    pub extra_volume: Option<VolumeBinding>,
    pub api_command: Vec<String>,
    pub user: Option<String>,
    pub init_json: String,
}

/// REST API サーバーの起動コマンド
pub fn api_command(
    ini_file_name: &str,
    admin: bool,
    debug: bool,
    custom: Option<&str>,
) -> Vec<String> {
    if let Some(custom) = custom {
        return custom.split_whitespace().map(str::to_string).collect();
    }

    let init_file = format!(
        "/etc/opt/senzing/{}{}",
        ini_file_name,
        szgo_config::TRANSLATED_SUFFIX
    );

    [
        "java",
        "-jar",
        "senzing-api-server.jar",
        "--enable-admin",
        if admin { "true" } else { "false" },
        "--allowed-origins",
        "*",
        "--concurrency",
        "10",
        "--read-only",
        "false",
        "--verbose",
        "true",
        "--debug",
        if debug { "true" } else { "false" },
        "--http-port",
        "8250",
        "--bind-addr",
        "all",
        "--init-file",
        init_file.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// ポート指定を反映したサービス定義（API, Web App, Swagger の順）
pub fn service_specs(project_name: &str, ports: [u16; 3]) -> Vec<ServiceSpec> {
    ServiceSpec::defaults(project_name)
        .into_iter()
        .zip(ports)
        .map(|(spec, port)| spec.with_host_port(port))
        .collect()
}

/// 起動するサービスの計画を組み立てる
///
/// `selected` には利用可能なイメージが用意できたサービスだけを渡すこと。
pub fn build_plan(
    inputs: &PlanInputs,
    selected: Vec<(ServiceSpec, ResolvedImage)>,
) -> Result<DeploymentPlan, CoreError> {
    let api_container = selected
        .iter()
        .find(|(spec, _)| spec.key == ServiceKey::Api)
        .map(|(spec, _)| (spec.container_name.clone(), spec.container_port));

    let services = selected
        .into_iter()
        .map(|(spec, image)| {
            let service = PlannedService::new(spec, image);
            match service.key() {
                ServiceKey::Api => api_service(service, inputs),
                ServiceKey::WebApp => match &api_container {
                    Some((name, port)) => web_app_service(service, name, *port),
                    None => service,
                },
                ServiceKey::Swagger => swagger_service(service, &inputs.var_path),
            }
        })
        .collect();

    DeploymentPlan::new(services)
}

fn api_service(service: PlannedService, inputs: &PlanInputs) -> PlannedService {
    let root = &inputs.senzing_root;
    let hostname = service.spec.container_name.clone();

    let mut service = service
        .with_volumes([
            VolumeBinding::read_write(root, "/opt/senzing/g2"),
            VolumeBinding::read_write(root.join("data"), "/opt/senzing/data"),
            VolumeBinding::read_write(root.join("etc"), "/etc/opt/senzing"),
        ])
        .with_volumes(inputs.extra_volume.clone())
        .with_command(inputs.api_command.clone())
        // Web App からはコンテナ名で参照される
        .with_hostname(hostname)
        .with_env(INIT_JSON_ENV, inputs.init_json.clone());

    if let Some(user) = &inputs.user {
        service = service.with_user(user.clone());
    }
    service
}

fn web_app_service(service: PlannedService, api_container: &str, api_port: u16) -> PlannedService {
    service
        .with_env(
            "SENZING_API_SERVER_URL",
            format!("http://{}:{}", api_container, api_port),
        )
        .with_env("SENZING_WEB_SERVER_PORT", service_port(ServiceKey::WebApp))
}

fn swagger_service(service: PlannedService, var_path: &Path) -> PlannedService {
    let mount = format!("/var/tmp/{}", API_SPEC_FILE);
    service
        .with_volume(VolumeBinding::read_only(
            var_path.join(API_SPEC_FILE),
            &mount,
        ))
        .with_env("SWAGGER_JSON", mount)
}

fn service_port(key: ServiceKey) -> String {
    key.container_port().to_string()
}

/// コンテナを実行するユーザーの uid
///
/// sudo 経由なら元のユーザー、そうでなければ実行ユーザー。
/// コンテナ内で作成されるファイル（G2C.db など）の所有者になります。
pub fn container_user() -> Option<String> {
    if let Ok(sudo_user) = std::env::var("SUDO_USER") {
        match nix::unistd::User::from_name(&sudo_user) {
            Ok(Some(user)) => return Some(user.uid.to_string()),
            Ok(None) => tracing::warn!(user = %sudo_user, "SUDO_USER のユーザーが見つかりません"),
            Err(e) => tracing::warn!(user = %sudo_user, error = %e, "ユーザー情報を取得できません"),
        }
    }
    Some(nix::unistd::getuid().to_string())
}

/// URL 表示に使うホスト名
pub fn host_name(explicit: Option<&str>) -> String {
    if let Some(host) = explicit {
        return host.to_string();
    }
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
