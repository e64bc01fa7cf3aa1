mod commands;
mod docker;
mod plan;
mod progress;
mod remote;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "szgo")]
#[command(
    about = "Senzing REST API サーバー・Web App・Swagger UI をコンテナで起動",
    long_about = None
)]
struct Cli {
    /// Senzing プロジェクトのルート
    #[arg(long, env = "SENZING_ROOT", global = true, hide_env_values = true)]
    senzing_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// プロジェクトを特定する共通オプション
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// コンテナ名のサフィックス（デフォルトはプロジェクトのディレクトリ名）
    #[arg(short = 'p', long)]
    pub project_suffix: Option<String>,
    /// コンテナ間通信に使う Docker ネットワーク
    #[arg(short = 'n', long, default_value = szgo_core::DEFAULT_NETWORK)]
    pub network: String,
    /// URL 表示・API 仕様取得に使うホスト名（デフォルトはこのホストの名前）
    #[arg(long)]
    pub host: Option<String>,
}

/// REST API サーバーの起動コマンドに関するオプション
#[derive(Args, Debug, Clone, Default)]
pub struct ApiCommandArgs {
    /// データベース設定ファイル（G2Module.ini）
    #[arg(short = 'c', long)]
    pub ini_file: Option<PathBuf>,
    /// REST API の管理機能を有効化
    #[arg(long)]
    pub api_admin: bool,
    /// REST API サーバーのデバッグ出力を有効化
    #[arg(long, hide = true)]
    pub api_debug: bool,
    /// REST API サーバーの起動コマンドを置き換える
    #[arg(long, hide = true)]
    pub api_command: Option<String>,
}

/// イメージタグの取得元に関するオプション
#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// REST API サーバーのイメージタグ
    #[arg(long, hide = true)]
    pub api_tag: Option<String>,
    /// Web App のイメージタグ
    #[arg(long, hide = true)]
    pub web_app_tag: Option<String>,
    /// Swagger UI のイメージタグ
    #[arg(long, hide = true)]
    pub swagger_tag: Option<String>,
    /// latest ではなく stable のバージョン一覧を使う
    #[arg(long, hide = true)]
    pub stable: bool,
    /// ローカルにあってもイメージをプルする
    #[arg(long, hide = true)]
    pub force_pull: bool,
    /// Web App を対象外にする
    #[arg(long)]
    pub no_web_app: bool,
    /// Swagger UI を対象外にする
    #[arg(long)]
    pub no_swagger: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// コンテナを起動（既存のコンテナは作り直す）
    Up {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        api: ApiCommandArgs,
        #[command(flatten)]
        images: ImageArgs,
        /// REST API サーバーのホストポート
        #[arg(long, default_value_t = 8250)]
        api_port: u16,
        /// Web App のホストポート
        #[arg(long, default_value_t = 8251)]
        web_app_port: u16,
        /// Swagger UI のホストポート
        #[arg(long, default_value_t = 9180)]
        swagger_port: u16,
        /// Db2 CLI ドライバのディレクトリ（Db2 使用時は必須）
        #[arg(long)]
        db2_cli_path: Option<PathBuf>,
        /// ヘルスチェックを待たない
        #[arg(long, hide = true)]
        skip_health: bool,
    },
    /// コンテナを停止
    Stop {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// コンテナを停止して削除（ネットワークも削除）
    Down {
        #[command(flatten)]
        project: ProjectArgs,
        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },
    /// コンテナの状態と URL を表示
    Info {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        api: ApiCommandArgs,
    },
    /// コンテナのログを表示
    Logs {
        /// コンテナ名に含まれる文字列
        #[arg(default_value = "SzGo")]
        filter: String,
    },
    /// イメージをバンドル（tar.gz）に保存
    Save {
        /// 保存するイメージ（省略時は3サービスのイメージ）
        images: Vec<String>,
        /// バンドルの保存先ディレクトリ
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        image_args: ImageArgs,
    },
    /// バンドルからイメージを読み込む
    Load {
        /// szgo save で作成したバンドル
        file: PathBuf,
    },
    /// データベース設定を JSON に変換して表示
    IniToJson {
        /// データベース設定ファイル（G2Module.ini）
        #[arg(short = 'c', long)]
        ini_file: Option<PathBuf>,
        /// 整形して表示
        #[arg(long)]
        pretty: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 進捗表示は stdout、ログは stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let senzing_root = cli
        .senzing_root
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(szgo_config::senzing_root);

    match cli.command {
        Commands::Up {
            project,
            api,
            images,
            api_port,
            web_app_port,
            swagger_port,
            db2_cli_path,
            skip_health,
        } => {
            commands::up::handle(commands::up::UpOptions {
                senzing_root,
                project,
                api,
                images,
                ports: [api_port, web_app_port, swagger_port],
                db2_cli_path,
                skip_health,
            })
            .await?;
        }
        Commands::Stop { project } => {
            commands::down::handle(senzing_root.as_deref(), &project, false, false).await?;
        }
        Commands::Down { project, yes } => {
            commands::down::handle(senzing_root.as_deref(), &project, true, !yes).await?;
        }
        Commands::Info { project, api } => {
            commands::info::handle(senzing_root.as_deref(), &project, &api).await?;
        }
        Commands::Logs { filter } => {
            commands::logs::handle(&filter).await?;
        }
        Commands::Save {
            images,
            output,
            image_args,
        } => {
            commands::save::handle(senzing_root.as_deref(), images, output, &image_args).await?;
        }
        Commands::Load { file } => {
            commands::load::handle(senzing_root.as_deref(), &file).await?;
        }
        Commands::IniToJson { ini_file, pretty } => {
            commands::ini::handle(senzing_root.as_deref(), ini_file.as_deref(), pretty)?;
        }
        Commands::Version => {
            println!("szgo {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
