use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • 実行ユーザーが docker グループに所属しているか確認してください"
    )]
    EngineUnavailable(String),

    #[error("コンテナ '{container}' が見つかりません")]
    ContainerNotFound { container: String },

    #[error(
        "イメージ '{image}' を利用できません\n\nヒント:\n  • インターネットに接続できる環境で szgo save を実行し、作成したバンドルを szgo load で読み込んでください\n  • docker pull {image} でイメージをダウンロードしてください"
    )]
    ImageUnavailable { image: String },

    #[error(
        "コンテナ '{container}' が起動しませんでした（状態: {status}）\n\n********** Docker ログ **********\n{logs}\n********** ここまで **********"
    )]
    StartFailed {
        container: String,
        status: String,
        logs: String,
    },

    #[error(
        "コンテナ '{container}' が healthy になりませんでした（{attempts}回確認）\n\n********** Docker ログ **********\n{logs}\n********** ここまで **********"
    )]
    Unhealthy {
        container: String,
        attempts: u32,
        logs: String,
    },

    #[error(
        "ポート {port} は既に使用されています\n\nヒント:\n  • 別のポート番号を指定してください\n  • 既存のコンテナを停止してください: szgo stop"
    )]
    PortAlreadyInUse { port: u16 },

    #[error("依存サービスの準備に失敗しました: {0}")]
    DependencyFailed(String),

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404 | 409,
                ..
            } => {
                // 404 / 409 は呼び出し側で個別に処理されるべき
                ContainerError::DockerApiError(err.to_string())
            }
            _ => {
                // 接続エラーの可能性をチェック
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                    || err_str.contains("permission denied")
                {
                    ContainerError::EngineUnavailable(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_map_to_api_error() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert!(matches!(
            ContainerError::from(err),
            ContainerError::DockerApiError(_)
        ));
    }

    #[test]
    fn test_start_failed_message_contains_logs() {
        let err = ContainerError::StartFailed {
            container: "SzGo-API-demo".to_string(),
            status: "exited".to_string(),
            logs: "java.lang.Exception: boom".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("SzGo-API-demo"));
        assert!(message.contains("exited"));
        assert!(message.contains("boom"));
    }
}
