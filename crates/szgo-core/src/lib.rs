//! SzGo のコア
//!
//! コンテナエンジンに触れない純粋なロジックを集めたクレートです。
//! - サービス定義・デプロイ計画などのデータモデル
//! - イメージタグの解決（override → リモートマニフェスト → ローカル → latest）
//! - データベース設定のコンテナ向け変換
//! - ネットワーク取得用のリトライポリシー

pub mod error;
pub mod model;
pub mod retry;
pub mod translate;
pub mod version;

pub use error::*;
pub use model::*;
pub use retry::*;
pub use translate::*;
pub use version::*;
