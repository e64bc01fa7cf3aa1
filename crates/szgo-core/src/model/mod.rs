//! モデル定義
//!
//! SzGo で使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod context;
mod image;
mod plan;
mod service;
mod volume;

// Re-exports
pub use context::*;
pub use image::*;
pub use plan::*;
pub use service::*;
pub use volume::*;
