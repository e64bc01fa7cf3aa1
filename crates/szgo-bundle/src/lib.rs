//! SzGo のイメージバンドル
//!
//! インターネットに接続できないホストへ移送するため、
//! 複数のイメージを1つの tar.gz にまとめ、また復元します。

pub mod archive;
pub mod error;
pub mod manager;
pub mod naming;

pub use error::*;
pub use manager::*;
pub use naming::*;
