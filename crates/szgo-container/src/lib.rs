//! SzGo のコンテナエンジン連携
//!
//! `ContainerEngine` トレイトを境界に、Docker 実装とテスト用の
//! インメモリ実装を切り替えられるようにしています。

pub mod converter;
pub mod docker;
pub mod error;
pub mod image;
pub mod lifecycle;
pub mod runtime;
pub mod waiter;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use converter::*;
pub use docker::*;
pub use error::*;
pub use image::*;
pub use lifecycle::*;
pub use runtime::*;
pub use waiter::*;
