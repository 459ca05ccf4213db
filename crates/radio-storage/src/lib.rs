//! # RadioArchive存储模块
//!
//! 负责病例集合、收藏与界面偏好的键值持久化。

pub mod records;
pub mod storage;

pub use records::*;
pub use storage::*;
