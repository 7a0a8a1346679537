//! 工具模块
//!
//! 提供输入防护和dB值序列化辅助。

pub mod db_serde;
pub mod safety;

// 重新导出公共接口
pub use safety::{BufferInspection, SafetyGuard};
