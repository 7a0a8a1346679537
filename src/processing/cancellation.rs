//! 协作式取消令牌
//!
//! 轮询式（非中断式）取消：宿主调用 `cancel()`，各分析器在每个窗口
//! 或每个样本块之间调用 `check()`，观察到取消后立即返回
//! `AnalysisError::Cancelled`，部分结果直接丢弃。

use crate::error::{AnalysisError, AnalysisResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 可克隆的取消令牌，所有克隆共享同一个标志位
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消（幂等，可从任意线程调用）
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// 轮询点：已取消时返回 `Err(Cancelled)`
    #[inline]
    pub fn check(&self) -> AnalysisResult<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
