//! 统一错误处理框架
//!
//! 分析引擎的错误分层：
//! - 取消（用户主动中止，单独上报，不视为失败）
//! - 不可恢复的输入（没有任何声道）
//! - 构造期输入校验失败
//! - 计算/资源异常
//!
//! 可分析但有缺陷的输入（零长度、数值边界）不会走错误路径，
//! 而是降级为哨兵值并附带 `AnalysisWarning`。

use std::fmt;

/// 分析相关的统一错误类型
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// 外部请求取消，当前分析器在下一个轮询点停止
    Cancelled,

    /// 缓冲区不含任何声道，无法产出任何指标
    NoChannels,

    /// 输入验证错误（采样率为0、声道长度不一致、配置越界等）
    InvalidInput(String),

    /// 计算异常
    CalculationError(String),

    /// 资源访问错误（线程池创建失败等）
    ResourceError(String),
}

impl AnalysisError {
    /// 是否为取消结果（调用方应与真正的失败区分处理）
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Cancelled => write!(f, "分析已取消"),
            AnalysisError::NoChannels => write!(f, "音频缓冲区不含任何声道"),
            AnalysisError::InvalidInput(msg) => write!(f, "输入验证失败: {msg}"),
            AnalysisError::CalculationError(msg) => write!(f, "计算异常: {msg}"),
            AnalysisError::ResourceError(msg) => write!(f, "资源访问错误: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// 分析操作的标准Result类型
pub type AnalysisResult<T> = Result<T, AnalysisError>;

// ==================== 错误转换Helper函数 ====================

/// 创建输入验证错误的helper函数
#[inline]
pub fn invalid_input<E: fmt::Display>(context: &str, err: E) -> AnalysisError {
    AnalysisError::InvalidInput(format!("{context}: {err}"))
}

/// 创建计算错误的helper函数
#[inline]
pub fn calculation_error<E: fmt::Display>(context: &str, err: E) -> AnalysisError {
    AnalysisError::CalculationError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的结果统计

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// 用户取消
    Cancelled,
    /// 输入相关（无声道、校验失败）
    Input,
    /// 计算相关
    Calculation,
    /// 资源相关
    Resource,
}

impl ErrorCategory {
    /// 从AnalysisError提取错误类别
    pub fn from_analysis_error(e: &AnalysisError) -> Self {
        match e {
            AnalysisError::Cancelled => Self::Cancelled,
            AnalysisError::NoChannels | AnalysisError::InvalidInput(_) => Self::Input,
            AnalysisError::CalculationError(_) => Self::Calculation,
            AnalysisError::ResourceError(_) => Self::Resource,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cancelled => "已取消",
            Self::Input => "输入错误",
            Self::Calculation => "计算错误",
            Self::Resource => "资源错误",
        }
    }
}
