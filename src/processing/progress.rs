//! 进度上报
//!
//! 同步回调 `callback(label, fraction)`，在阶段边界调用。
//! 单次分析内进度单调不减，最终以 `("complete", 1.0)` 结束。

/// 阶段标签（稳定字符串，宿主可据此显示）
pub mod stage {
    pub const VALIDATING: &str = "validating";
    pub const PEAK: &str = "peak";
    pub const WINDOWS: &str = "windows";
    pub const NOISE_FLOOR: &str = "noise_floor";
    pub const SEGMENTATION: &str = "segmentation";
    pub const CLIPPING: &str = "clipping";
    pub const REVERB: &str = "reverb";
    pub const STEREO: &str = "stereo";
    pub const COMPLETE: &str = "complete";
}

/// 进度回调类型
pub type ProgressCallback<'a> = Box<dyn FnMut(&str, f64) + Send + 'a>;

/// 保证单调性的进度上报器
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
    last_fraction: f64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Self {
            callback,
            last_fraction: 0.0,
        }
    }

    /// 不上报任何进度
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// 上报进度，小于上次的值会被抬升到上次的值
    pub fn report(&mut self, label: &str, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            self.last_fraction
        };
        let fraction = fraction.max(self.last_fraction);
        self.last_fraction = fraction;

        if let Some(callback) = self.callback.as_mut() {
            callback(label, fraction);
        }
    }

    #[inline]
    pub fn last_fraction(&self) -> f64 {
        self.last_fraction
    }
}
