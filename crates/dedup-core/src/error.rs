use crate::schema::Feature;

/// 打分时的错误。加载阶段的错误走 anyhow（带文件路径上下文）。
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreError {
    MissingFeature { feature: Feature },
    UnknownBin { feature: Feature, bin: String },
    ShapeMismatch { expected: usize, got: usize },
    NonFiniteProbability(f64),
    NotLoaded,
}

impl ScoreError {
    /// 用作 metrics label 和响应里的 kind，改名会影响看板
    pub fn kind(&self) -> &'static str {
        match self {
            ScoreError::MissingFeature { .. } => "missing_feature",
            ScoreError::UnknownBin { .. } => "unknown_bin",
            ScoreError::ShapeMismatch { .. } => "shape_mismatch",
            ScoreError::NonFiniteProbability(_) => "non_finite_probability",
            ScoreError::NotLoaded => "not_loaded",
        }
    }

    /// 请求本身有问题（422），而不是模型/服务端问题（500）
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScoreError::MissingFeature { .. } | ScoreError::UnknownBin { .. }
        )
    }
}

impl std::fmt::Display for ScoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreError::MissingFeature { feature } => {
                write!(f, "missing bin for feature {}", feature.bin_key())
            }
            ScoreError::UnknownBin { feature, bin } => {
                write!(f, "no woe for {}={:?}", feature.bin_key(), bin)
            }
            ScoreError::ShapeMismatch { expected, got } => {
                write!(f, "feature vector len mismatch: got={got} expect={expected}")
            }
            ScoreError::NonFiniteProbability(p) => {
                write!(f, "classifier returned non-finite probability {p}")
            }
            ScoreError::NotLoaded => write!(f, "scorer has no model loaded"),
        }
    }
}

impl std::error::Error for ScoreError {}
