use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::features::FeatureVector;
use crate::schema::FeatureLayout;
use crate::util::{clamp01, sigmoid};

/// 模型抽象：只暴露 "向量 -> 正类概率" 这一件事，方便以后换 GBDT 等实现。
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn n_features(&self) -> usize;

    /// 正类 = 两条记录是同一个人
    fn predict_proba(&self, row: &FeatureVector) -> Result<f64, ScoreError>;
}

/// 离线训练导出的模型文件，按 `kind` 区分类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticRegressionSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionSpec {
    /// 训练时的列顺序，如 `["d_first_name_woe", ...]`
    pub feature_names: Vec<String>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl ModelSpec {
    pub fn feature_names(&self) -> &[String] {
        match self {
            ModelSpec::LogisticRegression(s) => &s.feature_names,
        }
    }

    pub fn layout(&self) -> Result<FeatureLayout> {
        let names = self.feature_names();
        FeatureLayout::detect(names).ok_or_else(|| {
            anyhow!(
                "model feature_names do not match a known layout: {:?}",
                names
            )
        })
    }

    pub fn build(self) -> Result<Box<dyn Classifier>> {
        match self {
            ModelSpec::LogisticRegression(s) => Ok(Box::new(LogisticRegression::try_from(s)?)),
        }
    }
}

/// Binary logistic regression: `p = sigmoid(intercept + coef . x)`.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub intercept: f64,
    pub coef: Vec<f64>,
}

impl LogisticRegression {
    pub fn new(intercept: f64, coef: Vec<f64>) -> Result<Self> {
        ensure!(!coef.is_empty(), "logistic regression without coefficients");
        ensure!(intercept.is_finite(), "intercept is not finite: {intercept}");
        if let Some((i, c)) = coef.iter().enumerate().find(|(_, c)| !c.is_finite()) {
            return Err(anyhow!("coef[{i}] is not finite: {c}"));
        }
        Ok(Self { intercept, coef })
    }

    #[inline]
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.coef
            .iter()
            .zip(x)
            .fold(self.intercept, |z, (w, v)| z + w * v)
    }
}

impl TryFrom<LogisticRegressionSpec> for LogisticRegression {
    type Error = anyhow::Error;

    fn try_from(s: LogisticRegressionSpec) -> Result<Self> {
        ensure!(
            s.coef.len() == s.feature_names.len(),
            "coef len mismatch: got={} expect={}",
            s.coef.len(),
            s.feature_names.len()
        );
        LogisticRegression::new(s.intercept, s.coef)
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict_proba(&self, row: &FeatureVector) -> Result<f64, ScoreError> {
        if row.len() != self.coef.len() {
            return Err(ScoreError::ShapeMismatch {
                expected: self.coef.len(),
                got: row.len(),
            });
        }
        let p = sigmoid(self.decision_function(row.as_slice()));
        if !p.is_finite() {
            return Err(ScoreError::NonFiniteProbability(p));
        }
        Ok(clamp01(p))
    }
}
