use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_SCORE_DIGITS: u32 = 15;

/// 运行时配置：模型目录 + 输出精度。文件读取后再由命令行参数覆盖。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// woe 表和模型导出文件所在目录（离线训练流水线负责写入/轮换）
    pub model_dir: PathBuf,

    /// 同时存在时优先 `.json.gz`
    pub woe_table_stem: String,

    pub model_stem: String,

    /// 返回概率保留的小数位；宿主侧按 5 位比较阈值，改动前要和宿主对齐
    pub score_digits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/dedup"),
            woe_table_stem: "woe_table".into(),
            model_stem: "model".into(),
            score_digits: 5,
        }
    }
}

impl Config {
    pub fn with_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Self::default()
        }
    }

    /// 没写的字段保持默认值
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&s)
            .with_context(|| format!("parse config: {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        // f64 只有 15~17 位有效数字，再多 10^digits 会溢出，round 出来是 NaN
        ensure!(
            self.score_digits <= MAX_SCORE_DIGITS,
            "score_digits={} out of range, expect <= {MAX_SCORE_DIGITS}",
            self.score_digits
        );
        ensure!(!self.woe_table_stem.is_empty(), "woe_table_stem is empty");
        ensure!(!self.model_stem.is_empty(), "model_stem is empty");
        Ok(())
    }
}
