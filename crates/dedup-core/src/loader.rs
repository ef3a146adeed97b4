use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::model::{Classifier, ModelSpec};
use crate::schema::FeatureLayout;
use crate::woe::WoeTable;

/// 一个 snapshot 需要的全部产物；模型和 woe 表已互相校验过。
#[derive(Debug)]
pub struct Artefacts {
    pub layout: FeatureLayout,
    pub woe: WoeTable,
    pub classifier: Box<dyn Classifier>,
    pub woe_path: PathBuf,
    pub model_path: PathBuf,
}

/// 兼容：训练脚本可能只写 gz，也可能两个都写（gz 优先）
fn select_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    [format!("{stem}.json.gz"), format!("{stem}.json")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let gz = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    let v = if gz {
        let dec = flate2::read::GzDecoder::new(f);
        serde_json::from_reader(BufReader::new(dec))
    } else {
        serde_json::from_reader(BufReader::new(f))
    };
    v.with_context(|| format!("parse {}", path.display()))
}

pub fn load_woe_table(path: &Path) -> Result<WoeTable> {
    read_json(path)
}

pub fn load_model_spec(path: &Path) -> Result<ModelSpec> {
    read_json(path)
}

/// 从 `cfg.model_dir` 读取 woe 表和模型并交叉校验。
///
/// 特征顺序以模型为准（训练时的列顺序）；woe 表必须覆盖该顺序里的每个特征，
/// 缺特征在这里直接报错，而不是等到打分时才发现。
pub fn load_from_dir(cfg: &Config) -> Result<Artefacts> {
    cfg.validate()?;
    let dir = cfg.model_dir.as_path();

    let woe_path = select_file(dir, &cfg.woe_table_stem).ok_or_else(|| {
        anyhow!(
            "missing woe table in model_dir={}, expected {}.json or {}.json.gz",
            dir.display(),
            cfg.woe_table_stem,
            cfg.woe_table_stem
        )
    })?;
    let model_path = select_file(dir, &cfg.model_stem).ok_or_else(|| {
        anyhow!(
            "missing model in model_dir={}, expected {}.json or {}.json.gz",
            dir.display(),
            cfg.model_stem,
            cfg.model_stem
        )
    })?;

    let spec = load_model_spec(&model_path)?;
    let layout = spec
        .layout()
        .with_context(|| format!("model schema: {}", model_path.display()))?;
    let classifier = spec
        .build()
        .with_context(|| format!("build classifier: {}", model_path.display()))?;

    let woe = load_woe_table(&woe_path)?;
    woe.validate(layout)
        .with_context(|| format!("woe table schema: {}", woe_path.display()))?;

    tracing::info!(
        layout = %layout,
        n_features = classifier.n_features(),
        bins = woe.bin_count(),
        woe_path = %woe_path.display(),
        model_path = %model_path.display(),
        "loaded dedup artefacts"
    );

    Ok(Artefacts {
        layout,
        woe,
        classifier,
        woe_path,
        model_path,
    })
}
