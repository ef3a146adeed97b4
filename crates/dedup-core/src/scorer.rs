use crate::{
    config::Config,
    error::ScoreError,
    features::{assemble_from_bins, assemble_from_fields, assemble_from_woes, FeatureVector},
    loader::{load_from_dir, Artefacts},
    model::Classifier,
    schema::{BinObservation, FeatureLayout, PrecomputedWoes, Scored},
    util::{now_us, round_to},
    woe::WoeTable,
};

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// 一次打分只读这一份；reload 时整体替换，不做字段级修改。
#[derive(Debug)]
pub struct Snapshot {
    pub layout: FeatureLayout,
    pub woe: WoeTable,
    pub classifier: Box<dyn Classifier>,
    /// 从 1 开始，每次 reload 成功 +1（/health 里用来确认线上是哪一版）
    pub generation: u64,
    pub woe_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
}

impl Snapshot {
    pub fn new(layout: FeatureLayout, woe: WoeTable, classifier: Box<dyn Classifier>) -> Self {
        Self {
            layout,
            woe,
            classifier,
            generation: 1,
            woe_path: None,
            model_path: None,
        }
    }

    fn from_artefacts(a: Artefacts, generation: u64) -> Self {
        Self {
            layout: a.layout,
            woe: a.woe,
            classifier: a.classifier,
            generation,
            woe_path: Some(a.woe_path),
            model_path: Some(a.model_path),
        }
    }
}

/// 进程级 scorer：
/// - 启动时和 [`Scorer::reload`] 时才解析模型文件，打分路径不再反序列化
/// - 每次调用拿当前 snapshot 的 `Arc`，reload 不影响正在进行的请求
/// - reload 失败时旧 snapshot 继续服务
#[derive(Debug)]
pub struct Scorer {
    cfg: Config,
    current: RwLock<Option<Arc<Snapshot>>>,
    reload_lock: Mutex<()>,
}

impl Scorer {
    /// 空 scorer：reload 成功之前所有调用都返回 `NotLoaded`
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn load(cfg: Config) -> anyhow::Result<Self> {
        let scorer = Self::new(cfg);
        scorer.reload()?;
        Ok(scorer)
    }

    /// 内存里直接构造（测试 / 宿主自带参数）；之后的 reload 仍然读 `cfg.model_dir`
    pub fn from_snapshot(cfg: Config, snapshot: Snapshot) -> Self {
        metrics::gauge!("scorer_generation").set(snapshot.generation as f64);
        Self {
            cfg,
            current: RwLock::new(Some(Arc::new(snapshot))),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>, ScoreError> {
        self.current.read().clone().ok_or(ScoreError::NotLoaded)
    }

    /// 重新读取模型目录并替换 snapshot，返回新的 generation。
    ///
    /// 解析在写锁之外完成（读请求不会被文件 IO 卡住）；并发 reload 由 reload_lock 串行化。
    pub fn reload(&self) -> anyhow::Result<u64> {
        let _guard = self.reload_lock.lock();
        let t0 = Instant::now();

        let artefacts = match load_from_dir(&self.cfg) {
            Ok(a) => a,
            Err(e) => {
                metrics::counter!("scorer_reload_failed_total").increment(1);
                tracing::warn!(error = %format!("{e:#}"), "reload failed, keeping current snapshot");
                return Err(e);
            }
        };

        let generation = self
            .current
            .read()
            .as_ref()
            .map_or(1, |s| s.generation + 1);
        let snapshot = Arc::new(Snapshot::from_artefacts(artefacts, generation));
        *self.current.write() = Some(snapshot);

        metrics::counter!("scorer_reload_total").increment(1);
        metrics::gauge!("scorer_generation").set(generation as f64);
        tracing::info!(generation, elapsed_us = now_us(t0), "scorer snapshot swapped");
        Ok(generation)
    }

    /// 宿主传 `[(d_first_name_bin, "match"), ...]` 的形式
    pub fn score_bins<K, V>(&self, bins: &[(K, V)]) -> Result<Scored, ScoreError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.run(|s| assemble_from_bins(bins, &s.woe, s.layout))
    }

    pub fn score_fields(&self, obs: &BinObservation) -> Result<Scored, ScoreError> {
        self.run(|s| assemble_from_fields(obs, &s.woe, s.layout))
    }

    /// woe 已由宿主算好：不查表，直接按训练顺序喂给模型
    pub fn score_woes(&self, woes: &PrecomputedWoes) -> Result<Scored, ScoreError> {
        self.run(|_| Ok(assemble_from_woes(woes)))
    }

    fn run<F>(&self, assemble: F) -> Result<Scored, ScoreError>
    where
        F: FnOnce(&Snapshot) -> Result<FeatureVector, ScoreError>,
    {
        let t0 = Instant::now();
        let res = self.snapshot().and_then(|s| {
            let t_feat = Instant::now();
            let row = assemble(&*s)?;
            metrics::histogram!("stage_feature_us").record(now_us(t_feat) as f64);

            score_with(s.classifier.as_ref(), &row, self.cfg.score_digits)
        });

        match &res {
            Ok(scored) => {
                metrics::counter!("score_total").increment(1);
                tracing::debug!(score = scored.score, "scored pair");
            }
            Err(e) => {
                metrics::counter!("score_error_total", "kind" => e.kind()).increment(1);
                tracing::debug!(error = %e, "scoring failed");
            }
        }
        metrics::histogram!("e2e_us").record(now_us(t0) as f64);
        res
    }
}

/// `round(classifier.predict_proba(row), digits)`，带 ok 标记返回。
pub fn score_with(
    classifier: &dyn Classifier,
    row: &FeatureVector,
    digits: u32,
) -> Result<Scored, ScoreError> {
    if row.len() != classifier.n_features() {
        return Err(ScoreError::ShapeMismatch {
            expected: classifier.n_features(),
            got: row.len(),
        });
    }
    let t_model = Instant::now();
    let p = classifier.predict_proba(row)?;
    metrics::histogram!("stage_model_us").record(now_us(t_model) as f64);
    if !p.is_finite() {
        return Err(ScoreError::NonFiniteProbability(p));
    }
    // digits 过大时 10^digits 溢出为 inf，round 结果会变成 NaN：不能当作 ok 返回
    let score = round_to(p, digits);
    if !score.is_finite() {
        return Err(ScoreError::NonFiniteProbability(score));
    }
    Ok(Scored::ok(score))
}
