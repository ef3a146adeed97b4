//! 特征组装：bin（或现成的 woe）-> 按训练顺序排列的向量。
//!
//! 宿主有三种调用形态，所以有三个入口：
//! - `(bin_key, bin_value)` 列表，如 `("d_first_name_bin", "match")`
//! - 每个特征一个具名字段（[`BinObservation`]）
//! - 宿主已算好的 woe（[`PrecomputedWoes`]）

use std::collections::HashMap;

use crate::error::ScoreError;
use crate::schema::{BinObservation, Feature, FeatureLayout, PrecomputedWoes};
use crate::woe::WoeTable;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

/// `(bin_key, bin_value)` 列表 -> `layout` 顺序的向量。
///
/// - 不认识的 key 跳过（宿主可能多传比对结果）
/// - 同一个 key 出现多次：后者覆盖前者
/// - layout 需要的特征没传：直接报错，不能少一列还继续算
pub fn assemble_from_bins<K, V>(
    bins: &[(K, V)],
    table: &WoeTable,
    layout: FeatureLayout,
) -> Result<FeatureVector, ScoreError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut observed: HashMap<Feature, &str> = HashMap::with_capacity(bins.len());
    for (key, value) in bins {
        match Feature::from_bin_key(key.as_ref()) {
            Some(feature) => {
                observed.insert(feature, value.as_ref());
            }
            None => tracing::debug!(key = key.as_ref(), "ignoring unknown bin key"),
        }
    }

    let mut values = Vec::with_capacity(layout.len());
    for &feature in layout.features() {
        let bin = observed
            .get(&feature)
            .ok_or(ScoreError::MissingFeature { feature })?;
        values.push(table.lookup(feature, bin)?);
    }
    Ok(FeatureVector::new(values))
}

pub fn assemble_from_fields(
    obs: &BinObservation,
    table: &WoeTable,
    layout: FeatureLayout,
) -> Result<FeatureVector, ScoreError> {
    let values = layout
        .features()
        .iter()
        .map(|&feature| {
            let bin = obs.get(feature).ok_or(ScoreError::MissingFeature { feature })?;
            table.lookup(feature, bin)
        })
        .collect::<Result<Vec<f64>, ScoreError>>()?;
    Ok(FeatureVector::new(values))
}

/// 12 个 woe 原样透传，不查表
pub fn assemble_from_woes(woes: &PrecomputedWoes) -> FeatureVector {
    FeatureVector::new(Feature::EXTENDED.iter().map(|f| woes.get(*f)).collect())
}
