use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ScoreError;
use crate::schema::{Feature, FeatureLayout};

pub type BinWeights = HashMap<String, f64>;

/// woe 表：每个特征一个具名字段，而不是 dict 套 dict。
///
/// 导出格式 `{"d_first_name_bin": {"match": 0.3, ...}, ...}`。
/// 缺基础特征时 serde 直接报错（加载期就发现，而不是打分时静默丢列）；
/// 多出来的顶层 key 忽略，方便训练侧先加新特征再切模型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WoeTable {
    #[serde(rename = "d_first_name_bin")]
    pub d_first_name: BinWeights,
    #[serde(rename = "d_last_name_bin")]
    pub d_last_name: BinWeights,
    #[serde(rename = "d_second_name_bin")]
    pub d_second_name: BinWeights,
    #[serde(rename = "d_documents_bin")]
    pub d_documents: BinWeights,
    #[serde(rename = "docs_same_number_bin")]
    pub docs_same_number: BinWeights,
    #[serde(rename = "birth_settlement_substr_bin")]
    pub birth_settlement_substr: BinWeights,
    #[serde(rename = "d_tax_id_bin")]
    pub d_tax_id: BinWeights,
    #[serde(rename = "authentication_methods_flag_bin")]
    pub authentication_methods_flag: BinWeights,
    #[serde(rename = "residence_settlement_flag_bin")]
    pub residence_settlement_flag: BinWeights,
    #[serde(rename = "gender_flag_bin")]
    pub gender_flag: BinWeights,
    #[serde(rename = "twins_flag_bin")]
    pub twins_flag: BinWeights,
    #[serde(rename = "d_unzr_bin", default, skip_serializing_if = "Option::is_none")]
    pub d_unzr: Option<BinWeights>,
}

impl WoeTable {
    pub fn weights(&self, feature: Feature) -> Option<&BinWeights> {
        let w = match feature {
            Feature::DFirstName => &self.d_first_name,
            Feature::DLastName => &self.d_last_name,
            Feature::DSecondName => &self.d_second_name,
            Feature::DDocuments => &self.d_documents,
            Feature::DocsSameNumber => &self.docs_same_number,
            Feature::BirthSettlementSubstr => &self.birth_settlement_substr,
            Feature::DTaxId => &self.d_tax_id,
            Feature::AuthenticationMethodsFlag => &self.authentication_methods_flag,
            Feature::ResidenceSettlementFlag => &self.residence_settlement_flag,
            Feature::GenderFlag => &self.gender_flag,
            Feature::TwinsFlag => &self.twins_flag,
            Feature::DUnzr => return self.d_unzr.as_ref(),
        };
        Some(w)
    }

    fn weights_mut(&mut self, feature: Feature) -> &mut BinWeights {
        match feature {
            Feature::DFirstName => &mut self.d_first_name,
            Feature::DLastName => &mut self.d_last_name,
            Feature::DSecondName => &mut self.d_second_name,
            Feature::DDocuments => &mut self.d_documents,
            Feature::DocsSameNumber => &mut self.docs_same_number,
            Feature::BirthSettlementSubstr => &mut self.birth_settlement_substr,
            Feature::DTaxId => &mut self.d_tax_id,
            Feature::AuthenticationMethodsFlag => &mut self.authentication_methods_flag,
            Feature::ResidenceSettlementFlag => &mut self.residence_settlement_flag,
            Feature::GenderFlag => &mut self.gender_flag,
            Feature::TwinsFlag => &mut self.twins_flag,
            Feature::DUnzr => self.d_unzr.get_or_insert_with(HashMap::new),
        }
    }

    pub fn with_bin(mut self, feature: Feature, bin: impl Into<String>, woe: f64) -> Self {
        self.weights_mut(feature).insert(bin.into(), woe);
        self
    }

    /// 查不到就报错，不给默认值（默认 0 会悄悄把分数拉向截距）
    pub fn lookup(&self, feature: Feature, bin: &str) -> Result<f64, ScoreError> {
        self.weights(feature)
            .ok_or(ScoreError::MissingFeature { feature })?
            .get(bin)
            .copied()
            .ok_or_else(|| ScoreError::UnknownBin {
                feature,
                bin: bin.to_string(),
            })
    }

    pub fn validate(&self, layout: FeatureLayout) -> Result<()> {
        for &feature in layout.features() {
            let weights = self.weights(feature).ok_or_else(|| {
                anyhow!(
                    "woe table has no {} but layout {layout} needs it",
                    feature.bin_key()
                )
            })?;
            ensure!(
                !weights.is_empty(),
                "woe table entry {} has no bins",
                feature.bin_key()
            );
            for (bin, woe) in weights {
                ensure!(
                    woe.is_finite(),
                    "woe table entry {}[{bin:?}] is not finite: {woe}",
                    feature.bin_key()
                );
            }
        }
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        Feature::EXTENDED
            .iter()
            .filter_map(|f| self.weights(*f))
            .map(|w| w.len())
            .sum()
    }
}
