// crates/dedup-core/src/schema.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// 两条人员记录之间的一个比对特征。
///
/// 声明顺序 = 模型训练时的列顺序，不要随意调整；`d_unzr` 只在 12 列的 extended 布局里出现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DFirstName,
    DLastName,
    DSecondName,
    DDocuments,
    DocsSameNumber,
    BirthSettlementSubstr,
    DTaxId,
    AuthenticationMethodsFlag,
    ResidenceSettlementFlag,
    GenderFlag,
    TwinsFlag,
    DUnzr,
}

impl Feature {
    pub const BASE: [Feature; 11] = [
        Feature::DFirstName,
        Feature::DLastName,
        Feature::DSecondName,
        Feature::DDocuments,
        Feature::DocsSameNumber,
        Feature::BirthSettlementSubstr,
        Feature::DTaxId,
        Feature::AuthenticationMethodsFlag,
        Feature::ResidenceSettlementFlag,
        Feature::GenderFlag,
        Feature::TwinsFlag,
    ];

    pub const EXTENDED: [Feature; 12] = [
        Feature::DFirstName,
        Feature::DLastName,
        Feature::DSecondName,
        Feature::DDocuments,
        Feature::DocsSameNumber,
        Feature::BirthSettlementSubstr,
        Feature::DTaxId,
        Feature::AuthenticationMethodsFlag,
        Feature::ResidenceSettlementFlag,
        Feature::GenderFlag,
        Feature::TwinsFlag,
        Feature::DUnzr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::DFirstName => "d_first_name",
            Feature::DLastName => "d_last_name",
            Feature::DSecondName => "d_second_name",
            Feature::DDocuments => "d_documents",
            Feature::DocsSameNumber => "docs_same_number",
            Feature::BirthSettlementSubstr => "birth_settlement_substr",
            Feature::DTaxId => "d_tax_id",
            Feature::AuthenticationMethodsFlag => "authentication_methods_flag",
            Feature::ResidenceSettlementFlag => "residence_settlement_flag",
            Feature::GenderFlag => "gender_flag",
            Feature::TwinsFlag => "twins_flag",
            Feature::DUnzr => "d_unzr",
        }
    }

    pub fn bin_key(self) -> String {
        format!("{}_bin", self.name())
    }

    pub fn woe_key(self) -> String {
        format!("{}_woe", self.name())
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::EXTENDED.into_iter().find(|f| f.name() == name)
    }

    pub fn from_bin_key(key: &str) -> Option<Feature> {
        key.strip_suffix("_bin").and_then(Feature::from_name)
    }

    /// 兼容：训练导出的列名有时带 `_woe` 后缀，有时是裸名
    pub fn from_any_key(key: &str) -> Option<Feature> {
        let bare = key
            .strip_suffix("_woe")
            .or_else(|| key.strip_suffix("_bin"))
            .unwrap_or(key);
        Feature::from_name(bare)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    Base,
    /// `d_unzr` 在最后
    Extended,
}

impl FeatureLayout {
    pub fn features(self) -> &'static [Feature] {
        match self {
            FeatureLayout::Base => &Feature::BASE,
            FeatureLayout::Extended => &Feature::EXTENDED,
        }
    }

    #[inline]
    pub fn len(self) -> usize {
        self.features().len()
    }

    /// 顺序也必须一致：列顺序错了模型照样能算，只是结果全错
    pub fn detect(names: &[String]) -> Option<FeatureLayout> {
        let parsed: Option<Vec<Feature>> =
            names.iter().map(|n| Feature::from_any_key(n)).collect();
        let parsed = parsed?;
        [FeatureLayout::Base, FeatureLayout::Extended]
            .into_iter()
            .find(|l| l.features() == parsed.as_slice())
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureLayout::Base => f.write_str("base"),
            FeatureLayout::Extended => f.write_str("extended"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinObservation {
    pub d_first_name: String,
    pub d_last_name: String,
    pub d_second_name: String,
    pub d_documents: String,
    pub docs_same_number: String,
    pub birth_settlement_substr: String,
    pub d_tax_id: String,
    pub authentication_methods_flag: String,
    pub residence_settlement_flag: String,
    pub gender_flag: String,
    pub twins_flag: String,
    #[serde(default)]
    pub d_unzr: Option<String>,
}

impl BinObservation {
    pub fn get(&self, feature: Feature) -> Option<&str> {
        let v = match feature {
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
            Feature::DUnzr => return self.d_unzr.as_deref(),
        };
        Some(v.as_str())
    }
}

/// 宿主已经算好的 woe；12 个都必填（缺一个就是宿主侧 bug，不做默认值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedWoes {
    pub d_first_name_woe: f64,
    pub d_last_name_woe: f64,
    pub d_second_name_woe: f64,
    pub d_documents_woe: f64,
    pub docs_same_number_woe: f64,
    pub birth_settlement_substr_woe: f64,
    pub d_tax_id_woe: f64,
    pub authentication_methods_flag_woe: f64,
    pub residence_settlement_flag_woe: f64,
    pub gender_flag_woe: f64,
    pub twins_flag_woe: f64,
    pub d_unzr_woe: f64,
}

impl PrecomputedWoes {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::DFirstName => self.d_first_name_woe,
            Feature::DLastName => self.d_last_name_woe,
            Feature::DSecondName => self.d_second_name_woe,
            Feature::DDocuments => self.d_documents_woe,
            Feature::DocsSameNumber => self.docs_same_number_woe,
            Feature::BirthSettlementSubstr => self.birth_settlement_substr_woe,
            Feature::DTaxId => self.d_tax_id_woe,
            Feature::AuthenticationMethodsFlag => self.authentication_methods_flag_woe,
            Feature::ResidenceSettlementFlag => self.residence_settlement_flag_woe,
            Feature::GenderFlag => self.gender_flag_woe,
            Feature::TwinsFlag => self.twins_flag_woe,
            Feature::DUnzr => self.d_unzr_woe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
}

/// 宿主侧期望 `{ok, Score}` 这种二元组
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub status: Status,
    pub score: f64,
}

impl Scored {
    pub fn ok(score: f64) -> Self {
        Self {
            status: Status::Ok,
            score,
        }
    }
}
