use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dedup_core::config::Config;
use dedup_core::features::assemble_from_bins;
use dedup_core::model::{Classifier, LogisticRegression};
use dedup_core::schema::{BinObservation, Feature, FeatureLayout, PrecomputedWoes, Scored};
use dedup_core::util::round_to;
use dedup_core::{ScoreError, Scorer};
use serde_json::json;

fn temp_model_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dedup-e2e-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn woe_table_json(with_unzr: bool) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    let features: &[Feature] = if with_unzr {
        &Feature::EXTENDED
    } else {
        &Feature::BASE
    };
    for (i, f) in features.iter().enumerate() {
        let w = 0.1 * (i as f64 + 1.0);
        obj.insert(f.bin_key(), json!({"match": w, "no_match": -w, "partial": w / 2.0}));
    }
    obj.insert(
        "d_first_name_bin".into(),
        json!({"match": 0.3, "no_match": -0.2}),
    );
    serde_json::Value::Object(obj)
}

fn model_json(layout: FeatureLayout, intercept: f64) -> serde_json::Value {
    let names: Vec<String> = layout.features().iter().map(|f| f.woe_key()).collect();
    let coef: Vec<f64> = (0..layout.len()).map(|i| 0.5 - 0.05 * i as f64).collect();
    json!({
        "kind": "logistic_regression",
        "feature_names": names,
        "coef": coef,
        "intercept": intercept,
    })
}

fn write_json(path: &Path, v: &serde_json::Value) {
    fs::write(path, serde_json::to_vec_pretty(v).unwrap()).unwrap();
}

fn write_json_gz(path: &Path, v: &serde_json::Value) {
    let f = fs::File::create(path).unwrap();
    let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
    enc.write_all(&serde_json::to_vec(v).unwrap()).unwrap();
    enc.finish().unwrap();
}

fn all_bins(layout: FeatureLayout, bin: &str) -> Vec<(String, String)> {
    layout
        .features()
        .iter()
        .map(|f| (f.bin_key(), bin.to_string()))
        .collect()
}

#[test]
fn score_equals_rounded_logistic_probability() {
    let dir = temp_model_dir();
    write_json(&dir.join("woe_table.json"), &woe_table_json(false));
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, -0.7));

    let scorer = Scorer::load(Config::with_model_dir(&dir)).unwrap();
    let snap = scorer.snapshot().unwrap();
    assert_eq!(snap.layout, FeatureLayout::Base);
    assert_eq!(snap.generation, 1);

    let bins = all_bins(FeatureLayout::Base, "match");
    let row = assemble_from_bins(&bins, &snap.woe, snap.layout).unwrap();
    assert_eq!(row.as_slice()[0], 0.3);

    let coef: Vec<f64> = (0..11).map(|i| 0.5 - 0.05 * i as f64).collect();
    let lr = LogisticRegression::new(-0.7, coef).unwrap();
    let want = round_to(lr.predict_proba(&row).unwrap(), 5);

    let got = scorer.score_bins(&bins).unwrap();
    assert_eq!(got, Scored::ok(want));

    // same inputs, same snapshot, same answer
    assert_eq!(scorer.score_bins(&bins).unwrap(), got);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn field_variant_matches_pair_variant() {
    let dir = temp_model_dir();
    write_json(&dir.join("woe_table.json"), &woe_table_json(false));
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, 0.1));
    let scorer = Scorer::load(Config::with_model_dir(&dir)).unwrap();

    let obs = BinObservation {
        d_first_name: "no_match".into(),
        d_last_name: "match".into(),
        d_second_name: "partial".into(),
        d_documents: "match".into(),
        docs_same_number: "no_match".into(),
        birth_settlement_substr: "match".into(),
        d_tax_id: "match".into(),
        authentication_methods_flag: "partial".into(),
        residence_settlement_flag: "match".into(),
        gender_flag: "match".into(),
        twins_flag: "no_match".into(),
        d_unzr: None,
    };
    let pairs: Vec<(String, String)> = Feature::BASE
        .iter()
        .map(|f| (f.bin_key(), obs.get(*f).unwrap().to_string()))
        .collect();
    assert_eq!(
        scorer.score_fields(&obs).unwrap(),
        scorer.score_bins(&pairs).unwrap()
    );

    let mut bad = obs.clone();
    bad.d_first_name = "partial".into();
    assert_eq!(
        scorer.score_fields(&bad).unwrap_err(),
        ScoreError::UnknownBin {
            feature: Feature::DFirstName,
            bin: "partial".into()
        }
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn extended_layout_from_gzip_artefacts() {
    let dir = temp_model_dir();
    write_json_gz(&dir.join("woe_table.json.gz"), &woe_table_json(true));
    write_json_gz(&dir.join("model.json.gz"), &model_json(FeatureLayout::Extended, 0.0));
    // plain json next to the gzip one is ignored
    write_json(&dir.join("model.json"), &json!({"kind": "nonsense"}));

    let scorer = Scorer::load(Config::with_model_dir(&dir)).unwrap();
    assert_eq!(scorer.snapshot().unwrap().layout, FeatureLayout::Extended);

    let missing_unzr = all_bins(FeatureLayout::Base, "match");
    assert_eq!(
        scorer.score_bins(&missing_unzr).unwrap_err(),
        ScoreError::MissingFeature {
            feature: Feature::DUnzr
        }
    );
    assert!(scorer
        .score_bins(&all_bins(FeatureLayout::Extended, "match"))
        .is_ok());

    let woes = PrecomputedWoes {
        d_first_name_woe: 0.3,
        ..PrecomputedWoes::default()
    };
    let s = scorer.score_woes(&woes).unwrap();
    assert!(s.score > 0.5 && s.score < 1.0);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn loading_rejects_inconsistent_artefacts() {
    let dir = temp_model_dir();
    let mut table = woe_table_json(false);
    table.as_object_mut().unwrap().remove("gender_flag_bin");
    write_json(&dir.join("woe_table.json"), &table);
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, 0.0));
    let err = Scorer::load(Config::with_model_dir(&dir)).unwrap_err();
    assert!(format!("{err:#}").contains("gender_flag_bin"));

    // base table cannot serve an extended model
    write_json(&dir.join("woe_table.json"), &woe_table_json(false));
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Extended, 0.0));
    let err = Scorer::load(Config::with_model_dir(&dir)).unwrap_err();
    assert!(format!("{err:#}").contains("d_unzr_bin"));

    // valid artefacts, but a precision that would overflow the rounding
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, 0.0));
    let cfg = Config {
        score_digits: 400,
        ..Config::with_model_dir(&dir)
    };
    let err = Scorer::load(cfg).unwrap_err();
    assert!(format!("{err:#}").contains("score_digits=400"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn reload_swaps_snapshot_and_survives_bad_artefacts() {
    let dir = temp_model_dir();
    write_json(&dir.join("woe_table.json"), &woe_table_json(false));
    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, -3.0));
    let scorer = Scorer::load(Config::with_model_dir(&dir)).unwrap();
    let bins = all_bins(FeatureLayout::Base, "match");
    let before = scorer.score_bins(&bins).unwrap();

    write_json(&dir.join("model.json"), &model_json(FeatureLayout::Base, 3.0));
    assert_eq!(scorer.reload().unwrap(), 2);
    let after = scorer.score_bins(&bins).unwrap();
    assert!(after.score > before.score);

    fs::write(dir.join("model.json"), b"{not json").unwrap();
    assert!(scorer.reload().is_err());
    assert_eq!(scorer.snapshot().unwrap().generation, 2);
    assert_eq!(scorer.score_bins(&bins).unwrap(), after);

    fs::remove_dir_all(&dir).ok();
}
