use std::io::Write;

use housing_effects::config::Config;
use housing_effects::pipeline::Pipeline;
use housing_effects::report::AnalysisReport;
use housing_effects::synthetic::{self, SyntheticConfig};
use housing_effects::types::CohortGroup;

fn synthetic_config(dir: &std::path::Path) -> Config {
    let cfg = SyntheticConfig {
        seed: 7,
        ..SyntheticConfig::default()
    };
    let (inputs, summary) = synthetic::generate(&dir.join("data"), &cfg).unwrap();
    assert!(summary.sale_rows >= cfg.sales);

    let mut config = Config::default();
    config.inputs = inputs;
    config.output.report_dir = dir.join("reports");
    config
}

#[test]
fn test_synthetic_run_fits_both_models() {
    let dir = tempfile::tempdir().unwrap();
    let config = synthetic_config(dir.path());
    let report = Pipeline::new(config.clone()).run().unwrap();

    assert_eq!(report.inputs.len(), 4);
    assert!(report.inputs.iter().all(|f| f.sha256.len() == 64));
    assert!(report.normalization.housing_dropped >= 5);
    assert!(report.unmatched_sales > 0);
    assert_eq!(report.models.len(), 2);

    for model in &report.models {
        let est = &model.estimates;
        assert!(est.observations > est.parameters, "{}: n={} p={}", est.model, est.observations, est.parameters);
        assert!(est.r_squared > 0.0 && est.r_squared < 1.0);
        assert_eq!(model.filter_stages.len(), 9);
        assert_eq!(model.filter_stages.last().unwrap().after, est.observations + est.dropped_rows);

        let grouped: usize = est.group_effects.iter().map(|g| g.observations).sum();
        assert!(grouped > 0 && grouped < est.observations);

        for g in &est.group_effects {
            let ci = g.effect.ci;
            assert!(((ci.upper - g.effect.estimate) - (g.effect.estimate - ci.lower)).abs() < 1e-9);
            assert!(g.effect.std_error > 0.0);
        }
    }

    let inside = report.model("inside").unwrap();
    assert_eq!(inside.estimates.contrasts.len(), 1);
    assert!(inside.estimates.group(CohortGroup::Outside).is_none());

    let full = report.model("full").unwrap();
    assert_eq!(full.estimates.contrasts.len(), 3);
    let post = full.estimates.group(CohortGroup::Post).unwrap();
    assert!(post.effect.estimate > 0.0, "planted premium not recovered: {:?}", post.effect);
    assert!(post.effect.percent > 0.0);
}

#[test]
fn test_synthetic_run_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = synthetic_config(dir.path());

    let first = Pipeline::new(config.clone()).run().unwrap();
    let second = Pipeline::new(config).run().unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.inputs, second.inputs);
    assert_eq!(first.models, second.models);
    assert_eq!(first.matched_sales, second.matched_sales);
}

#[test]
fn test_report_written_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let config = synthetic_config(dir.path());
    let report = Pipeline::new(config.clone()).run().unwrap();

    let path = report.persist_to_json(&config.output.report_dir).unwrap();
    let loaded = AnalysisReport::load_json(&path).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.models.len(), report.models.len());
    assert_eq!(loaded.models[0].estimates.observations, report.models[0].estimates.observations);
}

#[test]
fn test_toml_config_drives_models() {
    let dir = tempfile::tempdir().unwrap();
    let generated = synthetic_config(dir.path());

    let config_path = dir.path().join("analysis.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[inputs]
property_details = "{}"
lihtc = "{}"
sales = "{}"
barnes = "{}"

[[models]]
name = "year_only"
grouping = "full"
reference = "outside_mid"
fixed_effects = ["sale_year"]
contrasts = [{{ minuend = "post", subtrahend = "pre" }}]
"#,
        generated.inputs.property_details.display(),
        generated.inputs.lihtc.display(),
        generated.inputs.sales.display(),
        generated.inputs.barnes.display(),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let report = Pipeline::new(config).run().unwrap();
    assert_eq!(report.models.len(), 1);
    let est = &report.models[0].estimates;
    assert_eq!(est.model, "year_only");
    assert_eq!(est.reference, CohortGroup::OutsideMid);
    assert!(est.group(CohortGroup::OutsidePre).is_some());
    assert_eq!(est.dropped_rows, 0);
}
