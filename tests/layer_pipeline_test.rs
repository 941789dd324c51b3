//! Library-level workflows: reference data in, layers and tables out.

use navlayer::{
    Catalog, CountingPolicy, EngineConfig, LayerMode, LayerSynthesizer, NameLookup, Pipeline, Sheet,
    SourceIndex, Synthesis, TacticAnnotator, Warning, Workbook,
};

const CATALOG: &str = r#"{
    "name": "enterprise",
    "domain": "enterprise-attack",
    "techniques": [
        {"techniqueID": "T1059", "tactic": "execution", "color": "", "enabled": true},
        {"techniqueID": "T1566", "tactic": "initial-access", "color": "", "enabled": true}
    ]
}"#;

fn catalog() -> Catalog {
    Catalog::load(CATALOG).unwrap()
}

fn scenario_workbook() -> Workbook {
    Workbook::new(vec![
        Sheet::from_strings("Sheet1", vec![vec!["T1059", "report1"], vec!["T1059", "report2"]]),
        Sheet::from_strings("Sheet2", vec![vec!["T1566", "phish"]]),
    ])
}

#[test]
fn test_clubbed_two_sheets() {
    let catalog = catalog();
    let doc = LayerSynthesizer::new(&catalog).clubbed(&SourceIndex::build(&scenario_workbook()));

    let t1059 = doc.technique("T1059").unwrap();
    assert_eq!(t1059.score, Some(2));
    assert_eq!(t1059.comment.as_deref(), Some("Sheet1: report1\nSheet1: report2"));
    let t1566 = doc.technique("T1566").unwrap();
    assert_eq!(t1566.score, Some(1));
    assert_eq!(t1566.comment.as_deref(), Some("Sheet2: phish"));
}

#[test]
fn test_no_match_gives_degenerate_gradient() {
    let catalog = catalog();
    let wb = Workbook::new(vec![Sheet::from_strings("S", vec![vec!["T4242", "x"]])]);
    let doc = LayerSynthesizer::new(&catalog).clubbed(&SourceIndex::build(&wb));

    let json: serde_json::Value = serde_json::from_str(&doc.to_pretty_json().unwrap()).unwrap();
    assert_eq!(json["techniques"], serde_json::json!([]));
    assert_eq!(
        json["gradient"],
        serde_json::json!({"colors": ["#8ec843"], "minValue": 1, "maxValue": 1})
    );
}

#[test]
fn test_single_column_sheet_skipped() {
    let catalog = catalog();
    let wb = Workbook::new(vec![
        Sheet::from_strings("OnlyIds", vec![vec!["T1059"], vec!["T1566"]]),
        Sheet::from_strings("Sheet2", vec![vec!["T1566", "phish"]]),
    ]);
    let index = SourceIndex::build(&wb);
    let doc = LayerSynthesizer::new(&catalog).clubbed(&index);

    assert_eq!(doc.techniques.len(), 1);
    assert_eq!(
        index.warnings(),
        &[Warning::SheetStructure { sheet: "OnlyIds".to_string(), columns: 1 }]
    );
}

#[test]
fn test_annotator_name_and_tactic() {
    let catalog = catalog();
    let names = NameLookup::parse("T1059: PowerShell\n");
    let annotator = TacticAnnotator::new(&names, &catalog);

    let rows = annotator.annotate(&[vec![Some("T1059".to_string()), Some("report".to_string())]]);
    assert_eq!(rows[0].technique_name, "PowerShell");
    assert_eq!(rows[0].tactic_label, "Execution");
}

#[test]
fn test_lowercase_ids_match_catalog() {
    let catalog = catalog();
    let wb = Workbook::new(vec![Sheet::from_strings("S", vec![vec!["t1059", "x"]])]);
    let doc = LayerSynthesizer::new(&catalog).clubbed(&SourceIndex::build(&wb));
    assert_eq!(doc.techniques.len(), 1);
    assert_eq!(doc.techniques[0].technique_id, "T1059");
}

#[test]
fn test_annotated_sheet_reindexes_to_same_counts() {
    let catalog = catalog();
    let names = NameLookup::parse("T1059: PowerShell\nT1566: Phishing\n");
    let config = EngineConfig::default();
    let pipeline = Pipeline::new(&config, &catalog, &names);

    let annotated = pipeline.annotate(&scenario_workbook());
    let before = SourceIndex::build(&scenario_workbook());
    let after = SourceIndex::build(&annotated);
    assert_eq!(before.entries(), after.entries());
}

#[test]
fn test_run_pins_summary_first() {
    let catalog = catalog();
    let names = NameLookup::parse("T1059: PowerShell\nT1566: Phishing\n");
    let config = EngineConfig::default();
    let output = Pipeline::new(&config, &catalog, &names).run(&scenario_workbook()).unwrap();

    assert_eq!(output.annotated.sheet_names(), vec!["Summary", "Sheet1", "Sheet2"]);
    let summary = output.summary.unwrap();
    // one observing sheet each; ties keep encounter order
    assert_eq!(summary[0].technique_id, "T1059");
    assert_eq!(summary[0].frequency, 1);
    assert_eq!(summary[0].actors_joined(), "Sheet1");
    assert!(matches!(output.layers, Synthesis::Clubbed(_)));
}

#[test]
fn test_consolidated_layers_count_sheets() {
    let catalog = catalog();
    let names = NameLookup::default();
    let mut config = EngineConfig::default();
    config.counting.clubbed = CountingPolicy::Consolidated;

    let staged = Pipeline::new(&config, &catalog, &names)
        .layers(&scenario_workbook(), LayerMode::Clubbed)
        .unwrap();
    let Synthesis::Clubbed(doc) = staged.output else {
        panic!("expected a clubbed layer");
    };
    assert_eq!(doc.technique("T1059").unwrap().score, Some(1));
    assert_eq!(
        doc.technique("T1059").unwrap().comment.as_deref(),
        Some("Sheet1: report1, report2")
    );
}
