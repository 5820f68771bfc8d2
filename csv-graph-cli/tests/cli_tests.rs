use std::path::Path;
use std::process::{Command, Output};
use std::sync::Once;
use tracing::{error, info};

static INIT: Once = Once::new();

const MANIFEST: &str = "../test-data/manifest.jsonld";

/// Initialize logging exactly once for all tests
fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

fn csv_graph(args: &[&str]) -> Result<Output, Box<dyn std::error::Error>> {
    let output = Command::new(env!("CARGO_BIN_EXE_csv-graph"))
        .args(args)
        .output()?;

    if !output.status.success() {
        error!("Command failed with status: {}", output.status);
        error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        error!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    } else {
        info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    }
    Ok(output)
}

fn process_into(output_dir: &Path) -> Result<Output, Box<dyn std::error::Error>> {
    let output_dir = output_dir.to_string_lossy();
    csv_graph(&["process", "--manifest", MANIFEST, "--strict", "--output", &output_dir])
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[test]
fn test_process() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting CLI process test");
    let output_dir = tempfile::tempdir()?;
    assert!(process_into(output_dir.path())?.status.success());

    let vocabulary = read_json(&output_dir.path().join("vocabulary.jsonld"))?;
    assert_eq!(vocabulary["ledger"], "example/semiconductor");
    let classes = vocabulary["insert"]["f:classes"].as_array().unwrap();
    assert!(classes
        .iter()
        .any(|class| class["@id"] == "https://example.com/semiconductor/model/DRAM"));

    let instances = read_json(&output_dir.path().join("instances.jsonld"))?;
    let entities = instances["insert"].as_array().unwrap();
    assert_eq!(entities.len(), 10);
    assert!(entities
        .iter()
        .any(|entity| entity["@id"] == "https://example.com/semiconductor/data/material/M1"));
    Ok(())
}

#[test]
fn test_process_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    assert!(process_into(first.path())?.status.success());
    assert!(process_into(second.path())?.status.success());

    for file in ["vocabulary.jsonld", "instances.jsonld"] {
        let expected = std::fs::read_to_string(first.path().join(file))?;
        let actual = std::fs::read_to_string(second.path().join(file))?;
        if expected != actual {
            error!("{} differs between runs", file);
        }
        assert_eq!(expected, actual);
    }
    Ok(())
}

#[test]
fn test_validate() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    assert!(csv_graph(&["validate", "--manifest", MANIFEST, "--strict"])?
        .status
        .success());
    assert!(!csv_graph(&["validate", "--manifest", "../test-data/missing.jsonld"])?
        .status
        .success());
    Ok(())
}

#[test]
fn test_generated_manifest_validates() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let dir = tempfile::tempdir()?;
    for template in ["basic", "full"] {
        let path = dir.path().join(format!("{}.jsonc", template));
        let path = path.to_string_lossy();
        assert!(csv_graph(&["generate-manifest", "--type", template, "--output", &path])?
            .status
            .success());
        assert!(csv_graph(&["validate", "--manifest", &path])?.status.success());
    }

    assert!(!csv_graph(&["generate-manifest", "--type", "everything"])?
        .status
        .success());
    Ok(())
}

#[test]
fn test_skipped_row_is_logged_once() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("model"))?;
    std::fs::create_dir_all(dir.path().join("instances"))?;
    std::fs::write(
        dir.path().join("model/Vocabulary.csv"),
        "Class ID,Class Name,Property ID,Property Name,Type\n\
         Material,Material,Material Number,Material Number,@id\n",
    )?;
    std::fs::write(
        dir.path().join("instances/Material.csv"),
        b"Material Number\nM1\nM\xff2\nM3\n",
    )?;
    let manifest = dir.path().join("manifest.jsonld");
    std::fs::write(
        &manifest,
        r#"{
            "@type": "CSVImportManifest",
            "name": "materials",
            "model": {
                "baseIRI": "https://example.com/model/",
                "path": "model",
                "sequence": [{ "path": "Vocabulary.csv", "@type": ["BasicVocabularyStep"] }]
            },
            "instances": {
                "baseIRI": "https://example.com/data/",
                "path": "instances",
                "sequence": [{ "path": "Material.csv", "@type": ["BasicInstanceStep"], "instanceType": "Material" }]
            }
        }"#,
    )?;

    let manifest = manifest.to_string_lossy();
    let output = csv_graph(&["process", "--manifest", &manifest, "--skip-malformed-rows"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Skipping malformed row").count(), 1);

    let instances = read_json(&dir.path().join("instances.jsonld"))?;
    assert_eq!(instances["insert"].as_array().unwrap().len(), 2);
    Ok(())
}
