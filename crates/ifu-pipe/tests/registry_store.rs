use std::fs;
use std::path::PathBuf;

use ifu_core::errors::IfuError;
use ifu_pipe::{ArtifactRegistry, RegistryStore, RAW_CUBE_KEY};
use proptest::prelude::*;
use tempfile::tempdir;

#[test]
fn seeding_requires_the_raw_cube() {
    let dir = tempdir().expect("tmp dir");
    let store = RegistryStore::for_target(dir.path(), "ngc");
    let err = store
        .load_or_seed(&dir.path().join("absent.cube"))
        .expect_err("missing input");
    assert!(matches!(err, IfuError::MissingInputFile(_)));
    assert_eq!(err.info().code, "raw-cube-missing");
    assert!(!store.exists());
}

#[test]
fn fresh_registry_holds_only_the_raw_cube_and_is_reloaded() {
    let dir = tempdir().expect("tmp dir");
    let raw = dir.path().join("raw.cube");
    fs::write(&raw, b"placeholder").expect("raw");
    let store = RegistryStore::for_target(dir.path(), "ngc");
    assert_eq!(store.path(), dir.path().join("ngc_artifacts.json"));

    let seeded = store.load_or_seed(&raw).expect("seed");
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded.get(RAW_CUBE_KEY).expect("raw key"), raw.as_path());

    let mut updated = seeded.clone();
    updated.put("snr_maps", dir.path().join("maps.cube"));
    store.save(&updated).expect("save");
    // A second call must load, not reseed.
    assert_eq!(store.load_or_seed(&raw).expect("load"), updated);
}

#[test]
fn missing_key_is_a_missing_artifact_error() {
    let registry = ArtifactRegistry::new();
    let err = registry.get("lowess_cube").expect_err("absent");
    assert!(matches!(err, IfuError::MissingArtifact(_)));
    assert_eq!(err.info().context.get("key").map(String::as_str), Some("lowess_cube"));
}

#[test]
fn persisted_json_is_sorted_and_newline_terminated() {
    let dir = tempdir().expect("tmp dir");
    let store = RegistryStore::for_target(dir.path(), "ngc");
    let registry: ArtifactRegistry = vec![
        ("zeta".to_string(), PathBuf::from("/z")),
        ("alpha".to_string(), PathBuf::from("/a")),
    ]
    .into_iter()
    .collect();
    store.save(&registry).expect("save");
    let text = fs::read_to_string(store.path()).expect("read");
    assert!(text.ends_with('\n'));
    assert!(text.find("alpha").expect("alpha") < text.find("zeta").expect("zeta"));
}

proptest! {
    #[test]
    fn registry_survives_save_and_load(
        entries in proptest::collection::btree_map("[a-z_]{1,12}", "[a-z0-9_/.]{1,24}", 0..12)
    ) {
        let dir = tempdir().expect("tmp dir");
        let store = RegistryStore::for_target(dir.path(), "target");
        let registry: ArtifactRegistry = entries
            .into_iter()
            .map(|(key, path)| (key, PathBuf::from(path)))
            .collect();
        store.save(&registry).expect("save");
        prop_assert_eq!(store.load().expect("load"), registry);
    }
}
