use std::path::Path;

#[test]
fn every_demo_mapping_matches_its_case() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join("mappings");
    let cases = dm_tool::discover_cases(&root).expect("demo cases should exist");

    let failures = cases
        .iter()
        .filter_map(|case_dir| {
            dm_tool::assert_case(case_dir)
                .err()
                .map(|error| format!("{}: {}", case_dir.display(), error))
        })
        .collect::<Vec<_>>();
    assert!(failures.is_empty(), "failing cases:\n{}", failures.join("\n"));
}
