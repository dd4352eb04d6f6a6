use kc2spicedb::generator::relationships::format_relationships;
use kc2spicedb::output::formatter::{self, Artifacts, OutputError};
use kc2spicedb::output::report::build_report;
use kc2spicedb::{TranslateOptions, Translation, Translator};

mod support;

fn translate_fixture(fixture: &str, strict: bool) -> Translation {
    let options = TranslateOptions {
        enhance: false,
        strict,
    };
    Translator::new()
        .translate(&support::read_fixture_realm(fixture), &options)
        .expect("fixture should translate")
}

const ALL: Artifacts = Artifacts {
    report: true,
    relationships: true,
};

#[test]
fn formatter_writes_schema_and_requested_companions() {
    let translation = translate_fixture("acme", true);
    let out_dir = support::unique_temp_dir("kc2spicedb_formatter");
    let schema_path = out_dir.join("acme.zed");

    let written = formatter::write_output(&schema_path, &translation, ALL).unwrap();
    assert_eq!(
        written,
        vec![
            schema_path.clone(),
            out_dir.join("acme_report.md"),
            out_dir.join("acme_relationships.txt"),
        ]
    );

    assert_eq!(
        std::fs::read_to_string(&schema_path).unwrap(),
        translation.schema
    );
    assert_eq!(
        std::fs::read_to_string(out_dir.join("acme_relationships.txt")).unwrap(),
        format_relationships(&translation.relationships),
        "relationships file should match format_relationships exactly"
    );
    assert_eq!(
        std::fs::read_to_string(out_dir.join("acme_report.md")).unwrap(),
        build_report(&translation)
    );
}

#[test]
fn formatter_writes_only_the_schema_by_default() {
    let translation = translate_fixture("acme", true);
    let out_dir = support::unique_temp_dir("kc2spicedb_formatter_default");

    let written =
        formatter::write_output(&out_dir.join("acme.zed"), &translation, Artifacts::default())
            .unwrap();
    assert_eq!(written.len(), 1);

    let entries: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("acme.zed")]);
}

#[test]
fn formatter_creates_missing_directories_and_replaces_existing_files() {
    let translation = translate_fixture("acme", true);
    let out_dir = support::unique_temp_dir("kc2spicedb_formatter_nested").join("a/b");
    let schema_path = out_dir.join("acme.zed");

    formatter::write_output(&schema_path, &translation, Artifacts::default()).unwrap();
    formatter::write_atomic(&schema_path, "stale").unwrap();
    formatter::write_output(&schema_path, &translation, Artifacts::default()).unwrap();

    assert_eq!(
        std::fs::read_to_string(&schema_path).unwrap(),
        translation.schema
    );
    let leftovers = std::fs::read_dir(&out_dir).unwrap().count();
    assert_eq!(leftovers, 1, "temporary files must not be left behind");
}

#[test]
fn formatter_rejects_blank_names() {
    let translation = translate_fixture("acme", true);
    let out_dir = support::unique_temp_dir("kc2spicedb_formatter_name");

    let err = formatter::write_output(&out_dir.join(" .zed"), &translation, ALL)
        .expect_err("blank stem");
    assert!(matches!(err, OutputError::InvalidName { .. }), "got {err}");
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[test]
fn report_summarizes_a_clean_translation() {
    let report = build_report(&translate_fixture("acme", true));
    let expected = "\
# kc2spicedb Translation Report

Realm: `acme`
Schema source: deterministic translation

## Summary

| Item | Count |
|------|-------|
| Realm roles | 3 |
| Client roles | 0 |
| Composite roles | 1 |
| Groups | 2 |
| Schema definitions | 6 |
| Structural relationships | 5 |

## Warnings

None.
";
    assert_eq!(report, expected);
}

#[test]
fn report_lists_warnings_in_order() {
    let report = build_report(&translate_fixture("dangling_member", false));

    assert!(!report.contains("None."));
    let dropped: Vec<&str> = report
        .lines()
        .filter(|line| line.starts_with("- **[dropped reference]**"))
        .collect();
    assert_eq!(dropped.len(), 2, "report:\n{report}");
    assert!(dropped[0].contains("undefined role \"ghost\""));
    assert!(dropped[1].contains("undefined role \"phantom\""));
}
