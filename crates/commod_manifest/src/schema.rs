//! Typed schema validation for untrusted mod manifests.
//!
//! Manifests come from hand-edited YAML files, so a bad one must never abort
//! loading of the others. Validation therefore never fails with an error: it
//! produces a [`ValidationReport`] listing every problem found, and emits each
//! one as a `debug` trace event on the way.
//!
//! Two field flavours exist. Unconstrained fields only check the value type
//! against an allowed set. Constrained fields (the `patcher_options` tables)
//! additionally check numeric values against an inclusive range.

use crate::archive::ArchiveListing;
use camino::Utf8Path;
use serde_yaml::{Mapping, Value};
use std::fmt;

/// The YAML value types a schema field can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
    List,
    Map,
}

impl ValueKind {
    /// Whether `value` is an instance of this kind.
    ///
    /// Integers and floats are distinct: `-9` is not a valid float field.
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Str, Value::String(_)) => true,
            (ValueKind::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ValueKind::Float, Value::Number(n)) => n.is_f64(),
            (ValueKind::Bool, Value::Bool(_)) => true,
            (ValueKind::List, Value::Sequence(_)) => true,
            (ValueKind::Map, Value::Mapping(_)) => true,
            _ => false,
        }
    }
}

/// A single field in a map schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kinds: &'static [ValueKind],
    pub required: bool,
    /// Inclusive numeric range; only checked for numeric values.
    pub range: Option<(f64, f64)>,
}

const STR: &[ValueKind] = &[ValueKind::Str];
const LIST: &[ValueKind] = &[ValueKind::List];
const MAP: &[ValueKind] = &[ValueKind::Map];
/// Booleans may also be written as the strings `"true"` / `"false"`.
const BOOL_LIKE: &[ValueKind] = &[ValueKind::Bool, ValueKind::Str];

/// Top-level manifest fields.
pub const TOP_LEVEL_SCHEMA: &[FieldSchema] = &[
    FieldSchema { name: "name", kinds: STR, required: true, range: None },
    FieldSchema { name: "display_name", kinds: STR, required: true, range: None },
    FieldSchema {
        name: "version",
        kinds: &[ValueKind::Str, ValueKind::Int, ValueKind::Float],
        required: true,
        range: None,
    },
    FieldSchema { name: "build", kinds: STR, required: true, range: None },
    FieldSchema { name: "description", kinds: STR, required: true, range: None },
    FieldSchema { name: "authors", kinds: STR, required: true, range: None },
    FieldSchema { name: "prerequisites", kinds: LIST, required: true, range: None },
    FieldSchema { name: "incompatible", kinds: LIST, required: false, range: None },
    FieldSchema { name: "patcher_version_requirement", kinds: STR, required: true, range: None },
    FieldSchema { name: "release_date", kinds: STR, required: false, range: None },
    FieldSchema { name: "language", kinds: STR, required: false, range: None },
    FieldSchema { name: "link", kinds: STR, required: false, range: None },
    FieldSchema { name: "installment", kinds: STR, required: false, range: None },
    FieldSchema { name: "safe_reinstall_options", kinds: &[ValueKind::Bool], required: false, range: None },
    FieldSchema { name: "patcher_options", kinds: MAP, required: false, range: None },
    FieldSchema { name: "optional_content", kinds: LIST, required: false, range: None },
    FieldSchema { name: "no_base_content", kinds: BOOL_LIKE, required: false, range: None },
];

/// Engine parameters a mod may tune, with their allowed ranges.
pub const PATCHER_OPTIONS_SCHEMA: &[FieldSchema] = &[
    FieldSchema {
        name: "gravity",
        kinds: &[ValueKind::Float],
        required: false,
        range: Some((-100.0, -1.0)),
    },
    FieldSchema {
        name: "skins_in_shop",
        kinds: &[ValueKind::Int],
        required: false,
        range: Some((8.0, 32.0)),
    },
    FieldSchema { name: "blast_damage_friendly_fire", kinds: BOOL_LIKE, required: false, range: None },
];

/// Entries of `optional_content`.
pub const OPTIONAL_CONTENT_SCHEMA: &[FieldSchema] = &[
    FieldSchema { name: "name", kinds: STR, required: true, range: None },
    FieldSchema { name: "display_name", kinds: STR, required: true, range: None },
    FieldSchema { name: "description", kinds: STR, required: true, range: None },
    FieldSchema { name: "default_option", kinds: STR, required: false, range: None },
    FieldSchema { name: "install_settings", kinds: LIST, required: false, range: None },
    FieldSchema { name: "patcher_options", kinds: MAP, required: false, range: None },
    FieldSchema { name: "no_base_content", kinds: BOOL_LIKE, required: false, range: None },
];

/// Entries of an option's `install_settings`.
pub const INSTALL_SETTING_SCHEMA: &[FieldSchema] = &[
    FieldSchema { name: "name", kinds: STR, required: true, range: None },
    FieldSchema { name: "description", kinds: STR, required: true, range: None },
];

/// Entries of `prerequisites` and `incompatible`.
pub const REQUIREMENT_SCHEMA: &[FieldSchema] = &[
    FieldSchema { name: "name", kinds: STR, required: true, range: None },
    FieldSchema { name: "versions", kinds: LIST, required: false, range: None },
    FieldSchema { name: "optional_content", kinds: LIST, required: false, range: None },
];

/// One failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Where in the manifest the problem is, e.g. `optional_content[1]`.
    pub scope: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

/// Outcome of validating one manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn fail(&mut self, scope: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            scope: scope.to_string(),
            message: message.into(),
        };
        tracing::debug!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Where to look for the payload folders a manifest declares.
#[derive(Debug, Clone, Copy)]
pub enum DataCheck<'a> {
    /// Don't check payload presence (e.g. manifests read before extraction).
    Skip,
    /// Check against a mod root directory on disk.
    Directory(&'a Utf8Path),
    /// Check against the entries of an archive.
    Archive(&'a ArchiveListing),
}

impl DataCheck<'_> {
    fn has_dir(&self, parts: &[&str]) -> bool {
        match self {
            DataCheck::Skip => true,
            DataCheck::Directory(root) => parts
                .iter()
                .fold(root.to_path_buf(), |path, part| path.join(part))
                .is_dir(),
            DataCheck::Archive(listing) => listing.has_dir(&parts.join("/")),
        }
    }
}

/// Parses the string spellings accepted for boolean fields.
pub(crate) fn parse_bool_like(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "map",
        Value::Tagged(_) => "tagged",
    }
}

/// Validates `map` against `schema`, recording every failing field.
///
/// `null` values count as absent. Returns whether all fields passed.
pub fn validate_fields(
    map: &Mapping,
    schema: &[FieldSchema],
    scope: &str,
    report: &mut ValidationReport,
) -> bool {
    let mut valid = true;

    for field in schema {
        let Some(value) = map.get(field.name).filter(|v| !v.is_null()) else {
            if field.required {
                report.fail(
                    scope,
                    format!("key '{}' is required but couldn't be found", field.name),
                );
                valid = false;
            }
            continue;
        };

        if !field.kinds.iter().any(|kind| kind.matches(value)) {
            report.fail(
                scope,
                format!(
                    "key '{}' is of invalid type '{}', expected {:?}",
                    field.name,
                    kind_name(value),
                    field.kinds
                ),
            );
            valid = false;
            continue;
        }

        if field.kinds == BOOL_LIKE {
            if let Some(s) = value.as_str() {
                if parse_bool_like(s).is_none() {
                    report.fail(
                        scope,
                        format!("key '{}' must be 'true' or 'false', found '{}'", field.name, s),
                    );
                    valid = false;
                    continue;
                }
            }
        }

        if let (Some((min, max)), Some(number)) = (field.range, value.as_f64()) {
            if !(min..=max).contains(&number) {
                report.fail(
                    scope,
                    format!(
                        "key '{}' is not in supported range '{}-{}'",
                        field.name, min, max
                    ),
                );
                valid = false;
            }
        }
    }

    valid
}

/// Validates every map element of `list`; other elements are skipped.
pub fn validate_list(
    list: &[Value],
    schema: &[FieldSchema],
    scope: &str,
    report: &mut ValidationReport,
) -> bool {
    tracing::debug!("Validating list '{}' of length {}", scope, list.len());
    let mut valid = true;
    for (index, element) in list.iter().enumerate() {
        if let Some(map) = element.as_mapping() {
            valid &= validate_fields(map, schema, &format!("{scope}[{index}]"), report);
        }
    }
    valid
}

/// Validates an untyped manifest.
///
/// Checks the top-level fields first; nested tables and payload folders are
/// only examined once the top level is sound.
pub fn validate_manifest(value: &Value, data: DataCheck<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(manifest) = value.as_mapping() else {
        report.fail("manifest", "couldn't be read as a map");
        return report;
    };

    if !validate_fields(manifest, TOP_LEVEL_SCHEMA, "manifest", &mut report) {
        return report;
    }

    let display_name = manifest
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    tracing::debug!("Initial mod '{}' validation result: true", display_name);

    if let Some(Value::Mapping(options)) = manifest.get("patcher_options") {
        validate_fields(options, PATCHER_OPTIONS_SCHEMA, "patcher_options", &mut report);
    }

    for key in ["prerequisites", "incompatible"] {
        if let Some(Value::Sequence(list)) = manifest.get(key) {
            validate_list(list, REQUIREMENT_SCHEMA, key, &mut report);
        }
    }

    let options: &[Value] = match manifest.get("optional_content") {
        Some(Value::Sequence(list)) => list,
        _ => &[],
    };
    if validate_list(options, OPTIONAL_CONTENT_SCHEMA, "optional_content", &mut report) {
        for option in options.iter().filter_map(Value::as_mapping) {
            validate_option_details(option, &mut report);
        }
    }

    validate_data_presence(manifest, options, data, &mut report);

    tracing::debug!(
        "Mod '{}' validation result: {}",
        display_name,
        report.is_valid()
    );
    report
}

fn validate_option_details(option: &Mapping, report: &mut ValidationReport) {
    let name = option.get("name").and_then(Value::as_str).unwrap_or_default();
    let scope = format!("optional_content '{name}'");

    if let Some(Value::Sequence(settings)) = option.get("install_settings") {
        if settings.len() < 2 {
            report.fail(&scope, "install_settings must offer more than one setting");
        }
        validate_list(
            settings,
            INSTALL_SETTING_SCHEMA,
            &format!("{scope}.install_settings"),
            report,
        );

        if let Some(default) = option.get("default_option").and_then(Value::as_str) {
            let known = settings
                .iter()
                .filter_map(|s| s.get("name").and_then(Value::as_str))
                .any(|setting| setting == default);
            if !known {
                report.fail(
                    &scope,
                    format!("default_option '{default}' doesn't name one of its install_settings"),
                );
            }
        }
    }

    if let Some(Value::Mapping(patcher_options)) = option.get("patcher_options") {
        validate_fields(
            patcher_options,
            PATCHER_OPTIONS_SCHEMA,
            &format!("{scope}.patcher_options"),
            report,
        );
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => parse_bool_like(s).unwrap_or(false),
        _ => false,
    }
}

fn validate_data_presence(
    manifest: &Mapping,
    options: &[Value],
    data: DataCheck<'_>,
    report: &mut ValidationReport,
) {
    if matches!(data, DataCheck::Skip) {
        return;
    }

    let no_base_content = manifest.get("no_base_content").is_some_and(is_truthy);
    if !no_base_content && !data.has_dir(&["data"]) {
        report.fail("data", "mod data folder is missing");
    }

    for option in options.iter().filter_map(Value::as_mapping) {
        let Some(name) = option.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !data.has_dir(&[name]) {
            report.fail("data", format!("folder for optional content '{name}' is missing"));
        }

        if let Some(Value::Sequence(settings)) = option.get("install_settings") {
            for setting in settings.iter().filter_map(|s| s.get("name").and_then(Value::as_str)) {
                if !data.has_dir(&[name, setting]) {
                    report.fail(
                        "data",
                        format!("folder for setting '{setting}' of '{name}' is missing"),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    const MINIMAL: &str = r#"
name: sample_mod
display_name: Sample Mod
version: 1.2
build: "abcdef0123"
description: A sample
authors: Someone
prerequisites:
  - name: community_patch
    versions: ["1.14"]
patcher_version_requirement: "1.10"
"#;

    #[test]
    fn test_minimal_manifest_is_valid() {
        let report = validate_manifest(&yaml(MINIMAL), DataCheck::Skip);
        assert!(report.is_valid(), "{:?}", report.diagnostics());
    }

    #[test]
    fn test_not_a_map() {
        let report = validate_manifest(&yaml("- just\n- a list"), DataCheck::Skip);
        assert!(!report.is_valid());
        assert_eq!(report.diagnostics()[0].scope, "manifest");
    }

    #[test]
    fn test_missing_required_field() {
        let source = MINIMAL.replace("authors: Someone\n", "");
        let report = validate_manifest(&yaml(&source), DataCheck::Skip);
        assert!(!report.is_valid());
        assert!(report.diagnostics()[0].message.contains("'authors'"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let source = MINIMAL.replace("authors: Someone", "authors: ~");
        assert!(!validate_manifest(&yaml(&source), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_wrong_type() {
        let source = MINIMAL.replace("build: \"abcdef0123\"", "build: [1, 2]");
        let report = validate_manifest(&yaml(&source), DataCheck::Skip);
        assert!(report.diagnostics()[0].message.contains("invalid type 'list'"));
    }

    #[test]
    fn test_patcher_options_ranges() {
        let ok = format!("{MINIMAL}patcher_options:\n  gravity: -9.8\n  skins_in_shop: 16\n");
        assert!(validate_manifest(&yaml(&ok), DataCheck::Skip).is_valid());

        let too_light = format!("{MINIMAL}patcher_options:\n  gravity: -0.5\n");
        assert!(!validate_manifest(&yaml(&too_light), DataCheck::Skip).is_valid());

        let int_gravity = format!("{MINIMAL}patcher_options:\n  gravity: -9\n");
        assert!(!validate_manifest(&yaml(&int_gravity), DataCheck::Skip).is_valid());

        let bounds = format!("{MINIMAL}patcher_options:\n  skins_in_shop: 32\n");
        assert!(validate_manifest(&yaml(&bounds), DataCheck::Skip).is_valid());

        let too_many = format!("{MINIMAL}patcher_options:\n  skins_in_shop: 33\n");
        assert!(!validate_manifest(&yaml(&too_many), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_bool_like_strings() {
        let ok = format!("{MINIMAL}no_base_content: \"True\"\n");
        assert!(validate_manifest(&yaml(&ok), DataCheck::Skip).is_valid());

        let bad = format!("{MINIMAL}no_base_content: maybe\n");
        assert!(!validate_manifest(&yaml(&bad), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_stray_list_entries_are_skipped() {
        let source = format!(
            "{MINIMAL}optional_content:\n  - just a string\n  - name: opt\n    display_name: Opt\n    description: d\n"
        );
        assert!(validate_manifest(&yaml(&source), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_single_install_setting_rejected() {
        let source = format!(
            "{MINIMAL}optional_content:
  - name: opt
    display_name: Opt
    description: d
    install_settings:
      - name: only
        description: the only one
"
        );
        let report = validate_manifest(&yaml(&source), DataCheck::Skip);
        assert!(!report.is_valid());
        assert!(report.diagnostics()[0].message.contains("more than one"));
    }

    #[test]
    fn test_default_option_must_name_a_setting() {
        let source = format!(
            "{MINIMAL}optional_content:
  - name: opt
    display_name: Opt
    description: d
    default_option: c
    install_settings:
      - name: a
        description: A
      - name: b
        description: B
"
        );
        assert!(!validate_manifest(&yaml(&source), DataCheck::Skip).is_valid());
        let fixed = source.replace("default_option: c", "default_option: b");
        assert!(validate_manifest(&yaml(&fixed), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_requirement_entries_need_names() {
        let source = MINIMAL.replace("  - name: community_patch", "  - title: community_patch");
        assert!(!validate_manifest(&yaml(&source), DataCheck::Skip).is_valid());
    }

    #[test]
    fn test_data_presence_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = format!(
            "{MINIMAL}optional_content:
  - name: opt
    display_name: Opt
    description: d
    install_settings:
      - name: a
        description: A
      - name: b
        description: B
"
        );
        let value = yaml(&source);

        let report = validate_manifest(&value, DataCheck::Directory(&root));
        assert_eq!(report.diagnostics().len(), 4);

        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::create_dir_all(root.join("opt").join("a")).unwrap();
        std::fs::create_dir_all(root.join("opt").join("b")).unwrap();
        assert!(validate_manifest(&value, DataCheck::Directory(&root)).is_valid());
    }

    #[test]
    fn test_no_base_content_skips_data_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = format!("{MINIMAL}no_base_content: true\n");
        assert!(validate_manifest(&yaml(&source), DataCheck::Directory(&root)).is_valid());
    }

    #[test]
    fn test_data_presence_in_archive() {
        let listing = ArchiveListing::new(
            ["my_mod/manifest.yaml", "my_mod/data/", "my_mod/data/file.txt"],
            "my_mod",
        );
        assert!(validate_manifest(&yaml(MINIMAL), DataCheck::Archive(&listing)).is_valid());

        let empty = ArchiveListing::new(["my_mod/manifest.yaml"], "my_mod");
        assert!(!validate_manifest(&yaml(MINIMAL), DataCheck::Archive(&empty)).is_valid());
    }
}
