#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::io::Write;

fn write_yaml(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create");
    file.write_all(contents.as_bytes()).expect("write");
    path
}

#[test]
fn single_file_compiles_every_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
passwd:
  regex: 'root:x:0:0'
users:
  regex: 'user:(?P<name>\w+)'
  field_list: [name]
"#,
    );
    let compiled = load_library(&root, None).expect("load");
    assert_eq!(compiled.len(), 2);
    assert_eq!(compiled[0].config.name, "passwd");
    assert_eq!(compiled[1].config.name, "users");
    assert!(compiled[1].config.only_matching || compiled[1].config.effective_only_matching());
}

#[test]
fn global_merges_into_sections_but_not_across_includes() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_yaml(
        dir.path(),
        "child.yaml",
        r#"
child_search:
  regex: 'x'
"#,
    );
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
global:
  max_results: 7
  unique: true
local_search:
  regex: 'y'
include_child:
  files: [child.yaml]
"#,
    );
    let compiled = load_library(&root, None).expect("load");
    let local = compiled.iter().find(|c| c.config.name == "local_search").expect("local");
    assert_eq!(local.config.max_results, 7);
    assert!(local.config.unique);

    let child = compiled.iter().find(|c| c.config.name == "child_search").expect("child");
    assert_eq!(
        child.config.max_results, -1,
        "root's global block must not apply inside an included file"
    );
    assert!(!child.config.unique);
}

#[test]
fn sheet_names_are_deduped_across_the_whole_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_yaml(
        dir.path(),
        "child.yaml",
        r#"
other_search:
  regex: 'z'
  excel_sheet_name: shared
"#,
    );
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
one:
  regex: 'a'
  excel_sheet_name: shared
include_child:
  files: [child.yaml]
"#,
    );
    let compiled = load_library(&root, None).expect("load");
    let names: Vec<&str> = compiled.iter().map(|c| c.config.excel_sheet_name.as_str()).collect();
    assert_eq!(names, vec!["shared", "shared_2"]);
}

#[test]
fn cyclic_includes_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_yaml(
        dir.path(),
        "a.yaml",
        r#"
include_b:
  files: [b.yaml]
"#,
    );
    let root = write_yaml(
        dir.path(),
        "b.yaml",
        r#"
include_a:
  files: [a.yaml]
"#,
    );
    let err = load_library(&root, None).expect_err("cycle must be rejected");
    assert!(matches!(err, AuditError::Config { .. }));
}

#[test]
fn unknown_section_key_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
bad:
  regex: 'a'
  not_a_real_option: true
"#,
    );
    assert!(load_library(&root, None).is_err());
}

#[test]
fn field_list_entry_without_matching_capture_group_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
bad:
  regex: 'no groups here'
  field_list: [missing]
"#,
    );
    assert!(load_library(&root, None).is_err());
}

#[test]
fn sys_filter_legacy_spelling_and_in_comparator_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = write_yaml(
        dir.path(),
        "root.yaml",
        r#"
windows_search:
  regex: 'a'
  sys_filter:
    - attr: osFamily
      comp: in
      value: [Windows, Linux]
"#,
    );
    let compiled = load_library(&root, None).expect("load");
    let search = &compiled[0];
    assert_eq!(search.config.sys_filter.len(), 1);
    assert_eq!(search.config.sys_filter[0].attr, audit_common::SysFilterAttr::OsFamily);
}
