// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_minimal_workflow() {
    let yaml = r#"
name: nightly
jobs:
  extract:
    command: python3
    args: ["extract.py"]
"#;
    let (name, jobs) = parse_yaml(yaml).unwrap();
    assert_eq!(name.as_deref(), Some("nightly"));
    assert_eq!(jobs.len(), 1);
    let extract = &jobs["extract"];
    assert_eq!(extract.command, "python3");
    assert_eq!(extract.args, vec!["extract.py"]);
    assert!(extract.requires.is_none());
}

#[test]
fn parse_direct_requires() {
    let yaml = r#"
jobs:
  a:
    command: /bin/true
  b:
    command: /bin/true
    requires:
      a: COMPLETED
"#;
    let (_, jobs) = parse_yaml(yaml).unwrap();
    match jobs["b"].requires.as_ref().unwrap() {
        DependencySpec::Direct(deps) => {
            assert_eq!(deps.get("a"), Some(&JobStatus::Completed));
        }
        other => panic!("expected direct form, got {:?}", other),
    }
}

#[test]
fn parse_expression_requires() {
    let yaml = r#"
jobs:
  a:
    command: /bin/true
  b:
    command: /bin/true
    requires: "a=COMPLETED OR a=STOPPED"
"#;
    let (_, jobs) = parse_yaml(yaml).unwrap();
    assert!(matches!(
        jobs["b"].requires,
        Some(DependencySpec::Expression(_))
    ));
}

#[test]
fn direct_requires_status_is_case_insensitive() {
    let yaml = r#"
jobs:
  a:
    command: /bin/true
  b:
    command: /bin/true
    requires:
      a: completed
"#;
    let (_, jobs) = parse_yaml(yaml).unwrap();
    match jobs["b"].requires.as_ref().unwrap() {
        DependencySpec::Direct(deps) => assert_eq!(deps.get("a"), Some(&JobStatus::Completed)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn bad_status_in_requires() {
    let yaml = r#"
jobs:
  b:
    command: /bin/true
    requires:
      a: GREAT
"#;
    assert!(matches!(
        parse_yaml(yaml),
        Err(WorkflowError::InvalidStatus { .. })
    ));
}

#[test]
fn resources_and_uploads() {
    let yaml = r#"
jobs:
  train:
    command: python3
    resources:
      max_cpu_percent: 400
      max_memory_bytes: 2147483648
      gpu_indices: [0, 1]
    uploads:
      - path: train.py
        content: "print('hi')"
        mode: 0o755
"#;
    // serde_yaml has no octal literals; use decimal in real files.
    let yaml = yaml.replace("0o755", "493");
    let (_, jobs) = parse_yaml(&yaml).unwrap();
    let train = &jobs["train"];
    assert_eq!(train.limits.max_cpu_percent, 400);
    assert_eq!(train.limits.gpu_indices, Some(vec![0, 1]));
    assert_eq!(train.uploads[0].mode, 0o755);
    assert_eq!(train.uploads[0].content, b"print('hi')");
}

#[test]
fn empty_jobs_rejected() {
    assert!(matches!(parse_yaml("jobs: {}"), Err(WorkflowError::Empty)));
}

#[test]
fn declaration_order_preserved() {
    let yaml = r#"
jobs:
  c: { command: /bin/true }
  a: { command: /bin/true }
  b: { command: /bin/true }
"#;
    let (_, jobs) = parse_yaml(yaml).unwrap();
    let names: Vec<_> = jobs.keys().cloned().collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}
