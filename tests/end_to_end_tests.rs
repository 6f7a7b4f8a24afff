use rustle_later::collector::ActionCollector;
use rustle_later::config::Config;
use rustle_later::loader::{parse, Node};
use rustle_later::tasks::{extract_actions, normalize_task};
use rustle_later::types::{ArtifactKind, ArtifactRef, SemanticKind};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn collector() -> ActionCollector {
    let mut config = Config::default();
    config.ansible.roles_path.clear();
    ActionCollector::new(config).unwrap()
}

#[test]
fn test_debug_shorthand_normalizes() {
    let content = parse("- debug: msg=hello\n", "tasks/main.yml").unwrap();
    let file = ArtifactRef::new("tasks/main.yml", ArtifactKind::Tasks);

    let raw = extract_actions(&content, &file).unwrap();
    assert_eq!(raw.len(), 1);

    let action = normalize_task::<&str>(raw.into_iter().next().unwrap(), &file.path, &[]).unwrap();
    assert_eq!(action.module, "debug");
    assert_eq!(action.arguments.len(), 1);
    assert_eq!(action.arguments.get("msg"), Some(&Node::from("hello")));
    assert_eq!(action.kind, SemanticKind::Task);
}

#[test]
fn test_block_and_rescue_become_two_meta_actions() {
    let content = parse(
        "- name: guarded\n  block:\n    - command: /bin/false\n  rescue:\n    - debug: msg=recovered\n",
        "tasks/main.yml",
    )
    .unwrap();
    let file = ArtifactRef::new("tasks/main.yml", ArtifactKind::Tasks);

    let actions: Vec<_> = extract_actions(&content, &file)
        .unwrap()
        .into_iter()
        .map(|raw| normalize_task::<&str>(raw, &file.path, &[]).unwrap())
        .collect();

    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a.kind == SemanticKind::Meta));
    assert_eq!(actions[0].module, "command");
    assert_eq!(actions[0].raw_arguments, vec!["/bin/false"]);
    assert_eq!(actions[1].module, "debug");
    let meta = actions[1].block_meta.as_ref().unwrap();
    assert_eq!(meta.get_str("name"), Some("guarded"));
    assert!(!meta.contains_key("rescue"));
}

#[test]
fn test_line_numbers_preserved_through_full_pass() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(
        root,
        "roles/web/tasks/main.yml",
        "---\n# install\n- name: install\n  apt: name=nginx\n\n- block:\n    - name: configure\n      template: src=a dest=b\n",
    );
    write(
        root,
        "roles/web/handlers/main.yml",
        "- name: restart\n  service:\n    name: nginx\n    state: restarted\n",
    );
    let site = write(
        root,
        "site.yml",
        "- hosts: web\n  pre_tasks:\n    - ping:\n  roles:\n    - web\n",
    );

    let report = collector().collect(&ArtifactRef::playbook(&site));
    assert!(report.is_clean(), "{:?}", report.errors);

    let located: Vec<(PathBuf, usize, &str, SemanticKind)> = report
        .actions
        .iter()
        .map(|a| {
            (
                a.filename.strip_prefix(root).unwrap().to_path_buf(),
                a.line().unwrap(),
                a.module.as_str(),
                a.kind,
            )
        })
        .collect();

    assert_eq!(
        located,
        vec![
            (PathBuf::from("site.yml"), 3, "ping", SemanticKind::Task),
            (PathBuf::from("roles/web/tasks/main.yml"), 3, "apt", SemanticKind::Task),
            (PathBuf::from("roles/web/tasks/main.yml"), 7, "template", SemanticKind::Meta),
            (PathBuf::from("roles/web/handlers/main.yml"), 1, "service", SemanticKind::Handler),
        ]
    );
    assert!(report
        .actions
        .iter()
        .all(|a| a.location.as_ref().unwrap().file == a.filename));
}

#[test]
fn test_templated_include_skipped_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let site = write(
        root,
        "site.yml",
        "- hosts: all\n  tasks:\n    - include_tasks: \"{{ distro }}.yml\"\n    - ping:\n",
    );

    let report = collector().collect(&ArtifactRef::playbook(&site));

    assert!(report.is_clean(), "{:?}", report.errors);
    assert!(report.edges.is_empty());
    assert_eq!(report.actions.len(), 1);
}

#[test]
fn test_template_vars_from_config_resolve_includes() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "debian.yml", "- apt: name=curl\n");
    let site = write(
        root,
        "site.yml",
        "- hosts: all\n  tasks:\n    - include_tasks: \"{{ distro }}.yml\"\n",
    );

    let mut config = Config::from_yaml("ansible:\n  template_vars:\n    distro: debian\n").unwrap();
    config.ansible.roles_path.clear();
    let report = ActionCollector::new(config)
        .unwrap()
        .collect(&ArtifactRef::playbook(&site));

    assert_eq!(report.edges.len(), 1);
    assert_eq!(report.edges[0].path, root.join("debian.yml"));
    assert_eq!(report.actions[0].module, "apt");
}

#[test]
fn test_role_entry_collects_role_actions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "roles/web/tasks/main.yml", "- name: hello\n  debug: msg=hi\n");

    let report = collector().collect(&ArtifactRef::role(root.join("roles/web")));

    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.actions.len(), 1);
    assert_eq!(report.actions[0].describe(), "hello");
}
