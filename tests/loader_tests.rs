use rustle_later::loader::{
    load_file, parse, strip_comments_and_markers, LoaderError, Node, StripOptions, YamlLoader,
};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_vault_and_unsafe_tags_load_as_strings() {
    let node = parse(
        "password: !vault |\n  $ANSIBLE_VAULT;1.1;AES256\n  6162\ncmd: !unsafe '{{ raw }}'\n",
        "vars.yml",
    )
    .unwrap();
    let mapping = node.as_mapping().unwrap();

    assert!(mapping.get_str("password").unwrap().starts_with("$ANSIBLE_VAULT"));
    assert_eq!(mapping.get_str("cmd"), Some("{{ raw }}"));
}

#[test]
fn test_unknown_local_tag_is_syntax_error() {
    match parse("value: !custom x\n", "vars.yml").unwrap_err() {
        LoaderError::Syntax { reason, line, .. } => {
            assert!(reason.contains("could not determine a constructor for the tag"));
            assert_eq!(line, 1);
        }
        other => panic!("Expected syntax error, got {:?}", other),
    }
}

#[test]
fn test_custom_tag_handler_option() {
    fn upper(value: &str) -> Node {
        Node::string(value.to_uppercase())
    }
    let loader = YamlLoader::new().with_tag("shout", upper);
    let node = loader.parse("a: !shout hi\n", "x.yml".as_ref()).unwrap();

    assert_eq!(node.as_mapping().unwrap().get_str("a"), Some("HI"));
}

#[test]
fn test_load_file_records_origin() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("site.yml");
    fs::write(&path, "- hosts: all\n\n- hosts: db\n").unwrap();

    let node = load_file(&path).unwrap();
    let plays = node.as_sequence().unwrap();

    assert_eq!(node.origin(), Some(path.as_path()));
    assert_eq!(plays[0].as_mapping().unwrap().line(), Some(1));
    assert_eq!(plays[1].as_mapping().unwrap().line(), Some(3));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_file("/nonexistent/site.yml").unwrap_err();
    assert!(matches!(err, LoaderError::Io { .. }));
    assert_eq!(err.file(), std::path::Path::new("/nonexistent/site.yml"));
}

#[test]
fn test_strip_comments_and_markers() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tasks.yml");
    fs::write(&path, "---\n# comment\n- ping:\n\n  # indented\n- debug: msg=x\n").unwrap();

    let kept = strip_comments_and_markers(
        &path,
        StripOptions {
            remove_markers: true,
            remove_empty: true,
        },
    )
    .unwrap();

    assert_eq!(
        kept,
        vec![
            (3, "- ping:\n".to_string()),
            (6, "- debug: msg=x\n".to_string()),
        ]
    );

    let kept = strip_comments_and_markers(&path, StripOptions::default()).unwrap();
    let numbers: Vec<usize> = kept.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, vec![1, 3, 4, 6]);
}
