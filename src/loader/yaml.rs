//! Line-annotating YAML loader
//!
//! Builds a [`Node`] tree from `yaml-rust2` parser events. Every mapping is
//! stamped with the line the reader had reached when the mapping started,
//! which is what the rule engine reports back to users. For a block mapping
//! under a key that is the key's line.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::error::LoaderError;
use super::node::{Mapping, Node, SourceLocation};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

static INT_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?(0|[1-9][0-9_]*)$").unwrap());
static INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0x[0-9a-fA-F_]+$").unwrap());
static INT_OCTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0o?[0-7_]+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?([0-9][0-9_]*)?\.[0-9_]*([eE][-+][0-9]+)?$").unwrap()
});

/// Converts the text of a custom-tagged scalar into a node.
pub type TagHandler = fn(&str) -> Node;

fn plain_scalar(value: &str) -> Node {
    Node::String(value.to_string())
}

/// Table of local (`!name`) tags the loader accepts.
///
/// `!unsafe` and `!vault` are registered by default; both carry no meaning
/// for structural analysis and load as their underlying string.
#[derive(Clone)]
pub struct TagHandlers {
    handlers: HashMap<String, TagHandler>,
}

impl TagHandlers {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, handler: TagHandler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<TagHandler> {
        self.handlers.get(name).copied()
    }
}

impl Default for TagHandlers {
    fn default() -> Self {
        let mut handlers = Self::empty();
        handlers.register("unsafe", plain_scalar);
        handlers.register("vault", plain_scalar);
        handlers
    }
}

/// YAML loader producing location-annotated trees.
#[derive(Clone, Default)]
pub struct YamlLoader {
    tags: TagHandlers,
}

impl YamlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: TagHandlers) -> Self {
        Self { tags }
    }

    pub fn with_tag(mut self, name: impl Into<String>, handler: TagHandler) -> Self {
        self.tags.register(name, handler);
        self
    }

    /// Parses a single YAML document. An empty document yields an empty
    /// sequence.
    pub fn parse(&self, text: &str, filename: &Path) -> Result<Node, LoaderError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut builder = TreeBuilder::new(filename, &self.tags, text);
        let mut parser = Parser::new_from_str(text);

        parser
            .load(&mut builder, true)
            .map_err(|e| syntax_error(filename, e.marker(), e.info().to_string()))?;

        builder.finish()
    }

    pub fn load_file(&self, path: &Path) -> Result<Node, LoaderError> {
        debug!("Loading YAML from {}", path.display());
        let text = fs::read_to_string(path).map_err(|error| LoaderError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        self.parse(&text, path)
    }
}

/// Parses `text` with the default tag table.
pub fn parse(text: &str, filename: impl AsRef<Path>) -> Result<Node, LoaderError> {
    YamlLoader::new().parse(text, filename.as_ref())
}

/// Reads and parses `path` with the default tag table.
pub fn load_file(path: impl AsRef<Path>) -> Result<Node, LoaderError> {
    YamlLoader::new().load_file(path.as_ref())
}

fn syntax_error(file: &Path, mark: &Marker, reason: String) -> LoaderError {
    LoaderError::Syntax {
        file: file.to_path_buf(),
        line: mark.line(),
        column: mark.col() + 1,
        reason,
    }
}

/// Line-indexed view of the source, used to place mappings the way the
/// framework's composer does: at the reader position when the node starts,
/// which for flow collections lies past the scanner's simple-key lookahead.
struct SourceLines {
    lines: Vec<Vec<char>>,
    breaks: usize,
}

impl SourceLines {
    fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(|line| line.chars().collect()).collect(),
            breaks: text.matches('\n').count(),
        }
    }

    fn char_at(&self, mark: &Marker) -> Option<char> {
        self.lines
            .get(mark.line().checked_sub(1)?)?
            .get(mark.col())
            .copied()
    }

    fn starts_flow(&self, mark: &Marker) -> bool {
        matches!(self.char_at(mark), Some('{' | '['))
    }

    fn is_document_marker(&self, mark: &Marker) -> bool {
        mark.col() == 0
            && mark
                .line()
                .checked_sub(1)
                .and_then(|index| self.lines.get(index))
                .is_some_and(|line| line.starts_with(&['-', '-', '-']))
    }

    /// One-based line of the first token at or after `(line, col)`, where
    /// `line` is zero-based. Past the last token this is the line after the
    /// final line break.
    fn next_token_line(&self, mut line: usize, mut col: usize) -> usize {
        while let Some(chars) = self.lines.get(line) {
            while col < chars.len() {
                match chars[col] {
                    ' ' | '\t' | '\r' => col += 1,
                    '#' => break,
                    _ => return line + 1,
                }
            }
            line += 1;
            col = 0;
        }
        self.breaks + 1
    }

    /// Where the scanner stops after reading ahead from the flow collection
    /// opening at `mark`: the first token after its closing bracket, or the
    /// first token on the next line when the collection spans lines.
    fn flow_end_line(&self, mark: &Marker) -> usize {
        let line = mark.line().saturating_sub(1);
        let Some(chars) = self.lines.get(line) else {
            return self.breaks + 1;
        };

        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut col = mark.col();
        while col < chars.len() {
            let c = chars[col];
            match quote {
                Some('\'') if c == '\'' => {
                    if chars.get(col + 1) == Some(&'\'') {
                        col += 1;
                    } else {
                        quote = None;
                    }
                }
                Some('"') if c == '\\' => col += 1,
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '#' if col > 0 && chars[col - 1].is_whitespace() => break,
                    '{' | '[' => depth += 1,
                    '}' | ']' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return self.next_token_line(line, col + 1);
                        }
                    }
                    _ => {}
                },
            }
            col += 1;
        }

        self.next_token_line(line + 1, 0)
    }
}

fn is_core_tag(tag: &Tag) -> bool {
    tag.handle == "!!" || tag.handle == CORE_TAG_PREFIX
}

fn is_local_tag(tag: &Tag) -> bool {
    tag.handle == "!"
}

/// Resolves an untagged plain scalar using YAML 1.1 implicit typing.
pub(crate) fn resolve_plain(value: &str) -> Node {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => return Node::Null,
        "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            return Node::Bool(true)
        }
        "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => {
            return Node::Bool(false)
        }
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Node::Float(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return Node::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Node::Float(f64::NAN),
        _ => {}
    }

    if let Some(int) = parse_int(value) {
        return Node::Int(int);
    }

    if FLOAT.is_match(value) && value.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(float) = value.replace('_', "").parse::<f64>() {
            return Node::Float(float);
        }
    }

    Node::String(value.to_string())
}

fn parse_int(value: &str) -> Option<i64> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let digits = digits.replace('_', "");

    let magnitude = if INT_DECIMAL.is_match(value) {
        digits.parse::<i64>().ok()?
    } else if INT_HEX.is_match(value) {
        i64::from_str_radix(&digits[2..], 16).ok()?
    } else if INT_OCTAL.is_match(value) {
        let octal = digits.strip_prefix("0o").unwrap_or(&digits[1..]);
        if octal.is_empty() {
            0
        } else {
            i64::from_str_radix(octal, 8).ok()?
        }
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

const MERGE_KEY: &str = "<<";

/// Merges a `<<` value into `mapping`. Keys already present win, and among
/// a list of sources the earlier ones win.
fn merge_into(mapping: &mut Mapping, node: Node) {
    let sources = match node {
        Node::Mapping(source) => vec![source],
        Node::Sequence(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Node::Mapping(source) => Some(source),
                _ => None,
            })
            .collect(),
        other => {
            mapping.insert(MERGE_KEY, other);
            return;
        }
    };

    for source in sources {
        for (key, value) in source {
            if !mapping.contains_key(&key) {
                mapping.insert(key, value);
            }
        }
    }
}

enum Frame {
    Sequence {
        items: Vec<Node>,
        anchor: usize,
        flow: bool,
    },
    Mapping {
        mapping: Mapping,
        pending_key: Option<String>,
        key_line: usize,
        anchor: usize,
        flow: bool,
    },
}

struct TreeBuilder<'a> {
    filename: PathBuf,
    tags: &'a TagHandlers,
    source: SourceLines,
    stack: Vec<Frame>,
    /// Line of the explicit `---` that opened the document.
    document_line: Option<usize>,
    /// Open flow collections, and the lookahead line of the outermost one.
    flow_depth: usize,
    flow_line: usize,
    last_line: usize,
    anchors: HashMap<usize, Node>,
    root: Option<Node>,
    documents: usize,
    error: Option<LoaderError>,
}

impl<'a> TreeBuilder<'a> {
    fn new(filename: &Path, tags: &'a TagHandlers, text: &str) -> Self {
        Self {
            filename: filename.to_path_buf(),
            tags,
            source: SourceLines::new(text),
            stack: Vec::new(),
            document_line: None,
            flow_depth: 0,
            flow_line: 0,
            last_line: 0,
            anchors: HashMap::new(),
            root: None,
            documents: 0,
            error: None,
        }
    }

    fn finish(self) -> Result<Node, LoaderError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(match self.root {
            None | Some(Node::Null) => Node::Sequence(Vec::new()),
            Some(node) => node,
        })
    }

    fn fail(&mut self, mark: &Marker, reason: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(syntax_error(&self.filename, mark, reason.into()));
        }
    }

    fn expecting_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Mapping {
                pending_key: None,
                ..
            })
        )
    }

    fn scalar(&self, value: String, style: TScalarStyle, tag: Option<Tag>) -> Result<Node, String> {
        let Some(tag) = tag else {
            if style != TScalarStyle::Plain || self.expecting_key() {
                return Ok(Node::String(value));
            }
            return Ok(resolve_plain(&value));
        };

        if is_local_tag(&tag) {
            return match self.tags.get(&tag.suffix) {
                Some(handler) => Ok(handler(&value)),
                None => Err(format!(
                    "could not determine a constructor for the tag '!{}'",
                    tag.suffix
                )),
            };
        }

        if !is_core_tag(&tag) {
            return Err(format!(
                "could not determine a constructor for the tag '{}{}'",
                tag.handle, tag.suffix
            ));
        }

        match tag.suffix.as_str() {
            "null" => Ok(Node::Null),
            "bool" => match resolve_plain(&value) {
                node @ Node::Bool(_) => Ok(node),
                _ => Err(format!("invalid boolean value '{value}'")),
            },
            "int" => parse_int(&value)
                .map(Node::Int)
                .ok_or_else(|| format!("invalid integer value '{value}'")),
            "float" => match resolve_plain(&value) {
                Node::Float(f) => Ok(Node::Float(f)),
                Node::Int(i) => Ok(Node::Float(i as f64)),
                _ => Err(format!("invalid float value '{value}'")),
            },
            _ => Ok(Node::String(value)),
        }
    }

    fn check_collection_tag(&mut self, tag: &Option<Tag>, mark: &Marker) -> bool {
        match tag {
            Some(tag) if !is_core_tag(tag) => {
                let name = if is_local_tag(tag) {
                    format!("!{}", tag.suffix)
                } else {
                    format!("{}{}", tag.handle, tag.suffix)
                };
                self.fail(
                    mark,
                    format!("could not determine a constructor for the tag '{name}'"),
                );
                false
            }
            _ => true,
        }
    }

    fn push(&mut self, node: Node, anchor: usize) {
        if anchor != 0 {
            self.anchors.insert(anchor, node.clone());
        }

        let line = self.last_line;
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                mapping,
                pending_key,
                key_line,
                ..
            }) => match pending_key.take() {
                Some(key) if key == MERGE_KEY => merge_into(mapping, node),
                Some(key) => {
                    mapping.insert(key, node);
                }
                None => {
                    *pending_key = Some(node.to_string());
                    *key_line = line;
                }
            },
        }
    }

    /// Opens a collection at `mark`. Returns whether it is a flow
    /// collection and the line a mapping starting here is recorded on.
    fn open_collection(&mut self, mark: &Marker) -> (bool, usize) {
        if self.flow_depth > 0 {
            self.flow_depth += 1;
            return (true, self.flow_line);
        }

        let flow = self.source.starts_flow(mark);
        if flow {
            self.flow_depth = 1;
            self.flow_line = self.source.flow_end_line(mark);
        }

        let line = match (self.stack.last(), self.document_line) {
            (
                Some(Frame::Mapping {
                    pending_key: Some(_),
                    key_line,
                    ..
                }),
                _,
            ) => *key_line,
            (None, Some(line)) => line,
            _ if flow => self.flow_line,
            _ => mark.line(),
        };
        (flow, line)
    }

    fn close_collection(&mut self, flow: bool) {
        if flow {
            self.flow_depth = self.flow_depth.saturating_sub(1);
        }
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }

        self.last_line = mark.line();
        match event {
            Event::DocumentStart { .. } => {
                self.documents += 1;
                if self.documents > 1 {
                    self.fail(&mark, "expected a single document in the stream");
                }
                self.document_line = self
                    .source
                    .is_document_marker(&mark)
                    .then(|| mark.line());
            }
            Event::Scalar(value, style, anchor, tag) => match self.scalar(value, style, tag) {
                Ok(node) => self.push(node, anchor),
                Err(reason) => self.fail(&mark, reason),
            },
            Event::SequenceStart(anchor, tag) => {
                if self.check_collection_tag(&tag, &mark) {
                    let (flow, _) = self.open_collection(&mark);
                    self.stack.push(Frame::Sequence {
                        items: Vec::new(),
                        anchor,
                        flow,
                    });
                }
            }
            Event::MappingStart(anchor, tag) => {
                if self.check_collection_tag(&tag, &mark) {
                    let (flow, line) = self.open_collection(&mark);
                    let location = SourceLocation::new(self.filename.clone(), line);
                    self.stack.push(Frame::Mapping {
                        mapping: Mapping::located(location),
                        pending_key: None,
                        key_line: line,
                        anchor,
                        flow,
                    });
                }
            }
            Event::SequenceEnd => match self.stack.pop() {
                Some(Frame::Sequence {
                    items,
                    anchor,
                    flow,
                }) => {
                    self.close_collection(flow);
                    self.push(Node::Sequence(items), anchor)
                }
                _ => self.fail(&mark, "unbalanced sequence end"),
            },
            Event::MappingEnd => match self.stack.pop() {
                Some(Frame::Mapping {
                    mapping,
                    pending_key: None,
                    anchor,
                    flow,
                    ..
                }) => {
                    self.close_collection(flow);
                    self.push(Node::Mapping(mapping), anchor)
                }
                _ => self.fail(&mark, "unbalanced mapping end"),
            },
            Event::Alias(id) => match self.anchors.get(&id).cloned() {
                Some(node) => self.push(node, 0),
                None => self.fail(&mark, "found undefined alias"),
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> Node {
        parse(text, "test.yml").unwrap()
    }

    #[test]
    fn test_mapping_line_is_first_content_line() {
        let node = parse_str("---\n# comment\n- name: first\n  debug: msg=a\n\n- name: second\n  debug: msg=b\n");
        let tasks = node.as_sequence().unwrap();

        assert_eq!(tasks[0].as_mapping().unwrap().line(), Some(3));
        assert_eq!(tasks[1].as_mapping().unwrap().line(), Some(6));
    }

    #[test]
    fn test_nested_mapping_lines() {
        let node = parse_str("- hosts: all\n  tasks:\n    - name: inner\n      copy:\n        src: a\n");
        let play = node.as_sequence().unwrap()[0].as_mapping().unwrap();
        let task = play.get("tasks").unwrap().as_sequence().unwrap()[0]
            .as_mapping()
            .unwrap();
        let args = task.get("copy").unwrap().as_mapping().unwrap();

        assert_eq!(play.line(), Some(1));
        assert_eq!(task.line(), Some(3));
        assert_eq!(args.line(), Some(4));
        assert_eq!(args.location().unwrap().file, PathBuf::from("test.yml"));
    }

    fn mapping_lines(node: &Node, lines: &mut Vec<usize>) {
        match node {
            Node::Mapping(mapping) => {
                lines.push(mapping.line().unwrap());
                for (_, value) in mapping.iter() {
                    mapping_lines(value, lines);
                }
            }
            Node::Sequence(items) => items.iter().for_each(|item| mapping_lines(item, lines)),
            _ => {}
        }
    }

    #[test]
    fn test_mapping_lines_by_position() {
        let cases: &[(&str, &[usize])] = &[
            ("a: 1\nb:\n  c: 2\n", &[1, 2]),
            ("key:\n  # comment\n  sub: 1\n", &[1, 1]),
            ("- {name: a, debug: {msg: x}}\n", &[2, 2]),
            ("- {name: a, debug: {msg: x}}", &[1, 1]),
            ("- {a: 1}\n\n# c\n- {b: 2}\n", &[4, 5]),
            ("---\na: 1\nb:\n  c: 2\n", &[1, 3]),
            ("- name: x\n  copy: {src: a}\n- name: y\n", &[1, 2, 3]),
            (
                "- hosts: all\n  vars:\n    x: 1\n  tasks:\n    - name: t\n      args:\n\n        chdir: /tmp\n",
                &[1, 2, 5, 6],
            ),
            ("- [{a: 1}, {b: \"}\"}]\n- ok: 1\n", &[2, 2, 2]),
        ];

        for (text, expected) in cases {
            let mut lines = Vec::new();
            mapping_lines(&parse_str(text), &mut lines);
            assert_eq!(lines, expected.to_vec(), "lines for {text:?}");
        }
    }

    #[test]
    fn test_merge_key_entries_merged() {
        let node = parse_str("copy: {<<: {src: a, mode: '0644'}, dest: b}\n");
        let args = node.as_mapping().unwrap().get("copy").unwrap().as_mapping().unwrap();

        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["src", "mode", "dest"]);
    }

    #[test]
    fn test_merge_key_keeps_explicit_values() {
        let node = parse_str(
            "base: &b\n  src: a\n  mode: '0644'\nextra: &e {owner: root, mode: '0700'}\ncopy:\n  mode: '0600'\n  <<: [*b, *e]\n  dest: c\n",
        );
        let args = node.as_mapping().unwrap().get("copy").unwrap().as_mapping().unwrap();

        assert_eq!(args.get_str("mode"), Some("0600"));
        assert_eq!(args.get_str("src"), Some("a"));
        assert_eq!(args.get_str("owner"), Some("root"));
        assert_eq!(args.get_str("dest"), Some("c"));
        assert!(!args.contains_key("<<"));
    }

    #[test]
    fn test_custom_tags_load_as_strings() {
        let node = parse_str("a: !unsafe '{{ x }}'\nb: !vault |\n  $ANSIBLE_VAULT;1.1;AES256\n  6162\n");
        let mapping = node.as_mapping().unwrap();

        assert_eq!(mapping.get_str("a"), Some("{{ x }}"));
        assert!(mapping.get_str("b").unwrap().starts_with("$ANSIBLE_VAULT"));
    }

    #[test]
    fn test_unknown_tag_is_syntax_error() {
        let err = parse("a: !custom value\n", "bad.yml").unwrap_err();
        match err {
            LoaderError::Syntax { file, line, reason, .. } => {
                assert_eq!(file, PathBuf::from("bad.yml"));
                assert_eq!(line, 1);
                assert!(reason.contains("!custom"));
            }
            other => panic!("Expected Syntax error, got: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_syntax_error() {
        let result = parse("a: [1, 2\nb: c\n", "broken.yml");
        assert!(matches!(result, Err(LoaderError::Syntax { .. })));
    }

    #[test]
    fn test_empty_document_is_empty_sequence() {
        assert_eq!(parse_str(""), Node::Sequence(vec![]));
        assert_eq!(parse_str("---\n"), Node::Sequence(vec![]));
    }

    #[test]
    fn test_multiple_documents_rejected() {
        let result = parse("a: 1\n---\nb: 2\n", "multi.yml");
        assert!(matches!(result, Err(LoaderError::Syntax { .. })));
    }

    #[test]
    fn test_plain_scalar_typing() {
        let node = parse_str("a: yes\nb: 42\nc: 1.5\nd: ~\ne: '42'\nf: 0x1f\ng: hello\n");
        let m = node.as_mapping().unwrap();

        assert_eq!(m.get("a"), Some(&Node::Bool(true)));
        assert_eq!(m.get("b"), Some(&Node::Int(42)));
        assert_eq!(m.get("c"), Some(&Node::Float(1.5)));
        assert_eq!(m.get("d"), Some(&Node::Null));
        assert_eq!(m.get("e"), Some(&Node::from("42")));
        assert_eq!(m.get("f"), Some(&Node::Int(31)));
        assert_eq!(m.get("g"), Some(&Node::from("hello")));
    }

    #[test]
    fn test_keys_are_not_implicitly_typed() {
        let node = parse_str("on: push\n1: one\n");
        let m = node.as_mapping().unwrap();

        assert_eq!(m.get_str("on"), Some("push"));
        assert_eq!(m.get_str("1"), Some("one"));
    }

    #[test]
    fn test_alias_resolves_to_anchored_node() {
        let node = parse_str("base: &b\n  x: 1\ncopy: *b\n");
        let m = node.as_mapping().unwrap();

        assert_eq!(m.get("copy"), m.get("base"));
    }
}
