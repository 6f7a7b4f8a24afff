//! Module-argument grammar: works out which module a task calls
//!
//! A task can name its module as a key (`copy: src=a dest=b`), through
//! `action:` or `local_action:` (`action: copy src=a dest=b`), or through the
//! mapping form of those (`action: {module: copy, src: a}`). The grammar
//! classifies a task into one [`ActionForm`] first and only then reads its
//! arguments, so callers never see the shape differences.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;

use super::error::GrammarError;
use super::keywords::{
    is_freeform, is_fully_qualified, is_known_module, is_task_keyword, takes_raw_params,
    BUILTIN_TASKS,
};
use super::splitter::{parse_kv, split_module_string};
use crate::loader::{Mapping, Node};
use crate::resolver::ModuleSearchPath;
use crate::template::is_template;

/// Module names the grammar accepts as action keys without further lookup.
#[derive(Debug, Clone)]
pub struct BuiltinModules {
    names: BTreeSet<String>,
    library: BTreeSet<String>,
}

impl BuiltinModules {
    /// Framework builtins plus the given custom module names.
    pub fn new<S: AsRef<str>>(custom_modules: &[S]) -> Self {
        let names = BUILTIN_TASKS
            .iter()
            .map(|s| s.to_string())
            .chain(custom_modules.iter().map(|s| s.as_ref().to_string()))
            .collect();
        Self {
            names,
            library: BTreeSet::new(),
        }
    }

    /// Adds the modules found in registered library directories.
    pub fn with_search_path(mut self, search_path: &ModuleSearchPath) -> Self {
        self.library.extend(search_path.module_names().map(str::to_string));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether `name` can be used as a task's action key.
    pub fn resolves(&self, name: &str) -> bool {
        self.names.contains(name)
            || self.library.contains(name)
            || is_fully_qualified(name)
            || is_known_module(name)
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

/// Result of resolving a task's action declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArgs {
    pub module: String,
    pub arguments: IndexMap<String, Node>,
    pub delegate_to: Option<String>,
}

/// Splits a task mapping into module, arguments and delegation target.
pub trait ModuleArgsGrammar {
    fn parse(&self, task: &Mapping, builtins: &BuiltinModules) -> Result<ParsedArgs, GrammarError>;
}

/// The syntactic shape a task used to name its action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionForm<'a> {
    Action(&'a Node),
    LocalAction(&'a Node),
    Module { name: &'a str, value: &'a Node },
}

impl ActionForm<'_> {
    fn label(&self) -> String {
        match self {
            ActionForm::Action(value) | ActionForm::LocalAction(value) => {
                old_style_module_name(value).unwrap_or_else(|| "action".to_string())
            }
            ActionForm::Module { name, .. } => name.to_string(),
        }
    }
}

fn old_style_module_name(value: &Node) -> Option<String> {
    let text = match value {
        Node::String(s) => s.as_str(),
        Node::Mapping(m) => m.get_str("module")?,
        _ => return None,
    };
    let (module, _) = split_module_string(text);
    (!module.is_empty()).then_some(module)
}

/// The host framework's own task grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsibleModuleArgs;

impl AnsibleModuleArgs {
    pub fn new() -> Self {
        Self
    }

    /// Finds the single action declaration of a task.
    pub fn classify<'a>(
        &self,
        task: &'a Mapping,
        builtins: &BuiltinModules,
    ) -> Result<ActionForm<'a>, GrammarError> {
        let mut form = task.get("action").map(ActionForm::Action);

        if let Some(value) = task.get("local_action") {
            if form.is_some() {
                return Err(GrammarError::ExclusiveActionKeys);
            }
            form = Some(ActionForm::LocalAction(value));
        }

        let mut unresolved = Vec::new();
        for (key, value) in task.iter() {
            if is_task_keyword(key) {
                continue;
            }
            if !builtins.resolves(key) {
                unresolved.push((key, value));
                continue;
            }
            if let Some(existing) = &form {
                return Err(GrammarError::ConflictingActions {
                    first: existing.label(),
                    second: key.to_string(),
                });
            }
            form = Some(ActionForm::Module { name: key, value });
        }

        // a lone unknown key names the module
        match (form, unresolved.as_slice()) {
            (Some(form), _) => Ok(form),
            (None, &[(name, value)]) => {
                debug!("Treating unknown key '{}' as the task's module", name);
                Ok(ActionForm::Module { name, value })
            }
            (None, &[(module, _), ..]) => Err(GrammarError::UnresolvedModule {
                module: module.to_string(),
            }),
            (None, []) => Err(GrammarError::NoAction),
        }
    }

    fn module_key_args(
        &self,
        module: &str,
        value: &Node,
    ) -> Result<IndexMap<String, Node>, GrammarError> {
        match value {
            Node::Mapping(m) => Ok(m.entries().clone()),
            Node::String(s) => Ok(parse_kv(s, is_freeform(module))),
            Node::Null => Ok(IndexMap::new()),
            other => Err(GrammarError::UnexpectedType {
                found: type_name(other).to_string(),
            }),
        }
    }

    fn action_key_args(
        &self,
        value: &Node,
    ) -> Result<(String, IndexMap<String, Node>), GrammarError> {
        let (module, args) = match value {
            Node::Mapping(m) => {
                let Some(spec) = m.get_str("module") else {
                    return Err(GrammarError::NoAction);
                };
                let (module, rest) = split_module_string(spec);
                let mut args = m.entries().clone();
                args.shift_remove("module");
                args.extend(parse_kv(&rest, is_freeform(&module)));
                (module, args)
            }
            Node::String(s) => {
                let (module, rest) = split_module_string(s);
                let args = parse_kv(&rest, is_freeform(&module));
                (module, args)
            }
            other => {
                return Err(GrammarError::UnexpectedType {
                    found: type_name(other).to_string(),
                })
            }
        };

        if module.is_empty() {
            return Err(GrammarError::NoAction);
        }
        Ok((module, args))
    }
}

fn type_name(node: &Node) -> &'static str {
    match node {
        Node::Null => "null",
        Node::Bool(_) => "bool",
        Node::Int(_) => "int",
        Node::Float(_) => "float",
        Node::String(_) => "str",
        Node::Sequence(_) => "list",
        Node::Mapping(_) => "dict",
    }
}

fn merge_args_value(
    target: &mut IndexMap<String, Node>,
    value: &Node,
) -> Result<(), GrammarError> {
    match value {
        Node::Null => {}
        Node::Mapping(m) => target.extend(m.entries().clone()),
        Node::String(s) if is_template(s) => {
            target.insert("_variable_params".to_string(), Node::String(s.clone()));
        }
        _ => return Err(GrammarError::InvalidArgs),
    }
    Ok(())
}

impl ModuleArgsGrammar for AnsibleModuleArgs {
    fn parse(&self, task: &Mapping, builtins: &BuiltinModules) -> Result<ParsedArgs, GrammarError> {
        let form = self.classify(task, builtins)?;

        let mut arguments = IndexMap::new();
        if let Some(additional) = task.get("args") {
            merge_args_value(&mut arguments, additional)?;
        }

        let (mut module, mut args) = match form {
            ActionForm::Action(value) | ActionForm::LocalAction(value) => {
                self.action_key_args(value)?
            }
            ActionForm::Module { name, value } => (name.to_string(), self.module_key_args(name, value)?),
        };

        if let Some(nested) = args.shift_remove("args") {
            match nested {
                Node::String(s) => args.extend(parse_kv(&s, false)),
                Node::Mapping(m) => args.extend(m.into_entries()),
                _ => return Err(GrammarError::InvalidArgs),
            }
        }

        if !is_freeform(&module) {
            if let Some(param) = args.keys().find(|k| k.starts_with("_ansible_")) {
                return Err(GrammarError::InternalParam {
                    module,
                    param: param.clone(),
                });
            }
        }

        arguments.extend(args);

        let raw_params = arguments
            .get("_raw_params")
            .and_then(Node::scalar_text)
            .filter(|raw| !raw.is_empty());
        if let Some(raw) = raw_params {
            if !takes_raw_params(&module) {
                if !is_template(&raw) {
                    return Err(GrammarError::ExtraParams { module });
                }
                arguments.shift_remove("_raw_params");
                arguments.insert("_variable_params".to_string(), Node::String(raw));
            }
        }

        let delegate_to = match form {
            ActionForm::LocalAction(_) => Some("localhost".to_string()),
            _ => task
                .get("delegate_to")
                .filter(|v| !v.is_null())
                .map(|v| v.to_string()),
        };

        if module == "shell" {
            module = "command".to_string();
            arguments.insert("_uses_shell".to_string(), Node::Bool(true));
        }

        Ok(ParsedArgs {
            module,
            arguments,
            delegate_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse;

    fn task(yaml: &str) -> Mapping {
        parse(yaml, "t.yml").unwrap().as_mapping().unwrap().clone()
    }

    fn parse_task(yaml: &str) -> Result<ParsedArgs, GrammarError> {
        AnsibleModuleArgs::new().parse(&task(yaml), &BuiltinModules::default())
    }

    #[test]
    fn test_module_key_shorthand() {
        let parsed = parse_task("debug: msg=hello\n").unwrap();
        assert_eq!(parsed.module, "debug");
        assert_eq!(parsed.arguments.get("msg"), Some(&Node::from("hello")));
        assert_eq!(parsed.delegate_to, None);
    }

    #[test]
    fn test_action_string_form() {
        let parsed = parse_task("action: copy src=a dest=b\n").unwrap();
        assert_eq!(parsed.module, "copy");
        assert_eq!(parsed.arguments.len(), 2);
    }

    #[test]
    fn test_action_mapping_form() {
        let parsed = parse_task("action:\n  module: file\n  path: /tmp/x\n  state: touch\n").unwrap();
        assert_eq!(parsed.module, "file");
        assert_eq!(parsed.arguments.get("path"), Some(&Node::from("/tmp/x")));
        assert!(!parsed.arguments.contains_key("module"));
    }

    #[test]
    fn test_local_action_delegates_to_localhost() {
        let parsed = parse_task("local_action: command echo hi\n").unwrap();
        assert_eq!(parsed.module, "command");
        assert_eq!(parsed.delegate_to.as_deref(), Some("localhost"));
        assert_eq!(parsed.arguments.get("_raw_params"), Some(&Node::from("echo hi")));
    }

    #[test]
    fn test_shell_reported_as_command_with_flag() {
        let parsed = parse_task("shell: ls -l chdir=/tmp\n").unwrap();
        assert_eq!(parsed.module, "command");
        assert_eq!(parsed.arguments.get("_uses_shell"), Some(&Node::Bool(true)));
        assert_eq!(parsed.arguments.get("chdir"), Some(&Node::from("/tmp")));
    }

    #[test]
    fn test_args_key_merged_under_action_args() {
        let parsed = parse_task("copy: src=a\nargs:\n  src: ignored\n  mode: '0644'\n").unwrap();
        assert_eq!(parsed.arguments.get("src"), Some(&Node::from("a")));
        assert_eq!(parsed.arguments.get("mode"), Some(&Node::from("0644")));
    }

    #[test]
    fn test_conflicting_actions() {
        let err = parse_task("copy: src=a\ndebug: msg=b\n").unwrap_err();
        assert_eq!(
            err,
            GrammarError::ConflictingActions {
                first: "copy".to_string(),
                second: "debug".to_string()
            }
        );
    }

    #[test]
    fn test_action_and_local_action_exclusive() {
        let err = parse_task("action: ping\nlocal_action: ping\n").unwrap_err();
        assert_eq!(err, GrammarError::ExclusiveActionKeys);
    }

    #[test]
    fn test_real_modules_resolve() {
        for yaml in [
            "htpasswd:\n  path: /etc/nginx/htpasswd\n  name: admin\n",
            "filesystem: fstype=ext4 dev=/dev/sdb1\n",
            "pam_limits: domain=* limit_type=soft limit_item=nofile value=64000\n",
            "set_stats:\n  data:\n    deployed: true\n",
        ] {
            let module = yaml.split(':').next().unwrap();
            let parsed = parse_task(yaml).unwrap();
            assert_eq!(parsed.module, module);
            assert!(!parsed.arguments.is_empty(), "no arguments for {module}");
        }
    }

    #[test]
    fn test_single_unknown_key_taken_as_module() {
        let parsed = parse_task("name: site module\nsite_specific_thing: a=b\nwhen: x\n").unwrap();
        assert_eq!(parsed.module, "site_specific_thing");
        assert_eq!(parsed.arguments.get("a"), Some(&Node::from("b")));
    }

    #[test]
    fn test_ambiguous_unknown_keys_rejected_unless_custom() {
        let yaml = "first_unknown: a=b\nsecond_unknown: c=d\n";
        let err = parse_task(yaml).unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnresolvedModule {
                module: "first_unknown".to_string()
            }
        );

        let builtins = BuiltinModules::new(&["second_unknown"]);
        let parsed = AnsibleModuleArgs::new().parse(&task(yaml), &builtins).unwrap();
        assert_eq!(parsed.module, "second_unknown");
    }

    #[test]
    fn test_no_action() {
        assert_eq!(parse_task("name: nothing\nwhen: x\n").unwrap_err(), GrammarError::NoAction);
    }

    #[test]
    fn test_extra_params_rejected() {
        let err = parse_task("debug: hello\n").unwrap_err();
        assert_eq!(
            err,
            GrammarError::ExtraParams {
                module: "debug".to_string()
            }
        );
    }

    #[test]
    fn test_templated_extra_params_become_variable_params() {
        let parsed = parse_task("debug: '{{ debug_args }}'\n").unwrap();
        assert_eq!(
            parsed.arguments.get("_variable_params"),
            Some(&Node::from("{{ debug_args }}"))
        );
    }

    #[test]
    fn test_delegate_to_kept() {
        let parsed = parse_task("ping:\ndelegate_to: bastion\n").unwrap();
        assert_eq!(parsed.delegate_to.as_deref(), Some("bastion"));
    }

    #[test]
    fn test_fully_qualified_module() {
        let parsed = parse_task("community.general.ufw:\n  rule: allow\n").unwrap();
        assert_eq!(parsed.module, "community.general.ufw");
    }

    #[test]
    fn test_internal_params_rejected() {
        let err = parse_task("copy:\n  _ansible_check_mode: true\n").unwrap_err();
        assert!(matches!(err, GrammarError::InternalParam { .. }));
    }
}
