//! Names the task grammar treats specially

/// Task-level keywords. None of these can name a module.
pub const TASK_KEYWORDS: &[&str] = &[
    "name",
    "action",
    "local_action",
    "args",
    "async",
    "poll",
    "when",
    "notify",
    "listen",
    "register",
    "tags",
    "ignore_errors",
    "ignore_unreachable",
    "delegate_to",
    "delegate_facts",
    "changed_when",
    "failed_when",
    "until",
    "retries",
    "delay",
    "loop",
    "loop_control",
    "environment",
    "vars",
    "no_log",
    "run_once",
    "any_errors_fatal",
    "check_mode",
    "diff",
    "become",
    "become_user",
    "become_method",
    "become_flags",
    "become_exe",
    "connection",
    "remote_user",
    "port",
    "collections",
    "module_defaults",
    "throttle",
    "timeout",
    "debugger",
    "first_available_file",
    "always_run",
    "transport",
    "sudo",
    "sudo_user",
    "sudo_pass",
    "su",
    "su_user",
    "su_pass",
    "block",
    "rescue",
    "always",
];

/// Actions handled by the framework itself rather than a module file.
pub const BUILTIN_TASKS: &[&str] = &[
    "include",
    "include_tasks",
    "include_role",
    "import_tasks",
    "import_role",
    "import_playbook",
    "include_vars",
    "meta",
    "add_host",
    "group_by",
    "set_fact",
];

/// Modules whose string form is a free-form command line.
pub const FREEFORM_ACTIONS: &[&str] = &[
    "command",
    "shell",
    "script",
    "raw",
    "win_command",
    "win_shell",
    "ansible.builtin.command",
    "ansible.builtin.shell",
    "ansible.builtin.script",
    "ansible.builtin.raw",
    "ansible.windows.win_command",
    "ansible.windows.win_shell",
];

/// Options a free-form module accepts as `key=value` inside its command line.
pub const FREEFORM_OPTIONS: &[&str] = &[
    "creates",
    "removes",
    "chdir",
    "executable",
    "warn",
    "stdin",
    "stdin_add_newline",
    "strip_empty_ends",
];

/// Actions allowed to carry positional parameters besides the free-form ones.
const RAW_PARAM_ACTIONS: &[&str] = &[
    "include",
    "include_vars",
    "include_tasks",
    "include_role",
    "import_tasks",
    "import_role",
    "import_playbook",
    "add_host",
    "group_by",
    "set_fact",
    "meta",
];

/// Directives that pull in other files instead of doing work.
pub const INCLUDE_KEYS: &[&str] = &["include", "include_tasks", "import_playbook", "import_tasks"];

/// Keys whose list items are nested tasks.
pub const BLOCK_KEYS: &[&str] = &["block", "rescue", "always"];

/// Modules known without a module search path.
const KNOWN_MODULES: &[&str] = &[
    "apt",
    "apt_key",
    "apt_repository",
    "assemble",
    "assert",
    "async_status",
    "blockinfile",
    "command",
    "copy",
    "cron",
    "debconf",
    "debug",
    "dnf",
    "dpkg_selections",
    "expect",
    "fail",
    "fetch",
    "file",
    "find",
    "gather_facts",
    "get_url",
    "getent",
    "git",
    "group",
    "hostname",
    "iptables",
    "known_hosts",
    "lineinfile",
    "mount",
    "package",
    "package_facts",
    "pause",
    "ping",
    "pip",
    "raw",
    "reboot",
    "replace",
    "rpm_key",
    "script",
    "service",
    "service_facts",
    "setup",
    "shell",
    "slurp",
    "stat",
    "subversion",
    "synchronize",
    "systemd",
    "systemd_service",
    "sysvinit",
    "tempfile",
    "template",
    "unarchive",
    "uri",
    "user",
    "validate_argument_spec",
    "wait_for",
    "wait_for_connection",
    "yum",
    "yum_repository",
    "win_command",
    "win_shell",
    "win_copy",
    "win_file",
    "win_service",
    "authorized_key",
    "sysctl",
    "selinux",
    "seboolean",
    "firewalld",
    "ufw",
    "docker_container",
    "docker_image",
    "modprobe",
    "openssl_privatekey",
    "locale_gen",
    "timezone",
    "zypper",
    "homebrew",
    "npm",
    "gem",
    "archive",
    "ini_file",
    "make",
    "mysql_db",
    "mysql_user",
    "postgresql_db",
    "postgresql_user",
    "set_stats",
    "deb822_repository",
    "dnf5",
    "mount_facts",
    "htpasswd",
    "filesystem",
    "pam_limits",
    "lvg",
    "lvol",
    "parted",
    "acl",
    "at",
    "patch",
    "alternatives",
    "capabilities",
    "cronvar",
    "git_config",
    "kernel_blacklist",
    "xattr",
    "nmcli",
    "snap",
    "flatpak",
    "pipx",
    "composer",
    "redis",
    "rabbitmq_user",
    "rabbitmq_vhost",
    "mongodb_user",
    "openssl_csr",
    "openssl_certificate",
    "x509_certificate",
    "docker_network",
    "docker_volume",
    "docker_compose",
    "k8s",
    "helm",
    "ec2_instance",
    "s3_bucket",
    "route53",
    "win_package",
    "win_regedit",
    "win_template",
    "win_updates",
    "win_user",
    "win_feature",
];

pub fn is_task_keyword(key: &str) -> bool {
    TASK_KEYWORDS.contains(&key) || key.starts_with("with_")
}

pub fn is_freeform(action: &str) -> bool {
    FREEFORM_ACTIONS.contains(&action)
}

/// Whether `action` may keep a `_raw_params` argument.
pub fn takes_raw_params(action: &str) -> bool {
    is_freeform(action) || RAW_PARAM_ACTIONS.contains(&short_name(action))
}

pub fn is_known_module(name: &str) -> bool {
    KNOWN_MODULES.contains(&short_name(name))
}

/// `namespace.collection.module` style names.
pub fn is_fully_qualified(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() >= 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

/// Last segment of a fully qualified name, or the name itself.
pub fn short_name(name: &str) -> &str {
    if is_fully_qualified(name) {
        name.rsplit('.').next().unwrap_or(name)
    } else {
        name
    }
}
