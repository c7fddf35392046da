//! Flat table of single-finding rules.
//!
//! Each entry maps one or more regular expressions to one finding. The first
//! pattern of an entry that matches supplies the evidence. Adding a rule
//! means adding a row here plus a positive and negative case in the tests.

use crate::security::finding::{Category, Finding, Severity};
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

/// One row of the rule table
pub struct SimpleRule {
    pub code: &'static str,
    pub severity: Severity,
    pub category: Category,
    pub title: &'static str,
    pub patterns: &'static [&'static str],
}

pub static SIMPLE_RULES: &[SimpleRule] = &[
    // ──── Privilege escalation ────
    SimpleRule {
        code: "PRIV_SUDO",
        severity: Severity::High,
        category: Category::PrivilegeEscalation,
        title: "Runs a command with elevated privileges",
        patterns: &[r"(?:^|[\s;&|(`])(?:sudo|doas|pkexec)(?:\s|$)"],
    },
    SimpleRule {
        code: "PRIV_SU",
        severity: Severity::High,
        category: Category::PrivilegeEscalation,
        title: "Switches to another user",
        patterns: &[r"(?:^|[\s;&|(`])su(?:\s|$)"],
    },
    SimpleRule {
        code: "PRIV_SETUID",
        severity: Severity::High,
        category: Category::PrivilegeEscalation,
        title: "Sets setuid or setgid bits",
        patterns: &[r"\bchmod\s+(?:-[A-Za-z]+\s+)*(?:[ugoa]*\+[rwx]*s|[2467][0-7]{3})\b"],
    },
    // ──── Disk and filesystem ────
    SimpleRule {
        code: "DISK_DD_DEVICE",
        severity: Severity::High,
        category: Category::FilesystemWrite,
        title: "Writes raw data to a block device",
        patterns: &[r"\bdd\b[^;&|]*\bof=/dev/"],
    },
    SimpleRule {
        code: "DISK_MKFS",
        severity: Severity::High,
        category: Category::FilesystemDelete,
        title: "Formats a filesystem",
        patterns: &[r"\bmkfs(?:\.\w+)?\b"],
    },
    SimpleRule {
        code: "DISK_PARTITION",
        severity: Severity::High,
        category: Category::FilesystemDelete,
        title: "Edits disk partitions or signatures",
        patterns: &[r"(?:^|[\s;&|(`])(?:fdisk|sfdisk|gdisk|sgdisk|parted|wipefs)(?:\s|$)"],
    },
    SimpleRule {
        code: "DISK_SHRED",
        severity: Severity::High,
        category: Category::FilesystemDelete,
        title: "Irrecoverably overwrites files",
        patterns: &[r"(?:^|[\s;&|(`])shred\s"],
    },
    SimpleRule {
        code: "FS_DEVICE_OVERWRITE",
        severity: Severity::High,
        category: Category::FilesystemWrite,
        title: "Redirects output onto a disk device",
        patterns: &[r">\s*/dev/(?:sd[a-z]|hd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)"],
    },
    SimpleRule {
        code: "FS_SYSTEM_PATH_WRITE",
        severity: Severity::High,
        category: Category::FilesystemWrite,
        title: "Writes into a system directory",
        patterns: &[r"(?:>>?|\btee\s+(?:-a\s+)?)\s*/(?:etc|usr|bin|sbin|lib|lib64|boot|System|Library)/"],
    },
    SimpleRule {
        code: "FS_WORLD_WRITABLE",
        severity: Severity::Medium,
        category: Category::FilesystemWrite,
        title: "Makes files world-writable",
        patterns: &[r"\bchmod\s+(?:-[A-Za-z]+\s+)*(?:0?777|[ao]\+w)\b"],
    },
    SimpleRule {
        code: "FS_FIND_DELETE",
        severity: Severity::High,
        category: Category::FilesystemDelete,
        title: "Deletes every file a find expression matches",
        patterns: &[r"\bfind\b[^;&|]*\s(?:-delete\b|-exec\s+(?:\S*/)?rm\b)"],
    },
    SimpleRule {
        code: "FS_MOVE_TO_DEV_NULL",
        severity: Severity::High,
        category: Category::FilesystemDelete,
        title: "Moves files onto /dev/null",
        patterns: &[r"\bmv\s[^;&|]*\s/dev/null\b"],
    },
    // ──── Remote and dynamic code execution ────
    SimpleRule {
        code: "RCE_PIPE_TO_SHELL",
        severity: Severity::High,
        category: Category::RemoteExecution,
        title: "Pipes content straight into a shell",
        patterns: &[r"\|\s*(?:sudo\s+(?:-\S+\s+)*)?(?:\S*/)?(?:ba|z|k|da|fi|tc|c)?sh(?:\s|$)"],
    },
    SimpleRule {
        code: "RCE_DOWNLOAD_TO_INTERPRETER",
        severity: Severity::High,
        category: Category::RemoteExecution,
        title: "Pipes downloaded content into an interpreter",
        patterns: &[r"\b(?:curl|wget)\b[^;&]*\|\s*(?:sudo\s+)?(?:\S*/)?(?:python[0-9.]*|perl|ruby|node|php)(?:\s|$)"],
    },
    SimpleRule {
        code: "RCE_DOWNLOAD_EXEC",
        severity: Severity::High,
        category: Category::RemoteExecution,
        title: "Downloads a file and then executes it",
        patterns: &[r"\b(?:curl|wget)\b.*(?:&&|;)\s*(?:chmod\s+\+x|(?:ba|z)?sh\s+\S|\./\S)"],
    },
    SimpleRule {
        code: "RCE_PIPE_TO_INTERPRETER",
        severity: Severity::Medium,
        category: Category::RemoteExecution,
        title: "Pipes content into a script interpreter",
        patterns: &[r"\|\s*(?:sudo\s+)?(?:\S*/)?(?:python[0-9.]*|perl|ruby|node|php)\s*(?:-\s*)?$"],
    },
    SimpleRule {
        code: "RCE_EVAL",
        severity: Severity::High,
        category: Category::RemoteExecution,
        title: "Evaluates dynamically built shell code",
        patterns: &[r"(?:^|[\s;&|(`])eval(?:\s|$)"],
    },
    SimpleRule {
        code: "RCE_SOURCE_SUBSTITUTION",
        severity: Severity::High,
        category: Category::RemoteExecution,
        title: "Sources or runs a script from a process substitution",
        patterns: &[r"(?:^|[\s;&|(`])(?:source|\.|(?:ba|z)?sh)\s+<\("],
    },
    SimpleRule {
        code: "RCE_INTERPRETER_ONELINER",
        severity: Severity::Medium,
        category: Category::RemoteExecution,
        title: "Runs an inline interpreter one-liner",
        patterns: &[
            r"(?:^|[\s;&|(`])(?:\S*/)?python[0-9.]*\s+(?:-[A-Za-z]+\s+)*-c(?:\s|$)",
            r"(?:^|[\s;&|(`])(?:\S*/)?(?:perl|ruby|node)\s+(?:-[A-Za-z]+\s+)*-[A-Za-z]*e(?:\s|$)",
            r"(?:^|[\s;&|(`])(?:\S*/)?php\s+(?:-[A-Za-z]+\s+)*-r(?:\s|$)",
        ],
    },
    // ──── Obfuscation ────
    SimpleRule {
        code: "OBF_BASE64_EXEC",
        severity: Severity::High,
        category: Category::Obfuscation,
        title: "Decodes base64 and executes the result",
        patterns: &[
            r"\bbase64\s+(?:-[A-Za-z]+\s+)*(?:-d|-D|--decode)\b.*\|\s*(?:\S*/)?(?:ba|z)?sh(?:\s|$)",
            r"\beval\b.*\bbase64\s+(?:-[A-Za-z]+\s+)*(?:-d|-D|--decode)\b",
        ],
    },
    SimpleRule {
        code: "OBF_HEX_EXEC",
        severity: Severity::High,
        category: Category::Obfuscation,
        title: "Executes an escaped byte payload",
        patterns: &[r"(?:\\x[0-9a-fA-F]{2}){4,}.*\|\s*(?:\S*/)?(?:ba|z)?sh(?:\s|$)"],
    },
    SimpleRule {
        code: "OBF_HISTORY_TAMPER",
        severity: Severity::Medium,
        category: Category::Obfuscation,
        title: "Clears shell history or system logs",
        patterns: &[r"\bhistory\s+-c\b", r"\bunset\s+HISTFILE\b", r">\s*/var/log/"],
    },
    // ──── Persistence ────
    SimpleRule {
        code: "PERSIST_SHELL_RC",
        severity: Severity::High,
        category: Category::Persistence,
        title: "Modifies a shell startup file",
        patterns: &[
            r"(?:>>?|\btee\s+(?:-a\s+)?|\bsed\s+-i\S*\s[^;&|]*)\s*\S*(?:\.bashrc|\.bash_profile|\.bash_login|\.zshrc|\.zprofile|\.zshenv|\.profile|config\.fish)\b",
        ],
    },
    SimpleRule {
        code: "PERSIST_CRON",
        severity: Severity::High,
        category: Category::Persistence,
        title: "Installs or edits scheduled jobs",
        patterns: &[
            r"\bcrontab\s+(?:-u\s+\S+\s+)?(?:-[eir]\b|-(?:\s|$)|[^-\s])",
            r"(?:>>?|\btee\b|\bcp\b|\bmv\b|\binstall\b)[^;&|]*(?:/etc/cron|/var/spool/cron)",
        ],
    },
    SimpleRule {
        code: "PERSIST_SERVICE_UNIT",
        severity: Severity::High,
        category: Category::Persistence,
        title: "Installs or enables a service unit",
        patterns: &[
            r"\bsystemctl\s+(?:--user\s+)?(?:--now\s+)?(?:enable|link|edit|set-default|preset)\b",
            r"(?:>>?|\btee\b|\bcp\b|\bmv\b|\bln\b|\binstall\b)[^;&|]*(?:/etc/systemd/|systemd/user/|Library/LaunchAgents|Library/LaunchDaemons)",
        ],
    },
    SimpleRule {
        code: "PERSIST_AUTHORIZED_KEYS",
        severity: Severity::High,
        category: Category::Persistence,
        title: "Adds SSH authorized keys",
        patterns: &[r"(?:>>?|\btee\b|\bcp\b|\bmv\b)[^;&|]*authorized_keys"],
    },
    // ──── Credential access ────
    SimpleRule {
        code: "CRED_SSH_KEY",
        severity: Severity::High,
        category: Category::CredentialAccess,
        title: "Touches an SSH private key",
        patterns: &[r"\.ssh/id_(?:rsa|dsa|ecdsa|ed25519)(?:[^.\w]|$)"],
    },
    SimpleRule {
        code: "CRED_SHADOW",
        severity: Severity::High,
        category: Category::CredentialAccess,
        title: "Touches the password or sudoers database",
        patterns: &[r"/etc/(?:shadow|gshadow|sudoers|master\.passwd)\b"],
    },
    SimpleRule {
        code: "CRED_CLOUD_CONFIG",
        severity: Severity::High,
        category: Category::CredentialAccess,
        title: "Touches cloud, cluster, or registry credentials",
        patterns: &[
            r"\.aws/credentials|\.config/gcloud/|\.azure/|\.kube/config|\.docker/config\.json|\.netrc\b|\.git-credentials\b|\.pypirc\b",
        ],
    },
    SimpleRule {
        code: "CRED_ENV_FILE",
        severity: Severity::Medium,
        category: Category::CredentialAccess,
        title: "Reads a dotenv file",
        patterns: &[
            r#"(?:^|[\s;&|(`])(?:cat|less|more|head|tail|bat|strings|xxd|od|grep|rg|awk|sed|cut|base64)\b[^;&|]*[\s/'"=]\.env(?:\.[\w.-]+)?(?:[\s'";&|]|$)"#,
        ],
    },
    SimpleRule {
        code: "CRED_SHELL_HISTORY",
        severity: Severity::Medium,
        category: Category::CredentialAccess,
        title: "Reads shell or database history",
        patterns: &[r"\.(?:bash|zsh|psql|mysql|python)_history\b"],
    },
    // ──── Infrastructure ────
    SimpleRule {
        code: "INFRA_KUBECTL_DELETE",
        severity: Severity::High,
        category: Category::InfrastructureDestruction,
        title: "Deletes or drains Kubernetes resources",
        patterns: &[r"\bkubectl\b[^;&|]*\s(?:delete|drain)\b"],
    },
    SimpleRule {
        code: "INFRA_TERRAFORM_DESTROY",
        severity: Severity::High,
        category: Category::InfrastructureDestruction,
        title: "Destroys Terraform-managed infrastructure",
        patterns: &[r"\b(?:terraform|tofu|terragrunt)\b[^;&|]*\s(?:destroy\b|apply\b[^;&|]*\s-destroy\b)"],
    },
    SimpleRule {
        code: "INFRA_PULUMI_DESTROY",
        severity: Severity::High,
        category: Category::InfrastructureDestruction,
        title: "Destroys Pulumi-managed infrastructure",
        patterns: &[r"\bpulumi\b[^;&|]*\s(?:destroy|down)\b"],
    },
    SimpleRule {
        code: "INFRA_CLOUD_DELETE",
        severity: Severity::High,
        category: Category::InfrastructureDestruction,
        title: "Deletes cloud resources",
        patterns: &[
            r"\baws\s+\S+\s+(?:delete-|terminate-|rb\b|rm\b)",
            r"\b(?:gcloud|az)\b[^;&|]*\sdelete\b",
        ],
    },
    SimpleRule {
        code: "INFRA_HELM_UNINSTALL",
        severity: Severity::Medium,
        category: Category::InfrastructureDestruction,
        title: "Uninstalls a Helm release",
        patterns: &[r"\bhelm\b[^;&|]*\s(?:uninstall|delete)\b"],
    },
    // ──── Containers ────
    SimpleRule {
        code: "CONTAINER_PRUNE",
        severity: Severity::High,
        category: Category::Container,
        title: "Prunes containers, images, or volumes",
        patterns: &[r"\b(?:docker|podman)\s+(?:(?:system|image|container|volume|network|builder|buildx)\s+)?prune\b"],
    },
    SimpleRule {
        code: "CONTAINER_VOLUME_REMOVE",
        severity: Severity::High,
        category: Category::Container,
        title: "Removes container volumes",
        patterns: &[
            r"\b(?:docker|podman)\s+volume\s+(?:rm|remove)\b",
            r"\bdocker(?:-compose|\s+compose)\s+down\b[^;&|]*(?:\s-v\b|--volumes)",
        ],
    },
    SimpleRule {
        code: "CONTAINER_PRIVILEGED",
        severity: Severity::High,
        category: Category::Container,
        title: "Starts a privileged or host-mounted container",
        patterns: &[r"\b(?:docker|podman)\s+run\b[^;&|]*(?:--privileged|\s-v\s+/:|--volume[= ]/:|--pid[= ]host)"],
    },
    SimpleRule {
        code: "CONTAINER_FORCE_REMOVE",
        severity: Severity::Medium,
        category: Category::Container,
        title: "Force-removes containers or images",
        patterns: &[r"\b(?:docker|podman)\s+(?:rm|rmi)\s+(?:-[A-Za-z]*f[A-Za-z]*|--force)\b"],
    },
    // ──── Packages ────
    SimpleRule {
        code: "PKG_SYSTEM_REMOVE",
        severity: Severity::Medium,
        category: Category::PackageManagement,
        title: "Removes system packages",
        patterns: &[
            r"\b(?:apt-get|apt|dnf|yum|zypper|apk|snap)\s+(?:-\S+\s+)*(?:remove|purge|autoremove|erase|del)\b",
            r"\bpacman\s+-R[A-Za-z]*\b",
            r"\bbrew\s+(?:uninstall|remove|rm)\b",
        ],
    },
    SimpleRule {
        code: "PKG_LANGUAGE_REMOVE",
        severity: Severity::Medium,
        category: Category::PackageManagement,
        title: "Uninstalls language packages",
        patterns: &[r"\b(?:pip[0-9.]*|pipx|npm|pnpm|yarn|cargo|gem)\s+(?:-\S+\s+)*(?:uninstall|remove)\b"],
    },
    // ──── System control ────
    SimpleRule {
        code: "SYS_FORK_BOMB",
        severity: Severity::High,
        category: Category::SystemControl,
        title: "Fork bomb",
        patterns: &[r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"],
    },
    SimpleRule {
        code: "SYS_SHUTDOWN",
        severity: Severity::High,
        category: Category::SystemControl,
        title: "Shuts down or reboots the machine",
        patterns: &[
            r"(?:^|[\s;&|(`])(?:shutdown|reboot|halt|poweroff)(?:\s|$)",
            r"\binit\s+[06]\b",
            r"\bsystemctl\s+(?:reboot|poweroff|halt|kexec)\b",
        ],
    },
    SimpleRule {
        code: "SYS_KILL_ALL",
        severity: Severity::High,
        category: Category::SystemControl,
        title: "Kills every process the user can signal",
        patterns: &[r"\bkill\s+-(?:9|KILL|SIGKILL)\s+-1\b", r"\bkillall5\b"],
    },
    SimpleRule {
        code: "SYS_KILL_BY_NAME",
        severity: Severity::Medium,
        category: Category::SystemControl,
        title: "Kills processes by name",
        patterns: &[r"(?:^|[\s;&|(`])(?:pkill|killall)\s"],
    },
    SimpleRule {
        code: "SYS_SERVICE_STOP",
        severity: Severity::Medium,
        category: Category::SystemControl,
        title: "Stops or disables a system service",
        patterns: &[
            r"\bsystemctl\s+(?:--\S+\s+)*(?:stop|disable|mask|kill)\b",
            r"\bservice\s+\S+\s+stop\b",
        ],
    },
    SimpleRule {
        code: "SYS_FIREWALL",
        severity: Severity::Medium,
        category: Category::SystemControl,
        title: "Flushes or disables the firewall",
        patterns: &[r"\biptables\s+(?:-\S+\s+)*-F\b", r"\bufw\s+disable\b", r"\bnft\s+flush\b"],
    },
];

struct CompiledRule {
    rule: &'static SimpleRule,
    patterns: Vec<Regex>,
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    SIMPLE_RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            patterns: rule
                .patterns
                .iter()
                .filter_map(|pattern| {
                    Regex::new(pattern)
                        .map_err(|e| error!(code = rule.code, %e, "failed to compile rule pattern"))
                        .ok()
                })
                .collect(),
        })
        .collect()
});

/// Evaluate every row of the table against `command`
pub fn match_simple_rules(command: &str) -> Vec<Finding> {
    COMPILED_RULES
        .iter()
        .filter_map(|compiled| {
            let evidence = compiled
                .patterns
                .iter()
                .find_map(|pattern| pattern.find(command))?;
            let rule = compiled.rule;
            Some(
                Finding::new(rule.code, rule.severity, rule.category, rule.title)
                    .with_evidence(evidence.as_str()),
            )
        })
        .collect()
}

/// Codes of every table rule, in table order
pub fn simple_rule_codes() -> impl Iterator<Item = &'static str> {
    SIMPLE_RULES.iter().map(|rule| rule.code)
}
