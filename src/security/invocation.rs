use crate::shell::Token;

/// A word that runs the command following it
struct Wrapper {
    name: &'static str,
    /// Options whose value is the next word
    value_flags: &'static [&'static str],
    /// Operands that come before the wrapped command
    operands: usize,
    /// Options that make the wrapper inspect the command instead of running it
    inert_flags: &'static [&'static str],
}

const fn wrapper(name: &'static str, value_flags: &'static [&'static str], operands: usize) -> Wrapper {
    Wrapper {
        name,
        value_flags,
        operands,
        inert_flags: &[],
    }
}

const WRAPPERS: &[Wrapper] = &[
    wrapper(
        "sudo",
        &["-u", "-g", "-h", "-p", "-C", "-U", "-r", "-t", "-D", "-R", "-T", "--user", "--group", "--host", "--prompt", "--chdir"],
        0,
    ),
    wrapper("doas", &["-u", "-C"], 0),
    wrapper("env", &["-u", "-C", "-S", "--unset", "--chdir", "--split-string"], 0),
    wrapper("nohup", &[], 0),
    wrapper("time", &["-f", "-o", "--format", "--output"], 0),
    wrapper("nice", &["-n", "--adjustment"], 0),
    wrapper("ionice", &["-c", "-n", "-p", "-P", "-u", "--class", "--classdata"], 0),
    wrapper(
        "xargs",
        &["-I", "-n", "-P", "-L", "-s", "-d", "-E", "-a", "--max-args", "--max-procs", "--max-lines", "--max-chars", "--delimiter", "--arg-file", "--replace"],
        0,
    ),
    wrapper("timeout", &["-s", "-k", "--signal", "--kill-after"], 1),
    wrapper("stdbuf", &["-i", "-o", "-e", "--input", "--output", "--error"], 0),
    wrapper("chroot", &["--userspec", "--groups"], 1),
    wrapper("unbuffer", &[], 0),
    wrapper("exec", &["-a"], 0),
    wrapper("builtin", &[], 0),
    Wrapper {
        name: "command",
        value_flags: &[],
        operands: 0,
        inert_flags: &["-v", "-V"],
    },
    // Keywords after which a new command starts
    wrapper("then", &[], 0),
    wrapper("do", &[], 0),
    wrapper("else", &[], 0),
    wrapper("if", &[], 0),
    wrapper("elif", &[], 0),
    wrapper("while", &[], 0),
    wrapper("until", &[], 0),
    wrapper("!", &[], 0),
    wrapper("{", &[], 0),
];

/// Shells whose `-c` argument is itself a command line
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

fn find_wrapper(word: &str) -> Option<&'static Wrapper> {
    let name = basename(word);
    WRAPPERS.iter().find(|w| w.name == name)
}

/// One run of a program: the program word as written plus its arguments up
/// to the next operator
pub(crate) struct Invocation<'a> {
    pub program: &'a str,
    pub args: Vec<&'a str>,
}

impl Invocation<'_> {
    /// The invocation as a single line, for evidence
    pub fn render(&self) -> String {
        std::iter::once(self.program)
            .chain(self.args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Find every invocation of `name` in command position.
///
/// A path such as `/bin/rm` counts as `rm`. Leading wrappers (`sudo -u
/// root`, `timeout 5`, `xargs -I {}`, ...) with their options and operands,
/// and `VAR=value` assignments, are skipped.
pub(crate) fn find_invocations<'a>(tokens: &'a [Token], name: &str) -> Vec<Invocation<'a>> {
    let mut found = Vec::new();
    let mut position = CommandPosition::Start;
    let mut index = 0;

    while index < tokens.len() {
        let word = match &tokens[index] {
            Token::Operator(_) => {
                position = CommandPosition::Start;
                index += 1;
                continue;
            }
            Token::Word(word) => word.as_str(),
        };
        index += 1;

        match position {
            CommandPosition::Arguments => continue,
            CommandPosition::Value(wrapper, operands) => {
                position = CommandPosition::Wrapped(wrapper, operands);
                continue;
            }
            CommandPosition::Wrapped(wrapper, operands) => {
                if word.starts_with('-') && word != "-" {
                    if wrapper.inert_flags.contains(&word) {
                        position = CommandPosition::Arguments;
                    } else if wrapper.value_flags.contains(&word) {
                        position = CommandPosition::Value(wrapper, operands);
                    }
                    continue;
                }
                if operands > 0 {
                    position = CommandPosition::Wrapped(wrapper, operands - 1);
                    continue;
                }
            }
            CommandPosition::Start => {
                if word.starts_with('-') {
                    continue;
                }
            }
        }

        if let Some(wrapper) = find_wrapper(word) {
            position = CommandPosition::Wrapped(wrapper, wrapper.operands);
            continue;
        }
        if is_assignment(word) {
            continue;
        }
        position = CommandPosition::Arguments;

        if basename(word) == name {
            let args = tokens[index..]
                .iter()
                .map_while(Token::as_word)
                .collect::<Vec<_>>();
            index += args.len();
            found.push(Invocation {
                program: word,
                args,
            });
        }
    }

    found
}

/// Where the scan is within the current simple command
#[derive(Clone, Copy)]
enum CommandPosition {
    /// Expecting the program word
    Start,
    /// After a wrapper, with its operands still to skip
    Wrapped(&'static Wrapper, usize),
    /// The next word is the value of a wrapper option
    Value(&'static Wrapper, usize),
    /// Past the program word
    Arguments,
}

/// Command lines passed to a shell with `-c`, such as the quoted part of
/// `bash -c 'rm -rf /'`
pub(crate) fn shell_scripts<'a>(tokens: &'a [Token]) -> Vec<&'a str> {
    SHELLS
        .iter()
        .flat_map(|shell| find_invocations(tokens, shell))
        .filter_map(|invocation| script_argument(&invocation.args))
        .collect()
}

fn script_argument<'a>(args: &[&'a str]) -> Option<&'a str> {
    let flag = args.iter().take_while(|arg| **arg != "--").position(|arg| {
        arg.starts_with('-') && !arg.starts_with("--") && arg[1..].contains('c')
    })?;
    args.get(flag + 1).copied()
}

fn basename(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Characters of every single-dash flag cluster (`-rf` yields `r`, `f`)
pub(crate) fn short_flags<'a>(args: &'a [&'a str]) -> impl Iterator<Item = char> + 'a {
    args.iter()
        .take_while(|arg| **arg != "--")
        .filter(|arg| arg.starts_with('-') && !arg.starts_with("--") && arg.len() > 1)
        .flat_map(|arg| arg.chars().skip(1))
}

/// Whether a long flag is present, either bare or as `--flag=value`
pub(crate) fn has_long_flag(args: &[&str], flag: &str) -> bool {
    args.iter().take_while(|arg| **arg != "--").any(|arg| {
        *arg == flag
            || arg
                .strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
    })
}
