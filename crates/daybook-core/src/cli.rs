use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

/// Global options. Everything after them is left unparsed in `rest` and
/// becomes the `[filter] command [args]` invocation.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "daybook",
    version,
    about = "Daybook: projects, day-ranged tasks, budget and notes on the command line",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Config override, highest precedence: --rc data.location=/tmp/db
    #[arg(
        long = "rc",
        value_name = "KEY=VALUE",
        value_parser = parse_rc_override,
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<(String, String)>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn parse_rc_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got: {raw}")),
    }
}

/// Tables and reports go to stdout, so diagnostics go to stderr.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (_, 3..) => "trace",
        (_, 2) => "debug",
        (_, 1) => "info",
        _ => "warn",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// Peels positional `rc.key=value` tokens out of the raw argument list
/// before clap sees it. The first element is the binary name and is never
/// treated as an override.
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    for (idx, arg) in raw.iter().enumerate() {
        let text = arg.to_string_lossy();
        if idx > 0
            && let Some(rest) = text.strip_prefix("rc.")
            && let Some((key, value)) = rest.split_once('=')
            && !key.is_empty()
        {
            debug!(key, value, "captured positional rc override");
            overrides.push((format!("rc.{key}"), value.to_string()));
            continue;
        }
        cleaned.push(arg.clone());
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}

/// One parsed invocation: filter terms, resolved command, its arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    /// Splits the trailing tokens at the first one that resolves to a known
    /// (possibly abbreviated) command name. No tokens at all runs the
    /// configured `default.command`; tokens without a command token are all
    /// treated as a filter for `list`.
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> Self {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        if tokens.is_empty() {
            let command = cfg
                .get("default.command")
                .unwrap_or_else(|| "day".to_string());
            debug!(command = %command, "no tokens, running the default command");
            return Self {
                filter_terms: vec![],
                command,
                command_args: vec![],
            };
        }

        let known = known_command_names();
        let mut split = None;
        for (at, token) in tokens.iter().enumerate() {
            if let Some(full) = expand_command_abbrev(token, &known) {
                split = Some((at, full.to_string()));
                break;
            }
        }

        match split {
            Some((at, command)) => {
                debug!(command = %command, at, "resolved command token");
                Self {
                    filter_terms: tokens[..at].to_vec(),
                    command,
                    command_args: tokens[at + 1..].to_vec(),
                }
            }
            None => {
                warn!("no command token; treating every term as a filter for 'list'");
                Self {
                    filter_terms: tokens,
                    command: "list".to_string(),
                    command_args: vec![],
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::Path;

    use super::{Invocation, parse_rc_override, preprocess_args};
    use crate::config::Config;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn test_config() -> Config {
        Config::load(Some(Path::new("/dev/null"))).expect("config")
    }

    #[test]
    fn rc_override_needs_a_key_and_a_value() {
        assert_eq!(
            parse_rc_override("data.location=/tmp/db").expect("parse"),
            ("data.location".to_string(), "/tmp/db".to_string())
        );
        assert!(parse_rc_override("data.location").is_err());
        assert!(parse_rc_override("=on").is_err());
    }

    #[test]
    fn positional_rc_tokens_are_peeled_off() {
        let pre = preprocess_args(&os(&["daybook", "rc.color=off", "list"]));
        assert_eq!(pre.cleaned_args, os(&["daybook", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![("rc.color".to_string(), "off".to_string())]
        );
    }

    #[test]
    fn binary_name_is_never_an_override() {
        let pre = preprocess_args(&os(&["rc.fake=bin", "list"]));
        assert_eq!(pre.cleaned_args, os(&["rc.fake=bin", "list"]));
        assert!(pre.rc_overrides.is_empty());
    }

    #[test]
    fn tokens_split_into_filter_command_and_args() {
        let inv = Invocation::parse(&test_config(), os(&["project:home", "mod", "priority:high"]));
        assert_eq!(inv.filter_terms, vec!["project:home"]);
        assert_eq!(inv.command, "modify");
        assert_eq!(inv.command_args, vec!["priority:high"]);
    }

    #[test]
    fn tokens_without_a_command_all_become_filter_terms() {
        let inv = Invocation::parse(&test_config(), os(&["garden", "fence"]));
        assert_eq!(inv.command, "list");
        assert_eq!(inv.filter_terms, vec!["garden", "fence"]);
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn empty_invocation_runs_the_configured_default() {
        let inv = Invocation::parse(&test_config(), vec![]);
        assert_eq!(inv.command, "day");
        assert!(inv.filter_terms.is_empty());
    }
}
