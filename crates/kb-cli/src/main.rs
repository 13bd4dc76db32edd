//! `kb` command line
//!
//! Posts YAML tables as manifest versions and browses the store.

mod commands;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use kb_core::{KbConfig, KbError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "kb.toml";

fn identity_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("namespace")
            .long("namespace")
            .short('n')
            .required(true)
            .help("Document namespace"),
    )
    .arg(
        Arg::new("name")
            .long("name")
            .required(true)
            .help("Document name"),
    )
    .arg(
        Arg::new("kind")
            .long("kind")
            .short('k')
            .required(true)
            .help("Document kind; selects the posting settings"),
    )
}

fn cli() -> Command {
    Command::new("kb")
        .version(kb_core::VERSION)
        .about("Post tables as versioned manifests")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file [default: kb.toml if present]"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Store root, overriding the configuration"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .short('e')
                .global(true)
                .help("Sandbox to work in, nested sandboxes separated by '/'"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            identity_args(Command::new("post").about("Post a table as the next version"))
                .arg(
                    Arg::new("table")
                        .long("table")
                        .short('t')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("YAML table to post"),
                )
                .arg(
                    Arg::new("split")
                        .long("split")
                        .action(ArgAction::Append)
                        .help("Split the columns at this entity (repeatable)"),
                )
                .arg(
                    Arg::new("label")
                        .long("label")
                        .help("Posting label [default: table file name]"),
                ),
        )
        .subcommand(
            identity_args(Command::new("show").about("Print a manifest version"))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .short('v')
                        .value_parser(value_parser!(u32))
                        .help("Version [default: latest]"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(identity_args(
            Command::new("versions").about("List persisted versions of a document"),
        ))
        .subcommand(Command::new("links").about("List registered reference links"))
        .subcommand(
            Command::new("env")
                .about("Manage sandboxes under the current environment")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Create a sandbox")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("isolated")
                                .long("isolated")
                                .action(ArgAction::SetTrue)
                                .help("Fail reads missing in the sandbox instead of reading the parent"),
                        ),
                )
                .subcommand(Command::new("list").about("List sandboxes"))
                .subcommand(
                    Command::new("remove")
                        .about("Delete a sandbox and its contents")
                        .arg(Arg::new("name").required(true)),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<KbConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => KbConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => KbConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => KbConfig::default(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("store") {
        config.store_root.clone_from(root);
    }
    Ok(config)
}

fn init_tracing(config: &KbConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<KbError>() {
        Some(e) if e.is_integrity_violation() => ExitCode::from(3),
        Some(e) if e.is_user_error() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };
    init_tracing(&config, matches.get_flag("log-json"));

    let mut stdout = std::io::stdout().lock();
    match commands::run(&config, &matches, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_code(&err)
        }
    }
}
