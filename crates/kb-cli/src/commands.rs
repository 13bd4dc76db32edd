//! Subcommand handlers

use anyhow::{anyhow, bail, Context};
use clap::ArgMatches;
use kb_breakdown::Table;
use kb_core::{KbConfig, PostingController, StrategyConfig};
use kb_store::{EnvironmentConfig, ManifestIdentity, ReadMissPolicy, Store};
use std::io::Write;
use std::path::PathBuf;

/// Dispatch the parsed command line
pub(crate) fn run(
    config: &KbConfig,
    matches: &ArgMatches,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut store = open_store(config, matches.get_one::<String>("env").map(String::as_str))?;

    match matches.subcommand() {
        Some(("post", args)) => post(config, &mut store, args, out),
        Some(("show", args)) => show(&mut store, args, out),
        Some(("versions", args)) => {
            let identity = identity(args)?;
            for version in store.versions(&identity)? {
                writeln!(out, "{}", identity.at_version(version))?;
            }
            Ok(())
        }
        Some(("links", _)) => {
            for link in store.foreign_keys()?.links() {
                let uids: Vec<String> = link.uids.iter().map(ToString::to_string).collect();
                writeln!(
                    out,
                    "{} {} -> {} [{}]",
                    link.referencing,
                    link.path,
                    link.referenced,
                    uids.join(", ")
                )?;
            }
            Ok(())
        }
        Some(("env", args)) => environment(&mut store, args, out),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

/// Open the store and walk down to the requested sandbox
fn open_store(config: &KbConfig, env: Option<&str>) -> anyhow::Result<Store> {
    let mut store = Store::open(&config.store_root, config.environment())
        .with_context(|| format!("cannot open store at {}", config.store_root.display()))?;
    for name in env.into_iter().flat_map(|e| e.split('/')).filter(|n| !n.is_empty()) {
        store.activate(name)?;
    }
    Ok(store)
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing --{id}"))
}

fn identity(args: &ArgMatches) -> anyhow::Result<ManifestIdentity> {
    let identity = ManifestIdentity::new(
        required(args, "namespace")?,
        required(args, "name")?,
        required(args, "kind")?,
    );
    identity.validate()?;
    Ok(identity)
}

fn post(
    config: &KbConfig,
    store: &mut Store,
    args: &ArgMatches,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let identity = identity(args)?;
    let path = args
        .get_one::<PathBuf>("table")
        .ok_or_else(|| anyhow!("missing --table"))?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read table {}", path.display()))?;
    let mut table = Table::from_yaml_str(&text)
        .with_context(|| format!("cannot parse table {}", path.display()))?;

    let label = match args.get_one::<String>("label") {
        Some(label) => label.clone(),
        None => path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
    };

    let mut posting = config.posting(&identity.kind);
    if let Some(splits) = args.get_many::<String>("split") {
        let splits: Vec<&str> = splits.map(String::as_str).collect();
        posting.strategy = StrategyConfig::split_at(&splits);
    }

    let controller = PostingController::with_posting_config(identity, posting, config.uid_start);
    let outcome = controller.post(store, &mut table, &label)?;
    writeln!(
        out,
        "Posted {} ({} instances, {} links) as record {}",
        outcome.handle,
        outcome.uids.len(),
        outcome.links.len(),
        outcome.record.id
    )?;
    Ok(())
}

fn show(store: &mut Store, args: &ArgMatches, out: &mut impl Write) -> anyhow::Result<()> {
    let identity = identity(args)?;
    let manifest = match args.get_one::<u32>("version") {
        Some(version) => store.retrieve_manifest(&identity.at_version(*version))?,
        None => store
            .latest_manifest(&identity)?
            .ok_or_else(|| anyhow!("{identity} has no versions"))?,
    };
    if args.get_flag("json") {
        writeln!(out, "{}", serde_json::to_string_pretty(&manifest)?)?;
    } else {
        write!(out, "{}", manifest.to_yaml()?)?;
    }
    Ok(())
}

fn environment(store: &mut Store, args: &ArgMatches, out: &mut impl Write) -> anyhow::Result<()> {
    match args.subcommand() {
        Some(("create", sub)) => {
            let name = required(sub, "name")?;
            let read_misses = if sub.get_flag("isolated") {
                ReadMissPolicy::FailOnReadMisses
            } else {
                ReadMissPolicy::FailoverToParent
            };
            store.create_environment(name, EnvironmentConfig { read_misses })?;
            writeln!(out, "Created {}/{}", store.environment_path().join("/"), name)?;
        }
        Some(("list", _)) => {
            for name in store.environments()? {
                writeln!(out, "{name}")?;
            }
        }
        Some(("remove", sub)) => {
            let name = required(sub, "name")?;
            store.remove_environment(name)?;
            writeln!(out, "Removed {name}")?;
        }
        _ => bail!("unknown env command"),
    }
    Ok(())
}
