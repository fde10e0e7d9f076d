use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use exclusion_kernel_core::{
    filter_candidates, parse, partition_candidates, CandidateReroller, ClockKey, ExclusionSettings,
    Feature, ManualClock, Resolver, DEFAULT_ASSET_NAME,
};
use exclusion_kernel_store_file::AssetDirectory;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const DEFAULT_DAY: u32 = 1;
const DEFAULT_TIME_OF_DAY: u32 = 600;

#[derive(Debug, Parser)]
#[command(name = "xk")]
#[command(about = "Exclusion Kernel CLI")]
struct Cli {
    #[arg(long, default_value = "./content")]
    content_root: PathBuf,

    #[arg(long, default_value = DEFAULT_ASSET_NAME)]
    asset: String,

    /// Simulated day. Omit together with --time to query without an active world.
    #[arg(long)]
    day: Option<u32>,

    /// Simulated time of day, e.g. 1330.
    #[arg(long)]
    time: Option<u32>,

    /// Emit trace-level exclusion logs on stderr.
    #[arg(long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Parse(ParseArgs),
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },
    Filter(FilterArgs),
    Reroll(RerollArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[arg(long)]
    text: String,
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    List,
    Show(ShowArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[arg(long)]
    actor: String,
}

#[derive(Debug, Subcommand)]
enum QueryCommand {
    Check(CheckArgs),
    Excluded(ExcludedArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long)]
    actor: String,
    #[arg(long, value_parser = parse_feature)]
    feature: Feature,
}

#[derive(Debug, Args)]
struct ExcludedArgs {
    #[arg(long, value_parser = parse_feature)]
    feature: Feature,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long, value_parser = parse_feature)]
    feature: Feature,
    #[arg(long = "candidate")]
    candidates: Vec<String>,
}

#[derive(Debug, Args)]
struct RerollArgs {
    #[arg(long, value_parser = parse_feature)]
    feature: Feature,
    #[arg(long = "pool", required = true)]
    pool: Vec<String>,
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_feature(value: &str) -> Result<Feature, String> {
    Feature::parse(value).ok_or_else(|| {
        let known = Feature::ALL.iter().map(|feature| feature.as_str()).collect::<Vec<_>>();
        format!("unknown feature `{value}` (expected one of: {})", known.join(", "))
    })
}

fn with_contract_version(value: Value) -> Result<Value> {
    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format generated_at timestamp")?;
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            let mut object = serde_json::Map::new();
            object.insert("payload".to_string(), other);
            object
        }
    };
    object.insert(
        "contract_version".to_string(),
        Value::String(CLI_CONTRACT_VERSION.to_string()),
    );
    object.insert("generated_at".to_string(), Value::String(generated_at));
    Ok(Value::Object(object))
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value)?)?);
    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let fallback = if verbose { "exclusions=trace,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .context("failed to build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))
}

/// Resolver over the content root plus a handle on the directory for
/// provenance lookups.
struct Session {
    directory: Rc<AssetDirectory>,
    resolver: Resolver,
    clock: Option<ClockKey>,
}

impl Session {
    fn open(cli: &Cli) -> Self {
        let key = match (cli.day, cli.time) {
            (None, None) => None,
            (day, time) => Some(ClockKey::new(
                day.unwrap_or(DEFAULT_DAY),
                time.unwrap_or(DEFAULT_TIME_OF_DAY),
            )),
        };
        let clock = key.map_or_else(ManualClock::inactive, |key| {
            ManualClock::at(key.day, key.time_of_day)
        });
        tracing::debug!(
            target: "exclusions",
            root = %cli.content_root.display(),
            asset = %cli.asset,
            day = ?cli.day,
            time = ?cli.time,
            "opening content root"
        );
        let settings = ExclusionSettings { asset_name: cli.asset.clone() };
        let directory = Rc::new(AssetDirectory::new(&cli.content_root));
        let resolver = Resolver::with_settings(Rc::clone(&directory), clock, &settings);
        Self { directory, resolver, clock: key }
    }

    fn source(&self) -> Result<Value> {
        let info = self.directory.info(self.resolver.asset_name());
        serde_json::to_value(info).context("failed to serialize asset provenance")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match &cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Rules { command } => run_rules(command, &Session::open(&cli)),
        Command::Query { command } => run_query(command, &Session::open(&cli)),
        Command::Filter(args) => run_filter(args, &Session::open(&cli)),
        Command::Reroll(args) => run_reroll(args, &Session::open(&cli)),
    }
}

fn run_parse(args: &ParseArgs) -> Result<()> {
    let tokens = parse(&args.text);
    emit_json(serde_json::json!({
        "text": args.text,
        "tokens": tokens,
    }))
}

fn run_rules(command: &RulesCommand, session: &Session) -> Result<()> {
    let rules = session.resolver.snapshot();
    match command {
        RulesCommand::List => {
            let actors = rules
                .actors()
                .map(|actor| serde_json::json!({ "actor": actor.name, "tokens": actor.tokens }))
                .collect::<Vec<_>>();
            emit_json(serde_json::json!({
                "asset": session.resolver.asset_name(),
                "source": session.source()?,
                "actors": actors,
                "shadowed": rules.shadowed(),
            }))
        }
        RulesCommand::Show(args) => {
            let actor = rules.get(&args.actor);
            emit_json(serde_json::json!({
                "actor": args.actor,
                "configured": actor.is_some(),
                "configured_name": actor.map(|actor| actor.name.as_str()),
                "tokens": actor.map(|actor| actor.tokens.as_slice()).unwrap_or_default(),
            }))
        }
    }
}

fn run_query(command: &QueryCommand, session: &Session) -> Result<()> {
    match command {
        QueryCommand::Check(args) => {
            let scope = args.feature.scope();
            let rules = session.resolver.snapshot();
            let matched = rules.get(&args.actor).and_then(|actor| actor.matching_token(scope));
            emit_json(serde_json::json!({
                "actor": args.actor,
                "scope": scope,
                "clock": session.clock,
                "excluded": matched.is_some(),
                "matched_token": matched,
            }))
        }
        QueryCommand::Excluded(args) => {
            let scope = args.feature.scope();
            let excluded = session.resolver.all_excluded(scope);
            emit_json(serde_json::json!({
                "scope": scope,
                "excluded": excluded,
            }))
        }
    }
}

fn run_filter(args: &FilterArgs, session: &Session) -> Result<()> {
    let scope = args.feature.scope();
    let partition = partition_candidates(&session.resolver, &args.candidates, scope);
    emit_json(serde_json::json!({
        "scope": scope,
        "kept": partition.kept,
        "excluded": partition.excluded,
    }))
}

fn run_reroll(args: &RerollArgs, session: &Session) -> Result<()> {
    let scope = args.feature.scope();
    if filter_candidates(&session.resolver, &args.pool, scope).is_empty() {
        bail!("no pool member is eligible for {scope}");
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let reroller = CandidateReroller::new();
    let selected = reroller
        .select_valid(&session.resolver, scope, || args.pool.choose(&mut rng).cloned())
        .ok_or_else(|| anyhow!("selection for {scope} came back empty"))?;

    emit_json(serde_json::json!({
        "scope": scope,
        "selected": selected,
        "discarded": reroller.last_discarded(),
        "seed": args.seed,
    }))
}
