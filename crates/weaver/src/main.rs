use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weaver_core::config::{WeaverConfig, load_config};
use weaver_core::export::write_json;
use weaver_core::fetch::{
    ContentSource, FetchOutcome, GitSparseCheckout, LocalTree, remove_checkout,
};
use weaver_core::model::Catalog;
use weaver_core::pipeline::{ParseOptions, parse_tree};
use weaver_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_layout, resolve_paths,
};
use weaver_core::store::{
    CatalogStats, LoadReport, PAGE_SIZE, SpellQuery, catalog_stats, create_schema, get_spell,
    get_spell_by_slug, load_all, open_connection, parse_non_negative_integer,
    parse_positive_integer, rebuild_all, schema_exists,
    search_spells,
};

#[derive(Debug, Parser)]
#[command(
    name = "weaver",
    version,
    about = "Build the bilingual spell catalog from the SRD markdown sources"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "SQLite catalog path")]
    database: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[arg(short, long, global = true, help = "Log at debug level")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    database: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            data_dir: cli.data_dir.clone(),
            config: cli.config.clone(),
            database: cli.database.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create .weaver/ and a starter config.toml")]
    Init(InitArgs),
    #[command(about = "Sparse-checkout the spell and class sources")]
    Fetch(FetchArgs),
    #[command(about = "Parse the sources and write classes.json and spells.json")]
    Parse(ParseArgs),
    #[command(about = "Fetch, parse, recreate the schema and load the catalog")]
    Build(BuildArgs),
    Db(DbArgs),
    #[command(about = "Show one stored spell by id or slug")]
    Spell(SpellArgs),
    #[command(about = "Search stored spells by title, class and level")]
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config.toml")]
    force: bool,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[arg(long, help = "Remove the existing checkout before fetching")]
    refresh: bool,
}

#[derive(Debug, Args, Clone)]
struct SourceArgs {
    #[arg(
        long,
        value_name = "DIR",
        help = "Use an existing content tree instead of the git checkout"
    )]
    source_dir: Option<PathBuf>,
    #[arg(long, help = "Warn instead of failing on classes without a class file")]
    allow_unlocalized_classes: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[arg(long, value_name = "DIR", help = "Directory for the JSON output")]
    out: Option<PathBuf>,
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long, help = "Remove the git checkout after a successful load")]
    clean: bool,
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    #[command(about = "Drop and recreate the catalog tables")]
    Schema,
    #[command(about = "Parse and load into the existing schema")]
    Load(SourceArgs),
    Stats,
}

#[derive(Debug, Args)]
struct SpellArgs {
    #[arg(value_name = "ID|SLUG")]
    target: String,
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: Option<String>,
    #[arg(long, value_name = "NAME")]
    class: Option<String>,
    #[arg(long, value_name = "N")]
    level: Option<String>,
    #[arg(long, value_name = "N")]
    page: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Fetch(args)) => run_fetch(&runtime, args),
        Some(Commands::Parse(args)) => run_parse(&runtime, args),
        Some(Commands::Build(args)) => run_build(&runtime, args),
        Some(Commands::Db(DbArgs { command })) => match command {
            DbSubcommand::Schema => run_db_schema(&runtime),
            DbSubcommand::Load(args) => run_db_load(&runtime, args),
            DbSubcommand::Stats => run_db_stats(&runtime),
        },
        Some(Commands::Spell(args)) => run_spell(&runtime, &args.target),
        Some(Commands::Search(args)) => run_search(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let (paths, _) = resolve_runtime(runtime)?;
    let report = init_layout(&paths, args.force)?;

    println!("Initialized weaver runtime layout");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!("state_dir: {}", normalize_path(&paths.state_dir));
    println!("data_dir: {}", normalize_path(&paths.data_dir));
    println!("config_path: {}", normalize_path(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", format_flag(report.wrote_config));
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_fetch(runtime: &RuntimeOptions, args: FetchArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let removed = if args.refresh {
        remove_checkout(&paths.source_dir)?
    } else {
        false
    };
    let outcome = git_checkout(&config).fetch(&paths.source_dir)?;

    println!("fetch");
    println!("repo_url: {}", config.repo_url());
    println!("source_dir: {}", normalize_path(&paths.source_dir));
    println!("removed_previous: {}", format_flag(removed));
    println!("outcome: {}", outcome.as_str());
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_parse(runtime: &RuntimeOptions, args: ParseArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let (root, outcome) = acquire_source(&paths, &config, &args.source)?;
    let catalog = parse_catalog(&root, &config, &args.source)?;
    let output_dir = args.out.unwrap_or_else(|| paths.output_dir.clone());
    let report = write_json(&output_dir, &catalog)?;

    println!("parse");
    println!("source_root: {}", normalize_path(&root));
    println!("source: {}", outcome.as_str());
    println!("classes: {}", report.classes);
    println!("spells: {}", report.spells);
    println!("classes_json: {}", normalize_path(&report.classes_path));
    println!("spells_json: {}", normalize_path(&report.spells_path));
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_build(runtime: &RuntimeOptions, args: BuildArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let (root, outcome) = acquire_source(&paths, &config, &args.source)?;
    let catalog = parse_catalog(&root, &config, &args.source)?;

    let mut connection = open_connection(&paths.db_path)?;
    let report = rebuild_all(&mut connection, &catalog.classes, &catalog.spells)?;

    let cleaned = if args.clean && args.source.source_dir.is_none() {
        remove_checkout(&paths.source_dir)?
    } else {
        false
    };

    println!("build");
    println!("source_root: {}", normalize_path(&root));
    println!("source: {}", outcome.as_str());
    println!("db_path: {}", normalize_path(&paths.db_path));
    print_load_report("loaded", &report);
    println!("removed_checkout: {}", format_flag(cleaned));
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_schema(runtime: &RuntimeOptions) -> Result<()> {
    let (paths, _) = resolve_runtime(runtime)?;
    let mut connection = open_connection(&paths.db_path)?;
    create_schema(&mut connection)?;

    println!("db schema");
    println!("db_path: {}", normalize_path(&paths.db_path));
    println!("schema: created");
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_load(runtime: &RuntimeOptions, args: SourceArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let mut connection = open_connection(&paths.db_path)?;
    if !schema_exists(&connection)? {
        bail!(
            "catalog schema is missing in {}\nRun: weaver db schema",
            normalize_path(&paths.db_path)
        );
    }

    let (root, outcome) = acquire_source(&paths, &config, &args)?;
    let catalog = parse_catalog(&root, &config, &args)?;
    let report = load_all(&mut connection, &catalog.classes, &catalog.spells)?;

    println!("db load");
    println!("source_root: {}", normalize_path(&root));
    println!("source: {}", outcome.as_str());
    println!("db_path: {}", normalize_path(&paths.db_path));
    print_load_report("loaded", &report);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_db_stats(runtime: &RuntimeOptions) -> Result<()> {
    let (paths, _) = resolve_runtime(runtime)?;

    println!("db stats");
    println!("db_path: {}", normalize_path(&paths.db_path));
    let db_exists = paths.db_path.exists();
    println!("db_exists: {}", format_flag(db_exists));
    let stats = if db_exists {
        catalog_stats(&open_connection(&paths.db_path)?)?
    } else {
        None
    };
    match stats {
        Some(stats) => print_catalog_stats("catalog", &stats),
        None => println!("catalog.storage: <not built> (run `weaver build`)"),
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_spell(runtime: &RuntimeOptions, target: &str) -> Result<()> {
    let (paths, _) = resolve_runtime(runtime)?;
    let target = target.trim();
    if target.is_empty() {
        bail!("spell requires a non-empty id or slug");
    }
    let connection = open_built_catalog(&paths)?;

    let spell = match parse_positive_integer(target) {
        Some(id) => get_spell(&connection, i64::from(id))?,
        None => get_spell_by_slug(&connection, target)?,
    };
    match spell {
        Some(spell) => println!("{}", serde_json::to_string_pretty(&spell)?),
        None => bail!("spell not found: {target}"),
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_search(runtime: &RuntimeOptions, args: SearchArgs) -> Result<()> {
    let (paths, _) = resolve_runtime(runtime)?;
    let level = level_argument(args.level.as_deref())?;
    let page = page_argument(args.page.as_deref())?;
    let connection = open_built_catalog(&paths)?;

    let result = search_spells(
        &connection,
        &SpellQuery {
            text: args.query,
            class: args.class,
            level,
            page,
        },
    )?;
    info!(
        total = result.total_count,
        page = result.page_number,
        page_size = PAGE_SIZE,
        "search complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    print_diagnostics(runtime, &paths);
    Ok(())
}

/// Materialize the content tree: either a user-supplied directory or the
/// sparse git checkout under `.weaver/source`.
fn acquire_source(
    paths: &ResolvedPaths,
    config: &WeaverConfig,
    args: &SourceArgs,
) -> Result<(PathBuf, FetchOutcome)> {
    if let Some(dir) = args.source_dir.as_deref() {
        let outcome = LocalTree.fetch(dir)?;
        return Ok((dir.to_path_buf(), outcome));
    }
    let outcome = git_checkout(config).fetch(&paths.source_dir)?;
    Ok((paths.source_dir.clone(), outcome))
}

fn parse_catalog(root: &Path, config: &WeaverConfig, args: &SourceArgs) -> Result<Catalog> {
    let options = ParseOptions {
        require_localized_classes: !args.allow_unlocalized_classes,
    };
    Ok(parse_tree(root, &config.layout(), &options)?)
}

fn git_checkout(config: &WeaverConfig) -> GitSparseCheckout {
    GitSparseCheckout {
        git_binary: config.git_binary(),
        repo_url: config.repo_url(),
        subpaths: config.layout().subpaths(),
    }
}

fn open_built_catalog(paths: &ResolvedPaths) -> Result<Connection> {
    if !paths.db_path.exists() {
        bail!(
            "catalog database not found at {}\nRun: weaver build",
            normalize_path(&paths.db_path)
        );
    }
    let connection = open_connection(&paths.db_path)?;
    if !schema_exists(&connection)? {
        bail!(
            "catalog schema is missing in {}\nRun: weaver build",
            normalize_path(&paths.db_path)
        );
    }
    Ok(connection)
}

fn level_argument(value: Option<&str>) -> Result<Option<u32>> {
    match value {
        None => Ok(None),
        Some(raw) => match parse_non_negative_integer(raw) {
            Some(parsed) => Ok(Some(parsed)),
            None => bail!("--level must be a non-negative integer, got `{raw}`"),
        },
    }
}

fn page_argument(value: Option<&str>) -> Result<u32> {
    match value {
        None => Ok(1),
        Some(raw) => match parse_positive_integer(raw) {
            Some(parsed) => Ok(parsed),
            None => bail!("--page must be a positive integer, got `{raw}`"),
        },
    }
}

fn print_load_report(prefix: &str, report: &LoadReport) {
    println!("{prefix}.classes: {}", report.classes);
    println!("{prefix}.spells: {}", report.spells);
    println!("{prefix}.associations: {}", report.associations);
}

fn print_catalog_stats(prefix: &str, stats: &CatalogStats) {
    println!("{prefix}.classes: {}", stats.classes);
    println!("{prefix}.spells: {}", stats.spells);
    println!("{prefix}.associations: {}", stats.associations);
    println!("{prefix}.priced_materials: {}", stats.priced_materials);
    if stats.by_level.is_empty() {
        println!("{prefix}.by_level: <empty>");
    } else {
        for (level, count) in &stats.by_level {
            println!("{prefix}.level.{level}: {count}");
        }
    }
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn resolve_runtime(runtime: &RuntimeOptions) -> Result<(ResolvedPaths, WeaverConfig)> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        data_dir: runtime.data_dir.clone(),
        config: runtime.config.clone(),
        database: runtime.database.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    let mut paths = resolve_paths(&context, &overrides)?;
    let config = load_config(&paths.config_path)?;
    paths.apply_config(&config);
    Ok((paths, config))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
