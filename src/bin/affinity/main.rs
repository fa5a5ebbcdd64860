//! Binary entry point for the `affinity` recommendation CLI.
#![forbid(unsafe_code)]

mod ui;

use std::error::Error;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;

use affinity::{
    cli::{run_export, run_import, CliError, ExportConfig, ImportConfig, ImportMode},
    config::{default_config_path, AppConfig, CONFIG_ENV},
    dashboard::{self, DashboardOptions},
    data_generator::{demo_ratings, DataGenerator, SyntheticOptions},
    engine::{Recommender, TrainingReport},
    telemetry::install_tracing_subscriber,
    BusinessAction, ItemId, Recommendation, SqliteRatingsStore, StrategyEngine,
};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;

use crate::ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "affinity",
    version,
    about = "Item-item recommendations over a SQLite ratings table",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = CONFIG_ENV,
        help = "Config file (defaults to the platform config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "DB",
        help = "Ratings database; overrides config and AFFINITY_DB_PATH"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, help = "Plain output without icons or spinners")]
    quiet: bool,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(value_name = "CSV")]
    path: PathBuf,

    #[arg(long, default_value = "user_id", help = "User id column name")]
    user_column: String,

    #[arg(long, default_value = "item_id", help = "Item id column name")]
    item_column: String,

    #[arg(long, default_value = "rating", help = "Rating column name")]
    rating_column: String,

    #[arg(long, help = "Keep existing ratings instead of replacing the table")]
    append: bool,

    #[arg(long, help = "Skip rows that fail validation instead of aborting")]
    skip_invalid: bool,
}

#[derive(Args, Debug)]
struct QueryCmd {
    #[arg(value_name = "ITEM")]
    item_id: ItemId,

    #[arg(long, value_name = "N", help = "Number of recommendations (config default: 3)")]
    top_n: Option<usize>,
}

#[derive(Args, Debug)]
struct StrategyCmd {
    #[command(flatten)]
    query: QueryCmd,

    #[arg(long, value_name = "SCORE", help = "Lower bound of the bundle tier")]
    threshold: Option<f64>,
}

#[derive(Args, Debug)]
struct SeedDemoCmd {
    #[arg(long, help = "Generate a clustered synthetic dataset instead of the demo set")]
    synthetic: bool,

    #[arg(long, default_value_t = 50, requires = "synthetic")]
    users: usize,

    #[arg(long, default_value_t = 20, requires = "synthetic")]
    items: usize,

    #[arg(long, default_value_t = 0.3, requires = "synthetic")]
    density: f64,

    #[arg(long, default_value_t = 4, requires = "synthetic")]
    clusters: usize,

    #[arg(long, default_value_t = 42, requires = "synthetic")]
    seed: u64,
}

#[derive(Args, Debug)]
struct DashboardCmd {
    #[arg(long, value_name = "HOST", help = "Bind address host")]
    host: Option<IpAddr>,

    #[arg(long, value_name = "PORT", help = "Bind port")]
    port: Option<u16>,

    #[arg(long, help = "Page title")]
    title: Option<String>,

    #[arg(
        long = "allow-origin",
        value_name = "ORIGIN",
        action = ArgAction::Append,
        help = "Additional CORS origin to allow (repeatable)"
    )]
    allow_origins: Vec<String>,

    #[arg(long, help = "Wait for POST /api/train instead of training at start-up")]
    no_train: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    #[command(about = "Print the resolved configuration")]
    Show,
    #[command(about = "Write the resolved configuration to the config file")]
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Load ratings from a CSV file")]
    Import(ImportCmd),

    #[command(about = "Write the ratings table to a CSV file")]
    Export {
        #[arg(value_name = "CSV")]
        out: PathBuf,
    },

    #[command(about = "Interaction count and average rating per item")]
    Metrics,

    #[command(about = "Train the similarity matrix and report the run")]
    Train,

    #[command(about = "Items most similar to ITEM")]
    Recommend(QueryCmd),

    #[command(about = "Business actions for the items most similar to ITEM")]
    Strategy(StrategyCmd),

    #[command(about = "Populate the ratings table with demo data")]
    SeedDemo(SeedDemoCmd),

    #[command(about = "Serve the web dashboard")]
    Dashboard(DashboardCmd),

    #[command(subcommand, about = "Inspect or write the config file")]
    Config(ConfigCmd),

    #[command(about = "Print shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RecommendOutput {
    item_id: ItemId,
    training: TrainingReport,
    recommendations: Vec<Recommendation>,
}

#[derive(Serialize)]
struct StrategyEntry {
    recommendation: Recommendation,
    action: BusinessAction,
}

#[derive(Serialize)]
struct StrategyOutput {
    item_id: ItemId,
    threshold: f64,
    actions: Vec<StrategyEntry>,
}

#[derive(Serialize)]
struct SeedOutput {
    db_path: PathBuf,
    ratings: usize,
    synthetic: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let directive = match cli.command {
        Command::Dashboard(_) => "info",
        _ => "warn",
    };
    install_tracing_subscriber(directive);

    let ui = Ui::new(cli.theme, cli.quiet || cli.format == OutputFormat::Json);
    let config = AppConfig::load(cli.config.clone())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());

    match cli.command {
        Command::Import(cmd) => {
            let store = SqliteRatingsStore::create(&db_path)?;
            let import_cfg = ImportConfig {
                user_column: cmd.user_column,
                item_column: cmd.item_column,
                rating_column: cmd.rating_column,
                mode: if cmd.append {
                    ImportMode::Append
                } else {
                    ImportMode::Replace
                },
                skip_invalid: cmd.skip_invalid,
                ..ImportConfig::new(cmd.path)
            };
            let summary = run_import(&import_cfg, &store).map_err(into_boxed_error)?;
            emit(cli.format, &summary, || {
                ui.success(&format!(
                    "Imported {} ratings into {} ({} read, {} skipped)",
                    summary.rows_imported,
                    db_path.display(),
                    summary.rows_read,
                    summary.rows_skipped
                ));
            })?;
        }
        Command::Export { out } => {
            let store = SqliteRatingsStore::new(&db_path);
            let summary = run_export(&ExportConfig { out: out.clone() }, &store)
                .map_err(into_boxed_error)?;
            emit(cli.format, &summary, || {
                ui.success(&format!(
                    "Exported {} ratings to {}",
                    summary.rows_exported,
                    out.display()
                ));
            })?;
        }
        Command::Metrics => {
            let metrics = SqliteRatingsStore::new(&db_path).performance_metrics()?;
            emit(cli.format, &metrics, || {
                let rows: Vec<Vec<String>> = metrics
                    .iter()
                    .map(|m| {
                        vec![
                            m.item_id.to_string(),
                            m.total_interactions.to_string(),
                            format!("{:.2}", m.avg_score),
                        ]
                    })
                    .collect();
                ui.table(
                    "Business Performance Metrics",
                    &["item", "interactions", "avg score"],
                    &rows,
                );
            })?;
        }
        Command::Train => {
            let recommender = Recommender::new(SqliteRatingsStore::new(&db_path));
            let report = train(&ui, &recommender)?;
            emit(cli.format, &report, || print_report(&ui, &report))?;
        }
        Command::Recommend(cmd) => {
            let top_n = cmd.top_n.unwrap_or(config.recommend.top_n);
            let recommender = Recommender::new(SqliteRatingsStore::new(&db_path));
            let training = train(&ui, &recommender)?;
            let output = RecommendOutput {
                item_id: cmd.item_id,
                recommendations: recommender.recommend(cmd.item_id, top_n),
                training,
            };
            emit(cli.format, &output, || print_recommendations(&ui, &output))?;
        }
        Command::Strategy(cmd) => {
            let threshold = cmd.threshold.unwrap_or(config.strategy.threshold);
            let strategy = StrategyEngine::new(threshold)?;
            let top_n = cmd.query.top_n.unwrap_or(config.recommend.top_n);
            let recommender = Recommender::new(SqliteRatingsStore::new(&db_path));
            train(&ui, &recommender)?;
            let actions = recommender
                .recommend(cmd.query.item_id, top_n)
                .into_iter()
                .map(|recommendation| StrategyEntry {
                    action: strategy.prescribe(recommendation.item_id, recommendation.score),
                    recommendation,
                })
                .collect();
            let output = StrategyOutput {
                item_id: cmd.query.item_id,
                threshold: strategy.threshold(),
                actions,
            };
            emit(cli.format, &output, || print_strategy(&ui, &output))?;
        }
        Command::SeedDemo(cmd) => {
            let ratings = if cmd.synthetic {
                DataGenerator::new(SyntheticOptions {
                    users: cmd.users,
                    items: cmd.items,
                    density: cmd.density,
                    clusters: cmd.clusters,
                    seed: cmd.seed,
                })?
                .generate_ratings()?
            } else {
                demo_ratings()
            };
            let store = SqliteRatingsStore::create(&db_path)?;
            let written = store.replace_ratings(&ratings)?;
            let output = SeedOutput {
                db_path: db_path.clone(),
                ratings: written,
                synthetic: cmd.synthetic,
            };
            emit(cli.format, &output, || {
                ui.success(&format!(
                    "Seeded {} ratings into {}",
                    output.ratings,
                    output.db_path.display()
                ));
            })?;
        }
        Command::Dashboard(cmd) => {
            let options = DashboardOptions {
                db_path,
                title: cmd.title.unwrap_or(config.dashboard.title),
                host: cmd.host.unwrap_or(config.dashboard.host),
                port: cmd.port.unwrap_or(config.dashboard.port),
                default_top_n: config.recommend.top_n,
                strategy_threshold: config.strategy.threshold,
                allow_origins: cmd.allow_origins,
                train_on_start: !cmd.no_train,
            };
            ui.info(&format!(
                "Serving {} on http://{}:{}",
                options.db_path.display(),
                options.host,
                options.port
            ));
            dashboard::serve(options).await?;
        }
        Command::Config(ConfigCmd::Show) => {
            let mut resolved = config.clone();
            resolved.database.path = db_path;
            let rendered = resolved.to_toml()?;
            emit(cli.format, &resolved, || print!("{rendered}"))?;
        }
        Command::Config(ConfigCmd::Init { force }) => {
            let target = cli
                .config
                .clone()
                .or_else(default_config_path)
                .ok_or_else(|| CliError::from("no config directory found; pass --config"))?;
            if target.exists() && !force {
                return Err(CliError::Message(format!(
                    "{} already exists; pass --force to overwrite",
                    target.display()
                ))
                .into());
            }
            let written = config.persist(Some(&target))?;
            emit(cli.format, &serde_json::json!({ "path": &written }), || {
                ui.success(&format!("Wrote {}", written.display()));
            })?;
        }
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "affinity", &mut io::stdout());
        }
    }

    Ok(())
}

fn train(
    ui: &Ui,
    recommender: &Recommender<SqliteRatingsStore>,
) -> Result<TrainingReport, Box<dyn Error>> {
    let task = ui.task("Training similarity matrix");
    let report = recommender.try_train()?;
    task.finish();
    Ok(report)
}

fn print_report(ui: &Ui, report: &TrainingReport) {
    let duration = std::time::Duration::from_secs_f64(report.duration_ms / 1_000.0);
    ui.success("Model trained");
    ui.section(
        "Training run",
        [
            ("ratings", report.ratings.to_string()),
            ("users", report.users.to_string()),
            ("items", report.items.to_string()),
            ("duration", format_duration(duration)),
        ],
    );
}

fn print_recommendations(ui: &Ui, output: &RecommendOutput) {
    if output.recommendations.is_empty() {
        ui.warn(&format!(
            "No similar items found for item {}",
            output.item_id
        ));
        return;
    }
    let rows: Vec<Vec<String>> = output
        .recommendations
        .iter()
        .map(|rec| vec![rec.item_id.to_string(), format!("{:.4}", rec.score)])
        .collect();
    ui.table(
        &format!("Items similar to {}", output.item_id),
        &["item", "score"],
        &rows,
    );
}

fn print_strategy(ui: &Ui, output: &StrategyOutput) {
    if output.actions.is_empty() {
        ui.warn(&format!(
            "Could not generate strategy: no similar items found for item {}",
            output.item_id
        ));
        return;
    }
    for entry in &output.actions {
        let confidence = format!("{:.2}%", entry.recommendation.score * 100.0);
        ui.section(
            &format!("Strategy for item {}", entry.action.item_id),
            [
                ("confidence", confidence),
                ("category", entry.action.category.to_string()),
                ("plan", entry.action.action_plan.clone()),
                ("priority", entry.action.priority.to_string()),
            ],
        );
    }
}

fn into_boxed_error(err: CliError) -> Box<dyn Error> {
    Box::new(err)
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
