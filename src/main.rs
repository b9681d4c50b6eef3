use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use cf_recommender::{
    config::PipelineConfig,
    logging,
    model::GbtRegressor,
    pipeline, recommend,
    source::CodeforcesClient,
    store::{self, FsStore},
    train::{self, BatchReport},
};

/// Predict a Codeforces user's rating and recommend problems around it.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON config file; CF_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Root directory for data/, processed/ and models/
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch users and write their processed feature/target tables
    Collect {
        #[arg(default_value = "user_handles.txt")]
        handles_file: String,
    },
    /// Train one model per user from processed tables
    TrainUsers {
        #[arg(default_value = "user_handles.txt")]
        handles_file: String,
    },
    /// Train the shared model over every processed table
    TrainGeneral,
    /// Recommend problems for a handle (prompts when omitted)
    Recommend {
        handle: Option<String>,

        /// Number of problems to list
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Model key in the store
        #[arg(long, default_value = store::GENERAL_MODEL_KEY)]
        model: String,
    },
}

fn read_handles(path: &str) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read handles from {}", path))?;
    Ok(pipeline::parse_handles(&text))
}

fn prompt_handle() -> Result<String> {
    print!("Enter Codeforces handle: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let handle = line.trim().to_string();
    if handle.is_empty() {
        bail!("no handle given");
    }
    Ok(handle)
}

fn print_report(what: &str, report: &BatchReport) {
    for (handle, err) in &report.failed {
        eprintln!("❌ {}: {}", handle, err);
    }
    println!(
        "{}: {} ok, {} failed",
        what,
        report.succeeded.len(),
        report.failed.len()
    );
}

async fn run_recommend(
    cfg: &PipelineConfig,
    store: &mut FsStore,
    handle: &str,
    model_key: &str,
) -> Result<()> {
    println!("📌 Generating recommendations for: {}", handle);
    let client = CodeforcesClient::new(&cfg.fetch)?;
    pipeline::fetch_user(&client, store, handle).await?;
    let records = pipeline::cached_submissions(&*store, handle)?;

    let model: GbtRegressor = store::load_estimator(&*store, model_key)
        .with_context(|| format!("failed to load model {}", model_key))?;
    let catalog = client.catalog().await.context("failed to fetch problemset")?;
    tracing::info!("loaded {} problems from the catalog", catalog.len());

    let shortlist = recommend::recommend_for_records(
        handle,
        &model,
        &records,
        &catalog,
        &cfg.features,
        &cfg.recommend,
    )?;
    println!("🔮 Predicted rating: {}", shortlist.predicted_rating);

    if shortlist.problems.is_empty() {
        println!("No unsolved problems within ±{} of the prediction.", cfg.recommend.window);
        return Ok(());
    }
    println!("\n🧠 Recommended Problems:");
    for (i, p) in shortlist.problems.iter().enumerate() {
        println!("{}. [{}] - {} ({})", i + 1, p.name, p.rating, p.tags.join(", "));
        println!("   🔗 {}", p.id.url());
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let mut cfg = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir.into();
    }
    tracing::debug!("loaded config: {:?}", cfg);
    let mut store = FsStore::new(&cfg.data_dir);

    match cli.command {
        Commands::Collect { handles_file } => {
            let handles = read_handles(&handles_file)?;
            let client = CodeforcesClient::new(&cfg.fetch)?;
            let report = pipeline::collect(&client, &mut store, &handles, &cfg).await;
            print_report("collect", &report);
        }
        Commands::TrainUsers { handles_file } => {
            let handles = read_handles(&handles_file)?;
            let report = train::train_batch(&mut store, &handles, &cfg.train.model);
            print_report("train-users", &report);
        }
        Commands::TrainGeneral => {
            let rows = train::train_and_save_general(&mut store, &cfg.train)?;
            println!(
                "✅ General model trained on {} rows and saved to {}",
                rows,
                store.root().join(store::GENERAL_MODEL_KEY).display()
            );
        }
        Commands::Recommend { handle, top_n, model } => {
            let handle = match handle {
                Some(h) => h,
                None => prompt_handle()?,
            };
            if let Some(n) = top_n {
                cfg.recommend.top_n = n;
            }
            run_recommend(&cfg, &mut store, &handle, &model).await?;
        }
    }
    Ok(())
}
