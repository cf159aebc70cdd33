/*
cargo run --bin preprocess_data -- \
    --input conversations.json \
    --out-dir processed_data \
    --base-conversations 500

cargo run --bin preprocess_data -- --input conversations.json --seed 42
*/

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use convo_sampler::pipeline;
use convo_sampler::sampling;
use convo_sampler::store;

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Sample and flatten tutoring conversations")]
struct Cli {
    // Source JSON file holding an array of conversation objects
    #[arg(long, default_value = "conversations.json")]
    input: PathBuf,

    #[arg(long = "out-dir", default_value = "processed_data")]
    out_dir: PathBuf,

    // Target size of the stratified sample, split evenly between the
    // with-concepts and without-concepts strata. The most popular
    // assignment is included in full on top of this.
    #[arg(long, default_value_t = 500)]
    base_conversations: usize,

    // Sampling seed for reproducible runs (entropy-seeded when omitted)
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging setup
    create_dir_all(&cli.log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = cli.log_dir.join(format!("preprocess_data_{ts}.log"));
    simplelog::WriteLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        File::create(&log_path)?,
    )?;
    info!("Starting conversation preprocessing");
    info!("Input file: {:?}", cli.input);
    info!("Base conversations: {}", cli.base_conversations);

    let conversations = store::load_conversations(&cli.input)?;
    info!("Loaded {} conversations", conversations.len());

    let mut rng = match cli.seed {
        Some(seed) => {
            info!("Sampling with seed {seed}");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let selection =
        sampling::select_conversations(conversations, cli.base_conversations, &mut rng)?;
    info!(
        "Found {} conversations with concepts, {} without",
        selection.pool_with_concepts, selection.pool_without_concepts
    );
    info!(
        "Most popular assignment {} has {} conversations",
        selection.popular_assignment_id,
        selection.popular.len()
    );
    info!(
        "Sampled {} with concepts, {} without, total selected {}",
        selection.with_concepts.len(),
        selection.without_concepts.len(),
        selection.total()
    );

    let sampled_with = selection.with_concepts.len();
    let sampled_without = selection.without_concepts.len();
    let pool_with = selection.pool_with_concepts;
    let pool_without = selection.pool_without_concepts;
    let popular_count = selection.popular.len();
    let popular_id = selection.popular_assignment_id.clone();

    let bar = ProgressBar::new(selection.total() as u64);
    bar.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap());
    let artifacts = pipeline::build_artifacts(
        &popular_id,
        selection
            .into_selected()
            .into_iter()
            .inspect(|_| bar.inc(1)),
    );
    bar.finish();

    let paths = store::write_artifacts(&cli.out_dir, &artifacts)?;
    info!(
        "Wrote {} summary rows -> {:?}",
        artifacts.summary.len(),
        paths.summary
    );

    let popular_meta = artifacts.popular.conversations.values().next();
    println!("\n=== Preprocess summary ===");
    println!(
        "Popular assignment       : {} ({})",
        artifacts
            .popular
            .assignment_name
            .as_deref()
            .unwrap_or("(untitled)"),
        artifacts.popular.assignment_id
    );
    if let Some(conv) = popular_meta {
        println!(
            "  type / subject / grade : {} / {} / {}",
            conv.assignment.assignment_type.as_deref().unwrap_or("-"),
            conv.assignment.subject.as_deref().unwrap_or("-"),
            conv.assignment.grade.as_deref().unwrap_or("-")
        );
    }
    println!("Sampled with concepts    : {sampled_with} (pool {pool_with})");
    println!("Sampled without concepts : {sampled_without} (pool {pool_without})");
    println!("Popular conversations    : {popular_count}");
    println!("Total selected           : {}", artifacts.summary.len());
    println!("{}", size_line(&paths.summary)?);
    println!("{}", size_line(&paths.raw)?);
    println!("{}", size_line(&paths.popular)?);
    println!("Log file                 : {:?}", log_path);

    Ok(())
}

fn size_line(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let size = std::fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();
    Ok(format!("{name:<24} : {:.1} KB", size as f64 / 1024.0))
}
