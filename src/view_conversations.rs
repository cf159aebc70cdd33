/*
cargo run --bin view_conversations -- --data-dir processed_data
cargo run --bin view_conversations -- --filter teacher-selected --list
cargo run --bin view_conversations -- --conversation 64f0c2a1 --filter all
*/

use anyhow::{Context, Result};
use clap::Parser;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use convo_sampler::render::{self, ConceptFilter};
use convo_sampler::schema::SummaryRow;
use convo_sampler::store::DataStore;

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Browse preprocessed tutoring conversations")]
struct Cli {
    // Directory holding the preprocessing artifacts
    #[arg(long, default_value = "processed_data")]
    data_dir: PathBuf,

    // Concept filter applied to the conversation picker
    #[arg(long, value_enum, default_value = "all")]
    filter: ConceptFilter,

    // Render one conversation and exit
    #[arg(long)]
    conversation: Option<String>,

    // Print the filtered picker list and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    TermLogger::init(
        LevelFilter::Warn,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    // One load per session; everything after this is read-only.
    let store = DataStore::open(&cli.data_dir)?;
    let rows = render::filter_rows(store.rows(), cli.filter);
    println!("Filtered conversations: {}", rows.len());

    if let Some(id) = cli.conversation.as_deref() {
        let row = rows
            .iter()
            .copied()
            .find(|r| r.conversation_id == id)
            .with_context(|| format!("conversation {id} is not in the current filter"))?;
        show(&store, row);
        return Ok(());
    }

    if cli.list {
        print_picker(&rows);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No conversations match this filter.");
        return Ok(());
    }

    // selection loop: each line picks a conversation, q quits
    let stdin = io::stdin();
    loop {
        println!();
        print_picker(&rows);
        print!("Select a conversation (number or id, q to quit): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }
        if input.is_empty() {
            println!("Please select a conversation to view.");
            continue;
        }

        let row = match input.parse::<usize>() {
            Ok(n) if (1..=rows.len()).contains(&n) => rows[n - 1],
            _ => match rows.iter().copied().find(|r| r.conversation_id == input) {
                Some(row) => row,
                None => {
                    println!("No conversation {input} in the current filter.");
                    continue;
                }
            },
        };
        show(&store, row);
    }

    Ok(())
}

fn print_picker(rows: &[&SummaryRow]) {
    for (index, row) in rows.iter().enumerate() {
        println!("{:>4}. {}", index + 1, render::picker_label(row));
    }
}

fn show(store: &DataStore, row: &SummaryRow) {
    match store.conversation(&row.conversation_id) {
        Some(conv) => print!("{}", render::render_conversation(row, conv)),
        // summary and lookup are written together, so this only happens
        // with hand-edited artifacts
        None => println!(
            "Raw record missing for conversation {}; re-run preprocess_data.",
            row.conversation_id
        ),
    }
}
