use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;
use regex::Regex;

use crate::pipeline::Artifacts;
use crate::schema::{Conversation, PopularExtract, SummaryRow};

pub const SUMMARY_FILE: &str = "conversations.csv";
pub const RAW_FILE: &str = "raw_conversations.json";
pub const POPULAR_FILE: &str = "popular_assignment.json";

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub summary: PathBuf,
    pub raw: PathBuf,
    pub popular: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path) -> Self {
        ArtifactPaths {
            summary: dir.join(SUMMARY_FILE),
            raw: dir.join(RAW_FILE),
            popular: dir.join(POPULAR_FILE),
        }
    }
}

/// Loads the source array. A parse failure gets one repair attempt that
/// strips trailing commas before `]`/`}`; if that fails too the run aborts
/// before anything is written.
pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read source file {}", path.display()))?;

    match serde_json::from_str(&raw) {
        Ok(conversations) => Ok(conversations),
        Err(parse_err) => {
            warn!("source JSON malformed ({parse_err}), stripping trailing commas and retrying");
            let repaired = strip_trailing_commas(&raw)?;
            serde_json::from_str(&repaired).with_context(|| {
                format!(
                    "unable to repair source JSON {} (first error: {parse_err})",
                    path.display()
                )
            })
        }
    }
}

fn strip_trailing_commas(raw: &str) -> Result<String> {
    let trailing = Regex::new(r",\s*([\]}])")?;
    Ok(trailing.replace_all(raw, "$1").into_owned())
}

/// Writes all three artifacts, or none: everything is serialized up front
/// and a failed write removes the files this run already produced.
pub fn write_artifacts(dir: &Path, artifacts: &Artifacts) -> Result<ArtifactPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    let paths = ArtifactPaths::new(dir);

    let summary_bytes = encode_summary(&artifacts.summary)?;
    let raw_bytes = serde_json::to_vec(&artifacts.raw).context("serializing raw lookup")?;
    let popular_bytes =
        serde_json::to_vec(&artifacts.popular).context("serializing popular extract")?;

    let files = [
        (&paths.summary, summary_bytes),
        (&paths.raw, raw_bytes),
        (&paths.popular, popular_bytes),
    ];
    for (written, (path, bytes)) in files.iter().enumerate() {
        if let Err(err) = fs::write(path, bytes) {
            for (cleanup, _) in &files[..written] {
                let _ = fs::remove_file(cleanup);
            }
            return Err(err).with_context(|| format!("cannot write {}", path.display()));
        }
    }

    Ok(paths)
}

fn encode_summary(rows: &[SummaryRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flushing summary CSV: {err}"))
}

pub fn read_popular_extract(dir: &Path) -> Result<PopularExtract> {
    let path = ArtifactPaths::new(dir).popular;
    let file =
        File::open(&path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("malformed popular extract {}", path.display()))
}

/// Read-only handle over the two viewer inputs, loaded once at startup and
/// then only borrowed.
#[derive(Debug)]
pub struct DataStore {
    summary: Vec<SummaryRow>,
    raw: BTreeMap<String, Conversation>,
}

impl DataStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let paths = ArtifactPaths::new(dir);
        if !paths.summary.exists() || !paths.raw.exists() {
            bail!(
                "Preprocessed data not found in {}. Run preprocess_data first.",
                dir.display()
            );
        }

        let mut reader = csv::Reader::from_path(&paths.summary)
            .with_context(|| format!("cannot open {}", paths.summary.display()))?;
        let mut summary = Vec::new();
        for row in reader.deserialize::<SummaryRow>() {
            summary.push(row.context("malformed summary row")?);
        }

        let file = File::open(&paths.raw)
            .with_context(|| format!("cannot open {}", paths.raw.display()))?;
        let raw: BTreeMap<String, Conversation> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed raw lookup {}", paths.raw.display()))?;

        Ok(DataStore { summary, raw })
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.summary
    }

    pub fn row(&self, conversation_id: &str) -> Option<&SummaryRow> {
        self.summary
            .iter()
            .find(|r| r.conversation_id == conversation_id)
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.raw.get(conversation_id)
    }
}
