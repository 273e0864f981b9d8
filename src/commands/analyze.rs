//! The analyze command: load inputs, run the pipeline, render outputs.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reclass::classification::ClassificationTree;
use reclass::config::{parse_config, AnalysisConfig};
use reclass::flat::{open_text_reader, FlatArchive};
use reclass::pipeline::{self, AnalysisResult, CancelToken, ClassificationSetup};
use reclass::{ClassId, LOW_COMPLEXITY_ID, NO_HITS_ID, TAXONOMY, UNASSIGNED_ID};

pub struct AnalyzeArgs {
    pub reads: PathBuf,
    pub matches: PathBuf,
    pub trees: Vec<String>,
    pub config: Option<PathBuf>,
    pub use_lca: Vec<String>,
    pub disable: Vec<String>,
    pub output: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let tree_specs = parse_name_path_specs(&args.trees)?;
    let names: Vec<String> = tree_specs.iter().map(|(n, _)| n.clone()).collect();
    if !names.iter().any(|n| n == TAXONOMY) {
        log::warn!("no '{}' tree given; running functional classifications only", TAXONOMY);
    }

    let config = match &args.config {
        Some(path) => parse_config(path)?,
        None => AnalysisConfig::default(),
    };
    let disabled = parse_disabled_specs(&args.disable)?;

    let mut setups = Vec::with_capacity(tree_specs.len());
    for (name, path) in &tree_specs {
        let reader = open_text_reader(path)
            .with_context(|| format!("Failed to open tree for '{}'", name))?;
        let tree = ClassificationTree::from_tsv(name, reader, path)?;
        log::info!("Loaded {}: {} classes", name, tree.len());
        let disabled_ids = disabled.get(name).cloned().unwrap_or_default();
        let use_lca = args.use_lca.iter().any(|n| n == name);
        setups.push(ClassificationSetup::new(
            Arc::new(tree),
            &disabled_ids,
            use_lca,
        ));
    }

    let mut archive = FlatArchive::load(&args.reads, &args.matches, &names)
        .context("Failed to load sample archive")?;

    let result = pipeline::process(&config, &setups, &mut archive, &CancelToken::new())?;

    write_assignments(&archive, &names, args.output.as_deref())
        .context("Failed to write assignment table")?;
    write_summary(&archive, &setups, &result, args.summary.as_deref())
        .context("Failed to write summary")?;

    log::info!(
        "Done: {} reads, {} committed entries",
        result.summary.num_reads,
        result.committed_entries
    );
    Ok(())
}

fn parse_name_path_specs(specs: &[String]) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs {
        let (name, path) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("expected Name=path, got '{}'", spec))?;
        if name.trim().is_empty() {
            return Err(anyhow!("empty classification name in '{}'", spec));
        }
        if out.iter().any(|(n, _): &(String, PathBuf)| n == name.trim()) {
            return Err(anyhow!("classification '{}' given twice", name.trim()));
        }
        out.push((name.trim().to_string(), PathBuf::from(path.trim())));
    }
    Ok(out)
}

fn parse_disabled_specs(specs: &[String]) -> Result<HashMap<String, Vec<ClassId>>> {
    let mut out: HashMap<String, Vec<ClassId>> = HashMap::new();
    for spec in specs {
        let (name, ids) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("expected Name=id,id,... got '{}'", spec))?;
        let parsed: Vec<ClassId> = ids
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid class id '{}' in '{}'", s.trim(), spec))
            })
            .collect::<Result<_>>()?;
        out.entry(name.trim().to_string()).or_default().extend(parsed);
    }
    Ok(out)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn class_label(tree: &ClassificationTree, id: ClassId) -> String {
    match id {
        UNASSIGNED_ID => "Unassigned".to_string(),
        NO_HITS_ID => "No hits".to_string(),
        LOW_COMPLEXITY_ID => "Low complexity".to_string(),
        _ => tree
            .node_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string()),
    }
}

fn write_assignments(
    archive: &FlatArchive,
    names: &[String],
    path: Option<&Path>,
) -> Result<()> {
    let mut out = open_output(path)?;
    writeln!(out, "#read\tweight\t{}", names.join("\t"))?;
    for entry in archive.committed_entries() {
        let read_name = archive.read_name(entry.read_uid).unwrap_or("?");
        write!(out, "{}\t{}", read_name, entry.weight)?;
        for id in &entry.class_ids {
            write!(out, "\t{}", id)?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn write_summary(
    archive: &FlatArchive,
    setups: &[ClassificationSetup],
    result: &AnalysisResult,
    path: Option<&Path>,
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let mut out = open_output(Some(path))?;

    let weighted = result.summary.weighted_read_counts;
    writeln!(out, "#reads\t{}", result.summary.num_reads)?;
    writeln!(out, "#totalWeight\t{}", result.summary.total_weight)?;
    writeln!(out, "#blastMode\t{}", result.summary.blast_mode)?;
    writeln!(out, "#parameters\t{}", result.summary.parameter_string)?;
    writeln!(
        out,
        "#classification\tclassId\tclassName\t{}",
        if weighted { "weight" } else { "count" }
    )?;

    for setup in setups {
        // per-class figures follow the weighted-read-counts setting
        let mut rows: Vec<(ClassId, String)> = if weighted {
            archive
                .class_weights(&setup.name)
                .into_iter()
                .flatten()
                .map(|(&id, &w)| (id, w.to_string()))
                .collect()
        } else {
            archive
                .class_counts(&setup.name)
                .into_iter()
                .flatten()
                .map(|(&id, &n)| (id, n.to_string()))
                .collect()
        };
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, figure) in rows {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                setup.name,
                id,
                class_label(&setup.tree, id),
                figure
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
