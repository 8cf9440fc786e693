//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use dagwright_core::catalog;
use dagwright_core::{
    BucketCounts, DagwrightError, ExtractedConstraint, Graph, IntegrityReport, Pipeline,
    PipelineRequest, ResolutionReport, SWEEP_RULES, extract_constraints, resolve_constraints,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of any input file (10 MB).
///
/// Generated graphs and briefs are small; anything larger is a mistake.
pub const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DagwrightError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DagwrightError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DagwrightError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DagwrightError> {
    let canonical = path.canonicalize().map_err(|e| {
        DagwrightError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DagwrightError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent directory of an output path.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, DagwrightError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        DagwrightError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(DagwrightError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| DagwrightError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// INPUT HELPERS
// =============================================================================

/// Read a size-checked text file.
pub fn read_input(path: &Path) -> Result<String, DagwrightError> {
    let canonical = validate_file_path(path)?;
    validate_file_size(&canonical, MAX_INPUT_FILE_SIZE)?;
    std::fs::read_to_string(&canonical)
        .map_err(|e| DagwrightError::Io(format!("Cannot read '{}': {}", path.display(), e)))
}

/// Read a JSON document without interpreting it.
pub fn read_json(path: &Path) -> Result<Value, DagwrightError> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        DagwrightError::Deserialization(format!("'{}' is not JSON: {}", path.display(), e))
    })
}

/// Read a graph, keeping the raw document for the integrity sentinel.
pub fn load_graph(path: &Path) -> Result<(Value, Graph), DagwrightError> {
    let raw = read_json(path)?;
    let graph = Graph::from_value(raw.clone())?;
    tracing::debug!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "loaded graph"
    );
    Ok((raw, graph))
}

fn to_pretty<T: Serialize>(value: &T) -> Result<String, DagwrightError> {
    serde_json::to_string_pretty(value).map_err(|e| DagwrightError::Serialization(e.to_string()))
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// List the violations of a graph without repairing it.
pub fn cmd_validate(pipeline: &Pipeline, json_mode: bool, graph_path: &Path) -> Result<(), DagwrightError> {
    let (_, graph) = load_graph(graph_path)?;
    let violations = pipeline.validator().validate(&graph);
    let counts = BucketCounts::tally(&violations);

    if json_mode {
        let output = serde_json::json!({
            "graph": graph_path.to_string_lossy(),
            "node_count": graph.nodes.len(),
            "edge_count": graph.edges.len(),
            "counts": counts,
            "violations": violations,
        });
        println!("{}", to_pretty(&output)?);
        return Ok(());
    }

    println!("Dagwright Validation");
    println!("====================");
    println!("Graph: {}", graph_path.display());
    println!("Nodes: {}", graph.nodes.len());
    println!("Edges: {}", graph.edges.len());
    println!();
    println!(
        "Violations: {} (A: {}, B: {}, C: {})",
        counts.total(),
        counts.a,
        counts.b,
        counts.c
    );
    for v in &violations {
        println!("  [{}] {:<28} {:<32} {}", v.bucket, v.code, v.path, v.message);
    }

    Ok(())
}

// =============================================================================
// REPAIR COMMAND
// =============================================================================

/// Run the full pipeline, then the integrity sentinel over its result.
pub fn cmd_repair(
    pipeline: &Pipeline,
    json_mode: bool,
    graph_path: &Path,
    brief_path: Option<&Path>,
    goal_id: Option<String>,
    output: Option<&Path>,
) -> Result<(), DagwrightError> {
    let (raw, graph) = load_graph(graph_path)?;
    let brief = brief_path.map(read_input).transpose()?;

    let request = PipelineRequest {
        brief,
        goal_node_id: goal_id,
        ..PipelineRequest::default()
    };
    let outcome = pipeline.run(graph, &request);
    let response = pipeline.respond(&outcome, &request)?.to_value()?;
    let integrity = pipeline.check_integrity(&raw, &response);

    if outcome.gate.llm_repair_needed {
        tracing::warn!(
            remaining = outcome.gate.remaining_violations.len(),
            "graph needs regeneration"
        );
    }

    let rendered = to_pretty(&response)?;
    let Some(output) = output else {
        println!("{}", rendered);
        return Ok(());
    };

    let target = validate_output_path(output)?;
    std::fs::write(&target, rendered)
        .map_err(|e| DagwrightError::Io(format!("Cannot write '{}': {}", target.display(), e)))?;

    if json_mode {
        let summary = serde_json::json!({
            "output": target.to_string_lossy(),
            "llm_repair_needed": outcome.gate.llm_repair_needed,
            "repair_actions": outcome.trace.repair.actions.len(),
            "reconciliation_actions": outcome.trace.reconciliation.actions.len(),
            "remaining": outcome.gate.counts,
            "integrity": integrity,
        });
        println!("{}", to_pretty(&summary)?);
        return Ok(());
    }

    println!("Repaired graph written to {}", target.display());
    println!(
        "  Sweep:      {} actions in {} passes",
        outcome.trace.repair.actions.len(),
        outcome.trace.repair.passes
    );
    println!(
        "  Reconcile:  {} actions, {} escalated",
        outcome.trace.reconciliation.actions.len(),
        outcome.trace.reconciliation.escalated
    );
    println!("  Regenerate: {}", outcome.gate.llm_repair_needed);
    if let Some(report) = &outcome.constraints {
        println!("  Constraints: {} bound", report.constraints.len());
    }
    print_integrity(&integrity);

    Ok(())
}

// =============================================================================
// EXTRACT COMMAND
// =============================================================================

/// Extract constraints from a brief, resolving them if a graph is given.
pub fn cmd_extract(
    json_mode: bool,
    brief_path: &Path,
    graph_path: Option<&Path>,
    goal_id: Option<&str>,
) -> Result<(), DagwrightError> {
    let brief = read_input(brief_path)?;
    let extracted = extract_constraints(&brief);

    let Some(graph_path) = graph_path else {
        if json_mode {
            println!("{}", to_pretty(&extracted)?);
        } else {
            print_extracted(&extracted);
        }
        return Ok(());
    };

    let (_, graph) = load_graph(graph_path)?;
    let report = resolve_constraints(&extracted, &graph, goal_id);
    if json_mode {
        println!("{}", to_pretty(&report)?);
    } else {
        print_resolved(&report);
    }
    Ok(())
}

fn print_extracted(constraints: &[ExtractedConstraint]) {
    println!("Extracted {} constraints", constraints.len());
    for c in constraints {
        println!(
            "  {} {} {}{}  ({:.2}) \"{}\"",
            c.target_id,
            c.operator,
            c.value,
            c.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default(),
            c.confidence,
            c.provenance.quote
        );
    }
}

fn print_resolved(report: &ResolutionReport) {
    println!(
        "Resolved {} constraints (exact: {}, remapped: {}, junk: {}, unmatched: {})",
        report.constraints.len(),
        report.stats.exact,
        report.stats.remapped,
        report.stats.rejected_junk,
        report.stats.rejected_no_match
    );
    for c in &report.constraints {
        println!(
            "  {:<24} {} {}  <- \"{}\" via {}",
            c.node_id, c.operator, c.value, c.source_target, c.resolved_by
        );
    }
}

// =============================================================================
// SENTINEL COMMAND
// =============================================================================

/// Compare two snapshots and report silent data loss.
pub fn cmd_sentinel(
    pipeline: &Pipeline,
    json_mode: bool,
    raw_path: &Path,
    output_path: &Path,
) -> Result<(), DagwrightError> {
    let raw = read_json(raw_path)?;
    let output = read_json(output_path)?;
    let report = pipeline.check_integrity(&raw, &output);

    if json_mode {
        println!("{}", to_pretty(&report)?);
        return Ok(());
    }

    println!("Dagwright Integrity Check");
    println!("=========================");
    println!(
        "Nodes: {} -> {}",
        report.input_node_count, report.output_node_count
    );
    println!(
        "Edges: {} -> {}",
        report.input_edge_count, report.output_edge_count
    );
    print_integrity(&report);
    Ok(())
}

fn print_integrity(report: &IntegrityReport) {
    if report.warnings.is_empty() {
        println!("  Integrity:  clean");
        return;
    }
    println!("  Integrity:  {} warnings", report.warnings.len());
    for w in &report.warnings {
        println!(
            "    {:<26} {:<20} {}",
            w.code,
            w.node_id.as_deref().unwrap_or("-"),
            w.details
        );
    }
}

// =============================================================================
// RULES COMMAND
// =============================================================================

#[derive(Serialize)]
struct RuleListing {
    name: &'static str,
    targets: &'static [dagwright_core::ViolationCode],
}

/// Print the violation catalog and the ordered sweep rules.
pub fn cmd_rules(pipeline: &Pipeline, json_mode: bool) -> Result<(), DagwrightError> {
    let entries: Vec<_> = catalog::all().collect();
    let rules: Vec<_> = SWEEP_RULES
        .iter()
        .map(|r| RuleListing {
            name: r.name,
            targets: r.targets,
        })
        .collect();

    if json_mode {
        let output = serde_json::json!({
            "catalog": entries,
            "sweep_rules": rules,
            "max_iterations": pipeline.config().sweep.max_iterations,
        });
        println!("{}", to_pretty(&output)?);
        return Ok(());
    }

    println!("Violation Catalog");
    println!("=================");
    for e in &entries {
        println!(
            "  [{}] {:<28} {:<24} {}",
            e.bucket, e.code, e.fixed_by, e.description
        );
    }
    println!();
    println!(
        "Sweep Rules (in order, at most {} passes)",
        pipeline.config().sweep.max_iterations
    );
    for (i, r) in rules.iter().enumerate() {
        let targets: Vec<String> = r.targets.iter().map(ToString::to_string).collect();
        println!("  {}. {:<28} {}", i + 1, r.name, targets.join(", "));
    }
    Ok(())
}
