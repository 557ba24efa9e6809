//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use std::path::Path;
use tessera::config::AppConfig;
use tessera::dataset::{DatasetJson, QuadJson, QueryJson, Resolver, parse_json, read_json};
use tessera_core::{Explanation, Quad, Session, TesseraError};

/// Output flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Load a dataset into a fresh session configured from `config`.
fn open_session(config: &AppConfig, output: Output, data: &Path) -> Result<Session, TesseraError> {
    let dataset: DatasetJson = read_json(data)?;
    let mut session = Session::with_config(config.engine_config(), config.engine.entailment)?;
    let summary = dataset.load_into(&mut session)?;

    if !output.quiet && !output.json {
        eprintln!(
            "Loaded {} quads and {} rules from {} ({} quads after inference)",
            summary.quads_added,
            summary.rules_added,
            data.display(),
            session.store().len()
        );
    }
    Ok(session)
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn quad_json(quad: &Quad) -> serde_json::Value {
    serde_json::json!({
        "graph": quad.graph().to_string(),
        "subject": quad.subject().to_string(),
        "property": quad.property().to_string(),
        "object": quad.object().to_string(),
    })
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Count quads, graphs and rules.
pub fn cmd_stats(config: &AppConfig, output: Output, data: &Path) -> Result<(), TesseraError> {
    let session = open_session(config, output, data)?;
    let store = session.store();
    let graphs: Vec<(String, usize)> = store
        .graphs()
        .iter()
        .map(|graph| (graph.to_string(), store.count(Some(graph), None, None, None)))
        .collect();
    let rules = session.rules().rules().count();
    let executions = session.rules().execution_count();

    if output.json {
        let per_graph: serde_json::Map<String, serde_json::Value> = graphs
            .iter()
            .map(|(graph, count)| (graph.clone(), serde_json::json!(count)))
            .collect();
        print_json(&serde_json::json!({
            "quads": store.len(),
            "iris": store.nodes().iri_count(),
            "rules": rules,
            "executions": executions,
            "entailment": session.regime(),
            "graphs": per_graph,
        }));
    } else {
        println!("Quads:      {}", store.len());
        println!("IRIs:       {}", store.nodes().iri_count());
        println!("Rules:      {}", rules);
        println!("Executions: {}", executions);
        println!("Graphs:");
        for (graph, count) in &graphs {
            println!("  {} {}", graph, count);
        }
    }
    Ok(())
}

// =============================================================================
// INFER COMMAND
// =============================================================================

/// Print every quad present after inference, optionally for one graph.
pub fn cmd_infer(
    config: &AppConfig,
    output: Output,
    data: &Path,
    graph: Option<&str>,
) -> Result<(), TesseraError> {
    let mut session = open_session(config, output, data)?;
    let graph = graph.map(|iri| session.nodes_mut().iri(iri));

    let mut quads: Vec<Quad> = session
        .store()
        .match_quads(graph.as_ref(), None, None, None)
        .collect();
    quads.sort();

    if output.json {
        print_json(&serde_json::Value::Array(quads.iter().map(quad_json).collect()));
    } else {
        for quad in &quads {
            println!("{}", quad);
        }
    }
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Run a query file against the loaded dataset.
pub fn cmd_query(
    config: &AppConfig,
    output: Output,
    data: &Path,
    query_path: &Path,
) -> Result<(), TesseraError> {
    let mut session = open_session(config, output, data)?;
    let json: QueryJson = read_json(query_path)?;
    let query = Resolver::new().query(&json, session.nodes_mut());
    let solutions = session.query(&query)?;

    if output.json {
        let rows = solutions
            .iter()
            .map(|solution| {
                let row: serde_json::Map<String, serde_json::Value> = solution
                    .iter()
                    .map(|(variable, value)| {
                        (variable.name().to_string(), serde_json::json!(value.to_string()))
                    })
                    .collect();
                serde_json::Value::Object(row)
            })
            .collect();
        print_json(&serde_json::Value::Array(rows));
    } else {
        for solution in &solutions {
            let row: Vec<String> = solution
                .iter()
                .map(|(variable, value)| format!("?{}={}", variable.name(), value))
                .collect();
            println!("{}", row.join(" "));
        }
        if !output.quiet {
            eprintln!("{} solution(s)", solutions.len());
        }
    }
    Ok(())
}

// =============================================================================
// EXPLAIN COMMAND
// =============================================================================

/// Show why a quad is present.
pub fn cmd_explain(
    config: &AppConfig,
    output: Output,
    data: &Path,
    quad: &str,
) -> Result<(), TesseraError> {
    let mut session = open_session(config, output, data)?;
    let json: QuadJson = parse_json(quad)?;
    let quad = Resolver::new().quad(&json, session.nodes_mut());

    let present = session.store().contains(&quad);
    let explanation = session.explain(&quad);

    if output.json {
        print_json(&serde_json::json!({
            "quad": quad_json(&quad),
            "present": present,
            "explanation": explanation.as_ref().map(explanation_json),
        }));
        return Ok(());
    }

    match explanation {
        Some(explanation) => {
            let mut text = String::new();
            render_explanation(&explanation, 0, &mut text);
            print!("{}", text);
        }
        None if present => println!("{}\n  asserted", quad),
        None => println!("{}\n  not present", quad),
    }
    Ok(())
}

fn explanation_json(explanation: &Explanation) -> serde_json::Value {
    let bindings: serde_json::Map<String, serde_json::Value> = explanation
        .bindings
        .iter()
        .map(|(variable, value)| (variable.name().to_string(), serde_json::json!(value.to_string())))
        .collect();
    serde_json::json!({
        "rule": explanation.rule,
        "produced": quad_json(&explanation.produced),
        "bindings": bindings,
        "antecedents": explanation.antecedents.iter().map(quad_json).collect::<Vec<_>>(),
        "parents": explanation.parents.iter().map(explanation_json).collect::<Vec<_>>(),
    })
}

/// Render a derivation tree, one antecedent per line.
fn render_explanation(explanation: &Explanation, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{}{}\n", indent, explanation.produced));
    out.push_str(&format!("{}  by <{}>\n", indent, explanation.rule));
    if !explanation.bindings.is_empty() {
        let bindings: Vec<String> = explanation
            .bindings
            .iter()
            .map(|(variable, value)| format!("?{}={}", variable.name(), value))
            .collect();
        out.push_str(&format!("{}  with {}\n", indent, bindings.join(" ")));
    }
    for antecedent in &explanation.antecedents {
        match explanation
            .parents
            .iter()
            .find(|parent| &parent.produced == antecedent)
        {
            Some(parent) => render_explanation(parent, depth + 2, out),
            None => out.push_str(&format!("{}    {} (asserted)\n", indent, antecedent)),
        }
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show the live match state of a rule.
pub fn cmd_status(
    config: &AppConfig,
    output: Output,
    data: &Path,
    rule: &str,
) -> Result<(), TesseraError> {
    let session = open_session(config, output, data)?;
    let status = session.match_status(rule)?;

    if output.json {
        print_json(&serde_json::to_value(&status).unwrap_or_default());
    } else {
        println!("Rule: <{}>", rule);
        for (index, step) in status.steps.iter().enumerate() {
            println!(
                "  [{}] {}  facts={} partial={}",
                index, step.pattern, step.facts, step.partial_matches
            );
        }
        println!("Tokens: {}", status.tokens);
    }
    Ok(())
}
