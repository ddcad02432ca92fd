//! Analyze commands - content signatures, similarity and classification

use super::{GlobalOptions, absolute};
use anyhow::Result;
use chrono::Local;
use fileflow_core::content::{ClassificationMatch, ContentAnalyzer, ContentSignature, SignatureType};
use fileflow_core::service::open_analyzer;
use regex_utils::stamped_name;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

fn analyzer(options: &GlobalOptions) -> Result<std::sync::Arc<ContentAnalyzer>> {
    open_analyzer(&options.load_config()?)
}

/// Analyze a single file and print its signature
pub async fn execute(options: &GlobalOptions, path: &Path, json: bool) -> Result<()> {
    let path = absolute(path)?;
    let signature = analyzer(options)?.analyze_file(&path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&signature)?);
        return Ok(());
    }
    print_signature(&signature);
    Ok(())
}

fn print_signature(signature: &ContentSignature) {
    println!("Analyzing: {}", signature.file_path.display());
    if let Some(original) = signature
        .file_path
        .file_name()
        .and_then(|n| stamped_name::original_name(&n.to_string_lossy()))
    {
        println!("  Uniquified from: {}", original);
    }
    println!("  MIME type:  {}", signature.mime_type);
    println!("  Kind:       {}", signature.signature_type.as_str());
    println!("  Size:       {} bytes", signature.file_size);
    let analyzed = signature.updated_at.with_timezone(&Local);
    println!("  Analyzed:   {}", analyzed.format("%Y-%m-%d %H:%M:%S"));

    match signature.signature_type {
        SignatureType::Text => {
            if !signature.keywords.is_empty() {
                println!("  Keywords:   {}", signature.keywords.join(", "));
            }
            if let Ok(terms) = serde_json::from_str::<HashMap<String, u64>>(&signature.signature) {
                println!("  Terms:      {} distinct", terms.len());
            }
        }
        _ => println!("  SHA-256:    {}", signature.signature),
    }
}

pub async fn compare(options: &GlobalOptions, first: &Path, second: &Path) -> Result<()> {
    let (first, second) = (absolute(first)?, absolute(second)?);
    let (score, relation) = analyzer(options)?.compare_files(&first, &second).await?;

    println!("{}", first.display());
    println!("{}", second.display());
    println!("  Similarity: {:.3} ({})", score, relation);
    Ok(())
}

pub async fn related(
    options: &GlobalOptions,
    path: &Path,
    min_similarity: f64,
    limit: usize,
) -> Result<()> {
    let path = absolute(path)?;
    let related = analyzer(options)?.find_related_files(&path, min_similarity, limit).await?;

    if related.is_empty() {
        println!(
            "No analyzed files are at least {:.2} similar to {}",
            min_similarity,
            path.display()
        );
        return Ok(());
    }
    println!("Files related to {}:", path.display());
    for file in related {
        println!(
            "  {:.3}  {:<17} {}",
            file.similarity,
            file.relation_type.as_str(),
            file.path.display()
        );
    }
    Ok(())
}

pub async fn group(
    options: &GlobalOptions,
    path: &Path,
    name: &str,
    min_similarity: f64,
) -> Result<()> {
    let path = absolute(path)?;
    let group = analyzer(options)?.group_related_files(&path, name, min_similarity).await?;

    println!("Created group '{}' ({})", group.name, group.id);
    for member in &group.members {
        println!("  {:.3}  {}", member.membership_score, member.file_path.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct MatchRow<'a> {
    classification: &'a str,
    name: &'a str,
    confidence: f64,
}

pub async fn classify(
    options: &GlobalOptions,
    path: &Path,
    refresh: bool,
    json: bool,
) -> Result<()> {
    let path = absolute(path)?;
    let analyzer = analyzer(options)?;
    let matches = if refresh {
        analyzer.reclassify_file(&path).await?
    } else {
        analyzer.classify_file(&path).await?
    };

    let names: HashMap<String, String> =
        analyzer.list_classifications()?.into_iter().map(|c| (c.id, c.name)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows(&matches, &names))?);
        return Ok(());
    }
    if matches.is_empty() {
        println!("{}: no classification matched", path.display());
        return Ok(());
    }
    println!("{}:", path.display());
    for row in rows(&matches, &names) {
        println!("  {:<16} {:<16} {:>5.0}%", row.classification, row.name, row.confidence * 100.0);
    }
    Ok(())
}

fn rows<'a>(
    matches: &'a [ClassificationMatch],
    names: &'a HashMap<String, String>,
) -> Vec<MatchRow<'a>> {
    matches
        .iter()
        .map(|m| MatchRow {
            classification: &m.classification_id,
            name: names.get(&m.classification_id).map(String::as_str).unwrap_or("?"),
            confidence: m.confidence,
        })
        .collect()
}

pub async fn classifications(options: &GlobalOptions) -> Result<()> {
    let classifications = analyzer(options)?.list_classifications()?;
    for classification in classifications {
        let criteria = &classification.criteria;
        let builtin = if classification.system_defined {
            " (built-in)"
        } else {
            ""
        };
        println!("{}{} - {}", classification.id, builtin, classification.name);
        if !classification.description.is_empty() {
            println!("    {}", classification.description);
        }
        if !criteria.extensions.is_empty() {
            println!("    extensions: {}", criteria.extensions.join(", "));
        }
        if !criteria.mime_types.is_empty() {
            println!("    MIME types: {}", criteria.mime_types.join(", "));
        }
        println!("    threshold:  {:.2}", classification.confidence_threshold);
    }
    Ok(())
}
