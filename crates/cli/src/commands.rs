use anyhow::{Context, Result};
use router_core::models::{format_leaf_path, parse_leaf_path};
use router_core::signature;
use router_core::templates::{FolderNode, TemplateResolver};
use router_core::{FileDescriptor, ReportOutcome, Router, RoutingRecord};
use std::fmt::Write as _;
use std::path::Path;

/// Where a `route` call takes its template from.
#[derive(Debug, Clone)]
pub enum Target {
    Template(String),
    Project(String),
}

pub fn templates(resolver: &TemplateResolver, id: Option<&str>) -> Result<String> {
    let ids = match id {
        Some(id) => vec![id.to_string()],
        None => resolver.ids(),
    };
    let mut out = String::new();
    for id in ids {
        let template = resolver.resolve(&id)?;
        writeln!(out, "{} ({})", template.id, template.label)?;
        write_tree(&mut out, &template.folders, 1)?;
    }
    Ok(out)
}

fn write_tree(out: &mut String, nodes: &[FolderNode], depth: usize) -> std::fmt::Result {
    for node in nodes {
        writeln!(out, "{}{}", "  ".repeat(depth), node.label)?;
        write_tree(out, &node.children, depth + 1)?;
    }
    Ok(())
}

pub fn normalize(name: &str) -> String {
    let sig = signature::normalize(name);
    format!("{}\t{}", sig.key, sig.extension_class)
}

/// Reads a file from disk into a descriptor; the name is the last path component.
pub async fn load_file(path: &Path) -> Result<FileDescriptor> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(FileDescriptor::new(name, content.len() as u64).with_content(content))
}

pub async fn route(router: &Router, file: &FileDescriptor, target: &Target, json: bool) -> Result<String> {
    let res = match target {
        Target::Template(id) => router.route(file, id, None).await?,
        Target::Project(id) => router.route_for_project(file, id).await?,
    };
    if json {
        return Ok(serde_json::to_string_pretty(&res)?);
    }
    Ok(format!(
        "{}\t{}%\t{}\t{}",
        format_leaf_path(&res.leaf_path),
        res.confidence,
        res.method,
        res.record_id
    ))
}

pub async fn report(router: &Router, record_id: &str, path: &str) -> Result<String> {
    let leaf_path = parse_leaf_path(path);
    Ok(match router.report_actual(record_id, &leaf_path).await? {
        ReportOutcome::Unchanged => format!("{record_id}: unchanged"),
        ReportOutcome::Learned(p) => format!(
            "{record_id}: {} learned for \"{}\" (confirmed {}x)",
            format_leaf_path(&p.leaf_path),
            p.signature,
            p.times_confirmed
        ),
    })
}

pub async fn records(router: &Router, project_id: &str, json: bool) -> Result<String> {
    let records = router.list_by_project(project_id).await?;
    if json {
        return Ok(serde_json::to_string_pretty(&records)?);
    }
    let mut out = String::new();
    for r in &records {
        writeln!(out, "{}", record_line(r))?;
    }
    Ok(out)
}

fn record_line(r: &RoutingRecord) -> String {
    let actual = r
        .actual_path
        .as_deref()
        .map(format_leaf_path)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{}\t{}\t{}\t{}%\t{}\t{}",
        r.created_at.to_rfc3339(),
        r.id,
        r.file_name,
        format_leaf_path(&r.suggested_path),
        r.confidence,
        r.method,
        actual
    )
}

pub async fn patterns(router: &Router, json: bool) -> Result<String> {
    let patterns = router.learned_patterns().await?;
    if json {
        return Ok(serde_json::to_string_pretty(&patterns)?);
    }
    let mut out = String::new();
    for p in &patterns {
        writeln!(
            out,
            "{}\t{}\t{}",
            p.signature,
            format_leaf_path(&p.leaf_path),
            p.times_confirmed
        )?;
    }
    Ok(out)
}

pub async fn forget(router: &Router, signature: &str) -> Result<String> {
    Ok(if router.forget(signature).await? {
        format!("forgot \"{signature}\"")
    } else {
        format!("no learned pattern for \"{signature}\"")
    })
}
