//! Scan handlers.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::cli::output::{
    line_label, output_json, print_header, print_kv, print_success, print_table, print_warning,
    OutputMode,
};
use crate::init::AppContext;
use crate::models::conflict::ConflictRecord;
use crate::repository::{DocumentSource, FsDocumentSource};
use crate::services::{Change, MergeSummary, ScanFailure};

fn change_rows(changes: &[Change]) -> Vec<Vec<String>> {
    changes
        .iter()
        .map(|c| {
            vec![
                c.entity.clone(),
                c.attribute.clone(),
                c.old.clone().unwrap_or_else(|| "-".to_string()),
                c.new.clone().unwrap_or_else(|| "(cleared)".to_string()),
                c.scene.clone(),
            ]
        })
        .collect()
}

pub(crate) fn conflict_rows(conflicts: &[ConflictRecord]) -> Vec<Vec<String>> {
    conflicts
        .iter()
        .map(|c| {
            vec![
                c.entity.clone(),
                c.attribute.clone(),
                format!("{} ({})", c.prior_value, c.prior_scene),
                format!("{} ({})", c.new_value, c.new_scene),
                line_label(c.new_line),
            ]
        })
        .collect()
}

fn print_changes_and_conflicts(changes: &[Change], conflicts: &[ConflictRecord], merge: MergeSummary) {
    if !changes.is_empty() {
        print_header("Changes");
        print_table(&["Entity", "Attribute", "Old", "New", "Scene"], change_rows(changes));
    }

    if !conflicts.is_empty() {
        print_header(&format!("{}", "Conflicts".red().bold()));
        print_table(
            &["Entity", "Attribute", "Established", "New", "Line"],
            conflict_rows(conflicts),
        );
        if merge.suppressed > 0 {
            print_kv("previously dismissed", &merge.suppressed.to_string());
        }
    }
}

fn print_failures(failures: &[ScanFailure]) {
    for failure in failures {
        print_warning(&format!("{}: {}", failure.subject, failure.error));
    }
}

pub async fn handle_scan(ctx: &AppContext, file: &Path, root: &Path, mode: OutputMode) -> Result<()> {
    let source = FsDocumentSource::new(root);
    let scene = source.scene_id(file);
    let document = source.read_scene(&scene).await?;

    let report = ctx.engine.scan_one(&document, &ctx.registry).await?;

    if mode == OutputMode::Json {
        output_json(&report);
        return Ok(());
    }

    print_header(&format!("Scanned {}", report.scene));
    print_kv("windows", &report.windows_scanned.to_string());
    print_kv(
        "appearances",
        &if report.appearances.is_empty() {
            "-".to_string()
        } else {
            report.appearances.join(", ")
        },
    );
    if report.tier2_facts > 0 {
        print_kv("classifier facts", &report.tier2_facts.to_string());
    }

    print_changes_and_conflicts(&report.changes, &report.conflicts, report.merge);
    print_failures(&report.failures);

    if report.conflicts.is_empty() && report.failures.is_empty() {
        print_success(&format!("{} change(s), no conflicts", report.changes.len()));
    }
    Ok(())
}

pub async fn handle_scan_all(ctx: &AppContext, dir: &Path, mode: OutputMode) -> Result<()> {
    let source = FsDocumentSource::new(dir);

    let pb = if mode == OutputMode::Human {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Scanning {}...", dir.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let result = ctx.engine.scan_all(&source, &ctx.registry).await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let report = result?;

    if mode == OutputMode::Json {
        output_json(&report);
        return Ok(());
    }

    print_header(&format!("Scanned {} document(s)", report.documents_scanned));
    let appearance_rows: Vec<Vec<String>> = report
        .appearances
        .iter()
        .map(|(entity, scenes)| vec![entity.clone(), scenes.len().to_string(), scenes.join(", ")])
        .collect();
    print_table(&["Entity", "Scenes", "Appears in"], appearance_rows);

    print_changes_and_conflicts(&report.changes, &report.conflicts, report.merge);
    print_failures(&report.document_failures);
    print_failures(&report.entity_failures);

    if report.conflicts.is_empty() {
        print_success(&format!("{} change(s), no conflicts", report.changes.len()));
    }
    Ok(())
}
