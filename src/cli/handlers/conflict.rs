//! Conflict listing and resolution handlers.

use anyhow::Result;

use crate::cli::handlers::resolve_entity;
use crate::cli::output::{line_label, output_json, print_success, print_table, OutputMode};
use crate::init::AppContext;
use crate::models::conflict::{ConflictKey, ConflictStatus};

pub async fn list_conflicts(
    ctx: &AppContext,
    entity: Option<&str>,
    all: bool,
    mode: OutputMode,
) -> Result<()> {
    let entity = entity.map(|e| resolve_entity(&ctx.registry, e));
    let conflicts = if all {
        ctx.engine.all_conflicts(entity.as_deref()).await?
    } else {
        ctx.engine.active_conflicts(entity.as_deref()).await?
    };

    if mode == OutputMode::Json {
        output_json(&conflicts);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = conflicts
        .iter()
        .map(|c| {
            let status = match c.status {
                ConflictStatus::Active => "active".to_string(),
                ConflictStatus::Dismissed => match &c.note {
                    Some(note) => format!("dismissed: {}", note),
                    None => "dismissed".to_string(),
                },
            };
            vec![
                c.entity.clone(),
                c.attribute.clone(),
                format!("{} ({})", c.prior_value, c.prior_scene),
                format!("{} ({})", c.new_value, c.new_scene),
                line_label(c.new_line),
                status,
            ]
        })
        .collect();

    print_table(
        &["Entity", "Attribute", "Established", "New", "Line", "Status"],
        rows,
    );
    Ok(())
}

pub async fn dismiss(
    ctx: &AppContext,
    entity: &str,
    attribute: &str,
    scene: &str,
    note: Option<String>,
    mode: OutputMode,
) -> Result<()> {
    let entity = resolve_entity(&ctx.registry, entity);
    let key = ConflictKey::new(&entity, attribute, scene);
    let dismissed = ctx.engine.dismiss_conflict(&key, note).await?;

    if mode == OutputMode::Json {
        output_json(&dismissed);
        return Ok(());
    }

    for conflict in &dismissed {
        print_success(&format!("Dismissed {}", conflict.describe()));
    }
    Ok(())
}

pub async fn accept(
    ctx: &AppContext,
    entity: &str,
    attribute: &str,
    scene: &str,
    mode: OutputMode,
) -> Result<()> {
    let entity = resolve_entity(&ctx.registry, entity);
    let key = ConflictKey::new(&entity, attribute, scene);
    let record = ctx.engine.accept_new_value(&key).await?;

    if mode == OutputMode::Json {
        output_json(&record);
        return Ok(());
    }

    let value = record
        .effective_value(&key.attribute)
        .unwrap_or_default()
        .to_string();
    print_success(&format!("{} {} is now '{}'", entity, key.attribute, value));
    Ok(())
}
