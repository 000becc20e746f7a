//! Entity record handlers: show and manual overrides.

use anyhow::Result;
use serde::Serialize;

use crate::cli::handlers::resolve_entity;
use crate::cli::handlers::scan::conflict_rows;
use crate::cli::output::{
    output_json, print_header, print_hint, print_kv, print_success, print_table, OutputMode,
};
use crate::init::AppContext;
use crate::models::conflict::ConflictRecord;
use crate::models::record::EntityRecord;

#[derive(Serialize)]
struct EntityView<'a> {
    entity: &'a str,
    record: &'a EntityRecord,
    active_conflicts: &'a [ConflictRecord],
}

pub async fn show(ctx: &AppContext, entity: &str, mode: OutputMode) -> Result<()> {
    let entity = resolve_entity(&ctx.registry, entity);
    let record = ctx.engine.record(&entity).await?;
    let conflicts = ctx.engine.active_conflicts(Some(&entity)).await?;

    if mode == OutputMode::Json {
        output_json(&EntityView {
            entity: &entity,
            record: &record,
            active_conflicts: &conflicts,
        });
        return Ok(());
    }

    print_header(&entity);
    if record.is_empty() {
        print_hint("Nothing recorded yet.");
        return Ok(());
    }

    print_kv("location", record.location.as_deref().unwrap_or("-"));
    print_kv("appearances", &record.appearances.len().to_string());

    let rows: Vec<Vec<String>> = record
        .attributes
        .iter()
        .map(|(attribute, stored)| {
            vec![
                attribute.clone(),
                stored.value.clone(),
                stored.source_scene.clone(),
                stored.quote.clone(),
            ]
        })
        .collect();
    print_header("Attributes");
    print_table(&["Attribute", "Value", "Source", "Quote"], rows);

    if !record.manual_overrides.is_empty() {
        print_header("Manual overrides");
        for (attribute, value) in &record.manual_overrides {
            print_kv(attribute, value);
        }
    }

    if !record.dismissed_conflicts.is_empty() {
        print_header("Dismissed");
        let rows = record
            .dismissed_conflicts
            .iter()
            .map(|d| {
                vec![
                    d.attribute.clone(),
                    d.value.clone(),
                    d.scene.clone(),
                    d.note.clone().unwrap_or_default(),
                    d.date.clone(),
                ]
            })
            .collect();
        print_table(&["Attribute", "Value", "Scene", "Note", "Date"], rows);
    }

    if !conflicts.is_empty() {
        print_header("Active conflicts");
        print_table(
            &["Entity", "Attribute", "Established", "New", "Line"],
            conflict_rows(&conflicts),
        );
    }
    Ok(())
}

pub async fn set_override(
    ctx: &AppContext,
    entity: &str,
    attribute: &str,
    value: &str,
    mode: OutputMode,
) -> Result<()> {
    let entity = resolve_entity(&ctx.registry, entity);
    let record = ctx.engine.set_manual_override(&entity, attribute, value).await?;

    if mode == OutputMode::Json {
        output_json(&record);
        return Ok(());
    }

    print_success(&format!("{} {} pinned to '{}'", entity, attribute, value.trim()));
    Ok(())
}

pub async fn clear_override(
    ctx: &AppContext,
    entity: &str,
    attribute: &str,
    mode: OutputMode,
) -> Result<()> {
    let entity = resolve_entity(&ctx.registry, entity);
    let cleared = ctx.engine.clear_manual_override(&entity, attribute).await?;

    if mode == OutputMode::Json {
        output_json(&serde_json::json!({ "entity": entity, "attribute": attribute, "cleared": cleared }));
        return Ok(());
    }

    if cleared {
        print_success(&format!("Cleared override on {} {}", entity, attribute));
    } else {
        print_hint(&format!("{} has no override on {}", entity, attribute));
    }
    Ok(())
}
