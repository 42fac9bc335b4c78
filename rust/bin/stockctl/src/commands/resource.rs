//! Collection read / write commands.
//!
//! `stockctl get products`, `stockctl update quants 10 --json '{..}'`, etc.
//! Reads go through the entity cache; writes go through a draft and are
//! followed by a refetch of the written collection.

use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};
use stockroom_client::{Collection, CollectionSnapshot, Draft, EntityCache, FetchOutcome, WriteNotice};

use super::Env;

fn parse_collection(name: &str) -> Result<Collection> {
    name.parse::<Collection>()
        .map_err(|_| anyhow::anyhow!("Unknown collection: {}", name))
}

fn parse_object(json_body: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json_body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => anyhow::bail!("JSON body must be an object."),
        Err(e) => anyhow::bail!("Invalid JSON: {}", e),
    }
}

/// Parse `field=1,2,3` (an empty list clears the set).
fn parse_m2m(spec: &str) -> Result<(String, Vec<i64>)> {
    let (field, ids) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected field=id,id,... but got \"{}\"", spec))?;
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("Missing field name in \"{}\"", spec);
    }
    let ids = ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid id \"{}\" in \"{}\"", s, spec))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((field.to_string(), ids))
}

async fn load(cache: &EntityCache, collection: Collection) -> Result<CollectionSnapshot> {
    match cache.fetch(collection).await {
        FetchOutcome::Failed(msg) => anyhow::bail!("Failed to load {}: {}", collection, msg),
        _ => Ok(cache.get(collection)),
    }
}

fn print_table(snap: &CollectionSnapshot) {
    println!("{:>8} {}", "ID", "NAME");
    for record in snap.data.iter() {
        let id = record.id().map(|i| i.to_string()).unwrap_or_else(|| "-".into());
        println!("{:>8} {}", id, record.label());
    }
    println!("({} records)", snap.data.len());
}

/// List a collection.
pub async fn get(collection: &str, output_json: bool, state_path: &Path) -> Result<()> {
    let collection = parse_collection(collection)?;
    let env = Env::open(state_path)?;
    env.require_session().await?;

    let cache = EntityCache::new(env.client.clone(), env.session.clone());
    let snap = load(&cache, collection).await?;

    if output_json {
        println!("{}", serde_json::to_string_pretty(&*snap.data)?);
    } else {
        print_table(&snap);
    }
    Ok(())
}

/// Update one record, then refetch its collection.
pub async fn update(
    collection: &str,
    id: i64,
    json_body: &str,
    m2m: &[String],
    state_path: &Path,
) -> Result<()> {
    let collection = parse_collection(collection)?;
    let fields = parse_object(json_body)?;
    let m2m = m2m.iter().map(|s| parse_m2m(s)).collect::<Result<Vec<_>>>()?;

    let env = Env::open(state_path)?;
    env.require_session().await?;
    let cache = EntityCache::new(env.client.clone(), env.session.clone());

    let snap = load(&cache, collection).await?;
    let record = snap
        .find(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{} #{} not found.", collection, id))?;

    let mut draft = Draft::edit(record);
    for (field, value) in fields {
        draft.set(&field, value);
    }
    for (field, ids) in &m2m {
        draft.replace_many2many(field, ids);
    }

    if !draft.is_dirty() {
        println!("No changes.");
        return Ok(());
    }

    tracing::debug!(%collection, id, values = ?draft.values(), "saving draft");
    if let Err(e) = draft
        .save_update(&env.client, env.session.as_ref(), collection, id)
        .await
    {
        let notice = WriteNotice::from_error(&e);
        anyhow::bail!("Save failed: {}", notice.message);
    }

    cache.invalidate(collection);
    let refreshed = cache.refresh_stale().await;
    tracing::debug!(?refreshed, "refetched stale collections");
    println!("{} #{} updated.", collection, id);
    if let Some(updated) = cache.get(collection).find(id) {
        println!("{}", serde_json::to_string_pretty(updated)?);
    }
    Ok(())
}

/// Create a record, then refetch its collection.
pub async fn create(collection: &str, json_body: &str, state_path: &Path) -> Result<()> {
    let collection = parse_collection(collection)?;
    let fields = parse_object(json_body)?;

    let env = Env::open(state_path)?;
    env.require_session().await?;

    let mut draft = Draft::new();
    for (field, value) in fields {
        draft.set(&field, value);
    }

    let id = match draft
        .save_create(&env.client, env.session.as_ref(), collection)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            let notice = WriteNotice::from_error(&e);
            anyhow::bail!("Create failed: {}", notice.message);
        }
    };

    let cache = EntityCache::new(env.client.clone(), env.session.clone());
    let snap = load(&cache, collection).await?;
    println!("{} #{} created.", collection, id);
    if let Some(created) = snap.find(id) {
        println!("{}", serde_json::to_string_pretty(created)?);
    }
    Ok(())
}
