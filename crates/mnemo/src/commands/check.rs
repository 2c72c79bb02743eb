//! Check command - probe semantic memory dependencies.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use mnemo_memory::{QdrantClient, VectorIndex};
use serde_json::json;

use super::{Context, embedder_spec, qdrant_config};

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Also send a test embedding request
    #[arg(long)]
    pub embed: bool,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let vector_store = ctx.config.vector_store();
    let embedding = ctx.config.embedding();
    let storage_dir = ctx.config.session().effective_storage_dir();

    let qdrant = qdrant_config(&vector_store);
    let collection = if vector_store.enabled {
        Some(probe_collection(&qdrant).await)
    } else {
        None
    };

    let api_key_set = embedding.resolve_api_key().is_some();
    let embed_probe = if args.embed && embedding.enabled {
        Some(probe_embedding(&embedding, &vector_store).await)
    } else {
        None
    };

    if ctx.json_output {
        let out = json!({
            "storage_dir": storage_dir.as_ref().map(|d| d.display().to_string()),
            "vector_store": {
                "enabled": vector_store.enabled,
                "url": qdrant.base_url(),
                "collection": qdrant.collection,
                "status": collection,
            },
            "embedding": {
                "enabled": embedding.enabled,
                "provider": embedding.provider,
                "model": embedding.model,
                "api_key_set": api_key_set,
                "probe": embed_probe,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let ok = Style::new().green();
    let bad = Style::new().red();

    println!("{}", style("Sessions").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    match &storage_dir {
        Some(dir) => println!("  Storage:     {}", style(dir.display()).cyan()),
        None => println!("  Storage:     {}", dim.apply_to("(in memory only)")),
    }
    println!();

    println!("{}", style("Vector Store").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    if vector_store.enabled {
        println!("  URL:         {}", style(qdrant.base_url()).cyan());
        println!("  Collection:  {}", style(&qdrant.collection).cyan());
        match &collection {
            Some(status) if status.starts_with("error") => {
                println!("  Status:      {}", bad.apply_to(status))
            }
            Some(status) => println!("  Status:      {}", ok.apply_to(status)),
            None => {}
        }
    } else {
        println!("  Status:      {}", dim.apply_to("disabled"));
    }
    println!();

    println!("{}", style("Embedding").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    if embedding.enabled {
        println!("  Provider:    {}", style(&embedding.provider).cyan());
        println!("  Model:       {}", style(&embedding.model).cyan());
        if api_key_set {
            println!("  API key:     {}", ok.apply_to("set"));
        } else {
            println!(
                "  API key:     {}",
                bad.apply_to(format!(
                    "missing (set {})",
                    mnemo_config::EMBEDDING_API_KEY_ENV
                ))
            );
        }
        if let Some(probe) = &embed_probe {
            let styled = if probe.starts_with("error") {
                bad.apply_to(probe)
            } else {
                ok.apply_to(probe)
            };
            println!("  Probe:       {}", styled);
        }
    } else {
        println!("  Status:      {}", dim.apply_to("disabled"));
    }
    println!();

    Ok(())
}

async fn probe_collection(config: &mnemo_memory::QdrantConfig) -> String {
    let client = match QdrantClient::new(config) {
        Ok(client) => client,
        Err(e) => return format!("error: {e}"),
    };
    match client.collection_exists().await {
        Ok(true) => "ok (collection exists)".to_string(),
        Ok(false) => "ok (collection will be created on first use)".to_string(),
        Err(e) => format!("error: {e}"),
    }
}

async fn probe_embedding(
    embedding: &mnemo_config::EmbeddingConfig,
    vector_store: &mnemo_config::VectorStoreConfig,
) -> String {
    let embedder = match mnemo_embeddings::build_embedder(&embedder_spec(embedding, vector_store)) {
        Ok(embedder) => embedder,
        Err(e) => return format!("error: {e}"),
    };
    match embedder.embed("mnemo connectivity check").await {
        Ok(vector) if vector_store.vector_size > 0 && vector.len() != vector_store.vector_size => {
            format!(
                "error: model returned {} dimensions, collection expects {}",
                vector.len(),
                vector_store.vector_size
            )
        }
        Ok(vector) => format!("ok ({} dimensions)", vector.len()),
        Err(e) => format!("error: {e}"),
    }
}
