//! `forge browse` and `forge verify`.

use anyhow::Result;

use crate::config::Config;
use crate::rag::VaultRag;

pub async fn run_browse(config: &Config) -> Result<()> {
    let rag = VaultRag::open(config).await?;
    let docs = rag.browse().await?;

    if docs.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }

    println!("{:<48} {:<10} {:>6}", "FILE", "TYPE", "CHUNKS");
    println!("{}", "-".repeat(66));
    for doc in &docs {
        println!("{:<48} {:<10} {:>6}", doc.rel_path, doc.folder_type, doc.chunks);
    }
    println!();
    println!("{} documents", docs.len());
    Ok(())
}

pub async fn run_verify(config: &Config, filename: &str, claim: &str) -> Result<()> {
    let rag = VaultRag::open(config).await?;
    let verdict = rag.verify_claim(filename, claim).await?;

    if verdict.found {
        println!("found: yes");
        println!("confidence: {:.2}", verdict.confidence);
        println!("source: {}", verdict.source);
        if let Some(excerpt) = &verdict.excerpt {
            println!("excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        }
    } else {
        println!("found: no");
        println!("No supporting content in {}.", filename);
    }
    Ok(())
}
