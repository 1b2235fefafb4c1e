//! Command handlers.

use std::path::PathBuf;

use crate::cli::{Commands, DownloadArgs, SourceArgs};
use crate::error::{BhError, Result};
use crate::model::{Source, SourceKind};
use crate::sources::{create_source, BundleSource, CollectionRepoSource};

pub async fn run(command: &Commands) -> Result<()> {
    match command {
        Commands::List(args) => list(args).await,
        Commands::Validate(args) => validate(args).await,
        Commands::Download(args) => download(args).await,
    }
}

fn build_adapter(args: &SourceArgs) -> Result<Box<dyn BundleSource>> {
    let selected = [
        args.github.is_some(),
        args.gitlab.is_some(),
        args.collection.is_some(),
        args.dir.is_some(),
        args.skills.is_some(),
    ]
    .iter()
    .filter(|selected| **selected)
    .count();
    if selected != 1 {
        return Err(BhError::Config(
            "select exactly one of --github, --gitlab, --collection, --dir, --skills".to_string(),
        ));
    }

    if let Some(repo) = &args.github {
        let source = Source::new("github", SourceKind::GitHub, repo)
            .with_token(args.token.clone());
        return create_source(source);
    }
    if let Some(project) = &args.gitlab {
        let source = Source::new("gitlab", SourceKind::GitLab, project)
            .with_token(args.token.clone());
        return create_source(source);
    }
    if let Some(repo) = &args.collection {
        let source = Source::new("collection", SourceKind::Collection, repo)
            .with_token(args.token.clone());
        return Ok(Box::new(CollectionRepoSource::with_branch(
            source,
            &args.branch,
        )?));
    }
    if let Some(dir) = &args.dir {
        let source = Source::new(
            "local",
            SourceKind::LocalDirectory,
            dir.to_string_lossy(),
        );
        return create_source(source);
    }
    if let Some(dir) = &args.skills {
        let source = Source::new(
            "skills",
            SourceKind::SkillDirectory,
            dir.to_string_lossy(),
        );
        return create_source(source);
    }
    unreachable!("argument selection was validated above")
}

async fn list(args: &SourceArgs) -> Result<()> {
    let adapter = build_adapter(args)?;
    let bundles = adapter.list_bundles().await?;
    if bundles.is_empty() {
        println!("no bundles found");
        return Ok(());
    }
    for bundle in &bundles {
        let size = if bundle.size.is_empty() {
            String::new()
        } else {
            format!("  ({})", bundle.size)
        };
        println!("{}  v{}{size}", bundle.id, bundle.version);
        if !bundle.description.is_empty() {
            println!("    {}", bundle.description);
        }
        if !bundle.tags.is_empty() {
            println!("    tags: {}", bundle.tags.join(", "));
        }
    }
    println!("{} bundle(s)", bundles.len());
    Ok(())
}

async fn validate(args: &SourceArgs) -> Result<()> {
    let adapter = build_adapter(args)?;
    let result = adapter.validate().await;
    for error in &result.errors {
        println!("error: {error}");
    }
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    match result.bundle_count {
        Some(count) if result.valid => println!("ok: {count} bundle(s)"),
        _ if result.valid => println!("ok"),
        _ => {
            return Err(BhError::ValidationFailed(format!(
                "source {} failed validation",
                adapter.source().id
            )));
        }
    }
    Ok(())
}

async fn download(args: &DownloadArgs) -> Result<()> {
    let adapter = build_adapter(&args.source)?;
    let bundle = adapter
        .get_bundle(&args.bundle)
        .await?
        .ok_or_else(|| BhError::NotFound(format!("bundle {} not found", args.bundle)))?;

    let bytes = adapter.download_bundle(&bundle).await?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.zip", bundle.id)));
    tokio::fs::write(&output, &bytes).await?;
    println!(
        "wrote {} ({} bytes) to {}",
        bundle.id,
        bytes.len(),
        output.display()
    );
    Ok(())
}
