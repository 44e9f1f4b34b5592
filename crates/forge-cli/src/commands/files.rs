//! `forge files` - collaborator file endpoints

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use forge_core::{BackendClient, ForgeConfig};

pub async fn read(config: &ForgeConfig, project: &str, file: &str) -> Result<()> {
    let client = BackendClient::new(config)?;
    let content = client
        .read_file(project, file)
        .await
        .with_context(|| format!("Failed to read {} from {}", file, project))?;
    print!("{}", content);
    Ok(())
}

pub async fn write(
    config: &ForgeConfig,
    project: &str,
    file: &str,
    from: Option<PathBuf>,
) -> Result<()> {
    let content = match from {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let client = BackendClient::new(config)?;
    client
        .write_file(project, file, &content)
        .await
        .with_context(|| format!("Failed to write {} to {}", file, project))?;
    eprintln!("Wrote {} bytes to {}/{}", content.len(), project, file);
    Ok(())
}
