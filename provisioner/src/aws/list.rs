//! `list` subcommand for `aws`

use crate::aws::{
    deployment_directory, Error, Metadata, Resources, CREATED_FILE_NAME, DESTROYED_FILE_NAME,
    METADATA_FILE_NAME, RESOURCES_FILE_NAME,
};
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::info;

/// A deployment that was created and not yet destroyed
#[derive(Clone, Debug, PartialEq)]
pub struct Deployment {
    pub metadata: Metadata,
    pub load_balancer_dns: Option<String>,
}

/// Collects active deployments under `root`, newest first
pub fn active(root: &Path) -> Result<Vec<Deployment>, Error> {
    let mut active = Vec::new();
    if !root.exists() {
        return Ok(active);
    }
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        // Skip incomplete or destroyed deployments
        let created = path.join(CREATED_FILE_NAME);
        let destroyed = path.join(DESTROYED_FILE_NAME);
        if !created.exists() || destroyed.exists() {
            continue;
        }

        // Load metadata if available, otherwise use directory name as tag
        let metadata_path = path.join(METADATA_FILE_NAME);
        let metadata = if metadata_path.exists() {
            serde_yaml::from_reader::<_, Metadata>(File::open(&metadata_path)?)?
        } else {
            let Some(tag) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            Metadata {
                tag: tag.to_string(),
                created_at: 0,
                region: None,
            }
        };
        let resources_path = path.join(RESOURCES_FILE_NAME);
        let load_balancer_dns = if resources_path.exists() {
            Resources::load(&resources_path)?.load_balancer_dns
        } else {
            None
        };
        active.push(Deployment {
            metadata,
            load_balancer_dns,
        });
    }
    active.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
    Ok(active)
}

/// Lists all active deployments (created but not destroyed)
pub fn list() -> Result<(), Error> {
    let active = active(&deployment_directory()?)?;
    if active.is_empty() {
        info!("no active deployments");
        return Ok(());
    }
    for d in &active {
        info!(
            tag = d.metadata.tag.as_str(),
            created_at = d.metadata.created_at,
            region = ?d.metadata.region,
            dns = ?d.load_balancer_dns,
        );
    }
    Ok(())
}
