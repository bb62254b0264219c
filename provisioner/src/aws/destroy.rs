//! `destroy` subcommand for `aws`

use crate::aws::{
    deployment_directory, Aws, Cloud, Config, Error, Metadata, Resources, DESTROYED_FILE_NAME,
    METADATA_FILE_NAME, RESOURCES_FILE_NAME,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::info;

/// Deletes every resource recorded in `ledger`, in reverse dependency order.
///
/// Each identifier is cleared from the ledger once its resource is gone (or found already
/// missing), so an interrupted teardown resumes where it stopped.
pub async fn teardown<C: Cloud>(cloud: &C, ledger: &Path) -> Result<(), Error> {
    let mut resources = Resources::load(ledger)?;

    // Deleting the topic removes its subscriptions
    if let Some(topic_arn) = resources.topic_arn.clone() {
        let outcome = cloud.delete_sns_topic(&topic_arn).await?;
        info!(topic = topic_arn.as_str(), ?outcome, "deleted SNS topic");
        resources.topic_arn = None;
        resources.subscription_arn = None;
        resources.persist(ledger)?;
    }

    // Deleting the group removes its policies and terminates its instances
    if let Some(group) = resources.auto_scaling_group_name.clone() {
        let outcome = cloud.delete_auto_scaling_group(&group).await?;
        info!(group = group.as_str(), ?outcome, "deleted auto-scaling group");
        resources.auto_scaling_group_name = None;
        resources.scaling_policy_arn = None;
        resources.persist(ledger)?;
    }

    if let Some(listener_arn) = resources.listener_arn.clone() {
        let outcome = cloud.delete_listener(&listener_arn).await?;
        info!(listener = listener_arn.as_str(), ?outcome, "deleted listener");
        resources.listener_arn = None;
        resources.persist(ledger)?;
    }

    if let Some(lb_arn) = resources.load_balancer_arn.clone() {
        let outcome = cloud.delete_load_balancer(&lb_arn).await?;
        info!(lb = lb_arn.as_str(), ?outcome, "deleted load balancer");
        resources.load_balancer_arn = None;
        resources.load_balancer_dns = None;
        resources.persist(ledger)?;
    }

    if let Some(tg_arn) = resources.target_group_arn.clone() {
        let outcome = cloud.delete_target_group(&tg_arn).await?;
        info!(tg = tg_arn.as_str(), ?outcome, "deleted target group");
        resources.target_group_arn = None;
        resources.persist(ledger)?;
    }

    if let Some(launch_template_id) = resources.launch_template_id.clone() {
        let outcome = cloud.delete_launch_template(&launch_template_id).await?;
        info!(
            launch_template = launch_template_id.as_str(),
            ?outcome,
            "deleted launch template"
        );
        resources.launch_template_id = None;
        resources.persist(ledger)?;
    }

    if let Some(sg_id) = resources.security_group_id.clone() {
        let outcome = cloud.delete_security_group(&sg_id).await?;
        info!(sg = sg_id.as_str(), ?outcome, "deleted security group");
        resources.security_group_id = None;
        resources.persist(ledger)?;
    }
    Ok(())
}

/// A deployment that can be destroyed
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub tag: String,
    pub directory: PathBuf,
    /// Region recorded at creation time, falling back to the configured one
    pub region: Option<String>,
}

/// Resolves the tag and configured region from a configuration file or a bare tag
fn resolve(config: Option<&PathBuf>, tag: Option<&str>) -> Result<(String, Option<String>), Error> {
    match (config, tag) {
        (Some(config), _) => {
            let config = Config::load(config)?;
            Ok((config.tag, config.region))
        }
        (None, Some(tag)) => Ok((tag.to_string(), None)),
        (None, None) => Err(Error::MissingTarget),
    }
}

/// Finds the deployment `tag` under `root`, refusing unknown or already destroyed deployments
pub fn locate(root: &Path, tag: &str, region: Option<String>) -> Result<Target, Error> {
    // Check deployment status
    let directory = root.join(tag);
    if !directory.exists() {
        return Err(Error::DeploymentDoesNotExist(tag.to_string()));
    }
    if directory.join(DESTROYED_FILE_NAME).exists() {
        return Err(Error::DeploymentAlreadyDestroyed(tag.to_string()));
    }

    // Prefer the region recorded at creation time
    let metadata_path = directory.join(METADATA_FILE_NAME);
    let region = if metadata_path.exists() {
        let metadata: Metadata = serde_yaml::from_reader(File::open(&metadata_path)?)?;
        metadata.region.or(region)
    } else {
        region
    };
    Ok(Target {
        tag: tag.to_string(),
        directory,
        region,
    })
}

/// Deletes the resources recorded for `target` and marks it destroyed
pub async fn retire<C: Cloud>(cloud: &C, target: &Target) -> Result<(), Error> {
    // Delete resources (nothing was created if the ledger was never written)
    let ledger = target.directory.join(RESOURCES_FILE_NAME);
    if ledger.exists() {
        teardown(cloud, &ledger).await?;
    } else {
        info!(tag = target.tag.as_str(), "no resources recorded");
    }

    // Mark deployment as destroyed
    File::create(target.directory.join(DESTROYED_FILE_NAME))?;
    info!(tag = target.tag.as_str(), "deployment destroyed");
    Ok(())
}

/// Tears down a deployment identified by its configuration file or tag
pub async fn destroy(config: Option<&PathBuf>, tag: Option<&str>) -> Result<(), Error> {
    let (tag, region) = resolve(config, tag)?;
    info!(tag = tag.as_str(), "destroying deployment");
    let target = locate(&deployment_directory()?, &tag, region)?;
    let cloud = Aws::new(target.region.clone(), &target.tag).await;
    retire(&cloud, &target).await
}
