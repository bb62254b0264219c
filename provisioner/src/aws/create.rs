//! `create` subcommand for `aws`

use crate::aws::{
    deployment_directory, utils::unix_now, Aws, Cloud, Config, Error, Metadata, Resources,
    CREATED_FILE_NAME, METADATA_FILE_NAME, RESOURCES_FILE_NAME,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::info;

/// Provisions every resource described by `config`, in dependency order.
///
/// The identifier of each resource is recorded in `ledger` as soon as the resource exists. The
/// first failure aborts the sequence and leaves earlier resources in place.
pub async fn provision<C: Cloud>(
    cloud: &C,
    config: &Config,
    ledger: &Path,
) -> Result<Resources, Error> {
    let mut resources = Resources::default();
    resources.persist(ledger)?;

    // Network entry point
    let sg_id = cloud
        .create_security_group(&config.security_group, &config.vpc_id)
        .await?;
    info!(
        sg = sg_id.as_str(),
        vpc = config.vpc_id.as_str(),
        "created security group"
    );
    resources.security_group_id = Some(sg_id.clone());
    resources.persist(ledger)?;
    cloud
        .authorize_ingress(&sg_id, &config.security_group.ports)
        .await?;
    info!(
        sg = sg_id.as_str(),
        ports = ?config.security_group.ports.iter().map(|p| p.port).collect::<Vec<_>>(),
        "authorized ingress"
    );

    let lb = cloud
        .create_load_balancer(&config.load_balancer, &config.subnets, &sg_id)
        .await?;
    info!(
        lb = lb.arn.as_str(),
        dns = ?lb.dns_name,
        subnets = ?config.subnets,
        "created load balancer"
    );
    resources.load_balancer_arn = Some(lb.arn.clone());
    resources.load_balancer_dns = lb.dns_name.clone();
    resources.persist(ledger)?;

    let tg_arn = cloud
        .create_target_group(&config.target_group, &config.vpc_id)
        .await?;
    info!(tg = tg_arn.as_str(), "created target group");
    resources.target_group_arn = Some(tg_arn.clone());
    resources.persist(ledger)?;

    let listener_arn = cloud
        .create_listener(&config.load_balancer, &lb.arn, &tg_arn)
        .await?;
    info!(
        listener = listener_arn.as_str(),
        lb = lb.arn.as_str(),
        tg = tg_arn.as_str(),
        "created listener"
    );
    resources.listener_arn = Some(listener_arn);
    resources.persist(ledger)?;

    // Compute
    let launch_template_id = cloud
        .create_launch_template(&config.launch_template, &config.instance, &sg_id)
        .await?;
    info!(
        launch_template = launch_template_id.as_str(),
        image = config.instance.image_id.as_str(),
        instance_type = config.instance.instance_type.as_str(),
        "created launch template"
    );
    resources.launch_template_id = Some(launch_template_id.clone());
    resources.persist(ledger)?;

    let group = cloud
        .create_auto_scaling_group(&config.auto_scaling, &launch_template_id, &config.subnets)
        .await?;
    info!(
        group = group.as_str(),
        min = config.auto_scaling.min_size,
        max = config.auto_scaling.max_size,
        desired = config.auto_scaling.desired_capacity,
        "created auto-scaling group"
    );
    resources.auto_scaling_group_name = Some(group.clone());
    resources.persist(ledger)?;

    let policy_arn = cloud
        .create_scaling_policy(&config.auto_scaling.policy, &group)
        .await?;
    info!(
        policy = policy_arn.as_str(),
        group = group.as_str(),
        "created scaling policy"
    );
    resources.scaling_policy_arn = Some(policy_arn);
    resources.persist(ledger)?;

    // Notifications
    let notifications = &config.notifications;
    let topic_arn = cloud.create_sns_topic(&notifications.topic).await?;
    info!(topic = topic_arn.as_str(), "created SNS topic");
    resources.topic_arn = Some(topic_arn.clone());
    resources.persist(ledger)?;

    let subscription_arn = cloud
        .create_sns_subscription(&topic_arn, &notifications.protocol, &notifications.endpoint)
        .await?;
    info!(
        subscription = subscription_arn.as_str(),
        protocol = notifications.protocol.as_str(),
        endpoint = notifications.endpoint.as_str(),
        "created SNS subscription"
    );
    resources.subscription_arn = Some(subscription_arn);
    resources.persist(ledger)?;

    Ok(resources)
}

/// Claims the directory for `config.tag` under `root` and records the deployment metadata
///
/// Fails with [Error::CreationAttempted] if the tag was used before, even if that attempt failed.
pub fn prepare(root: &Path, config: &Config) -> Result<PathBuf, Error> {
    // Create a directory for local state
    let tag = &config.tag;
    let tag_directory = root.join(tag);
    if tag_directory.exists() {
        return Err(Error::CreationAttempted);
    }
    std::fs::create_dir_all(&tag_directory)?;
    info!(path = ?tag_directory, "created tag directory");

    // Persist deployment metadata early to enable `destroy --tag` on failure
    let metadata = Metadata {
        tag: tag.clone(),
        created_at: unix_now(),
        region: config.region.clone(),
    };
    let metadata_file = File::create(tag_directory.join(METADATA_FILE_NAME))?;
    serde_yaml::to_writer(metadata_file, &metadata)?;
    info!("persisted deployment metadata");
    Ok(tag_directory)
}

/// Provisions `config` into the prepared `tag_directory`, marking it created on success
pub async fn deploy<C: Cloud>(
    cloud: &C,
    config: &Config,
    tag_directory: &Path,
) -> Result<Resources, Error> {
    let resources = provision(cloud, config, &tag_directory.join(RESOURCES_FILE_NAME)).await?;

    // Mark deployment as complete
    File::create(tag_directory.join(CREATED_FILE_NAME))?;
    info!(
        tag = config.tag.as_str(),
        dns = ?resources.load_balancer_dns,
        "infrastructure created"
    );
    Ok(resources)
}

/// Provisions the deployment described by the configuration at `config`
pub async fn create(config: &PathBuf) -> Result<(), Error> {
    // Load configuration from YAML file
    let config = Config::load(config)?;
    info!(tag = config.tag.as_str(), "loaded configuration");

    let tag_directory = prepare(&deployment_directory()?, &config)?;
    let cloud = Aws::new(config.region.clone(), &config.tag).await;
    deploy(&cloud, &config, &tag_directory).await?;
    Ok(())
}
