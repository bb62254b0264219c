//! AWS Auto Scaling SDK function wrappers

use super::{
    utils::{MAX_POLL_ATTEMPTS, RETRY_INTERVAL},
    AutoScalingConfig, Deletion, Error, Operation, ScalingPolicyConfig, DEPLOYMENT_TAG_KEY,
};
use aws_config::SdkConfig;
use aws_sdk_autoscaling::{
    operation::{
        create_auto_scaling_group::builders::CreateAutoScalingGroupFluentBuilder,
        put_scaling_policy::builders::PutScalingPolicyFluentBuilder,
    },
    types::{
        AutoScalingGroup, LaunchTemplateSpecification, MetricType, PredefinedMetricSpecification,
        Tag, TargetTrackingConfiguration,
    },
    Client as AutoScalingClient,
};
use tokio::time::sleep;
use tracing::debug;

/// Resource type used when tagging an auto-scaling group
const GROUP_RESOURCE_TYPE: &str = "auto-scaling-group";

/// Policy type for target tracking
const TARGET_TRACKING_POLICY: &str = "TargetTrackingScaling";

/// Status of a group whose deletion has already been requested
const DELETE_IN_PROGRESS: &str = "Delete in progress";

/// Creates an Auto Scaling client from shared SDK configuration
pub fn create_client(config: &SdkConfig) -> AutoScalingClient {
    AutoScalingClient::new(config)
}

fn autoscaling_error<E>(operation: Operation, err: E) -> Error
where
    aws_sdk_autoscaling::Error: From<E>,
{
    Error::AwsAutoScaling {
        operation,
        source: Box::new(aws_sdk_autoscaling::Error::from(err)),
    }
}

fn group_tag(group: &str, key: &str, value: &str) -> Result<Tag, Error> {
    Ok(Tag::builder()
        .resource_id(group)
        .resource_type(GROUP_RESOURCE_TYPE)
        .key(key)
        .value(value)
        .propagate_at_launch(true)
        .build()?)
}

fn create_auto_scaling_group_request(
    client: &AutoScalingClient,
    config: &AutoScalingConfig,
    launch_template_id: &str,
    subnets: &[String],
    tag: &str,
) -> Result<CreateAutoScalingGroupFluentBuilder, Error> {
    Ok(client
        .create_auto_scaling_group()
        .auto_scaling_group_name(&config.name)
        .launch_template(
            LaunchTemplateSpecification::builder()
                .launch_template_id(launch_template_id)
                .build(),
        )
        .min_size(config.min_size)
        .max_size(config.max_size)
        .desired_capacity(config.desired_capacity)
        .vpc_zone_identifier(subnets.join(","))
        .tags(group_tag(&config.name, "Name", &config.name)?)
        .tags(group_tag(&config.name, DEPLOYMENT_TAG_KEY, tag)?))
}

/// Creates an auto-scaling group from `launch_template_id` across `subnets`
///
/// Returns the name of the group (the identifier Auto Scaling uses for it).
pub async fn create_auto_scaling_group(
    client: &AutoScalingClient,
    config: &AutoScalingConfig,
    launch_template_id: &str,
    subnets: &[String],
    tag: &str,
) -> Result<String, Error> {
    create_auto_scaling_group_request(client, config, launch_template_id, subnets, tag)?
        .send()
        .await
        .map_err(|e| autoscaling_error(Operation::CreateAutoScalingGroup, e.into_service_error()))?;
    Ok(config.name.clone())
}

fn put_scaling_policy_request(
    client: &AutoScalingClient,
    config: &ScalingPolicyConfig,
    group: &str,
) -> Result<PutScalingPolicyFluentBuilder, Error> {
    let tracking = TargetTrackingConfiguration::builder()
        .predefined_metric_specification(
            PredefinedMetricSpecification::builder()
                .predefined_metric_type(MetricType::from(config.metric.as_str()))
                .build()?,
        )
        .target_value(config.target_value)
        .build()?;
    Ok(client
        .put_scaling_policy()
        .auto_scaling_group_name(group)
        .policy_name(&config.name)
        .policy_type(TARGET_TRACKING_POLICY)
        .target_tracking_configuration(tracking))
}

/// Attaches a target-tracking scaling policy to `group`
pub async fn put_scaling_policy(
    client: &AutoScalingClient,
    config: &ScalingPolicyConfig,
    group: &str,
) -> Result<String, Error> {
    let resp = put_scaling_policy_request(client, config, group)?
        .send()
        .await
        .map_err(|e| autoscaling_error(Operation::PutScalingPolicy, e.into_service_error()))?;
    resp.policy_arn()
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::PutScalingPolicy,
            field: "PolicyARN",
        })
}

async fn describe_group(
    client: &AutoScalingClient,
    group: &str,
) -> Result<Option<AutoScalingGroup>, Error> {
    let resp = client
        .describe_auto_scaling_groups()
        .auto_scaling_group_names(group)
        .send()
        .await
        .map_err(|e| {
            autoscaling_error(Operation::DescribeAutoScalingGroups, e.into_service_error())
        })?;
    Ok(resp.auto_scaling_groups().first().cloned())
}

/// Force-deletes `group` (terminating its instances) and waits until it no longer exists
///
/// A group that is already gone is left alone, and a group already being deleted is only
/// waited on.
pub async fn delete_auto_scaling_group(
    client: &AutoScalingClient,
    group: &str,
) -> Result<Deletion, Error> {
    match describe_group(client, group).await? {
        None => return Ok(Deletion::Missing),
        Some(existing) if existing.status() == Some(DELETE_IN_PROGRESS) => {
            debug!(group, "auto-scaling group already deleting");
        }
        Some(_) => {
            client
                .delete_auto_scaling_group()
                .auto_scaling_group_name(group)
                .force_delete(true)
                .send()
                .await
                .map_err(|e| {
                    autoscaling_error(Operation::DeleteAutoScalingGroup, e.into_service_error())
                })?;
        }
    }
    for attempt in 0..MAX_POLL_ATTEMPTS {
        if describe_group(client, group).await?.is_none() {
            return Ok(Deletion::Deleted);
        }
        debug!(group, attempt, "auto-scaling group still deleting");
        sleep(RETRY_INTERVAL).await;
    }
    Err(Error::Timeout(format!("auto-scaling group {group} to be deleted")))
}
