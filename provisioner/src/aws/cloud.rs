use super::{
    autoscaling, ec2, elb, sns, utils::load_sdk_config, AutoScalingConfig, Error,
    InstanceConfig, LaunchTemplateConfig, LoadBalancerConfig, PortConfig, ScalingPolicyConfig,
    SecurityGroupConfig, TargetGroupConfig,
};
use std::future::Future;

/// A load balancer created by [Cloud::create_load_balancer]
#[derive(Clone, Debug, PartialEq)]
pub struct LoadBalancer {
    pub arn: String,
    pub dns_name: Option<String>,
}

/// Outcome of a deletion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deletion {
    /// The resource existed and was deleted
    Deleted,
    /// The resource was already gone (for example, removed by an earlier, interrupted teardown)
    Missing,
}

/// The cloud APIs used to provision and destroy a deployment.
///
/// Each method issues a single logical API call and returns the identifier of the resource it
/// created. Deletions of resources that no longer exist succeed with [Deletion::Missing].
pub trait Cloud {
    /// Creates a security group in `vpc_id` and returns its ID.
    fn create_security_group(
        &self,
        config: &SecurityGroupConfig,
        vpc_id: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Opens `ports` on the security group `security_group_id`.
    fn authorize_ingress(
        &self,
        security_group_id: &str,
        ports: &[PortConfig],
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Creates a load balancer across `subnets` guarded by `security_group_id`.
    fn create_load_balancer(
        &self,
        config: &LoadBalancerConfig,
        subnets: &[String],
        security_group_id: &str,
    ) -> impl Future<Output = Result<LoadBalancer, Error>> + Send;

    /// Creates a target group in `vpc_id` and returns its ARN.
    fn create_target_group(
        &self,
        config: &TargetGroupConfig,
        vpc_id: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Creates a listener forwarding `load_balancer_arn` traffic to `target_group_arn`.
    fn create_listener(
        &self,
        config: &LoadBalancerConfig,
        load_balancer_arn: &str,
        target_group_arn: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Creates a launch template and returns its ID.
    fn create_launch_template(
        &self,
        config: &LaunchTemplateConfig,
        instance: &InstanceConfig,
        security_group_id: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Creates an auto-scaling group and returns its name.
    fn create_auto_scaling_group(
        &self,
        config: &AutoScalingConfig,
        launch_template_id: &str,
        subnets: &[String],
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Attaches a scaling policy to `group` and returns the policy ARN.
    fn create_scaling_policy(
        &self,
        config: &ScalingPolicyConfig,
        group: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Creates a notification topic and returns its ARN.
    fn create_sns_topic(&self, name: &str) -> impl Future<Output = Result<String, Error>> + Send;

    /// Subscribes `endpoint` to `topic_arn` and returns the subscription ARN.
    fn create_sns_subscription(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Deletes a topic (and its subscriptions).
    fn delete_sns_topic(
        &self,
        topic_arn: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes an auto-scaling group (and its policies and instances), returning once it is gone.
    fn delete_auto_scaling_group(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes a listener.
    fn delete_listener(&self, arn: &str) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes a load balancer, returning once it is gone.
    fn delete_load_balancer(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes a target group (the listener forwarding to it must already be gone).
    fn delete_target_group(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes a launch template (the group launching from it must already be gone).
    fn delete_launch_template(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;

    /// Deletes a security group, waiting for dependent interfaces to be released.
    fn delete_security_group(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Deletion, Error>> + Send;
}

/// [Cloud] backed by the AWS SDK
pub struct Aws {
    tag: String,
    ec2: aws_sdk_ec2::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    autoscaling: aws_sdk_autoscaling::Client,
    sns: aws_sdk_sns::Client,
}

impl Aws {
    /// Creates clients for `region` (or the default region chain), tagging resources with `tag`
    pub async fn new(region: Option<String>, tag: &str) -> Self {
        let config = load_sdk_config(region).await;
        Self {
            tag: tag.to_string(),
            ec2: ec2::create_client(&config),
            elb: elb::create_client(&config),
            autoscaling: autoscaling::create_client(&config),
            sns: sns::create_client(&config),
        }
    }
}

impl Cloud for Aws {
    async fn create_security_group(
        &self,
        config: &SecurityGroupConfig,
        vpc_id: &str,
    ) -> Result<String, Error> {
        ec2::create_security_group(&self.ec2, config, vpc_id, &self.tag).await
    }

    async fn authorize_ingress(
        &self,
        security_group_id: &str,
        ports: &[PortConfig],
    ) -> Result<(), Error> {
        ec2::authorize_ingress(&self.ec2, security_group_id, ports).await
    }

    async fn create_load_balancer(
        &self,
        config: &LoadBalancerConfig,
        subnets: &[String],
        security_group_id: &str,
    ) -> Result<LoadBalancer, Error> {
        elb::create_load_balancer(&self.elb, config, subnets, security_group_id, &self.tag).await
    }

    async fn create_target_group(
        &self,
        config: &TargetGroupConfig,
        vpc_id: &str,
    ) -> Result<String, Error> {
        elb::create_target_group(&self.elb, config, vpc_id, &self.tag).await
    }

    async fn create_listener(
        &self,
        config: &LoadBalancerConfig,
        load_balancer_arn: &str,
        target_group_arn: &str,
    ) -> Result<String, Error> {
        elb::create_listener(&self.elb, config, load_balancer_arn, target_group_arn).await
    }

    async fn create_launch_template(
        &self,
        config: &LaunchTemplateConfig,
        instance: &InstanceConfig,
        security_group_id: &str,
    ) -> Result<String, Error> {
        ec2::create_launch_template(&self.ec2, config, instance, security_group_id, &self.tag)
            .await
    }

    async fn create_auto_scaling_group(
        &self,
        config: &AutoScalingConfig,
        launch_template_id: &str,
        subnets: &[String],
    ) -> Result<String, Error> {
        autoscaling::create_auto_scaling_group(
            &self.autoscaling,
            config,
            launch_template_id,
            subnets,
            &self.tag,
        )
        .await
    }

    async fn create_scaling_policy(
        &self,
        config: &ScalingPolicyConfig,
        group: &str,
    ) -> Result<String, Error> {
        autoscaling::put_scaling_policy(&self.autoscaling, config, group).await
    }

    async fn create_sns_topic(&self, name: &str) -> Result<String, Error> {
        sns::create_topic(&self.sns, name).await
    }

    async fn create_sns_subscription(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, Error> {
        sns::subscribe(&self.sns, topic_arn, protocol, endpoint).await
    }

    async fn delete_sns_topic(&self, topic_arn: &str) -> Result<Deletion, Error> {
        sns::delete_topic(&self.sns, topic_arn).await
    }

    async fn delete_auto_scaling_group(&self, group: &str) -> Result<Deletion, Error> {
        autoscaling::delete_auto_scaling_group(&self.autoscaling, group).await
    }

    async fn delete_listener(&self, arn: &str) -> Result<Deletion, Error> {
        elb::delete_listener(&self.elb, arn).await
    }

    async fn delete_load_balancer(&self, arn: &str) -> Result<Deletion, Error> {
        elb::delete_load_balancer(&self.elb, arn).await
    }

    async fn delete_target_group(&self, arn: &str) -> Result<Deletion, Error> {
        elb::delete_target_group(&self.elb, arn).await
    }

    async fn delete_launch_template(&self, id: &str) -> Result<Deletion, Error> {
        ec2::delete_launch_template(&self.ec2, id).await
    }

    async fn delete_security_group(&self, id: &str) -> Result<Deletion, Error> {
        ec2::delete_security_group(&self.ec2, id).await
    }
}
