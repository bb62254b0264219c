//! AWS deployment of the web tier.

use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use thiserror::Error;

pub mod autoscaling;
mod cloud;
pub use cloud::{Aws, Cloud, Deletion, LoadBalancer};
mod create;
pub use create::{create, deploy, prepare, provision};
mod destroy;
pub use destroy::{destroy, locate, retire, teardown, Target};
pub mod ec2;
pub mod elb;
mod list;
pub use list::{active, list, Deployment};
pub mod sns;
mod utils;

#[cfg(test)]
mod mocks;

/// Directory (under `$HOME`) where deployment state is stored
const DEPLOYMENTS_DIRECTORY: &str = ".provisioner";

/// File name that indicates the deployment completed
pub const CREATED_FILE_NAME: &str = "created";

/// File name that indicates the deployment was destroyed
pub const DESTROYED_FILE_NAME: &str = "destroyed";

/// File name for deployment metadata
pub const METADATA_FILE_NAME: &str = "metadata.yaml";

/// File name for the ledger of created resources
pub const RESOURCES_FILE_NAME: &str = "resources.yaml";

/// Extension of the ledger while it is being rewritten
const STAGING_EXTENSION: &str = "yaml.tmp";

/// Tag key applied to every taggable resource
pub const DEPLOYMENT_TAG_KEY: &str = "provisioner";

pub const CMD: &str = "aws";
pub const CREATE_CMD: &str = "create";
pub const DESTROY_CMD: &str = "destroy";
pub const LIST_CMD: &str = "list";

/// API call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateSecurityGroup,
    AuthorizeSecurityGroupIngress,
    DeleteSecurityGroup,
    CreateLaunchTemplate,
    DeleteLaunchTemplate,
    CreateLoadBalancer,
    DescribeLoadBalancers,
    DeleteLoadBalancer,
    CreateTargetGroup,
    DeleteTargetGroup,
    CreateListener,
    DeleteListener,
    CreateAutoScalingGroup,
    DescribeAutoScalingGroups,
    DeleteAutoScalingGroup,
    PutScalingPolicy,
    CreateTopic,
    Subscribe,
    DeleteTopic,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::CreateSecurityGroup => "CreateSecurityGroup",
            Operation::AuthorizeSecurityGroupIngress => "AuthorizeSecurityGroupIngress",
            Operation::DeleteSecurityGroup => "DeleteSecurityGroup",
            Operation::CreateLaunchTemplate => "CreateLaunchTemplate",
            Operation::DeleteLaunchTemplate => "DeleteLaunchTemplate",
            Operation::CreateLoadBalancer => "CreateLoadBalancer",
            Operation::DescribeLoadBalancers => "DescribeLoadBalancers",
            Operation::DeleteLoadBalancer => "DeleteLoadBalancer",
            Operation::CreateTargetGroup => "CreateTargetGroup",
            Operation::DeleteTargetGroup => "DeleteTargetGroup",
            Operation::CreateListener => "CreateListener",
            Operation::DeleteListener => "DeleteListener",
            Operation::CreateAutoScalingGroup => "CreateAutoScalingGroup",
            Operation::DescribeAutoScalingGroups => "DescribeAutoScalingGroups",
            Operation::DeleteAutoScalingGroup => "DeleteAutoScalingGroup",
            Operation::PutScalingPolicy => "PutScalingPolicy",
            Operation::CreateTopic => "CreateTopic",
            Operation::Subscribe => "Subscribe",
            Operation::DeleteTopic => "DeleteTopic",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when provisioning or destroying a deployment
#[derive(Error, Debug)]
pub enum Error {
    #[error("EC2 error during {operation}: {source}")]
    AwsEc2 {
        operation: Operation,
        #[source]
        source: Box<aws_sdk_ec2::Error>,
    },
    #[error("ELB error during {operation}: {source}")]
    AwsElb {
        operation: Operation,
        #[source]
        source: Box<aws_sdk_elasticloadbalancingv2::Error>,
    },
    #[error("Auto Scaling error during {operation}: {source}")]
    AwsAutoScaling {
        operation: Operation,
        #[source]
        source: Box<aws_sdk_autoscaling::Error>,
    },
    #[error("SNS error during {operation}: {source}")]
    AwsSns {
        operation: Operation,
        #[source]
        source: Box<aws_sdk_sns::Error>,
    },
    #[error("{operation} response missing {field}")]
    MissingField {
        operation: Operation,
        field: &'static str,
    },
    #[error("invalid request: {0}")]
    Build(#[from] aws_sdk_elasticloadbalancingv2::error::BuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("HOME is not set")]
    HomeNotSet,
    #[error("no configuration or tag provided")]
    MissingTarget,
    #[error("creation already attempted")]
    CreationAttempted,
    #[error("deployment does not exist: {0}")]
    DeploymentDoesNotExist(String),
    #[error("deployment already destroyed: {0}")]
    DeploymentAlreadyDestroyed(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// Port to open on the security group
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PortConfig {
    pub protocol: String,
    pub port: u16,
    pub cidr: String,
}

/// Machine image and size of every instance in the auto-scaling group
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InstanceConfig {
    pub image_id: String,
    pub instance_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SecurityGroupConfig {
    pub name: String,
    pub description: String,
    pub ports: Vec<PortConfig>,
}

impl Default for SecurityGroupConfig {
    fn default() -> Self {
        let open = |port| PortConfig {
            protocol: "tcp".to_string(),
            port,
            cidr: "0.0.0.0/0".to_string(),
        };
        Self {
            name: "app-sg-1".to_string(),
            description: "Allow HTTP and HTTPS traffic".to_string(),
            ports: vec![open(80), open(443)],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub name: String,
    pub scheme: String,
    pub listener_protocol: String,
    pub listener_port: u16,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            name: "app-alb".to_string(),
            scheme: "internet-facing".to_string(),
            listener_protocol: "HTTP".to_string(),
            listener_port: 80,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub protocol: String,
    pub port: String,
    pub path: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    pub healthy_threshold: i32,
    pub unhealthy_threshold: i32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            protocol: "HTTP".to_string(),
            port: "80".to_string(),
            path: "/".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold: 5,
            unhealthy_threshold: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TargetGroupConfig {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub target_type: String,
    pub health_check: HealthCheckConfig,
}

impl Default for TargetGroupConfig {
    fn default() -> Self {
        Self {
            name: "app-target-group".to_string(),
            protocol: "HTTP".to_string(),
            port: 80,
            target_type: "instance".to_string(),
            health_check: HealthCheckConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LaunchTemplateConfig {
    pub name: String,
    /// `Name` tag applied to launched instances
    pub instance_name: String,
}

impl Default for LaunchTemplateConfig {
    fn default() -> Self {
        Self {
            name: "app-Template".to_string(),
            instance_name: "app-ec2".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScalingPolicyConfig {
    pub name: String,
    pub metric: String,
    pub target_value: f64,
}

impl Default for ScalingPolicyConfig {
    fn default() -> Self {
        Self {
            name: "cpu-utilization-policy".to_string(),
            metric: "ASGAverageCPUUtilization".to_string(),
            target_value: 50.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AutoScalingConfig {
    pub name: String,
    pub min_size: i32,
    pub max_size: i32,
    pub desired_capacity: i32,
    pub policy: ScalingPolicyConfig,
}

impl Default for AutoScalingConfig {
    fn default() -> Self {
        Self {
            name: "app-asg-1".to_string(),
            min_size: 1,
            max_size: 5,
            desired_capacity: 1,
            policy: ScalingPolicyConfig::default(),
        }
    }
}

fn default_topic() -> String {
    "scaling-events".to_string()
}

fn default_protocol() -> String {
    "email".to_string()
}

/// Where scaling events are delivered
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub endpoint: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub tag: String,
    #[serde(default)]
    pub region: Option<String>,
    pub vpc_id: String,
    pub subnets: Vec<String>,
    pub instance: InstanceConfig,
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub security_group: SecurityGroupConfig,
    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,
    #[serde(default)]
    pub target_group: TargetGroupConfig,
    #[serde(default)]
    pub launch_template: LaunchTemplateConfig,
    #[serde(default)]
    pub auto_scaling: AutoScalingConfig,
}

impl Config {
    /// Loads a configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

/// Deployment metadata persisted before any resource is created
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Metadata {
    pub tag: String,
    pub created_at: u64,
    pub region: Option<String>,
}

/// Identifiers of every resource created for a deployment
///
/// Fields are filled in as `create` progresses and cleared as `destroy` progresses.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Resources {
    pub security_group_id: Option<String>,
    pub load_balancer_arn: Option<String>,
    pub load_balancer_dns: Option<String>,
    pub target_group_arn: Option<String>,
    pub listener_arn: Option<String>,
    pub launch_template_id: Option<String>,
    pub auto_scaling_group_name: Option<String>,
    pub scaling_policy_arn: Option<String>,
    pub topic_arn: Option<String>,
    pub subscription_arn: Option<String>,
}

impl Resources {
    /// Loads the ledger at `path`
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Replaces the ledger at `path`
    ///
    /// The ledger is staged next to `path` and renamed into place, so an interrupted write never
    /// leaves a truncated ledger behind.
    pub fn persist(&self, path: &Path) -> Result<(), Error> {
        let staging = path.with_extension(STAGING_EXTENSION);
        let mut file = File::create(&staging)?;
        serde_yaml::to_writer(&mut file, self)?;
        file.sync_all()?;
        fs::rename(&staging, path)?;
        Ok(())
    }

    /// Returns true if no resource remains
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Returns the directory holding all deployments (one subdirectory per tag)
pub fn deployment_directory() -> Result<PathBuf, Error> {
    let home = std::env::var_os("HOME").ok_or(Error::HomeNotSet)?;
    Ok(PathBuf::from(home).join(DEPLOYMENTS_DIRECTORY))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
tag: app
vpc_id: vpc-0f22c13329dc40837
subnets:
  - subnet-0dc085f68a4254e66
  - subnet-05c5c244dc8e4409a
instance:
  image_id: ami-01312848387ace2b4
  instance_type: t2.micro
notifications:
  endpoint: ops@example.com
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.tag, "app");
        assert_eq!(config.region, None);
        assert_eq!(config.subnets.len(), 2);
        assert_eq!(config.notifications.topic, "scaling-events");
        assert_eq!(config.notifications.protocol, "email");

        assert_eq!(config.security_group.name, "app-sg-1");
        let ports: Vec<u16> = config.security_group.ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![80, 443]);
        assert!(config
            .security_group
            .ports
            .iter()
            .all(|p| p.protocol == "tcp" && p.cidr == "0.0.0.0/0"));

        assert_eq!(config.load_balancer.name, "app-alb");
        assert_eq!(config.load_balancer.scheme, "internet-facing");
        assert_eq!(config.target_group.name, "app-target-group");
        assert_eq!(config.target_group.health_check, HealthCheckConfig::default());
        assert_eq!(config.launch_template.name, "app-Template");
        assert_eq!(config.launch_template.instance_name, "app-ec2");
        assert_eq!(config.auto_scaling.name, "app-asg-1");
        assert_eq!(config.auto_scaling.min_size, 1);
        assert_eq!(config.auto_scaling.max_size, 5);
        assert_eq!(config.auto_scaling.desired_capacity, 1);
        assert_eq!(config.auto_scaling.policy.metric, "ASGAverageCPUUtilization");
        assert_eq!(config.auto_scaling.policy.target_value, 50.0);
    }

    #[test]
    fn test_partial_section_keeps_remaining_defaults() {
        let yaml = format!(
            "{MINIMAL}auto_scaling:\n  max_size: 10\n  policy:\n    target_value: 70.0\n"
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.auto_scaling.name, "app-asg-1");
        assert_eq!(config.auto_scaling.min_size, 1);
        assert_eq!(config.auto_scaling.max_size, 10);
        assert_eq!(config.auto_scaling.policy.name, "cpu-utilization-policy");
        assert_eq!(config.auto_scaling.policy.target_value, 70.0);
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let yaml = MINIMAL.replace("  endpoint: ops@example.com\n", "  topic: other\n");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn test_resources_persist_and_load() {
        let dir = std::env::temp_dir().join("provisioner_test_resources_persist_and_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(RESOURCES_FILE_NAME);

        let mut resources = Resources::default();
        assert!(resources.is_empty());
        resources.security_group_id = Some("sg-123".to_string());
        resources.topic_arn = Some("arn:aws:sns:us-east-1:123:scaling-events".to_string());
        resources.persist(&path).unwrap();
        assert!(!resources.is_empty());

        let loaded = Resources::load(&path).unwrap();
        assert_eq!(loaded, resources);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resources_persist_replaces_ledger() {
        let dir = std::env::temp_dir().join("provisioner_test_resources_persist_replaces_ledger");
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(RESOURCES_FILE_NAME);

        let first = Resources {
            security_group_id: Some("sg-123".to_string()),
            load_balancer_arn: Some("arn:lb".to_string()),
            ..Default::default()
        };
        first.persist(&path).unwrap();
        let second = Resources {
            security_group_id: Some("sg-123".to_string()),
            ..Default::default()
        };
        second.persist(&path).unwrap();

        // Only the ledger remains, holding the latest state
        assert_eq!(Resources::load(&path).unwrap(), second);
        assert!(!path.with_extension(STAGING_EXTENSION).exists());
        let entries = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(entries, 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
