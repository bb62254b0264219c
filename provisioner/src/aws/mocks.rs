//! In-memory [Cloud] that records every call.

use super::{
    AutoScalingConfig, Cloud, Deletion, Error, InstanceConfig, LaunchTemplateConfig,
    LoadBalancer, LoadBalancerConfig, PortConfig, ScalingPolicyConfig, SecurityGroupConfig,
    TargetGroupConfig,
};
use std::{collections::HashSet, sync::Mutex};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateSecurityGroup {
        name: String,
        vpc_id: String,
    },
    AuthorizeIngress {
        security_group_id: String,
        ports: Vec<u16>,
    },
    CreateLoadBalancer {
        name: String,
        subnets: Vec<String>,
        security_group_id: String,
    },
    CreateTargetGroup {
        name: String,
        vpc_id: String,
        port: u16,
        health_check_path: String,
    },
    CreateListener {
        load_balancer_arn: String,
        target_group_arn: String,
        port: u16,
    },
    CreateLaunchTemplate {
        name: String,
        image_id: String,
        instance_type: String,
        security_group_id: String,
    },
    CreateAutoScalingGroup {
        name: String,
        launch_template_id: String,
        subnets: Vec<String>,
        min_size: i32,
        max_size: i32,
        desired_capacity: i32,
    },
    CreateScalingPolicy {
        name: String,
        group: String,
        target_value: f64,
    },
    CreateSnsTopic {
        name: String,
    },
    CreateSnsSubscription {
        topic_arn: String,
        protocol: String,
        endpoint: String,
    },
    DeleteSnsTopic(String),
    DeleteAutoScalingGroup(String),
    DeleteListener(String),
    DeleteLoadBalancer(String),
    DeleteTargetGroup(String),
    DeleteLaunchTemplate(String),
    DeleteSecurityGroup(String),
}

/// Records calls and fails the call at index `fail_at` (if set)
///
/// Deleting an identifier in `missing` reports [Deletion::Missing].
#[derive(Default)]
pub struct MockCloud {
    calls: Mutex<Vec<Call>>,
    fail_at: Option<usize>,
    missing: HashSet<String>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn with_missing(mut self, ids: &[&str]) -> Self {
        self.missing.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), Error> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        calls.push(call);
        if self.fail_at == Some(index) {
            return Err(Error::Io(std::io::Error::other("injected failure")));
        }
        Ok(())
    }

    fn delete(&self, id: &str, call: Call) -> Result<Deletion, Error> {
        self.record(call)?;
        if self.missing.contains(id) {
            return Ok(Deletion::Missing);
        }
        Ok(Deletion::Deleted)
    }
}

impl Cloud for MockCloud {
    async fn create_security_group(
        &self,
        config: &SecurityGroupConfig,
        vpc_id: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateSecurityGroup {
            name: config.name.clone(),
            vpc_id: vpc_id.to_string(),
        })?;
        Ok("sg-0123".to_string())
    }

    async fn authorize_ingress(
        &self,
        security_group_id: &str,
        ports: &[PortConfig],
    ) -> Result<(), Error> {
        self.record(Call::AuthorizeIngress {
            security_group_id: security_group_id.to_string(),
            ports: ports.iter().map(|p| p.port).collect(),
        })
    }

    async fn create_load_balancer(
        &self,
        config: &LoadBalancerConfig,
        subnets: &[String],
        security_group_id: &str,
    ) -> Result<LoadBalancer, Error> {
        self.record(Call::CreateLoadBalancer {
            name: config.name.clone(),
            subnets: subnets.to_vec(),
            security_group_id: security_group_id.to_string(),
        })?;
        Ok(LoadBalancer {
            arn: format!("arn:lb/{}", config.name),
            dns_name: Some(format!("{}.elb.amazonaws.com", config.name)),
        })
    }

    async fn create_target_group(
        &self,
        config: &TargetGroupConfig,
        vpc_id: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateTargetGroup {
            name: config.name.clone(),
            vpc_id: vpc_id.to_string(),
            port: config.port,
            health_check_path: config.health_check.path.clone(),
        })?;
        Ok(format!("arn:tg/{}", config.name))
    }

    async fn create_listener(
        &self,
        config: &LoadBalancerConfig,
        load_balancer_arn: &str,
        target_group_arn: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateListener {
            load_balancer_arn: load_balancer_arn.to_string(),
            target_group_arn: target_group_arn.to_string(),
            port: config.listener_port,
        })?;
        Ok(format!("{load_balancer_arn}/listener"))
    }

    async fn create_launch_template(
        &self,
        config: &LaunchTemplateConfig,
        instance: &InstanceConfig,
        security_group_id: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateLaunchTemplate {
            name: config.name.clone(),
            image_id: instance.image_id.clone(),
            instance_type: instance.instance_type.clone(),
            security_group_id: security_group_id.to_string(),
        })?;
        Ok("lt-0456".to_string())
    }

    async fn create_auto_scaling_group(
        &self,
        config: &AutoScalingConfig,
        launch_template_id: &str,
        subnets: &[String],
    ) -> Result<String, Error> {
        self.record(Call::CreateAutoScalingGroup {
            name: config.name.clone(),
            launch_template_id: launch_template_id.to_string(),
            subnets: subnets.to_vec(),
            min_size: config.min_size,
            max_size: config.max_size,
            desired_capacity: config.desired_capacity,
        })?;
        Ok(config.name.clone())
    }

    async fn create_scaling_policy(
        &self,
        config: &ScalingPolicyConfig,
        group: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateScalingPolicy {
            name: config.name.clone(),
            group: group.to_string(),
            target_value: config.target_value,
        })?;
        Ok(format!("arn:policy/{}", config.name))
    }

    async fn create_sns_topic(&self, name: &str) -> Result<String, Error> {
        self.record(Call::CreateSnsTopic {
            name: name.to_string(),
        })?;
        Ok(format!("arn:sns/{name}"))
    }

    async fn create_sns_subscription(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, Error> {
        self.record(Call::CreateSnsSubscription {
            topic_arn: topic_arn.to_string(),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
        })?;
        Ok("pending confirmation".to_string())
    }

    async fn delete_sns_topic(&self, topic_arn: &str) -> Result<Deletion, Error> {
        self.delete(topic_arn, Call::DeleteSnsTopic(topic_arn.to_string()))
    }

    async fn delete_auto_scaling_group(&self, group: &str) -> Result<Deletion, Error> {
        self.delete(group, Call::DeleteAutoScalingGroup(group.to_string()))
    }

    async fn delete_listener(&self, arn: &str) -> Result<Deletion, Error> {
        self.delete(arn, Call::DeleteListener(arn.to_string()))
    }

    async fn delete_load_balancer(&self, arn: &str) -> Result<Deletion, Error> {
        self.delete(arn, Call::DeleteLoadBalancer(arn.to_string()))
    }

    async fn delete_target_group(&self, arn: &str) -> Result<Deletion, Error> {
        self.delete(arn, Call::DeleteTargetGroup(arn.to_string()))
    }

    async fn delete_launch_template(&self, id: &str) -> Result<Deletion, Error> {
        self.delete(id, Call::DeleteLaunchTemplate(id.to_string()))
    }

    async fn delete_security_group(&self, id: &str) -> Result<Deletion, Error> {
        self.delete(id, Call::DeleteSecurityGroup(id.to_string()))
    }
}
