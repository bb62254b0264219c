//! AWS Elastic Load Balancing (v2) SDK function wrappers

use super::{
    utils::{is_not_found, MAX_POLL_ATTEMPTS, RETRY_INTERVAL},
    Deletion, Error, LoadBalancer, LoadBalancerConfig, Operation, TargetGroupConfig,
    DEPLOYMENT_TAG_KEY,
};
use aws_config::SdkConfig;
use aws_sdk_elasticloadbalancingv2::{
    operation::{
        create_listener::builders::CreateListenerFluentBuilder,
        create_load_balancer::builders::CreateLoadBalancerFluentBuilder,
        create_target_group::builders::CreateTargetGroupFluentBuilder,
    },
    types::{
        Action, ActionTypeEnum, LoadBalancerSchemeEnum, LoadBalancerTypeEnum, ProtocolEnum, Tag,
        TargetTypeEnum,
    },
    Client as ElbClient,
};
use tokio::time::sleep;
use tracing::debug;

/// Error code returned for a listener that no longer exists
const LISTENER_NOT_FOUND: &str = "ListenerNotFound";

/// Error code returned for a load balancer that no longer exists
const LOAD_BALANCER_NOT_FOUND: &str = "LoadBalancerNotFound";

/// Error code returned for a target group that no longer exists
const TARGET_GROUP_NOT_FOUND: &str = "TargetGroupNotFound";

/// Creates an Elastic Load Balancing client from shared SDK configuration
pub fn create_client(config: &SdkConfig) -> ElbClient {
    ElbClient::new(config)
}

fn elb_error<E>(operation: Operation, err: E) -> Error
where
    aws_sdk_elasticloadbalancingv2::Error: From<E>,
{
    Error::AwsElb {
        operation,
        source: Box::new(aws_sdk_elasticloadbalancingv2::Error::from(err)),
    }
}

fn deployment_tag(tag: &str) -> Result<Tag, Error> {
    Ok(Tag::builder().key(DEPLOYMENT_TAG_KEY).value(tag).build()?)
}

fn create_load_balancer_request(
    client: &ElbClient,
    config: &LoadBalancerConfig,
    subnets: &[String],
    sg_id: &str,
    tag: &str,
) -> Result<CreateLoadBalancerFluentBuilder, Error> {
    Ok(client
        .create_load_balancer()
        .name(&config.name)
        .set_subnets(Some(subnets.to_vec()))
        .security_groups(sg_id)
        .scheme(LoadBalancerSchemeEnum::from(config.scheme.as_str()))
        .r#type(LoadBalancerTypeEnum::Application)
        .tags(Tag::builder().key("Name").value(&config.name).build()?)
        .tags(deployment_tag(tag)?))
}

/// Creates an application load balancer across `subnets`, guarded by `sg_id`
pub async fn create_load_balancer(
    client: &ElbClient,
    config: &LoadBalancerConfig,
    subnets: &[String],
    sg_id: &str,
    tag: &str,
) -> Result<LoadBalancer, Error> {
    let resp = create_load_balancer_request(client, config, subnets, sg_id, tag)?
        .send()
        .await
        .map_err(|e| elb_error(Operation::CreateLoadBalancer, e.into_service_error()))?;
    let lb = resp.load_balancers().first().ok_or(Error::MissingField {
        operation: Operation::CreateLoadBalancer,
        field: "LoadBalancers",
    })?;
    let arn = lb.load_balancer_arn().ok_or(Error::MissingField {
        operation: Operation::CreateLoadBalancer,
        field: "LoadBalancerArn",
    })?;
    Ok(LoadBalancer {
        arn: arn.to_string(),
        dns_name: lb.dns_name().map(str::to_string),
    })
}

fn create_target_group_request(
    client: &ElbClient,
    config: &TargetGroupConfig,
    vpc_id: &str,
    tag: &str,
) -> Result<CreateTargetGroupFluentBuilder, Error> {
    let health = &config.health_check;
    Ok(client
        .create_target_group()
        .name(&config.name)
        .protocol(ProtocolEnum::from(config.protocol.as_str()))
        .port(config.port as i32)
        .vpc_id(vpc_id)
        .health_check_protocol(ProtocolEnum::from(health.protocol.as_str()))
        .health_check_port(&health.port)
        .health_check_path(&health.path)
        .health_check_interval_seconds(health.interval_seconds)
        .health_check_timeout_seconds(health.timeout_seconds)
        .healthy_threshold_count(health.healthy_threshold)
        .unhealthy_threshold_count(health.unhealthy_threshold)
        .target_type(TargetTypeEnum::from(config.target_type.as_str()))
        .tags(deployment_tag(tag)?))
}

/// Creates a target group in `vpc_id`
pub async fn create_target_group(
    client: &ElbClient,
    config: &TargetGroupConfig,
    vpc_id: &str,
    tag: &str,
) -> Result<String, Error> {
    let resp = create_target_group_request(client, config, vpc_id, tag)?
        .send()
        .await
        .map_err(|e| elb_error(Operation::CreateTargetGroup, e.into_service_error()))?;
    resp.target_groups()
        .first()
        .and_then(|tg| tg.target_group_arn())
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::CreateTargetGroup,
            field: "TargetGroupArn",
        })
}

fn create_listener_request(
    client: &ElbClient,
    config: &LoadBalancerConfig,
    lb_arn: &str,
    tg_arn: &str,
) -> Result<CreateListenerFluentBuilder, Error> {
    Ok(client
        .create_listener()
        .load_balancer_arn(lb_arn)
        .protocol(ProtocolEnum::from(config.listener_protocol.as_str()))
        .port(config.listener_port as i32)
        .default_actions(
            Action::builder()
                .r#type(ActionTypeEnum::Forward)
                .target_group_arn(tg_arn)
                .build()?,
        ))
}

/// Creates a listener on `lb_arn` that forwards to `tg_arn`
pub async fn create_listener(
    client: &ElbClient,
    config: &LoadBalancerConfig,
    lb_arn: &str,
    tg_arn: &str,
) -> Result<String, Error> {
    let resp = create_listener_request(client, config, lb_arn, tg_arn)?
        .send()
        .await
        .map_err(|e| elb_error(Operation::CreateListener, e.into_service_error()))?;
    resp.listeners()
        .first()
        .and_then(|l| l.listener_arn())
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::CreateListener,
            field: "ListenerArn",
        })
}

/// Deletes a listener
pub async fn delete_listener(client: &ElbClient, arn: &str) -> Result<Deletion, Error> {
    match client.delete_listener().listener_arn(arn).send().await {
        Ok(_) => Ok(Deletion::Deleted),
        Err(e) => {
            let err = e.into_service_error();
            if is_not_found(&err, &[LISTENER_NOT_FOUND]) {
                return Ok(Deletion::Missing);
            }
            Err(elb_error(Operation::DeleteListener, err))
        }
    }
}

/// Deletes a load balancer and waits until it no longer exists
pub async fn delete_load_balancer(client: &ElbClient, arn: &str) -> Result<Deletion, Error> {
    if let Err(e) = client
        .delete_load_balancer()
        .load_balancer_arn(arn)
        .send()
        .await
    {
        let err = e.into_service_error();
        if is_not_found(&err, &[LOAD_BALANCER_NOT_FOUND]) {
            return Ok(Deletion::Missing);
        }
        return Err(elb_error(Operation::DeleteLoadBalancer, err));
    }
    for attempt in 0..MAX_POLL_ATTEMPTS {
        match client
            .describe_load_balancers()
            .load_balancer_arns(arn)
            .send()
            .await
        {
            Ok(resp) if resp.load_balancers().is_empty() => return Ok(Deletion::Deleted),
            Ok(_) => {
                debug!(lb = arn, attempt, "load balancer still deleting");
            }
            Err(e) => {
                let err = e.into_service_error();
                if err.is_load_balancer_not_found_exception() {
                    return Ok(Deletion::Deleted);
                }
                return Err(elb_error(Operation::DescribeLoadBalancers, err));
            }
        }
        sleep(RETRY_INTERVAL).await;
    }
    Err(Error::Timeout(format!("load balancer {arn} to be deleted")))
}

/// Deletes a target group
pub async fn delete_target_group(client: &ElbClient, arn: &str) -> Result<Deletion, Error> {
    match client.delete_target_group().target_group_arn(arn).send().await {
        Ok(_) => Ok(Deletion::Deleted),
        Err(e) => {
            let err = e.into_service_error();
            if is_not_found(&err, &[TARGET_GROUP_NOT_FOUND]) {
                return Ok(Deletion::Missing);
            }
            Err(elb_error(Operation::DeleteTargetGroup, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{utils::test_sdk_config, HealthCheckConfig};

    fn client() -> ElbClient {
        create_client(&test_sdk_config())
    }

    #[test]
    fn test_load_balancer_request() {
        let subnets = vec!["subnet-a".to_string(), "subnet-b".to_string()];
        let config = LoadBalancerConfig::default();
        let request =
            create_load_balancer_request(&client(), &config, &subnets, "sg-1", "app").unwrap();
        let input = request.as_input();
        assert_eq!(input.get_name().as_deref(), Some("app-alb"));
        assert_eq!(input.get_subnets().as_ref(), Some(&subnets));
        assert_eq!(input.get_security_groups().as_ref(), Some(&vec!["sg-1".to_string()]));
        assert_eq!(
            input.get_scheme().as_ref(),
            Some(&LoadBalancerSchemeEnum::InternetFacing)
        );
        assert_eq!(
            input.get_type().as_ref(),
            Some(&LoadBalancerTypeEnum::Application)
        );
        assert_eq!(
            input.get_tags().clone().unwrap(),
            vec![
                Tag::builder().key("Name").value("app-alb").build().unwrap(),
                deployment_tag("app").unwrap(),
            ]
        );
    }

    #[test]
    fn test_target_group_request_carries_health_check() {
        let config = TargetGroupConfig {
            health_check: HealthCheckConfig {
                path: "/health".to_string(),
                interval_seconds: 15,
                ..Default::default()
            },
            ..Default::default()
        };
        let request = create_target_group_request(&client(), &config, "vpc-1", "app").unwrap();
        let input = request.as_input();
        assert_eq!(input.get_name().as_deref(), Some("app-target-group"));
        assert_eq!(input.get_protocol().as_ref(), Some(&ProtocolEnum::Http));
        assert_eq!(*input.get_port(), Some(80));
        assert_eq!(input.get_vpc_id().as_deref(), Some("vpc-1"));
        assert_eq!(input.get_target_type().as_ref(), Some(&TargetTypeEnum::Instance));
        assert_eq!(
            input.get_health_check_protocol().as_ref(),
            Some(&ProtocolEnum::Http)
        );
        assert_eq!(input.get_health_check_port().as_deref(), Some("80"));
        assert_eq!(input.get_health_check_path().as_deref(), Some("/health"));
        assert_eq!(*input.get_health_check_interval_seconds(), Some(15));
        assert_eq!(*input.get_health_check_timeout_seconds(), Some(5));
        assert_eq!(*input.get_healthy_threshold_count(), Some(5));
        assert_eq!(*input.get_unhealthy_threshold_count(), Some(2));
    }

    #[test]
    fn test_listener_request_forwards_to_target_group() {
        let config = LoadBalancerConfig::default();
        let request =
            create_listener_request(&client(), &config, "arn:lb", "arn:tg").unwrap();
        let input = request.as_input();
        assert_eq!(input.get_load_balancer_arn().as_deref(), Some("arn:lb"));
        assert_eq!(input.get_protocol().as_ref(), Some(&ProtocolEnum::Http));
        assert_eq!(*input.get_port(), Some(80));
        assert_eq!(
            input.get_default_actions().clone().unwrap(),
            vec![Action::builder()
                .r#type(ActionTypeEnum::Forward)
                .target_group_arn("arn:tg")
                .build()
                .unwrap()]
        );
    }
}
