//! AWS EC2 SDK function wrappers

use super::{
    utils::{is_not_found, MAX_POLL_ATTEMPTS, RETRY_INTERVAL},
    Deletion, Error, InstanceConfig, LaunchTemplateConfig, Operation, PortConfig,
    SecurityGroupConfig, DEPLOYMENT_TAG_KEY,
};
use aws_config::SdkConfig;
use aws_sdk_ec2::{
    error::ProvideErrorMetadata,
    operation::{
        authorize_security_group_ingress::builders::AuthorizeSecurityGroupIngressFluentBuilder,
        create_launch_template::builders::CreateLaunchTemplateFluentBuilder,
        create_security_group::builders::CreateSecurityGroupFluentBuilder,
    },
    types::{
        InstanceType, IpPermission, IpRange, LaunchTemplateTagSpecificationRequest,
        RequestLaunchTemplateData, ResourceType, Tag, TagSpecification,
    },
    Client as Ec2Client,
};
use tokio::time::sleep;
use tracing::{debug, info};

/// Error code returned while another resource still references a security group
const DEPENDENCY_VIOLATION: &str = "DependencyViolation";

/// Error code returned when deleting a security group that no longer exists
const GROUP_NOT_FOUND: &str = "InvalidGroup.NotFound";

/// Error code returned when deleting a launch template that no longer exists
const LAUNCH_TEMPLATE_NOT_FOUND: &str = "InvalidLaunchTemplateId.NotFound";

/// Creates an EC2 client from shared SDK configuration
pub fn create_client(config: &SdkConfig) -> Ec2Client {
    Ec2Client::new(config)
}

fn ec2_error<E>(operation: Operation, err: E) -> Error
where
    aws_sdk_ec2::Error: From<E>,
{
    Error::AwsEc2 {
        operation,
        source: Box::new(aws_sdk_ec2::Error::from(err)),
    }
}

fn deployment_tag(resource_type: ResourceType, tag: &str) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .tags(Tag::builder().key(DEPLOYMENT_TAG_KEY).value(tag).build())
        .build()
}

fn create_security_group_request(
    client: &Ec2Client,
    config: &SecurityGroupConfig,
    vpc_id: &str,
    tag: &str,
) -> CreateSecurityGroupFluentBuilder {
    client
        .create_security_group()
        .group_name(&config.name)
        .description(&config.description)
        .vpc_id(vpc_id)
        .tag_specifications(deployment_tag(ResourceType::SecurityGroup, tag))
}

/// Creates a security group in `vpc_id`
pub async fn create_security_group(
    client: &Ec2Client,
    config: &SecurityGroupConfig,
    vpc_id: &str,
    tag: &str,
) -> Result<String, Error> {
    let resp = create_security_group_request(client, config, vpc_id, tag)
        .send()
        .await
        .map_err(|e| ec2_error(Operation::CreateSecurityGroup, e.into_service_error()))?;
    resp.group_id()
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::CreateSecurityGroup,
            field: "GroupId",
        })
}

fn authorize_ingress_request(
    client: &Ec2Client,
    sg_id: &str,
    ports: &[PortConfig],
) -> AuthorizeSecurityGroupIngressFluentBuilder {
    let mut request = client.authorize_security_group_ingress().group_id(sg_id);
    for port in ports {
        request = request.ip_permissions(
            IpPermission::builder()
                .ip_protocol(&port.protocol)
                .from_port(port.port as i32)
                .to_port(port.port as i32)
                .ip_ranges(IpRange::builder().cidr_ip(&port.cidr).build())
                .build(),
        );
    }
    request
}

/// Opens `ports` on the security group `sg_id`
pub async fn authorize_ingress(
    client: &Ec2Client,
    sg_id: &str,
    ports: &[PortConfig],
) -> Result<(), Error> {
    authorize_ingress_request(client, sg_id, ports)
        .send()
        .await
        .map_err(|e| {
            ec2_error(
                Operation::AuthorizeSecurityGroupIngress,
                e.into_service_error(),
            )
        })?;
    debug!(sg = sg_id, ports = ports.len(), "authorized ingress");
    Ok(())
}

fn create_launch_template_request(
    client: &Ec2Client,
    config: &LaunchTemplateConfig,
    instance: &InstanceConfig,
    sg_id: &str,
    tag: &str,
) -> CreateLaunchTemplateFluentBuilder {
    let data = RequestLaunchTemplateData::builder()
        .image_id(&instance.image_id)
        .instance_type(InstanceType::from(instance.instance_type.as_str()))
        .security_group_ids(sg_id)
        .tag_specifications(
            LaunchTemplateTagSpecificationRequest::builder()
                .resource_type(ResourceType::Instance)
                .tags(
                    Tag::builder()
                        .key("Name")
                        .value(&config.instance_name)
                        .build(),
                )
                .tags(Tag::builder().key(DEPLOYMENT_TAG_KEY).value(tag).build())
                .build(),
        )
        .build();
    client
        .create_launch_template()
        .launch_template_name(&config.name)
        .launch_template_data(data)
        .tag_specifications(deployment_tag(ResourceType::LaunchTemplate, tag))
}

/// Creates a launch template for `instance` attached to `sg_id`
pub async fn create_launch_template(
    client: &Ec2Client,
    config: &LaunchTemplateConfig,
    instance: &InstanceConfig,
    sg_id: &str,
    tag: &str,
) -> Result<String, Error> {
    let resp = create_launch_template_request(client, config, instance, sg_id, tag)
        .send()
        .await
        .map_err(|e| ec2_error(Operation::CreateLaunchTemplate, e.into_service_error()))?;
    resp.launch_template()
        .and_then(|t| t.launch_template_id())
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::CreateLaunchTemplate,
            field: "LaunchTemplateId",
        })
}

/// Deletes a launch template
pub async fn delete_launch_template(client: &Ec2Client, id: &str) -> Result<Deletion, Error> {
    match client.delete_launch_template().launch_template_id(id).send().await {
        Ok(_) => Ok(Deletion::Deleted),
        Err(e) => {
            let err = e.into_service_error();
            if is_not_found(&err, &[LAUNCH_TEMPLATE_NOT_FOUND]) {
                return Ok(Deletion::Missing);
            }
            Err(ec2_error(Operation::DeleteLaunchTemplate, err))
        }
    }
}

/// Deletes a security group, retrying while load balancer or instance interfaces still reference it
pub async fn delete_security_group(client: &Ec2Client, sg_id: &str) -> Result<Deletion, Error> {
    for attempt in 0..MAX_POLL_ATTEMPTS {
        match client.delete_security_group().group_id(sg_id).send().await {
            Ok(_) => return Ok(Deletion::Deleted),
            Err(e) => {
                let err = e.into_service_error();
                if is_not_found(&err, &[GROUP_NOT_FOUND]) {
                    return Ok(Deletion::Missing);
                }
                if err.code() != Some(DEPENDENCY_VIOLATION) {
                    return Err(ec2_error(Operation::DeleteSecurityGroup, err));
                }
                info!(sg = sg_id, attempt, "security group still in use");
            }
        }
        sleep(RETRY_INTERVAL).await;
    }
    Err(Error::Timeout(format!("security group {sg_id} to be released")))
}
