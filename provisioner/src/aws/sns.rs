//! AWS SNS SDK function wrappers

use super::{utils::is_not_found, Deletion, Error, Operation};
use aws_config::SdkConfig;
use aws_sdk_sns::Client as SnsClient;

/// Error code returned for a topic that no longer exists
const TOPIC_NOT_FOUND: &str = "NotFound";

/// Creates an SNS client from shared SDK configuration
pub fn create_client(config: &SdkConfig) -> SnsClient {
    SnsClient::new(config)
}

fn sns_error<E>(operation: Operation, err: E) -> Error
where
    aws_sdk_sns::Error: From<E>,
{
    Error::AwsSns {
        operation,
        source: Box::new(aws_sdk_sns::Error::from(err)),
    }
}

/// Creates (or returns the existing) topic named `name`
pub async fn create_topic(client: &SnsClient, name: &str) -> Result<String, Error> {
    let resp = client
        .create_topic()
        .name(name)
        .send()
        .await
        .map_err(|e| sns_error(Operation::CreateTopic, e.into_service_error()))?;
    resp.topic_arn()
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::CreateTopic,
            field: "TopicArn",
        })
}

/// Subscribes `endpoint` to `topic_arn`
///
/// Email subscriptions return `pending confirmation` until the recipient confirms.
pub async fn subscribe(
    client: &SnsClient,
    topic_arn: &str,
    protocol: &str,
    endpoint: &str,
) -> Result<String, Error> {
    let resp = client
        .subscribe()
        .topic_arn(topic_arn)
        .protocol(protocol)
        .endpoint(endpoint)
        .send()
        .await
        .map_err(|e| sns_error(Operation::Subscribe, e.into_service_error()))?;
    resp.subscription_arn()
        .map(str::to_string)
        .ok_or(Error::MissingField {
            operation: Operation::Subscribe,
            field: "SubscriptionArn",
        })
}

/// Deletes a topic along with its subscriptions
pub async fn delete_topic(client: &SnsClient, topic_arn: &str) -> Result<Deletion, Error> {
    match client.delete_topic().topic_arn(topic_arn).send().await {
        Ok(_) => Ok(Deletion::Deleted),
        Err(e) => {
            let err = e.into_service_error();
            if is_not_found(&err, &[TOPIC_NOT_FOUND]) {
                return Ok(Deletion::Missing);
            }
            Err(sns_error(Operation::DeleteTopic, err))
        }
    }
}
