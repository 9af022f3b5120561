use crate::config::DynamoDbConfig;
use crate::error::MetadataError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Builder as DynamoConfigBuilder;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Identifier-keyed access to the lookup index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Upsert the entry for `id`, fully replacing any previously stored
    /// fields. Fields absent from this write are not preserved.
    async fn put(&self, id: &str, fields: &BTreeMap<String, String>) -> Result<(), MetadataError>;

    /// Fetch the stored field mapping, or `None` if the identifier was never
    /// indexed. Absence is not an error.
    async fn get(&self, id: &str) -> Result<Option<BTreeMap<String, String>>, MetadataError>;
}

/// Index store gateway backed by DynamoDB.
pub struct DynamoIndexStore {
    client: DynamoClient,
    table_name: String,
    key_attribute: String,
}

impl DynamoIndexStore {
    pub async fn new(config: &DynamoDbConfig) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut dynamo_config_builder = DynamoConfigBuilder::from(&aws_config);

        // Custom endpoint for DynamoDB Local/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            dynamo_config_builder = dynamo_config_builder.endpoint_url(endpoint_url);
        }

        let client = DynamoClient::from_conf(dynamo_config_builder.build());

        info!(table = %config.table_name, "DynamoDB index store initialized");

        Ok(Self {
            client,
            table_name: config.table_name.clone(),
            key_attribute: config.key_attribute.clone(),
        })
    }
}

#[async_trait]
impl IndexStore for DynamoIndexStore {
    #[instrument(skip(self, fields))]
    async fn put(&self, id: &str, fields: &BTreeMap<String, String>) -> Result<(), MetadataError> {
        let mut item: HashMap<String, AttributeValue> = HashMap::with_capacity(fields.len() + 1);
        item.insert(
            self.key_attribute.clone(),
            AttributeValue::S(id.to_string()),
        );
        for (name, value) in fields {
            item.insert(name.clone(), AttributeValue::S(value.clone()));
        }

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| map_dynamo_error(err, id))?;

        debug!(id = %id, field_count = fields.len(), "indexed metadata record");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<BTreeMap<String, String>>, MetadataError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(&self.key_attribute, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|err| map_dynamo_error(err, id))?;

        let Some(item) = response.item else {
            debug!(id = %id, "no index entry");
            return Ok(None);
        };

        let fields: BTreeMap<String, String> = item
            .into_iter()
            .filter(|(name, _)| *name != self.key_attribute)
            .filter_map(|(name, value)| value.as_s().ok().map(|s| (name, s.clone())))
            .collect();

        Ok(Some(fields))
    }
}

fn map_dynamo_error<E>(err: SdkError<E>, id: &str) -> MetadataError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if err.as_service_error().and_then(|e| e.code()) == Some("AccessDeniedException") {
        return MetadataError::AccessDenied(id.to_string());
    }
    MetadataError::transport(id, err)
}
