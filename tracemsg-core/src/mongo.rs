use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, IndexModel};

use crate::codec;
use crate::config::StoreConfig;
use crate::error::TraceError;
use crate::models::{DateRange, TraceDocument, TraceMessage};
use crate::store::{TraceStore, TraceStream};

const APP_NAME: &str = "tracemsg";

/// Inclusive on both ends: `from <= ts <= to`.
pub fn range_filter(range: &DateRange) -> Document {
    doc! {
        "ts": {
            "$gte": codec::to_store(&range.from),
            "$lte": codec::to_store(&range.to),
        }
    }
}

/// Oldest first.
pub fn ts_ascending() -> Document {
    doc! { "ts": 1 }
}

/// MongoDB-backed trace store. The driver's `Client` is internally pooled and
/// cheap to clone, so one instance serves every in-flight request.
#[derive(Clone)]
pub struct MongoTraceStore {
    client: Client,
    collection: Collection<TraceDocument>,
}

impl MongoTraceStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, TraceError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_seconds));
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout_seconds));

        let client = Client::with_options(options)?;
        let collection = client
            .database(&config.database)
            .collection::<TraceDocument>(&config.collection);

        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            "MongoDB trace store configured"
        );

        Ok(Self { client, collection })
    }

    /// Ascending index on `ts`, which every range query and sort uses.
    pub async fn ensure_indexes(&self) -> Result<(), TraceError> {
        let index = IndexModel::builder().keys(ts_ascending()).build();
        let created = self.collection.create_index(index).await?;
        tracing::debug!(index = %created.index_name, "ts index ensured");
        Ok(())
    }

    /// Drop the whole collection. Used to clean up throwaway test collections.
    pub async fn drop_collection(&self) -> Result<(), TraceError> {
        self.collection.drop().await?;
        tracing::debug!(collection = %self.collection.name(), "Collection dropped");
        Ok(())
    }
}

#[async_trait]
impl TraceStore for MongoTraceStore {
    async fn insert(&self, record: TraceMessage) -> Result<TraceMessage, TraceError> {
        let mut doc = TraceDocument::from(&record);
        let result = self.collection.insert_one(&doc).await?;
        let oid = result.inserted_id.as_object_id().ok_or(TraceError::MissingId)?;
        doc.id = Some(oid);
        Ok(TraceMessage::from(doc))
    }

    async fn find_by_timestamp_range(&self, range: &DateRange) -> Result<TraceStream, TraceError> {
        let cursor = self
            .collection
            .find(range_filter(range))
            .sort(ts_ascending())
            .await?;

        Ok(cursor
            .map_ok(TraceMessage::from)
            .map_err(TraceError::from)
            .boxed())
    }

    async fn health_check(&self) -> Result<String, TraceError> {
        let info = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;
        Ok(info.get_str("version").unwrap_or("unknown").to_string())
    }

    fn name(&self) -> &str {
        "mongodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn test_range_filter_is_inclusive_on_both_ends() {
        let range = DateRange::parse("2024-01-01T09:00:00+02:00", "2024-01-01T11:00:00.250Z").unwrap();
        let filter = range_filter(&range);

        let ts = filter.get_document("ts").unwrap();
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.get("$gte"), Some(&Bson::DateTime(codec::to_store(&range.from))));
        assert_eq!(ts.get("$lte"), Some(&Bson::DateTime(codec::to_store(&range.to))));
        assert!(!ts.contains_key("$gt"));
        assert!(!ts.contains_key("$lt"));
    }

    #[test]
    fn test_range_filter_bounds_are_utc_instants() {
        let range = DateRange::parse("2024-01-01T12:00:00+02:00", "2024-01-01T12:00:00+02:00").unwrap();
        let filter = range_filter(&range);

        let from = filter.get_document("ts").unwrap().get_datetime("$gte").unwrap();
        assert_eq!(from.timestamp_millis(), 1_704_103_200_000);
    }

    #[test]
    fn test_sort_is_ascending_on_ts() {
        assert_eq!(ts_ascending(), doc! { "ts": 1 });
    }
}
