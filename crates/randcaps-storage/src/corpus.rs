//! Random sampling over the indexed Matrix event history in MongoDB.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::debug;

use randcaps_core::error::RandCapsError;

/// Canonical event type for room messages.
pub const ROOM_MESSAGE_EVENT_TYPE: &str = "m.room.message";

/// Store-side coarse filter: at least one character and no ASCII lowercase.
pub const NO_LOWERCASE_PATTERN: &str = "^[^a-z]+$";

pub const DEFAULT_SAMPLE_SIZE: u32 = 50;

/// One stored event as read from the corpus. Fields the pipeline does not
/// interpret stay in `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMessage {
    pub sender: String,
    pub body: String,
    pub event_type: String,
    pub metadata: Document,
}

impl HistoricalMessage {
    pub fn from_document(mut doc: Document) -> Self {
        let sender = doc.get_str("sender").unwrap_or_default().to_string();
        let event_type = doc.get_str("type").unwrap_or_default().to_string();
        let body = doc
            .get_document("content")
            .ok()
            .and_then(|content| content.get_str("body").ok())
            .unwrap_or_default()
            .to_string();
        doc.remove("sender");
        doc.remove("type");
        Self {
            sender,
            body,
            event_type,
            metadata: doc,
        }
    }
}

/// Declarative predicate plus sample bound for one random draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleQuery {
    pub event_type: String,
    pub body_pattern: String,
    pub excluded_senders: Vec<String>,
    pub size: u32,
}

impl SampleQuery {
    /// All-caps room messages from anyone outside `blocklist`.
    pub fn screaming(blocklist: &[String], size: u32) -> Self {
        Self {
            event_type: ROOM_MESSAGE_EVENT_TYPE.to_string(),
            body_pattern: NO_LOWERCASE_PATTERN.to_string(),
            excluded_senders: blocklist.to_vec(),
            size: if size == 0 { DEFAULT_SAMPLE_SIZE } else { size },
        }
    }

    pub fn to_pipeline(&self) -> Vec<Document> {
        vec![
            doc! {
                "$match": {
                    "type": self.event_type.as_str(),
                    "content.body": { "$regex": self.body_pattern.as_str() },
                    "sender": { "$nin": self.excluded_senders.clone() },
                }
            },
            doc! { "$sample": { "size": i64::from(self.size) } },
        ]
    }
}

#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Up to `query.size` matching messages drawn at random, without
    /// replacement. No retries; any failure is `StoreQueryFailed`.
    async fn sample(&self, query: &SampleQuery) -> Result<Vec<HistoricalMessage>, RandCapsError>;
}

pub struct MongoCorpusStore {
    events: Collection<Document>,
}

impl MongoCorpusStore {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, RandCapsError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| RandCapsError::Config(format!("Failed to parse MongoDB URI: {e}")))?;
        options.app_name = Some("randcaps".to_string());

        let client = Client::with_options(options)
            .map_err(|e| RandCapsError::Config(format!("Failed to create MongoDB client: {e}")))?;

        Ok(Self {
            events: client.database(database).collection(collection),
        })
    }
}

#[async_trait]
impl CorpusStore for MongoCorpusStore {
    async fn sample(&self, query: &SampleQuery) -> Result<Vec<HistoricalMessage>, RandCapsError> {
        let mut cursor = self
            .events
            .aggregate(query.to_pipeline(), None)
            .await
            .map_err(|e| RandCapsError::StoreQueryFailed(format!("aggregate: {e}")))?;

        let mut messages = Vec::new();
        while cursor
            .advance()
            .await
            .map_err(|e| RandCapsError::StoreQueryFailed(format!("cursor: {e}")))?
        {
            let doc = cursor
                .deserialize_current()
                .map_err(|e| RandCapsError::StoreQueryFailed(format!("decode: {e}")))?;
            messages.push(HistoricalMessage::from_document(doc));
        }

        debug!(
            "Sampled {} corpus messages (requested {})",
            messages.len(),
            query.size
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocklist() -> Vec<String> {
        vec![
            "@fish:cclub.cs.wmich.edu".to_string(),
            "@randcaps:example.org".to_string(),
        ]
    }

    fn excluded(pipeline: &[Document]) -> Vec<String> {
        pipeline[0]
            .get_document("$match")
            .unwrap()
            .get_document("sender")
            .unwrap()
            .get_array("$nin")
            .unwrap()
            .iter()
            .map(|b| b.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_pipeline_shape() {
        let query = SampleQuery::screaming(&blocklist(), 50);
        let pipeline = query.to_pipeline();
        assert_eq!(pipeline.len(), 2);

        let stage = pipeline[0].get_document("$match").unwrap();
        assert_eq!(stage.get_str("type").unwrap(), "m.room.message");
        assert_eq!(
            stage
                .get_document("content.body")
                .unwrap()
                .get_str("$regex")
                .unwrap(),
            "^[^a-z]+$"
        );
        assert_eq!(excluded(&pipeline), blocklist());

        let sample = pipeline[1].get_document("$sample").unwrap();
        assert_eq!(sample.get_i64("size").unwrap(), 50);
    }

    #[test]
    fn test_zero_size_falls_back_to_default() {
        let query = SampleQuery::screaming(&[], 0);
        assert_eq!(query.size, DEFAULT_SAMPLE_SIZE);
    }

    #[test]
    fn test_every_blocklisted_sender_is_excluded_in_order() {
        let list = vec![
            "@fish:cclub.cs.wmich.edu".to_string(),
            "@rustix:cclub.cs.wmich.edu".to_string(),
            "@gooey:cclub.cs.wmich.edu".to_string(),
            "@randcaps:example.org".to_string(),
        ];
        let pipeline = SampleQuery::screaming(&list, 50).to_pipeline();
        assert_eq!(excluded(&pipeline), list);
    }

    #[test]
    fn test_empty_blocklist_still_sends_nin() {
        let pipeline = SampleQuery::screaming(&[], 50).to_pipeline();
        assert!(excluded(&pipeline).is_empty());
    }

    #[test]
    fn test_from_document_extracts_fields_and_keeps_metadata() {
        let doc = doc! {
            "event_id": "$abc",
            "room_id": "!room:example.org",
            "sender": "@alice:example.org",
            "type": "m.room.message",
            "content": { "msgtype": "m.text", "body": "LOUD NOISES" },
        };
        let message = HistoricalMessage::from_document(doc);
        assert_eq!(message.sender, "@alice:example.org");
        assert_eq!(message.event_type, "m.room.message");
        assert_eq!(message.body, "LOUD NOISES");
        assert_eq!(message.metadata.get_str("event_id").unwrap(), "$abc");
        assert!(message.metadata.get("sender").is_none());
    }

    #[test]
    fn test_from_document_missing_body_is_empty() {
        let doc = doc! { "sender": "@bob:example.org", "type": "m.room.message" };
        let message = HistoricalMessage::from_document(doc);
        assert!(message.body.is_empty());
    }
}
