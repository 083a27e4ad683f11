use crate::core::{
    model::{Chunk, IndexEntry, ScoredChunk, VectorCollection},
    vector::{
        VectorDb, CHUNK_INDEX_PROPERTY, CONTENT_PROPERTY, HASH_PROPERTY, PAGE_PROPERTY,
        SOURCE_PROPERTY,
    },
};
use crate::error::MedragError;
use crate::{err, map_err};
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    value, Condition, CountPointsBuilder, CreateCollection, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetCollectionInfoResponse, PointStruct,
    SearchParams, SearchPoints, UpsertPointsBuilder, Value, VectorParams, VectorsConfig,
    WithPayloadSelector,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Alias for an arced Qdrant instance.
///
/// Chunk metadata is stored in the point payload. Points are matched by the
/// source document name, which is indexed as a keyword field.
pub type QdrantDb = Arc<Qdrant>;

pub fn init(url: &str) -> QdrantDb {
    info!("Connecting to qdrant at {url}");
    Arc::new(
        Qdrant::from_url(url)
            .build()
            .expect("error initialising qdrant"),
    )
}

#[async_trait::async_trait]
impl VectorDb for Qdrant {
    fn id(&self) -> &'static str {
        "qdrant"
    }

    async fn create_vector_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        let config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: size as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            })),
        };

        let res = map_err!(
            self.create_collection(CreateCollection {
                collection_name: name.to_string(),
                vectors_config: Some(config),
                ..Default::default()
            })
            .await
        );

        debug_assert!(res.result);

        map_err!(
            self.create_field_index(
                CreateFieldIndexCollectionBuilder::new(name, SOURCE_PROPERTY, FieldType::Keyword)
                    .wait(true),
            )
            .await
        );

        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<VectorCollection, MedragError> {
        if !map_err!(self.collection_exists(name).await) {
            return err!(DoesNotExist, "Vector collection '{name}'");
        }

        let info = map_err!(self.collection_info(name).await);

        let Some(size) = get_collection_size(&info) else {
            #[cfg(debug_assertions)]
            {
                debug!("{info:?}")
            }
            return err!(
                DoesNotExist,
                "Size information for vector collection '{name}'"
            );
        };

        Ok(VectorCollection::new(name, size))
    }

    async fn delete_vector_collection(&self, name: &str) -> Result<(), MedragError> {
        map_err!(self.delete_collection(name).await);
        Ok(())
    }

    async fn create_default_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        if map_err!(self.collection_exists(name).await) {
            debug!("Collection '{name}' already exists");
            return Ok(());
        }
        self.create_vector_collection(name, size).await
    }

    async fn query(
        &self,
        search: Vec<f32>,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, MedragError> {
        let search_points = SearchPoints {
            collection_name: collection.to_string(),
            vector: search,
            filter: None,
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            params: Some(SearchParams::default()),
            ..Default::default()
        };

        let search_result = map_err!(self.search_points(search_points).await);

        let results = search_result
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(point.payload)?;
                Some(ScoredChunk {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn insert_embeddings(
        &self,
        collection: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), MedragError> {
        debug!("Inserting {} vectors to {collection}", entries.len());

        let points: Vec<PointStruct> = entries
            .into_iter()
            .map(|IndexEntry { chunk, vector, hash }| {
                let mut payload = Payload::new();
                payload.insert(CONTENT_PROPERTY, chunk.content);
                payload.insert(SOURCE_PROPERTY, chunk.source);
                payload.insert(CHUNK_INDEX_PROPERTY, chunk.index as i64);
                payload.insert(HASH_PROPERTY, hash);
                if let Some(page) = chunk.page {
                    payload.insert(PAGE_PROPERTY, page as i64);
                }
                PointStruct::new(uuid::Uuid::new_v4().to_string(), vector, payload)
            })
            .collect();

        map_err!(
            self.upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
        );

        Ok(())
    }

    async fn delete_embeddings(&self, collection: &str, source: &str) -> Result<(), MedragError> {
        map_err!(
            self.delete_points(
                DeletePointsBuilder::new(collection)
                    .points(source_filter(source, None))
                    .wait(true),
            )
            .await
        );

        Ok(())
    }

    async fn count_vectors(
        &self,
        collection: &str,
        source: &str,
        hash: Option<&str>,
    ) -> Result<usize, MedragError> {
        let count = map_err!(
            self.count(
                CountPointsBuilder::new(collection)
                    .filter(source_filter(source, hash))
                    .exact(true),
            )
            .await
        );

        Ok(count.result.map(|r| r.count as usize).unwrap_or_default())
    }
}

fn source_filter(source: &str, hash: Option<&str>) -> Filter {
    let mut conditions = vec![Condition::matches(SOURCE_PROPERTY, source.to_string())];
    if let Some(hash) = hash {
        conditions.push(Condition::matches(HASH_PROPERTY, hash.to_string()));
    }
    Filter::must(conditions)
}

fn chunk_from_payload(mut payload: HashMap<String, Value>) -> Option<Chunk> {
    macro_rules! get_for_type {
        ($const:ident, $kind:ident) => {{
            match payload.remove($const).and_then(|v| v.kind) {
                Some(value::Kind::$kind(v)) => Some(v),
                Some(v) => {
                    warn!("Found unsupported value kind for '{}': {v:?}", $const);
                    None
                }
                None => None,
            }
        }};
    }

    let Some(content) = get_for_type!(CONTENT_PROPERTY, StringValue) else {
        warn!("Point is missing '{CONTENT_PROPERTY}'");
        return None;
    };

    let source = get_for_type!(SOURCE_PROPERTY, StringValue).unwrap_or_default();
    let index = get_for_type!(CHUNK_INDEX_PROPERTY, IntegerValue).unwrap_or_default();
    let page = get_for_type!(PAGE_PROPERTY, IntegerValue);

    Some(Chunk {
        content,
        source,
        page: page.map(|p| p as u32),
        index: index as usize,
    })
}

fn get_collection_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let config = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;
    match config {
        Config::Params(VectorParams { size, .. }) => Some(*size as usize),
        Config::ParamsMap(pm) => {
            warn!("Found unexpected params map! {pm:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_chunk_from_payload() {
        let mut payload = HashMap::new();
        payload.insert(CONTENT_PROPERTY.to_string(), Value::from("Acne is common."));
        payload.insert(SOURCE_PROPERTY.to_string(), Value::from("gale.pdf"));
        payload.insert(CHUNK_INDEX_PROPERTY.to_string(), Value::from(4_i64));
        payload.insert(PAGE_PROPERTY.to_string(), Value::from(12_i64));

        let chunk = chunk_from_payload(payload).unwrap();

        assert_eq!("Acne is common.", chunk.content);
        assert_eq!("gale.pdf", chunk.source);
        assert_eq!(4, chunk.index);
        assert_eq!(Some(12), chunk.page);
    }

    #[test]
    fn skips_payload_without_content() {
        let mut payload = HashMap::new();
        payload.insert(SOURCE_PROPERTY.to_string(), Value::from("gale.pdf"));

        assert!(chunk_from_payload(payload).is_none());
    }
}
