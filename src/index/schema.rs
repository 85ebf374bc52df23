//! Index definition for chunk documents.

use serde::Serialize;
use serde_json::json;

/// Key field of every index document.
pub const KEY_FIELD: &str = "id";
/// Field holding the embedding of `content`.
pub const VECTOR_FIELD: &str = "content_vector";
/// Vector search profile attached to [`VECTOR_FIELD`].
pub const VECTOR_PROFILE: &str = "myHnswProfile";
const VECTOR_ALGORITHM: &str = "default";

/// One field of the index definition, serialized in Azure AI Search shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub key: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub searchable: bool,
    pub retrievable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<&'static str>,
}

impl SchemaField {
    fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: "Edm.String",
            key: false,
            filterable: false,
            sortable: false,
            searchable: false,
            retrievable: true,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }
}

/// Field layout of the chunk index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub fields: Vec<SchemaField>,
    dimensions: usize,
}

impl IndexSchema {
    /// Schema for vectors of `dimensions` components.
    pub fn for_dimensions(dimensions: usize) -> Self {
        // Key lookups page over `orderby id`.
        let mut key = SchemaField::string(KEY_FIELD).filterable();
        key.key = true;
        key.sortable = true;

        let mut last_update = SchemaField::string("last_update").filterable();
        last_update.kind = "Edm.DateTimeOffset";

        let vector = SchemaField {
            name: VECTOR_FIELD,
            kind: "Collection(Edm.Single)",
            key: false,
            filterable: false,
            sortable: false,
            searchable: true,
            retrievable: true,
            dimensions: Some(dimensions),
            vector_search_profile: Some(VECTOR_PROFILE),
        };

        Self {
            fields: vec![
                key,
                SchemaField::string("content").searchable(),
                vector,
                SchemaField::string("metadata").searchable(),
                SchemaField::string("title").searchable(),
                SchemaField::string("source").filterable(),
                last_update,
                SchemaField::string("uri").searchable().filterable(),
                SchemaField::string("repository").searchable().filterable(),
                SchemaField::string("summary").searchable(),
            ],
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Full index definition body for `PUT /indexes/{name}`.
    pub fn definition(&self, index_name: &str) -> serde_json::Value {
        json!({
            "name": index_name,
            "fields": self.fields,
            "vectorSearch": {
                "algorithms": [{ "name": VECTOR_ALGORITHM, "kind": "hnsw" }],
                "profiles": [{ "name": VECTOR_PROFILE, "algorithm": VECTOR_ALGORITHM }]
            }
        })
    }
}
