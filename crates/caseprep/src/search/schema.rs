//! Index definition for maintenance request documents.
//!
//! Field names match the serialized form of
//! [`EnrichedDocument`](crate::case::EnrichedDocument).

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

pub const VECTOR_FIELD: &str = "Vector";
pub const ALGORITHM_NAME: &str = "myHnsw";
pub const PROFILE_NAME: &str = "myHnswProfile";
pub const VECTORIZER_NAME: &str = "myVectorizer";
pub const SEMANTIC_CONFIG_NAME: &str = "my-semantic-config";

const EDM_STRING: &str = "Edm.String";
const EDM_BOOLEAN: &str = "Edm.Boolean";
const EDM_SINGLE_COLLECTION: &str = "Collection(Edm.Single)";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub vector_search: VectorSearch,
    pub semantic: SemanticSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub key: bool,
    pub searchable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub facetable: bool,
    pub retrievable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<&'static str>,
}

impl FieldDefinition {
    /// Exact-match field: not full-text searchable.
    fn simple(name: &'static str, field_type: &'static str, facets: bool) -> Self {
        Self {
            name,
            field_type,
            key: false,
            searchable: false,
            filterable: facets,
            sortable: facets,
            facetable: facets,
            retrievable: true,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    fn searchable(name: &'static str, facets: bool) -> Self {
        Self {
            searchable: true,
            ..Self::simple(name, EDM_STRING, facets)
        }
    }

    fn vector(name: &'static str, dimensions: usize) -> Self {
        Self {
            searchable: true,
            dimensions: Some(dimensions),
            vector_search_profile: Some(PROFILE_NAME),
            ..Self::simple(name, EDM_SINGLE_COLLECTION, false)
        }
    }

    fn key(mut self) -> Self {
        self.key = true;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct VectorSearch {
    pub algorithms: Vec<Algorithm>,
    pub profiles: Vec<Profile>,
    pub vectorizers: Vec<Vectorizer>,
}

#[derive(Debug, Serialize)]
pub struct Algorithm {
    pub name: &'static str,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub name: &'static str,
    pub algorithm: &'static str,
    pub vectorizer: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vectorizer {
    pub name: &'static str,
    pub kind: &'static str,
    #[serde(rename = "azureOpenAIParameters")]
    pub azure_open_ai_parameters: VectorizerSource,
}

/// The embedding deployment the index uses to vectorize queries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorizerSource {
    pub resource_uri: String,
    pub deployment_id: String,
    pub model_name: String,
    #[serde(serialize_with = "expose")]
    pub api_key: SecretString,
}

#[derive(Debug, Serialize)]
pub struct SemanticSettings {
    pub configurations: Vec<SemanticConfiguration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfiguration {
    pub name: &'static str,
    pub prioritized_fields: PrioritizedFields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedFields {
    pub title_field: SemanticField,
    pub prioritized_content_fields: Vec<SemanticField>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticField {
    pub field_name: &'static str,
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl IndexDefinition {
    /// Builds the maintenance request index: lexical fields, a vector field
    /// of `dimensions` entries and the semantic ranking configuration.
    pub fn maintenance_requests(
        name: impl Into<String>,
        dimensions: usize,
        vectorizer: VectorizerSource,
    ) -> Self {
        let fields = vec![
            FieldDefinition::simple("FileName", EDM_STRING, true),
            FieldDefinition::simple("MouldDetected", EDM_BOOLEAN, true),
            FieldDefinition::searchable("DateOpened", true),
            FieldDefinition::searchable("JobAssigned", true),
            FieldDefinition::searchable("CustomerID", true),
            FieldDefinition::searchable("CaseID", true).key(),
            FieldDefinition::searchable("Description", false),
            FieldDefinition::simple("ImageURL", EDM_STRING, false),
            FieldDefinition::vector(VECTOR_FIELD, dimensions),
        ];

        Self {
            name: name.into(),
            fields,
            vector_search: VectorSearch {
                algorithms: vec![Algorithm {
                    name: ALGORITHM_NAME,
                    kind: "hnsw",
                }],
                profiles: vec![Profile {
                    name: PROFILE_NAME,
                    algorithm: ALGORITHM_NAME,
                    vectorizer: VECTORIZER_NAME,
                }],
                vectorizers: vec![Vectorizer {
                    name: VECTORIZER_NAME,
                    kind: "azureOpenAI",
                    azure_open_ai_parameters: vectorizer,
                }],
            },
            semantic: SemanticSettings {
                configurations: vec![SemanticConfiguration {
                    name: SEMANTIC_CONFIG_NAME,
                    prioritized_fields: PrioritizedFields {
                        title_field: SemanticField { field_name: "CaseID" },
                        prioritized_content_fields: ["Description", "CustomerID", "JobAssigned", "DateOpened"]
                            .into_iter()
                            .map(|field_name| SemanticField { field_name })
                            .collect(),
                    },
                }],
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn key_field(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key)
    }
}
