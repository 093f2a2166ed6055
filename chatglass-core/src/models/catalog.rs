use serde::{Deserialize, Serialize};

/// Wire shape of a badge catalog response, shared by the global and
/// channel-scoped endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogResponse {
    pub data: Vec<CatalogSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSet {
    pub set_id: String,
    pub versions: Vec<CatalogVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogVersion {
    pub id: String,
    pub image_url_1x: String,
    #[serde(default)]
    pub image_url_2x: Option<String>,
    #[serde(default)]
    pub image_url_4x: Option<String>,
}
