//! Categorizer service: `POST {title, content, tags}` answers with the
//! detected language and a list of tags with English names.

use async_trait::async_trait;
use domains::{DomainResult, TagExtractor};
use serde::{Deserialize, Serialize};

use crate::client::{AnalysisClient, ClientOptions};

#[derive(Serialize)]
struct CategorizeRequest<'a> {
    title: &'a str,
    content: &'a str,
    /// Existing tags, none for freshly authored content
    tags: [&'a str; 0],
}

#[derive(Deserialize)]
struct CategorizeResponse {
    #[serde(default)]
    tags: Vec<CategorizedTag>,
}

#[derive(Deserialize)]
struct CategorizedTag {
    #[serde(rename = "EnglishName")]
    english_name: String,
}

pub struct HttpTagExtractor {
    client: AnalysisClient,
    url: String,
}

impl HttpTagExtractor {
    pub fn new(url: impl Into<String>, options: ClientOptions) -> DomainResult<Self> {
        Ok(Self { client: AnalysisClient::new(options)?, url: url.into() })
    }
}

#[async_trait]
impl TagExtractor for HttpTagExtractor {
    async fn extract_tags(&self, title: &str, content: &str) -> DomainResult<Vec<String>> {
        let request = CategorizeRequest { title, content, tags: [] };
        let response: CategorizeResponse = self.client.post_json(&self.url, &request).await?;
        Ok(response.tags.into_iter().map(|tag| tag.english_name).collect())
    }
}
