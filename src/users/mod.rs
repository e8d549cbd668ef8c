//! User directory over the user collection.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::store::{unique_id, Document, DocumentStore, Query};
use crate::Result;

/// Attributes returned for each listed user.
pub const USER_FIELDS: [&str; 5] = ["name", "email", "imageUrl", "joinedAt", "accountId"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub image_url: Option<String>,
    pub joined_at: Option<String>,
}

impl UserProfile {
    /// Fields that do not fit the profile shape leave the whole profile at its
    /// defaults; only the document id is kept.
    fn from_document(doc: Document) -> Self {
        let mut profile = match serde_json::from_value::<UserProfile>(Value::Object(doc.data)) {
            Ok(profile) => profile,
            Err(e) => {
                debug!(user_id = %doc.id, error = %e, "malformed user document");
                UserProfile::default()
            }
        };
        profile.id = Some(doc.id);
        profile
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub total: u64,
}

pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub async fn list(&self, limit: u64, offset: u64) -> Result<UserPage> {
        let queries = [
            Query::select(USER_FIELDS),
            Query::Limit(limit),
            Query::Offset(offset),
        ];
        let list = self.store.list_documents(&self.collection, &queries).await?;
        Ok(UserPage {
            users: list
                .documents
                .into_iter()
                .map(UserProfile::from_document)
                .collect(),
            total: list.total,
        })
    }

    /// First user document linked to an identity-provider account.
    pub async fn find_by_account(&self, account_id: &str) -> Result<Option<UserProfile>> {
        let list = self
            .store
            .list_documents(&self.collection, &[Query::equal("accountId", account_id)])
            .await?;
        Ok(list
            .documents
            .into_iter()
            .next()
            .map(UserProfile::from_document))
    }

    /// Create a user document; `joinedAt` is set to now.
    pub async fn store(&self, profile: &UserProfile) -> Result<UserProfile> {
        let mut data = Map::new();
        data.insert("accountId".into(), Value::String(profile.account_id.clone()));
        data.insert("email".into(), Value::String(profile.email.clone()));
        data.insert("name".into(), Value::String(profile.name.clone()));
        data.insert(
            "imageUrl".into(),
            profile
                .image_url
                .clone()
                .map_or(Value::Null, Value::String),
        );
        data.insert(
            "joinedAt".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let doc = self
            .store
            .create_document(&self.collection, &unique_id(), data)
            .await?;
        debug!(user_id = %doc.id, account_id = %profile.account_id, "user stored");
        Ok(UserProfile::from_document(doc))
    }
}
