//! Minimal JSON:API envelopes.
//!
//! Only what the character and quest endpoints need: single and list
//! documents of `{type, id, attributes}` resources, and an error document.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource<T> {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: String,
    pub attributes: T,
}

impl<T> Resource<T> {
    pub fn new(resource_type: impl Into<String>, id: impl ToString, attributes: T) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.to_string(),
            attributes,
        }
    }

    /// The numeric id, when the resource carries one.
    pub fn numeric_id(&self) -> Option<u32> {
        self.id.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: Resource<T>,
}

impl<T> Document<T> {
    pub fn new(data: Resource<T>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDocument<T> {
    pub data: Vec<Resource<T>>,
}

impl<T> ListDocument<T> {
    pub fn new(data: Vec<Resource<T>>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonApiError {
    pub errors: Vec<ErrorObject>,
}

impl JsonApiError {
    pub fn single(status: u16, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorObject {
                status: status.to_string(),
                title: title.into(),
                detail: detail.into(),
            }],
        }
    }
}
