//! Typed description of the provisioned backend resources.
//!
//! Deployment tooling emits one attribute map per resource category; the portal
//! only reads it to report what a deployment contains.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const AUTH_RESOURCE: &str = "unitech";
pub const FUNCTION_RESOURCES: [&str; 3] = ["ApplicationHandler", "RequirementHandler", "pong"];
pub const API_RESOURCE: &str = "UnitechAPI";
pub const BUCKET_RESOURCE: &str = "s3unitechstorage";
pub const TABLE_RESOURCES: [&str; 2] = ["ApplicationInformation", "RequirementInformation"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendResources {
    #[serde(default)]
    pub auth: BTreeMap<String, AuthResource>,
    #[serde(default)]
    pub function: BTreeMap<String, FunctionResource>,
    #[serde(default)]
    pub api: BTreeMap<String, ApiResource>,
    #[serde(default)]
    pub storage: BTreeMap<String, StorageResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthResource {
    pub identity_pool_id: String,
    pub identity_pool_name: String,
    #[serde(rename = "HostedUIDomain")]
    pub hosted_ui_domain: String,
    #[serde(rename = "OAuthMetadata")]
    pub oauth_metadata: String,
    pub user_pool_id: String,
    pub user_pool_arn: String,
    pub user_pool_name: String,
    #[serde(rename = "AppClientIDWeb")]
    pub app_client_id_web: String,
    #[serde(rename = "AppClientID")]
    pub app_client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionResource {
    pub name: String,
    pub arn: String,
    pub region: String,
    pub lambda_execution_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResource {
    pub root_url: String,
    pub api_name: String,
    pub api_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageResource {
    Table(TableResource),
    Bucket(BucketResource),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableResource {
    pub name: String,
    pub arn: String,
    pub stream_arn: String,
    pub partition_key_name: String,
    pub partition_key_type: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketResource {
    pub bucket_name: String,
    pub region: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("failed to read resource descriptor: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid resource descriptor: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendResources {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ProvisioningError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProvisioningError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Resources the portal backend is expected to define but the descriptor lacks.
    pub fn missing_resources(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.auth.contains_key(AUTH_RESOURCE) {
            missing.push(format!("auth.{AUTH_RESOURCE}"));
        }
        for name in FUNCTION_RESOURCES {
            if !self.function.contains_key(name) {
                missing.push(format!("function.{name}"));
            }
        }
        if !self.api.contains_key(API_RESOURCE) {
            missing.push(format!("api.{API_RESOURCE}"));
        }
        if !matches!(
            self.storage.get(BUCKET_RESOURCE),
            Some(StorageResource::Bucket(_))
        ) {
            missing.push(format!("storage.{BUCKET_RESOURCE}"));
        }
        for name in TABLE_RESOURCES {
            if !matches!(self.storage.get(name), Some(StorageResource::Table(_))) {
                missing.push(format!("storage.{name}"));
            }
        }
        missing
    }

    /// The upload bucket, when the descriptor names one.
    pub fn bucket(&self) -> Option<&BucketResource> {
        match self.storage.get(BUCKET_RESOURCE) {
            Some(StorageResource::Bucket(bucket)) => Some(bucket),
            _ => None,
        }
    }

    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (name, auth) in &self.auth {
            lines.push(format!(
                "auth {name}: user pool {} / identity pool {}",
                auth.user_pool_id, auth.identity_pool_id
            ));
        }
        for (name, function) in &self.function {
            lines.push(format!(
                "function {name}: {} ({})",
                function.name, function.region
            ));
        }
        for (name, api) in &self.api {
            lines.push(format!("api {name}: {} at {}", api.api_name, api.root_url));
        }
        for (name, storage) in &self.storage {
            let line = match storage {
                StorageResource::Bucket(bucket) => format!(
                    "storage {name}: bucket {} ({})",
                    bucket.bucket_name, bucket.region
                ),
                StorageResource::Table(table) => format!(
                    "storage {name}: table {} keyed by {} ({})",
                    table.name, table.partition_key_name, table.partition_key_type
                ),
            };
            lines.push(line);
        }
        lines
    }
}
