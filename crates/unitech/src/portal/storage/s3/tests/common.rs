use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::Client;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::portal::storage::s3::S3StorageGateway;
use crate::portal::storage::{ProgressCallback, ProgressSnapshot};

pub(super) const BUCKET: &str = "unitech-uploads";
pub(super) const IDENTITY: &str = "us-east-1:alice";
const UPLOAD_ID: &str = "upload-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum S3Op {
    Put,
    CreateMultipart,
    UploadPart,
    CompleteMultipart,
    AbortMultipart,
    List,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct S3Call {
    pub op: S3Op,
    pub key: String,
    pub size: usize,
}

/// In-process stand-in for the S3 REST API, addressed path-style.
///
/// Listings return one object per page so callers must follow continuation tokens.
#[derive(Default)]
pub(super) struct S3Stub {
    calls: Mutex<Vec<S3Call>>,
    objects: Mutex<BTreeMap<String, usize>>,
    pending_parts: Mutex<usize>,
    reject_complete: AtomicBool,
}

impl S3Stub {
    pub(super) fn seed(&self, keys: &[(&str, usize)]) {
        let mut objects = self.objects.lock().expect("stub mutex poisoned");
        for (key, size) in keys {
            objects.insert(key.to_string(), *size);
        }
    }

    pub(super) fn reject_completion(&self) {
        self.reject_complete.store(true, Ordering::SeqCst);
    }

    pub(super) fn calls(&self) -> Vec<S3Call> {
        self.calls.lock().expect("stub mutex poisoned").clone()
    }

    pub(super) fn ops(&self) -> Vec<S3Op> {
        self.calls().into_iter().map(|call| call.op).collect()
    }

    pub(super) fn object_size(&self, key: &str) -> Option<usize> {
        self.objects
            .lock()
            .expect("stub mutex poisoned")
            .get(key)
            .copied()
    }

    fn respond(&self, op: S3Op, key: &str, query: &HashMap<String, String>, body: &[u8]) -> Response {
        match op {
            S3Op::Put => {
                self.objects
                    .lock()
                    .expect("stub mutex poisoned")
                    .insert(key.to_string(), body.len());
                ([(header::ETAG, "\"put-etag\"")], "").into_response()
            }
            S3Op::CreateMultipart => xml(format!(
                "<InitiateMultipartUploadResult>\
                 <Bucket>{BUCKET}</Bucket><Key>{key}</Key><UploadId>{UPLOAD_ID}</UploadId>\
                 </InitiateMultipartUploadResult>"
            )),
            S3Op::UploadPart => {
                *self.pending_parts.lock().expect("stub mutex poisoned") += body.len();
                let part = query.get("partNumber").cloned().unwrap_or_default();
                let etag = format!("\"part-{part}\"");
                ([(header::ETAG, etag)], "").into_response()
            }
            S3Op::CompleteMultipart => {
                if self.reject_complete.load(Ordering::SeqCst) {
                    return (
                        StatusCode::BAD_REQUEST,
                        xml(
                            "<Error><Code>InvalidPart</Code>\
                             <Message>One or more of the specified parts could not be found.</Message>\
                             <RequestId>stub</RequestId></Error>"
                                .to_string(),
                        ),
                    )
                        .into_response();
                }
                let size = std::mem::take(&mut *self.pending_parts.lock().expect("stub mutex poisoned"));
                self.objects
                    .lock()
                    .expect("stub mutex poisoned")
                    .insert(key.to_string(), size);
                xml(format!(
                    "<CompleteMultipartUploadResult>\
                     <Location>http://stub/{BUCKET}/{key}</Location>\
                     <Bucket>{BUCKET}</Bucket><Key>{key}</Key><ETag>\"complete-etag\"</ETag>\
                     </CompleteMultipartUploadResult>"
                ))
            }
            S3Op::AbortMultipart => StatusCode::NO_CONTENT.into_response(),
            S3Op::List => self.list_page(query),
            S3Op::Other => StatusCode::NOT_IMPLEMENTED.into_response(),
        }
    }

    fn list_page(&self, query: &HashMap<String, String>) -> Response {
        let prefix = query.get("prefix").cloned().unwrap_or_default();
        let page = query
            .get("continuation-token")
            .and_then(|token| token.strip_prefix("page-"))
            .and_then(|index| index.parse::<usize>().ok())
            .unwrap_or(0);

        let objects = self.objects.lock().expect("stub mutex poisoned");
        let matching: Vec<(&String, &usize)> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .collect();

        let contents = matching
            .get(page)
            .map(|(key, size)| {
                format!(
                    "<Contents><Key>{key}</Key>\
                     <LastModified>2024-05-01T12:00:00.000Z</LastModified>\
                     <ETag>\"etag-{page}\"</ETag><Size>{size}</Size>\
                     <StorageClass>STANDARD</StorageClass></Contents>"
                )
            })
            .unwrap_or_default();
        let truncated = page + 1 < matching.len();
        let next = if truncated {
            format!("<NextContinuationToken>page-{}</NextContinuationToken>", page + 1)
        } else {
            String::new()
        };

        xml(format!(
            "<ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Name>{BUCKET}</Name><Prefix>{prefix}</Prefix>\
             <KeyCount>{}</KeyCount><MaxKeys>1</MaxKeys><IsTruncated>{truncated}</IsTruncated>\
             {contents}{next}</ListBucketResult>",
            usize::from(!contents.is_empty())
        ))
    }
}

fn xml(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"),
    )
        .into_response()
}

fn classify(method: &Method, query: &HashMap<String, String>) -> S3Op {
    if query.contains_key("list-type") {
        S3Op::List
    } else if *method == Method::POST && query.contains_key("uploads") {
        S3Op::CreateMultipart
    } else if *method == Method::PUT && query.contains_key("partNumber") {
        S3Op::UploadPart
    } else if *method == Method::POST && query.contains_key("uploadId") {
        S3Op::CompleteMultipart
    } else if *method == Method::DELETE && query.contains_key("uploadId") {
        S3Op::AbortMultipart
    } else if *method == Method::PUT {
        S3Op::Put
    } else {
        S3Op::Other
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[index + 1..index + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

async fn handle(
    State(stub): State<Arc<S3Stub>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let key = path
        .split_once('/')
        .map(|(_, key)| percent_decode(key))
        .unwrap_or_default();
    let op = classify(&method, &query);

    stub.calls.lock().expect("stub mutex poisoned").push(S3Call {
        op,
        key: key.clone(),
        size: body.len(),
    });
    stub.respond(op, &key, &query, &body)
}

/// Serves the stub on an ephemeral port and returns its base URL.
pub(super) async fn spawn_stub(stub: Arc<S3Stub>) -> String {
    let app = Router::new()
        .fallback(handle)
        .with_state(stub)
        .layer(DefaultBodyLimit::disable());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server runs");
    });
    format!("http://{addr}")
}

pub(super) fn gateway(endpoint: &str, identity_id: Option<&str>) -> S3StorageGateway {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "s3-stub"))
        .endpoint_url(endpoint)
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build();
    S3StorageGateway::new(
        Client::from_conf(config),
        BUCKET,
        identity_id.map(str::to_string),
        Duration::from_secs(900),
    )
}

/// Callback recording every progress snapshot it receives.
pub(super) fn progress_recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressCallback = Arc::new(move |snapshot: ProgressSnapshot| {
        sink.lock().expect("progress mutex poisoned").push(snapshot);
    });
    (callback, seen)
}
