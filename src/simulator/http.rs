// src/simulator/http.rs: REST client for the simulation service
//
// Routes:
//   GET    /case                               case names
//   POST   /case/{case}                        create (GET resolves, DELETE removes)
//   POST   /case/{case}/object/{phyng}         add phyng (GET resolves)
//   POST   /case/{case}/object/{phyng}/{prop}  write a property, body {"value": "..."}
//   POST   /case/{case}/{command}              setup | run | clean | stop

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use url::Url;

use super::{CaseAction, CaseSpec, PhyngAction, PhyngProperty, PhyngSpec, PropertyValue, Simulator};
use crate::infra::errors::SweepError;

pub struct HttpSimulator {
    base_url: Url,
    client: reqwest::Client,
}

/// The case list is either bare names or described entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum CaseEntry {
    Name(String),
    Described { name: String },
}

impl HttpSimulator {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, SweepError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SweepError::Config(format!("invalid simulator url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SweepError::Config(format!(
                "simulator url '{base_url}' cannot be used as a base"
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SweepError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request; a missing response is a transport error, a non-success
    /// status becomes `SweepError::Remote` carrying the service's message.
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, SweepError> {
        let response = request
            .send()
            .await
            .map_err(|e| SweepError::transport(operation, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut message = match response.text().await {
            Ok(body) => error_text(&body),
            Err(e) => {
                tracing::warn!("{operation}: could not read error body: {e}");
                String::new()
            }
        };
        if message.is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("no error detail")
                .to_string();
        }
        Err(SweepError::Remote {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

/// The service answers errors with a JSON-encoded string; fall back to the raw body.
fn error_text(body: &str) -> String {
    match serde_json::from_str::<String>(body) {
        Ok(text) => text,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl Simulator for HttpSimulator {
    async fn list_cases(&self) -> Result<Vec<String>, SweepError> {
        let response = self
            .send("list cases", self.client.get(self.url(&["case"])))
            .await?;
        let entries: Vec<CaseEntry> = response
            .json()
            .await
            .map_err(|e| SweepError::transport("list cases", e))?;

        Ok(entries
            .into_iter()
            .map(|entry| match entry {
                CaseEntry::Name(name) | CaseEntry::Described { name } => name,
            })
            .collect())
    }

    async fn create_case(&self, spec: &CaseSpec) -> Result<(), SweepError> {
        let url = self.url(&["case", &spec.name]);
        self.send("create case", self.client.post(url.clone()).json(spec))
            .await?;
        self.send("resolve case", self.client.get(url)).await?;
        tracing::debug!(case = %spec.name, "case created");
        Ok(())
    }

    async fn delete_case(&self, case: &str) -> Result<(), SweepError> {
        self.send("delete case", self.client.delete(self.url(&["case", case])))
            .await?;
        Ok(())
    }

    async fn add_phyng(&self, case: &str, spec: &PhyngSpec) -> Result<(), SweepError> {
        let url = self.url(&["case", case, "object", &spec.name]);
        self.send("add phyng", self.client.post(url.clone()).json(spec))
            .await?;
        self.send("resolve phyng", self.client.get(url)).await?;
        tracing::debug!(case, phyng = %spec.name, "phyng added");
        Ok(())
    }

    async fn write_property(
        &self,
        case: &str,
        phyng: &str,
        property: PhyngProperty,
        value: &PropertyValue,
    ) -> Result<(), SweepError> {
        let url = self.url(&["case", case, "object", phyng, property.as_str()]);
        let body = serde_json::json!({ "value": value.to_string() });
        self.send(
            &format!("write {}", property.as_str()),
            self.client.post(url).json(&body),
        )
        .await?;
        Ok(())
    }

    async fn phyng_action(
        &self,
        case: &str,
        phyng: &str,
        action: PhyngAction,
    ) -> Result<(), SweepError> {
        let (property, value) = action.as_property();
        let url = self.url(&["case", case, "object", phyng, property]);
        let body = serde_json::json!({ "value": value.to_string() });
        self.send(&action.to_string(), self.client.post(url).json(&body))
            .await?;
        Ok(())
    }

    async fn case_action(
        &self,
        case: &str,
        action: CaseAction,
    ) -> Result<Option<String>, SweepError> {
        let url = self.url(&["case", case, action.command()]);
        match self.send(action.command(), self.client.post(url)).await {
            Ok(_) => Ok(None),
            Err(SweepError::Remote { message, .. }) => Ok(Some(message)),
            Err(e) => Err(e),
        }
    }
}
