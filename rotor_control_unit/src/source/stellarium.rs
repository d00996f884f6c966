//! Stellarium remote control plugin source.
//!
//! Polls `GET /api/objects/info?format=json` for the currently selected
//! object. Stellarium answers with plain text instead of JSON when nothing
//! is selected.

use rotor_common::config::StellariumConfig;
use rotor_common::tracking::PointingTarget;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::{ObjectInfo, ObjectSource};
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct ObjectInfoBody {
    altitude: Option<f64>,
    azimuth: Option<f64>,
    #[serde(rename = "localized-name")]
    localized_name: Option<String>,
    #[serde(rename = "above-horizon", default)]
    above_horizon: bool,
}

/// Parse an object info response body.
///
/// # Errors
/// - [`SourceError::NoResponse`] for an empty body
/// - [`SourceError::NoObjectSelected`] when the body is not a JSON object
/// - [`SourceError::MissingKeys`] when altitude, azimuth or name is absent
pub fn parse_object_info(body: &str) -> Result<ObjectInfo, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::NoResponse);
    }
    let parsed: ObjectInfoBody = serde_json::from_str(body).map_err(|e| {
        trace!("Object info is not JSON: {e}");
        SourceError::NoObjectSelected
    })?;
    match parsed {
        ObjectInfoBody {
            altitude: Some(alt),
            azimuth: Some(az),
            localized_name: Some(name),
            above_horizon,
        } => Ok(ObjectInfo {
            target: PointingTarget::new(az, alt),
            name,
            visible: above_horizon,
        }),
        _ => Err(SourceError::MissingKeys),
    }
}

pub struct StellariumSource {
    agent: ureq::Agent,
    url: String,
}

impl StellariumSource {
    pub fn new(config: &StellariumConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            .build()
            .into();
        Self {
            agent,
            url: config.object_info_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self) -> Result<String, SourceError> {
        let response = self.agent.get(&self.url).call().map_err(|e| {
            debug!(url = %self.url, "Stellarium request failed: {e}");
            match e {
                ureq::Error::HostNotFound | ureq::Error::ConnectionFailed | ureq::Error::Io(_) => {
                    SourceError::NoConnectedClient
                }
                _ => SourceError::NoResponse,
            }
        })?;

        if response.status() != 200 {
            debug!(status = %response.status(), "Stellarium returned an error status");
            return Err(SourceError::NoResponse);
        }

        response.into_body().read_to_string().map_err(|e| {
            debug!("Reading Stellarium response failed: {e}");
            SourceError::NoResponse
        })
    }
}

impl ObjectSource for StellariumSource {
    fn poll(&mut self) -> Result<ObjectInfo, SourceError> {
        let body = self.request()?;
        parse_object_info(&body)
    }

    fn is_automatic(&self) -> bool {
        true
    }
}
