// afero.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    attributes::{BRIGHTNESS_ATTR, MAX_BRIGHTNESS, encode_brightness},
    config::HubspaceSettings,
    error::{AppError, Result},
    models::{Attribute, Credentials, Device, Session},
};

/// Hubspace accounts live on the Afero cloud: an OpenID token endpoint for
/// sign-in and a REST API for devices.
pub struct AferoClient {
    http: Client,
    auth_url: String,
    api_url: String,
    client_id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    #[serde(default)]
    account_access: Vec<AccountAccess>,
}

#[derive(Deserialize)]
struct AccountAccess {
    account: Account,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    account_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDevice {
    device_id: String,
    #[serde(default)]
    friendly_name: String,
    #[serde(default)]
    device_class: String,
    #[serde(default)]
    attributes: Vec<WireAttribute>,
}

#[derive(Deserialize)]
struct WireAttribute {
    id: u32,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributeWrite<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    attr_id: u32,
    data: &'a str,
}

impl From<WireAttribute> for Attribute {
    fn from(wire: WireAttribute) -> Self {
        // `data` carries the same hex encoding we write; `value` is the
        // cloud's decoded rendering and only used when `data` is absent.
        let value = match (wire.data, wire.value) {
            (Some(data), _) => data,
            (None, Some(value)) if wire.id == BRIGHTNESS_ATTR => {
                brightness_from_value(&value).unwrap_or_default()
            }
            (None, Some(serde_json::Value::String(s))) => s,
            (None, Some(serde_json::Value::Null)) | (None, None) => String::new(),
            (None, Some(other)) => other.to_string(),
        };
        Attribute { id: wire.id, value }
    }
}

/// The cloud renders brightness as a decimal percent; re-encode it.
fn brightness_from_value(value: &serde_json::Value) -> Option<String> {
    let percent = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let percent = u8::try_from(percent.min(u64::from(MAX_BRIGHTNESS))).ok()?;
    Some(encode_brightness(percent))
}

impl From<WireDevice> for Device {
    fn from(wire: WireDevice) -> Self {
        Device {
            id: wire.device_id,
            name: wire.friendly_name,
            device_class: wire.device_class,
            attributes: wire.attributes.into_iter().map(Attribute::from).collect(),
        }
    }
}

impl AferoClient {
    pub fn new(settings: &HubspaceSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            auth_url: settings.auth_url.clone(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            client_id: settings.client_id.clone(),
        })
    }

    fn account_url(&self, session: &Session, path: &str) -> String {
        format!("{}/v1/accounts/{}{}", self.api_url, session.account_id, path)
    }

    async fn fetch_token(&self, credentials: &Credentials) -> Result<String> {
        let response = self
            .http
            .post(&self.auth_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("username", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("unreadable token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_account(&self, access_token: &str) -> Result<String> {
        let me: UserResponse = self
            .http
            .get(format!("{}/v1/users/me", self.api_url))
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Auth(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("unreadable account response: {e}")))?;

        me.account_access
            .into_iter()
            .next()
            .map(|access| access.account.account_id)
            .ok_or_else(|| AppError::Auth("no Hubspace account on this login".into()))
    }
}

#[async_trait]
impl super::DeviceClient for AferoClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let access_token = self.fetch_token(credentials).await?;
        let account_id = self.fetch_account(&access_token).await?;
        debug!(%account_id, "Authenticated");
        Ok(Session::new(account_id, access_token))
    }

    async fn list_devices(&self, session: &Session) -> Result<Vec<Device>> {
        let devices: Vec<WireDevice> = self
            .http
            .get(self.account_url(session, "/devices?expansions=attributes"))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::device_query("device list", e))?
            .json()
            .await
            .map_err(|e| AppError::device_query("device list", e))?;

        Ok(devices.into_iter().map(Device::from).collect())
    }

    async fn get_attributes(&self, session: &Session, device: &Device) -> Result<Vec<Attribute>> {
        let wire: WireDevice = self
            .http
            .get(self.account_url(
                session,
                &format!("/devices/{}?expansions=attributes", device.id),
            ))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::device_query(&device.name, e))?
            .json()
            .await
            .map_err(|e| AppError::device_query(&device.name, e))?;

        Ok(Device::from(wire).attributes)
    }

    async fn write_attribute(
        &self,
        session: &Session,
        device: &Device,
        attr: u32,
        value: &str,
    ) -> Result<()> {
        let body = [AttributeWrite {
            kind: "attribute_write",
            attr_id: attr,
            data: value,
        }];

        let response = self
            .http
            .post(self.account_url(session, &format!("/devices/{}/requests", device.id)))
            .bearer_auth(&session.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::device_write(&device.name, attr, e))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::device_write(
                &device.name,
                attr,
                "session rejected",
            )),
            status => Err(AppError::device_write(
                &device.name,
                attr,
                format!("cloud answered {status}"),
            )),
        }
    }
}
