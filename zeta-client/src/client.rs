//! Signing HTTP client for the ZETA API

use crate::{ClientError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use zeta_core::crypto::{KeyPair, PublicKey};
use zeta_core::envelope::Auth;
use zeta_core::protocol::*;
use zeta_core::types::{Event, EventDraft, Permissions};

/// ZETA client bound to one principal's keypair
pub struct Client {
    base_url: String,
    keypair: KeyPair,
    server_public_key: Option<PublicKey>,
    http: HyperClient<HttpConnector, Full<Bytes>>,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, keypair: KeyPair) -> Result<Self> {
        let base_url = base_url.into();
        let _: Uri = base_url
            .parse()
            .map_err(|e| ClientError::Connection(format!("invalid URL: {e}")))?;

        Ok(Client {
            base_url,
            keypair,
            server_public_key: None,
            http: HyperClient::builder(TokioExecutor::new()).build_http(),
        })
    }

    /// Pin the server public key; responses are then signature-checked
    pub fn with_server_key(mut self, public_key_pem: &str) -> Result<Self> {
        self.server_public_key = Some(PublicKey::from_pem(public_key_pem)?);
        Ok(self)
    }

    /// This principal's public key PEM
    pub fn public_key(&self) -> &str {
        self.keypair.public_pem()
    }

    /// Sign a verification block authorizing `public_key` to register for
    /// a restricted event. Only meaningful when this client's key is the
    /// event owner or a registration delegate.
    pub fn issue_verification(
        &self,
        event_id: &str,
        public_key: &str,
        transfer_limit: Option<u8>,
        metadata: Value,
    ) -> Result<Auth<Verification>> {
        Ok(Auth::seal(
            Verification {
                event_id: event_id.to_string(),
                public_key: public_key.to_string(),
                transfer_limit,
                metadata,
            },
            &self.keypair,
        )?)
    }

    /// Sign a transfer block handing `ticket` to `recipient_public_key`
    pub fn authorize_transfer(
        &self,
        ticket: &str,
        recipient_public_key: &str,
    ) -> Result<Auth<Transfer>> {
        Ok(Auth::seal(
            Transfer {
                ticket: ticket.to_string(),
                transfer_public_key: recipient_public_key.to_string(),
            },
            &self.keypair,
        )?)
    }

    pub async fn create_event(&self, event: EventDraft) -> Result<String> {
        let response: CreateResponse = self.post("/create", CreateRequest { event }).await?;
        Ok(response.event_id)
    }

    pub async fn search(&self, text: &str, limit: u32, mode: SearchMode) -> Result<Vec<Event>> {
        let response: SearchResponse = self
            .post(
                "/search",
                SearchRequest {
                    text: text.to_string(),
                    limit,
                    mode,
                },
            )
            .await?;
        Ok(response.events)
    }

    pub async fn register(
        &self,
        event_id: &str,
        verification: Option<Auth<Verification>>,
    ) -> Result<String> {
        let response: RegisterResponse = self
            .post(
                "/register",
                RegisterRequest {
                    event_id: event_id.to_string(),
                    verification,
                },
            )
            .await?;
        Ok(response.ticket)
    }

    /// Claim a ticket transferred by its current holder
    pub async fn transfer(&self, event_id: &str, transfer: Auth<Transfer>) -> Result<String> {
        let response: TransferResponse = self
            .post(
                "/transfer",
                TransferRequest {
                    event_id: event_id.to_string(),
                    transfer,
                },
            )
            .await?;
        Ok(response.ticket)
    }

    pub async fn redeem(&self, event_id: &str, ticket: &str) -> Result<bool> {
        let response: RedeemResponse = self
            .post(
                "/redeem",
                RedeemRequest {
                    event_id: event_id.to_string(),
                    ticket: ticket.to_string(),
                },
            )
            .await?;
        Ok(response.success)
    }

    pub async fn validate(
        &self,
        event_id: &str,
        ticket: &str,
        check_public_key: &str,
        stamp: bool,
    ) -> Result<ValidateResponse> {
        self.post(
            "/validate",
            ValidateRequest {
                event_id: event_id.to_string(),
                ticket: ticket.to_string(),
                check_public_key: check_public_key.to_string(),
                stamp,
            },
        )
        .await
    }

    pub async fn cancel(&self, event_id: &str, ticket_number: u32) -> Result<bool> {
        let response: CancelResponse = self
            .post(
                "/cancel",
                CancelRequest {
                    event_id: event_id.to_string(),
                    ticket_number,
                },
            )
            .await?;
        Ok(response.success)
    }

    pub async fn flag(
        &self,
        event_id: &str,
        ticket_number: u32,
        value: Option<u8>,
        public: Option<bool>,
    ) -> Result<FlagResponse> {
        self.post(
            "/flag",
            FlagRequest {
                event_id: event_id.to_string(),
                ticket_number,
                value,
                public,
            },
        )
        .await
    }

    pub async fn permissions(
        &self,
        event_id: &str,
        target_public_key: &str,
        permissions: Option<Permissions>,
    ) -> Result<Permissions> {
        let response: PermissionsResponse = self
            .post(
                "/permissions",
                PermissionsRequest {
                    event_id: event_id.to_string(),
                    target_public_key: target_public_key.to_string(),
                    permissions,
                },
            )
            .await?;
        Ok(response.permissions)
    }

    pub async fn delete(&self, event_id: &str) -> Result<bool> {
        let response: DeleteResponse = self
            .post(
                "/delete",
                DeleteRequest {
                    event_id: event_id.to_string(),
                },
            )
            .await?;
        Ok(response.success)
    }

    /// Seal, post, unwrap: sign the content, send it, check the server's
    /// signature if pinned, and surface error payloads as `Server` errors.
    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        content: Req,
    ) -> Result<Resp> {
        let auth = Auth::seal(content, &self.keypair)?;
        let body = serde_json::to_vec(&auth)?;

        let request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?
            .to_bytes();

        let envelope: Auth<Value> = serde_json::from_slice(&body)?;

        if let Some(server_key) = &self.server_public_key {
            if !server_key.verify(&envelope.signature, &envelope.data) {
                return Err(ClientError::InvalidResponse(
                    "server signature verification failed".to_string(),
                ));
            }
        }

        if !status.is_success() {
            let detail = envelope
                .data
                .content
                .get("detail")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Server {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(serde_json::from_value(envelope.data.content)?)
    }
}
