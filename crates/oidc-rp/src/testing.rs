//! Shared test fixtures: signing keys, token minting and a scripted identity provider.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use ::rsa::RsaPrivateKey;
use ::rsa::signature::{SignatureEncoding, Signer};
use ::rsa::traits::PublicKeyParts;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use serde_json::{Value, json};
use sha2::{Sha256, Sha384, Sha512};
use time::OffsetDateTime;
use url::Url;

use crate::config::OidcSettings;
use crate::crypto::{base64url_decode, base64url_encode};
use crate::error::TransportError;
use crate::http::{HttpResponse, HttpTransport};
use crate::jose::{JsonWebKeySet, JwsAlgorithm, SigningKey};

pub(crate) const ISSUER: &str = "https://idp.example";
pub(crate) const CLIENT_ID: &str = "spa";
pub(crate) const IDP_KID: &str = "idp-1";

/// Splits a compact token into its signing input and decoded signature.
pub(crate) fn split_signed(token: &str) -> (String, Vec<u8>) {
    let (signed, signature) = token.rsplit_once('.').unwrap();
    (signed.to_string(), base64url_decode(signature).unwrap())
}

/// Builds a compact token, signing the input with `sign`.
pub(crate) fn mint(
    alg: JwsAlgorithm,
    kid: Option<&str>,
    claims: &Value,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
) -> String {
    let mut header = json!({"alg": alg.as_str(), "typ": "JWT"});
    if let Some(kid) = kid {
        header["kid"] = json!(kid);
    }
    mint_with_header(&header, claims, sign)
}

pub(crate) fn mint_with_header(
    header: &Value,
    claims: &Value,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
) -> String {
    let signed = format!(
        "{}.{}",
        base64url_encode(header.to_string()),
        base64url_encode(claims.to_string())
    );
    let signature = sign(signed.as_bytes());
    format!("{signed}.{}", base64url_encode(signature))
}

pub(crate) fn hmac_sign(alg: JwsAlgorithm, secret: &[u8], data: &[u8]) -> Vec<u8> {
    match alg {
        JwsAlgorithm::HS256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        JwsAlgorithm::HS384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(secret).unwrap();
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        JwsAlgorithm::HS512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret).unwrap();
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        other => panic!("{other} is not an HMAC algorithm"),
    }
}

/// A 2048-bit RSA key, generated once per test binary.
pub(crate) struct RsaTestKey(RsaPrivateKey);

static RSA_KEY: LazyLock<RsaTestKey> =
    LazyLock::new(|| RsaTestKey(RsaPrivateKey::new(&mut OsRng, 2048).unwrap()));

pub(crate) fn rsa_key() -> &'static RsaTestKey {
    &RSA_KEY
}

impl RsaTestKey {
    pub(crate) fn sign(&self, alg: JwsAlgorithm, data: &[u8]) -> Vec<u8> {
        match alg {
            JwsAlgorithm::RS256 => ::rsa::pkcs1v15::SigningKey::<Sha256>::new(self.0.clone())
                .sign(data)
                .to_vec(),
            JwsAlgorithm::RS384 => ::rsa::pkcs1v15::SigningKey::<Sha384>::new(self.0.clone())
                .sign(data)
                .to_vec(),
            JwsAlgorithm::RS512 => ::rsa::pkcs1v15::SigningKey::<Sha512>::new(self.0.clone())
                .sign(data)
                .to_vec(),
            other => panic!("{other} is not an RSA algorithm"),
        }
    }

    pub(crate) fn jwk(&self) -> SigningKey {
        SigningKey::rsa(
            base64url_encode(self.0.n().to_bytes_be()),
            base64url_encode(self.0.e().to_bytes_be()),
        )
        .with_kid("rsa-1")
    }

    pub(crate) fn pkcs1_pem(&self) -> String {
        use ::rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
        self.0.to_pkcs1_pem(LineEnding::LF).unwrap().to_string()
    }
}

/// An ECDSA key on the curve implied by its algorithm.
pub(crate) enum EcKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

impl EcKey {
    pub(crate) fn generate(alg: JwsAlgorithm) -> Self {
        match alg {
            JwsAlgorithm::ES256 => Self::P256(p256::ecdsa::SigningKey::random(&mut OsRng)),
            JwsAlgorithm::ES384 => Self::P384(p384::ecdsa::SigningKey::random(&mut OsRng)),
            JwsAlgorithm::ES512 => Self::P521(p521::ecdsa::SigningKey::random(&mut OsRng)),
            other => panic!("{other} is not an ECDSA algorithm"),
        }
    }

    /// Raw `r || s` signature.
    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(data);
                signature.to_bytes().to_vec()
            }
            Self::P384(key) => {
                let signature: p384::ecdsa::Signature = key.sign(data);
                signature.to_bytes().to_vec()
            }
            Self::P521(key) => {
                let signature: p521::ecdsa::Signature = key.sign(data);
                signature.to_bytes().to_vec()
            }
        }
    }

    pub(crate) fn jwk(&self) -> SigningKey {
        let (crv, point) = match self {
            Self::P256(key) => (
                "P-256",
                p256::ecdsa::VerifyingKey::from(key).to_encoded_point(false).as_bytes().to_vec(),
            ),
            Self::P384(key) => (
                "P-384",
                p384::ecdsa::VerifyingKey::from(key).to_encoded_point(false).as_bytes().to_vec(),
            ),
            Self::P521(key) => (
                "P-521",
                p521::ecdsa::VerifyingKey::from(key).to_encoded_point(false).as_bytes().to_vec(),
            ),
        };
        // 0x04 || x || y
        let size = (point.len() - 1) / 2;
        SigningKey::ec(
            crv,
            base64url_encode(&point[1..=size]),
            base64url_encode(&point[1 + size..]),
        )
    }
}

static IDP_KEY: LazyLock<EcKey> = LazyLock::new(|| EcKey::generate(JwsAlgorithm::ES256));

/// The ES256 key the test provider signs identity tokens with.
pub(crate) fn idp_jwk() -> SigningKey {
    IDP_KEY.jwk().with_kid(IDP_KID).with_use("sig")
}

/// Signs `claims` with the provider key.
pub(crate) fn idp_token(claims: &Value) -> String {
    mint(JwsAlgorithm::ES256, Some(IDP_KID), claims, |data| IDP_KEY.sign(data))
}

pub(crate) fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Identity token claims valid for an hour.
pub(crate) fn id_token_claims(nonce: Option<&str>) -> Value {
    let now = now();
    let mut claims = json!({
        "iss": ISSUER,
        "sub": "alice",
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 3600,
        "name": "Alice Liddell",
        "email": "alice@idp.example",
        "role": ["reader", "writer"],
        "at_hash": "x4Kd0rNSpGkt8uhp3lGfKQ",
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }
    claims
}

pub(crate) fn discovery_document() -> Value {
    json!({
        "issuer": ISSUER,
        "authorization_endpoint": format!("{ISSUER}/connect/authorize"),
        "token_endpoint": format!("{ISSUER}/connect/token"),
        "userinfo_endpoint": format!("{ISSUER}/connect/userinfo"),
        "end_session_endpoint": format!("{ISSUER}/connect/endsession"),
        "check_session_iframe": format!("{ISSUER}/connect/checksession"),
        "revocation_endpoint": format!("{ISSUER}/connect/revocation"),
        "jwks_uri": format!("{ISSUER}/.well-known/jwks"),
    })
}

/// Popup settings for `spa` at `https://idp.example`.
pub(crate) fn settings() -> OidcSettings {
    OidcSettings::new(ISSUER, CLIENT_ID)
        .with_default_callbacks(&Url::parse("https://app.example/").unwrap())
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub(crate) fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted transport answering from fixed responses.
#[derive(Default)]
pub(crate) struct MockTransport {
    gets: Mutex<HashMap<String, Value>>,
    posts: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// A provider serving discovery and its JWKS.
    pub(crate) fn idp() -> Self {
        Self::default()
            .with_get(
                format!("{ISSUER}/.well-known/openid-configuration"),
                discovery_document(),
            )
            .with_get(
                format!("{ISSUER}/.well-known/jwks"),
                serde_json::to_value(JsonWebKeySet::new(vec![idp_jwk()])).unwrap(),
            )
    }

    pub(crate) fn with_get(self, url: impl Into<String>, body: Value) -> Self {
        self.gets.lock().unwrap().insert(url.into(), body);
        self
    }

    pub(crate) fn with_post(self, url: impl Into<String>, status: u16, body: Value) -> Self {
        self.posts
            .lock()
            .unwrap()
            .insert(url.into(), HttpResponse { status, body });
        self
    }

    pub(crate) fn set_post(&self, url: impl Into<String>, status: u16, body: Value) {
        self.posts
            .lock()
            .unwrap()
            .insert(url.into(), HttpResponse { status, body });
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            form: Vec::new(),
        });
        self.gets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            bearer: None,
            form: form
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        self.posts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Network(format!("connection refused: {url}")))
    }
}
