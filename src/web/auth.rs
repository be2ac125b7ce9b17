// Certificate-chain request verification and response signing (Ed25519).
//
// A private CA signs certificates of the form
//   {"id":"spe-api","pubkey":"<b64u>","exp":<unix secs>,"iss":"SPE-CA"}
// over the exact JSON bytes. Each side signs "{path}\n{body}" with the key
// its certificate names and sends the certificate alongside.
//
// Request:  X-SPE-Client-Cert, X-SPE-Client-CertSig, X-SPE-Client-Sig
// Response: X-SPE-Server-Cert, X-SPE-Server-CertSig, X-SPE-Server-Sig
// Token:    X-API-Token is compared against PEERTONE_API_TOKEN.
//
// Keys and signatures are base64url without padding.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const CLIENT_CERT_HEADER: &str = "x-spe-client-cert";
pub const CLIENT_CERT_SIG_HEADER: &str = "x-spe-client-certsig";
pub const CLIENT_SIG_HEADER: &str = "x-spe-client-sig";
pub const SERVER_CERT_HEADER: &str = "x-spe-server-cert";
pub const SERVER_CERT_SIG_HEADER: &str = "x-spe-server-certsig";
pub const SERVER_SIG_HEADER: &str = "x-spe-server-sig";
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Issuer every accepted certificate must carry.
pub const CERT_ISSUER: &str = "SPE-CA";
/// Certificate id the plugin expects on server responses.
pub const SERVER_CERT_ID: &str = "spe-api";
/// Certificate id issued to the plugin.
pub const CLIENT_CERT_ID: &str = "spe-plugin";

/// Certificate validity for `peertone keygen`: one year.
pub const CERT_TTL_SECS: i64 = 365 * 24 * 3600;

/// A CA-issued certificate. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pubkey: String,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iss: String,
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn b64u_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, tolerating trailing padding.
pub fn b64u_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s.trim().trim_end_matches('='))
        .context("Invalid base64url value")
}

fn key_bytes(s: &str, what: &str) -> Result<[u8; 32]> {
    let raw = b64u_decode(s).with_context(|| format!("Invalid {what}"))?;
    raw.try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("Invalid {what}: expected 32 bytes, got {}", v.len()))
}

pub fn parse_verifying_key(s: &str) -> Result<VerifyingKey> {
    let bytes = key_bytes(s, "public key")?;
    VerifyingKey::from_bytes(&bytes).context("Invalid Ed25519 public key")
}

/// A signing key from its base64url 32-byte seed.
pub fn parse_signing_key(s: &str) -> Result<SigningKey> {
    Ok(SigningKey::from_bytes(&key_bytes(s, "private key seed")?))
}

fn canonical_message(path: &str, body: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(path.len() + 1 + body.len());
    msg.extend_from_slice(path.as_bytes());
    msg.push(b'\n');
    msg.extend_from_slice(body);
    msg
}

/// Sign `body` as served at `path`.
pub fn sign(key: &SigningKey, path: &str, body: &[u8]) -> String {
    b64u_encode(&key.sign(&canonical_message(path, body)).to_bytes())
}

/// Check a base64url signature over `"{path}\n{body}"`.
pub fn verify(key: &VerifyingKey, path: &str, body: &[u8], provided: &str) -> bool {
    let Ok(raw) = b64u_decode(provided) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(&raw) else {
        return false;
    };
    key.verify(&canonical_message(path, body), &sig).is_ok()
}

/// Sign a certificate for `subject` with the CA key.
/// Returns the compact certificate JSON and its base64url signature.
pub fn issue_certificate(
    ca: &SigningKey,
    id: &str,
    subject: &VerifyingKey,
    exp: i64,
) -> Result<(String, String)> {
    let cert = Certificate {
        id: id.to_string(),
        pubkey: b64u_encode(subject.as_bytes()),
        exp,
        iss: CERT_ISSUER.to_string(),
    };
    let json = serde_json::to_string(&cert).context("Failed to serialize certificate")?;
    let sig = b64u_encode(&ca.sign(json.as_bytes()).to_bytes());
    Ok((json, sig))
}

/// Verify a certificate against the CA key, then its expiry and issuer.
pub fn verify_certificate(
    ca: &VerifyingKey,
    cert_json: &str,
    cert_sig: &str,
    now: i64,
) -> Result<Certificate> {
    let sig = b64u_decode(cert_sig)
        .ok()
        .and_then(|raw| Signature::from_slice(&raw).ok())
        .context("Invalid client certificate signature.")?;
    ca.verify(cert_json.as_bytes(), &sig)
        .map_err(|_| anyhow::anyhow!("Invalid client certificate signature."))?;

    let cert: Certificate =
        serde_json::from_str(cert_json).context("Malformed client certificate.")?;
    if cert.exp < now {
        anyhow::bail!("Client certificate expired.");
    }
    if cert.iss != CERT_ISSUER {
        anyhow::bail!("Unexpected client certificate issuer.");
    }
    if cert.pubkey.is_empty() {
        anyhow::bail!("Client certificate missing pubkey.");
    }
    Ok(cert)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Verify the client certificate chain and the request signature over the
/// raw body. Returns the client's certificate.
pub fn verify_request(
    ca: &VerifyingKey,
    path: &str,
    body: &[u8],
    headers: &HeaderMap,
    now: i64,
) -> Result<Certificate> {
    let cert_json = header_str(headers, CLIENT_CERT_HEADER);
    let cert_sig = header_str(headers, CLIENT_CERT_SIG_HEADER);
    let req_sig = header_str(headers, CLIENT_SIG_HEADER);
    if cert_json.is_empty() || cert_sig.is_empty() || req_sig.is_empty() {
        anyhow::bail!("Missing client certificate or signature headers.");
    }

    let cert = verify_certificate(ca, cert_json, cert_sig, now)?;
    let client_key = parse_verifying_key(&cert.pubkey)?;
    if !verify(&client_key, path, body, req_sig) {
        anyhow::bail!("Invalid client request signature.");
    }
    Ok(cert)
}

/// The server's key and CA-issued certificate, used to sign responses.
#[derive(Clone)]
pub struct ServerSigner {
    key: SigningKey,
    cert_json: String,
    cert_sig: String,
}

impl ServerSigner {
    /// Build from the base64url seed and the issued certificate. The
    /// certificate must name this key.
    pub fn new(private_seed: &str, cert_json: &str, cert_sig: &str) -> Result<Self> {
        let key = parse_signing_key(private_seed)?;
        let cert: Certificate =
            serde_json::from_str(cert_json).context("Malformed server certificate JSON")?;
        if cert.pubkey != b64u_encode(key.verifying_key().as_bytes()) {
            anyhow::bail!("Server certificate pubkey does not match PEERTONE_SERVER_PRIV_B64");
        }
        if cert.id != SERVER_CERT_ID {
            anyhow::bail!("Server certificate id must be '{SERVER_CERT_ID}', got '{}'", cert.id);
        }
        Ok(Self {
            key,
            cert_json: cert_json.to_string(),
            cert_sig: cert_sig.trim().to_string(),
        })
    }

    /// Signer from config. None when no server key material is set; an
    /// error when only part of it is.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let parts = [
            ("PEERTONE_SERVER_PRIV_B64", &config.server_private_key),
            ("PEERTONE_SERVER_CERT_JSON", &config.server_cert),
            ("PEERTONE_SERVER_CERT_SIG", &config.server_cert_sig),
        ];
        let missing: Vec<&str> = parts
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.len() == parts.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            anyhow::bail!("Response signing is partially configured; missing {}", missing.join(", "));
        }
        Self::new(&config.server_private_key, &config.server_cert, &config.server_cert_sig).map(Some)
    }

    /// The three X-SPE-Server-* headers for `body` served at `path`.
    pub fn headers(&self, path: &str, body: &[u8]) -> Result<[(HeaderName, HeaderValue); 3]> {
        Ok([
            (
                HeaderName::from_static(SERVER_CERT_HEADER),
                HeaderValue::from_str(&self.cert_json).context("Certificate is not a valid header value")?,
            ),
            (
                HeaderName::from_static(SERVER_CERT_SIG_HEADER),
                HeaderValue::from_str(&self.cert_sig).context("Certificate signature is not a valid header value")?,
            ),
            (
                HeaderName::from_static(SERVER_SIG_HEADER),
                HeaderValue::from_str(&sign(&self.key, path, body))?,
            ),
        ])
    }
}

/// Key material for one CA, the server and the plugin.
pub struct KeyBundle {
    pub ca_public: String,
    pub server_private: String,
    pub server_cert: String,
    pub server_cert_sig: String,
    pub client_private: String,
    pub client_cert: String,
    pub client_cert_sig: String,
}

/// Generate a fresh CA and issue server and client certificates expiring
/// at `exp`.
pub fn generate_keys(exp: i64) -> Result<KeyBundle> {
    let ca = random_signing_key();
    let server = random_signing_key();
    let client = random_signing_key();

    let (server_cert, server_cert_sig) =
        issue_certificate(&ca, SERVER_CERT_ID, &server.verifying_key(), exp)?;
    let (client_cert, client_cert_sig) =
        issue_certificate(&ca, CLIENT_CERT_ID, &client.verifying_key(), exp)?;

    Ok(KeyBundle {
        ca_public: b64u_encode(ca.verifying_key().as_bytes()),
        server_private: b64u_encode(&server.to_bytes()),
        server_cert,
        server_cert_sig,
        client_private: b64u_encode(&client.to_bytes()),
        client_cert,
        client_cert_sig,
    })
}

fn random_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

/// True when the token gate is disabled or the header matches it.
pub fn token_allows(expected: &str, headers: &HeaderMap) -> bool {
    if expected.is_empty() {
        return true;
    }
    constant_time_eq(expected, header_str(headers, API_TOKEN_HEADER).trim())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
