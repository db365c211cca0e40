//! Blocking client for the algod v2 REST API.
//!
//! Only the handful of endpoints the payroll tool needs are wrapped:
//!
//! | Method | Path | Used for |
//! |--------|------|----------|
//! | GET  | `/v2/transactions/params` | fee and validity window for new transactions |
//! | GET  | `/v2/accounts/{address}` | balances |
//! | GET  | `/v2/assets/{id}` | asset decimals |
//! | POST | `/v2/transactions` | broadcast signed msgpack bytes |
//! | GET  | `/v2/transactions/pending/{txid}` | confirmation polling |
//! | GET  | `/v2/status`, `/v2/status/wait-for-block-after/{round}` | round tracking |
//! | POST | `/v2/teal/compile` | escrow compilation via the node |
//!
//! Everything above this module is written against the [`AlgodApi`] trait so
//! tests can swap in an in-memory node.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::crypto::Address;

/// Header carrying the node API token.
const TOKEN_HEADER: &str = "X-Algo-API-Token";

/// Transactions built from suggested params stay valid for this many rounds.
pub const VALIDITY_WINDOW: u64 = 1000;

// ── Errors ────────────────────────────────────────────────────────────────────

/// A non-2xx answer from the node.
#[derive(Debug, thiserror::Error)]
pub enum AlgodError {
    #[error("algod returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

// ── Public types ──────────────────────────────────────────────────────────────

/// Network parameters for building a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedParams {
    /// Per-byte fee in microAlgos; zero on an uncongested network.
    pub fee_per_byte: u64,
    /// Floor for any transaction fee, in microAlgos.
    pub min_fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

/// One asset holding from an account record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetHolding {
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
    pub amount: u64,
    #[serde(rename = "is-frozen", default)]
    pub is_frozen: bool,
}

/// Subset of the account record returned by `/v2/accounts/{address}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    /// Balance in microAlgos.
    pub amount: u64,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
}

impl AccountInfo {
    pub fn asset_amount(&self, asset_id: u64) -> Option<u64> {
        self.assets
            .iter()
            .find(|h| h.asset_id == asset_id)
            .map(|h| h.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetParams {
    #[serde(default)]
    pub decimals: u32,
    #[serde(rename = "unit-name", default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetInfo {
    pub index: u64,
    pub params: AssetParams,
}

/// State of a submitted transaction as seen by the node's pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PendingTransaction {
    #[serde(rename = "confirmed-round", default)]
    pub confirmed_round: Option<u64>,
    /// Non-empty when the pool has rejected the transaction.
    #[serde(rename = "pool-error", default)]
    pub pool_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeStatus {
    #[serde(rename = "last-round")]
    pub last_round: u64,
}

/// Output of `/v2/teal/compile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTeal {
    /// Program hash, i.e. the escrow account address.
    pub hash: Address,
    pub program: Vec<u8>,
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawParams {
    fee: u64,
    #[serde(rename = "min-fee")]
    min_fee: u64,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "genesis-id")]
    genesis_id: String,
    #[serde(rename = "genesis-hash")]
    genesis_hash: String,
}

#[derive(Debug, Deserialize)]
struct RawCompile {
    hash: String,
    result: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn params_from_raw(raw: RawParams) -> Result<SuggestedParams> {
    let hash = B64
        .decode(&raw.genesis_hash)
        .context("Failed to base64-decode genesis hash")?;
    let genesis_hash: [u8; 32] = hash
        .as_slice()
        .try_into()
        .with_context(|| format!("Genesis hash must be 32 bytes, got {}", hash.len()))?;

    Ok(SuggestedParams {
        fee_per_byte: raw.fee,
        min_fee: raw.min_fee,
        first_valid: raw.last_round,
        last_valid: raw.last_round + VALIDITY_WINDOW,
        genesis_id: raw.genesis_id,
        genesis_hash,
    })
}

fn compiled_from_raw(raw: RawCompile) -> Result<CompiledTeal> {
    Ok(CompiledTeal {
        hash: raw
            .hash
            .parse()
            .context("Node returned an invalid program hash")?,
        program: B64
            .decode(&raw.result)
            .context("Failed to base64-decode compiled program")?,
    })
}

// ── API trait ─────────────────────────────────────────────────────────────────

/// The node operations the payroll tool depends on.
pub trait AlgodApi {
    fn suggested_params(&self) -> Result<SuggestedParams>;
    fn account_info(&self, address: &Address) -> Result<AccountInfo>;
    fn asset_info(&self, asset_id: u64) -> Result<AssetInfo>;
    /// Submit one or more concatenated signed transactions; returns the id of
    /// the first.
    fn send_raw_transaction(&self, signed: &[u8]) -> Result<String>;
    fn pending_transaction_info(&self, txid: &str) -> Result<PendingTransaction>;
    fn status(&self) -> Result<NodeStatus>;
    /// Block until the node has seen a round after `round`.
    fn status_after_block(&self, round: u64) -> Result<NodeStatus>;
    fn compile_teal(&self, source: &str) -> Result<CompiledTeal>;
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub struct AlgodClient {
    base_url: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl AlgodClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(AlgodClient {
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {}", path);
        let resp = self
            .http
            .get(self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .with_context(|| format!("Failed to reach algod at {}", self.base_url))?;
        decode_response(resp, path)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<T> {
        debug!("POST {} ({} bytes)", path, body.len());
        let resp = self
            .http
            .post(self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .with_context(|| format!("Failed to reach algod at {}", self.base_url))?;
        decode_response(resp, path)
    }
}

fn decode_response<T: DeserializeOwned>(resp: reqwest::blocking::Response, path: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        return Err(AlgodError::Api {
            status: status.as_u16(),
            message,
        })
        .with_context(|| format!("Request to {} failed", path));
    }
    resp.json()
        .with_context(|| format!("Failed to parse algod response from {}", path))
}

impl AlgodApi for AlgodClient {
    fn suggested_params(&self) -> Result<SuggestedParams> {
        params_from_raw(self.get_json("/v2/transactions/params")?)
    }

    fn account_info(&self, address: &Address) -> Result<AccountInfo> {
        self.get_json(&format!("/v2/accounts/{}", address))
    }

    fn asset_info(&self, asset_id: u64) -> Result<AssetInfo> {
        self.get_json(&format!("/v2/assets/{}", asset_id))
    }

    fn send_raw_transaction(&self, signed: &[u8]) -> Result<String> {
        let resp: SendResponse =
            self.post_json("/v2/transactions", "application/x-binary", signed.to_vec())?;
        Ok(resp.tx_id)
    }

    fn pending_transaction_info(&self, txid: &str) -> Result<PendingTransaction> {
        self.get_json(&format!("/v2/transactions/pending/{}?format=json", txid))
    }

    fn status(&self) -> Result<NodeStatus> {
        self.get_json("/v2/status")
    }

    fn status_after_block(&self, round: u64) -> Result<NodeStatus> {
        self.get_json(&format!("/v2/status/wait-for-block-after/{}", round))
    }

    fn compile_teal(&self, source: &str) -> Result<CompiledTeal> {
        compiled_from_raw(self.post_json(
            "/v2/teal/compile",
            "text/plain",
            source.as_bytes().to_vec(),
        )?)
    }
}

// ── Confirmation ──────────────────────────────────────────────────────────────

/// Default number of rounds to wait for a transaction to be confirmed.
pub const DEFAULT_WAIT_ROUNDS: u64 = 4;

/// Poll the pending pool until `txid` is confirmed.
///
/// Advances one round at a time starting from the node's current round.
///
/// # Errors
/// `wait_rounds` is zero, the pool rejected the transaction, or it was
/// still unconfirmed after `wait_rounds` rounds.
pub fn wait_for_confirmation<C: AlgodApi + ?Sized>(
    client: &C,
    txid: &str,
    wait_rounds: u64,
) -> Result<PendingTransaction> {
    if wait_rounds == 0 {
        bail!("Waiting for {} needs at least one round", txid);
    }
    let start = client.status()?.last_round.saturating_add(1);
    let end = start.saturating_add(wait_rounds);
    let mut current = start;

    while current < end {
        let pending = client
            .pending_transaction_info(txid)
            .with_context(|| format!("Failed to fetch pending info for {}", txid))?;

        if let Some(round) = pending.confirmed_round.filter(|r| *r > 0) {
            debug!("{} confirmed in round {}", txid, round);
            return Ok(pending);
        }
        if !pending.pool_error.is_empty() {
            bail!("Transaction {} rejected by pool: {}", txid, pending.pool_error);
        }

        client.status_after_block(current)?;
        current = current.saturating_add(1);
    }

    bail!(
        "Transaction {} not confirmed after {} rounds",
        txid,
        wait_rounds
    )
}
