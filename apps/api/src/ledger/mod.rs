//! Hash Recorder — writes a document hash to the on-chain registry contract.
//!
//! The transaction is built and signed locally with the configured key, then
//! submitted once with `eth_sendRawTransaction`. `eth_getTransactionReceipt`
//! is polled until the transaction is mined or the receipt timeout elapses.
//! The submission is never retried.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ChainConfig;

pub mod handlers;

alloy::sol! {
    interface IResumeHashRegistry {
        function recordHash(string resumeId, string hashValue) external;
    }
}

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_HEADROOM: u64 = 20;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    Malformed(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("no receipt for transaction {tx_hash} after {waited:?}")]
    ReceiptTimeout { tx_hash: String, waited: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait HashRecorder: Send + Sync {
    async fn record(
        &self,
        document_id: &str,
        hash_value: &str,
    ) -> Result<TransactionReceipt, LedgerError>;
}

/// `0x`-prefixed lowercase hex SHA-256 of a document's text.
pub fn document_hash(text: &str) -> String {
    format!("0x{}", hex::encode(Sha256::digest(text.as_bytes())))
}

/// ABI call data for `recordHash(string,string)`.
pub fn encode_record_hash(document_id: &str, hash_value: &str) -> Vec<u8> {
    IResumeHashRegistry::recordHashCall {
        resumeId: document_id.to_string(),
        hashValue: hash_value.to_string(),
    }
    .abi_encode()
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct ContractHashRecorder {
    client: Client,
    signer: PrivateKeySigner,
    contract: Address,
    config: ChainConfig,
    next_id: AtomicU64,
}

impl fmt::Debug for ContractHashRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHashRecorder")
            .field("sender", &self.signer.address())
            .field("contract", &self.contract)
            .field("rpc_url", &self.config.rpc_url)
            .finish()
    }
}

impl ContractHashRecorder {
    pub fn new(config: ChainConfig) -> anyhow::Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .context("CHAIN_PRIVATE_KEY is not a valid secp256k1 private key")?;
        let contract: Address = config
            .contract_address
            .parse()
            .context("HASH_CONTRACT_ADDRESS is not a valid address")?;

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build chain RPC client")?,
            signer,
            contract,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Account derived from the signing key.
    pub fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response: RpcResponse = self
            .client
            .post(&self.config.rpc_url)
            .json(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128, LedgerError> {
        let result = self.rpc(method, params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| LedgerError::Malformed(format!("{method} result is not a string")))?;
        parse_quantity(raw)
    }

    /// Fills nonce, gas and fees from the node and signs an EIP-1559
    /// transaction. Returns the `0x`-prefixed EIP-2718 encoding.
    async fn sign_record_hash(&self, input: Vec<u8>) -> Result<String, LedgerError> {
        let from = self.sender().to_string();
        let to = self.contract.to_string();
        let data = format!("0x{}", hex::encode(&input));

        let chain_id = to_u64(self.quantity("eth_chainId", json!([])).await?)?;
        let nonce = to_u64(
            self.quantity("eth_getTransactionCount", json!([from, "pending"]))
                .await?,
        )?;
        let estimate = to_u64(
            self.quantity(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": data }]),
            )
            .await?,
        )?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let tip = self.quantity("eth_maxPriorityFeePerGas", json!([])).await?;

        let max_fee_per_gas = gas_price.saturating_mul(2);
        let mut tx = TxEip1559 {
            chain_id,
            nonce,
            gas_limit: estimate.saturating_add(estimate.saturating_mul(GAS_LIMIT_HEADROOM) / 100),
            max_fee_per_gas,
            max_priority_fee_per_gas: tip.min(max_fee_per_gas),
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            access_list: Default::default(),
            input: Bytes::from(input),
        };
        debug!(
            "Signing recordHash tx: chain {chain_id}, nonce {nonce}, gas limit {}",
            tx.gas_limit
        );

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();
        Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, LedgerError> {
        let started = Instant::now();
        loop {
            let receipt = self.rpc("eth_getTransactionReceipt", json!([tx_hash])).await?;

            if !receipt.is_null() {
                if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
                    return Err(LedgerError::Reverted(tx_hash.to_string()));
                }
                let block_number = receipt
                    .get("blockNumber")
                    .and_then(Value::as_str)
                    .map(|raw| parse_quantity(raw).and_then(to_u64))
                    .transpose()?;
                return Ok(TransactionReceipt {
                    transaction_hash: tx_hash.to_string(),
                    block_number,
                });
            }

            let waited = started.elapsed();
            if waited >= self.config.receipt_timeout {
                return Err(LedgerError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited,
                });
            }
            debug!("Receipt for {tx_hash} not available yet");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl HashRecorder for ContractHashRecorder {
    async fn record(
        &self,
        document_id: &str,
        hash_value: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        let raw_tx = self
            .sign_record_hash(encode_record_hash(document_id, hash_value))
            .await?;

        let tx_hash = self
            .rpc("eth_sendRawTransaction", json!([raw_tx]))
            .await?
            .as_str()
            .map(String::from)
            .ok_or_else(|| LedgerError::Malformed("transaction hash is not a string".into()))?;
        info!("Submitted hash for document '{document_id}' in transaction {tx_hash}");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        info!(
            "Hash recorded on-chain, transaction hash: {} (block {:?})",
            receipt.transaction_hash, receipt.block_number
        );
        Ok(receipt)
    }
}

fn parse_quantity(raw: &str) -> Result<u128, LedgerError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u128::from_str_radix(digits, 16)
        .map_err(|_| LedgerError::Malformed(format!("invalid quantity '{raw}'")))
}

fn to_u64(value: u128) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::Malformed(format!("quantity {value} overflows u64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, routing::post, Json, Router};

    /// Well-known development key (first account of the default test mnemonic).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const CONTRACT: &str = "0x00000000000000000000000000000000000000c0";

    #[derive(Clone, Default)]
    struct FakeNode {
        receipt_polls: Arc<AtomicUsize>,
        pending_polls: usize,
        raw_sent: Arc<Mutex<Vec<String>>>,
        nonce_queries: Arc<Mutex<Vec<Value>>>,
        revert: bool,
    }

    async fn node_handler(State(node): State<FakeNode>, Json(req): Json<Value>) -> Json<Value> {
        let id = req["id"].clone();
        let result = match req["method"].as_str() {
            Some("eth_chainId") => json!("0xaa36a7"),
            Some("eth_getTransactionCount") => {
                node.nonce_queries.lock().unwrap().push(req["params"].clone());
                json!("0x5")
            }
            Some("eth_estimateGas") => json!("0xc350"),
            Some("eth_gasPrice") => json!("0x3b9aca00"),
            Some("eth_maxPriorityFeePerGas") => json!("0x5f5e100"),
            Some("eth_sendRawTransaction") => {
                let raw = req["params"][0].as_str().unwrap_or_default().to_string();
                node.raw_sent.lock().unwrap().push(raw);
                json!("0xabc123")
            }
            Some("eth_getTransactionReceipt") => {
                let n = node.receipt_polls.fetch_add(1, Ordering::SeqCst);
                if n < node.pending_polls {
                    Value::Null
                } else {
                    let status = if node.revert { "0x0" } else { "0x1" };
                    json!({ "transactionHash": "0xabc123", "blockNumber": "0x1b4", "status": status })
                }
            }
            _ => {
                return Json(json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": -32601, "message": "method not found" }
                }))
            }
        };
        Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    fn chain_config(rpc_url: String, receipt_timeout: Duration) -> ChainConfig {
        ChainConfig {
            rpc_url,
            contract_address: CONTRACT.to_string(),
            private_key: DEV_KEY.to_string(),
            receipt_timeout,
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn spawn_node(node: FakeNode, receipt_timeout: Duration) -> ContractHashRecorder {
        let router = Router::new().route("/", post(node_handler)).with_state(node);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        ContractHashRecorder::new(chain_config(format!("http://{addr}/"), receipt_timeout)).unwrap()
    }

    #[test]
    fn test_document_hash_is_prefixed_sha256() {
        assert_eq!(
            document_hash("abc"),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sender_is_derived_from_private_key() {
        let recorder =
            ContractHashRecorder::new(chain_config("http://127.0.0.1:1/".into(), Duration::ZERO))
                .unwrap();
        assert_eq!(recorder.sender().to_string().to_lowercase(), DEV_ADDRESS);
    }

    #[test]
    fn test_invalid_private_key_is_rejected() {
        let mut config = chain_config("http://127.0.0.1:1/".into(), Duration::ZERO);
        config.private_key = "0x1234".to_string();
        assert!(ContractHashRecorder::new(config).is_err());
    }

    #[test]
    fn test_encode_two_short_strings() {
        let data = encode_record_hash("a", "b");
        assert_eq!(data.len(), 4 + 6 * 32);
        assert_eq!(&data[..4], &IResumeHashRegistry::recordHashCall::SELECTOR);

        let words: Vec<&[u8]> = data[4..].chunks(32).collect();
        assert_eq!(words[0][31], 0x40);
        assert_eq!(words[1][31], 0x80);
        assert_eq!(words[2][31], 1);
        assert_eq!(words[3][0], b'a');
        assert!(words[3][1..].iter().all(|b| *b == 0));
        assert_eq!(words[4][31], 1);
        assert_eq!(words[5][0], b'b');
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("0xzz").is_err());
        assert!(to_u64(u128::MAX).is_err());
    }

    #[tokio::test]
    async fn test_record_signs_locally_submits_once_and_waits_for_receipt() {
        let node = FakeNode {
            pending_polls: 2,
            ..Default::default()
        };
        let recorder = spawn_node(node.clone(), Duration::from_secs(5)).await;

        let receipt = recorder.record("resume-1", &document_hash("cv")).await.unwrap();

        assert_eq!(
            receipt,
            TransactionReceipt {
                transaction_hash: "0xabc123".to_string(),
                block_number: Some(436),
            }
        );
        assert_eq!(node.receipt_polls.load(Ordering::SeqCst), 3);

        let nonce_queries = node.nonce_queries.lock().unwrap();
        assert_eq!(
            nonce_queries[0][0].as_str().unwrap().to_lowercase(),
            DEV_ADDRESS
        );

        let sent = node.raw_sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        // EIP-1559 typed envelope carrying the ABI call data.
        assert!(sent[0].starts_with("0x02"), "raw tx: {}", sent[0]);
        let calldata = hex::encode(encode_record_hash("resume-1", &document_hash("cv")));
        assert!(sent[0].contains(&calldata));
    }

    #[tokio::test]
    async fn test_reverted_transaction_is_error() {
        let node = FakeNode {
            revert: true,
            ..Default::default()
        };
        let recorder = spawn_node(node, Duration::from_secs(5)).await;
        let err = recorder.record("resume-1", "0x00").await.unwrap_err();
        assert!(matches!(err, LedgerError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_missing_receipt_times_out_without_resubmitting() {
        let node = FakeNode {
            pending_polls: usize::MAX,
            ..Default::default()
        };
        let recorder = spawn_node(node.clone(), Duration::from_millis(50)).await;

        let err = recorder.record("resume-1", "0x00").await.unwrap_err();

        assert!(matches!(err, LedgerError::ReceiptTimeout { .. }));
        assert_eq!(node.raw_sent.lock().unwrap().len(), 1);
    }
}
