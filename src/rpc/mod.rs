use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contracts::ContractCall;
use crate::proposal::Address;

#[cfg(test)]
pub mod mock;

/// Read and write access to deployed contracts. Signing happens behind this
/// seam; a write resolves only once the transaction is confirmed.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn read_contract(&self, chain_id: u64, call: &ContractCall) -> Result<Value>;

    async fn send_and_confirm(
        &self,
        chain_id: u64,
        from: &Address,
        call: &ContractCall,
    ) -> Result<TransactionReceipt>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub status: String,
    pub block_number: u64,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_str(), "success" | "0x1")
    }
}

#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self { inner: client })
    }

    fn call_params(chain_id: u64, call: &ContractCall) -> Result<ObjectParams> {
        let mut params = ObjectParams::new();
        params
            .insert("chain_id", chain_id)
            .context("Failed to encode chain_id parameter")?;
        params
            .insert("address", call.address.as_str())
            .context("Failed to encode address parameter")?;
        params
            .insert("method", call.method)
            .context("Failed to encode method parameter")?;
        params
            .insert("args", &call.args)
            .context("Failed to encode args parameter")?;
        Ok(params)
    }
}

#[async_trait]
impl ContractGateway for RpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let raw: String = self
            .inner
            .request("eth_chainId", rpc_params![])
            .await
            .context("RPC call eth_chainId failed")?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| anyhow!("eth_chainId returned non-hex value {raw}"))?;
        u64::from_str_radix(digits, 16)
            .with_context(|| format!("eth_chainId returned invalid value {raw}"))
    }

    async fn read_contract(&self, chain_id: u64, call: &ContractCall) -> Result<Value> {
        let params = Self::call_params(chain_id, call)?;
        let response: Value = self
            .inner
            .request("contract_read", params)
            .await
            .with_context(|| {
                format!(
                    "RPC call contract_read {}.{} failed",
                    call.address, call.method
                )
            })?;
        Ok(response)
    }

    async fn send_and_confirm(
        &self,
        chain_id: u64,
        from: &Address,
        call: &ContractCall,
    ) -> Result<TransactionReceipt> {
        let mut params = Self::call_params(chain_id, call)?;
        params
            .insert("from", from.as_str())
            .context("Failed to encode from parameter")?;

        let receipt: TransactionReceipt = self
            .inner
            .request("contract_sendAndConfirm", params)
            .await
            .with_context(|| format!("RPC call contract_sendAndConfirm {} failed", call.method))?;

        if receipt.tx_hash.is_empty() {
            bail!("Gateway returned empty transaction hash for {}", call.method);
        }
        if !receipt.succeeded() {
            bail!(
                "Transaction {} ({}) reverted with status {}",
                receipt.tx_hash,
                call.method,
                receipt.status
            );
        }
        Ok(receipt)
    }
}
