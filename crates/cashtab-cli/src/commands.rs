//! CLI command implementations.

use crate::AppContext;
use cashtab_rpc::{Broadcaster, NodeRpc, RpcConfig};
use cashtab_tx::fee::estimate_p2pkh_fee;
use cashtab_tx::{FeeRate, OpReturnPayload, Transaction};
use cashtab_types::{decimalize_token_amount, to_satoshis, undecimalize_token_amount};
use cashtab_wallet::{
    build_transaction, send_transaction, Recipient, TokenCache, TransactionIntent, Wallet, WalletConfig,
};
use serde::Deserialize;
use std::path::Path;

type Result = std::result::Result<String, Box<dyn std::error::Error>>;

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub wallet: WalletConfig,
    pub rpc: Option<RpcConfig>,
}

pub fn load_config(path: &Path) -> std::result::Result<CliConfig, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&data)?)
}

// ─── Conversions ────────────────────────────────────────────────────────────

pub fn to_sats(xec: &str) -> Result {
    Ok(to_satoshis(xec)?.to_string())
}

pub fn to_xec(sats: u64) -> Result {
    Ok(cashtab_types::to_xec(sats))
}

pub fn decimalize(amount: &str, decimals: u32) -> Result {
    Ok(decimalize_token_amount(amount, decimals)?)
}

pub fn undecimalize(amount: &str, decimals: u32) -> Result {
    Ok(undecimalize_token_amount(amount, decimals)?)
}

pub fn estimate_fee(inputs: usize, outputs: usize, sats_per_kb: u64) -> Result {
    if inputs == 0 || outputs == 0 {
        return Err("a transaction needs at least one input and one output".into());
    }
    let fee = estimate_p2pkh_fee(inputs, outputs, FeeRate::new(sats_per_kb));
    Ok(format!("{} sats ({} XEC)", fee, cashtab_types::to_xec(fee)))
}

// ─── Sending ────────────────────────────────────────────────────────────────

pub async fn send(
    ctx: &AppContext,
    address: &str,
    amount: &str,
    message: Option<String>,
    broadcast: bool,
) -> Result {
    let mut wallet = Wallet::load(&ctx.wallet_path)
        .map_err(|e| format!("cannot open wallet {}: {}", ctx.wallet_path.display(), e))?;
    let sats = to_satoshis(amount)?;
    let intent = TransactionIntent::SendXec {
        recipients: vec![Recipient::new(address, sats)],
        op_return: message.map(OpReturnPayload::Message),
    };
    let cache = TokenCache::new();

    if !broadcast {
        let fee_rate = ctx.wallet_config.fee_rate_for(&wallet);
        let built = build_transaction(&wallet, &ctx.wallet_config, &cache, &intent, fee_rate)?;
        return Ok(format!(
            "txid: {}\nfee:  {} sats\nhex:  {}",
            built.signed.txid(),
            built.signed.fee,
            built.signed.hex()
        ));
    }

    log::info!("sending {} sats to {} on {:?}", sats, address, ctx.network);
    let node = NodeRpc::with_config(ctx.rpc_config.clone())?;
    let sent = send_transaction(&mut wallet, &ctx.wallet_config, &cache, &intent, &node)
        .await
        .map_err(|e| match e.code() {
            Some(code) => format!("send failed (code {}): {}", code, e),
            None => format!("send failed: {}", e),
        })?;
    wallet.save(&ctx.wallet_path)?;
    Ok(format!("txid: {}\nfee:  {} sats", sent.txid, sent.fee))
}

pub async fn broadcast(ctx: &AppContext, raw_hex: &str) -> Result {
    let tx = Transaction::from_hex(raw_hex.trim())?;
    let node = NodeRpc::with_config(ctx.rpc_config.clone())?;
    let txid = node.broadcast(&tx.to_hex()).await.map_err(|e| match e.code() {
        Some(code) => format!("broadcast failed (code {}): {}", code, e),
        None => format!("broadcast failed: {}", e),
    })?;
    Ok(txid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashtab_types::cashaddr::{AddressType, CashAddress};
    use cashtab_types::constants::{Network, DEFAULT_DERIVATION_PATH};
    use cashtab_tx::{OutPoint, Script, Txid};
    use cashtab_wallet::{PathInfo, Utxo};
    use std::path::PathBuf;

    const HASH: [u8; 20] = [0x22; 20];

    fn context(wallet_path: PathBuf) -> AppContext {
        AppContext {
            network: Network::Mainnet,
            wallet_path,
            wallet_config: WalletConfig::default(),
            // Nothing listens here; tests that reach the node fail fast.
            rpc_config: RpcConfig { url: "http://127.0.0.1:1".into(), retries: 0, ..Default::default() },
        }
    }

    fn write_wallet(dir: &Path, value: u64) -> PathBuf {
        let address = CashAddress::new(Network::Mainnet, AddressType::P2pkh, HASH).encode();
        let mut wallet = Wallet::new(
            "cli",
            DEFAULT_DERIVATION_PATH,
            PathInfo { address, hash: HASH, pk: [2; 33], sk: [0x11; 32] },
        );
        wallet.set_utxos(vec![Utxo {
            outpoint: OutPoint::new(Txid([7; 32]), 0),
            value,
            output_script: Script::p2pkh(&HASH),
            block_height: Some(1),
            token: None,
        }]);
        let path = dir.join("wallet.json");
        wallet.save(&path).unwrap();
        path
    }

    fn destination() -> String {
        CashAddress::new(Network::Mainnet, AddressType::P2pkh, [0x33; 20]).encode()
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_sats("123.45").unwrap(), "12345");
        assert!(to_sats("1.001").is_err());
        assert_eq!(to_xec(100).unwrap(), "1");
        assert_eq!(decimalize("100", 5).unwrap(), "0.00100");
        assert_eq!(undecimalize("100.12345", 5).unwrap(), "10012345");
    }

    #[test]
    fn test_estimate_fee() {
        // 1 input, 2 outputs: 226 bytes
        assert_eq!(estimate_fee(1, 2, 2010).unwrap(), "455 sats (4.55 XEC)");
        assert_eq!(estimate_fee(1, 2, 1000).unwrap(), "226 sats (2.26 XEC)");
        assert!(estimate_fee(0, 1, 2010).is_err());
        assert_eq!(
            estimate_fee(1, 2, u64::MAX).unwrap(),
            format!("{} sats ({} XEC)", u64::MAX, cashtab_types::to_xec(u64::MAX))
        );
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"wallet":{"fee_rate":1000},"rpc":{"url":"http://node:8332"}}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.wallet.fee_rate, Some(FeeRate::minimum()));
        assert_eq!(config.rpc.unwrap().url, "http://node:8332");
        assert!(load_config(&dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn test_send_without_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wallet(dir.path(), 10_000);
        let before = std::fs::read_to_string(&path).unwrap();

        let ctx = context(path.clone());
        let out = send(&ctx, &destination(), "50", Some("hi".into()), false).await.unwrap();
        assert!(out.starts_with("txid: "));

        let hex_line = out.lines().find_map(|l| l.strip_prefix("hex:  ")).unwrap();
        let tx = Transaction::from_hex(hex_line).unwrap();
        assert_eq!(tx.outputs[0].value, 0);
        assert_eq!(tx.outputs[1].value, 5000);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_send_insufficient_funds() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(write_wallet(dir.path(), 1));
        let err = send(&ctx, &destination(), "100", None, false).await.unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn test_send_missing_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("nope.json"));
        let err = send(&ctx, &destination(), "1", None, false).await.unwrap_err();
        assert!(err.to_string().contains("cannot open wallet"));
    }

    #[tokio::test]
    async fn test_broadcast_rejects_bad_hex() {
        let ctx = context(PathBuf::from("unused"));
        assert!(broadcast(&ctx, "zz").await.is_err());
        assert!(broadcast(&ctx, "0200").await.is_err());
    }
}
