//! Wallet model.
//!
//! A wallet is a name, its keys per derivation path, and a snapshot of chain
//! state: spendable XEC, token UTXOs, decimalized token balances and parsed
//! history. The snapshot is replaced wholesale on refresh and trimmed after
//! each successful broadcast.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use cashtab_tx::{KeySigner, OutPoint, P2pkhKey, Script, Txid};
use cashtab_types::constants::DEFAULT_DERIVATION_PATH;
use cashtab_types::decimalize_token_amount;
use serde::{Deserialize, Serialize};

use crate::cache::TokenCache;
use crate::error::WalletError;
use crate::utxo::Utxo;

/// Keys and address for one derivation path.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub address: String,
    #[serde(with = "hex_array")]
    pub hash: [u8; 20],
    #[serde(with = "hex_array")]
    pub pk: [u8; 33],
    #[serde(with = "hex_array")]
    pub sk: [u8; 32],
}

impl PathInfo {
    pub fn output_script(&self) -> Script {
        Script::p2pkh(&self.hash)
    }
}

impl fmt::Debug for PathInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathInfo")
            .field("address", &self.address)
            .field("hash", &hex::encode(self.hash))
            .finish_non_exhaustive()
    }
}

/// Block a transaction was mined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub height: i32,
    pub hash: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// A history entry. `block` stays empty until the transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTx {
    pub txid: Txid,
    #[serde(default)]
    pub block: Option<BlockMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletState {
    pub balance_sats: u64,
    pub xec_utxos: Vec<Utxo>,
    pub token_utxos: Vec<Utxo>,
    /// Token id to decimalized balance.
    pub tokens: HashMap<String, String>,
    pub parsed_tx_history: Vec<ParsedTx>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    paths: BTreeMap<u32, PathInfo>,
    #[serde(default)]
    pub state: WalletState,
}

impl Wallet {
    /// A wallet with a single derivation path and empty state.
    pub fn new(name: impl Into<String>, path: u32, info: PathInfo) -> Self {
        let mut paths = BTreeMap::new();
        paths.insert(path, info);
        Self { name: name.into(), paths, state: WalletState::default() }
    }

    // ── Paths and keys ───────────────────────────────────────────────────

    /// Add a derivation path. Existing paths are never replaced.
    pub fn add_path(&mut self, path: u32, info: PathInfo) -> Result<(), WalletError> {
        if self.paths.contains_key(&path) {
            return Err(WalletError::DuplicatePath(path));
        }
        self.paths.insert(path, info);
        Ok(())
    }

    pub fn path(&self, path: u32) -> Result<&PathInfo, WalletError> {
        self.paths.get(&path).ok_or(WalletError::UnknownPath(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = (u32, &PathInfo)> {
        self.paths.iter().map(|(&p, info)| (p, info))
    }

    /// Public key hashes of every path.
    pub fn hashes(&self) -> Vec<[u8; 20]> {
        self.paths.values().map(|p| p.hash).collect()
    }

    /// Paths other than the default one. Wallets holding any of these were
    /// created by older versions and need migration.
    pub fn legacy_paths(&self) -> Vec<u32> {
        self.paths
            .keys()
            .copied()
            .filter(|&p| p != DEFAULT_DERIVATION_PATH)
            .collect()
    }

    /// A signer holding the key of every path.
    pub fn key_signer(&self) -> Result<KeySigner, WalletError> {
        let mut signer = KeySigner::new();
        for info in self.paths.values() {
            signer.add_key(P2pkhKey::new(&info.sk, info.hash)?);
        }
        Ok(signer)
    }

    /// Two wallet entries are the same wallet when they hold the same keys.
    pub fn is_same_wallet(&self, other: &Wallet) -> bool {
        self.hashes() == other.hashes()
    }

    // ── State ────────────────────────────────────────────────────────────

    /// Spendable XEC, summed from the non-token UTXOs.
    pub fn balance_sats(&self) -> u64 {
        self.state.xec_utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.value))
    }

    pub fn has_unfinalized_txs_in_history(&self) -> bool {
        self.state.parsed_tx_history.iter().any(|tx| tx.block.is_none())
    }

    /// Replace the UTXO snapshot, splitting XEC from token UTXOs.
    pub fn set_utxos(&mut self, utxos: Vec<Utxo>) {
        let (token_utxos, xec_utxos): (Vec<_>, Vec<_>) = utxos.into_iter().partition(Utxo::is_token);
        self.state.xec_utxos = xec_utxos;
        self.state.token_utxos = token_utxos;
        self.state.balance_sats = self.balance_sats();
    }

    /// Drop UTXOs spent by a broadcast transaction. Returns how many were removed.
    pub fn remove_spent(&mut self, spent: &[OutPoint]) -> usize {
        let before = self.state.xec_utxos.len() + self.state.token_utxos.len();
        self.state.xec_utxos.retain(|u| !spent.contains(&u.outpoint));
        self.state.token_utxos.retain(|u| !spent.contains(&u.outpoint));
        self.state.balance_sats = self.balance_sats();
        before - self.state.xec_utxos.len() - self.state.token_utxos.len()
    }

    /// Recompute decimalized token balances from the token UTXOs.
    ///
    /// Tokens without cached metadata are left out and returned so the caller
    /// can fetch them.
    pub fn refresh_token_balances(&mut self, cache: &TokenCache) -> Result<Vec<String>, WalletError> {
        // Balances can exceed a single u64 SLP quantity.
        let mut atoms: BTreeMap<&str, u128> = BTreeMap::new();
        for token in self.state.token_utxos.iter().filter_map(|u| u.token.as_ref()) {
            if token.is_mint_baton {
                continue;
            }
            *atoms.entry(token.token_id.as_str()).or_default() += u128::from(token.atoms);
        }

        let mut tokens = HashMap::new();
        let mut uncached = Vec::new();
        for (token_id, total) in atoms {
            match cache.get(token_id) {
                Some(info) => {
                    let balance = decimalize_token_amount(&total.to_string(), info.decimals)?;
                    tokens.insert(token_id.to_string(), balance);
                }
                None => uncached.push(token_id.to_string()),
            }
        }
        if !uncached.is_empty() {
            log::warn!("{} tokens have no cached info; balances skipped", uncached.len());
        }
        self.state.tokens = tokens;
        Ok(uncached)
    }

    // ── Storage ──────────────────────────────────────────────────────────

    /// Load a wallet from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let data = std::fs::read_to_string(path)?;
        let wallet: Wallet = serde_json::from_str(&data).map_err(|e| WalletError::InvalidFile(e.to_string()))?;
        if wallet.paths.is_empty() {
            return Err(WalletError::InvalidFile("wallet has no derivation paths".into()));
        }
        Ok(wallet)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WalletError> {
        let data = serde_json::to_string_pretty(self).map_err(|e| WalletError::InvalidFile(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// The wallet list after activating `active`: it moves to the front and the
/// remaining wallets follow sorted by name.
pub fn wallets_for_new_active_wallet(active: &Wallet, wallets: &[Wallet]) -> Result<Vec<Wallet>, WalletError> {
    if !wallets.iter().any(|w| w.is_same_wallet(active)) {
        return Err(WalletError::WalletNotFound(active.name.clone()));
    }
    let mut rest: Vec<Wallet> = wallets
        .iter()
        .filter(|w| !w.is_same_wallet(active))
        .cloned()
        .collect();
    rest.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut ordered = Vec::with_capacity(rest.len() + 1);
    ordered.push(active.clone());
    ordered.extend(rest);
    Ok(ordered)
}

/// Serde for fixed-size byte arrays as hex strings.
mod hex_array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(bytes: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(d: D) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected {} bytes, got {}", N, len)))
    }
}
