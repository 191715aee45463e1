//! Token metadata cache.
//!
//! The caller owns the cache, fills it before building a transaction, and
//! lends it read-only to the build. Missing entries are fetched as one
//! concurrent batch that either lands completely or not at all.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use cashtab_tx::SlpTokenType;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Genesis metadata of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub token_id: String,
    /// SLP token type byte (1 fungible, 0x81 collection, 0x41 child).
    #[serde(default = "default_token_type")]
    pub token_type: u8,
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub decimals: u32,
    /// Collection a child NFT belongs to.
    #[serde(default)]
    pub group_token_id: Option<String>,
}

fn default_token_type() -> u8 {
    SlpTokenType::Fungible.byte()
}

impl TokenInfo {
    pub fn slp_type(&self) -> Result<SlpTokenType, WalletError> {
        SlpTokenType::from_byte(self.token_type).ok_or_else(|| {
            WalletError::Lookup(format!(
                "token {} has unsupported type {:#04x}",
                self.token_id, self.token_type
            ))
        })
    }
}

/// Where token metadata comes from (an indexer, a node, a fixture).
#[async_trait]
pub trait TokenInfoSource: Send + Sync {
    async fn token_info(&self, token_id: &str) -> Result<TokenInfo, WalletError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCache {
    tokens: HashMap<String, TokenInfo>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token_id: &str) -> Option<&TokenInfo> {
        self.tokens.get(token_id)
    }

    /// Like [`get`](Self::get), but a miss is an error.
    pub fn require(&self, token_id: &str) -> Result<&TokenInfo, WalletError> {
        self.get(token_id)
            .ok_or_else(|| WalletError::UnknownToken(token_id.to_string()))
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.tokens.contains_key(token_id)
    }

    pub fn insert(&mut self, info: TokenInfo) {
        self.tokens.insert(info.token_id.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Ids from `token_ids` not yet cached, deduplicated and sorted.
    pub fn missing<'a>(&self, token_ids: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        token_ids
            .into_iter()
            .filter(|id| !self.contains(id))
            .map(str::to_string)
            .collect()
    }

    /// Fetch every missing id concurrently. Fails on the first lookup error,
    /// in which case nothing is inserted. Returns how many entries were added.
    pub async fn populate<'a>(
        &mut self,
        source: &dyn TokenInfoSource,
        token_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<usize, WalletError> {
        let missing = self.missing(token_ids);
        if missing.is_empty() {
            return Ok(0);
        }
        log::debug!("fetching token info for {} tokens", missing.len());
        let infos = try_join_all(missing.iter().map(|id| source.token_info(id))).await?;
        let added = infos.len();
        for info in infos {
            self.insert(info);
        }
        Ok(added)
    }
}
