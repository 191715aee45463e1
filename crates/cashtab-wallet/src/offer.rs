//! Marketplace offers.
//!
//! Offer scripts are opaque to the wallet. An [`AgoraOffer`] reports its
//! price, fees and the outputs its covenant enforces, and hands out the
//! signatory that unlocks its input. [`OfferSource`] finds offers; the listing
//! helpers here fan its lookups out concurrently.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cashtab_tx::{FeeRate, InputType, Script, Signatory, SlpTokenType, SpendInput, TxError, TxOutput};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::cache::{TokenCache, TokenInfoSource};
use crate::error::WalletError;

/// Inputs to an accept fee estimate.
#[derive(Debug, Clone)]
pub struct AcceptFeeParams {
    /// Where the bought tokens go.
    pub recipient_script: Script,
    /// Fuel inputs beyond the offer input.
    pub extra_inputs: Vec<InputType>,
    pub accepted_atoms: u64,
    pub fee_rate: FeeRate,
}

/// Inputs to a cancel fee estimate.
#[derive(Debug, Clone)]
pub struct CancelFeeParams {
    /// Where the returned tokens go.
    pub recipient_script: Script,
    pub extra_inputs: Vec<InputType>,
    pub fee_rate: FeeRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OfferVariant {
    /// All-or-nothing, used for NFTs.
    Oneshot,
    /// Any multiple of a minimum lot.
    Partial,
}

/// A listed offer of tokens for XEC.
pub trait AgoraOffer: fmt::Debug + Send + Sync {
    fn variant(&self) -> OfferVariant;

    fn token_id(&self) -> &str;

    fn token_type(&self) -> SlpTokenType;

    /// Collection the offered token belongs to, for child NFTs.
    fn group_token_id(&self) -> Option<&str> {
        None
    }

    fn offered_atoms(&self) -> u64;

    /// Compressed public key of the seller.
    fn seller_pk(&self) -> &[u8; 33];

    /// The UTXO locked by the offer covenant, sized for its unlocking script.
    fn offer_input(&self) -> SpendInput;

    /// Price in sats for `accepted_atoms`.
    fn asked_sats(&self, accepted_atoms: u64) -> u64;

    fn accept_fee_sats(&self, params: &AcceptFeeParams) -> u64;

    fn cancel_fee_sats(&self, params: &CancelFeeParams) -> u64;

    /// Outputs the covenant requires at the front of an accept transaction.
    fn enforced_outputs(&self, accepted_atoms: u64) -> Vec<TxOutput>;

    /// Unlocks the offer input for a buyer. `covenant_sk` signs the covenant
    /// path and need not belong to the seller.
    fn accept_signatory(&self, covenant_sk: &[u8; 32]) -> Result<Arc<dyn Signatory>, TxError>;

    /// Unlocks the offer input for the seller.
    fn cancel_signatory(&self, seller_sk: &[u8; 32]) -> Result<Arc<dyn Signatory>, TxError>;
}

/// Looks up live offers.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Collections that currently have at least one offer.
    async fn offered_group_token_ids(&self) -> Result<Vec<String>, WalletError>;

    async fn active_offers_by_pubkey(&self, pubkey: &[u8; 33]) -> Result<Vec<Arc<dyn AgoraOffer>>, WalletError>;

    async fn active_offers_by_group_token_id(
        &self,
        group_token_id: &str,
    ) -> Result<Vec<Arc<dyn AgoraOffer>>, WalletError>;
}

/// Collection offers split by who listed them.
#[derive(Debug, Default, Clone)]
pub struct OfferListings {
    /// Every listed one-shot offer, by offered token id.
    pub by_token_id: HashMap<String, Arc<dyn AgoraOffer>>,
    /// Collection id to the wallet's own offers in it.
    pub mine: HashMap<String, Vec<Arc<dyn AgoraOffer>>>,
    /// Collection id to everyone else's offers in it.
    pub others: HashMap<String, Vec<Arc<dyn AgoraOffer>>>,
    /// Collection and token ids with no cached metadata.
    pub uncached_token_ids: BTreeSet<String>,
}

/// List one-shot offers of every offered collection.
///
/// Lookups per collection run concurrently; any failure aborts the listing.
pub async fn list_collection_offers(
    source: &dyn OfferSource,
    cache: &TokenCache,
    my_pubkey: &[u8; 33],
) -> Result<OfferListings, WalletError> {
    let (group_ids, my_offers) = futures::try_join!(
        source.offered_group_token_ids(),
        source.active_offers_by_pubkey(my_pubkey),
    )?;
    let my_token_ids: HashSet<&str> = my_offers.iter().map(|o| o.token_id()).collect();

    let per_group = try_join_all(
        group_ids
            .iter()
            .map(|id| source.active_offers_by_group_token_id(id)),
    )
    .await?;

    let mut listings = OfferListings::default();
    for (group_id, offers) in group_ids.iter().zip(per_group) {
        if !cache.contains(group_id) {
            listings.uncached_token_ids.insert(group_id.clone());
        }
        let (mine, others): (Vec<_>, Vec<_>) = offers
            .into_iter()
            .filter(|o| o.variant() == OfferVariant::Oneshot)
            .partition(|o| my_token_ids.contains(o.token_id()));

        for offer in mine.iter().chain(others.iter()) {
            if !cache.contains(offer.token_id()) {
                listings.uncached_token_ids.insert(offer.token_id().to_string());
            }
            listings
                .by_token_id
                .insert(offer.token_id().to_string(), offer.clone());
        }
        if !mine.is_empty() {
            listings.mine.insert(group_id.clone(), mine);
        }
        if !others.is_empty() {
            listings.others.insert(group_id.clone(), others);
        }
    }

    log::info!(
        "listed {} offers across {} collections",
        listings.by_token_id.len(),
        group_ids.len()
    );
    Ok(listings)
}

/// List collection offers and cache metadata for the tokens they mention.
///
/// Offers are still returned when the metadata batch fails; the failure is
/// logged and the cache is left as it was.
pub async fn load_collection_offers(
    source: &dyn OfferSource,
    token_source: &dyn TokenInfoSource,
    cache: &mut TokenCache,
    my_pubkey: &[u8; 33],
) -> Result<OfferListings, WalletError> {
    let listings = list_collection_offers(source, cache, my_pubkey).await?;
    let ids = listings.uncached_token_ids.iter().map(String::as_str);
    if let Err(e) = cache.populate(token_source, ids).await {
        log::error!("error caching token info for listed offers: {}", e);
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TokenInfo;
    use cashtab_tx::{OutPoint, Txid};

    #[derive(Debug)]
    struct Listed {
        token_id: String,
        variant: OfferVariant,
        pk: [u8; 33],
    }

    impl AgoraOffer for Listed {
        fn variant(&self) -> OfferVariant {
            self.variant
        }
        fn token_id(&self) -> &str {
            &self.token_id
        }
        fn token_type(&self) -> SlpTokenType {
            SlpTokenType::NftChild
        }
        fn offered_atoms(&self) -> u64 {
            1
        }
        fn seller_pk(&self) -> &[u8; 33] {
            &self.pk
        }
        fn offer_input(&self) -> SpendInput {
            SpendInput::p2pkh(OutPoint::new(Txid([1; 32]), 1), 546, Script::default())
        }
        fn asked_sats(&self, _: u64) -> u64 {
            1000
        }
        fn accept_fee_sats(&self, _: &AcceptFeeParams) -> u64 {
            0
        }
        fn cancel_fee_sats(&self, _: &CancelFeeParams) -> u64 {
            0
        }
        fn enforced_outputs(&self, _: u64) -> Vec<TxOutput> {
            Vec::new()
        }
        fn accept_signatory(&self, _: &[u8; 32]) -> Result<Arc<dyn Signatory>, TxError> {
            Err(TxError::Signing("not signable".into()))
        }
        fn cancel_signatory(&self, _: &[u8; 32]) -> Result<Arc<dyn Signatory>, TxError> {
            Err(TxError::Signing("not signable".into()))
        }
    }

    fn offer(token_id: &str, variant: OfferVariant, pk: u8) -> Arc<dyn AgoraOffer> {
        Arc::new(Listed { token_id: token_id.to_string(), variant, pk: [pk; 33] })
    }

    const ME: [u8; 33] = [2; 33];

    struct Market {
        fail_group: Option<&'static str>,
    }

    #[async_trait]
    impl OfferSource for Market {
        async fn offered_group_token_ids(&self) -> Result<Vec<String>, WalletError> {
            Ok(vec!["g1".into(), "g2".into(), "g3".into()])
        }

        async fn active_offers_by_pubkey(&self, pubkey: &[u8; 33]) -> Result<Vec<Arc<dyn AgoraOffer>>, WalletError> {
            assert_eq!(pubkey, &ME);
            Ok(vec![offer("n1", OfferVariant::Oneshot, 2)])
        }

        async fn active_offers_by_group_token_id(
            &self,
            group_token_id: &str,
        ) -> Result<Vec<Arc<dyn AgoraOffer>>, WalletError> {
            if self.fail_group == Some(group_token_id) {
                return Err(WalletError::Lookup(format!("{} unavailable", group_token_id)));
            }
            Ok(match group_token_id {
                "g1" => vec![
                    offer("n1", OfferVariant::Oneshot, 2),
                    offer("n2", OfferVariant::Oneshot, 3),
                    offer("f1", OfferVariant::Partial, 3),
                ],
                "g2" => vec![offer("n3", OfferVariant::Oneshot, 4)],
                _ => vec![],
            })
        }
    }

    struct Indexer {
        fail: bool,
    }

    #[async_trait]
    impl TokenInfoSource for Indexer {
        async fn token_info(&self, token_id: &str) -> Result<TokenInfo, WalletError> {
            if self.fail {
                return Err(WalletError::Lookup("indexer down".into()));
            }
            Ok(TokenInfo {
                token_id: token_id.to_string(),
                token_type: 0x41,
                ticker: String::new(),
                name: token_id.to_string(),
                url: String::new(),
                decimals: 0,
                group_token_id: None,
            })
        }
    }

    #[tokio::test]
    async fn test_list_partitions_mine_and_others() {
        let market = Market { fail_group: None };
        let listings = list_collection_offers(&market, &TokenCache::new(), &ME).await.unwrap();

        assert_eq!(listings.by_token_id.len(), 3);
        assert!(!listings.by_token_id.contains_key("f1"));
        assert_eq!(listings.mine["g1"].len(), 1);
        assert_eq!(listings.mine["g1"][0].token_id(), "n1");
        assert_eq!(listings.others["g1"][0].token_id(), "n2");
        assert_eq!(listings.others["g2"].len(), 1);
        assert!(!listings.mine.contains_key("g2"));
        assert!(!listings.others.contains_key("g3"));

        let uncached: Vec<&str> = listings.uncached_token_ids.iter().map(String::as_str).collect();
        assert_eq!(uncached, vec!["g1", "g2", "g3", "n1", "n2", "n3"]);
    }

    #[tokio::test]
    async fn test_list_fails_fast() {
        let market = Market { fail_group: Some("g2") };
        let err = list_collection_offers(&market, &TokenCache::new(), &ME).await.unwrap_err();
        assert!(matches!(err, WalletError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_load_populates_cache() {
        let market = Market { fail_group: None };
        let mut cache = TokenCache::new();
        let listings = load_collection_offers(&market, &Indexer { fail: false }, &mut cache, &ME)
            .await
            .unwrap();
        assert_eq!(cache.len(), listings.uncached_token_ids.len());
        assert!(cache.contains("n3"));
    }

    #[tokio::test]
    async fn test_load_tolerates_metadata_failure() {
        let market = Market { fail_group: None };
        let mut cache = TokenCache::new();
        let listings = load_collection_offers(&market, &Indexer { fail: true }, &mut cache, &ME)
            .await
            .unwrap();
        assert_eq!(listings.by_token_id.len(), 3);
        assert!(cache.is_empty());
    }
}
