//! UTXO model and accumulative input selection.
//!
//! Selection walks the candidate list in order and stops at the first prefix
//! whose value covers a requirement. The requirement is recomputed after
//! every addition because each new input makes the transaction larger.

use cashtab_tx::{FeeRate, InputType, OutPoint, Script, SpendInput, TransactionBuilder};
use cashtab_types::parse_token_atoms;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::offer::{AcceptFeeParams, AgoraOffer, CancelFeeParams};

/// Token colouring of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub token_id: String,
    #[serde(with = "atoms_string")]
    pub atoms: u64,
    #[serde(default)]
    pub is_mint_baton: bool,
}

/// An unspent output owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: u64,
    pub output_script: Script,
    /// None while unconfirmed.
    #[serde(default)]
    pub block_height: Option<i32>,
    #[serde(default)]
    pub token: Option<TokenEntry>,
}

impl Utxo {
    pub fn spend_input(&self) -> SpendInput {
        SpendInput::p2pkh(self.outpoint, self.value, self.output_script.clone())
    }

    pub fn is_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }
}

/// Token atoms travel as decimal strings so they survive JSON number limits.
mod atoms_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(atoms: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&atoms.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_token_atoms(&s).map_err(D::Error::custom)
    }
}

/// Result of selecting XEC inputs.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Selected UTXOs in list order.
    pub selected: Vec<Utxo>,
    /// Total value of selected UTXOs.
    pub total: u64,
    /// Requirement at the last addition.
    pub required: u64,
}

impl SelectionResult {
    pub fn spend_inputs(&self) -> Vec<SpendInput> {
        self.selected.iter().map(Utxo::spend_input).collect()
    }

    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(|u| u.outpoint).collect()
    }
}

/// Add candidates one at a time until their value covers `requirement`,
/// which is asked again after each addition with the count selected so far.
///
/// Token UTXOs are never used here.
pub fn accumulate<F>(utxos: &[Utxo], mut requirement: F) -> Result<SelectionResult, WalletError>
where
    F: FnMut(usize) -> u64,
{
    let mut selected = Vec::new();
    let mut total = 0u64;
    let mut required = requirement(0);

    for utxo in utxos.iter().filter(|u| !u.is_token()) {
        selected.push(utxo.clone());
        total = total.saturating_add(utxo.value);
        required = requirement(selected.len());
        if total >= required {
            log::debug!("selected {} utxos ({} sats) for {} sats", selected.len(), total, required);
            return Ok(SelectionResult { selected, total, required });
        }
    }

    Err(WalletError::InsufficientFunds { need: required, have: total })
}

fn p2pkh_inputs(n: usize) -> Vec<InputType> {
    vec![InputType::P2pkh; n]
}

/// Select fuel for a draft whose outputs (and any fixed inputs) are already set.
///
/// The requirement is everything the draft still needs beyond its fixed
/// inputs, including the fee of the fuel inputs and a change output.
pub fn select_fuel(utxos: &[Utxo], draft: &TransactionBuilder) -> Result<SelectionResult, WalletError> {
    let fixed = draft.input_total();
    accumulate(utxos, |n| {
        draft
            .required_sats_with_extra_inputs(&p2pkh_inputs(n))
            .saturating_sub(fixed)
    })
}

/// Token UTXOs selected to cover a token amount.
#[derive(Debug, Clone)]
pub struct TokenSelection {
    pub selected: Vec<Utxo>,
    /// Atoms across the selected UTXOs. Wider than an SLP quantity, since
    /// several UTXOs together can hold more than `u64::MAX`.
    pub total_atoms: u128,
}

impl TokenSelection {
    /// Atoms left after sending `atoms`, split into amounts that each fit an
    /// 8-byte SLP quantity. Empty when nothing is left.
    pub fn change_amounts(&self, atoms: u64) -> Vec<u64> {
        let mut left = self.total_atoms.saturating_sub(u128::from(atoms));
        let mut amounts = Vec::new();
        while left > 0 {
            let chunk = u64::try_from(left).unwrap_or(u64::MAX);
            amounts.push(chunk);
            left -= u128::from(chunk);
        }
        amounts
    }

    pub fn spend_inputs(&self) -> Vec<SpendInput> {
        self.selected.iter().map(Utxo::spend_input).collect()
    }

    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(|u| u.outpoint).collect()
    }
}

/// Accumulate UTXOs of `token_id` until they hold at least `atoms`. Mint
/// batons are never spent.
pub fn select_token_utxos(utxos: &[Utxo], token_id: &str, atoms: u64) -> Result<TokenSelection, WalletError> {
    let mut selected = Vec::new();
    let mut total_atoms = 0u128;

    let candidates = utxos.iter().filter(|u| {
        u.token
            .as_ref()
            .is_some_and(|t| t.token_id == token_id && !t.is_mint_baton)
    });
    for utxo in candidates {
        if let Some(token) = &utxo.token {
            total_atoms += u128::from(token.atoms);
        }
        selected.push(utxo.clone());
        if total_atoms >= u128::from(atoms) {
            return Ok(TokenSelection { selected, total_atoms });
        }
    }

    Err(WalletError::InsufficientTokenFunds {
        token_id: token_id.to_string(),
        need: atoms,
        // Below `atoms` here, so it fits.
        have: u64::try_from(total_atoms).unwrap_or(u64::MAX),
    })
}

/// Fuel for accepting `accepted_atoms` of an offer: the asking price plus the
/// accept fee of a transaction with one extra input per selected UTXO.
pub fn select_accept_fuel(
    utxos: &[Utxo],
    offer: &dyn AgoraOffer,
    accepted_atoms: u64,
    fee_rate: FeeRate,
    recipient_script: &Script,
) -> Result<SelectionResult, WalletError> {
    let asked = offer.asked_sats(accepted_atoms);
    accumulate(utxos, |n| {
        let params = AcceptFeeParams {
            recipient_script: recipient_script.clone(),
            extra_inputs: p2pkh_inputs(n),
            accepted_atoms,
            fee_rate,
        };
        asked.saturating_add(offer.accept_fee_sats(&params))
    })
    .map_err(|e| {
        log::warn!("insufficient utxos to accept offer for {}", offer.token_id());
        e
    })
}

/// Fuel for cancelling an offer: only the cancel fee has to be covered.
pub fn select_cancel_fuel(
    utxos: &[Utxo],
    offer: &dyn AgoraOffer,
    fee_rate: FeeRate,
    recipient_script: &Script,
) -> Result<SelectionResult, WalletError> {
    accumulate(utxos, |n| {
        let params = CancelFeeParams {
            recipient_script: recipient_script.clone(),
            extra_inputs: p2pkh_inputs(n),
            fee_rate,
        };
        offer.cancel_fee_sats(&params)
    })
    .map_err(|e| {
        log::warn!("insufficient utxos to cancel offer for {}", offer.token_id());
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashtab_tx::{TxOutput, Txid};

    const HASH: [u8; 20] = [0x11; 20];

    fn make_utxo(n: u8, value: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(Txid([n; 32]), 0),
            value,
            output_script: Script::p2pkh(&HASH),
            block_height: Some(800_000),
            token: None,
        }
    }

    fn make_token_utxo(n: u8, token_id: &str, atoms: u64, baton: bool) -> Utxo {
        Utxo {
            token: Some(TokenEntry { token_id: token_id.to_string(), atoms, is_mint_baton: baton }),
            ..make_utxo(n, 546)
        }
    }

    fn make_candidates(values: &[u64]) -> Vec<Utxo> {
        values.iter().enumerate().map(|(i, &v)| make_utxo(i as u8, v)).collect()
    }

    #[test]
    fn test_accumulate_fixed_requirement() {
        let utxos = make_candidates(&[5000, 3000, 2000]);
        let result = accumulate(&utxos, |_| 6000).unwrap();
        assert_eq!(result.selected.len(), 2);
        assert_eq!(result.total, 8000);
        assert_eq!(result.required, 6000);
    }

    #[test]
    fn test_accumulate_keeps_list_order() {
        let utxos = make_candidates(&[100, 200, 50_000]);
        let result = accumulate(&utxos, |_| 10_000).unwrap();
        assert_eq!(result.selected.len(), 3);
        assert_eq!(result.selected[0].value, 100);
    }

    #[test]
    fn test_accumulate_requirement_grows_with_inputs() {
        let utxos = make_candidates(&[1000, 1000, 1000]);
        // 1 input needs 1600 and 2 inputs need 2200; only the third addition covers it.
        let result = accumulate(&utxos, |n| 1000 + 600 * n as u64).unwrap();
        assert_eq!(result.selected.len(), 3);
        assert_eq!(result.required, 2800);
        assert!(result.total >= result.required);

        let err = accumulate(&utxos, |n| 1000 + 800 * n as u64).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { need: 3400, have: 3000 }));
    }

    #[test]
    fn test_accumulate_insufficient() {
        let utxos = make_candidates(&[1]);
        let err = accumulate(&utxos, |_| 10_000).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { need: 10_000, have: 1 }));
    }

    #[test]
    fn test_accumulate_empty() {
        let err = accumulate(&[], |_| 1).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { need: 1, have: 0 }));
    }

    #[test]
    fn test_accumulate_skips_token_utxos() {
        let mut utxos = vec![make_token_utxo(9, "aa", 10, false)];
        utxos.extend(make_candidates(&[600]));
        let result = accumulate(&utxos, |_| 546).unwrap();
        assert_eq!(result.selected.len(), 1);
        assert!(!result.selected[0].is_token());
    }

    #[test]
    fn test_select_fuel_for_payment() {
        let utxos = make_candidates(&[5000, 3000, 2000]);
        let draft = TransactionBuilder::new()
            .add_output(TxOutput::new(6000, Script::p2pkh(&[0x22; 20])))
            .set_change_script(Script::p2pkh(&HASH));
        let result = select_fuel(&utxos, &draft).unwrap();
        assert_eq!(result.selected.len(), 2);
        // 2 inputs, 2 outputs: 10 + 296 + 68 = 374 bytes -> 752 sats at 2010/kB
        assert_eq!(result.required, 6752);
    }

    #[test]
    fn test_select_fuel_insufficient() {
        let utxos = make_candidates(&[1]);
        let draft = TransactionBuilder::new().add_output(TxOutput::new(10_000, Script::p2pkh(&[0x22; 20])));
        let err = select_fuel(&utxos, &draft).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { have: 1, .. }));
    }

    #[test]
    fn test_select_fuel_discounts_fixed_inputs() {
        let token = make_token_utxo(7, "aa", 5, false);
        let draft = TransactionBuilder::new()
            .add_input(token.spend_input())
            .add_output(TxOutput::new(546, Script::p2pkh(&[0x22; 20])))
            .set_change_script(Script::p2pkh(&HASH));
        let utxos = make_candidates(&[2000]);
        let result = select_fuel(&utxos, &draft).unwrap();
        // 2 inputs, 2 outputs -> fee 752; token input already brings 546
        assert_eq!(result.required, 752);
    }

    #[test]
    fn test_select_token_utxos() {
        let utxos = vec![
            make_token_utxo(1, "aa", 100, true),
            make_token_utxo(2, "bb", 500, false),
            make_token_utxo(3, "aa", 30, false),
            make_token_utxo(4, "aa", 80, false),
            make_token_utxo(5, "aa", 1000, false),
        ];
        let result = select_token_utxos(&utxos, "aa", 100).unwrap();
        assert_eq!(result.selected.len(), 2);
        assert_eq!(result.total_atoms, 110);
        assert_eq!(result.outpoints()[0], utxos[2].outpoint);
    }

    #[test]
    fn test_select_token_utxos_past_u64() {
        let utxos = vec![make_token_utxo(1, "aa", 10, false), make_token_utxo(2, "aa", u64::MAX, false)];
        let result = select_token_utxos(&utxos, "aa", u64::MAX).unwrap();
        assert_eq!(result.selected.len(), 2);
        assert_eq!(result.total_atoms, u128::from(u64::MAX) + 10);
        assert_eq!(result.change_amounts(u64::MAX), vec![10]);
    }

    #[test]
    fn test_change_amounts_split_into_slp_quantities() {
        let selection = TokenSelection { selected: Vec::new(), total_atoms: 2 * u128::from(u64::MAX) + 5 };
        assert_eq!(selection.change_amounts(4), vec![u64::MAX, u64::MAX, 1]);

        let exact = TokenSelection { selected: Vec::new(), total_atoms: 110 };
        assert_eq!(exact.change_amounts(110), Vec::<u64>::new());
        assert_eq!(exact.change_amounts(100), vec![10]);
    }

    #[test]
    fn test_select_token_utxos_excludes_batons() {
        let utxos = vec![make_token_utxo(1, "aa", 100, true), make_token_utxo(2, "aa", 5, false)];
        let err = select_token_utxos(&utxos, "aa", 10).unwrap_err();
        match err {
            WalletError::InsufficientTokenFunds { token_id, need, have } => {
                assert_eq!(token_id, "aa");
                assert_eq!(need, 10);
                assert_eq!(have, 5);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_utxo_json() {
        let json = r#"{
            "outpoint": {"txid": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b", "outIdx": 1},
            "value": 546,
            "outputScript": "76a914111111111111111111111111111111111111111188ac",
            "token": {"tokenId": "aa", "atoms": "18446744073709551615"}
        }"#;
        let utxo: Utxo = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.outpoint.vout, 1);
        assert!(!utxo.is_confirmed());
        let token = utxo.token.as_ref().unwrap();
        assert_eq!(token.atoms, u64::MAX);
        assert!(!token.is_mint_baton);

        let back = serde_json::to_value(&utxo).unwrap();
        assert_eq!(back["token"]["atoms"], "18446744073709551615");
    }
}
