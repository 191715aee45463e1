//! Transaction pipelines.
//!
//! Every intent runs the same steps: lay out the outputs (and any fixed
//! inputs), select XEC fuel for the draft, build, sign, broadcast, then drop
//! the spent UTXOs from the wallet. The wallet is borrowed mutably for the
//! whole pipeline so two sends from one wallet cannot interleave.

use std::sync::Arc;

use cashtab_rpc::Broadcaster;
use cashtab_tx::slp::{self, GENESIS_BATON_VOUT};
use cashtab_tx::{
    FeeRate, GenesisInfo, OpReturnPayload, OutPoint, Script, SignedTransaction, SlpTokenType,
    TransactionBuilder, TxError, TxOutput, Txid,
};
use cashtab_types::constants::TOKEN_DUST_SATS;
use cashtab_types::{parse_token_atoms, undecimalize_token_amount, CashAddress, Network};

use crate::cache::TokenCache;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::offer::AgoraOffer;
use crate::utxo::{select_accept_fuel, select_cancel_fuel, select_fuel, select_token_utxos};
use crate::wallet::{PathInfo, Wallet};

/// An XEC payment destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub sats: u64,
}

impl Recipient {
    pub fn new(address: impl Into<String>, sats: u64) -> Self {
        Self { address: address.into(), sats }
    }
}

/// What a transaction should do. Token amounts are decimalized strings.
#[derive(Debug, Clone)]
pub enum TransactionIntent {
    /// Pay one or more addresses, optionally with an OP_RETURN.
    SendXec {
        recipients: Vec<Recipient>,
        op_return: Option<OpReturnPayload>,
    },
    /// Mint a new fungible token to the wallet.
    CreateToken {
        info: GenesisInfo,
        initial_qty: String,
        mint_baton: bool,
    },
    SendToken {
        token_id: String,
        amount: String,
        receiver: String,
    },
    BurnToken {
        token_id: String,
        amount: String,
    },
    /// Buy `accepted_atoms` of a listed offer.
    AcceptOffer {
        offer: Arc<dyn AgoraOffer>,
        accepted_atoms: u64,
    },
    /// Take back the wallet's own listing.
    CancelOffer { offer: Arc<dyn AgoraOffer> },
}

/// A signed transaction and the wallet UTXOs it spends.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub signed: SignedTransaction,
    pub spent: Vec<OutPoint>,
    /// Change returned to the wallet, if any.
    pub change: Option<u64>,
}

/// A broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub txid: Txid,
    pub hex: String,
    pub fee: u64,
}

/// Output script for an address on `network`.
pub fn address_script(address: &str, network: Network) -> Result<Script, WalletError> {
    let addr = CashAddress::decode_for_network(address, network)?;
    Ok(Script::new(addr.output_script()))
}

fn token_atoms(amount: &str, decimals: u32) -> Result<u64, WalletError> {
    let atoms = parse_token_atoms(&undecimalize_token_amount(amount, decimals)?)?;
    if atoms == 0 {
        return Err(TxError::InvalidInput("token amount must be greater than zero".into()).into());
    }
    Ok(atoms)
}

/// The path whose key listed `offer`.
fn seller_path<'a>(wallet: &'a Wallet, offer: &dyn AgoraOffer) -> Result<&'a PathInfo, WalletError> {
    wallet
        .paths()
        .map(|(_, info)| info)
        .find(|info| &info.pk == offer.seller_pk())
        .ok_or_else(|| WalletError::NotOfferSeller(offer.token_id().to_string()))
}

/// Select, build and sign a transaction for `intent`. Nothing is broadcast
/// and the wallet is not modified.
pub fn build_transaction(
    wallet: &Wallet,
    config: &WalletConfig,
    cache: &TokenCache,
    intent: &TransactionIntent,
    fee_rate: FeeRate,
) -> Result<BuiltTransaction, WalletError> {
    if wallet.state.xec_utxos.is_empty() {
        return Err(WalletError::NoXecUtxos);
    }

    let me = wallet.path(config.derivation_path)?;
    let my_script = me.output_script();
    let mut signer = wallet.key_signer()?;
    let mut spent = Vec::new();
    let mut draft = TransactionBuilder::new()
        .set_fee_rate(fee_rate)
        .set_dust(config.dust_sats)
        .set_change_script(my_script.clone());

    let xec_utxos = &wallet.state.xec_utxos;
    let fuel = match intent {
        TransactionIntent::SendXec { recipients, op_return } => {
            if recipients.is_empty() && op_return.is_none() {
                return Err(TxError::NoDestinations.into());
            }
            if let Some(payload) = op_return {
                draft = draft.set_op_return(payload.to_script()?);
            }
            for recipient in recipients {
                let script = address_script(&recipient.address, config.network)?;
                draft = draft.add_output(TxOutput::new(recipient.sats, script));
            }
            draft.checked_output_total()?;
            select_fuel(xec_utxos, &draft)?
        }

        TransactionIntent::CreateToken { info, initial_qty, mint_baton } => {
            let atoms = parse_token_atoms(&undecimalize_token_amount(initial_qty, info.decimals)?)?;
            let baton_vout = mint_baton.then_some(GENESIS_BATON_VOUT);
            let script = slp::genesis_script(SlpTokenType::Fungible, info, baton_vout, atoms)?;
            draft = draft
                .set_op_return(script)
                .add_output(TxOutput::new(TOKEN_DUST_SATS, my_script.clone()));
            if *mint_baton {
                draft = draft.add_output(TxOutput::new(TOKEN_DUST_SATS, my_script.clone()));
            }
            select_fuel(xec_utxos, &draft)?
        }

        TransactionIntent::SendToken { token_id, amount, receiver } => {
            let info = cache.require(token_id)?;
            let token_type = info.slp_type()?;
            let atoms = token_atoms(amount, info.decimals)?;
            let tokens = select_token_utxos(&wallet.state.token_utxos, token_id, atoms)?;
            let token_change = tokens.change_amounts(atoms);

            let mut amounts = vec![atoms];
            amounts.extend_from_slice(&token_change);
            draft = draft
                .set_op_return(slp::send_script(token_type, token_id, &amounts)?)
                .add_inputs(tokens.spend_inputs())
                .add_output(TxOutput::new(TOKEN_DUST_SATS, address_script(receiver, config.network)?))
                .add_outputs(token_change.iter().map(|_| TxOutput::new(TOKEN_DUST_SATS, my_script.clone())));
            spent.extend(tokens.outpoints());
            select_fuel(xec_utxos, &draft)?
        }

        TransactionIntent::BurnToken { token_id, amount } => {
            let info = cache.require(token_id)?;
            let token_type = info.slp_type()?;
            let atoms = token_atoms(amount, info.decimals)?;
            let tokens = select_token_utxos(&wallet.state.token_utxos, token_id, atoms)?;
            let remaining = tokens.change_amounts(atoms);

            draft = draft.add_inputs(tokens.spend_inputs());
            draft = if remaining.is_empty() {
                draft.set_op_return(slp::burn_script(token_type, token_id, atoms)?)
            } else {
                // Inputs minus the SEND total is burned.
                draft
                    .set_op_return(slp::send_script(token_type, token_id, &remaining)?)
                    .add_outputs(remaining.iter().map(|_| TxOutput::new(TOKEN_DUST_SATS, my_script.clone())))
            };
            spent.extend(tokens.outpoints());
            select_fuel(xec_utxos, &draft)?
        }

        TransactionIntent::AcceptOffer { offer, accepted_atoms } => {
            if *accepted_atoms == 0 || *accepted_atoms > offer.offered_atoms() {
                return Err(TxError::InvalidInput(format!(
                    "cannot accept {} of {} offered atoms",
                    accepted_atoms,
                    offer.offered_atoms()
                ))
                .into());
            }
            let offer_input = offer.offer_input();
            signer.add_signatory(offer_input.prev_out, offer.accept_signatory(&me.sk)?);
            draft = draft
                .add_input(offer_input)
                .add_outputs(offer.enforced_outputs(*accepted_atoms))
                .add_output(TxOutput::new(TOKEN_DUST_SATS, my_script.clone()));
            select_accept_fuel(xec_utxos, offer.as_ref(), *accepted_atoms, fee_rate, &my_script)?
        }

        TransactionIntent::CancelOffer { offer } => {
            let seller = seller_path(wallet, offer.as_ref())?;
            let seller_script = seller.output_script();
            let offer_input = offer.offer_input();
            signer.add_signatory(offer_input.prev_out, offer.cancel_signatory(&seller.sk)?);
            let returned = slp::send_script(offer.token_type(), offer.token_id(), &[offer.offered_atoms()])?;
            draft = draft
                .set_op_return(returned)
                .add_input(offer_input)
                .add_output(TxOutput::new(TOKEN_DUST_SATS, seller_script.clone()));
            select_cancel_fuel(xec_utxos, offer.as_ref(), fee_rate, &seller_script)?
        }
    };

    spent.extend(fuel.outpoints());
    let unsigned = draft.add_inputs(fuel.spend_inputs()).build()?;
    let signed = unsigned.sign(&signer)?;
    log::debug!(
        "built {} ({} inputs, {} outputs, fee {})",
        signed.txid(),
        signed.tx.inputs.len(),
        signed.tx.outputs.len(),
        signed.fee
    );
    Ok(BuiltTransaction { signed, spent, change: unsigned.change })
}

/// Build, sign and broadcast `intent` from `wallet`. Spent UTXOs are removed
/// from the wallet only once the broadcast is accepted.
pub async fn send_transaction(
    wallet: &mut Wallet,
    config: &WalletConfig,
    cache: &TokenCache,
    intent: &TransactionIntent,
    broadcaster: &dyn Broadcaster,
) -> Result<TxResult, WalletError> {
    let fee_rate = config.fee_rate_for(wallet);
    let built = build_transaction(wallet, config, cache, intent, fee_rate)?;
    let hex = built.signed.hex();

    let txid = broadcaster.broadcast(&hex).await.map_err(|e| {
        log::warn!("broadcast failed: {}", e);
        e
    })?;
    if txid != built.signed.txid() {
        log::warn!("broadcaster returned txid {}, expected {}", txid, built.signed.txid());
    }

    let removed = wallet.remove_spent(&built.spent);
    log::info!("sent {} (fee {} sats, {} utxos spent)", txid, built.signed.fee, removed);
    Ok(TxResult { txid, hex, fee: built.signed.fee })
}
