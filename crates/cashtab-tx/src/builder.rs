//! Transaction builder.
//!
//! Assembles inputs, an optional OP_RETURN, and outputs into a draft, derives
//! the fee from the draft's estimated size, and decides whether the leftover
//! is large enough to be returned as change. Produces an unsigned transaction
//! that a [`Signer`] turns into broadcastable bytes.

use cashtab_types::constants::{DUST_SATS, MAX_MONEY_SATS, MAX_OP_RETURN_BYTES};

use crate::fee::{estimate_tx_size, FeeRate, InputType};
use crate::script::Script;
use crate::sign::Signer;
use crate::types::*;
use crate::TxError;

/// Built (unsigned) transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// Transaction with empty scriptSigs.
    pub tx: Transaction,
    /// Inputs in transaction order, with what each signer needs.
    pub inputs: Vec<SpendInput>,
    /// Fee actually paid (inputs minus outputs).
    pub fee: u64,
    /// Change value, when a change output was added. It is always the last output.
    pub change: Option<u64>,
    pub fee_rate: FeeRate,
}

impl UnsignedTransaction {
    /// Sign every input and check the fee still covers the final size.
    pub fn sign(&self, signer: &dyn Signer) -> Result<SignedTransaction, TxError> {
        let tx = signer.sign_tx(&self.tx, &self.inputs)?;
        if tx.inputs.iter().any(|i| i.script_sig.is_empty()) {
            return Err(TxError::Signing("signer left an input unsigned".into()));
        }
        let size = tx.size();
        let required = self.fee_rate.fee(size);
        if self.fee < required {
            return Err(TxError::FeeTooLow { fee: self.fee, required, size });
        }
        log::debug!("signed tx {} ({} bytes, fee {})", tx.txid(), size, self.fee);
        Ok(SignedTransaction { tx, fee: self.fee })
    }
}

/// A fully signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub fee: u64,
}

impl SignedTransaction {
    pub fn hex(&self) -> String {
        self.tx.to_hex()
    }

    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }

    pub fn size(&self) -> usize {
        self.tx.size()
    }
}

/// Builder for constructing eCash transactions.
///
/// Output order is fixed: the OP_RETURN (if any) at index 0, then outputs in
/// the order they were added, then change.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    inputs: Vec<SpendInput>,
    op_return: Option<Script>,
    outputs: Vec<TxOutput>,
    change_script: Option<Script>,
    fee_rate: FeeRate,
    dust: u64,
}

impl TransactionBuilder {
    /// Create a new transaction builder.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            op_return: None,
            outputs: Vec::new(),
            change_script: None,
            fee_rate: FeeRate::default(),
            dust: DUST_SATS,
        }
    }

    /// Set the OP_RETURN script placed at output 0.
    pub fn set_op_return(mut self, script: Script) -> Self {
        self.op_return = Some(script);
        self
    }

    /// Add an input to spend.
    pub fn add_input(mut self, input: SpendInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add multiple inputs.
    pub fn add_inputs(mut self, inputs: impl IntoIterator<Item = SpendInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn add_output(mut self, output: TxOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn add_outputs(mut self, outputs: impl IntoIterator<Item = TxOutput>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    /// Set where change goes. Without it any leftover is paid as fee.
    pub fn set_change_script(mut self, script: Script) -> Self {
        self.change_script = Some(script);
        self
    }

    pub fn set_fee_rate(mut self, rate: FeeRate) -> Self {
        self.fee_rate = rate;
        self
    }

    /// Override the dust limit (defaults to 546 sats).
    pub fn set_dust(mut self, dust: u64) -> Self {
        self.dust = dust;
        self
    }

    pub fn inputs(&self) -> &[SpendInput] {
        &self.inputs
    }

    pub fn input_total(&self) -> u64 {
        self.inputs.iter().fold(0u64, |acc, i| acc.saturating_add(i.value()))
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    /// Sum of the outputs, rejecting any value or total above the money supply.
    pub fn checked_output_total(&self) -> Result<u64, TxError> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.value)
                .filter(|t| output.value <= MAX_MONEY_SATS && *t <= MAX_MONEY_SATS)
                .ok_or_else(|| {
                    TxError::InvalidInput(format!(
                        "outputs exceed the {} sat money supply",
                        MAX_MONEY_SATS
                    ))
                })?;
        }
        Ok(total)
    }

    /// Outputs in final order, without change.
    pub fn ordered_outputs(&self) -> Vec<TxOutput> {
        let mut outputs = Vec::with_capacity(self.outputs.len() + 2);
        if let Some(script) = &self.op_return {
            outputs.push(TxOutput::new(0, script.clone()));
        }
        outputs.extend(self.outputs.iter().cloned());
        outputs
    }

    /// Fee of the draft as it stands plus `extra` inputs, assuming a change output.
    pub fn fee_with_extra_inputs(&self, extra: &[InputType]) -> u64 {
        let mut input_types: Vec<InputType> = self.inputs.iter().map(|i| i.input_type).collect();
        input_types.extend_from_slice(extra);
        let mut outputs = self.ordered_outputs();
        outputs.push(TxOutput::new(0, self.change_output_script()));
        self.fee_rate.fee(estimate_tx_size(&input_types, &outputs))
    }

    /// Sats the inputs must cover once `extra` inputs are added: every output plus
    /// the fee of a transaction that also carries change.
    pub fn required_sats_with_extra_inputs(&self, extra: &[InputType]) -> u64 {
        self.output_total()
            .saturating_add(self.fee_with_extra_inputs(extra))
    }

    /// Build an unsigned transaction.
    ///
    /// Adds a change output only when the leftover after outputs and fee is at
    /// least the dust limit. A smaller leftover is forfeited to the fee.
    pub fn build(self) -> Result<UnsignedTransaction, TxError> {
        if self.outputs.is_empty() && self.op_return.is_none() {
            return Err(TxError::NoDestinations);
        }

        if let Some(script) = &self.op_return {
            if !script.is_op_return() {
                return Err(TxError::InvalidInput("OP_RETURN output must begin with OP_RETURN".into()));
            }
            if script.len() > MAX_OP_RETURN_BYTES {
                return Err(TxError::OpReturnTooLarge { size: script.len(), max: MAX_OP_RETURN_BYTES });
            }
        }

        let offset = usize::from(self.op_return.is_some());
        for (i, output) in self.outputs.iter().enumerate() {
            if !output.script.is_op_return() && output.value < self.dust {
                return Err(TxError::DustOutput { index: i + offset, value: output.value, dust: self.dust });
            }
        }

        let output_total = self.checked_output_total()?;
        let input_total = self.input_total();
        let input_types: Vec<InputType> = self.inputs.iter().map(|i| i.input_type).collect();
        let mut outputs = self.ordered_outputs();

        let fee_without_change = self.fee_rate.fee(estimate_tx_size(&input_types, &outputs));
        let need = output_total.saturating_add(fee_without_change);
        if self.inputs.is_empty() || input_total < need {
            return Err(TxError::InsufficientFunds { need, have: input_total });
        }
        let leftover = input_total - output_total;

        let mut change = None;
        if let Some(change_script) = &self.change_script {
            let fee_with_change = self.fee_with_extra_inputs(&[]);
            if leftover >= fee_with_change.saturating_add(self.dust) {
                let value = leftover - fee_with_change;
                outputs.push(TxOutput::new(value, change_script.clone()));
                change = Some(value);
            }
        }
        let fee = leftover - change.unwrap_or(0);

        if change.is_none() && leftover > fee_without_change {
            log::debug!(
                "leftover of {} sats is below dust once change is paid for; forfeiting to fee",
                leftover - fee_without_change
            );
        }

        let tx = Transaction {
            version: TX_VERSION,
            inputs: self
                .inputs
                .iter()
                .map(|i| TxInput {
                    prev_out: i.prev_out,
                    script_sig: Script::default(),
                    sequence: i.sequence,
                })
                .collect(),
            outputs,
            lock_time: 0,
        };

        Ok(UnsignedTransaction {
            tx,
            inputs: self.inputs,
            fee,
            change,
            fee_rate: self.fee_rate,
        })
    }

    fn change_output_script(&self) -> Script {
        // Size estimates assume a P2PKH change output when none is set.
        self.change_script.clone().unwrap_or_else(|| Script::p2pkh(&[0; 20]))
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::{P2PKH_INPUT_BYTES, P2PKH_OUTPUT_BYTES, TX_OVERHEAD_BYTES};

    fn input(n: u8, value: u64) -> SpendInput {
        SpendInput::p2pkh(OutPoint::new(Txid([n; 32]), 0), value, Script::p2pkh(&[0xaa; 20]))
    }

    fn pay(value: u64) -> TxOutput {
        TxOutput::new(value, Script::p2pkh(&[0xbb; 20]))
    }

    fn change_script() -> Script {
        Script::p2pkh(&[0xcc; 20])
    }

    // 1-in 2-out at 1 sat/byte
    const FEE_1_2: u64 = (TX_OVERHEAD_BYTES + P2PKH_INPUT_BYTES + 2 * P2PKH_OUTPUT_BYTES) as u64;
    // 1-in 1-out at 1 sat/byte
    const FEE_1_1: u64 = (TX_OVERHEAD_BYTES + P2PKH_INPUT_BYTES + P2PKH_OUTPUT_BYTES) as u64;

    #[test]
    fn test_builder_no_destinations() {
        let result = TransactionBuilder::new().add_input(input(1, 10_000)).build();
        assert!(matches!(result, Err(TxError::NoDestinations)));
    }

    #[test]
    fn test_builder_no_inputs() {
        let result = TransactionBuilder::new().add_output(pay(1000)).build();
        assert!(matches!(result, Err(TxError::InsufficientFunds { have: 0, .. })));
    }

    #[test]
    fn test_builder_insufficient_funds() {
        let result = TransactionBuilder::new()
            .add_input(input(1, 1))
            .add_output(pay(10_000))
            .set_change_script(change_script())
            .build();
        match result {
            Err(TxError::InsufficientFunds { need, have }) => {
                assert_eq!(have, 1);
                assert!(need > 10_000);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_dust_output() {
        let result = TransactionBuilder::new()
            .add_input(input(1, 10_000))
            .set_op_return(Script::op_return([b"hi"]))
            .add_output(pay(545))
            .build();
        assert!(matches!(result, Err(TxError::DustOutput { index: 1, value: 545, dust: 546 })));
    }

    #[test]
    fn test_builder_change_output() {
        let unsigned = TransactionBuilder::new()
            .set_fee_rate(FeeRate::minimum())
            .add_input(input(1, 10_000))
            .add_output(pay(5000))
            .set_change_script(change_script())
            .build()
            .unwrap();
        assert_eq!(unsigned.fee, FEE_1_2);
        assert_eq!(unsigned.change, Some(10_000 - 5000 - FEE_1_2));
        assert_eq!(unsigned.tx.outputs.len(), 2);
        assert_eq!(unsigned.tx.outputs[1].script, change_script());
        assert_eq!(unsigned.tx.output_total() + unsigned.fee, 10_000);
    }

    #[test]
    fn test_builder_change_exactly_dust() {
        let total = 5000 + FEE_1_2 + 546;
        let unsigned = TransactionBuilder::new()
            .set_fee_rate(FeeRate::minimum())
            .add_input(input(1, total))
            .add_output(pay(5000))
            .set_change_script(change_script())
            .build()
            .unwrap();
        assert_eq!(unsigned.change, Some(546));
    }

    #[test]
    fn test_builder_leftover_below_dust_is_forfeited() {
        // One sat short of a dust change output: no change, leftover goes to fee.
        let total = 5000 + FEE_1_2 + 545;
        let unsigned = TransactionBuilder::new()
            .set_fee_rate(FeeRate::minimum())
            .add_input(input(1, total))
            .add_output(pay(5000))
            .set_change_script(change_script())
            .build()
            .unwrap();
        assert_eq!(unsigned.change, None);
        assert_eq!(unsigned.tx.outputs.len(), 1);
        assert_eq!(unsigned.fee, total - 5000);
    }

    #[test]
    fn test_builder_leftover_one_sat() {
        let total = 5000 + FEE_1_1 + 1;
        let unsigned = TransactionBuilder::new()
            .set_fee_rate(FeeRate::minimum())
            .add_input(input(1, total))
            .add_output(pay(5000))
            .set_change_script(change_script())
            .build()
            .unwrap();
        assert_eq!(unsigned.change, None);
        assert_eq!(unsigned.fee, FEE_1_1 + 1);
    }

    #[test]
    fn test_builder_op_return_is_first() {
        let op_return = Script::op_return([&b"tab"[..]]);
        let unsigned = TransactionBuilder::new()
            .add_input(input(1, 100_000))
            .add_output(pay(1000))
            .add_output(pay(2000))
            .set_op_return(op_return.clone())
            .set_change_script(change_script())
            .build()
            .unwrap();
        let outs = &unsigned.tx.outputs;
        assert_eq!(outs[0].value, 0);
        assert_eq!(outs[0].script, op_return);
        assert_eq!(outs[1].value, 1000);
        assert_eq!(outs[2].value, 2000);
        assert_eq!(outs[3].script, change_script());
    }

    #[test]
    fn test_builder_op_return_too_large() {
        let result = TransactionBuilder::new()
            .add_input(input(1, 100_000))
            .set_op_return(Script::new([vec![0x6a], vec![0; 223]].concat()))
            .build();
        assert!(matches!(result, Err(TxError::OpReturnTooLarge { size: 224, max: 223 })));
    }

    #[test]
    fn test_required_sats_grows_per_input() {
        let builder = TransactionBuilder::new()
            .set_fee_rate(FeeRate::minimum())
            .add_output(pay(6000));
        let one = builder.required_sats_with_extra_inputs(&[InputType::P2pkh]);
        let two = builder.required_sats_with_extra_inputs(&[InputType::P2pkh; 2]);
        assert_eq!(one, 6000 + FEE_1_2);
        assert_eq!(two - one, P2PKH_INPUT_BYTES as u64);
    }

    #[test]
    fn test_required_sats_is_sufficient_to_build() {
        let builder = TransactionBuilder::new()
            .add_output(pay(6000))
            .set_change_script(change_script());
        let need = builder.required_sats_with_extra_inputs(&[InputType::P2pkh]);
        let unsigned = builder.add_input(input(1, need)).build().unwrap();
        assert_eq!(unsigned.tx.output_total() + unsigned.fee, need);
    }

    #[test]
    fn test_builder_rejects_outputs_beyond_money_supply() {
        let overflowing = TransactionBuilder::new()
            .add_input(input(1, 10_000))
            .add_output(pay(u64::MAX))
            .add_output(pay(1000));
        assert_eq!(overflowing.output_total(), u64::MAX);
        assert!(matches!(overflowing.checked_output_total(), Err(TxError::InvalidInput(_))));
        assert!(matches!(overflowing.build(), Err(TxError::InvalidInput(_))));

        let too_much = TransactionBuilder::new()
            .add_output(pay(MAX_MONEY_SATS))
            .add_output(pay(1000));
        assert!(too_much.checked_output_total().is_err());

        let all = TransactionBuilder::new().add_output(pay(MAX_MONEY_SATS));
        assert_eq!(all.checked_output_total().unwrap(), MAX_MONEY_SATS);
    }

    #[test]
    fn test_builder_default() {
        let b = TransactionBuilder::default();
        assert_eq!(b.fee_rate, FeeRate::default());
        assert_eq!(b.dust, DUST_SATS);
    }
}
