//! Merging independently signed copies of one transaction.
//!
//! Each party signs its own copy and ships the raw bytes. Combining decodes
//! every copy, checks that all fields other than the signatures agree and
//! appends the signature lists in input order, skipping signatures already
//! present, so combining a transaction with itself changes nothing. A copy
//! that has no fee payer or no signatures (and therefore no chain id) is
//! compatible with one that does.

use tracing::debug;

use klay_core::transaction::Transaction;
use klay_core::types::SignatureData;

use crate::error::WalletError;

/// Merge raw transactions (hex) into `tx` and return the combined raw transaction.
pub fn combine_signed_raw<I, S>(tx: &mut Transaction, raws: I) -> Result<String, WalletError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for raw in raws {
        let other = Transaction::decode_hex(raw.as_ref())?;
        merge(tx, other)?;
    }
    Ok(tx.raw_transaction()?)
}

/// Decode and merge raw transactions (hex). The first one is the base.
pub fn combine_raw_transactions<I, S>(raws: I) -> Result<Transaction, WalletError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut raws = raws.into_iter();
    let first = raws.next().ok_or(WalletError::NothingToCombine)?;
    let mut tx = Transaction::decode_hex(first.as_ref())?;
    combine_signed_raw(&mut tx, raws)?;
    Ok(tx)
}

/// Merge the signatures of `other` into `tx`. Fails without touching `tx`
/// when any non-signature field differs.
pub fn merge(tx: &mut Transaction, other: Transaction) -> Result<(), WalletError> {
    if let Some(field) = first_difference(tx, &other) {
        return Err(WalletError::IncompatibleTransactions { field });
    }
    let legacy = tx.tx_type().is_legacy();
    if legacy && !tx.signatures.is_empty() && !other.signatures.is_empty() && tx.signatures != other.signatures {
        return Err(WalletError::IncompatibleTransactions { field: "signatures" });
    }

    if tx.chain_id.is_none() {
        tx.chain_id = other.chain_id;
    }
    debug!(
        tx_type = %tx.tx_type(),
        signatures = other.signatures.len(),
        fee_payer_signatures = other.fee_payer_signatures().len(),
        "merging signatures"
    );

    if legacy {
        if tx.signatures.is_empty() {
            tx.signatures = other.signatures;
        }
        return Ok(());
    }
    append_new(&mut tx.signatures, other.signatures);
    if let (Some(ours), Some(theirs)) = (tx.fee_delegation.as_mut(), other.fee_delegation) {
        if ours.fee_payer.is_none() {
            ours.fee_payer = theirs.fee_payer;
        }
        append_new(&mut ours.fee_payer_signatures, theirs.fee_payer_signatures);
    }
    Ok(())
}

fn append_new(ours: &mut Vec<SignatureData>, theirs: Vec<SignatureData>) {
    for sig in theirs {
        if !ours.contains(&sig) {
            ours.push(sig);
        }
    }
}

fn first_difference(a: &Transaction, b: &Transaction) -> Option<&'static str> {
    let (ra, rb) = (a.to_request(), b.to_request());
    let legacy = a.tx_type().is_legacy();

    [
        ("type", ra.tx_type != rb.tx_type),
        // Legacy senders are recovered, not encoded.
        ("from", !legacy && ra.from != rb.from),
        ("nonce", ra.nonce != rb.nonce),
        ("gasPrice", ra.gas_price != rb.gas_price),
        ("gas", ra.gas != rb.gas),
        ("to", ra.to != rb.to),
        ("value", ra.value != rb.value),
        ("input", ra.input != rb.input),
        ("key", ra.key != rb.key),
        ("humanReadable", ra.human_readable != rb.human_readable),
        ("codeFormat", ra.code_format != rb.code_format),
        ("feeRatio", ra.fee_ratio != rb.fee_ratio),
        ("feePayer", !compatible(a.fee_payer(), b.fee_payer())),
        ("chainId", !compatible(a.chain_id, b.chain_id)),
    ]
    .into_iter()
    .find_map(|(field, differs)| differs.then_some(field))
}

fn compatible<T: PartialEq>(x: Option<T>, y: Option<T>) -> bool {
    x.is_none() || y.is_none() || x == y
}
