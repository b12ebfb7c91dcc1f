//! Reference wire vectors.
//!
//! Every raw transaction and hash below was produced independently of this
//! code base; any byte of difference means the network would reject or
//! mis-hash the transaction.

use klay_core::crypto::keccak256;
use klay_core::types::{from_hex, to_hex};
use klay_core::{Transaction, TxPayload, U256};
use klay_tests::helpers::*;
use klay_wallet::{combine_raw_transactions, Keyring, TransactionSigner};

const FD_SENDER_ONLY: &str = "0x09f8808204d219830f4240947b65b75d204abed71587c9e519a89277766ee1d00a9490b3e9a3770481345a7f17f22f16d020bccfd33ef845f84325a070190e5f422f042a06c849ab4f3d60ad6af484bd66e19a2b8f40874599575454a00c035d2020cda0628de16cda351cd42579e4d07b64f80a12bf124e65af034b6880c4c3018080";
const FD_SENDER_WITH_PAYER: &str = "0x09f8948204d219830f4240947b65b75d204abed71587c9e519a89277766ee1d00a9490b3e9a3770481345a7f17f22f16d020bccfd33ef845f84325a070190e5f422f042a06c849ab4f3d60ad6af484bd66e19a2b8f40874599575454a00c035d2020cda0628de16cda351cd42579e4d07b64f80a12bf124e65af034b689433f524631e573329a550296f595c820d6c65213fc4c3018080";
const FD_PAYER_ONLY: &str = "0x09f8948204d219830f4240947b65b75d204abed71587c9e519a89277766ee1d00a9490b3e9a3770481345a7f17f22f16d020bccfd33ec4c30180809433f524631e573329a550296f595c820d6c65213ff845f84326a0048cc28286054b3c76b809ccf82c5f6e0ff126b0bc3f109942c3c296d5df6ce3a001ee7811f8e6b92bd5071f4e177d81e4fb35cc59e786949bdb9416c926c5deef";
const FD_FULL: &str = "0x09f8d68204d219830f4240947b65b75d204abed71587c9e519a89277766ee1d00a9490b3e9a3770481345a7f17f22f16d020bccfd33ef845f84325a070190e5f422f042a06c849ab4f3d60ad6af484bd66e19a2b8f40874599575454a00c035d2020cda0628de16cda351cd42579e4d07b64f80a12bf124e65af034b689433f524631e573329a550296f595c820d6c65213ff845f84326a0048cc28286054b3c76b809ccf82c5f6e0ff126b0bc3f109942c3c296d5df6ce3a001ee7811f8e6b92bd5071f4e177d81e4fb35cc59e786949bdb9416c926c5deef";
const FD_SENDER_HASH: &str = "0xdae3db452d712d1e85abdb2201fce0406950e41a6fa1f99855fd8c98ff073d98";
const FD_PAYER_HASH: &str = "0x66e16a1e7c9ce4329eed7ddf202f800b3a2efa21919760621c728363556faee8";

const FDR_EXECUTION_FULL: &str = "0x32f8da0719832dc6c0947b65b75d204abed71587c9e519a89277766ee1d0809490b3e9a3770481345a7f17f22f16d020bccfd33e84a9059cbb1ef845f84325a03d7ce15e47543ae3f5d5ee200bf68305744f02806b48c8c01ef9e35a3638ebcca041088d2b847b06e8fbe84d8914504a6292d38d6c3e5e577a85cc4f9397fae4609433f524631e573329a550296f595c820d6c65213ff845f84325a06bdb12554fbc7f9646ab3ca2e6725cb7dedaa2e609e1a711444f57f0f4e2f804a0311832a5544068416d1927659e831d0b020ac4ecd34d69873c8725fc4dc73a8e";

fn fd_value_transfer() -> Transaction {
    Transaction::new(
        TxPayload::ValueTransfer {
            to: to(),
            value: U256::from(0xau64),
        },
        0xf4240,
    )
    .with_from(sender_key().address())
    .with_nonce(1234)
    .with_gas_price(U256::from(0x19u64))
    .with_chain_id(1)
    .fee_delegated()
}

fn fdr_execution() -> Transaction {
    Transaction::new(
        TxPayload::SmartContractExecution {
            to: to(),
            value: U256::ZERO,
            input: vec![0xa9, 0x05, 0x9c, 0xbb],
        },
        0x2dc6c0,
    )
    .with_from(sender_key().address())
    .with_nonce(7)
    .with_gas_price(U256::from(0x19u64))
    .with_chain_id(1)
    .fee_delegated_with_ratio(30)
}

#[test]
fn key_derivation() {
    let key = sender_key();
    assert_eq!(key.address().to_checksum(), SENDER_ADDRESS);
    assert_eq!(key.public_key().to_string(), SENDER_PUBLIC_KEY);
    assert_eq!(fee_payer_key().address().to_checksum(), FEE_PAYER_ADDRESS);
}

#[test]
fn fee_delegated_signing_hashes() {
    let tx = fd_value_transfer().with_fee_payer(fee_payer_key().address());
    assert_eq!(to_hex(&tx.sender_signing_hash().unwrap()), FD_SENDER_HASH);
    assert_eq!(to_hex(&tx.fee_payer_signing_hash().unwrap()), FD_PAYER_HASH);
}

#[test]
fn fee_delegated_sender_only() {
    let mut tx = fd_value_transfer();
    let hash = tx.sender_signing_hash().unwrap();
    tx.signatures.push(sender_key().sign(&hash, 1).unwrap());
    assert_eq!(tx.raw_transaction().unwrap(), FD_SENDER_ONLY);

    let tx = tx.with_fee_payer(fee_payer_key().address());
    assert_eq!(tx.raw_transaction().unwrap(), FD_SENDER_WITH_PAYER);
}

#[test]
fn fee_delegated_payer_only_and_full() {
    let mut tx = fd_value_transfer().with_fee_payer(fee_payer_key().address());
    let payer_hash = tx.fee_payer_signing_hash().unwrap();
    let payer_sig = fee_payer_key().sign(&payer_hash, 1).unwrap();
    if let Some(fd) = tx.fee_delegation.as_mut() {
        fd.fee_payer_signatures.push(payer_sig);
    }
    assert_eq!(tx.raw_transaction().unwrap(), FD_PAYER_ONLY);

    let sender_hash = tx.sender_signing_hash().unwrap();
    tx.signatures.push(sender_key().sign(&sender_hash, 1).unwrap());
    assert_eq!(tx.raw_transaction().unwrap(), FD_FULL);
}

#[test]
fn vectors_decode_and_reencode() {
    for raw in [FD_SENDER_ONLY, FD_SENDER_WITH_PAYER, FD_PAYER_ONLY, FD_FULL, FDR_EXECUTION_FULL] {
        let tx = Transaction::decode_hex(raw).unwrap();
        assert_eq!(tx.raw_transaction().unwrap(), raw);
        assert_eq!(tx.chain_id, Some(1));
        assert_eq!(tx.from, Some(sender_key().address()));
        assert_eq!(tx.transaction_hash().unwrap(), keccak256(&from_hex(raw).unwrap()));
    }
}

#[test]
fn full_vector_recovers_both_parties() {
    let tx = Transaction::decode_hex(FD_FULL).unwrap();
    assert!(tx.is_complete());
    assert_eq!(tx.recover_senders().unwrap(), vec![sender_key().address()]);
    assert_eq!(tx.recover_fee_payers().unwrap(), vec![fee_payer_key().address()]);
}

#[test]
fn sender_tx_hash_unaffected_by_fee_payer() {
    let sender_only = Transaction::decode_hex(FD_SENDER_ONLY).unwrap();
    let full = Transaction::decode_hex(FD_FULL).unwrap();
    assert_eq!(sender_only.sender_tx_hash().unwrap(), full.sender_tx_hash().unwrap());
    assert_ne!(sender_only.transaction_hash().unwrap(), full.transaction_hash().unwrap());
}

#[test]
fn combining_halves_gives_full_vector() {
    let full = combine_raw_transactions([FD_SENDER_WITH_PAYER, FD_PAYER_ONLY]).unwrap();
    assert_eq!(full.raw_transaction().unwrap(), FD_FULL);

    // A sender copy without a fee payer is compatible too.
    let full = combine_raw_transactions([FD_SENDER_ONLY, FD_PAYER_ONLY]).unwrap();
    assert_eq!(full.raw_transaction().unwrap(), FD_FULL);
}

#[test]
fn combining_a_vector_with_itself_is_identity() {
    for raw in [FD_SENDER_ONLY, FD_PAYER_ONLY, FD_FULL, FDR_EXECUTION_FULL] {
        let same = combine_raw_transactions([raw, raw, raw]).unwrap();
        assert_eq!(same.raw_transaction().unwrap(), raw);
    }
    // Re-adding a half that is already merged changes nothing either.
    let full = combine_raw_transactions([FD_FULL, FD_SENDER_ONLY, FD_PAYER_ONLY]).unwrap();
    assert_eq!(full.raw_transaction().unwrap(), FD_FULL);
}

#[tokio::test]
async fn signer_reproduces_fee_delegated_ratio_vector() {
    let chain = FixedChainData::new(0, 0, 0);
    let signer = TransactionSigner::new(chain);
    let sender = Keyring::from_key(sender_key());
    let payer = Keyring::from_key(fee_payer_key());

    let mut tx = fdr_execution();
    signer.sign(&sender, &mut tx).await.unwrap();
    let raw = signer.sign_as_fee_payer(&payer, &mut tx).await.unwrap();

    assert_eq!(raw, FDR_EXECUTION_FULL);
    assert_eq!(signer.chain().calls(), 0);
}

#[test]
fn request_json_roundtrip_of_vector() {
    let tx = Transaction::decode_hex(FDR_EXECUTION_FULL).unwrap();
    let json = serde_json::to_string(&tx.to_request()).unwrap();
    assert!(json.contains("\"type\":\"TxTypeFeeDelegatedSmartContractExecutionWithRatio\""));

    let request = serde_json::from_str(&json).unwrap();
    let parsed = Transaction::from_request(&request).unwrap();
    assert_eq!(parsed.raw_transaction().unwrap(), FDR_EXECUTION_FULL);
}
