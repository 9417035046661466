//! Transformer tests
//!
//! Tests cover:
//! - Confirmed, unconfirmed and coinbase transaction shapes
//! - Transform options (asm, scriptSig, spent info)
//! - Idempotence and external field names
//! - Colored data attachment through the parser

mod common;

use cc_assets::transformer::TransformOptions;
use cc_assets::{ColoredData, RawInput, TransformedInput};
use common::*;

const NOW: i64 = 1_750_000_000;

fn coinbase_tx() -> cc_assets::RawTransaction {
    let mut tx = raw_tx(
        &txid(1),
        vec![RawInput {
            prev_txid: "0".repeat(64),
            output_index: 0xffff_ffff,
            sequence: 0xffff_ffff,
            script: "03a0860100".to_string(),
            script_asm: String::new(),
            address: None,
            satoshis: 0,
        }],
        vec![pay_output("bcrt1qminer", 5_000_000_000)],
        990,
    );
    tx.coinbase = true;
    tx
}

#[test]
fn test_confirmed_transaction() {
    let fx = Fixture::new();
    let raw = raw_tx(
        &txid(2),
        vec![spend(&txid(1), 0, Some("sender"), 250_000)],
        vec![op_return_output(), pay_output("receiver", 140_000)],
        995,
    );

    let tx = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());

    assert_eq!(tx.txid, txid(2));
    assert_eq!(tx.confirmations, 6);
    assert_eq!(tx.block_height, 995);
    assert_eq!(tx.time, 1_700_000_995);
    assert_eq!(tx.block_time, Some(1_700_000_995));
    assert_eq!(tx.size, 120);
    assert_eq!(tx.value_in, Some(0.0025));
    assert_eq!(tx.value_out, 0.0014);
    assert_eq!(tx.fees, Some(0.0011));
    assert_eq!(tx.vout[1].value, "0.00140000");
    assert_eq!(tx.vout[1].first_address(), Some("receiver"));
    assert_eq!(tx.first_input_address(), Some("sender"));
}

#[test]
fn test_unconfirmed_transaction_uses_now() {
    let fx = Fixture::new();
    let raw = raw_tx(&txid(3), vec![spend(&txid(1), 0, None, 1_000)], vec![], -1);

    let tx = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());

    assert_eq!(tx.confirmations, 0);
    assert_eq!(tx.block_height, -1);
    assert_eq!(tx.time, NOW);
    assert_eq!(tx.block_time, None);
    assert_eq!(tx.block_hash, None);
}

#[test]
fn test_coinbase_shape() {
    let fx = Fixture::new();
    let tx = fx
        .transformer()
        .transform(&coinbase_tx(), TIP_HEIGHT, NOW, &TransformOptions::default());

    assert!(tx.is_coinbase);
    assert_eq!(tx.vin.len(), 1);
    match &tx.vin[0] {
        TransformedInput::Coinbase(input) => {
            assert_eq!(input.coinbase, "03a0860100");
            assert_eq!(input.n, 0);
        }
        other => panic!("expected coinbase input, got {:?}", other),
    }
    assert_eq!(tx.value_in, None);
    assert_eq!(tx.fees, None);
    assert_eq!(tx.value_out, 50.0);
    assert_eq!(tx.first_input_address(), None);

    let json = serde_json::to_value(&tx).unwrap();
    assert_eq!(json["isCoinBase"], true);
    assert!(json.get("valueIn").is_none());
    assert!(json.get("fees").is_none());
}

#[test]
fn test_options_drop_fields() {
    let fx = Fixture::new();
    let raw = raw_tx(
        &txid(2),
        vec![spend(&txid(1), 0, Some("sender"), 250_000)],
        vec![pay_output("receiver", 140_000)],
        995,
    );
    let options = TransformOptions {
        no_asm: true,
        no_script_sig: true,
        no_spent: true,
    };

    let tx = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &options);
    let input = tx.vin[0].as_spend().unwrap();
    assert!(input.script_sig.is_none());
    assert!(tx.vout[0].script_pub_key.asm.is_none());
    assert!(tx.vout[0].spent.is_none());

    let json = serde_json::to_value(&tx.vout[0]).unwrap();
    assert!(json.get("spentTxId").is_none());

    let full = fx
        .transformer()
        .transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());
    let json = serde_json::to_value(&full.vout[0]).unwrap();
    assert!(json["spentTxId"].is_null());
    assert!(json["scriptPubKey"]["asm"].is_string());

    let options = TransformOptions {
        no_asm: true,
        ..Default::default()
    };
    let tx = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &options);
    let script_sig = tx.vin[0].as_spend().unwrap().script_sig.clone().unwrap();
    assert!(script_sig.asm.is_none());
}

#[test]
fn test_transform_is_idempotent() {
    let fx = Fixture::new();
    fx.parser.register(&txid(2), vec![ColoredData::issuance("La1", 5)]);
    let raw = raw_tx(
        &txid(2),
        vec![spend(&txid(1), 0, Some("sender"), 250_000)],
        vec![op_return_output(), pay_output("receiver", 140_000)],
        995,
    );

    let first = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());
    let second = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());
    assert_eq!(first, second);

    let later = fx
        .transformer()
        .transform(&raw, TIP_HEIGHT + 4, NOW + 600, &TransformOptions::default());
    assert_eq!(later.confirmations, first.confirmations + 4);
    assert_eq!(later.time, first.time);
    assert_eq!(later.assets, first.assets);
}

#[test]
fn test_external_field_names() {
    let fx = Fixture::new();
    let raw = raw_tx(
        &txid(2),
        vec![spend(&txid(1), 3, Some("sender"), 250_000)],
        vec![pay_output("receiver", 140_000)],
        995,
    );

    let json = serde_json::to_value(
        fx.transformer()
            .transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default()),
    )
    .unwrap();

    assert_eq!(json["blockheight"], 995);
    assert!(json["blockhash"].is_string());
    assert_eq!(json["valueOut"], 0.0014);
    assert_eq!(json["vin"][0]["vout"], 3);
    assert_eq!(json["vin"][0]["valueSat"], 250_000);
    assert!(json["vin"][0]["doubleSpentTxID"].is_null());
    assert_eq!(json["vout"][0]["scriptPubKey"]["addresses"][0], "receiver");
    assert!(json.get("isCoinBase").is_none());
    assert_eq!(json["assets"], serde_json::json!([]));
}

#[test]
fn test_parser_output_is_attached() {
    let fx = Fixture::new();
    fx.parser.register(&txid(2), vec![ColoredData::issuance("La1", 5)]);
    let raw = raw_tx(&txid(2), vec![], vec![op_return_output()], 995);

    let tx = fx.transformer().transform(&raw, TIP_HEIGHT, NOW, &TransformOptions::default());
    assert_eq!(tx.assets.len(), 1);
    assert_eq!(tx.assets[0].asset_id.as_deref(), Some("La1"));
}
