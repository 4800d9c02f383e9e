use futures::StreamExt;
use std::sync::Arc;

use cloak_block::DefiInteractionNote;
use cloak_primitives::{NoteValue, TxHash};

use super::common::{
    MockChain, MockProver, MockWorldState, init_logging, note, rollup_call_data, ts, user,
};
use crate::chain::{ChainError, ChainEvent, EventData, RollupChain, RollupDecoder};
use crate::joinsplit::{JoinSplitRequest, JoinSplitTxBuilder};

fn empty_rollup(rollup_id: u32) -> Vec<u8> {
    rollup_call_data(rollup_id, rollup_id * 64, Vec::new(), Vec::new())
}

fn decoder(chain: MockChain) -> RollupDecoder {
    RollupDecoder::new(Arc::new(chain))
}

#[tokio::test]
async fn unconfirmed_rollup_yields_nothing() {
    init_logging();
    let chain = MockChain::new();
    chain.add_rollup(5, 1000, 1, empty_rollup(5));

    let blocks: Vec<_> = decoder(chain)
        .get_blocks_from(5, 2)
        .await
        .unwrap()
        .collect()
        .await;
    assert!(blocks.is_empty());
}

#[tokio::test]
async fn unknown_rollup_yields_nothing() {
    let chain = MockChain::new();
    chain.add_rollup(1, 10, 5, empty_rollup(1));

    let blocks: Vec<_> = decoder(chain)
        .get_blocks_from(9, 0)
        .await
        .unwrap()
        .collect()
        .await;
    assert!(blocks.is_empty());
}

#[tokio::test]
async fn blocks_follow_chain_order_from_requested_rollup() {
    init_logging();
    let chain = MockChain::new();
    chain.add_rollup(3, 10, 9, empty_rollup(3));
    let tx4 = chain.add_rollup(4, 11, 8, empty_rollup(4));
    let tx5 = chain.add_rollup(5, 11, 8, empty_rollup(5));
    chain.add_rollup(6, 12, 1, empty_rollup(6));

    let blocks: Vec<_> = decoder(chain)
        .get_blocks_from(4, 2)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let ids: Vec<u32> = blocks.iter().map(|b| b.rollup_id).collect();
    assert_eq!(ids, vec![4, 5]);
    assert_eq!(blocks[0].tx_hash, tx4);
    assert_eq!(blocks[1].tx_hash, tx5);
    assert_eq!(blocks[0].created, ts(1_700_000_000 + 11 * 12));
    assert_eq!(blocks[0].gas_used, 210_000);
    assert_eq!(blocks[0].gas_price, 1_000_000_000);
    assert!(blocks[0].viewing_keys_data.is_empty());
    assert_eq!(blocks[1].decode_proof().unwrap().header.data_start_index, 5 * 64);
}

#[tokio::test]
async fn interaction_results_come_from_the_same_block() {
    let chain = MockChain::new();
    chain.add_rollup(1, 20, 3, empty_rollup(1));
    chain.add_rollup(2, 21, 3, empty_rollup(2));
    let note = DefiInteractionNote {
        bridge_id: [0xbb; 32],
        nonce: 4,
        total_input_value: NoteValue::from(100u64),
        total_output_value_a: NoteValue::from(95u64),
        total_output_value_b: NoteValue::zero(),
        result: true,
    };
    chain.add_event(ChainEvent {
        block_number: 21,
        log_index: 1,
        tx_hash: TxHash([0x21; 32]),
        data: EventData::DefiBridgeProcessed(note.clone()),
    });

    let blocks: Vec<_> = decoder(chain)
        .get_blocks_from(1, 1)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].interaction_result.is_empty());
    assert_eq!(blocks[1].interaction_result, vec![note]);
}

#[tokio::test]
async fn bad_call_data_is_reported_and_skipped() {
    init_logging();
    let chain = MockChain::new();
    let bad = chain.add_rollup(6, 30, 4, vec![0xde, 0xad, 0xbe, 0xef, 0x00]);
    chain.add_rollup(7, 31, 4, empty_rollup(7));

    let items: Vec<_> = decoder(chain)
        .get_blocks_from(6, 1)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    match &items[0] {
        Err(ChainError::Decode { tx_hash, .. }) => assert_eq!(*tx_hash, bad),
        other => panic!("expected decode error, got {other:?}"),
    }
    assert_eq!(items[1].as_ref().unwrap().rollup_id, 7);
}

#[tokio::test]
async fn builder_output_survives_the_chain() {
    let alice = user(1);
    let builder = JoinSplitTxBuilder::new(
        Arc::new(MockProver),
        Arc::new(MockWorldState::default()),
    );
    let req = JoinSplitRequest {
        sender: alice.clone(),
        notes: vec![note(&alice, 3, 100)],
        asset_id: 0,
        public_input: NoteValue::zero(),
        public_output: NoteValue::zero(),
        new_note_value: NoteValue::from(30u64),
        receiver: None,
        output_owner: None,
    };
    let out = builder.create_proof(req, None).await.unwrap();

    let chain = MockChain::new();
    chain
        .send_transaction(out.to_call_data().unwrap())
        .await
        .unwrap();

    let blocks: Vec<_> = decoder(chain)
        .get_blocks_from(0, 1)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].rollup_proof_data, out.proof_data);
    assert_eq!(blocks[0].viewing_keys_data, out.viewing_keys_blob());
    assert_eq!(blocks[0].rollup_size, 1);
}
