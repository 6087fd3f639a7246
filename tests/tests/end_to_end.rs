//! End-to-end token scenarios driven entirely through one `Facade`:
//! mint, transfer, transfer, burn; an unauthorized mint; and an
//! insufficient-balance transfer.

mod support;

use primitive_types::H160;
use ptm_types::ReceiptOutcome;
use support::{await_receipt, make_tx, new_harness, NOTARY};

#[tokio::test]
async fn mint_transfer_transfer_burn_reaches_expected_balances_in_order() {
    let contract = H160::from_low_u64_be(1);
    let h = new_harness(contract, NOTARY);

    // Mint 100 to N.
    let mint_tx = make_tx(contract, NOTARY, "mint-1");
    h.domain.register_mint(mint_tx.id, "n", 100);
    let mint_id = h.facade.handle_new_tx(mint_tx).await.unwrap();
    let mint_record = await_receipt(&h.facade, mint_id).await.expect("mint reached a receipt");
    assert!(matches!(mint_record.receipt.unwrap().outcome, ReceiptOutcome::Success));

    // Transfer 50 N -> R1.
    let transfer1_tx = make_tx(contract, "n", "transfer-1");
    h.domain.register_transfer(transfer1_tx.id, "n", "r1", 50);
    let transfer1_id = h.facade.handle_new_tx(transfer1_tx).await.unwrap();
    let transfer1_record =
        await_receipt(&h.facade, transfer1_id).await.expect("transfer 1 reached a receipt");
    assert!(matches!(transfer1_record.receipt.unwrap().outcome, ReceiptOutcome::Success));

    // Transfer 50 R1 -> R2.
    let transfer2_tx = make_tx(contract, "r1", "transfer-2");
    h.domain.register_transfer(transfer2_tx.id, "r1", "r2", 50);
    let transfer2_id = h.facade.handle_new_tx(transfer2_tx).await.unwrap();
    let transfer2_record =
        await_receipt(&h.facade, transfer2_id).await.expect("transfer 2 reached a receipt");
    assert!(matches!(transfer2_record.receipt.unwrap().outcome, ReceiptOutcome::Success));

    // Burn 25 from R2.
    let burn_tx = make_tx(contract, "r2", "burn-1");
    h.domain.register_burn(burn_tx.id, "r2", 25);
    let burn_id = h.facade.handle_new_tx(burn_tx).await.unwrap();
    let burn_record = await_receipt(&h.facade, burn_id).await.expect("burn reached a receipt");
    assert!(matches!(burn_record.receipt.unwrap().outcome, ReceiptOutcome::Success));

    // Dispatch sequence numbers are assigned in the order the four
    // transactions actually dispatched, 0 through 3.
    let mut sequences: Vec<u64> = [&mint_record, &transfer1_record, &transfer2_record, &burn_record]
        .iter()
        .map(|r| r.transaction.dispatch.sequence.expect("dispatched"))
        .collect();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert_eq!(mint_record.transaction.dispatch.sequence, Some(0));
    assert_eq!(transfer1_record.transaction.dispatch.sequence, Some(1));
    assert_eq!(transfer2_record.transaction.dispatch.sequence, Some(2));
    assert_eq!(burn_record.transaction.dispatch.sequence, Some(3));

    h.facade.shutdown().await;
}

#[tokio::test]
async fn mint_from_a_non_notary_reverts_and_creates_no_states() {
    let contract = H160::from_low_u64_be(2);
    let h = new_harness(contract, NOTARY);

    let tx = make_tx(contract, "mallory", "bad-mint");
    h.domain.register_mint(tx.id, "mallory", 1000);
    let tx_id = h.facade.handle_new_tx(tx).await.unwrap();

    let record = await_receipt(&h.facade, tx_id).await.expect("reverted transaction still reaches a receipt");
    match record.receipt.unwrap().outcome {
        ReceiptOutcome::FailedWithMessage(msg) => {
            assert!(msg.contains("authorized minter"), "unexpected message: {msg}")
        }
        other => panic!("expected a failure outcome, got {other:?}"),
    }
    assert!(record.transaction.post_assembly.output_states.is_empty());

    h.facade.shutdown().await;
}

#[tokio::test]
async fn transfer_exceeding_balance_reverts_with_no_state_changes() {
    let contract = H160::from_low_u64_be(3);
    let h = new_harness(contract, NOTARY);

    let mint_tx = make_tx(contract, NOTARY, "mint-2");
    h.domain.register_mint(mint_tx.id, "n", 100);
    let mint_id = h.facade.handle_new_tx(mint_tx).await.unwrap();
    await_receipt(&h.facade, mint_id).await.expect("mint reached a receipt");

    let transfer_tx = make_tx(contract, "n", "overdraw");
    h.domain.register_transfer(transfer_tx.id, "n", "r1", 150);
    let transfer_id = h.facade.handle_new_tx(transfer_tx).await.unwrap();
    let record =
        await_receipt(&h.facade, transfer_id).await.expect("reverted transfer still reaches a receipt");

    match record.receipt.unwrap().outcome {
        ReceiptOutcome::FailedWithMessage(msg) => assert!(msg.contains("holds"), "unexpected message: {msg}"),
        other => panic!("expected a failure outcome, got {other:?}"),
    }
    assert!(record.transaction.post_assembly.output_states.is_empty());

    h.facade.shutdown().await;
}
