//! Scenario: tx1 mints coin X, tx2 spends X. Both endorse remotely so
//! delivery order is under the test's control. Delivering tx2's
//! endorsement response before tx1's must leave both undispatched;
//! delivering tx1's then unblocks both, tx1 at the smaller sequence.

mod support;

use primitive_types::H160;
use ptm_endorsement::respond_to_remote_request;
use ptm_types::Stage;
use support::{await_sent_message, await_stage, make_tx, new_harness, NOTARY};

const REMOTE_NOTARY: &str = "notary@node-b";

#[tokio::test]
async fn endorsement_delivered_out_of_order_blocks_the_dependent_until_its_ancestor_dispatches() {
    let contract = H160::from_low_u64_be(20);
    let h = new_harness(contract, REMOTE_NOTARY);

    let mint_tx = make_tx(contract, NOTARY, "mint-oo");
    let mint_id = mint_tx.id;
    h.domain.register_mint(mint_id, "n", 100);
    h.facade.handle_new_tx(mint_tx).await.unwrap();
    assert!(await_stage(&h.facade, mint_id, Stage::Endorsement).await, "mint reached endorsement");
    let mint_request = await_sent_message(&h.transport, mint_id).await.expect("mint sent an endorsement_request");

    let transfer_tx = make_tx(contract, "n", "transfer-oo");
    let transfer_id = transfer_tx.id;
    h.domain.register_transfer(transfer_id, "n", "r1", 50);
    h.facade.handle_new_tx(transfer_tx).await.unwrap();
    assert!(await_stage(&h.facade, transfer_id, Stage::Endorsement).await, "transfer reached endorsement");
    let transfer_request =
        await_sent_message(&h.transport, transfer_id).await.expect("transfer sent an endorsement_request");

    let transfer_response = respond_to_remote_request(h.domain.as_ref(), &transfer_request)
        .await
        .expect("domain answers the transfer's endorsement request");
    h.facade.receive_transport_message(contract, transfer_response).await.unwrap();

    // Transfer's endorsement is satisfied but it depends on the mint's
    // coin; it must not reach a receipt while the mint is still pending.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let transfer_record = h.facade.get_tx_status(transfer_id).await.unwrap().expect("transfer record exists");
    assert!(transfer_record.receipt.is_none(), "transfer must not dispatch ahead of its ancestor");
    let mint_record = h.facade.get_tx_status(mint_id).await.unwrap().expect("mint record exists");
    assert!(mint_record.receipt.is_none(), "mint has not been endorsed yet");

    let mint_response = respond_to_remote_request(h.domain.as_ref(), &mint_request)
        .await
        .expect("domain answers the mint's endorsement request");
    h.facade.receive_transport_message(contract, mint_response).await.unwrap();

    let mint_record = support::await_receipt(&h.facade, mint_id).await.expect("mint reaches a receipt");
    let transfer_record = support::await_receipt(&h.facade, transfer_id).await.expect("transfer reaches a receipt");

    let mint_seq = mint_record.transaction.dispatch.sequence.expect("mint dispatched");
    let transfer_seq = transfer_record.transaction.dispatch.sequence.expect("transfer dispatched");
    assert!(mint_seq < transfer_seq, "mint must dispatch at a smaller sequence than its dependent");

    h.facade.shutdown().await;
}
