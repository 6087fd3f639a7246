//! Scenario: a transaction submitted on node A names a notary on node
//! B. The request travels over A's transport, node B answers with its
//! own domain instance, and the response is handed back to A after an
//! artificial delay — node A must not reach a receipt before that
//! response arrives, and must reach exactly one once it does.

mod support;

use std::time::Duration;

use primitive_types::H160;
use ptm_endorsement::respond_to_remote_request;
use ptm_types::Stage;
use support::{await_sent_message, await_stage, make_tx, new_harness, NOTARY};

#[tokio::test]
async fn remote_endorsement_dispatches_once_after_the_delayed_response_arrives() {
    let contract = H160::from_low_u64_be(30);

    // Node A: holds the transaction, names "notary@node-b" as the
    // remote party so its endorsement request goes out over transport
    // instead of resolving locally.
    let node_a = new_harness(contract, "notary@node-b");
    // Node B: only its domain plugin is needed, to answer the request
    // the same way a live orchestrator on that node would.
    let node_b = new_harness(contract, NOTARY);

    let tx = make_tx(contract, NOTARY, "remote-mint");
    let tx_id = tx.id;
    node_a.domain.register_mint(tx_id, "n", 100);
    node_a.facade.handle_new_tx(tx).await.unwrap();

    assert!(await_stage(&node_a.facade, tx_id, Stage::Endorsement).await, "reached endorsement");
    let request = await_sent_message(&node_a.transport, tx_id).await.expect("node A sent an endorsement_request");
    assert_eq!(request.node, "node-b");

    // Node A must not have a receipt yet; the request is still in
    // flight to node B.
    assert!(node_a.facade.get_tx_status(tx_id).await.unwrap().unwrap().receipt.is_none());

    // Transport delay before node B's answer makes it back.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = respond_to_remote_request(node_b.domain.as_ref(), &request)
        .await
        .expect("node B answers the endorsement request");

    node_a.facade.receive_transport_message(contract, response).await.unwrap();

    let record = support::await_receipt(&node_a.facade, tx_id).await.expect("node A reaches a receipt");
    assert_eq!(record.transaction.dispatch.sequence, Some(0));

    node_a.facade.shutdown().await;
}
