mod common;

use common::{rolled_up, DA_START_HEIGHT};
use lumen_node::Challenger;
use lumen_rollup_interface::da::CelestiaPointer;
use lumen_rollup_interface::rollup::ChallengeStatus;
use lumen_rollup_interface::services::l1::L1Client;
use lumen_rollup_interface::H256;

#[tokio::test]
async fn rollup_block_commits_to_its_bundle() {
    let rollup = rolled_up().await;
    let head = rollup.l1.get_rollup_head().await.unwrap();

    assert_eq!(rollup.l1.get_rollup_head_index().await.unwrap(), 1);
    assert_eq!(head.hash(), rollup.rblock);
    assert_eq!(head.l2_height, 102);
    assert_eq!(head.celestia_height, DA_START_HEIGHT);
    assert_eq!(head.celestia_data_root, rollup.pointer.data_root);
    assert_eq!(head.state_root, rollup.blocks[2].header.state_root);
    assert_eq!(rollup.db.get_header(rollup.rblock).unwrap(), Some(head));
}

#[tokio::test]
async fn challenged_share_is_defended() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    let challenger = Challenger::new(rollup.l1.clone());
    let defender = rollup.defender();

    let (_, block_hash) = challenger.challenge_data_root_inclusion(1, 0, 5).await.unwrap();
    assert_eq!(block_hash, rollup.rblock);

    let tx = defender
        .defend_data_root_inclusion(block_hash, 0, 5)
        .await
        .unwrap();
    assert!(rollup.l1.wait(tx.hash).await.unwrap().success);

    let (_, challenge) = challenger
        .get_data_root_inclusion_challenge(block_hash, 0, 5)
        .await
        .unwrap();
    assert_eq!(challenge.status, ChallengeStatus::DefenderWon);

    let settle = defender.settle_data_root_inclusion(block_hash, 0, 5).await;
    assert!(settle.unwrap_err().to_string().contains("challenge is not open"));
    let again = defender.defend_data_root_inclusion(block_hash, 0, 5).await;
    assert!(again.unwrap_err().to_string().contains("nothing to defend"));
}

#[tokio::test]
async fn pointer_is_resolved_from_the_da_layer() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    Challenger::new(rollup.l1.clone())
        .challenge_data_root_inclusion(1, 0, 0)
        .await
        .unwrap();

    rollup
        .defender_without_db()
        .defend_data_root_inclusion(rollup.rblock, 0, 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn stored_pointer_must_match_the_header() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    Challenger::new(rollup.l1.clone())
        .challenge_data_root_inclusion(1, 0, 0)
        .await
        .unwrap();
    rollup
        .db
        .put_pointer(
            rollup.rblock,
            &CelestiaPointer {
                data_root: H256::repeat_byte(9),
                ..rollup.pointer
            },
        )
        .unwrap();

    let error = rollup
        .defender()
        .defend_data_root_inclusion(rollup.rblock, 0, 0)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("does not match"));
}

#[tokio::test]
async fn share_outside_the_bundle_cannot_be_defended() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    let past_end = rollup.pointer.share_len as u32;
    Challenger::new(rollup.l1.clone())
        .challenge_data_root_inclusion(1, 0, past_end)
        .await
        .unwrap();

    let error = rollup
        .defender()
        .defend_data_root_inclusion(rollup.rblock, 0, past_end)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("is outside the"));
}

#[tokio::test]
async fn header_is_provided_to_the_chain_oracle() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    let block = &rollup.blocks[1];

    rollup
        .defender()
        .provide_header(rollup.rblock, block.header.hash_without_extra())
        .await
        .unwrap();

    assert_eq!(
        rollup.l1.provided_header(block.hash()).await,
        Some(block.header.clone())
    );
}

#[tokio::test]
async fn legacy_transaction_is_provided_to_the_chain_oracle() {
    let rollup = rolled_up().await;
    rollup.attest().await;
    let defender = rollup.defender();
    let mut hashes = rollup.blocks[2].tx_hashes();
    let legacy = hashes.next().unwrap();
    let typed = hashes.next().unwrap();

    defender
        .provide_transaction(rollup.rblock, legacy)
        .await
        .unwrap();
    assert!(rollup.l1.provided_tx(legacy).await);

    let error = defender
        .provide_transaction(rollup.rblock, typed)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("is not a legacy transaction"));
    assert!(!rollup.l1.provided_tx(typed).await);
}

#[tokio::test]
async fn unknown_header_is_not_found() {
    let rollup = rolled_up().await;
    rollup.attest().await;

    let error = rollup
        .defender()
        .provide_header(rollup.rblock, H256::repeat_byte(0x42))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("no item with hash"));
}
