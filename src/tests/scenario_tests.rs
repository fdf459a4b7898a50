//! End-to-end bootstrap scenarios against the mock ledger
//!
//! These drive the engine through submission and then inspect what actually
//! went over the wire.

#[cfg(test)]
mod scenario_tests {
    use solana_sdk::pubkey::Pubkey;

    use crate::rpc_manager::LedgerError;
    use crate::structured_logging::PipelineContext;
    use crate::test_utils::MockLedger;
    use crate::tests::test_helpers::test_helpers::{
        create_account_fields, decode_all, pool_fixture,
    };
    use crate::tx_builder::address::{search_bump, BUMP_SEARCH_SPACE};
    use crate::tx_builder::{
        AddressDeriver, BootstrapError, BootstrapStep, SequencerLimits, SWAP_STATE_LEN,
    };
    use crate::types::SPL_TOKEN_SWAP_PROGRAM_ID;

    fn blockhash_rejection() -> LedgerError {
        LedgerError::BlockhashNotFound {
            endpoint: "mock://ledger".to_string(),
        }
    }

    #[tokio::test]
    async fn test_constant_product_pool_six_and_nine_decimals() {
        let fixture = pool_fixture(6, 9, |ledger| ledger);
        let report = fixture.engine.bootstrap(&fixture.request).await.unwrap();
        let sent = decode_all(&fixture.ledger.sent_transactions());

        let state_creations: Vec<_> = sent
            .iter()
            .filter(|ix| ix.accounts.get(1) == Some(&report.addresses.swap_state))
            .filter_map(create_account_fields)
            .collect();
        assert_eq!(
            state_creations,
            vec![(
                MockLedger::rent_for(SWAP_STATE_LEN),
                SWAP_STATE_LEN as u64,
                SPL_TOKEN_SWAP_PROGRAM_ID
            )]
        );

        let inits: Vec<_> = sent
            .iter()
            .filter(|ix| ix.program_id == SPL_TOKEN_SWAP_PROGRAM_ID)
            .collect();
        assert_eq!(inits.len(), 1);

        let init = inits[0];
        assert_eq!(init.data.len(), 98);
        assert!(init.data[65..].iter().all(|b| *b == 0));
        assert_eq!(init.data[0], 0);
        let fees: Vec<u64> = init.data[1..65]
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(fees, vec![25, 10_000, 5, 10_000, 0, 0, 20, 100]);
        assert_eq!(init.data[65], 0);

        let a = &report.addresses;
        assert_eq!(
            init.accounts,
            vec![
                a.swap_state,
                a.swap_authority,
                a.token_a_vault,
                a.token_b_vault,
                a.pool_mint,
                a.fee_account,
                a.pool_token_account,
                spl_token::id(),
            ]
        );
    }

    #[tokio::test]
    async fn test_pool_mint_uses_requested_decimals_and_authority() {
        let mut fixture = pool_fixture(6, 9, |ledger| ledger);
        fixture.request.pool_mint_decimals = 4;
        let report = fixture.engine.bootstrap(&fixture.request).await.unwrap();
        let sent = decode_all(&fixture.ledger.sent_transactions());

        // InitializeMint2: tag 20, decimals, mint authority, no freeze authority
        let init_mint = sent
            .iter()
            .find(|ix| {
                ix.program_id == spl_token::id()
                    && ix.data.first() == Some(&20)
                    && ix.accounts == vec![report.addresses.pool_mint]
            })
            .unwrap();
        assert_eq!(init_mint.data[1], 4);
        assert_eq!(&init_mint.data[2..34], report.addresses.swap_authority.as_ref());
        assert_eq!(init_mint.data[34], 0);
    }

    #[test]
    fn test_empty_seeds_terminate_within_search_space() {
        let program = Pubkey::new_unique();
        let pda = AddressDeriver::default().derive(&[], &program).unwrap();
        assert!(!pda.address.is_on_curve());
        assert_eq!(
            (pda.address, pda.bump),
            Pubkey::find_program_address(&[], &program)
        );

        let mut attempts = 0u16;
        let result = search_bump(&[], &program, |_| {
            attempts += 1;
            true
        });
        assert!(matches!(
            result,
            Err(BootstrapError::DerivationExhausted { .. })
        ));
        assert_eq!(attempts, BUMP_SEARCH_SPACE);
    }

    #[tokio::test]
    async fn test_rejection_on_second_dependent_plan_is_not_undone() {
        let mut fixture = pool_fixture(6, 9, |ledger| ledger.fail_send_at(1, blockhash_rejection()));
        fixture.engine = fixture.engine.with_limits(SequencerLimits {
            max_signatures: 2,
            ..SequencerLimits::default()
        });

        let prepared = fixture
            .engine
            .prepare(&fixture.request, &PipelineContext::new("scenario"))
            .await
            .unwrap();
        assert!(prepared.plans.len() >= 3);
        assert!(prepared.plans.last().unwrap().depends_on_previous());
        assert_eq!(fixture.ledger.send_count(), 0);

        let err = fixture.engine.bootstrap(&fixture.request).await.unwrap_err();
        match &err {
            BootstrapError::PartialSubmission {
                completed,
                failed_index,
                source,
            } => {
                assert_eq!(completed.len(), 1);
                assert_eq!(*failed_index, 1);
                assert!(matches!(**source, BootstrapError::SubmissionRejected(_)));
            }
            other => panic!("expected PartialSubmission, got {other}"),
        }
        assert!(err.is_retryable());

        // Only the first plan ever reached the ledger and nothing followed it
        let sent = fixture.ledger.sent_transactions();
        assert_eq!(sent.len(), 1);
        let first = decode_all(&sent);
        assert!(first
            .iter()
            .all(|ix| ix.program_id != SPL_TOKEN_SWAP_PROGRAM_ID));
    }

    #[tokio::test]
    async fn test_non_sequential_bootstrap_is_refused_for_dependent_plans() {
        let mut fixture = pool_fixture(6, 9, |ledger| ledger);
        fixture.engine = fixture.engine.with_limits(SequencerLimits {
            max_signatures: 2,
            ..SequencerLimits::default()
        });
        fixture.request.sequential = false;

        let err = fixture.engine.bootstrap(&fixture.request).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
        assert_eq!(fixture.ledger.send_count(), 0);
    }

    #[tokio::test]
    async fn test_rent_failure_stops_before_submission() {
        let fixture = pool_fixture(6, 9, |ledger| ledger.fail_rent());
        let err = fixture.engine.bootstrap(&fixture.request).await.unwrap_err();
        assert!(matches!(err, BootstrapError::RentQuery { space, .. } if space == SWAP_STATE_LEN as u64));
        assert_eq!(fixture.ledger.send_count(), 0);
    }

    #[tokio::test]
    async fn test_report_steps_follow_bootstrap_order() {
        let fixture = pool_fixture(9, 6, |ledger| ledger);
        let report = fixture.engine.bootstrap(&fixture.request).await.unwrap();

        let steps: Vec<BootstrapStep> = report
            .confirmed
            .iter()
            .flat_map(|plan| plan.steps.iter().copied())
            .collect();
        let mut sorted = steps.clone();
        sorted.sort();
        assert_eq!(steps, sorted);
        assert_eq!(
            report.confirmed.iter().map(|p| p.index).collect::<Vec<_>>(),
            (0..report.confirmed.len()).collect::<Vec<_>>()
        );
    }
}
