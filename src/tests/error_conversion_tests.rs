//! Error propagation across the ledger, submission and engine layers

#[cfg(test)]
mod tests {
    use solana_sdk::signature::Signature;

    use crate::metrics::metrics;
    use crate::rpc_manager::LedgerError;
    use crate::tx_builder::BootstrapError;

    #[test]
    fn test_ledger_read_failure_becomes_rpc() {
        let err: BootstrapError = LedgerError::Timeout {
            endpoint: "https://api.devnet.solana.com".to_string(),
        }
        .into();

        match &err {
            BootstrapError::Rpc(msg) => assert!(msg.contains("api.devnet.solana.com")),
            other => panic!("Expected Rpc variant, got {other:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rpc");
    }

    #[test]
    fn test_send_failures_split_by_stage() {
        let preflight = LedgerError::PreflightFailure {
            endpoint: "mock".to_string(),
            message: "custom program error: 0x1".to_string(),
            logs: vec!["Program log: Error: EmptySupply".to_string()],
        }
        .into_submission_error();
        assert!(matches!(&preflight, BootstrapError::SimulationFailed(msg) if msg.contains("EmptySupply")));
        assert!(!preflight.is_retryable());

        let expired = LedgerError::TransactionExpired {
            endpoint: "mock".to_string(),
        }
        .into_submission_error();
        assert_eq!(expired.category(), "submission");
    }

    #[test]
    fn test_partial_submission_exposes_root_cause() {
        let err = BootstrapError::PartialSubmission {
            completed: vec![Signature::default()],
            failed_index: 1,
            source: Box::new(BootstrapError::SimulationFailed("landed with error".to_string())),
        };

        assert_eq!(err.category(), "partial");
        assert_eq!(err.root_cause().category(), "simulation");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("after 1 confirmed plan(s)"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_anyhow_errors_wrap_as_external() {
        let err: BootstrapError = anyhow::anyhow!("keypair file unreadable").into();
        assert!(matches!(err, BootstrapError::External(_)));

        let before = metrics()
            .transactions_failed
            .with_label_values(&[err.category()])
            .get();
        metrics().record_failure(err.category());
        let after = metrics()
            .transactions_failed
            .with_label_values(&[err.category()])
            .get();
        assert!(after > before);
    }
}
