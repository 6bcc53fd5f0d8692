//! Host wallet used to sign L1 transactions.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_eips::Encodable2718;
use alloy_network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

use super::error::{L1Error, L1Result};
use crate::SignedL1Tx;

/// Signs L1 transactions and tracks the account nonce.
#[async_trait]
pub trait L1Wallet: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Address;

    /// Returns the nonce to use for the next transaction and advances it.
    fn next_nonce(&self) -> u64;

    /// Gives back `nonce` after a failed send.
    ///
    /// Only succeeds while `nonce` is still the most recently taken one, so a
    /// nonce handed out to a concurrent sender is never released. Returns
    /// whether the nonce was given back.
    fn rollback_nonce(&self, nonce: u64) -> bool;

    /// Overwrites the tracked nonce, typically with the value reported by L1.
    fn set_nonce(&self, nonce: u64);

    /// Signs a fully prepared transaction.
    async fn sign(&self, tx: TransactionRequest) -> L1Result<SignedL1Tx>;
}

/// Wallet backed by an in-process private key.
pub struct LocalWallet {
    wallet: EthereumWallet,
    address: Address,
    nonce: AtomicU64,
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("nonce", &self.nonce.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LocalWallet {
    /// Creates a wallet for `signer` starting at nonce zero.
    pub fn new(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { wallet: EthereumWallet::from(signer), address, nonce: AtomicU64::new(0) }
    }
}

#[async_trait]
impl L1Wallet for LocalWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    fn rollback_nonce(&self, nonce: u64) -> bool {
        self.nonce
            .compare_exchange(nonce.saturating_add(1), nonce, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    async fn sign(&self, tx: TransactionRequest) -> L1Result<SignedL1Tx> {
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
            .await
            .map_err(|e| L1Error::Signing(e.to_string()))?;
        Ok(SignedL1Tx {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(Encodable2718::encoded_2718(&envelope)),
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::config::build_signer;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn wallet() -> LocalWallet {
        LocalWallet::new(build_signer(TEST_KEY).unwrap())
    }

    #[test]
    fn test_nonce_tracking() {
        let wallet = wallet();
        assert_eq!(wallet.next_nonce(), 0);
        assert_eq!(wallet.next_nonce(), 1);
        assert!(wallet.rollback_nonce(1));
        assert_eq!(wallet.next_nonce(), 1);

        wallet.set_nonce(10);
        assert_eq!(wallet.next_nonce(), 10);
    }

    #[test]
    fn test_rollback_without_taken_nonce_is_ignored() {
        let wallet = wallet();
        assert!(!wallet.rollback_nonce(0));
        assert_eq!(wallet.next_nonce(), 0);
    }

    #[test]
    fn test_rollback_keeps_nonce_taken_by_another_sender() {
        let wallet = wallet();
        let first = wallet.next_nonce();
        let second = wallet.next_nonce();

        // the first sender fails after the second took its nonce
        assert!(!wallet.rollback_nonce(first));
        assert_eq!(wallet.next_nonce(), second + 1);

        // the most recent sender can still give its nonce back
        let third = second + 1;
        assert!(wallet.rollback_nonce(third));
        assert_eq!(wallet.next_nonce(), third);
    }

    #[tokio::test]
    async fn test_sign_prepared_transaction() {
        let wallet = wallet();
        let tx = TransactionRequest::default()
            .from(wallet.address())
            .to(Address::repeat_byte(0xcc))
            .value(U256::ZERO)
            .nonce(0)
            .gas_limit(100_000)
            .max_fee_per_gas(2_000_000_000)
            .max_priority_fee_per_gas(1_000_000_000)
            .with_chain_id(1);

        let signed = wallet.sign(tx).await.unwrap();
        assert!(!signed.raw.is_empty());
        assert_eq!(signed.hash, alloy_primitives::keccak256(&signed.raw));
    }

    #[tokio::test]
    async fn test_sign_incomplete_transaction_fails() {
        let wallet = wallet();
        let tx = TransactionRequest::default().to(Address::repeat_byte(0xcc));
        assert!(matches!(wallet.sign(tx).await, Err(L1Error::Signing(_))));
    }
}
