//! # Commitment Ledger - Payment-Gating State Machine
//!
//! ## Data Structures
//!
//! - `commitments`: non-terminal commitments by `(pubkey_digest, metadata_digest)`
//! - `tokens`: every issued token by id, including used ones for a while
//! - `pending`: redeemed writes waiting for confirmation depth, by address
//!
//! ## Rules Enforced
//!
//! - At most one non-terminal commitment per key (`commit()` is idempotent)
//! - A token authorizes exactly one write (`redeem()` flips `used`)
//! - Expiry is applied lazily on every keyed access and in bulk by `sweep()`
//! - Redemption removes the commitment, freeing the key for a new payload cycle

use super::entities::{
    Commitment, CommitOutcome, CommitmentState, LedgerConfig, LedgerTransition,
    PaymentObservation, PendingPropagation, Redemption, SweepReport, TrackedPayment,
};
use super::errors::{LedgerError, TokenRejection};
use super::token::{Token, TokenId, TokenIssuer};
use shared_types::{Address, CommitmentKey, TxId};
use std::collections::HashMap;

/// Owned state of the commitment ledger.
#[derive(Debug)]
pub struct CommitmentLedger {
    config: LedgerConfig,
    issuer: TokenIssuer,
    commitments: HashMap<CommitmentKey, Commitment>,
    tokens: HashMap<TokenId, Token>,
    pending: HashMap<Address, PendingPropagation>,
}

impl CommitmentLedger {
    pub fn new(config: LedgerConfig, issuer: TokenIssuer) -> Self {
        Self {
            config,
            issuer,
            commitments: HashMap::new(),
            tokens: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of non-terminal commitments.
    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, key: &CommitmentKey) -> Option<&Commitment> {
        self.commitments.get(key)
    }

    pub fn pending_for(&self, address: &Address) -> Option<&PendingPropagation> {
        self.pending.get(address)
    }

    fn is_stale(&self, commitment: &Commitment, now: u64) -> bool {
        match commitment.state {
            CommitmentState::Open => {
                now > commitment.created_at.saturating_add(self.config.payment_window)
            }
            CommitmentState::PaidUnconfirmed | CommitmentState::Confirmed => commitment
                .token
                .as_deref()
                .and_then(|value| TokenIssuer::parse(value).ok())
                .and_then(|(id, _)| self.tokens.get(&id))
                .map_or(true, |t| t.is_expired(now)),
            CommitmentState::Redeemed | CommitmentState::Expired => true,
        }
    }

    /// Lazily expire the commitment under `key`. Returns true if removed.
    fn expire_key(&mut self, key: &CommitmentKey, now: u64) -> bool {
        let stale = self
            .commitments
            .get(key)
            .is_some_and(|c| self.is_stale(c, now));
        if stale {
            if let Some(mut removed) = self.commitments.remove(key) {
                removed.state = CommitmentState::Expired;
                self.forget_token(removed.token.as_deref());
            }
        }
        stale
    }

    fn forget_token(&mut self, value: Option<&str>) {
        if let Some((id, _)) = value.and_then(|v| TokenIssuer::parse(v).ok()) {
            self.tokens.remove(&id);
        }
    }

    /// Open (or re-open) a commitment and return the outstanding demand.
    ///
    /// `payload_size` of `None` prices the demand for the largest allowed
    /// payload. A repeat request with a larger payload raises the demand of
    /// the existing commitment instead of creating a second one.
    pub fn commit(
        &mut self,
        key: CommitmentKey,
        payload_size: Option<usize>,
        now: u64,
    ) -> CommitOutcome {
        self.expire_key(&key, now);
        let size = payload_size.unwrap_or(self.config.max_payload_size);
        let required = self.config.fees.required_amount(size);

        if let Some(existing) = self.commitments.get_mut(&key) {
            match existing.state {
                CommitmentState::Open => {
                    if required > existing.required_amount {
                        existing.required_amount = required;
                        existing.payload_size = size;
                    }
                    return CommitOutcome::PaymentRequired {
                        commitment: existing.clone(),
                        created: false,
                    };
                }
                CommitmentState::PaidUnconfirmed | CommitmentState::Confirmed => {
                    if let Some(token) = existing.token.clone() {
                        return CommitOutcome::AlreadyPaid { token };
                    }
                }
                CommitmentState::Redeemed | CommitmentState::Expired => {}
            }
        }

        let commitment = Commitment {
            key,
            required_amount: required,
            payload_size: size,
            created_at: now,
            state: CommitmentState::Open,
            payment: None,
            token: None,
        };
        self.commitments.insert(key, commitment.clone());
        CommitOutcome::PaymentRequired {
            commitment,
            created: true,
        }
    }

    /// Record a matched payment, minting the token on OPEN → PAID.
    ///
    /// Re-submitting a payment for an already paid commitment returns the
    /// token minted the first time.
    pub fn record_payment(
        &mut self,
        key: &CommitmentKey,
        observation: PaymentObservation,
        now: u64,
    ) -> Result<String, LedgerError> {
        self.expire_key(key, now);
        let depth_required = self.config.confirmation_depth;
        let token_ttl = self.config.token_ttl;

        let commitment = self
            .commitments
            .get_mut(key)
            .ok_or(LedgerError::UnknownCommitment(*key))?;

        if commitment.state.is_paid() {
            if let Some(token) = commitment.token.clone() {
                return Ok(token);
            }
        }

        if observation.amount < commitment.required_amount {
            return Err(LedgerError::InsufficientPayment {
                required: commitment.required_amount,
                paid: observation.amount,
            });
        }

        let token = self.issuer.mint(*key, now.saturating_add(token_ttl));
        commitment.state = if observation.depth >= depth_required {
            CommitmentState::Confirmed
        } else {
            CommitmentState::PaidUnconfirmed
        };
        commitment.payment = Some(observation);
        commitment.token = Some(token.value.clone());

        let value = token.value.clone();
        self.tokens.insert(token.id, token);
        Ok(value)
    }

    /// Validate a presented token against the key derived from the payload
    /// being written. Does not consume it.
    pub fn check_token(
        &self,
        value: &str,
        key: &CommitmentKey,
        now: u64,
    ) -> Result<&Token, TokenRejection> {
        let (id, tag) = TokenIssuer::parse(value)?;
        let token = self.tokens.get(&id).ok_or(TokenRejection::Unknown)?;
        if !self.issuer.authenticate(&token.key, &id, &tag) {
            return Err(TokenRejection::Unknown);
        }
        if token.key.metadata_digest != key.metadata_digest {
            return Err(TokenRejection::DigestMismatch);
        }
        if token.key.pubkey_digest != key.pubkey_digest {
            return Err(TokenRejection::IdentityMismatch);
        }
        if token.used {
            return Err(TokenRejection::AlreadyUsed);
        }
        if token.is_expired(now) {
            return Err(TokenRejection::Expired);
        }
        Ok(token)
    }

    /// What `redeem` would return now. Consumes nothing.
    pub fn preview_redemption(
        &self,
        value: &str,
        key: &CommitmentKey,
        now: u64,
    ) -> Result<Redemption, TokenRejection> {
        self.check_token(value, key, now)?;
        let commitment = self.commitments.get(key).ok_or(TokenRejection::Unknown)?;
        let payment = commitment.payment.ok_or(TokenRejection::Unknown)?;

        Ok(Redemption {
            txid: payment.txid,
            metadata_digest: key.metadata_digest,
            depth: payment.depth,
            ready_to_propagate: commitment.state == CommitmentState::Confirmed
                || payment.depth >= self.config.confirmation_depth,
        })
    }

    /// Consume a token for a write to `address`.
    ///
    /// The commitment leaves the ledger (REDEEMED). If its payment is not yet
    /// deep enough the write is parked in `pending` until the watcher reports
    /// sufficient depth.
    pub fn redeem(
        &mut self,
        value: &str,
        key: &CommitmentKey,
        address: Address,
        now: u64,
    ) -> Result<Redemption, TokenRejection> {
        let redemption = self.preview_redemption(value, key, now)?;
        let id = self.check_token(value, key, now)?.id;

        self.commitments.remove(key);

        if let Some(token) = self.tokens.get_mut(&id) {
            token.used = true;
            // Used tokens are kept only long enough to answer replays.
            token.expires_at = now.saturating_add(self.config.used_token_retention);
        }

        if redemption.ready_to_propagate {
            self.pending.remove(&address);
        } else {
            self.pending.insert(
                address,
                PendingPropagation {
                    address,
                    metadata_digest: key.metadata_digest,
                    txid: redemption.txid,
                    depth: redemption.depth,
                    since: now,
                },
            );
        }

        Ok(redemption)
    }

    /// Every payment whose depth still matters.
    pub fn tracked_payments(&self) -> Vec<TrackedPayment> {
        let paid = self.commitments.values().filter_map(|c| match (c.state, c.payment) {
            (CommitmentState::PaidUnconfirmed | CommitmentState::Confirmed, Some(p)) => {
                Some(TrackedPayment::Commitment {
                    key: c.key,
                    txid: p.txid,
                })
            }
            _ => None,
        });
        let pending = self.pending.values().map(|p| TrackedPayment::Pending {
            address: p.address,
            txid: p.txid,
        });
        paid.chain(pending).collect()
    }

    /// OPEN commitments, for out-of-band payment discovery.
    pub fn open_commitments(&self, now: u64) -> Vec<Commitment> {
        self.commitments
            .values()
            .filter(|c| c.state == CommitmentState::Open && !self.is_stale(c, now))
            .cloned()
            .collect()
    }

    /// Apply the oracle's answer for `txid`. `None` means the transaction is
    /// no longer known to the ledger (reorged out or evicted).
    ///
    /// Records already pushed to peers are never retracted; only work that
    /// has not happened yet is undone.
    pub fn apply_depth(&mut self, txid: &TxId, depth: Option<u64>) -> Vec<LedgerTransition> {
        let threshold = self.config.confirmation_depth;
        let mut transitions = Vec::new();
        let mut revoked = Vec::new();

        for commitment in self.commitments.values_mut() {
            let Some(payment) = commitment.payment.as_mut() else {
                continue;
            };
            if payment.txid != *txid || !commitment.state.is_paid() {
                continue;
            }
            match depth {
                Some(d) => {
                    payment.depth = d;
                    if commitment.state == CommitmentState::PaidUnconfirmed && d >= threshold {
                        commitment.state = CommitmentState::Confirmed;
                        transitions.push(LedgerTransition::Confirmed {
                            key: commitment.key,
                            txid: *txid,
                            depth: d,
                        });
                    }
                }
                None => {
                    commitment.state = CommitmentState::Open;
                    commitment.payment = None;
                    revoked.push(commitment.token.take());
                    transitions.push(LedgerTransition::Reverted {
                        key: commitment.key,
                        txid: *txid,
                    });
                }
            }
        }
        for token in revoked {
            self.forget_token(token.as_deref());
        }

        let affected: Vec<Address> = self
            .pending
            .values()
            .filter(|p| p.txid == *txid)
            .map(|p| p.address)
            .collect();
        for address in affected {
            match depth {
                Some(d) if d >= threshold => {
                    if let Some(p) = self.pending.remove(&address) {
                        transitions.push(LedgerTransition::ReadyToPropagate {
                            address,
                            metadata_digest: p.metadata_digest,
                            txid: p.txid,
                        });
                    }
                }
                Some(d) => {
                    if let Some(p) = self.pending.get_mut(&address) {
                        p.depth = d;
                    }
                }
                None => {
                    self.pending.remove(&address);
                    transitions.push(LedgerTransition::PropagationCancelled {
                        address,
                        txid: *txid,
                    });
                }
            }
        }

        transitions
    }

    /// Remove everything whose lifetime elapsed.
    pub fn sweep(&mut self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        let stale: Vec<CommitmentKey> = self
            .commitments
            .values()
            .filter(|c| self.is_stale(c, now))
            .map(|c| c.key)
            .collect();
        for key in stale {
            if self.expire_key(&key, now) {
                report.commitments += 1;
            }
        }

        let before = self.tokens.len();
        self.tokens.retain(|_, t| !t.is_expired(now));
        report.tokens = before - self.tokens.len();

        let pending_ttl = self.config.pending_push_ttl;
        let before = self.pending.len();
        self.pending
            .retain(|_, p| now <= p.since.saturating_add(pending_ttl));
        report.pending = before - self.pending.len();

        report
    }
}
