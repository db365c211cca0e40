//! Transaction construction, signing, grouping and broadcast.
//!
//! # Canonical encoding
//! The ledger hashes and signs the *canonical* msgpack form of a transaction:
//!
//! - a map whose keys are sorted lexicographically,
//! - fields holding their zero value (0, empty string, empty bytes, zero
//!   address) are omitted entirely,
//! - addresses, hashes and notes are msgpack `bin`, never arrays.
//!
//! Any deviation produces a different transaction id and a signature the
//! node rejects, so the encoder below is hand-written against `rmp` rather
//! than derived.
//!
//! # Domain prefixes
//! | Prefix | Hashed / signed payload |
//! |--------|-------------------------|
//! | `TX` | one encoded transaction (id and signature) |
//! | `TG` | `{ txlist: [raw id, ...] }` (group id) |

use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use data_encoding::BASE32_NOPAD;
use log::debug;

use crate::algod::{AlgodApi, SuggestedParams};
use crate::amount::MicroAlgos;
use crate::crypto::{sha512_256, Account, Address};

/// Largest group the ledger accepts.
pub const MAX_GROUP_SIZE: usize = 16;

/// Longest note the ledger accepts, in bytes.
pub const MAX_NOTE_LEN: usize = 1024;

const TX_PREFIX: &[u8] = b"TX";
const GROUP_PREFIX: &[u8] = b"TG";

/// Bytes a signature adds around an encoded transaction:
/// `fixmap(2)`, `"sig"`, `bin8(64)` header + 64 bytes, `"txn"`.
const SIGNATURE_OVERHEAD: u64 = 1 + 4 + 2 + 64 + 4;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    Payment {
        receiver: Address,
        amount: MicroAlgos,
    },
    AssetTransfer {
        receiver: Address,
        asset_id: u64,
        /// Base units of the asset; not scaled by its decimals.
        amount: u64,
    },
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Address,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    pub note: Vec<u8>,
    pub group: Option<[u8; 32]>,
    pub kind: TxKind,
}

/// A transaction plus the signature that authorises it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txn: Transaction,
    pub sig: [u8; 64],
    /// Set when the signer is not the sender (a rekeyed account).
    pub auth_addr: Option<Address>,
}

enum Field<'a> {
    Uint(u64),
    Bin(&'a [u8]),
    Str(&'a str),
}

/// Zero addresses are omitted like any other zero value.
fn addr_field(addr: &Address) -> Field<'_> {
    if addr.is_zero() {
        Field::Bin(&[])
    } else {
        Field::Bin(addr.as_bytes())
    }
}

fn encode_err<E: fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("msgpack encoding failed: {}", e)
}

fn write_map(buf: &mut Vec<u8>, mut fields: Vec<(&str, Field<'_>)>) -> Result<()> {
    fields.retain(|(_, v)| match v {
        Field::Uint(n) => *n != 0,
        Field::Bin(b) => !b.is_empty(),
        Field::Str(s) => !s.is_empty(),
    });
    fields.sort_by(|a, b| a.0.cmp(b.0));

    rmp::encode::write_map_len(buf, fields.len() as u32).map_err(encode_err)?;
    for (key, value) in fields {
        rmp::encode::write_str(buf, key).map_err(encode_err)?;
        match value {
            Field::Uint(n) => {
                rmp::encode::write_uint(buf, n).map_err(encode_err)?;
            }
            Field::Bin(b) => rmp::encode::write_bin(buf, b).map_err(encode_err)?,
            Field::Str(s) => rmp::encode::write_str(buf, s).map_err(encode_err)?,
        }
    }
    Ok(())
}

// ── Transaction ───────────────────────────────────────────────────────────────

impl Transaction {
    fn from_params(
        params: &SuggestedParams,
        sender: Address,
        note: Option<&str>,
        kind: TxKind,
    ) -> Result<Self> {
        let note = note.map(|n| n.as_bytes().to_vec()).unwrap_or_default();
        if note.len() > MAX_NOTE_LEN {
            bail!(
                "Note is {} bytes; the ledger accepts at most {}",
                note.len(),
                MAX_NOTE_LEN
            );
        }

        let mut txn = Transaction {
            sender,
            fee: 0,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            genesis_id: params.genesis_id.clone(),
            genesis_hash: params.genesis_hash,
            note,
            group: None,
            kind,
        };
        txn.fee = txn.suggested_fee(params)?;
        Ok(txn)
    }

    pub fn payment(
        params: &SuggestedParams,
        sender: Address,
        receiver: Address,
        amount: MicroAlgos,
        note: Option<&str>,
    ) -> Result<Self> {
        Self::from_params(params, sender, note, TxKind::Payment { receiver, amount })
    }

    pub fn asset_transfer(
        params: &SuggestedParams,
        sender: Address,
        receiver: Address,
        asset_id: u64,
        amount: u64,
        note: Option<&str>,
    ) -> Result<Self> {
        Self::from_params(
            params,
            sender,
            note,
            TxKind::AssetTransfer {
                receiver,
                asset_id,
                amount,
            },
        )
    }

    /// `max(min_fee, fee_per_byte × signed size)`.
    ///
    /// The fee field is part of the size, so the estimate is repeated until
    /// the fee's own encoded width stops changing.
    fn suggested_fee(&self, params: &SuggestedParams) -> Result<u64> {
        let mut sized = self.clone();
        for _ in 0..8 {
            let size = sized.encode()?.len() as u64 + SIGNATURE_OVERHEAD;
            let fee = params
                .fee_per_byte
                .saturating_mul(size)
                .max(params.min_fee);
            if fee == sized.fee {
                break;
            }
            sized.fee = fee;
        }
        Ok(sized.fee)
    }

    /// Re-price the fee as if the 32-byte group id were already set.
    ///
    /// Must run before the group id is computed, since the fee is part of
    /// every transaction id in the group.
    pub fn reprice_for_group(&mut self, params: &SuggestedParams) -> Result<()> {
        let mut grouped = self.clone();
        grouped.group = Some([0u8; 32]);
        self.fee = grouped.suggested_fee(params)?;
        Ok(())
    }

    pub fn receiver(&self) -> Address {
        match self.kind {
            TxKind::Payment { receiver, .. } | TxKind::AssetTransfer { receiver, .. } => receiver,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            TxKind::Payment { .. } => "pay",
            TxKind::AssetTransfer { .. } => "axfer",
        }
    }

    /// Canonical msgpack encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let group: &[u8] = match &self.group {
            Some(gid) => gid,
            None => &[],
        };
        let mut fields = vec![
            ("fee", Field::Uint(self.fee)),
            ("fv", Field::Uint(self.first_valid)),
            ("gen", Field::Str(&self.genesis_id)),
            ("gh", Field::Bin(&self.genesis_hash)),
            ("grp", Field::Bin(group)),
            ("lv", Field::Uint(self.last_valid)),
            ("note", Field::Bin(&self.note)),
            ("snd", addr_field(&self.sender)),
            ("type", Field::Str(self.type_tag())),
        ];
        match &self.kind {
            TxKind::Payment { receiver, amount } => {
                fields.push(("amt", Field::Uint(amount.0)));
                fields.push(("rcv", addr_field(receiver)));
            }
            TxKind::AssetTransfer {
                receiver,
                asset_id,
                amount,
            } => {
                fields.push(("aamt", Field::Uint(*amount)));
                fields.push(("arcv", addr_field(receiver)));
                fields.push(("xaid", Field::Uint(*asset_id)));
            }
        }

        let mut buf = Vec::with_capacity(256);
        write_map(&mut buf, fields)?;
        Ok(buf)
    }

    /// `"TX" || encode()`: the exact bytes that are hashed and signed.
    pub fn bytes_to_sign(&self) -> Result<Vec<u8>> {
        let mut out = TX_PREFIX.to_vec();
        out.extend(self.encode()?);
        Ok(out)
    }

    pub fn raw_id(&self) -> Result<[u8; 32]> {
        Ok(sha512_256(&self.bytes_to_sign()?))
    }

    /// 52-character base32 transaction id.
    pub fn id(&self) -> Result<String> {
        Ok(BASE32_NOPAD.encode(&self.raw_id()?))
    }
}

impl SignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let txn = self.txn.encode()?;

        let mut buf = Vec::with_capacity(txn.len() + 128);
        let len = if self.auth_addr.is_some() { 3 } else { 2 };
        rmp::encode::write_map_len(&mut buf, len).map_err(encode_err)?;
        if let Some(auth) = &self.auth_addr {
            rmp::encode::write_str(&mut buf, "sgnr").map_err(encode_err)?;
            rmp::encode::write_bin(&mut buf, auth.as_bytes()).map_err(encode_err)?;
        }
        rmp::encode::write_str(&mut buf, "sig").map_err(encode_err)?;
        rmp::encode::write_bin(&mut buf, &self.sig).map_err(encode_err)?;
        rmp::encode::write_str(&mut buf, "txn").map_err(encode_err)?;
        buf.extend(txn);
        Ok(buf)
    }

    pub fn id(&self) -> Result<String> {
        self.txn.id()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a payment of `amount_algos` whole ALGO, scaled to microAlgos.
pub fn build_payment_txn<C: AlgodApi + ?Sized>(
    client: &C,
    sender: Address,
    receiver: Address,
    amount_algos: f64,
    note: Option<&str>,
) -> Result<Transaction> {
    let params = client
        .suggested_params()
        .context("Failed to fetch suggested params")?;
    let amount = MicroAlgos::from_algos(amount_algos)?;
    Transaction::payment(&params, sender, receiver, amount, note)
}

/// Build an asset transfer of `amount` base units of `asset_id`.
pub fn build_asset_transfer_txn<C: AlgodApi + ?Sized>(
    client: &C,
    sender: Address,
    receiver: Address,
    asset_id: u64,
    amount: u64,
    note: Option<&str>,
) -> Result<Transaction> {
    let params = client
        .suggested_params()
        .context("Failed to fetch suggested params")?;
    Transaction::asset_transfer(&params, sender, receiver, asset_id, amount, note)
}

/// Compute the group id over `txns`.
///
/// # Errors
/// Empty batch, more than [`MAX_GROUP_SIZE`] members, or a member that
/// already carries a group id.
pub fn compute_group_id(txns: &[Transaction]) -> Result<[u8; 32]> {
    if txns.is_empty() {
        bail!("Cannot group an empty batch");
    }
    if txns.len() > MAX_GROUP_SIZE {
        bail!(
            "A group holds at most {} transactions, got {}",
            MAX_GROUP_SIZE,
            txns.len()
        );
    }

    let mut ids = Vec::with_capacity(txns.len());
    for txn in txns {
        if txn.group.is_some() {
            bail!("Transaction {} is already part of a group", txn.id()?);
        }
        ids.push(txn.raw_id()?);
    }

    let mut buf = GROUP_PREFIX.to_vec();
    rmp::encode::write_map_len(&mut buf, 1).map_err(encode_err)?;
    rmp::encode::write_str(&mut buf, "txlist").map_err(encode_err)?;
    rmp::encode::write_array_len(&mut buf, ids.len() as u32).map_err(encode_err)?;
    for id in &ids {
        rmp::encode::write_bin(&mut buf, id).map_err(encode_err)?;
    }
    Ok(sha512_256(&buf))
}

/// Assign one shared group id to every transaction in the batch.
///
/// Fees are left as built; when the per-byte fee is non-zero use
/// [`group_with_fees`] so the added group id is paid for.
pub fn group_and_assign_id(mut txns: Vec<Transaction>) -> Result<Vec<Transaction>> {
    let gid = compute_group_id(&txns)?;
    for txn in &mut txns {
        txn.group = Some(gid);
    }
    Ok(txns)
}

/// Re-price every transaction for the group id, then group them.
pub fn group_with_fees(
    mut txns: Vec<Transaction>,
    params: &SuggestedParams,
) -> Result<Vec<Transaction>> {
    for txn in &mut txns {
        txn.reprice_for_group(params)?;
    }
    group_and_assign_id(txns)
}

/// Sign `txn` with `account`.
///
/// When the account is not the sender the signer is recorded as the
/// authorising address.
pub fn sign_transaction(txn: Transaction, account: &Account) -> Result<SignedTransaction> {
    let sig = account.sign(&txn.bytes_to_sign()?);
    let auth_addr = (account.address() != txn.sender).then(|| account.address());
    Ok(SignedTransaction {
        txn,
        sig,
        auth_addr,
    })
}

/// Submit one signed transaction and return the id the node reports.
pub fn broadcast_transaction<C: AlgodApi + ?Sized>(
    client: &C,
    signed: &SignedTransaction,
) -> Result<String> {
    let txid = client
        .send_raw_transaction(&signed.encode()?)
        .context("Failed to broadcast transaction")?;
    debug!("broadcast {}", txid);
    Ok(txid)
}

/// Submit a signed group in one request.
pub fn broadcast_group<C: AlgodApi + ?Sized>(
    client: &C,
    signed: &[SignedTransaction],
) -> Result<String> {
    let mut blob = Vec::new();
    for stx in signed {
        blob.extend(stx.encode()?);
    }
    client
        .send_raw_transaction(&blob)
        .context("Failed to broadcast transaction group")
}

/// Build, sign and broadcast a payment of `amount_algos` from `account`.
pub fn send_payment<C: AlgodApi + ?Sized>(
    client: &C,
    account: &Account,
    receiver: Address,
    amount_algos: f64,
    note: Option<&str>,
) -> Result<String> {
    let txn = build_payment_txn(client, account.address(), receiver, amount_algos, note)?;
    let signed = sign_transaction(txn, account)?;
    broadcast_transaction(client, &signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_params, MockAlgod, GENESIS_HASH, GENESIS_ID};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn sender() -> Account {
        Account::from_seed(&[1u8; 32])
    }

    fn receiver() -> Address {
        Account::from_seed(&[2u8; 32]).address()
    }

    /// Position of a msgpack fixstr key inside an encoding.
    fn key_pos(buf: &[u8], key: &str) -> Option<usize> {
        let mut needle = vec![0xa0 | key.len() as u8];
        needle.extend_from_slice(key.as_bytes());
        buf.windows(needle.len()).position(|w| w == needle.as_slice())
    }

    #[test]
    fn payment_amount_is_scaled_to_microalgos() {
        let node = MockAlgod::new();
        let txn = build_payment_txn(
            &node,
            sender().address(),
            receiver(),
            123456.0,
            Some("Hello"),
        )
        .unwrap();

        assert_eq!(txn.sender, sender().address());
        assert_eq!(txn.receiver(), receiver());
        assert_eq!(
            txn.kind,
            TxKind::Payment {
                receiver: receiver(),
                amount: MicroAlgos(123456 * 1_000_000),
            }
        );
        assert_eq!(txn.note, b"Hello");
    }

    #[test]
    fn payment_takes_header_from_suggested_params() {
        let node = MockAlgod::new();
        let txn = build_payment_txn(&node, sender().address(), receiver(), 1.0, None).unwrap();

        assert_eq!(txn.fee, 1000);
        assert_eq!(txn.first_valid, 1);
        assert_eq!(txn.last_valid, 1000);
        assert_eq!(txn.genesis_id, GENESIS_ID);
        assert_eq!(txn.genesis_hash, GENESIS_HASH);
        assert!(txn.note.is_empty());
        assert_eq!(txn.group, None);
    }

    #[test]
    fn per_byte_fee_wins_over_minimum_when_larger() {
        let mut params = test_params();
        params.fee_per_byte = 10;
        let txn = Transaction::payment(
            &params,
            sender().address(),
            receiver(),
            MicroAlgos(1),
            None,
        )
        .unwrap();
        assert!(txn.fee > params.min_fee, "fee {} should exceed minimum", txn.fee);
        assert_eq!(txn.fee % 10, 0);
    }

    #[test]
    fn negative_payment_is_rejected() {
        let node = MockAlgod::new();
        assert!(build_payment_txn(&node, sender().address(), receiver(), -5.0, None).is_err());
    }

    #[test]
    fn asset_transfer_keeps_asset_id_and_unscaled_amount() {
        let node = MockAlgod::new();
        let txn = build_asset_transfer_txn(
            &node,
            sender().address(),
            receiver(),
            1234,
            50,
            None,
        )
        .unwrap();

        assert_eq!(txn.sender, sender().address());
        assert_eq!(txn.receiver(), receiver());
        assert_eq!(txn.type_tag(), "axfer");
        assert_eq!(
            txn.kind,
            TxKind::AssetTransfer {
                receiver: receiver(),
                asset_id: 1234,
                amount: 50,
            }
        );
    }

    #[test]
    fn encoding_sorts_keys_and_omits_zero_fields() {
        let txn = Transaction::payment(
            &test_params(),
            sender().address(),
            receiver(),
            MicroAlgos(5),
            None,
        )
        .unwrap();
        let buf = txn.encode().unwrap();

        // amt fee fv gen gh lv rcv snd type: nine entries, no note or grp.
        assert_eq!(buf[0], 0x80 | 9);
        assert_eq!(key_pos(&buf, "note"), None);
        assert_eq!(key_pos(&buf, "grp"), None);

        let order: Vec<usize> = ["amt", "fee", "fv", "gen", "gh", "lv", "rcv", "snd", "type"]
            .iter()
            .map(|k| key_pos(&buf, k).unwrap_or_else(|| panic!("missing key {k}")))
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "keys out of order: {order:?}");
    }

    #[test]
    fn zero_amount_payment_omits_amt() {
        let txn = Transaction::payment(
            &test_params(),
            sender().address(),
            receiver(),
            MicroAlgos::ZERO,
            None,
        )
        .unwrap();
        let buf = txn.encode().unwrap();
        assert_eq!(key_pos(&buf, "amt"), None);
        assert_eq!(buf[0], 0x80 | 8);
    }

    #[test]
    fn asset_transfer_encodes_asset_fields() {
        let txn = Transaction::asset_transfer(
            &test_params(),
            sender().address(),
            receiver(),
            31566704,
            7,
            Some("usdc"),
        )
        .unwrap();
        let buf = txn.encode().unwrap();
        for key in ["aamt", "arcv", "xaid", "note"] {
            assert!(key_pos(&buf, key).is_some(), "missing {key}");
        }
        assert_eq!(key_pos(&buf, "rcv"), None);
        assert!(key_pos(&buf, "aamt") < key_pos(&buf, "arcv"));
        assert!(key_pos(&buf, "type") < key_pos(&buf, "xaid"));
    }

    #[test]
    fn transaction_id_is_52_char_base32_and_tracks_content() {
        let params = test_params();
        let a = Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(1), None)
            .unwrap();
        let b = Transaction::payment(
            &params,
            sender().address(),
            receiver(),
            MicroAlgos(1),
            Some("x"),
        )
        .unwrap();

        let id = a.id().unwrap();
        assert_eq!(id.len(), 52);
        assert_eq!(id, a.clone().id().unwrap());
        assert_ne!(id, b.id().unwrap());
    }

    #[test]
    fn group_id_is_shared_across_batch() {
        let params = test_params();
        let txns: Vec<Transaction> = (1..=3)
            .map(|i| {
                Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(i), None)
                    .unwrap()
            })
            .collect();
        let before: Vec<String> = txns.iter().map(|t| t.id().unwrap()).collect();

        let grouped = group_and_assign_id(txns).unwrap();
        assert_eq!(grouped.len(), 3);
        let gid = grouped[0].group.expect("group must be set");
        assert!(grouped.iter().all(|t| t.group == Some(gid)));

        // Grouping changes every member's id.
        for (t, old) in grouped.iter().zip(&before) {
            assert_ne!(&t.id().unwrap(), old);
        }
    }

    #[test]
    fn group_id_depends_on_members() {
        let params = test_params();
        let one =
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(1), None)
                .unwrap();
        let two =
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(2), None)
                .unwrap();

        let a = compute_group_id(&[one.clone(), two.clone()]).unwrap();
        let b = compute_group_id(&[two, one]).unwrap();
        assert_ne!(a, b, "order is part of the group id");
    }

    #[test]
    fn group_size_is_bounded() {
        let params = test_params();
        let txn =
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(1), None)
                .unwrap();

        assert!(group_and_assign_id(Vec::new()).is_err());
        assert!(group_and_assign_id(vec![txn.clone(); MAX_GROUP_SIZE + 1]).is_err());
        assert!(group_and_assign_id(vec![txn; MAX_GROUP_SIZE]).is_ok());
    }

    #[test]
    fn regrouping_is_rejected() {
        let params = test_params();
        let txn =
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(1), None)
                .unwrap();
        let grouped = group_and_assign_id(vec![txn]).unwrap();
        assert!(group_and_assign_id(grouped).is_err());
    }

    #[test]
    fn signature_covers_prefixed_encoding() {
        let account = sender();
        let txn = Transaction::payment(
            &test_params(),
            account.address(),
            receiver(),
            MicroAlgos(10),
            None,
        )
        .unwrap();
        let signed = sign_transaction(txn.clone(), &account).unwrap();

        assert_eq!(signed.auth_addr, None);
        let vk = VerifyingKey::from_bytes(account.address().as_bytes()).unwrap();
        vk.verify(&txn.bytes_to_sign().unwrap(), &Signature::from_bytes(&signed.sig))
            .expect("signature must verify");

        let buf = signed.encode().unwrap();
        assert_eq!(buf[0], 0x80 | 2);
        assert!(buf.ends_with(&txn.encode().unwrap()));
    }

    #[test]
    fn signing_for_another_sender_records_authorizer() {
        let signer = sender();
        let txn = Transaction::payment(&test_params(), receiver(), signer.address(), MicroAlgos(1), None)
            .unwrap();
        let signed = sign_transaction(txn, &signer).unwrap();

        assert_eq!(signed.auth_addr, Some(signer.address()));
        let buf = signed.encode().unwrap();
        assert_eq!(buf[0], 0x80 | 3);
        assert!(key_pos(&buf, "sgnr") < key_pos(&buf, "sig"));
    }

    #[test]
    fn broadcast_forwards_signed_bytes_and_returns_node_id() {
        let node = MockAlgod::new();
        let txn = build_payment_txn(&node, sender().address(), receiver(), 1.0, None).unwrap();
        let signed = sign_transaction(txn, &sender()).unwrap();

        let txid = broadcast_transaction(&node, &signed).unwrap();
        assert_eq!(txid, "TXID0");
        assert_eq!(node.sent(), vec![signed.encode().unwrap()]);
    }

    #[test]
    fn broadcast_group_sends_one_concatenated_blob() {
        let node = MockAlgod::new();
        let params = test_params();
        let txns = group_and_assign_id(vec![
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(1), None)
                .unwrap(),
            Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(2), None)
                .unwrap(),
        ])
        .unwrap();
        let signed: Vec<SignedTransaction> = txns
            .into_iter()
            .map(|t| sign_transaction(t, &sender()).unwrap())
            .collect();

        broadcast_group(&node, &signed).unwrap();

        let mut expected = signed[0].encode().unwrap();
        expected.extend(signed[1].encode().unwrap());
        assert_eq!(node.sent(), vec![expected]);
    }

    #[test]
    fn send_payment_builds_signs_and_broadcasts() {
        let node = MockAlgod::new();
        let account = sender();

        let txid = send_payment(&node, &account, receiver(), 0.001, Some("Test")).unwrap();
        assert_eq!(txid, "TXID0");

        // ed25519 signatures are deterministic, so rebuilding yields the same bytes.
        let expected = sign_transaction(
            Transaction::payment(
                &test_params(),
                account.address(),
                receiver(),
                MicroAlgos(1000),
                Some("Test"),
            )
            .unwrap(),
            &account,
        )
        .unwrap();
        assert_eq!(node.sent(), vec![expected.encode().unwrap()]);
    }

    #[test]
    fn failed_broadcast_surfaces_node_message() {
        let node = MockAlgod::new();
        node.fail_send_at(0);
        let err = send_payment(&node, &sender(), receiver(), 1.0, None).unwrap_err();
        assert!(format!("{err:#}").contains("overspend"));
    }

    #[test]
    fn grouped_fee_covers_the_group_id() {
        let mut params = test_params();
        params.fee_per_byte = 10;
        let node = MockAlgod::new().with_params(params.clone());
        let txns = vec![
            build_payment_txn(&node, sender().address(), receiver(), 1.0, None).unwrap(),
            build_payment_txn(&node, sender().address(), receiver(), 2.0, None).unwrap(),
        ];

        let grouped = group_with_fees(txns, &params).unwrap();
        assert_eq!(grouped[0].group, grouped[1].group);
        for txn in grouped {
            let signed = sign_transaction(txn, &sender()).unwrap();
            let len = signed.encode().unwrap().len() as u64;
            assert!(
                signed.txn.fee >= 10 * len,
                "fee {} below {} for {} bytes",
                signed.txn.fee,
                10 * len,
                len
            );
        }
    }

    #[test]
    fn ungrouped_fee_covers_its_own_fee_field() {
        let mut params = test_params();
        params.fee_per_byte = 10;
        let txn = Transaction::payment(&params, sender().address(), receiver(), MicroAlgos(5), None)
            .unwrap();
        let signed = sign_transaction(txn, &sender()).unwrap();
        assert!(signed.txn.fee >= 10 * signed.encode().unwrap().len() as u64);
    }

    #[test]
    fn oversized_note_is_rejected_before_sending() {
        let node = MockAlgod::new();
        let long = "x".repeat(MAX_NOTE_LEN + 1);
        let err = send_payment(&node, &sender(), receiver(), 1.0, Some(&long)).unwrap_err();
        assert!(err.to_string().contains("at most 1024"), "{err}");
        assert!(node.sent().is_empty());

        let exact = "x".repeat(MAX_NOTE_LEN);
        let txn = build_payment_txn(&node, sender().address(), receiver(), 1.0, Some(&exact))
            .unwrap();
        assert_eq!(txn.note.len(), MAX_NOTE_LEN);
    }
}
