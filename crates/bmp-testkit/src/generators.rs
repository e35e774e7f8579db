//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bmp_core::{Address, Message, MessageId, Recipient, Wallet, METADATA_NAME};
use bmp_ledger::LedgerEntry;

/// Generate a wallet from random seeds.
pub fn wallet() -> impl Strategy<Value = Wallet> {
    (any::<[u8; 32]>(), any::<[u8; 32]>())
        .prop_map(|(signing, encryption)| Wallet::from_seeds("prop", &signing, encryption))
}

/// Generate payload bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a non-empty payload of at most `max_len`.
pub fn non_empty_payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Generate a usable chunk size.
pub fn chunk_size() -> impl Strategy<Value = usize> {
    1usize..=4096
}

/// Generate printable message text.
pub fn text() -> impl Strategy<Value = String> {
    "\\PC{0,200}".prop_map(String::from)
}

/// Generate a plausible Unix timestamp with a fractional part.
pub fn timestamp() -> impl Strategy<Value = f64> {
    (1_500_000_000u32..2_000_000_000u32, 0u32..1000)
        .prop_map(|(secs, millis)| f64::from(secs) + f64::from(millis) / 1000.0)
}

fn hex_id() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}".prop_map(String::from)
}

/// Generate any kind of ledger entry.
pub fn ledger_entry() -> impl Strategy<Value = LedgerEntry> {
    prop_oneof![
        (hex_id(), hex_id(), hex_id(), timestamp()).prop_map(|(id, sender, recipient, ts)| {
            LedgerEntry::Message {
                id: MessageId::new(id),
                sender: Address::new(sender),
                recipient: Recipient::Direct(recipient),
                timestamp: ts,
            }
        }),
        (hex_id(), hex_id(), timestamp()).prop_map(|(id, sender, ts)| LedgerEntry::Received {
            id: MessageId::new(id),
            sender: Address::new(sender),
            timestamp: ts,
        }),
        (hex_id(), hex_id(), timestamp()).prop_map(|(id, sender, ts)| LedgerEntry::Broadcast {
            id: MessageId::new(id),
            sender: Address::new(sender),
            timestamp: ts,
        }),
        "[ -~]{0,40}".prop_map(|message| LedgerEntry::System { message }),
    ]
}

/// Parameters for generating a signed text message.
#[derive(Debug, Clone)]
pub struct MessageParams {
    pub wallet: Wallet,
    pub recipient: Recipient,
    pub content: Vec<u8>,
    pub timestamp: f64,
}

impl Arbitrary for MessageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            wallet(),
            prop_oneof![
                hex_id().prop_map(Recipient::Direct),
                Just(Recipient::Broadcast)
            ],
            payload(512),
            timestamp(),
        )
            .prop_map(|(wallet, recipient, content, timestamp)| MessageParams {
                wallet,
                recipient,
                content,
                timestamp,
            })
            .boxed()
    }
}

/// Build and sign a text message from parameters.
pub fn message_from_params(params: &MessageParams) -> Message {
    let mut message = Message::text(
        params.wallet.address().clone(),
        params.recipient.clone(),
        params.content.clone(),
    )
    .with_metadata(METADATA_NAME, params.wallet.name());
    message.timestamp = params.timestamp;
    message
        .sign(params.wallet.signing_keypair())
        .unwrap_or_else(|e| panic!("signing generated message: {}", e));
    message
}
