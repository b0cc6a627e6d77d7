// This file implements the transaction model - signed transfers between identities
// Every transaction carries its own signature over a canonical, key-sorted encoding
// of all its other fields, so any mutation after signing is detectable

use crate::core::signature::{sender_matches_key, verify_signature, Signature};
use crate::error::{BlockchainError, Result};
use crate::utils::canonical_json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

// The top-level fields every transaction record must carry, in the order I check them
const REQUIRED_FIELDS: [&str; 7] = [
    "type",
    "sender",
    "payload",
    "nonce",
    "chain",
    "gas",
    "signature",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum TransactionType {
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(BlockchainError::InvalidPayload(format!(
                "unsupported transaction type: {other}"
            ))),
        }
    }
}

// This is what a transfer moves: an amount to a recipient identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TransferPayload {
    recipient: String,
    amount: u64,
}

impl TransferPayload {
    pub fn new(recipient: &str, amount: u64) -> TransferPayload {
        TransferPayload {
            recipient: recipient.to_string(),
            amount,
        }
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

/// Payload keyed by transaction type. New kinds of transaction get a new variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Payload {
    Transfer(TransferPayload),
}

impl Payload {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Payload::Transfer(_) => TransactionType::Transfer,
        }
    }

    fn to_record(&self) -> Value {
        match self {
            Payload::Transfer(transfer) => json!({
                "recipient": transfer.recipient,
                "amount": transfer.amount,
            }),
        }
    }

    fn from_record(transaction_type: TransactionType, record: &Value) -> Result<Payload> {
        match transaction_type {
            TransactionType::Transfer => {
                let map = record.as_object().ok_or_else(|| {
                    BlockchainError::InvalidPayload("payload must be a record".to_string())
                })?;
                let recipient = map
                    .get("recipient")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        BlockchainError::InvalidPayload("missing or non-text recipient".to_string())
                    })?;
                let amount = map.get("amount").and_then(Value::as_u64).ok_or_else(|| {
                    BlockchainError::InvalidPayload(
                        "amount must be a non-negative integer".to_string(),
                    )
                })?;
                Ok(Payload::Transfer(TransferPayload::new(recipient, amount)))
            }
        }
    }
}

/// Chain identifier and protocol version, so a transaction signed for one
/// network cannot be replayed on another
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct ChainId {
    chain_id: u64,
    version: u32,
}

impl ChainId {
    pub fn new(chain_id: u64, version: u32) -> ChainId {
        ChainId { chain_id, version }
    }

    pub fn get_chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    fn to_record(self) -> Value {
        json!({
            "chain_id": self.chain_id,
            "version": self.version,
        })
    }

    fn from_record(record: &Value) -> Result<ChainId> {
        let chain_id = record.get("chain_id").and_then(Value::as_u64);
        let version = record
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok());
        match (chain_id, version) {
            (Some(chain_id), Some(version)) => Ok(ChainId::new(chain_id, version)),
            (None, _) => Err(BlockchainError::MissingField("chain.chain_id".to_string())),
            (_, None) => Err(BlockchainError::MissingField("chain.version".to_string())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Gas {
    tip: u64,
    max_fee: u64,
    limit: u64,
}

impl Gas {
    pub fn new(tip: u64, max_fee: u64, limit: u64) -> Gas {
        Gas {
            tip,
            max_fee,
            limit,
        }
    }

    pub fn get_tip(&self) -> u64 {
        self.tip
    }

    pub fn get_max_fee(&self) -> u64 {
        self.max_fee
    }

    pub fn get_limit(&self) -> u64 {
        self.limit
    }

    fn to_record(self) -> Value {
        json!({
            "tip": self.tip,
            "max_fee": self.max_fee,
            "limit": self.limit,
        })
    }

    fn from_record(record: &Value) -> Result<Gas> {
        let map = record
            .as_object()
            .ok_or_else(|| BlockchainError::InvalidGas("gas must be a record".to_string()))?;
        let amount = |name: &str| -> Result<u64> {
            map.get(name).and_then(Value::as_u64).ok_or_else(|| {
                BlockchainError::InvalidGas(format!("{name} must be a non-negative integer"))
            })
        };
        Ok(Gas::new(amount("tip")?, amount("max_fee")?, amount("limit")?))
    }
}

/// A transaction that has not been signed yet. Signers take its canonical
/// bytes, sign them, and turn it into a `Transaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    sender: String,
    payload: Payload,
    nonce: u64,
    chain: ChainId,
    gas: Gas,
}

impl UnsignedTransaction {
    pub fn new(sender: &str, payload: Payload, nonce: u64, chain: ChainId, gas: Gas) -> Self {
        UnsignedTransaction {
            sender: sender.to_string(),
            payload,
            nonce,
            chain,
            gas,
        }
    }

    pub fn transfer(
        sender: &str,
        recipient: &str,
        amount: u64,
        nonce: u64,
        chain: ChainId,
        gas: Gas,
    ) -> Self {
        Self::new(
            sender,
            Payload::Transfer(TransferPayload::new(recipient, amount)),
            nonce,
            chain,
            gas,
        )
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json(&Value::Object(body_record(
            &self.sender,
            &self.payload,
            self.nonce,
            self.chain,
            self.gas,
        )))
    }

    pub fn into_signed(self, signature: Signature) -> Result<Transaction> {
        Transaction::new(
            &self.sender,
            self.payload,
            self.nonce,
            self.chain,
            self.gas,
            signature,
        )
    }
}

// The record of every field except the signature
fn body_record(
    sender: &str,
    payload: &Payload,
    nonce: u64,
    chain: ChainId,
    gas: Gas,
) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "type".to_string(),
        json!(payload.transaction_type().as_str()),
    );
    map.insert("sender".to_string(), json!(sender));
    map.insert("payload".to_string(), payload.to_record());
    map.insert("nonce".to_string(), json!(nonce));
    map.insert("chain".to_string(), chain.to_record());
    map.insert("gas".to_string(), gas.to_record());
    map
}

// This is the main transaction structure - immutable once signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    sender: String,     // Identity of the signer (hex public key for wallet-made transactions)
    payload: Payload,   // What the transaction does; also decides its type
    nonce: u64,         // Sender-scoped replay protection counter
    chain: ChainId,     // Which chain and protocol version this was signed for
    gas: Gas,           // Fee parameters
    signature: Signature,
}

impl Transaction {
    pub fn new(
        sender: &str,
        payload: Payload,
        nonce: u64,
        chain: ChainId,
        gas: Gas,
        signature: Signature,
    ) -> Result<Transaction> {
        let transaction = Transaction {
            sender: sender.to_string(),
            payload,
            nonce,
            chain,
            gas,
            signature,
        };
        transaction.validate()?;
        Ok(transaction)
    }

    /// Checks the invariants the type system cannot: a non-empty sender and
    /// recipient, a positive amount, and a signature with all parts present.
    pub fn validate(&self) -> Result<()> {
        if self.sender.is_empty() {
            return Err(BlockchainError::MissingField("sender".to_string()));
        }
        match &self.payload {
            Payload::Transfer(transfer) => {
                if transfer.recipient.is_empty() {
                    return Err(BlockchainError::InvalidPayload(
                        "recipient must not be empty".to_string(),
                    ));
                }
                if transfer.amount == 0 {
                    return Err(BlockchainError::InvalidPayload(
                        "amount must be positive".to_string(),
                    ));
                }
            }
        }
        self.signature.check_shape()
    }

    /// Validates a raw record without keeping the result
    pub fn validate_record(record: &Value) -> Result<()> {
        Self::from_record(record).map(|_| ())
    }

    pub fn verify_signature(&self) -> bool {
        verify_signature(self)
    }

    /// Whether `sender` is the hex public key carried in the signature
    pub fn is_signed_by_sender(&self) -> bool {
        sender_matches_key(self)
    }

    /// Key-sorted encoding of every field except the signature. This is what
    /// gets signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json(&Value::Object(self.body()))
    }

    fn body(&self) -> Map<String, Value> {
        body_record(
            &self.sender,
            &self.payload,
            self.nonce,
            self.chain,
            self.gas,
        )
    }

    pub fn to_record(&self) -> Value {
        let mut map = self.body();
        map.insert("signature".to_string(), self.signature.to_record());
        Value::Object(map)
    }

    pub fn from_record(record: &Value) -> Result<Transaction> {
        let map = record
            .as_object()
            .ok_or_else(|| BlockchainError::MissingField(REQUIRED_FIELDS[0].to_string()))?;

        // I report the first absent field before looking at any contents
        for field in REQUIRED_FIELDS {
            if map.get(field).map_or(true, Value::is_null) {
                return Err(BlockchainError::MissingField(field.to_string()));
            }
        }

        let transaction_type: TransactionType = map["type"]
            .as_str()
            .ok_or_else(|| BlockchainError::InvalidPayload("type must be text".to_string()))?
            .parse()?;
        let sender = map["sender"]
            .as_str()
            .ok_or_else(|| BlockchainError::MissingField("sender".to_string()))?;
        let payload = Payload::from_record(transaction_type, &map["payload"])?;
        let nonce = map["nonce"].as_u64().ok_or_else(|| {
            BlockchainError::InvalidNonce(format!(
                "expected a non-negative integer, got {}",
                map["nonce"]
            ))
        })?;
        let chain = ChainId::from_record(&map["chain"])?;
        let gas = Gas::from_record(&map["gas"])?;
        let signature = Signature::from_record(&map["signature"])?;

        Transaction::new(sender, payload, nonce, chain, gas, signature)
    }

    pub fn get_transaction_type(&self) -> TransactionType {
        self.payload.transaction_type()
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_chain(&self) -> ChainId {
        self.chain
    }

    pub fn get_gas(&self) -> Gas {
        self.gas
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }
}
