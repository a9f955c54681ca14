//! Precheck and receipt status codes returned by the network.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! status_codes {
    ($($(#[$doc:meta])* $name:ident = $code:literal => $text:literal,)+) => {
        /// An application level outcome code.
        ///
        /// Codes not known to this client are preserved as [`Status::Unrecognized`].
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum Status {
            $($(#[$doc])* $name,)+
            /// A numeric code this client does not know.
            Unrecognized(i32),
        }

        impl Status {
            /// Every known status.
            pub const KNOWN: &'static [Status] = &[$(Status::$name,)+];

            /// The numeric wire value.
            pub const fn code(self) -> i32 {
                match self {
                    $(Status::$name => $code,)+
                    Status::Unrecognized(code) => code,
                }
            }

            /// Map a numeric wire value.
            pub const fn from_code(code: i32) -> Self {
                match code {
                    $($code => Status::$name,)+
                    other => Status::Unrecognized(other),
                }
            }

            /// The canonical upper snake case name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Status::$name => $text,)+
                    Status::Unrecognized(_) => "UNRECOGNIZED",
                }
            }
        }
    };
}

status_codes! {
    /// The transaction passed precheck.
    Ok = 0 => "OK",
    InvalidTransaction = 1 => "INVALID_TRANSACTION",
    PayerAccountNotFound = 2 => "PAYER_ACCOUNT_NOT_FOUND",
    InvalidNodeAccount = 3 => "INVALID_NODE_ACCOUNT",
    /// The valid start plus valid duration is in the past.
    TransactionExpired = 4 => "TRANSACTION_EXPIRED",
    InvalidTransactionStart = 5 => "INVALID_TRANSACTION_START",
    InvalidTransactionDuration = 6 => "INVALID_TRANSACTION_DURATION",
    InvalidSignature = 7 => "INVALID_SIGNATURE",
    MemoTooLong = 8 => "MEMO_TOO_LONG",
    InsufficientTxFee = 9 => "INSUFFICIENT_TX_FEE",
    InsufficientPayerBalance = 10 => "INSUFFICIENT_PAYER_BALANCE",
    DuplicateTransaction = 11 => "DUPLICATE_TRANSACTION",
    /// The node is too busy to accept the request.
    Busy = 12 => "BUSY",
    NotSupported = 13 => "NOT_SUPPORTED",
    InvalidFileId = 14 => "INVALID_FILE_ID",
    InvalidAccountId = 15 => "INVALID_ACCOUNT_ID",
    InvalidContractId = 16 => "INVALID_CONTRACT_ID",
    InvalidTransactionId = 17 => "INVALID_TRANSACTION_ID",
    /// No receipt exists yet for the transaction id.
    ReceiptNotFound = 18 => "RECEIPT_NOT_FOUND",
    RecordNotFound = 19 => "RECORD_NOT_FOUND",
    InvalidSolidityId = 20 => "INVALID_SOLIDITY_ID",
    /// The outcome has not reached consensus yet.
    Unknown = 21 => "UNKNOWN",
    /// The transaction reached consensus and executed.
    Success = 22 => "SUCCESS",
    FailInvalid = 23 => "FAIL_INVALID",
    FailFee = 24 => "FAIL_FEE",
    FailBalance = 25 => "FAIL_BALANCE",
    KeyRequired = 26 => "KEY_REQUIRED",
    BadEncoding = 27 => "BAD_ENCODING",
    InsufficientAccountBalance = 28 => "INSUFFICIENT_ACCOUNT_BALANCE",
    TransactionOversize = 63 => "TRANSACTION_OVERSIZE",
    TransactionTooManyLayers = 64 => "TRANSACTION_TOO_MANY_LAYERS",
    ContractDeleted = 65 => "CONTRACT_DELETED",
    /// The node is not yet participating in consensus.
    PlatformNotActive = 66 => "PLATFORM_NOT_ACTIVE",
    KeyPrefixMismatch = 67 => "KEY_PREFIX_MISMATCH",
    /// The node accepted the request but failed to create a platform transaction.
    PlatformTransactionNotCreated = 68 => "PLATFORM_TRANSACTION_NOT_CREATED",
    InvalidRenewalPeriod = 69 => "INVALID_RENEWAL_PERIOD",
    InvalidPayerAccountId = 70 => "INVALID_PAYER_ACCOUNT_ID",
    AccountDeleted = 71 => "ACCOUNT_DELETED",
    FileDeleted = 72 => "FILE_DELETED",
    InvalidTopicId = 150 => "INVALID_TOPIC_ID",
    InvalidAdminKey = 155 => "INVALID_ADMIN_KEY",
    InvalidSubmitKey = 156 => "INVALID_SUBMIT_KEY",
    Unauthorized = 157 => "UNAUTHORIZED",
    InvalidTopicMessage = 158 => "INVALID_TOPIC_MESSAGE",
    TopicExpired = 162 => "TOPIC_EXPIRED",
    InvalidChunkNumber = 163 => "INVALID_CHUNK_NUMBER",
    InvalidChunkTransactionId = 164 => "INVALID_CHUNK_TRANSACTION_ID",
    /// The network is shedding load at consensus.
    ThrottledAtConsensus = 366 => "THROTTLED_AT_CONSENSUS",
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
            known => f.write_str(known.as_str()),
        }
    }
}
