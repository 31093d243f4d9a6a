use thiserror::Error;

/// Errors raised while constructing or combining group elements
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("crypto: value {value} is out of bounds for the modulus {modulus}")]
    OutOfBounds { value: String, modulus: &'static str },

    #[error("crypto: zero is not a valid element here")]
    ZeroElement,

    #[error("crypto: {0} has no multiplicative inverse")]
    NoInverse(String),

    #[error("crypto: malformed hexadecimal element '{0}'")]
    MalformedHex(String),
}

/// Errors raised during exponential ElGamal encryption
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElGamalError {
    #[error("crypto: refusing to encrypt with a zero nonce")]
    ZeroNonce,

    #[error("crypto: elgamal: {0}")]
    Group(#[from] GroupError),
}

/// Discrete log recovery errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscreteLogError {
    #[error("crypto: discrete log not found within the first {max} exponents")]
    ExponentNotFound { max: u64 },
}

/// Errors of the auxiliary (backup transport) encryption scheme
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuxiliaryError {
    #[error("crypto: auxiliary key is malformed")]
    MalformedKey,

    #[error("crypto: auxiliary message is malformed")]
    MalformedMessage,

    #[error("crypto: auxiliary encryption failed")]
    EncryptionFailed,

    #[error("crypto: auxiliary decryption failed")]
    DecryptionFailed,
}

/// Ballot construction and validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BallotError {
    #[error("crypto: contest {contest} has no selections made")]
    NullVote { contest: String },

    #[error("crypto: contest {contest} is under voted: {votes} of {allowed} votes cast")]
    UnderVote {
        contest: String,
        votes: u64,
        allowed: u64,
    },

    #[error("crypto: contest {contest} is over voted: {votes} of {allowed} votes cast")]
    OverVote {
        contest: String,
        votes: u64,
        allowed: u64,
    },

    #[error("crypto: selection {selection} has invalid value {value}")]
    InvalidSelectionValue { selection: String, value: u64 },

    #[error("crypto: contest {0} does not exist in the manifest")]
    UnknownContest(String),

    #[error("crypto: selection {selection} does not exist in contest {contest}")]
    UnknownSelection { contest: String, selection: String },

    #[error("crypto: selection {selection} appears more than once in contest {contest}")]
    DuplicateSelection { contest: String, selection: String },

    #[error("crypto: ballot {0} carries no nonce")]
    MissingNonce(String),

    #[error("crypto: ballot {ballot} does not match the manifest")]
    StyleMismatch { ballot: String },

    #[error("crypto: ballot encryption failed: {0}")]
    Encryption(#[from] ElGamalError),

    #[error("crypto: ballot decryption failed: {0}")]
    Decryption(#[from] DiscreteLogError),
}

/// Secret sharing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolynomialError {
    #[error("crypto: not enough coordinates: need {needed}, found {found}")]
    InsufficientCoordinates { needed: usize, found: usize },

    #[error("crypto: coordinate {0} was provided more than once")]
    DuplicateCoordinate(u64),

    #[error("crypto: coordinate zero would reveal the secret")]
    ZeroCoordinate,
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("crypto: unknown prime option '{0}'")]
    UnknownPrimeOption(String),

    #[error("crypto: unknown pow radix style '{0}'")]
    UnknownPowRadixStyle(String),

    #[error("crypto: invalid discrete log bound '{0}'")]
    InvalidDiscreteLogBound(String),
}
