use thiserror::Error;

/// One error type for every verifier diagnostic. Every variant carries the
/// on-disk fragment address of the offending page so callers can locate it
/// without re-parsing the message text.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("file is too large to verify")]
    FileTooLarge,

    #[error("page at addr {addr} has non-zero lsn header fields")]
    NonZeroLsn { addr: u32 },

    #[error("page at addr {addr} has non-zero unused header fields")]
    NonZeroUnused { addr: u32 },

    #[error("page at addr {addr} has an invalid type of {found}")]
    InvalidPageType { addr: u32, found: u8 },

    #[error("page at addr {addr} has incorrect tree level of {found}")]
    BadPageLevel { addr: u32, found: i64 },

    #[error(
        "page at addr {addr} has a tree level of {found} where the expected level was {expected}"
    )]
    LevelMismatch { addr: u32, found: u32, expected: u32 },

    #[error(
        "page at addr {addr} has a record count of {found} where the expected record count was {expected}"
    )]
    RecordCountMismatch { addr: u32, found: u64, expected: u64 },

    #[error(
        "page at addr {addr} has a starting record of {found} where the expected starting record was {expected}"
    )]
    StartRecnoMismatch { addr: u32, found: u64, expected: u64 },

    #[error("page at addr {addr} has a starting record of {found}, which should never be non-zero")]
    NonZeroStartRecno { addr: u32, found: u64 },

    #[error(
        "illegal item and page type combination (item {item_num} on page at addr {addr} is a {item_type} item on a {page_type} page)"
    )]
    IllegalItemPageCombo {
        item_num: u32,
        addr: u32,
        item_type: &'static str,
        page_type: &'static str,
    },

    #[error("item {item_num} on page at addr {addr} has an illegal type of {found}")]
    IllegalItemType { item_num: u32, addr: u32, found: u8 },

    #[error("item {item_num} on page at addr {addr} has an incorrect length")]
    IllegalItemLength { item_num: u32, addr: u32 },

    #[error("item {item_num} on page at addr {addr} extends past the end of the page")]
    ExtendsPastEndOfPage { item_num: u32, addr: u32 },

    #[error("off-page item {item_num} on page at addr {addr} references non-existent file pages")]
    ReferencesPastEndOfFile { item_num: u32, addr: u32 },

    #[error(
        "overflow page reference in item {item_num} on page at addr {addr} does not match the data size on the overflow page"
    )]
    OverflowSizeMismatch { item_num: u32, addr: u32 },

    #[error("item {a} and item {b} on page at addr {addr} are incorrectly sorted")]
    ItemsOutOfOrder { a: u32, b: u32, addr: u32 },

    #[error("the first key on page at addr {addr} sorts before its reference key on its parent's page")]
    FirstKeyBeforeParent { addr: u32 },

    #[error("the last key on the page at addr {addr} sorts after a parent page's key for the subsequent page")]
    LastKeyAfterParent { addr: u32 },

    #[error("deleted fixed-length entry {entry_num} on page at addr {addr} has non-nul bytes")]
    DeletedEntryNotNul { entry_num: u32, addr: u32 },

    #[error("fixed-length entry {entry_num} on page at addr {addr} has a repeat count of 0")]
    ZeroRepeatCount { entry_num: u32, addr: u32 },

    #[error("page at addr {addr} has entries but a configured fixed-length record size of 0")]
    ZeroFixedLen { addr: u32 },

    #[error(
        "fixed-length entries {a} and {b} on page at addr {addr} are identical and should have been compressed"
    )]
    MissedRccCompression { a: u32, b: u32, addr: u32 },

    #[error("overflow page at addr {addr} has no data")]
    EmptyOverflowPage { addr: u32 },

    #[error("overflow page at addr {addr} has non-zero trailing bytes")]
    OverflowTrailingBytes { addr: u32 },

    #[error("magic number {found:#x}, expected {expected:#x}")]
    BadMagic { found: u32, expected: u32 },

    #[error("major version {found}, expected {expected}")]
    BadMajorVersion { found: u16, expected: u16 },

    #[error("minor version {found}, expected {expected}")]
    BadMinorVersion { found: u16, expected: u16 },

    #[error("minimum internal page size {found}, expected {expected}")]
    BadIntlMin { found: u32, expected: u32 },

    #[error("maximum internal page size {found}, expected {expected}")]
    BadIntlMax { found: u32, expected: u32 },

    #[error("minimum leaf page size {found}, expected {expected}")]
    BadLeafMin { found: u32, expected: u32 },

    #[error("maximum leaf page size {found}, expected {expected}")]
    BadLeafMax { found: u32, expected: u32 },

    #[error("recno offset {found}, expected 0")]
    BadRecnoOffset { found: u64 },

    #[error("unexpected flags found in description record")]
    BadDescFlags,

    #[error("repeat counts configured but no fixed length record size specified")]
    RepeatWithoutFixedLen,

    #[error("unexpected values found in description record's unused fields")]
    DescUnusedNotClear,

    #[error("page fragment at addr {addr} already verified")]
    FragmentAlreadyVerified { addr: u32 },

    #[error("fragment {0} was never verified")]
    FragmentNeverVerified(u32),

    #[error("fragments {0} to {1} were never verified")]
    FragmentRangeNeverVerified(u32, u32),

    #[error("verify restart observed where only the root load may restart")]
    UnexpectedRestart,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Slice(#[from] std::array::TryFromSliceError),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
