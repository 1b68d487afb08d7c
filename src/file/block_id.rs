use std::fmt;

/// Address of one fixed-size block: a file name and a block number.
///
/// Equality and hashing are by value, never by identity; this is the key
/// used in every lookup map, so two separately constructed ids with equal
/// fields must be indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: String,
    number: u64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: u64) -> Self {
        BlockId {
            file_name: file_name.into(),
            number,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}
