//! Spend condition opcodes
//!
//! The integer codes a compiled program returns in its condition list.
//! Wallets and test harnesses match on these values verbatim.

use crate::ir::Node;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOpcode {
    /// Always succeeds, carries arbitrary data
    Remark,
    /// Signature over a message without coin binding
    AggSigUnsafe,
    /// Signature over a message bound to this coin
    AggSigMe,
    /// Create a coin `(51 puzzle_hash amount [memos])`
    CreateCoin,
    /// Leave part of the value as fee
    ReserveFee,
    /// Announce a message under this coin's id
    CreateCoinAnnouncement,
    /// Require a coin announcement in the same spend bundle
    AssertCoinAnnouncement,
    /// Announce a message under this coin's puzzle hash
    CreatePuzzleAnnouncement,
    /// Require a puzzle announcement in the same spend bundle
    AssertPuzzleAnnouncement,
    /// Assert this coin's id
    AssertMyCoinId,
    /// Assert this coin's parent id
    AssertMyParentId,
    /// Assert this coin's puzzle hash
    AssertMyPuzzleHash,
    /// Assert this coin's amount
    AssertMyAmount,
    /// Minimum seconds since the coin was created
    AssertSecondsRelative,
    /// Minimum timestamp
    AssertSecondsAbsolute,
    /// Minimum blocks since the coin was created
    AssertHeightRelative,
    /// Minimum block height
    AssertHeightAbsolute,
    /// Maximum seconds since the coin was created
    AssertBeforeSecondsRelative,
    /// Maximum timestamp
    AssertBeforeSecondsAbsolute,
    /// Maximum blocks since the coin was created
    AssertBeforeHeightRelative,
    /// Maximum block height
    AssertBeforeHeightAbsolute,
}

impl ConditionOpcode {
    /// Every opcode, in code order
    pub const ALL: [ConditionOpcode; 21] = [
        ConditionOpcode::Remark,
        ConditionOpcode::AggSigUnsafe,
        ConditionOpcode::AggSigMe,
        ConditionOpcode::CreateCoin,
        ConditionOpcode::ReserveFee,
        ConditionOpcode::CreateCoinAnnouncement,
        ConditionOpcode::AssertCoinAnnouncement,
        ConditionOpcode::CreatePuzzleAnnouncement,
        ConditionOpcode::AssertPuzzleAnnouncement,
        ConditionOpcode::AssertMyCoinId,
        ConditionOpcode::AssertMyParentId,
        ConditionOpcode::AssertMyPuzzleHash,
        ConditionOpcode::AssertMyAmount,
        ConditionOpcode::AssertSecondsRelative,
        ConditionOpcode::AssertSecondsAbsolute,
        ConditionOpcode::AssertHeightRelative,
        ConditionOpcode::AssertHeightAbsolute,
        ConditionOpcode::AssertBeforeSecondsRelative,
        ConditionOpcode::AssertBeforeSecondsAbsolute,
        ConditionOpcode::AssertBeforeHeightRelative,
        ConditionOpcode::AssertBeforeHeightAbsolute,
    ];

    /// Wire code
    pub const fn code(self) -> u8 {
        match self {
            ConditionOpcode::Remark => 1,
            ConditionOpcode::AggSigUnsafe => 49,
            ConditionOpcode::AggSigMe => 50,
            ConditionOpcode::CreateCoin => 51,
            ConditionOpcode::ReserveFee => 52,
            ConditionOpcode::CreateCoinAnnouncement => 60,
            ConditionOpcode::AssertCoinAnnouncement => 61,
            ConditionOpcode::CreatePuzzleAnnouncement => 62,
            ConditionOpcode::AssertPuzzleAnnouncement => 63,
            ConditionOpcode::AssertMyCoinId => 70,
            ConditionOpcode::AssertMyParentId => 71,
            ConditionOpcode::AssertMyPuzzleHash => 72,
            ConditionOpcode::AssertMyAmount => 73,
            ConditionOpcode::AssertSecondsRelative => 80,
            ConditionOpcode::AssertSecondsAbsolute => 81,
            ConditionOpcode::AssertHeightRelative => 82,
            ConditionOpcode::AssertHeightAbsolute => 83,
            ConditionOpcode::AssertBeforeSecondsRelative => 84,
            ConditionOpcode::AssertBeforeSecondsAbsolute => 85,
            ConditionOpcode::AssertBeforeHeightRelative => 86,
            ConditionOpcode::AssertBeforeHeightAbsolute => 87,
        }
    }

    /// Opcode for a wire code
    pub fn from_code(code: u8) -> Option<ConditionOpcode> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    /// Conventional constant name, e.g. `CREATE_COIN`
    pub const fn name(self) -> &'static str {
        match self {
            ConditionOpcode::Remark => "REMARK",
            ConditionOpcode::AggSigUnsafe => "AGG_SIG_UNSAFE",
            ConditionOpcode::AggSigMe => "AGG_SIG_ME",
            ConditionOpcode::CreateCoin => "CREATE_COIN",
            ConditionOpcode::ReserveFee => "RESERVE_FEE",
            ConditionOpcode::CreateCoinAnnouncement => "CREATE_COIN_ANNOUNCEMENT",
            ConditionOpcode::AssertCoinAnnouncement => "ASSERT_COIN_ANNOUNCEMENT",
            ConditionOpcode::CreatePuzzleAnnouncement => "CREATE_PUZZLE_ANNOUNCEMENT",
            ConditionOpcode::AssertPuzzleAnnouncement => "ASSERT_PUZZLE_ANNOUNCEMENT",
            ConditionOpcode::AssertMyCoinId => "ASSERT_MY_COIN_ID",
            ConditionOpcode::AssertMyParentId => "ASSERT_MY_PARENT_ID",
            ConditionOpcode::AssertMyPuzzleHash => "ASSERT_MY_PUZZLEHASH",
            ConditionOpcode::AssertMyAmount => "ASSERT_MY_AMOUNT",
            ConditionOpcode::AssertSecondsRelative => "ASSERT_SECONDS_RELATIVE",
            ConditionOpcode::AssertSecondsAbsolute => "ASSERT_SECONDS_ABSOLUTE",
            ConditionOpcode::AssertHeightRelative => "ASSERT_HEIGHT_RELATIVE",
            ConditionOpcode::AssertHeightAbsolute => "ASSERT_HEIGHT_ABSOLUTE",
            ConditionOpcode::AssertBeforeSecondsRelative => "ASSERT_BEFORE_SECONDS_RELATIVE",
            ConditionOpcode::AssertBeforeSecondsAbsolute => "ASSERT_BEFORE_SECONDS_ABSOLUTE",
            ConditionOpcode::AssertBeforeHeightRelative => "ASSERT_BEFORE_HEIGHT_RELATIVE",
            ConditionOpcode::AssertBeforeHeightAbsolute => "ASSERT_BEFORE_HEIGHT_ABSOLUTE",
        }
    }

    /// Integer atom carrying the code
    pub fn to_node(self) -> Node {
        Node::int(self.code())
    }
}

impl fmt::Display for ConditionOpcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Opcode of a condition list element such as `(51 ph amount)`
pub fn condition_opcode(condition: &Node) -> Option<ConditionOpcode> {
    let code = condition.first()?.as_int()?;
    let code = u8::try_from(code).ok()?;
    ConditionOpcode::from_code(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ConditionOpcode::AggSigMe.code(), 50);
        assert_eq!(ConditionOpcode::CreateCoin.code(), 51);
        assert_eq!(ConditionOpcode::CreateCoinAnnouncement.code(), 60);
        assert_eq!(ConditionOpcode::AssertBeforeHeightAbsolute.code(), 87);
    }

    #[test]
    fn test_codes_round_trip_and_are_unique() {
        for op in ConditionOpcode::ALL {
            assert_eq!(ConditionOpcode::from_code(op.code()), Some(op));
        }
        let mut codes: Vec<u8> = ConditionOpcode::ALL.iter().map(|op| op.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), ConditionOpcode::ALL.len());
        assert_eq!(ConditionOpcode::from_code(2), None);
    }

    #[test]
    fn test_condition_opcode_of_node() {
        let cond = Node::list([Node::int(51), Node::bytes(vec![0; 32]), Node::int(1)]);
        assert_eq!(condition_opcode(&cond), Some(ConditionOpcode::CreateCoin));
        assert_eq!(condition_opcode(&Node::nil()), None);
    }
}
