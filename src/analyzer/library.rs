//! Known callable names and the naming convention of generated code

use super::symbols::Type;
use crate::conditions::ConditionOpcode;

/// `sha256tree` library file
pub const SHA256TREE_LIB: &str = "sha256tree.clib";
/// `puzzle-hash-of-curried-function` library file
pub const CURRY_LIB: &str = "curry-and-treehash.clinc";
/// Singleton truth accessors
pub const SINGLETON_TRUTHS_LIB: &str = "singleton_truths.clib";
/// `assert` / `and` / `or` macros
pub const UTILITY_MACROS_LIB: &str = "utility_macros.clib";

/// Where a callable comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Defined in an includable library file
    Library(&'static str),
    /// VM operator, always available
    Primitive,
    /// Emits one spend condition; statement position only
    Condition(ConditionOpcode),
}

/// Signature of a callable name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryFunction {
    /// Name authors write
    pub name: &'static str,
    /// Operator emitted in generated code
    pub target: &'static str,
    /// Origin
    pub kind: FunctionKind,
    /// Parameter types; the last one repeats when `variadic`
    pub params: &'static [Type],
    /// Minimum argument count
    pub required: usize,
    /// Accepts any number of trailing arguments
    pub variadic: bool,
    /// Result type
    pub returns: Type,
}

impl LibraryFunction {
    /// Include file this function needs, if any
    pub fn include(&self) -> Option<&'static str> {
        match self.kind {
            FunctionKind::Library(file) => Some(file),
            _ => None,
        }
    }

    /// Condition opcode for statement builtins
    pub fn opcode(&self) -> Option<ConditionOpcode> {
        match self.kind {
            FunctionKind::Condition(op) => Some(op),
            _ => None,
        }
    }

    /// Expected type of argument `index`, `None` past the end
    pub fn param_type(&self, index: usize) -> Option<Type> {
        match self.params.get(index) {
            Some(ty) => Some(*ty),
            None if self.variadic => self.params.last().copied(),
            None => None,
        }
    }

    /// True when `count` arguments are acceptable
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.required && (self.variadic || count <= self.params.len())
    }
}

const fn function(
    name: &'static str,
    target: &'static str,
    kind: FunctionKind,
    params: &'static [Type],
    required: usize,
    variadic: bool,
    returns: Type,
) -> LibraryFunction {
    LibraryFunction {
        name,
        target,
        kind,
        params,
        required,
        variadic,
        returns,
    }
}

const fn condition(name: &'static str, op: ConditionOpcode, params: &'static [Type]) -> LibraryFunction {
    function(
        name,
        op.name(),
        FunctionKind::Condition(op),
        params,
        params.len(),
        false,
        Type::Unit,
    )
}

use FunctionKind::{Library, Primitive};
use Type::{Any, Bool, Bytes, Int};

/// Every callable name CoinScript knows
pub static FUNCTIONS: &[LibraryFunction] = &[
    // Library functions
    function("sha256tree", "sha256tree", Library(SHA256TREE_LIB), &[Any], 1, false, Bytes),
    function(
        "puzzleHashOfCurriedFunction",
        "puzzle-hash-of-curried-function",
        Library(CURRY_LIB),
        &[Bytes, Bytes],
        1,
        true,
        Bytes,
    ),
    function(
        "curryHash",
        "puzzle-hash-of-curried-function",
        Library(CURRY_LIB),
        &[Bytes, Bytes],
        1,
        true,
        Bytes,
    ),
    function("myIdTruth", "my_id_truth", Library(SINGLETON_TRUTHS_LIB), &[Any], 1, false, Bytes),
    function(
        "myFullPuzzleHashTruth",
        "my_full_puzzle_hash_truth",
        Library(SINGLETON_TRUTHS_LIB),
        &[Any],
        1,
        false,
        Bytes,
    ),
    function(
        "myInnerPuzzleHashTruth",
        "my_inner_puzzle_hash_truth",
        Library(SINGLETON_TRUTHS_LIB),
        &[Any],
        1,
        false,
        Bytes,
    ),
    function("myAmountTruth", "my_amount_truth", Library(SINGLETON_TRUTHS_LIB), &[Any], 1, false, Int),
    function(
        "myLineageProofTruth",
        "my_lineage_proof_truth",
        Library(SINGLETON_TRUTHS_LIB),
        &[Any],
        1,
        false,
        Any,
    ),
    function("assert", "assert", Library(UTILITY_MACROS_LIB), &[Any], 1, true, Any),
    function("and", "and", Library(UTILITY_MACROS_LIB), &[Bool], 1, true, Bool),
    function("or", "or", Library(UTILITY_MACROS_LIB), &[Bool], 1, true, Bool),
    // VM primitives
    function("sha256", "sha256", Primitive, &[Any], 1, true, Bytes),
    function("concat", "concat", Primitive, &[Any], 0, true, Bytes),
    function("strlen", "strlen", Primitive, &[Bytes], 1, false, Int),
    function("substr", "substr", Primitive, &[Bytes, Int, Int], 2, false, Bytes),
    function("coinid", "coinid", Primitive, &[Bytes, Bytes, Int], 3, false, Bytes),
    function("pubkeyForExp", "pubkey_for_exp", Primitive, &[Int], 1, false, Bytes),
    function("logand", "logand", Primitive, &[Int], 1, true, Int),
    function("logior", "logior", Primitive, &[Int], 1, true, Int),
    // Condition builtins
    condition("requireSignature", ConditionOpcode::AggSigMe, &[Bytes, Bytes]),
    condition("requireSignatureUnsafe", ConditionOpcode::AggSigUnsafe, &[Bytes, Bytes]),
    condition("reserveFee", ConditionOpcode::ReserveFee, &[Int]),
    condition("createCoinAnnouncement", ConditionOpcode::CreateCoinAnnouncement, &[Bytes]),
    condition("assertCoinAnnouncement", ConditionOpcode::AssertCoinAnnouncement, &[Bytes]),
    condition("createPuzzleAnnouncement", ConditionOpcode::CreatePuzzleAnnouncement, &[Bytes]),
    condition("assertPuzzleAnnouncement", ConditionOpcode::AssertPuzzleAnnouncement, &[Bytes]),
    condition("assertMyCoinId", ConditionOpcode::AssertMyCoinId, &[Bytes]),
    condition("assertMyParentId", ConditionOpcode::AssertMyParentId, &[Bytes]),
    condition("assertMyPuzzleHash", ConditionOpcode::AssertMyPuzzleHash, &[Bytes]),
    condition("assertMyAmount", ConditionOpcode::AssertMyAmount, &[Int]),
    condition("assertSecondsRelative", ConditionOpcode::AssertSecondsRelative, &[Int]),
    condition("assertSecondsAbsolute", ConditionOpcode::AssertSecondsAbsolute, &[Int]),
    condition("assertHeightRelative", ConditionOpcode::AssertHeightRelative, &[Int]),
    condition("assertHeightAbsolute", ConditionOpcode::AssertHeightAbsolute, &[Int]),
    condition(
        "assertBeforeSecondsRelative",
        ConditionOpcode::AssertBeforeSecondsRelative,
        &[Int],
    ),
    condition(
        "assertBeforeSecondsAbsolute",
        ConditionOpcode::AssertBeforeSecondsAbsolute,
        &[Int],
    ),
    condition(
        "assertBeforeHeightRelative",
        ConditionOpcode::AssertBeforeHeightRelative,
        &[Int],
    ),
    condition(
        "assertBeforeHeightAbsolute",
        ConditionOpcode::AssertBeforeHeightAbsolute,
        &[Int],
    ),
    function("remark", "REMARK", FunctionKind::Condition(ConditionOpcode::Remark), &[Any], 0, true, Type::Unit),
];

/// Signature of a callable author-facing name
pub fn lookup(name: &str) -> Option<&'static LibraryFunction> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Names generated code defines or relies on; author names mapping onto
/// one of these get a trailing `_`
const RESERVED: &[&str] = &[
    // operators and macros
    "a", "c", "f", "i", "l", "q", "r", "x", "qq", "unquote", "if", "list", "mod", "include",
    "defun", "defun-inline", "defmacro", "defconstant", "defconst", "lambda", "not", "all",
    "any", "divmod", "ash", "lsh", "logxor", "lognot", "point_add", "softfork", "modpow",
    "keccak256",
    // generated names
    "action", "args", "signer", "current_state", "merge_list", "merkle_leaf", "merkle_root",
    "hash_sorted", "action_name", "proof", "action_puzzle", "action_solution", "MOD_HASH",
    "ACTION_ROOT",
];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || FUNCTIONS.iter().any(|f| f.target == name)
}

/// `camelCase` → `snake_case`
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// `camelCase` → `UPPER_SNAKE_CASE`
pub fn to_upper_snake_case(name: &str) -> String {
    to_snake_case(name).to_uppercase()
}

/// Generated name for a curried value or constant
pub fn curried_name(name: &str) -> String {
    escape(to_upper_snake_case(name))
}

/// Generated name for a parameter or local
pub fn solution_name(name: &str) -> String {
    escape(to_snake_case(name))
}

fn escape(name: String) -> String {
    if is_reserved(&name) {
        format!("{}_", name)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_snake_case("toAddress"), "to_address");
        assert_eq!(to_snake_case("amount"), "amount");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("MAX_SUPPLY"), "max_supply");
        assert_eq!(to_upper_snake_case("launcherId"), "LAUNCHER_ID");
        assert_eq!(to_upper_snake_case("owner"), "OWNER");
    }

    #[test]
    fn test_reserved_names_are_escaped() {
        assert_eq!(solution_name("x"), "x_");
        assert_eq!(solution_name("signer"), "signer_");
        assert_eq!(curried_name("modHash"), "MOD_HASH_");
        assert_eq!(solution_name("to"), "to");
    }

    #[test]
    fn test_lookup_signatures() {
        let tree = lookup("sha256tree").unwrap();
        assert_eq!(tree.include(), Some(SHA256TREE_LIB));
        assert!(tree.accepts_arity(1));
        assert!(!tree.accepts_arity(2));

        let sha = lookup("sha256").unwrap();
        assert_eq!(sha.include(), None);
        assert!(sha.accepts_arity(5));
        assert_eq!(sha.param_type(4), Some(Type::Any));

        let fee = lookup("reserveFee").unwrap();
        assert_eq!(fee.opcode(), Some(ConditionOpcode::ReserveFee));
        assert!(lookup("transfer").is_none());
    }
}
