pub mod aa_set;
pub mod alphabet;

pub use aa_set::AminoAcidSet;
pub use alphabet::{Alphabet, GAP_CHAR, STOP_CHAR, UNKNOWN};
