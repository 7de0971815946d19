//! Extraction grammars for model-agnostic LLM replies: fenced segments,
//! `Module N` sub-model declarations and `Test_Item N` enumerations.

pub mod declarations;
pub mod segment;
pub mod test_items;

pub use declarations::extract_sub_model_declarations;
pub use segment::{extract_segment, Segment};
pub use test_items::extract_test_items;
