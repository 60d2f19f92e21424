pub mod combinations;
pub mod field_dictionary;

pub use combinations::{enumerate, resolve_parameters, validate, UpstreamQuery};
pub use field_dictionary::{CanonicalField, FieldDictionary};
