//! Table schema model and the derivation of its DDL fragments.
//!
//! A [`TableSetup`] is the structured description of a feed's destination
//! table. [`TableSetup::update_metadata_field_values`] turns it into a
//! [`DerivedSchema`]: field lists, partition specs, the index column list,
//! field policies as JSON, the `tblproperties` clause and the escaped row
//! format. Derived strings are only ever produced from the model; there is no
//! parser going the other way.

mod derive;
mod escape;
mod model;

pub use derive::*;
pub use escape::{escape_java, unescape_java};
pub use model::*;
