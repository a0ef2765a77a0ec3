//! Engine-independent building blocks.
//!
//! - [`value`]: owned SQL values and ordered parameter maps
//! - [`row`]: result rows and result-set helpers
//! - [`identifier`]: identifier validation and quoting
//! - [`traits`]: the `Dialect` strategy and the `DbConnection` seam
//!
//! Driver modules implement the traits; the query builder and schema engine
//! only ever talk to them through this module.

pub mod identifier;
pub mod row;
pub mod traits;
pub mod value;

pub use identifier::{quote, quote_qualified, split_qualified, validate_identifier, QuoteStyle};
pub use row::{ResultSet, Row};
pub use traits::{DbConnection, Dialect, LimitPlacement, LimitSpec, SelectParts};
pub use value::{Params, SqlValue};
