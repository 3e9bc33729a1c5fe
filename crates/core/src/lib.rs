//! itemrule-core: data model for assessment-item rule processing.
//!
//! Provides the typed value model, variable declarations and their store,
//! the scoring tables attached to declarations (mappings, area mappings,
//! lookup tables) and the immutable program tree the evaluator executes.
//!
//! Markup parsing is out of scope; programs and declarations arrive either
//! built in code or as interchange JSON.

pub mod declaration;
pub mod error;
pub mod lookup;
pub mod mapping;
pub mod program;
pub mod value;

pub use declaration::{Declaration, DeclarationStore, VariableKind};
pub use error::CoreError;
pub use lookup::{
    BoundaryMode, InterpolationEntry, InterpolationTable, LookupTable, MatchEntry, MatchTable,
};
pub use mapping::{AreaMapEntry, AreaMapping, MapEntry, Mapping, Shape};
pub use program::{
    Attributes, Branch, Conditional, Expression, ItemFilter, ItemVariable, OperatorNode, Program,
    Statement,
};
pub use value::{BaseType, Cardinality, Scalar, Value};
