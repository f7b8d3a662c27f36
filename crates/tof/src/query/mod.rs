//! Logical queries, translated-field rewriting and their execution forms.

pub mod eval;
pub mod rewrite;
pub mod sql;
pub mod types;

pub use rewrite::{Rewriter, annotation_name};
pub use types::{
    Annotation, AnnotationExpr, Condition, Filter, FilterValue, Lookup, OrderTerm, QuerySpec,
    Subquery, split_key,
};
