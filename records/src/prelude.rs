pub use crate::augment::{FieldSpec, Records};
pub use crate::engine::QueryEngine;
pub use crate::expr::Expr;
pub use crate::filter::Filter;
pub use crate::handler::{RecordDict, RecordFn, RecordHandler, RecordStruct};
pub use crate::resolver::{
    fixed, mapped, mapped_if_present, post_process, referenced, referenced_expr, referenced_via,
    referenced_with, skip, try_mapped, try_post_process, FieldResolver,
};
pub use crate::value::{Mapping, Value};
pub use crate::{Entity, Record, RecordError, RecordResult};
