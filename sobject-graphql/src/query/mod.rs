//! From GraphQL selections to SOQL.

mod planner;
mod selection;
mod typed;

pub use planner::QueryPlan;
pub use planner::QueryPlanner;
pub use selection::Selection;
pub use selection::parse_operation;
pub use typed::SelectionKind;
pub use typed::TypedSelection;
pub(crate) use typed::TYPENAME;
