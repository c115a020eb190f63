//! Order-execution core: impact model, risk predicates, and the engine
//! that drives them over the price series.

mod engine;
pub mod guard;
pub mod impact;

pub use engine::{EngineStatus, ExecutionEngine, ExecutionRecord, StepOutcome};
pub use impact::Quote;
