mod engine;
mod types;

pub use engine::{MAX_PROJECTION_YEARS, project};
pub use types::{
    Account, CoastingConfig, PensionConfig, ProjectionResult, RetirementTrigger,
    SimulationParameters, ValidationError, WorkStatus, YearlyProjection,
};
