pub mod cadence;
pub mod forecast;
pub mod plan;
pub mod role;
pub mod schema;
pub mod transform;
pub mod weights;

pub use cadence::Cadence;
pub use forecast::{
    CombinationStrategy, CombinedForecast, ForecastMetrics, ForecastResult, ModelFailure,
    PredictionSet,
};
pub use plan::{DataCharacteristics, ModelId, RoutingPlan};
pub use role::CanonicalRole;
pub use schema::{ColumnMapping, MatchMethod, SchemaReport};
pub use transform::{EnrichmentSuggestion, TableFormat, TransformReport};
pub use weights::EnsembleWeights;
