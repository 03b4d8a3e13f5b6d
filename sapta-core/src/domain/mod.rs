//! Domain types for SAPTA

pub mod bar;
pub mod score;
pub mod series;

pub use bar::Bar;
pub use score::{
    BreakoutWindow, Confidence, ModuleId, ModuleScore, SaptaResult, Status, StatusBasis,
};
pub use series::{OhlcvSeries, MIN_HISTORY_BARS};
