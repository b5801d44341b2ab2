pub mod change;
pub mod comparison;
pub mod dates;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod ranking;
pub mod table;

pub use comparison::{build_view, compare_dates, CompareOptions, Comparison, MarketView};
pub use filter::PriceFilter;
pub use models::{ChangeRecord, CompositeKey, ObservationDate, PriceRecord};
