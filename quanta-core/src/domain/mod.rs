//! Domain types for Quanta

pub mod bar;
pub mod nav;
pub mod params;
pub mod run;
pub mod signal;
pub mod trade;

pub use bar::{PriceBar, PriceSeries};
pub use nav::{nav_values, NavPoint};
pub use params::{ParamId, ParameterSet};
pub use run::RunDescriptor;
pub use signal::{InvalidSignal, Signal, SignalPoint};
pub use trade::{TradeAction, TradeRecord};

