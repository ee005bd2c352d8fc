pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod plot;
pub mod query;
pub mod realtime;
pub mod search;
pub mod state;
pub mod status;

pub use auth::{AuthUser, Session};
pub use client::ParkClient;
pub use config::ParkConfig;
pub use error::ParkError;
pub use geo::{parse_coordinate, Coordinate};
pub use plot::Plot;
pub use query::PlotQuery;
pub use realtime::{PlotChange, PlotSubscription};
pub use search::{filter_plots, vn_normalize, PlotFilter};
pub use state::{Action, MapState};
pub use status::{normalize_status, PlotStatus};
