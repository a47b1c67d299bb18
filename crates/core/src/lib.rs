pub mod config;
pub mod models;
pub mod predictor;
pub mod track_key;
pub mod traits;
pub mod visibility;

pub use config::*;
pub use models::*;
pub use predictor::*;
pub use track_key::*;
pub use traits::*;
pub use visibility::*;
