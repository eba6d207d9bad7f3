pub mod clock;
pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use clock::{Clock, Interrupter, SystemClock};
pub use config::{load_dotenv, MigrationConfig};
pub use error::*;
pub use report::{format_elapse, Reporter};
pub use types::*;
