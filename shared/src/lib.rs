pub mod csv;
pub mod error;
pub mod events;
pub mod layout;
pub mod normalize;
pub mod status;
pub mod team;
pub mod view;

pub use csv::{RawRow, tokenize};
pub use error::BoardError;
pub use events::*;
pub use layout::LayoutMode;
pub use normalize::{Normalized, normalize};
pub use status::{Classification, StatusSummary};
pub use team::*;
pub use view::{Dashboard, DetailView, TeamView};
