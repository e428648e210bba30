pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{header, info, success, warn};
pub use table::{customers_table, licenses_table, stats_table};
pub use theme::{theme, Theme};
