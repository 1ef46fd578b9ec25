//! Terminal browser for a generated song book. The library only builds the
//! book; this module is the optional read-only view the `compose --browse`
//! command opens on top of it.

mod app;
mod terminal;

pub use app::BrowserApp;
pub use terminal::run_browser;
