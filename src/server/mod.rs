//! Local status dashboard (`--web`)

mod http;

pub use http::{bind, router, serve, DashboardState};
