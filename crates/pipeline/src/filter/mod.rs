//! The filters every pipeline is assembled from.
//!
//! A server chain always starts with the [`EntryFilter`] and the [`RouteFilter`] and ends
//! with the [`ActionFilter`] and the [`GiveUpFilter`]; feature filters such as the
//! [`BodyFilter`] or the static asset filter sit in between.

mod action;
mod body;
mod entry;
mod giveup;
mod route;

pub use action::ActionFilter;
pub use body::BodyFilter;
pub use entry::CorsPolicy;
pub use entry::EntryFilter;
pub use giveup::GiveUpFilter;
pub use route::RouteFilter;
