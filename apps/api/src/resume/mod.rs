// Resume documents: model, change detection, entitlements, persistence and HTTP surface.

pub mod change;
pub mod document;
pub mod entitlement;
pub mod gateway;
pub mod handlers;
pub mod store;
pub mod upload;
