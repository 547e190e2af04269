pub mod router;

pub use router::RouterService;
