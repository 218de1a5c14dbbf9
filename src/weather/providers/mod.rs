pub mod fixture;
pub mod open_meteo;

pub use fixture::FixtureProvider;
pub use open_meteo::OpenMeteoProvider;
