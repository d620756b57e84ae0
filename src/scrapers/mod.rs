pub mod browser;
pub mod microsoft;
pub mod pool;
pub mod traits;
pub mod types;

pub use microsoft::MicrosoftCareersScraper;
pub use traits::ListingScraper;
pub use types::ScrapeConfig;
